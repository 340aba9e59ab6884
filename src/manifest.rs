//! Reader for `package.json` manifests

use crate::error::{Error, Result};
use crate::types::{DependencySpec, Ecosystem};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up when a directory is given
pub const PACKAGE_JSON: &str = "package.json";

/// Dependencies extracted from a manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    pub dependencies: DependencySpec,
    pub ecosystem: Ecosystem,
    /// Manifest format label, e.g. `package.json`
    pub format: String,
    pub path: PathBuf,
}

/// Read a manifest file, or the `package.json` inside a directory
pub fn read_manifest(path: &Path, include_dev: bool) -> Result<Manifest> {
    let manifest_path = if path.is_dir() {
        path.join(PACKAGE_JSON)
    } else {
        path.to_path_buf()
    };

    if !manifest_path.is_file() {
        return Err(Error::ManifestNotFound(manifest_path.display().to_string()));
    }

    let content = std::fs::read_to_string(&manifest_path)?;
    let dependencies = parse_manifest(
        &content,
        &manifest_path.display().to_string(),
        include_dev,
    )?;

    debug!(
        "Read {} dependencies from {}",
        dependencies.len(),
        manifest_path.display()
    );

    Ok(Manifest {
        dependencies,
        ecosystem: Ecosystem::Npm,
        format: PACKAGE_JSON.to_string(),
        path: manifest_path,
    })
}

/// Extract `dependencies` (and `devDependencies` when asked) from package.json text
pub fn parse_package_json(content: &str, include_dev: bool) -> Result<DependencySpec> {
    parse_manifest(content, PACKAGE_JSON, include_dev)
}

/// Like [`parse_package_json`], reporting errors against `source`
fn parse_manifest(content: &str, source: &str, include_dev: bool) -> Result<DependencySpec> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::manifest_parse(source, format!("invalid JSON: {}", e)))?;
    let root = value
        .as_object()
        .ok_or_else(|| Error::manifest_parse(source, "expected a JSON object at the top level"))?;

    let mut spec = DependencySpec::new();
    collect_section(root, "dependencies", source, &mut spec)?;
    if include_dev {
        collect_section(root, "devDependencies", source, &mut spec)?;
    }

    Ok(spec)
}

fn collect_section(
    root: &Map<String, Value>,
    section: &str,
    source: &str,
    spec: &mut DependencySpec,
) -> Result<()> {
    let entries = match root.get(section) {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(Error::manifest_parse(
                source,
                format!("\"{}\" must be an object", section),
            ))
        }
    };

    for (name, range) in entries {
        if name.trim().is_empty() {
            continue;
        }
        let range = range.as_str().ok_or_else(|| {
            Error::manifest_parse(
                source,
                format!("version range for \"{}\" must be a string", name),
            )
        })?;
        spec.insert(name.as_str(), range);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "name": "sample",
        "dependencies": {"express": "^4.18.0", "@types/node": "^20.0.0"},
        "devDependencies": {"jest": "^29.0.0", "express": "^5.0.0"}
    }"#;

    #[test]
    fn test_runtime_dependencies_only() {
        let spec = parse_package_json(SAMPLE, false).unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.get("@types/node"), Some("^20.0.0"));
        assert_eq!(spec.get("jest"), None);
    }

    #[test]
    fn test_include_dev_keeps_runtime_range() {
        let spec = parse_package_json(SAMPLE, true).unwrap();
        assert_eq!(spec.len(), 3);
        assert_eq!(spec.get("jest"), Some("^29.0.0"));
        assert_eq!(spec.get("express"), Some("^4.18.0"));
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let spec = parse_package_json(r#"{"name": "bare"}"#, true).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_invalid_shapes() {
        for content in [
            "not json",
            "[]",
            r#"{"dependencies": ["a"]}"#,
            r#"{"dependencies": {"a": 1}}"#,
        ] {
            match parse_package_json(content, false) {
                Err(Error::ManifestParse { path, .. }) => assert_eq!(path, PACKAGE_JSON),
                other => panic!("{}: unexpected {:?}", content, other),
            }
        }
    }

    #[test]
    fn test_read_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PACKAGE_JSON), SAMPLE).unwrap();

        let manifest = read_manifest(dir.path(), false).unwrap();
        assert_eq!(manifest.ecosystem, Ecosystem::Npm);
        assert_eq!(manifest.format, "package.json");
        assert_eq!(manifest.dependencies.len(), 2);
    }

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_manifest(dir.path(), false),
            Err(Error::ManifestNotFound(_))
        ));

        fs::write(dir.path().join(PACKAGE_JSON), r#"{"dependencies": {"a": 1}}"#).unwrap();
        match read_manifest(dir.path(), false) {
            Err(Error::ManifestParse { path, message }) => {
                assert!(path.ends_with(PACKAGE_JSON));
                assert!(path.len() > PACKAGE_JSON.len());
                assert!(message.contains("\"a\""));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
