//! Core data types for dependency health reporting

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Package name → version range, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySpec(BTreeMap<String, String>);

impl DependencySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency; a repeated name keeps the first range
    pub fn insert(&mut self, name: impl Into<String>, range: impl Into<String>) {
        self.0.entry(name.into()).or_insert_with(|| range.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Split into consecutive chunks of at most `size` entries, in order
    pub fn chunks(&self, size: usize) -> Vec<DependencySpec> {
        let size = size.max(1);
        let mut chunks = Vec::with_capacity(self.len().div_ceil(size));
        let mut current = BTreeMap::new();

        for (name, range) in &self.0 {
            current.insert(name.clone(), range.clone());
            if current.len() == size {
                chunks.push(DependencySpec(std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            chunks.push(DependencySpec(current));
        }

        chunks
    }

    /// The first `limit` package names, for log messages
    pub fn sample_names(&self, limit: usize) -> Vec<String> {
        self.0.keys().take(limit).cloned().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DependencySpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = DependencySpec::new();
        for (name, range) in iter {
            spec.insert(name, range);
        }
        spec
    }
}

/// Package ecosystem a scan targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    #[default]
    Npm,
    Pypi,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "npm" => Ok(Self::Npm),
            "pypi" => Ok(Self::Pypi),
            _ => Err(format!("Unknown ecosystem: {}", s)),
        }
    }
}

/// Risk level assigned by the scoring service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// HIGH or CRITICAL
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// How well-sourced a package's score is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataQuality {
    Verified,
    Partial,
    #[default]
    Unverified,
}

impl DataQuality {
    /// Lenient parse; anything unrecognized is UNVERIFIED
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "VERIFIED" => Self::Verified,
            "PARTIAL" => Self::Partial,
            _ => Self::Unverified,
        }
    }
}

impl<'de> Deserialize<'de> for DataQuality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(serde_json::Value::String(s)) => Self::parse_lenient(&s),
            _ => Self::Unverified,
        })
    }
}

/// Data-quality block attached to a package result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityInfo {
    #[serde(default)]
    pub assessment: DataQuality,
}

/// Abandonment risk details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbandonmentRisk {
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_horizon_months: Option<u32>,
}

/// Health information for a single package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageHealth {
    /// Package name
    pub package: String,
    /// Overall health score (0-100)
    #[serde(default)]
    pub health_score: Option<f64>,
    /// `None` when the service has not scored the package yet
    #[serde(default, deserialize_with = "lenient_risk_level")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub abandonment_risk: Option<AbandonmentRisk>,
    #[serde(default, deserialize_with = "lenient_data_quality")]
    pub data_quality: Option<DataQualityInfo>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl PackageHealth {
    /// Data-quality assessment, UNVERIFIED when the service sent none
    pub fn data_quality(&self) -> DataQuality {
        self.data_quality
            .as_ref()
            .map(|dq| dq.assessment)
            .unwrap_or_default()
    }

    pub fn is_scored(&self) -> bool {
        self.risk_level.is_some()
    }

    pub fn is_elevated(&self) -> bool {
        self.risk_level.map_or(false, |level| level.is_elevated())
    }

    /// Risk level for display; `UNSCORED` when absent
    pub fn risk_label(&self) -> String {
        self.risk_level
            .map(|level| level.to_string())
            .unwrap_or_else(|| "UNSCORED".to_string())
    }
}

/// Null, missing and unrecognised levels all mean "not scored"
fn lenient_risk_level<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RiskLevel>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok()))
}

/// Accepts `{"assessment": "..."}`, a bare string, or garbage
fn lenient_data_quality<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DataQualityInfo>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(DataQualityInfo {
            assessment: DataQuality::parse_lenient(&s),
        }),
        Some(serde_json::Value::Object(map)) => Some(DataQualityInfo {
            assessment: map
                .get("assessment")
                .and_then(|v| v.as_str())
                .map(DataQuality::parse_lenient)
                .unwrap_or_default(),
        }),
        Some(_) => Some(DataQualityInfo::default()),
    })
}

/// Sub-scores behind the overall health score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    #[serde(default)]
    pub maintainer_health: Option<f64>,
    #[serde(default)]
    pub user_centric: Option<f64>,
    #[serde(default)]
    pub evolution_health: Option<f64>,
    #[serde(default)]
    pub community_health: Option<f64>,
}

/// How much the service trusts its own score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Raw repository and registry signals the score was computed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSignals {
    #[serde(default)]
    pub weekly_downloads: Option<u64>,
    #[serde(default)]
    pub dependents_count: Option<u64>,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub days_since_last_commit: Option<u64>,
    #[serde(default)]
    pub commits_90d: Option<u64>,
    #[serde(default)]
    pub active_contributors_90d: Option<u64>,
    #[serde(default)]
    pub maintainer_count: Option<u64>,
    #[serde(default)]
    pub is_deprecated: Option<bool>,
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default)]
    pub openssf_score: Option<f64>,
}

/// Known vulnerability advisory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Full record returned by `GET /packages/{ecosystem}/{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDetail {
    #[serde(flatten)]
    pub health: PackageHealth,
    #[serde(default)]
    pub ecosystem: Option<Ecosystem>,
    #[serde(default)]
    pub components: Option<ScoreComponents>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub signals: Option<PackageSignals>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub advisories: Vec<Advisory>,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub last_published: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Advisory>, D::Error> {
    Ok(Option::<Vec<Advisory>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Counts of packages per data-quality assessment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualitySummary {
    pub verified: usize,
    pub partial: usize,
    pub unverified: usize,
}

/// Aggregate result of a dependency scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    #[serde(default)]
    pub packages: Vec<PackageHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQualitySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_risk_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unverified_risk_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<Ecosystem>,
}

impl ScanResult {
    /// Zero-valued result for an empty dependency set
    pub fn empty(ecosystem: Ecosystem) -> Self {
        Self {
            ecosystem: Some(ecosystem),
            ..Self::default()
        }
    }

    /// Packages at HIGH or CRITICAL risk
    pub fn elevated(&self) -> impl Iterator<Item = &PackageHealth> {
        self.packages.iter().filter(|p| p.is_elevated())
    }

    /// Number of packages at or above the given risk level
    pub fn count_at_least(&self, level: RiskLevel) -> usize {
        self.packages
            .iter()
            .filter(|p| p.risk_level.map_or(false, |l| l >= level))
            .count()
    }
}

/// Body of `POST /scan`
#[derive(Debug, Clone, Serialize)]
pub struct ScanRequest {
    pub dependencies: DependencySpec,
    pub ecosystem: Ecosystem,
    pub include_dev: bool,
}
