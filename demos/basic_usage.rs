//! Basic example of scanning a package.json

use dephealth_client::{read_manifest, DepHealthConfig, Scanner};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Picks up DEPHEALTH_API_KEY / DEPHEALTH_API_URL from the environment
    let config = DepHealthConfig::default();
    let scanner = Scanner::from_config(&config)?;

    let manifest = read_manifest(Path::new("."), false)?;
    println!(
        "Scanning {} dependencies from {}",
        manifest.dependencies.len(),
        manifest.path.display()
    );

    let outcome = scanner
        .scan_with_stats(&manifest.dependencies, manifest.ecosystem, false)
        .await?;
    let report = &outcome.result;

    println!("\n=== Scan Results ===");
    println!("  Critical: {}", report.critical);
    println!("  High: {}", report.high);
    println!("  Medium: {}", report.medium);
    println!("  Low: {}", report.low);

    if !outcome.stats.is_complete() {
        println!(
            "  ({} of {} requests failed)",
            outcome.stats.failed_chunks, outcome.stats.chunks
        );
    }
    if !outcome.stats.unscored.is_empty() {
        println!("  ({} packages not scored yet)", outcome.stats.unscored.len());
    }
    println!();

    let risky: Vec<_> = report.elevated().collect();

    if !risky.is_empty() {
        println!("Risky Dependencies:");
        for pkg in risky {
            println!(
                "  - {}: {} ({:?} data)",
                pkg.package,
                pkg.risk_label(),
                pkg.data_quality()
            );

            if let Some(risk) = &pkg.abandonment_risk {
                for factor in &risk.risk_factors {
                    println!("    ⚠  {}", factor);
                }
            }
        }
    } else {
        println!("✓ No high or critical risk dependencies found!");
    }

    Ok(())
}
