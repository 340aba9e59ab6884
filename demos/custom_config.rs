//! Example showing custom configuration and a single package lookup

use dephealth_client::{
    DepHealthClient, DepHealthConfig, Ecosystem, Error, ErrorCode, NetworkConfig, ScanSettings,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DepHealthConfig::builder()
        .network(NetworkConfig {
            timeout_ms: 10_000,      // Slow CI network
            max_retries: 5,          // Up to 6 attempts
            retry_base_delay_ms: 500,
            ..NetworkConfig::default()
        })
        .scan(ScanSettings {
            chunk_size: 10,
            include_dev: true,
            ..ScanSettings::default()
        })
        .build();

    config.validate()?;

    let client = DepHealthClient::new(&config.network)?;

    for name in ["express", "@types/node", "surely-not-a-real-package"] {
        match client.get_package(Ecosystem::Npm, name).await {
            Ok(detail) => println!(
                "{}: {} (score {:?}, {} advisories, latest {})",
                detail.health.package,
                detail.health.risk_label(),
                detail.health.health_score,
                detail.advisories.len(),
                detail.latest_version.as_deref().unwrap_or("?")
            ),
            Err(Error::Api(e)) if e.code == ErrorCode::NotFound => {
                println!("{}: not tracked yet", name)
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Ok(usage) = client.usage().await {
        println!(
            "\nUsed {} of {} requests this month",
            usage.usage.requests_this_month, usage.usage.monthly_limit
        );
    }

    Ok(())
}
