//! # dephealth-client
//!
//! A resilient client for the DepHealth dependency scoring API:
//! - **Retrying requests**: status-driven error classification with jittered
//!   exponential backoff
//! - **Batch scans**: large dependency sets are split into bounded requests,
//!   sent one after another, and merged into a single report
//! - **Partial failure tolerance**: a failing chunk is skipped unless the
//!   account is rate limited or unauthorized
//! - **Data-quality bookkeeping**: verified vs. unverified risk counts
//!
//! ## Quick Start
//!
//! ```no_run
//! use dephealth_client::{read_manifest, DepHealthConfig, Scanner};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = DepHealthConfig::builder().api_key("dh_...").build();
//! let scanner = Scanner::from_config(&config)?;
//!
//! let manifest = read_manifest(Path::new("."), false)?;
//! let report = scanner
//!     .scan(&manifest.dependencies, manifest.ecosystem, false)
//!     .await?;
//!
//! println!("{} critical, {} high", report.critical, report.high);
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod classify;
mod client;
mod config;
mod error;
mod manifest;
mod retry;
mod scan;
mod types;
mod usage;

// Re-export public API
pub use aggregate::{summarize, Aggregator};
pub use classify::{classify, is_retryable, Failure};
pub use client::{extract_error_message, package_path, ApiResponse, DepHealthClient, RequestSpec};
pub use config::{DepHealthConfig, DepHealthConfigBuilder, NetworkConfig, ScanSettings};
pub use error::{ApiClientError, Error, ErrorCode, Result};
pub use manifest::{parse_package_json, read_manifest, Manifest};
pub use retry::{backoff_delay, RetryPolicy, MAX_RETRIES};
pub use scan::{ScanOutcome, ScanStats, Scanner};
pub use types::{
    AbandonmentRisk, Advisory, Confidence, DataQuality, DataQualityInfo, DataQualitySummary,
    DependencySpec, Ecosystem, PackageDetail, PackageHealth, PackageSignals, RiskLevel,
    ScanRequest, ScanResult, ScoreComponents,
};
pub use usage::{AlertLevel, RateLimitInfo, ServiceHealth, Usage, UsageAlert};

pub use tokio_util::sync::CancellationToken;
