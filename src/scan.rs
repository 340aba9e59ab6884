//! Batch scan orchestration

use crate::aggregate::Aggregator;
use crate::client::DepHealthClient;
use crate::config::{DepHealthConfig, ScanSettings};
use crate::error::{Error, Result};
use crate::types::{DependencySpec, Ecosystem, ScanRequest, ScanResult};
use crate::usage::RateLimitInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Bookkeeping of one scan, reported next to the result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStats {
    /// Requests planned
    pub chunks: usize,
    /// Requests that failed without aborting the scan
    pub failed_chunks: usize,
    /// First few package names of every failed chunk
    pub failed_packages: Vec<String>,
    /// Packages the service answered for without a risk level
    pub unscored: Vec<String>,
    /// Dependencies submitted
    pub requested: usize,
    /// Last quota figures seen
    pub rate_limit: Option<RateLimitInfo>,
    pub completed_at: DateTime<Utc>,
}

impl ScanStats {
    fn new(chunks: usize, requested: usize) -> Self {
        Self {
            chunks,
            failed_chunks: 0,
            failed_packages: Vec::new(),
            unscored: Vec::new(),
            requested,
            rate_limit: None,
            completed_at: Utc::now(),
        }
    }

    /// True when every chunk was answered
    pub fn is_complete(&self) -> bool {
        self.failed_chunks == 0
    }
}

/// Result of a scan together with its bookkeeping
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub stats: ScanStats,
}

/// Splits dependency sets into bounded requests and merges the answers
#[derive(Debug, Clone)]
pub struct Scanner {
    client: DepHealthClient,
    settings: ScanSettings,
    cancel: Option<CancellationToken>,
}

impl Scanner {
    pub fn new(client: DepHealthClient, settings: ScanSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            client,
            settings,
            cancel: None,
        })
    }

    /// Build a client and scanner from one configuration
    pub fn from_config(config: &DepHealthConfig) -> Result<Self> {
        let client = DepHealthClient::new(&config.network)?;
        Self::new(client, config.scan.clone())
    }

    /// Stop issuing chunks once the token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn client(&self) -> &DepHealthClient {
        &self.client
    }

    /// Scan all dependencies and return the aggregate report.
    ///
    /// Failed chunks that do not abort the scan are only visible in logs;
    /// use [`Scanner::scan_with_stats`] to inspect them.
    pub async fn scan(
        &self,
        dependencies: &DependencySpec,
        ecosystem: Ecosystem,
        include_dev: bool,
    ) -> Result<ScanResult> {
        self.scan_with_stats(dependencies, ecosystem, include_dev)
            .await
            .map(|outcome| outcome.result)
    }

    pub async fn scan_with_stats(
        &self,
        dependencies: &DependencySpec,
        ecosystem: Ecosystem,
        include_dev: bool,
    ) -> Result<ScanOutcome> {
        if dependencies.is_empty() {
            return Ok(ScanOutcome {
                result: ScanResult::empty(ecosystem),
                stats: ScanStats::new(0, 0),
            });
        }

        if dependencies.len() <= self.settings.chunk_size {
            return self.scan_single(dependencies, ecosystem, include_dev).await;
        }

        self.scan_chunked(dependencies, ecosystem, include_dev).await
    }

    async fn scan_single(
        &self,
        dependencies: &DependencySpec,
        ecosystem: Ecosystem,
        include_dev: bool,
    ) -> Result<ScanOutcome> {
        self.check_cancelled(0, 1)?;
        info!("Scanning {} {} dependencies", dependencies.len(), ecosystem);

        let request = ScanRequest {
            dependencies: dependencies.clone(),
            ecosystem,
            include_dev,
        };
        let response = self.client.scan_chunk(&request).await?;

        let mut stats = ScanStats::new(1, dependencies.len());
        stats.rate_limit = response.rate_limit;

        let mut aggregator = Aggregator::new();
        aggregator.push(response.body);
        Ok(finish(aggregator, stats, ecosystem))
    }

    async fn scan_chunked(
        &self,
        dependencies: &DependencySpec,
        ecosystem: Ecosystem,
        include_dev: bool,
    ) -> Result<ScanOutcome> {
        let chunks = dependencies.chunks(self.settings.chunk_size);
        let total = chunks.len();
        let mut stats = ScanStats::new(total, dependencies.len());
        let mut aggregator = Aggregator::new();

        info!(
            "Scanning {} {} dependencies in {} chunks of up to {}",
            dependencies.len(),
            ecosystem,
            total,
            self.settings.chunk_size
        );

        for (index, chunk) in chunks.into_iter().enumerate() {
            self.check_cancelled(index, total)?;

            let sample = chunk.sample_names(self.settings.failed_chunk_sample);
            let request = ScanRequest {
                dependencies: chunk,
                ecosystem,
                include_dev,
            };

            match self.client.scan_chunk(&request).await {
                Ok(response) => {
                    if response.rate_limit.is_some() {
                        stats.rate_limit = response.rate_limit;
                    }
                    aggregator.push(response.body);
                }
                Err(e) if e.is_scan_fatal() => {
                    warn!(
                        "Chunk {}/{} failed with {}, aborting scan",
                        index + 1,
                        total,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Chunk {}/{} failed ({}); skipping packages: {}",
                        index + 1,
                        total,
                        e,
                        sample.join(", ")
                    );
                    stats.failed_chunks += 1;
                    stats.failed_packages.extend(sample);
                }
            }
        }

        if stats.failed_chunks > 0 {
            warn!(
                "{} of {} chunks failed; report covers {} of {} dependencies",
                stats.failed_chunks,
                total,
                aggregator.package_count(),
                dependencies.len()
            );
        }

        Ok(finish(aggregator, stats, ecosystem))
    }

    fn check_cancelled(&self, completed: usize, total: usize) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                warn!("Scan cancelled after {} of {} chunks", completed, total);
                Err(Error::Cancelled { completed, total })
            }
            _ => Ok(()),
        }
    }
}

fn finish(aggregator: Aggregator, mut stats: ScanStats, ecosystem: Ecosystem) -> ScanOutcome {
    if !aggregator.unscored().is_empty() {
        warn!(
            "{} package(s) have no risk level yet and are left out of the report: {}",
            aggregator.unscored().len(),
            aggregator.unscored().join(", ")
        );
        stats.unscored = aggregator.unscored().to_vec();
    }
    stats.completed_at = Utc::now();
    report_quota(&stats);

    ScanOutcome {
        result: aggregator.finish(ecosystem),
        stats,
    }
}

fn report_quota(stats: &ScanStats) {
    if let Some(alert) = stats.rate_limit.as_ref().and_then(RateLimitInfo::alert) {
        warn!("API quota {}: {} ({}% used)", alert.level, alert.message, alert.percent);
    }
}
