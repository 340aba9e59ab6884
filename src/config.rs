//! Configuration for the API client and scan behavior

use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.dephealth.laranjo.dev/v1";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "DEPHEALTH_API_KEY";

/// Environment variable overriding the API endpoint
pub const API_URL_ENV: &str = "DEPHEALTH_API_URL";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepHealthConfig {
    /// Network configuration
    pub network: NetworkConfig,
    /// Batch scan configuration
    pub scan: ScanSettings,
}

/// Network configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL of the scoring API
    pub base_url: String,
    /// Static API key sent as `x-api-key`
    pub api_key: Option<String>,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff unit in milliseconds
    pub retry_base_delay_ms: u64,
}

/// Batch scan behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Maximum dependencies per `POST /scan` request
    pub chunk_size: usize,
    /// Include devDependencies from the manifest
    pub include_dev: bool,
    /// How many package names of a failed chunk to log
    pub failed_chunk_sample: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var(API_KEY_ENV).ok(),
            timeout_ms: 5_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            chunk_size: 25,
            include_dev: false,
            failed_chunk_sample: 5,
        }
    }
}

impl NetworkConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get backoff base as Duration
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::config("base_url must not be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::config(format!(
                "base_url must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be greater than 0"));
        }
        if self.retry_base_delay_ms == 0 {
            return Err(Error::config("retry_base_delay_ms must be greater than 0"));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(Error::config(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES, self.max_retries
            )));
        }
        Ok(())
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        Ok(())
    }
}

impl DepHealthConfig {
    /// Create a new builder for DepHealthConfig
    pub fn builder() -> DepHealthConfigBuilder {
        DepHealthConfigBuilder::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DepHealthConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.scan.validate()
    }
}

/// Builder for DepHealthConfig
#[derive(Default)]
pub struct DepHealthConfigBuilder {
    network: Option<NetworkConfig>,
    scan: Option<ScanSettings>,
    base_url: Option<String>,
    api_key: Option<String>,
    chunk_size: Option<usize>,
}

impl DepHealthConfigBuilder {
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn scan(mut self, scan: ScanSettings) -> Self {
        self.scan = Some(scan);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn build(self) -> DepHealthConfig {
        let mut network = self.network.unwrap_or_default();
        let mut scan = self.scan.unwrap_or_default();

        if let Some(url) = self.base_url {
            network.base_url = url;
        }
        if let Some(key) = self.api_key {
            network.api_key = Some(key);
        }
        if let Some(size) = self.chunk_size {
            scan.chunk_size = size;
        }

        DepHealthConfig { network, scan }
    }
}
