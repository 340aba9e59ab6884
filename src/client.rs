//! Retrying HTTP client for the DepHealth API

use crate::classify::Failure;
use crate::config::NetworkConfig;
use crate::error::{ApiClientError, Error, Result};
use crate::retry::RetryPolicy;
use crate::types::{Ecosystem, PackageDetail, ScanRequest, ScanResult};
use crate::usage::{self, RateLimitInfo, ServiceHealth, Usage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Header carrying the static credential
pub const API_KEY_HEADER: &str = "x-api-key";

/// One logical API call
#[derive(Debug, Clone, PartialEq)]
pub enum RequestSpec {
    Get { path: String },
    Post { path: String, body: Value },
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self::Get { path: path.into() }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::Post {
            path: path.into(),
            body,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Get { path } | Self::Post { path, .. } => path,
        }
    }

    fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Post { .. } => "POST",
        }
    }
}

/// Parsed body plus the quota headers that came with it
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub body: T,
    pub rate_limit: Option<RateLimitInfo>,
}

/// Outcome of a single attempt
#[derive(Debug)]
enum Attempt {
    Success {
        body: String,
        rate_limit: Option<RateLimitInfo>,
    },
    Failure(ApiClientError),
}

type MessageExtractor = fn(&Value) -> Option<String>;

/// Tried in order against an error body; first hit wins
const MESSAGE_EXTRACTORS: &[MessageExtractor] = &[nested_error_message, flat_message];

fn nested_error_message(body: &Value) -> Option<String> {
    body.get("error")?
        .get("message")?
        .as_str()
        .map(String::from)
}

fn flat_message(body: &Value) -> Option<String> {
    body.get("message")?.as_str().map(String::from)
}

/// Human-readable message from an error body, falling back to the status text
pub fn extract_error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| MESSAGE_EXTRACTORS.iter().find_map(|extract| extract(&value)))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        })
}

/// Request path for a single package; the name is one encoded path segment
pub fn package_path(ecosystem: Ecosystem, name: &str) -> String {
    format!("/packages/{}/{}", ecosystem, urlencoding::encode(name))
}

/// Client for the DepHealth scoring API
#[derive(Debug, Clone)]
pub struct DepHealthClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DepHealthClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| Error::config(format!("Invalid API key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry_policy(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Perform one logical call, retrying transient failures with backoff
    pub async fn execute<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<ApiResponse<T>> {
        let mut rng = StdRng::from_entropy();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(
                "{} {} (attempt {}/{})",
                spec.method(),
                spec.path(),
                attempt,
                self.retry.max_attempts()
            );

            let err = match self.attempt(spec).await {
                Attempt::Success { body, rate_limit } => {
                    let body = serde_json::from_str(&body).map_err(|source| {
                        Error::InvalidResponse {
                            endpoint: spec.path().to_string(),
                            source,
                        }
                    })?;
                    return Ok(ApiResponse { body, rate_limit });
                }
                Attempt::Failure(err) => err,
            };

            if !err.is_retryable() || !self.retry.can_retry(attempt) {
                debug!(
                    "{} {} failed after {} attempt(s): {}",
                    spec.method(),
                    spec.path(),
                    attempt,
                    err
                );
                return Err(err.into());
            }

            let delay = self.retry.delay_for(attempt, &mut rng);
            warn!(
                "{} {} failed ({}), retrying in {:?}",
                spec.method(),
                spec.path(),
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, spec: &RequestSpec) -> Attempt {
        let url = format!("{}{}", self.base_url, spec.path());
        let request = match spec {
            RequestSpec::Get { .. } => self.client.get(&url),
            RequestSpec::Post { body, .. } => self.client.post(&url).json(body),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Failure(transport_error(&e)),
        };

        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());
        let retry_after = usage::retry_after(response.headers());

        // A truncated error body must not hide the status
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Attempt::Failure(transport_error(&e)),
            Err(e) => {
                debug!("Failed to read {} error body: {}", status, e);
                String::new()
            }
        };

        if status.is_success() {
            return Attempt::Success { body, rate_limit };
        }

        let code = Failure::Status(status.as_u16()).classify();
        let message = extract_error_message(&body, status);
        Attempt::Failure(
            ApiClientError::new(code, Some(status.as_u16()), message).with_retry_after(retry_after),
        )
    }

    /// `GET /packages/{ecosystem}/{name}`
    pub async fn get_package(&self, ecosystem: Ecosystem, name: &str) -> Result<PackageDetail> {
        let spec = RequestSpec::get(package_path(ecosystem, name));
        Ok(self.execute(&spec).await?.body)
    }

    /// `POST /scan` for one chunk of dependencies
    pub async fn scan_chunk(&self, request: &ScanRequest) -> Result<ApiResponse<ScanResult>> {
        let spec = RequestSpec::post("/scan", serde_json::to_value(request)?);
        self.execute(&spec).await
    }

    /// `GET /usage`
    pub async fn usage(&self) -> Result<Usage> {
        Ok(self.execute(&RequestSpec::get("/usage")).await?.body)
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<ServiceHealth> {
        Ok(self.execute(&RequestSpec::get("/health")).await?.body)
    }
}

fn transport_error(e: &reqwest::Error) -> ApiClientError {
    let failure = if e.is_timeout() {
        Failure::Timeout
    } else {
        Failure::Transport
    };
    ApiClientError::new(failure.classify(), None, e.to_string())
}
