//! Quota bookkeeping: rate-limit headers, usage alerts and the usage endpoint

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Monthly quota figures reported in response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
}

impl RateLimitInfo {
    /// Read `X-RateLimit-Limit` / `X-RateLimit-Remaining`, if both are present
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_u64(headers, "x-ratelimit-limit")?;
        let remaining = header_u64(headers, "x-ratelimit-remaining")?;
        Some(Self { limit, remaining })
    }

    pub fn used(&self) -> u64 {
        self.limit.saturating_sub(self.remaining)
    }

    pub fn alert(&self) -> Option<UsageAlert> {
        UsageAlert::evaluate(self.limit, self.used())
    }
}

/// Parse `Retry-After` given in seconds
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, "retry-after").map(Duration::from_secs)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
    Exceeded,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Exceeded => write!(f, "exceeded"),
        }
    }
}

/// Tiered alert raised at 80%, 95% and 100% quota usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAlert {
    pub level: AlertLevel,
    pub percent: f64,
    pub message: String,
}

impl UsageAlert {
    pub fn evaluate(limit: u64, used: u64) -> Option<Self> {
        let percent = if limit > 0 {
            used as f64 / limit as f64 * 100.0
        } else {
            100.0
        };

        if percent >= 100.0 {
            Some(Self {
                level: AlertLevel::Exceeded,
                percent: 100.0,
                message: "Monthly limit exceeded".to_string(),
            })
        } else if percent >= 95.0 {
            Some(Self {
                level: AlertLevel::Critical,
                percent: round1(percent),
                message: format!(
                    "Only {} requests remaining this month",
                    limit.saturating_sub(used)
                ),
            })
        } else if percent >= 80.0 {
            Some(Self {
                level: AlertLevel::Warning,
                percent: round1(percent),
                message: format!("{}% of monthly quota remaining", round1(100.0 - percent)),
            })
        } else {
            None
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Body of `GET /usage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub tier: String,
    pub usage: UsageCounters,
    pub reset: UsageReset,
    #[serde(default)]
    pub limits_by_tier: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    pub requests_this_month: u64,
    pub monthly_limit: u64,
    pub remaining: u64,
    pub usage_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReset {
    pub date: DateTime<Utc>,
    pub seconds_until_reset: u64,
}

impl Usage {
    pub fn alert(&self) -> Option<UsageAlert> {
        UsageAlert::evaluate(self.usage.monthly_limit, self.usage.requests_this_month)
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
