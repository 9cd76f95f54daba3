//! API Request/Response Types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

use crate::core::aggregator::Sourced;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{DataSource, UiPreferences};
use crate::providers::http::ProviderStats;
use crate::providers::websocket::RelayStats;
use crate::utils::cache::{CacheStats, FeedCacheStats, FeedKind};
use crate::utils::constants::JUPITER_MAX_IDS;

/// Response envelope: `{success, data, error, meta}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub meta: Meta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, meta: Meta) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta,
        }
    }

    /// Envelope for a provider-backed result
    pub fn sourced(sourced: Sourced<T>, count: Option<usize>, start: Instant) -> Self {
        let meta = Meta::for_source(&sourced, count, start);
        Self::success(sourced.data, meta)
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, meta: Meta) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            meta,
        }
    }
}

/// Where the data came from and how long it took
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub cached: bool,
    /// True when the payload is generated demo data
    pub demo: bool,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl Meta {
    pub fn empty() -> Self {
        Self {
            source: None,
            count: None,
            cached: false,
            demo: false,
            latency_ms: 0.0,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn since(start: Instant) -> Self {
        Self {
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            ..Self::empty()
        }
    }

    pub fn for_source<T>(sourced: &Sourced<T>, count: Option<usize>, start: Instant) -> Self {
        Self {
            source: Some(sourced.source),
            count,
            cached: sourced.cached,
            demo: sourced.demo,
            ..Self::since(start)
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("API_UNAUTHORIZED", "Invalid or missing API key")
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            details: Some(format!("retry_after: {}", retry_after)),
            ..Self::new(
                "API_RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            )
        }
    }
}

// ============================================
// Query parameters
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
    /// Bypass the feed cache
    #[serde(default)]
    pub fresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PricesQuery {
    /// Comma-separated mints
    pub ids: Option<String>,
}

impl PricesQuery {
    /// Split, trim, dedupe (order kept), cap at 100 ids
    pub fn parse_ids(&self) -> AppResult<Vec<String>> {
        let raw = self.ids.as_deref().unwrap_or("");
        let mut seen = HashSet::new();
        let ids: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
            .map(str::to_string)
            .collect();

        if ids.is_empty() {
            return Err(AppError::bad_request("Query parameter 'ids' is required"));
        }
        if ids.len() > JUPITER_MAX_IDS {
            return Err(AppError::bad_request(format!(
                "At most {} ids per request",
                JUPITER_MAX_IDS
            )));
        }
        Ok(ids)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PortfolioQuery {
    #[serde(default)]
    pub include_dust: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub feed: FeedKind,
}

// ============================================
// Response payloads
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub demo_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct UpstreamEntry {
    pub provider: String,
    #[serde(flatten)]
    pub stats: ProviderStats,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub uptime_seconds: u64,
    pub demo_mode: bool,
    pub feeds: FeedCacheStats,
    pub caches: Vec<CacheStats>,
    pub upstream: Vec<UpstreamEntry>,
    pub relay: RelayStats,
    pub rate_limited_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct PreferencesData {
    pub preferences: UiPreferences,
    /// Normalization changed something
    pub adjusted: bool,
}
