//! Configuration module for TokenScope
//!
//! Everything is read from the environment (optionally seeded from a `.env`
//! file). Upstream base URLs are grouped in `Endpoints` so they can be pointed
//! at a local server.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    DEFAULT_CACHE_REFRESH_MS, DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_MS, DEFAULT_STREAM_INTERVAL_MS, DEXSCREENER_BASE_URL, JUPITER_BASE_URL,
    JUPITER_PRO_BASE_URL, MIN_STREAM_INTERVAL_MS, MORALIS_BASE_URL, PUMPFUN_BASE_URL,
    PUMPPORTAL_WS_URL, SOLANA_TRACKER_BASE_URL,
};

/// Upstream base URLs
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub dexscreener: String,
    pub pumpfun: String,
    pub moralis: String,
    pub jupiter: String,
    pub solana_tracker: String,
    pub pumpportal_ws: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dexscreener: DEXSCREENER_BASE_URL.to_string(),
            pumpfun: PUMPFUN_BASE_URL.to_string(),
            moralis: MORALIS_BASE_URL.to_string(),
            jupiter: JUPITER_BASE_URL.to_string(),
            solana_tracker: SOLANA_TRACKER_BASE_URL.to_string(),
            pumpportal_ws: PUMPPORTAL_WS_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Every HTTP provider at one base URL (local fake upstream)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            dexscreener: base.clone(),
            pumpfun: base.clone(),
            moralis: base.clone(),
            jupiter: base.clone(),
            solana_tracker: base.clone(),
            pumpportal_ws: PUMPPORTAL_WS_URL.to_string(),
        }
    }
}

/// Linear backoff settings for outbound calls
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
        }
    }
}

/// Provider API keys. None means the provider is skipped in fallback chains.
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub moralis: Option<String>,
    pub solana_tracker: Option<String>,
    pub jupiter: Option<String>,
}

// Keys never reach the logs
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("moralis", &self.moralis.as_ref().map(|_| "***"))
            .field("solana_tracker", &self.solana_tracker.as_ref().map(|_| "***"))
            .field("jupiter", &self.jupiter.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Full application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub keys: ApiKeys,
    /// Inbound API key; when set, non-health routes require X-API-Key
    pub inbound_api_key: Option<String>,
    /// Serve demo data without calling any provider
    pub demo_mode: bool,
    pub cache_refresh: Duration,
    pub stream_interval: Duration,
    pub pump_live_enabled: bool,
    pub retry: RetryConfig,
    pub rate_limit_per_minute: u32,
    pub endpoints: Endpoints,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            keys: ApiKeys::default(),
            inbound_api_key: None,
            demo_mode: false,
            cache_refresh: Duration::from_millis(DEFAULT_CACHE_REFRESH_MS),
            stream_interval: Duration::from_millis(DEFAULT_STREAM_INTERVAL_MS),
            pump_live_enabled: true,
            retry: RetryConfig::default(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            endpoints: Endpoints::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) then read the environment
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("📄 Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT").or_else(|| get("TOKENSCOPE_PORT")) {
            Some(p) => parse_value::<u16>("PORT", &p)?,
            None => defaults.port,
        };

        let keys = ApiKeys {
            moralis: get("MORALIS_API_KEY").filter(|k| k != "YOUR_API_KEY"),
            solana_tracker: get("SOLANA_TRACKER_API_KEY").filter(|k| k != "YOUR_API_KEY"),
            jupiter: get("JUPITER_API_KEY").filter(|k| k != "YOUR_API_KEY"),
        };

        let mut endpoints = defaults.endpoints.clone();
        if keys.jupiter.is_some() {
            endpoints.jupiter = JUPITER_PRO_BASE_URL.to_string();
        }

        let stream_ms = match get("STREAM_INTERVAL_MS") {
            Some(v) => parse_value::<u64>("STREAM_INTERVAL_MS", &v)?,
            None => DEFAULT_STREAM_INTERVAL_MS,
        };
        if stream_ms < MIN_STREAM_INTERVAL_MS {
            warn!(
                "⚠️ STREAM_INTERVAL_MS={} below minimum, using {}ms",
                stream_ms, MIN_STREAM_INTERVAL_MS
            );
        }

        let cache_ms = match get("CACHE_REFRESH_MS") {
            Some(v) => parse_value::<u64>("CACHE_REFRESH_MS", &v)?,
            None => DEFAULT_CACHE_REFRESH_MS,
        };
        if cache_ms == 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalidValue,
                "CACHE_REFRESH_MS must be > 0",
            ));
        }

        let retry = RetryConfig {
            max_attempts: match get("RETRY_MAX_ATTEMPTS") {
                Some(v) => parse_value::<u32>("RETRY_MAX_ATTEMPTS", &v)?.max(1),
                None => DEFAULT_RETRY_ATTEMPTS,
            },
            base_delay: Duration::from_millis(match get("RETRY_BASE_DELAY_MS") {
                Some(v) => parse_value::<u64>("RETRY_BASE_DELAY_MS", &v)?,
                None => DEFAULT_RETRY_BASE_MS,
            }),
        };

        Ok(Self {
            host: get("TOKENSCOPE_HOST").unwrap_or(defaults.host),
            port,
            keys,
            inbound_api_key: get("TOKENSCOPE_API_KEY"),
            demo_mode: get("DEMO_MODE").map(|v| parse_flag(&v)).unwrap_or(false),
            cache_refresh: Duration::from_millis(cache_ms),
            stream_interval: Duration::from_millis(stream_ms.max(MIN_STREAM_INTERVAL_MS)),
            pump_live_enabled: get("PUMP_LIVE_ENABLED").map(|v| parse_flag(&v)).unwrap_or(true),
            retry,
            rate_limit_per_minute: match get("RATE_LIMIT_PER_MINUTE") {
                Some(v) => parse_value::<u32>("RATE_LIMIT_PER_MINUTE", &v)?,
                None => DEFAULT_RATE_LIMIT_PER_MINUTE,
            },
            endpoints,
        })
    }

    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|_| {
            AppError::new(
                ErrorCode::ConfigInvalidValue,
                format!("Invalid listen address {}:{}", self.host, self.port),
            )
        })
    }

    /// Demo-only configuration (no provider calls)
    pub fn demo() -> Self {
        Self {
            demo_mode: true,
            pump_live_enabled: false,
            ..Self::default()
        }
    }

    /// Log which providers are live (keys hidden)
    pub fn log_summary(&self) {
        let keyed = |key: &Option<String>| {
            if key.is_some() {
                "configured"
            } else {
                "skipped (no key)"
            }
        };
        info!("⚙️ Demo mode: {}", self.demo_mode);
        info!("   Moralis: {}", keyed(&self.keys.moralis));
        info!("   SolanaTracker: {}", keyed(&self.keys.solana_tracker));
        info!("   Jupiter: {}", if self.keys.jupiter.is_some() { "keyed" } else { "public" });
        info!(
            "   Cache refresh: {}ms, stream interval: {}ms",
            self.cache_refresh.as_millis(),
            self.stream_interval.as_millis()
        );
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.parse::<T>().map_err(|_| {
        AppError::new(
            ErrorCode::ConfigInvalidValue,
            format!("{} has invalid value '{}'", key, raw),
        )
    })
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
