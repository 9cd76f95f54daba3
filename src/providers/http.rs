//! Shared outbound HTTP client
//!
//! One reqwest client (User-Agent, gzip) shared by every provider. Each call
//! gets its own timeout and goes through the linear-backoff retry loop.
//! Per-provider success/failure counters feed /api/stats.

use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{MAX_UPSTREAM_TIMEOUT, USER_AGENT as USER_AGENT_CONST};
use crate::utils::retry::{retry, RetryPolicy};

/// Counters for one provider
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ProviderStats {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.requests as f64
        }
    }
}

/// Shared by all providers
#[derive(Clone, Default)]
pub struct UpstreamStats {
    inner: Arc<DashMap<&'static str, ProviderStats>>,
}

impl UpstreamStats {
    pub fn record(&self, provider: &'static str, latency: Duration, result: Result<(), &AppError>) {
        let mut entry = self.inner.entry(provider).or_default();
        entry.requests += 1;
        entry.total_latency_ms += latency.as_millis() as u64;
        match result {
            Ok(()) => entry.successes += 1,
            Err(e) => {
                entry.failures += 1;
                entry.last_error = Some(e.to_string());
            }
        }
    }

    pub fn get(&self, provider: &str) -> Option<ProviderStats> {
        self.inner.get(provider).map(|e| e.clone())
    }

    pub fn snapshot(&self) -> Vec<(String, ProviderStats)> {
        let mut all: Vec<_> = self
            .inner
            .iter()
            .map(|e| (e.key().to_string(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

/// Request description for `get_json`
pub struct Request<'a> {
    pub provider: &'static str,
    pub url: String,
    pub query: Vec<(&'a str, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

impl<'a> Request<'a> {
    pub fn get(provider: &'static str, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout: timeout.min(MAX_UPSTREAM_TIMEOUT),
        }
    }

    pub fn query(mut self, key: &'a str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn header(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((key, value.into()));
        self
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    stats: UpstreamStats,
}

impl HttpClient {
    pub fn new(policy: RetryPolicy) -> AppResult<Self> {
        Ok(Self {
            client: Self::build_client()?,
            policy,
            stats: UpstreamStats::default(),
        })
    }

    /// Default headers, gzip on
    fn build_client() -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(MAX_UPSTREAM_TIMEOUT)
            .gzip(true)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn stats(&self) -> &UpstreamStats {
        &self.stats
    }

    /// GET + JSON decode with timeout and retry
    pub async fn get_json<T: DeserializeOwned>(&self, req: Request<'_>) -> AppResult<T> {
        let label = format!("{} {}", req.provider, req.url);
        let start = Instant::now();

        let result = retry(self.policy, &label, |_attempt| self.execute::<T>(&req)).await;

        self.stats.record(req.provider, start.elapsed(), result.as_ref().map(|_| ()));
        if let Err(e) = &result {
            warn!("⚠️ {} failed after {}ms: {}", req.provider, start.elapsed().as_millis(), e);
        }
        result
    }

    async fn execute<T: DeserializeOwned>(&self, req: &Request<'_>) -> AppResult<T> {
        let mut builder = self.client.get(&req.url).timeout(req.timeout);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (key, value) in &req.headers {
            builder = builder.header(*key, value);
        }

        let response = builder.send().await.map_err(|e| {
            let mut err = AppError::from(e);
            err.message = format!("{}: {}", req.provider, err.message);
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream_status(req.provider, status));
        }

        let bytes = response.bytes().await.map_err(AppError::from)?;
        debug!("📨 {} {} bytes from {}", req.provider, bytes.len(), req.url);

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            AppError::with_source(
                ErrorCode::UpstreamInvalidResponse,
                format!("{} returned unexpected JSON", req.provider),
                e,
            )
        })
    }
}

/// Parse a number that providers send either as JSON number or string
pub fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<NumOrStr>::deserialize(deserializer)? {
        Some(NumOrStr::Num(n)) if n.is_finite() => Some(n),
        Some(NumOrStr::Str(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}
