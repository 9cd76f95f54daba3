//! API Request Handlers

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    Json, Path, Query, State,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::middleware::{RateLimitConfig, RateLimiter};
use super::types::*;
use crate::core::aggregator::{Providers, Sourced, TokenService};
use crate::core::portfolio::PortfolioService;
use crate::core::scanner::{scan, ScannerQuery};
use crate::core::sniper::{SniperReport, SniperService};
use crate::models::config::AppConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Automation, Token, UiPreferences, WalletPortfolio, WalletTrade};
use crate::providers::PumpLiveRelay;
use crate::utils::cache::{FeedKind, TokenFeedCache};
use crate::utils::constants::{clamp_limit, MAX_FEED_LIMIT, RELAY_CHANNEL_CAPACITY};
use crate::utils::mock::MockFactory;

/// Demo automation records per response
const DEMO_AUTOMATIONS: usize = 8;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub tokens: Arc<TokenService>,
    pub portfolio: Arc<PortfolioService>,
    pub snipers: Arc<SniperService>,
    pub feed_cache: Arc<TokenFeedCache>,
    pub relay: Arc<PumpLiveRelay>,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: Instant,
}

impl AppState {
    /// Build every service from config. Spawns nothing; the binary starts
    /// the refresher, relay and cleanup tasks.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let providers = Providers::from_config(&config)?;
        let tokens = Arc::new(TokenService::new(providers.clone(), config.demo_mode));
        let portfolio = Arc::new(PortfolioService::new(
            providers.clone(),
            tokens.clone(),
            config.demo_mode,
        ));
        let snipers = Arc::new(SniperService::new(providers, config.demo_mode));
        let relay = Arc::new(PumpLiveRelay::new(
            config.endpoints.pumpportal_ws.clone(),
            RELAY_CHANNEL_CAPACITY,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_minute(
            config.rate_limit_per_minute,
        )));

        Ok(Self {
            config,
            tokens,
            portfolio,
            snipers,
            feed_cache: Arc::new(TokenFeedCache::new()),
            relay,
            rate_limiter,
            start_time: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Feed tokens from the cache; falls through to the providers when the
    /// cache was never filled, was refreshed with a smaller limit than asked
    /// for, or the caller asked for fresh data
    async fn feed(
        &self,
        kind: FeedKind,
        limit: usize,
        fresh: bool,
    ) -> AppResult<Sourced<Vec<Token>>> {
        let snapshot = self.feed_cache.snapshot(kind);
        if !fresh && snapshot.covers(limit) {
            let tokens: Vec<Token> = snapshot.tokens.iter().take(limit).cloned().collect();
            let sourced = if snapshot.source.is_demo() {
                Sourced::demo(tokens)
            } else {
                Sourced::live(tokens, snapshot.source)
            };
            return Ok(sourced.cached());
        }

        debug!(
            "🔄 {} feed served live (fresh={}, filled={}, cached={}/{})",
            kind.as_str(),
            fresh,
            snapshot.is_filled(),
            snapshot.tokens.len(),
            limit
        );
        match kind {
            FeedKind::New => self.tokens.new_tokens(limit).await,
            FeedKind::Trending => self.tokens.trending_tokens(limit).await,
        }
    }
}

/// Query extraction with the envelope on rejection
pub fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

fn parse_json<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(b)| b)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;

// ============================================
// Health & Stats
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        demo_mode: state.config.demo_mode,
    };

    Json(ApiResponse::success(data, Meta::since(start)))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();

    let upstream = state
        .tokens
        .providers()
        .upstream_stats()
        .snapshot()
        .into_iter()
        .map(|(provider, stats)| UpstreamEntry {
            avg_latency_ms: stats.avg_latency_ms(),
            provider,
            stats,
        })
        .collect();

    let data = StatsData {
        uptime_seconds: state.uptime_seconds(),
        demo_mode: state.config.demo_mode,
        feeds: state.feed_cache.stats(),
        caches: state.tokens.cache_stats(),
        upstream,
        relay: state.relay.stats(),
        rate_limited_clients: state.rate_limiter.tracked_clients(),
    };

    debug!(
        "📊 Feed cache v{}: {} refreshes, {} skipped",
        data.feeds.version, data.feeds.refreshes, data.feeds.skipped
    );

    Json(ApiResponse::success(data, Meta::since(start)))
}

// ============================================
// Tokens
// ============================================

pub async fn new_tokens(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> ApiResult<Vec<Token>> {
    let start = Instant::now();
    let query = parse_query(query)?;
    let result = state.feed(FeedKind::New, clamp_limit(query.limit), query.fresh).await?;
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

pub async fn trending_tokens(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> ApiResult<Vec<Token>> {
    let start = Instant::now();
    let query = parse_query(query)?;
    let result = state.feed(FeedKind::Trending, clamp_limit(query.limit), query.fresh).await?;
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

pub async fn graduated_tokens(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<Token>> {
    let start = Instant::now();
    let limit = clamp_limit(parse_query(query)?.limit);
    let result = state.tokens.graduated_tokens(limit).await?;
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

pub async fn king_of_the_hill(State(state): State<Arc<AppState>>) -> ApiResult<Token> {
    let start = Instant::now();
    let result = state.tokens.king_of_the_hill().await?;
    Ok(Json(ApiResponse::sourced(result, None, start)))
}

pub async fn search_tokens(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Vec<Token>> {
    let start = Instant::now();
    let query = parse_query(query)?;
    let q = query.q.unwrap_or_default();

    let result = state.tokens.search(&q).await?;
    info!("🔍 Search '{}': {} results from {}", q.trim(), result.data.len(), result.source);
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

pub async fn token_detail(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Token> {
    let start = Instant::now();
    let result = state.tokens.token_detail(&address).await?;
    Ok(Json(ApiResponse::sourced(result, None, start)))
}

pub async fn get_prices(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PricesQuery>, QueryRejection>,
) -> ApiResult<std::collections::HashMap<String, f64>> {
    let start = Instant::now();
    let ids = parse_query(query)?.parse_ids()?;
    let result = state.tokens.prices(&ids).await?;
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

// ============================================
// Scanner
// ============================================

pub async fn scanner(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ScannerQuery>, QueryRejection>,
) -> ApiResult<Vec<Token>> {
    let start = Instant::now();
    let query = parse_query(query)?;
    query.validate()?;

    // Filter over the widest feed available; the query limit applies after sorting
    let feed = state.feed(query.feed, MAX_FEED_LIMIT, false).await?;
    let total = feed.data.len();
    let result = feed.map(|tokens| scan(&tokens, &query, Utc::now()));

    debug!("🧮 Scanner kept {} of {} {} tokens", result.data.len(), total, query.feed.as_str());
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

// ============================================
// Sniper
// ============================================

pub async fn sniper_report(
    State(state): State<Arc<AppState>>,
    Path(mint): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<SniperReport> {
    let start = Instant::now();
    let limit = clamp_limit(parse_query(query)?.limit);
    let result = state.snipers.snipers(&mint, limit).await?;
    let count = result.data.entries.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

// ============================================
// Wallet
// ============================================

pub async fn wallet_portfolio(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    query: Result<Query<PortfolioQuery>, QueryRejection>,
) -> ApiResult<WalletPortfolio> {
    let start = Instant::now();
    let query = parse_query(query)?;
    let result = state.portfolio.portfolio(&address, query.include_dust).await?;
    let count = result.data.holdings.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

pub async fn wallet_trades(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<WalletTrade>> {
    let start = Instant::now();
    let limit = clamp_limit(parse_query(query)?.limit);
    let result = state.portfolio.wallet_trades(&address, limit).await?;
    let count = result.data.len();
    Ok(Json(ApiResponse::sourced(result, Some(count), start)))
}

// ============================================
// Automations & Preferences
// ============================================

/// Automations are display records only; always demo
pub async fn automations() -> Json<ApiResponse<Vec<Automation>>> {
    let start = Instant::now();
    let records = MockFactory::for_key("automations", Utc::now()).automations(DEMO_AUTOMATIONS);
    let count = records.len();
    Json(ApiResponse::sourced(Sourced::demo(records), Some(count), start))
}

pub async fn validate_preferences(
    body: Result<Json<UiPreferences>, JsonRejection>,
) -> ApiResult<PreferencesData> {
    let start = Instant::now();
    let submitted = parse_json(body)?;
    let preferences = submitted.clone().normalized();
    let adjusted = preferences != submitted;

    Ok(Json(ApiResponse::success(
        PreferencesData { preferences, adjusted },
        Meta::since(start),
    )))
}
