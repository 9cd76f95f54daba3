//! Token aggregation over the provider clients
//!
//! Each operation walks a fixed fallback chain and answers with the first
//! provider that produced data. Providers without a key are skipped. When
//! the whole chain fails the feed routes fall back to demo data; search and
//! price lookups have no demo fallback and fail with UPSTREAM_EXHAUSTED.
//!
//! Chains:
//! - new tokens:  pump.fun → Moralis → SolanaTracker latest → demo
//! - trending:    DexScreener → SolanaTracker → demo
//! - graduated:   Moralis → demo
//! - king of the hill: pump.fun → demo
//! - detail:      DexScreener (+ Jupiter price) → pump.fun → demo
//! - search:      DexScreener → Jupiter
//! - prices:      Jupiter → Moralis (per mint)

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::AppConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{dedupe_tokens, DataSource, Token};
use crate::providers::{
    DexScreenerClient, HttpClient, JupiterClient, MoralisClient, PumpFunClient, SolanaTrackerClient,
    UpstreamStats,
};
use crate::utils::cache::{CacheStats, TtlCache};
use crate::utils::constants::{
    is_valid_solana_address, DEFAULT_LOOKUP_TTL_SECS, DEFAULT_PRICE_TTL_SECS,
};
use crate::utils::mock::{seed_from_str, MockFactory};
use crate::utils::retry::RetryPolicy;

/// Max search query length
const MAX_QUERY_LEN: usize = 100;

/// Moralis prices one mint per call; cap the fan-out when Jupiter is down
const MORALIS_PRICE_FALLBACK_MAX: usize = 25;

/// A result plus where it came from
#[derive(Debug, Clone, Serialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
    pub demo: bool,
    /// Served from an in-memory cache
    pub cached: bool,
}

impl<T> Sourced<T> {
    pub fn live(data: T, source: DataSource) -> Self {
        Self {
            data,
            source,
            demo: false,
            cached: false,
        }
    }

    pub fn demo(data: T) -> Self {
        Self {
            data,
            source: DataSource::Demo,
            demo: true,
            cached: false,
        }
    }

    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            data: f(self.data),
            source: self.source,
            demo: self.demo,
            cached: self.cached,
        }
    }
}

/// Every provider client, sharing one HttpClient
#[derive(Clone)]
pub struct Providers {
    pub http: HttpClient,
    pub dexscreener: DexScreenerClient,
    pub pumpfun: PumpFunClient,
    pub moralis: MoralisClient,
    pub jupiter: JupiterClient,
    pub solana_tracker: SolanaTrackerClient,
}

impl Providers {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let http = HttpClient::new(RetryPolicy::from(config.retry))?;
        let ep = &config.endpoints;
        Ok(Self {
            dexscreener: DexScreenerClient::new(http.clone(), ep.dexscreener.clone()),
            pumpfun: PumpFunClient::new(http.clone(), ep.pumpfun.clone()),
            moralis: MoralisClient::new(
                http.clone(),
                ep.moralis.clone(),
                config.keys.moralis.clone(),
            ),
            jupiter: JupiterClient::new(
                http.clone(),
                ep.jupiter.clone(),
                config.keys.jupiter.clone(),
            ),
            solana_tracker: SolanaTrackerClient::new(
                http.clone(),
                ep.solana_tracker.clone(),
                config.keys.solana_tracker.clone(),
            ),
            http,
        })
    }

    pub fn upstream_stats(&self) -> &UpstreamStats {
        self.http.stats()
    }
}

/// Await one link of a fallback chain. Errors and empty lists move on.
async fn try_source<T, Fut>(what: &str, source: DataSource, fut: Fut) -> Option<Sourced<Vec<T>>>
where
    Fut: Future<Output = eyre::Result<Vec<T>>>,
{
    match fut.await {
        Ok(items) if !items.is_empty() => {
            debug!("✅ {} from {} ({} items)", what, source, items.len());
            Some(Sourced::live(items, source))
        }
        Ok(_) => {
            info!("📭 {} from {} came back empty, trying next provider", what, source);
            None
        }
        Err(e) => {
            warn!("⚠️ {} from {} failed, trying next provider: {}", what, source, e);
            None
        }
    }
}

pub struct TokenService {
    providers: Providers,
    demo_mode: bool,
    detail_cache: TtlCache<Token>,
    price_cache: TtlCache<f64>,
}

impl TokenService {
    pub fn new(providers: Providers, demo_mode: bool) -> Self {
        Self {
            providers,
            demo_mode,
            detail_cache: TtlCache::new(
                "token_detail",
                Duration::from_secs(DEFAULT_LOOKUP_TTL_SECS),
            ),
            price_cache: TtlCache::new("prices", Duration::from_secs(DEFAULT_PRICE_TTL_SECS)),
        }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(Providers::from_config(config)?, config.demo_mode))
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    fn demo_tokens(route: &str, limit: usize) -> Vec<Token> {
        MockFactory::for_key(route, Utc::now()).tokens(limit)
    }

    /// Freshest launches
    pub async fn new_tokens(&self, limit: usize) -> AppResult<Sourced<Vec<Token>>> {
        if self.demo_mode {
            return Ok(Sourced::demo(Self::demo_tokens("new", limit)));
        }
        let p = &self.providers;

        let pump = p.pumpfun.latest_coins(limit);
        if let Some(found) = try_source("new tokens", DataSource::PumpFun, pump).await {
            return Ok(found.map(dedupe_tokens));
        }
        if p.moralis.is_configured() {
            let moralis = p.moralis.new_pumpfun_tokens(limit);
            if let Some(found) = try_source("new tokens", DataSource::Moralis, moralis).await {
                return Ok(found.map(dedupe_tokens));
            }
        }
        if p.solana_tracker.is_configured() {
            let tracker = p.solana_tracker.latest(limit);
            if let Some(found) =
                try_source("new tokens", DataSource::SolanaTracker, tracker).await
            {
                return Ok(found.map(dedupe_tokens));
            }
        }

        warn!("⚠️ New-token chain exhausted, serving demo data");
        Ok(Sourced::demo(Self::demo_tokens("new", limit)))
    }

    pub async fn trending_tokens(&self, limit: usize) -> AppResult<Sourced<Vec<Token>>> {
        if self.demo_mode {
            return Ok(Sourced::demo(Self::demo_tokens("trending", limit)));
        }
        let p = &self.providers;

        let dex = p.dexscreener.trending(limit);
        if let Some(found) = try_source("trending", DataSource::DexScreener, dex).await {
            return Ok(found.map(dedupe_tokens));
        }
        if p.solana_tracker.is_configured() {
            let tracker = p.solana_tracker.trending(limit);
            if let Some(found) = try_source("trending", DataSource::SolanaTracker, tracker).await {
                return Ok(found.map(dedupe_tokens));
            }
        }

        warn!("⚠️ Trending chain exhausted, serving demo data");
        Ok(Sourced::demo(Self::demo_tokens("trending", limit)))
    }

    /// pump.fun coins that finished their bonding curve
    pub async fn graduated_tokens(&self, limit: usize) -> AppResult<Sourced<Vec<Token>>> {
        if !self.demo_mode && self.providers.moralis.is_configured() {
            let graduated = self.providers.moralis.graduated_pumpfun_tokens(limit);
            if let Some(found) = try_source("graduated", DataSource::Moralis, graduated).await {
                return Ok(found.map(dedupe_tokens));
            }
            warn!("⚠️ Graduated chain exhausted, serving demo data");
        }

        let tokens = Self::demo_tokens("graduated", limit)
            .into_iter()
            .map(|mut token| {
                token.graduated = true;
                token.bonding_curve_progress = Some(100.0);
                token
            })
            .collect();
        Ok(Sourced::demo(tokens))
    }

    /// The coin pump.fun currently features as closest to graduating
    pub async fn king_of_the_hill(&self) -> AppResult<Sourced<Token>> {
        if !self.demo_mode {
            match self.providers.pumpfun.king_of_the_hill().await {
                Ok(token) => return Ok(Sourced::live(token, DataSource::PumpFun)),
                Err(e) => {
                    warn!("⚠️ pump.fun king of the hill failed, serving demo data: {}", e)
                }
            }
        }

        let mut mock = MockFactory::for_key("king-of-the-hill", Utc::now());
        let address = mock.address();
        let mut token = mock.token(&address);
        token.graduated = false;
        token.bonding_curve_progress = Some(token.bonding_curve_progress.unwrap_or(0.0).min(99.0));
        Ok(Sourced::demo(token))
    }

    /// One token by mint, TTL cached
    pub async fn token_detail(&self, address: &str) -> AppResult<Sourced<Token>> {
        let address = address.trim();
        if !is_valid_solana_address(address) {
            return Err(AppError::bad_request(format!("Invalid token address: {}", address)));
        }
        if self.demo_mode {
            return Ok(Sourced::demo(MockFactory::for_key(address, Utc::now()).token(address)));
        }

        if let Some(token) = self.detail_cache.get(address) {
            let source = token.source;
            return Ok(Sourced::live(token, source).cached());
        }

        let p = &self.providers;
        let ids = [address.to_string()];
        let (pairs, prices) = tokio::join!(p.dexscreener.token(address), p.jupiter.prices(&ids));

        let found = match pairs {
            Ok(Some(mut token)) => {
                // Jupiter is the fresher price; DexScreener lags a few seconds
                if let Ok(prices) = &prices {
                    if let Some(price) = prices.get(address) {
                        token.price_usd = Some(*price);
                        self.price_cache.set(address, *price);
                    }
                }
                Some(token)
            }
            Ok(None) => {
                debug!("📭 DexScreener has no pool for {}", address);
                None
            }
            Err(e) => {
                warn!("⚠️ DexScreener detail failed for {}: {}", address, e);
                None
            }
        };

        let found = match found {
            Some(token) => Some(token),
            None => match p.pumpfun.coin(address).await {
                Ok(mut token) => {
                    if let Ok(prices) = &prices {
                        token.price_usd = prices.get(address).copied().or(token.price_usd);
                    }
                    Some(token)
                }
                Err(e) => {
                    warn!("⚠️ pump.fun detail failed for {}: {}", address, e);
                    None
                }
            },
        };

        match found {
            Some(token) => {
                self.detail_cache.set(address, token.clone());
                let source = token.source;
                Ok(Sourced::live(token, source))
            }
            None => {
                warn!("⚠️ Detail chain exhausted for {}, serving demo data", address);
                Ok(Sourced::demo(MockFactory::for_key(address, Utc::now()).token(address)))
            }
        }
    }

    pub async fn search(&self, query: &str) -> AppResult<Sourced<Vec<Token>>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::bad_request("Query parameter 'q' is required"));
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(AppError::bad_request(format!(
                "Query longer than {} characters",
                MAX_QUERY_LEN
            )));
        }
        if self.demo_mode {
            return Ok(Sourced::demo(Self::demo_tokens(query, 10)));
        }

        let p = &self.providers;
        let dex = p.dexscreener.search(query).await;
        if let Ok(tokens) = &dex {
            if !tokens.is_empty() {
                return Ok(Sourced::live(tokens.clone(), DataSource::DexScreener));
            }
        }

        match p.jupiter.search(query).await {
            Ok(tokens) => Ok(Sourced::live(tokens, DataSource::Jupiter)),
            Err(jup_err) => match dex {
                Ok(empty) => Ok(Sourced::live(empty, DataSource::DexScreener)),
                Err(dex_err) => {
                    warn!(
                        "⚠️ Search '{}' failed: dexscreener: {}; jupiter: {}",
                        query, dex_err, jup_err
                    );
                    Err(AppError::exhausted("token search"))
                }
            },
        }
    }

    /// USD prices by mint. Cached per mint; only misses go to Jupiter.
    pub async fn prices(&self, ids: &[String]) -> AppResult<Sourced<HashMap<String, f64>>> {
        if ids.is_empty() {
            return Err(AppError::bad_request("At least one id is required"));
        }
        if let Some(bad) = ids.iter().find(|id| !is_valid_solana_address(id)) {
            return Err(AppError::bad_request(format!("Invalid mint address: {}", bad)));
        }

        if self.demo_mode {
            let prices = ids
                .iter()
                .map(|id| (id.clone(), (seed_from_str(id) % 1_000_000) as f64 / 1e7))
                .collect();
            return Ok(Sourced::demo(prices));
        }

        let mut prices = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.price_cache.get(id) {
                Some(price) => {
                    prices.insert(id.clone(), price);
                }
                None if !missing.contains(id) => missing.push(id.clone()),
                None => {}
            }
        }

        if missing.is_empty() {
            return Ok(Sourced::live(prices, DataSource::Jupiter).cached());
        }

        let (fetched, source) = match self.providers.jupiter.prices(&missing).await {
            Ok(fetched) => (fetched, DataSource::Jupiter),
            Err(e) => {
                warn!("⚠️ Jupiter prices failed: {}", e);
                let fetched = self
                    .moralis_prices(&missing)
                    .await
                    .ok_or_else(|| AppError::exhausted("price lookup"))?;
                (fetched, DataSource::Moralis)
            }
        };
        for (mint, price) in fetched {
            self.price_cache.set(&mint, price);
            prices.insert(mint, price);
        }
        Ok(Sourced::live(prices, source))
    }

    /// One Moralis call per mint. None when Moralis is not configured or
    /// every call failed.
    async fn moralis_prices(&self, mints: &[String]) -> Option<HashMap<String, f64>> {
        let moralis = &self.providers.moralis;
        if !moralis.is_configured() {
            return None;
        }
        if mints.len() > MORALIS_PRICE_FALLBACK_MAX {
            info!(
                "✂️ Moralis price fallback limited to {} of {} mints",
                MORALIS_PRICE_FALLBACK_MAX,
                mints.len()
            );
        }

        let mints = &mints[..mints.len().min(MORALIS_PRICE_FALLBACK_MAX)];
        let results = join_all(mints.iter().map(|mint| moralis.token_price(mint))).await;

        let mut answered = false;
        let mut prices = HashMap::new();
        for (mint, result) in mints.iter().zip(results) {
            match result {
                Ok(price) => {
                    answered = true;
                    if let Some(price) = price {
                        prices.insert(mint.clone(), price);
                    }
                }
                Err(e) => debug!("📭 Moralis price for {} failed: {}", mint, e),
            }
        }
        answered.then_some(prices)
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        vec![self.detail_cache.stats(), self.price_cache.stats()]
    }

    /// Drop expired detail/price entries
    pub fn cleanup_caches(&self) -> usize {
        self.detail_cache.cleanup_expired() + self.price_cache.cleanup_expired()
    }
}
