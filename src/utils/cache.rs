//! In-Memory Caches
//!
//! Two caches live here:
//! - `TokenFeedCache`: the last-fetched "new" and "trending" token feeds.
//!   Overwritten on every refresh (last write wins), refreshed on a fixed
//!   timer. The only coordination is the `is_fetching` flag: a refresh that
//!   starts while another is in flight is skipped. The flag is held by a
//!   `RefreshGuard` and released on drop, so a panicking refresh cannot wedge it.
//! - `TtlCache<V>`: DashMap-backed per-key cache with TTL expiration, used for
//!   token detail and price lookups.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::aggregator::TokenService;
use crate::models::types::{DataSource, Token};
use crate::utils::constants::MAX_FEED_LIMIT;

// ============================================
// FEED CACHE
// ============================================

/// Which feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    #[default]
    New,
    Trending,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::New => "new",
            FeedKind::Trending => "trending",
        }
    }
}

/// Immutable view of one feed at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub kind: FeedKind,
    pub tokens: Vec<Token>,
    pub source: DataSource,
    pub updated_at: DateTime<Utc>,
    /// Monotonic across both feeds; 0 means never filled
    pub version: u64,
    /// Limit the refresh asked the providers for
    pub requested: usize,
}

impl FeedSnapshot {
    fn empty(kind: FeedKind) -> Self {
        Self {
            kind,
            tokens: Vec::new(),
            source: DataSource::Demo,
            updated_at: Utc::now(),
            version: 0,
            requested: 0,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.version > 0
    }

    /// Whether `limit` tokens can be answered from this snapshot. A short
    /// list still covers the limit when the providers were asked for at
    /// least that many and simply had fewer.
    pub fn covers(&self, limit: usize) -> bool {
        self.is_filled() && (self.tokens.len() >= limit || self.requested >= limit)
    }
}

/// Holds the refresh flag; clears it when dropped
pub struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Feed cache shared by the API, the SSE streams and the refresher
pub struct TokenFeedCache {
    new_tokens: RwLock<Arc<FeedSnapshot>>,
    trending_tokens: RwLock<Arc<FeedSnapshot>>,
    is_fetching: AtomicBool,
    version: AtomicU64,
    refreshes: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
}

impl Default for TokenFeedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenFeedCache {
    pub fn new() -> Self {
        Self {
            new_tokens: RwLock::new(Arc::new(FeedSnapshot::empty(FeedKind::New))),
            trending_tokens: RwLock::new(Arc::new(FeedSnapshot::empty(FeedKind::Trending))),
            is_fetching: AtomicBool::new(false),
            version: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    fn slot(&self, kind: FeedKind) -> &RwLock<Arc<FeedSnapshot>> {
        match kind {
            FeedKind::New => &self.new_tokens,
            FeedKind::Trending => &self.trending_tokens,
        }
    }

    /// Current snapshot (cheap Arc clone)
    pub fn snapshot(&self, kind: FeedKind) -> Arc<FeedSnapshot> {
        match self.slot(kind).read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Overwrite a feed with a complete list; returns the new version
    pub fn store(&self, kind: FeedKind, tokens: Vec<Token>, source: DataSource) -> u64 {
        self.store_requested(kind, tokens, source, MAX_FEED_LIMIT)
    }

    /// Overwrite a feed fetched with `requested` as the provider limit
    pub fn store_requested(
        &self,
        kind: FeedKind,
        tokens: Vec<Token>,
        source: DataSource,
        requested: usize,
    ) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(FeedSnapshot {
            kind,
            tokens,
            source,
            updated_at: Utc::now(),
            version,
            requested,
        });
        match self.slot(kind).write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
        version
    }

    /// Claim the refresh flag. None means a refresh is already running.
    pub fn begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        match self
            .is_fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(RefreshGuard {
                flag: &self.is_fetching,
            }),
            Err(_) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching.load(Ordering::Acquire)
    }

    /// Fetch both feeds and overwrite them. Returns false if skipped.
    pub async fn refresh(&self, service: &TokenService, limit: usize) -> bool {
        let Some(_guard) = self.begin_refresh() else {
            debug!("⏭️ Feed refresh already in flight, skipping tick");
            return false;
        };

        let (new_result, trending_result) =
            tokio::join!(service.new_tokens(limit), service.trending_tokens(limit));

        match new_result {
            Ok(sourced) => {
                self.store_requested(FeedKind::New, sourced.data, sourced.source, limit);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ New-token refresh failed, keeping previous feed: {}", e);
            }
        }
        match trending_result {
            Ok(sourced) => {
                self.store_requested(FeedKind::Trending, sourced.data, sourced.source, limit);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ Trending refresh failed, keeping previous feed: {}", e);
            }
        }

        self.refreshes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Refresh on a fixed timer until the handle is aborted.
    /// Ticks fire regardless of how long a refresh takes; overlapping ticks skip.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        service: Arc<TokenService>,
        interval: Duration,
        limit: usize,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        info!("🔁 Feed refresher every {}ms", interval.as_millis());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let cache = cache.clone();
                let service = service.clone();
                tokio::spawn(async move {
                    cache.refresh(&service, limit).await;
                });
            }
        })
    }

    pub fn stats(&self) -> FeedCacheStats {
        let new = self.snapshot(FeedKind::New);
        let trending = self.snapshot(FeedKind::Trending);
        FeedCacheStats {
            new_tokens: new.tokens.len(),
            new_source: new.source,
            trending_tokens: trending.tokens.len(),
            trending_source: trending.source,
            version: self.version.load(Ordering::SeqCst),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            is_fetching: self.is_fetching(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedCacheStats {
    pub new_tokens: usize,
    pub new_source: DataSource,
    pub trending_tokens: usize,
    pub trending_source: DataSource,
    pub version: u64,
    pub refreshes: u64,
    pub skipped: u64,
    pub failures: u64,
    pub is_fetching: bool,
}

// ============================================
// TTL CACHE
// ============================================

/// Cache entry with timestamp for TTL validation
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Thread-safe TTL cache keyed by normalized string
#[derive(Clone)]
pub struct TtlCache<V: Clone> {
    name: &'static str,
    store: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            store: Arc::new(DashMap::new()),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Solana addresses are case-sensitive; only surrounding whitespace is stripped
    #[inline]
    fn normalize_key(key: &str) -> String {
        key.trim().to_string()
    }

    /// Returns the value on a live hit; expired entries are removed and count as misses
    pub fn get(&self, key: &str) -> Option<V> {
        let key = Self::normalize_key(key);

        if let Some(entry) = self.store.get(&key) {
            if entry.is_expired() {
                drop(entry); // release read lock before removing
                self.store.remove(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 {} MISS (expired): {}", self.name, key);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "✅ {} HIT: {} ({}ms left)",
                    self.name,
                    key,
                    entry.remaining_ttl().as_millis()
                );
                Some(entry.value.clone())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 {} MISS: {}", self.name, key);
            None
        }
    }

    pub fn set(&self, key: &str, value: V) {
        let key = Self::normalize_key(key);
        self.store.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl: self.ttl,
            },
        );
    }

    /// Drop every expired entry; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 {} cleanup: {} expired entries removed", self.name, removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            name: self.name,
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics for /api/stats
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
