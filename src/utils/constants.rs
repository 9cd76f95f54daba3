//! Constants Module - Single Source of Truth
//!
//! Provider endpoints, timeouts, limits and pump.fun curve constants.
//! Other modules read these instead of hardcoding values.

use std::time::Duration;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// User-Agent for outbound HTTP requests
pub const USER_AGENT: &str = "TokenScope/0.1.0";

// ============================================
// PROVIDER ENDPOINTS
// ============================================

pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com";
pub const PUMPFUN_BASE_URL: &str = "https://frontend-api-v3.pump.fun";
pub const MORALIS_BASE_URL: &str = "https://solana-gateway.moralis.io";
pub const JUPITER_BASE_URL: &str = "https://lite-api.jup.ag";
/// Keyed Jupiter host, used when JUPITER_API_KEY is set
pub const JUPITER_PRO_BASE_URL: &str = "https://api.jup.ag";
pub const SOLANA_TRACKER_BASE_URL: &str = "https://data.solanatracker.io";
pub const PUMPPORTAL_WS_URL: &str = "wss://pumpportal.fun/api/data";

/// DexScreener chain identifier for Solana
pub const DEXSCREENER_CHAIN: &str = "solana";

/// Wrapped SOL mint
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

// ============================================
// TIMEOUTS (per route class)
// ============================================

/// Price lookups sit on the hot path of every dashboard refresh
pub const PRICE_TIMEOUT: Duration = Duration::from_millis(1500);
pub const DEXSCREENER_TIMEOUT: Duration = Duration::from_secs(10);
pub const PUMPFUN_TIMEOUT: Duration = Duration::from_secs(10);
pub const MORALIS_TIMEOUT: Duration = Duration::from_secs(15);
pub const SOLANA_TRACKER_TIMEOUT: Duration = Duration::from_secs(15);
/// Hard ceiling for any outbound call
pub const MAX_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================
// RETRY (linear backoff)
// ============================================

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// delay before retry n = n * base
pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;

// ============================================
// CACHE / STREAM
// ============================================

/// Feed cache refresh interval
pub const DEFAULT_CACHE_REFRESH_MS: u64 = 2000;
/// Per-token lookup cache TTL (seconds)
pub const DEFAULT_LOOKUP_TTL_SECS: u64 = 30;
/// Price cache TTL (seconds)
pub const DEFAULT_PRICE_TTL_SECS: u64 = 10;
pub const DEFAULT_STREAM_INTERVAL_MS: u64 = 1000;
pub const MIN_STREAM_INTERVAL_MS: u64 = 10;
pub const MAX_STREAM_INTERVAL_MS: u64 = 60_000;
/// Broadcast buffer for the live relay
pub const RELAY_CHANNEL_CAPACITY: usize = 1024;

// ============================================
// LIMITS
// ============================================

pub const DEFAULT_FEED_LIMIT: usize = 50;
pub const MAX_FEED_LIMIT: usize = 200;
/// DexScreener accepts up to 30 comma-separated addresses
pub const DEXSCREENER_MAX_ADDRESSES: usize = 30;
/// Jupiter price API accepts up to 100 ids per call
pub const JUPITER_MAX_IDS: usize = 100;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 120;

/// Holdings below this USD value are hidden unless asked for
pub const DUST_THRESHOLD_USD: f64 = 0.01;

// ============================================
// PUMP.FUN BONDING CURVE
// ============================================

/// Token decimals on pump.fun mints
pub const PUMPFUN_TOKEN_DECIMALS: u32 = 6;
/// Real token reserves at launch (whole tokens)
pub const PUMPFUN_INITIAL_REAL_TOKENS: f64 = 793_100_000.0;
/// virtual_token_reserves - real_token_reserves (whole tokens)
pub const PUMPFUN_VIRTUAL_TOKEN_OFFSET: f64 = 279_900_000.0;

// ============================================
// SNIPER WINDOWS (seconds after launch)
// ============================================

pub const SNIPER_WINDOW_SECS: i64 = 10;
pub const EARLY_WINDOW_SECS: i64 = 60;

/// Clamp a requested feed size into [1, MAX_FEED_LIMIT]
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT)
}

/// Clamp a requested stream interval
pub fn clamp_stream_interval(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(MIN_STREAM_INTERVAL_MS, MAX_STREAM_INTERVAL_MS))
}

/// pump.fun bonding curve progress (0-100) from raw virtual token reserves
pub fn bonding_curve_progress(virtual_token_reserves_raw: f64) -> f64 {
    let whole = virtual_token_reserves_raw / 10f64.powi(PUMPFUN_TOKEN_DECIMALS as i32);
    let real_left = (whole - PUMPFUN_VIRTUAL_TOKEN_OFFSET).max(0.0);
    let sold = 1.0 - real_left / PUMPFUN_INITIAL_REAL_TOKENS;
    (sold * 100.0).clamp(0.0, 100.0)
}

/// Loose base58 mint/wallet address check (length + alphabet)
pub fn is_valid_solana_address(address: &str) -> bool {
    const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (32..=44).contains(&address.len()) && address.chars().all(|c| ALPHABET.contains(c))
}
