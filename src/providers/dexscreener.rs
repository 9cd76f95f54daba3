//! DexScreener API Client
//!
//! Keyless. Used for token detail (pairs by mint), search and the trending
//! feed (boosted tokens resolved to their best pair).
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{addr1,addr2,...}
//! Only `solana` pairs are kept.

use chrono::{TimeZone, Utc};
use eyre::Result;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::types::{DataSource, Token};
use crate::providers::http::{de_opt_f64, HttpClient, Request};
use crate::utils::constants::{DEXSCREENER_CHAIN, DEXSCREENER_MAX_ADDRESSES, DEXSCREENER_TIMEOUT};

const PROVIDER: &str = "dexscreener";

/// DexScreener pairs response
#[derive(Debug, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub chain_id: String,
    /// DEX identifier (e.g., "raydium", "pumpswap")
    pub dex_id: String,
    pub pair_address: String,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    pub liquidity: Option<DexLiquidity>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_usd: Option<f64>,
    /// Price in quote token (SOL for most pump.fun pairs)
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_native: Option<f64>,
    pub volume: Option<DexWindow>,
    pub price_change: Option<DexWindow>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub fdv: Option<f64>,
    /// Unix millis
    pub pair_created_at: Option<i64>,
    pub info: Option<DexInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexWindow {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexInfo {
    pub image_url: Option<String>,
}

/// Entry of /token-boosts/top/v1 and /token-profiles/latest/v1
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexTokenListing {
    pub chain_id: String,
    pub token_address: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_amount: Option<f64>,
    pub icon: Option<String>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    pub fn is_solana(&self) -> bool {
        self.chain_id.eq_ignore_ascii_case(DEXSCREENER_CHAIN)
    }
}

/// Reshape a pair into a Token for its base token
pub fn pair_to_token(pair: &DexPair) -> Token {
    let base = &pair.base_token;
    let mut token = Token::new(
        base.address.clone(),
        base.symbol.clone().unwrap_or_default(),
        base.name.clone().unwrap_or_default(),
        DataSource::DexScreener,
    );
    token.image = pair.info.as_ref().and_then(|i| i.image_url.clone());
    token.price_usd = pair.price_usd;
    if pair.quote_token.symbol.as_deref() == Some("SOL") {
        token.price_sol = pair.price_native;
    }
    token.market_cap_usd = pair.market_cap.or(pair.fdv);
    token.liquidity_usd = pair.liquidity.as_ref().and_then(|l| l.usd);
    token.volume_24h_usd = pair.volume.as_ref().and_then(|v| v.h24);
    token.price_change_24h = pair.price_change.as_ref().and_then(|v| v.h24);
    token.created_at = pair
        .pair_created_at
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    // A DEX pool means the token left the bonding curve
    token.graduated = pair.dex_id != "pumpfun";
    if token.graduated {
        token.bonding_curve_progress = Some(100.0);
    }
    token
}

/// Highest-liquidity Solana pair per base token, in first-seen order
pub fn best_pairs(pairs: Vec<DexPair>) -> Vec<DexPair> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, DexPair> = HashMap::new();

    for pair in pairs.into_iter().filter(|p| p.is_solana()) {
        let key = pair.base_token.address.clone();
        match best.get(&key) {
            Some(current) if current.liquidity_usd() >= pair.liquidity_usd() => {}
            Some(_) => {
                best.insert(key, pair);
            }
            None => {
                order.push(key.clone());
                best.insert(key, pair);
            }
        }
    }

    order.into_iter().filter_map(|k| best.remove(&k)).collect()
}

/// DexScreener API client
#[derive(Clone)]
pub struct DexScreenerClient {
    http: HttpClient,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Pairs for up to N mints, batched by 30, sorted by liquidity (highest first)
    pub async fn token_pairs(&self, addresses: &[String]) -> Result<Vec<DexPair>> {
        let mut pairs = Vec::new();
        for chunk in addresses.chunks(DEXSCREENER_MAX_ADDRESSES) {
            let url = format!("{}/latest/dex/tokens/{}", self.base_url, chunk.join(","));
            let data: DexScreenerResponse = self
                .http
                .get_json(Request::get(PROVIDER, url, DEXSCREENER_TIMEOUT))
                .await?;
            pairs.extend(data.pairs.unwrap_or_default().into_iter().filter(|p| p.is_solana()));
        }

        pairs.sort_by(|a, b| {
            b.liquidity_usd()
                .partial_cmp(&a.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!("📊 DexScreener: {} Solana pairs for {} mints", pairs.len(), addresses.len());
        Ok(pairs)
    }

    /// Token view for one mint (best pair), None when DexScreener has no pool
    pub async fn token(&self, address: &str) -> Result<Option<Token>> {
        let pairs = self.token_pairs(&[address.to_string()]).await?;
        Ok(pairs
            .iter()
            .find(|p| p.base_token.address == address)
            .map(pair_to_token))
    }

    /// Free-text search
    pub async fn search(&self, query: &str) -> Result<Vec<Token>> {
        let url = format!("{}/latest/dex/search", self.base_url);
        let data: DexScreenerResponse = self
            .http
            .get_json(Request::get(PROVIDER, url, DEXSCREENER_TIMEOUT).query("q", query))
            .await?;
        let tokens: Vec<Token> = best_pairs(data.pairs.unwrap_or_default())
            .iter()
            .map(pair_to_token)
            .collect();
        info!("🔍 DexScreener search '{}': {} tokens", query, tokens.len());
        Ok(tokens)
    }

    /// Tokens with the most active boosts (Solana only)
    pub async fn top_boosted(&self) -> Result<Vec<DexTokenListing>> {
        let url = format!("{}/token-boosts/top/v1", self.base_url);
        let listings: Vec<DexTokenListing> = self
            .http
            .get_json(Request::get(PROVIDER, url, DEXSCREENER_TIMEOUT))
            .await?;
        Ok(listings
            .into_iter()
            .filter(|l| l.chain_id.eq_ignore_ascii_case(DEXSCREENER_CHAIN))
            .collect())
    }

    /// Most recently updated token profiles (Solana only)
    pub async fn latest_profiles(&self) -> Result<Vec<DexTokenListing>> {
        let url = format!("{}/token-profiles/latest/v1", self.base_url);
        let listings: Vec<DexTokenListing> = self
            .http
            .get_json(Request::get(PROVIDER, url, DEXSCREENER_TIMEOUT))
            .await?;
        Ok(listings
            .into_iter()
            .filter(|l| l.chain_id.eq_ignore_ascii_case(DEXSCREENER_CHAIN))
            .collect())
    }

    /// Trending feed: boosted mints resolved to their best pair, boost order kept
    pub async fn trending(&self, limit: usize) -> Result<Vec<Token>> {
        let mut listings = self.top_boosted().await?;
        if listings.is_empty() {
            listings = self.latest_profiles().await?;
        }

        let mut addresses: Vec<String> = Vec::new();
        let mut icons: HashMap<String, String> = HashMap::new();
        for listing in listings {
            if addresses.len() >= limit {
                break;
            }
            if addresses.contains(&listing.token_address) {
                continue;
            }
            if let Some(icon) = listing.icon {
                icons.insert(listing.token_address.clone(), icon);
            }
            addresses.push(listing.token_address);
        }
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let best: HashMap<String, DexPair> = best_pairs(self.token_pairs(&addresses).await?)
            .into_iter()
            .map(|p| (p.base_token.address.clone(), p))
            .collect();

        let tokens: Vec<Token> = addresses
            .iter()
            .filter_map(|addr| {
                best.get(addr).map(|pair| {
                    let mut token = pair_to_token(pair);
                    if token.image.is_none() {
                        token.image = icons.get(addr).cloned();
                    }
                    token
                })
            })
            .collect();

        info!("🔥 DexScreener trending: {} tokens", tokens.len());
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(base: &str, chain: &str, liquidity: f64, dex: &str) -> DexPair {
        serde_json::from_value(serde_json::json!({
            "chainId": chain,
            "dexId": dex,
            "pairAddress": format!("pair-{}-{}", base, liquidity),
            "baseToken": {"address": base, "name": "Base", "symbol": "BASE"},
            "quoteToken": {"address": "So11111111111111111111111111111111111111112", "name": "Wrapped SOL", "symbol": "SOL"},
            "priceNative": "0.0000012",
            "priceUsd": "0.00018",
            "volume": {"h24": 1234.5},
            "priceChange": {"h24": -12.5},
            "liquidity": {"usd": liquidity},
            "marketCap": 180000,
            "pairCreatedAt": 1_700_000_000_000i64,
            "info": {"imageUrl": "https://img/x.png"}
        }))
        .unwrap()
    }

    #[test]
    fn test_pair_to_token() {
        let token = pair_to_token(&pair("MintA", "solana", 5000.0, "raydium"));
        assert_eq!(token.address, "MintA");
        assert_eq!(token.symbol, "BASE");
        assert_eq!(token.price_usd, Some(0.00018));
        assert_eq!(token.price_sol, Some(0.0000012));
        assert_eq!(token.market_cap_usd, Some(180000.0));
        assert_eq!(token.liquidity_usd, Some(5000.0));
        assert_eq!(token.price_change_24h, Some(-12.5));
        assert_eq!(token.image.as_deref(), Some("https://img/x.png"));
        assert!(token.graduated);
        assert_eq!(token.created_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(token.source, DataSource::DexScreener);
    }

    #[test]
    fn test_pumpfun_pool_not_graduated() {
        let token = pair_to_token(&pair("MintA", "solana", 5000.0, "pumpfun"));
        assert!(!token.graduated);
        assert_eq!(token.bonding_curve_progress, None);
    }

    #[test]
    fn test_best_pairs_keeps_highest_liquidity_solana_only() {
        let pairs = vec![
            pair("A", "solana", 100.0, "raydium"),
            pair("B", "solana", 50.0, "raydium"),
            pair("A", "solana", 900.0, "meteora"),
            pair("C", "ethereum", 1e9, "uniswap"),
        ];
        let best = best_pairs(pairs);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].base_token.address, "A");
        assert_eq!(best[0].liquidity_usd(), 900.0);
        assert_eq!(best[1].base_token.address, "B");
    }

    #[test]
    fn test_missing_numbers_tolerated() {
        let pair: DexPair = serde_json::from_value(serde_json::json!({
            "chainId": "solana",
            "dexId": "raydium",
            "pairAddress": "p",
            "baseToken": {"address": "A"},
            "quoteToken": {"address": "B"}
        }))
        .unwrap();
        let token = pair_to_token(&pair);
        assert_eq!(token.price_usd, None);
        assert_eq!(token.liquidity_usd, None);
        assert!(token.symbol.is_empty());
    }
}
