//! pump.fun frontend API client
//!
//! Keyless. Source of the freshest launches; each coin carries its bonding
//! curve reserves so progress toward graduation can be computed locally.

use chrono::{TimeZone, Utc};
use eyre::Result;
use serde::Deserialize;
use tracing::debug;

use crate::models::types::{DataSource, Token};
use crate::providers::http::{de_opt_f64, HttpClient, Request};
use crate::utils::constants::{bonding_curve_progress, PUMPFUN_TIMEOUT, PUMPFUN_TOKEN_DECIMALS};

const PROVIDER: &str = "pumpfun";
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Coin record as returned by /coins and /coins/{mint}
#[derive(Debug, Clone, Deserialize)]
pub struct PumpCoin {
    pub mint: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    pub image_uri: Option<String>,
    /// Unix millis
    pub created_timestamp: Option<i64>,
    /// Bonding curve finished (migrated)
    #[serde(default)]
    pub complete: bool,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub virtual_sol_reserves: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub virtual_token_reserves: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd_market_cap: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_supply: Option<f64>,
    pub raydium_pool: Option<String>,
}

impl PumpCoin {
    /// Spot price in SOL from the virtual reserves
    pub fn price_sol(&self) -> Option<f64> {
        let sol = self.virtual_sol_reserves? / LAMPORTS_PER_SOL;
        let tokens = self.virtual_token_reserves? / 10f64.powi(PUMPFUN_TOKEN_DECIMALS as i32);
        (tokens > 0.0).then(|| sol / tokens)
    }

    pub fn to_token(&self) -> Token {
        let mut token = Token::new(
            self.mint.clone(),
            self.symbol.clone(),
            self.name.clone(),
            DataSource::PumpFun,
        );
        token.image = self.image_uri.clone().filter(|s| !s.is_empty());
        token.created_at = self
            .created_timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        token.market_cap_usd = self.usd_market_cap;
        token.price_sol = self.price_sol();

        let supply = self
            .total_supply
            .map(|raw| raw / 10f64.powi(PUMPFUN_TOKEN_DECIMALS as i32))
            .filter(|s| *s > 0.0);
        token.price_usd = match (self.usd_market_cap, supply) {
            (Some(mcap), Some(supply)) => Some(mcap / supply),
            _ => None,
        };

        token.graduated = self.complete || self.raydium_pool.is_some();
        token.bonding_curve_progress = if token.graduated {
            Some(100.0)
        } else {
            self.virtual_token_reserves.map(bonding_curve_progress)
        };
        token
    }
}

#[derive(Clone)]
pub struct PumpFunClient {
    http: HttpClient,
    base_url: String,
}

impl PumpFunClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Newest coins first
    pub async fn latest_coins(&self, limit: usize) -> Result<Vec<Token>> {
        let url = format!("{}/coins", self.base_url);
        let coins: Vec<PumpCoin> = self
            .http
            .get_json(
                Request::get(PROVIDER, url, PUMPFUN_TIMEOUT)
                    .query("offset", 0)
                    .query("limit", limit)
                    .query("sort", "created_timestamp")
                    .query("order", "DESC")
                    .query("includeNsfw", false),
            )
            .await?;
        debug!("🆕 pump.fun: {} coins", coins.len());
        Ok(coins.iter().take(limit).map(PumpCoin::to_token).collect())
    }

    /// Current king of the hill
    pub async fn king_of_the_hill(&self) -> Result<Token> {
        let url = format!("{}/coins/king-of-the-hill", self.base_url);
        let coin: PumpCoin = self
            .http
            .get_json(Request::get(PROVIDER, url, PUMPFUN_TIMEOUT).query("includeNsfw", false))
            .await?;
        Ok(coin.to_token())
    }

    pub async fn coin(&self, mint: &str) -> Result<Token> {
        let url = format!("{}/coins/{}", self.base_url, mint);
        let coin: PumpCoin = self
            .http
            .get_json(Request::get(PROVIDER, url, PUMPFUN_TIMEOUT))
            .await?;
        Ok(coin.to_token())
    }
}
