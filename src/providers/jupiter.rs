//! Jupiter price + token search client
//!
//! Keyless on lite-api.jup.ag; with `JUPITER_API_KEY` the pro host is used
//! and the key is sent as `x-api-key`. Price calls sit on the dashboard hot
//! path and use the short price timeout.

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::models::types::{DataSource, Token};
use crate::providers::http::{de_opt_f64, HttpClient, Request};
use crate::utils::constants::{DEXSCREENER_TIMEOUT, JUPITER_MAX_IDS, PRICE_TIMEOUT};

const PROVIDER: &str = "jupiter";

/// One entry of the price map
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterPrice {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_change24h: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterToken {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub mcap: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub liquidity: Option<f64>,
    pub stats24h: Option<JupiterStats>,
    pub first_pool: Option<JupiterPool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterStats {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_change: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub buy_volume: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub sell_volume: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterPool {
    pub created_at: Option<DateTime<Utc>>,
}

impl JupiterToken {
    pub fn to_token(&self) -> Token {
        let mut token = Token::new(
            self.id.clone(),
            self.symbol.clone(),
            self.name.clone(),
            DataSource::Jupiter,
        );
        token.image = self.icon.clone();
        token.price_usd = self.usd_price;
        token.market_cap_usd = self.mcap;
        token.liquidity_usd = self.liquidity;
        if let Some(stats) = &self.stats24h {
            token.price_change_24h = stats.price_change;
            token.volume_24h_usd = match (stats.buy_volume, stats.sell_volume) {
                (None, None) => None,
                (b, s) => Some(b.unwrap_or(0.0) + s.unwrap_or(0.0)),
            };
        }
        token.created_at = self.first_pool.as_ref().and_then(|p| p.created_at);
        token
    }
}

#[derive(Clone)]
pub struct JupiterClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl JupiterClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, path: &str, timeout: std::time::Duration) -> Request<'static> {
        let req = Request::get(PROVIDER, format!("{}{}", self.base_url, path), timeout);
        match &self.api_key {
            Some(key) => req.header("x-api-key", key.clone()),
            None => req,
        }
    }

    /// USD prices by mint. Batched by 100; mints Jupiter cannot price are absent.
    pub async fn prices(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(JUPITER_MAX_IDS) {
            let req = self.request("/price/v3", PRICE_TIMEOUT).query("ids", chunk.join(","));
            let data: HashMap<String, Option<JupiterPrice>> = self.http.get_json(req).await?;
            out.extend(data.into_iter().filter_map(|(mint, price)| {
                price.and_then(|p| p.usd_price).map(|usd| (mint, usd))
            }));
        }
        debug!("💲 Jupiter: priced {}/{} mints", out.len(), ids.len());
        Ok(out)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Token>> {
        let req = self.request("/tokens/v2/search", DEXSCREENER_TIMEOUT).query("query", query);
        let tokens: Vec<JupiterToken> = self.http.get_json(req).await?;
        Ok(tokens.iter().map(JupiterToken::to_token).collect())
    }
}
