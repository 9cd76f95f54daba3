//! SolanaTracker data API client
//!
//! Requires `SOLANA_TRACKER_API_KEY` (sent as `x-api-key`). Second source for
//! the token feeds and wallet views, and the only source of first buyers.

use chrono::{DateTime, TimeZone, Utc};
use eyre::Result;
use serde::Deserialize;

use crate::models::errors::AppError;
use crate::models::types::{DataSource, Holding, Token, TradeSide, WalletTrade};
use crate::providers::http::{de_opt_f64, HttpClient, Request};
use crate::utils::constants::{SOLANA_TRACKER_TIMEOUT, SOL_MINT};

const PROVIDER: &str = "solanatracker";

fn millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

#[derive(Debug, Clone, Deserialize)]
pub struct StToken {
    pub mint: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StUsd {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StTxns {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StPool {
    pub liquidity: Option<StUsd>,
    pub price: Option<StUsd>,
    pub market_cap: Option<StUsd>,
    pub txns: Option<StTxns>,
    /// Unix millis
    pub created_at: Option<i64>,
    /// Bonding curve progress, pump.fun pools only
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub curve_percentage: Option<f64>,
    pub market: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StEvent {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_change_percentage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StEvents {
    #[serde(rename = "24h")]
    pub h24: Option<StEvent>,
}

/// Token + pools, as returned by /tokens/trending, /tokens/latest, /tokens/{mint}
#[derive(Debug, Clone, Deserialize)]
pub struct StTokenEntry {
    pub token: StToken,
    #[serde(default)]
    pub pools: Vec<StPool>,
    pub events: Option<StEvents>,
}

impl StTokenEntry {
    /// Deepest pool drives price/liquidity; earliest pool is the launch time
    pub fn to_token(&self) -> Token {
        let t = &self.token;
        let mut token = Token::new(
            t.mint.clone(),
            t.symbol.clone(),
            t.name.clone(),
            DataSource::SolanaTracker,
        );
        token.image = t.image.clone();

        let pool = self.pools.iter().max_by(|a, b| {
            let la = a.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
            let lb = b.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
            la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(pool) = pool {
            token.price_usd = pool.price.as_ref().and_then(|p| p.usd);
            token.price_sol = pool.price.as_ref().and_then(|p| p.quote);
            token.liquidity_usd = pool.liquidity.as_ref().and_then(|l| l.usd);
            token.market_cap_usd = pool.market_cap.as_ref().and_then(|m| m.usd);
            token.volume_24h_usd = pool.txns.as_ref().and_then(|t| t.volume);
            let on_curve = pool.market.as_deref() == Some("pumpfun");
            token.graduated = !on_curve && pool.market.is_some();
            token.bonding_curve_progress = if token.graduated {
                Some(100.0)
            } else {
                pool.curve_percentage.map(|p| p.clamp(0.0, 100.0))
            };
        }

        token.created_at = millis(self.pools.iter().filter_map(|p| p.created_at).min());
        token.price_change_24h = self
            .events
            .as_ref()
            .and_then(|e| e.h24.as_ref())
            .and_then(|e| e.price_change_percentage);
        token
    }

    pub fn launched_at(&self) -> Option<DateTime<Utc>> {
        millis(self.pools.iter().filter_map(|p| p.created_at).min())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StWallet {
    #[serde(default)]
    pub tokens: Vec<StWalletToken>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_sol: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StWalletToken {
    pub token: StToken,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub balance: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StTradesPage {
    #[serde(default)]
    pub trades: Vec<StTrade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StTradeLeg {
    pub address: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub amount: Option<f64>,
    pub token: Option<StTradeLegToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StTradeLegToken {
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StTrade {
    pub tx: String,
    pub from: StTradeLeg,
    pub to: StTradeLeg,
    pub volume: Option<StUsd>,
    pub wallet: Option<String>,
    /// Unix millis
    pub time: i64,
}

impl StTrade {
    /// SOL leaving the wallet is a buy of the `to` token, SOL arriving is a sell of `from`
    pub fn to_trade(&self, wallet: &str) -> Option<WalletTrade> {
        let (side, leg) = if self.from.address == SOL_MINT {
            (TradeSide::Buy, &self.to)
        } else if self.to.address == SOL_MINT {
            (TradeSide::Sell, &self.from)
        } else {
            return None;
        };
        Some(WalletTrade {
            signature: self.tx.clone(),
            wallet: self.wallet.clone().unwrap_or_else(|| wallet.to_string()),
            side,
            token_mint: leg.address.clone(),
            token_symbol: leg.token.as_ref().and_then(|t| t.symbol.clone()).unwrap_or_default(),
            token_amount: leg.amount.unwrap_or(0.0).abs(),
            value_usd: self.volume.as_ref().and_then(|v| v.usd),
            timestamp: millis(Some(self.time))?,
            source: DataSource::SolanaTracker,
        })
    }
}

/// First-buyer record for a mint
#[derive(Debug, Clone, Deserialize)]
pub struct StFirstBuyer {
    pub wallet: String,
    /// Unix millis
    pub first_buy_time: i64,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_invested: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub held: Option<f64>,
}

impl StFirstBuyer {
    pub fn first_buy_at(&self) -> Option<DateTime<Utc>> {
        millis(Some(self.first_buy_time))
    }

    pub fn still_holding(&self) -> bool {
        self.held.map(|h| h > 0.0).unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct SolanaTrackerClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SolanaTrackerClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request(&self, path: &str) -> Result<Request<'static>> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::missing_api_key("SOLANA_TRACKER_API_KEY"))?;
        Ok(Request::get(PROVIDER, format!("{}{}", self.base_url, path), SOLANA_TRACKER_TIMEOUT)
            .header("x-api-key", key.clone()))
    }

    pub async fn trending(&self, limit: usize) -> Result<Vec<Token>> {
        let req = self.request("/tokens/trending")?;
        let entries: Vec<StTokenEntry> = self.http.get_json(req).await?;
        Ok(entries.iter().take(limit).map(StTokenEntry::to_token).collect())
    }

    pub async fn latest(&self, limit: usize) -> Result<Vec<Token>> {
        let req = self.request("/tokens/latest")?;
        let entries: Vec<StTokenEntry> = self.http.get_json(req).await?;
        Ok(entries.iter().take(limit).map(StTokenEntry::to_token).collect())
    }

    pub async fn token(&self, mint: &str) -> Result<StTokenEntry> {
        Ok(self.http.get_json(self.request(&format!("/tokens/{}", mint))?).await?)
    }

    /// Holdings with SolanaTracker's own USD valuation, plus SOL balance
    pub async fn wallet(&self, owner: &str) -> Result<(f64, Vec<Holding>)> {
        let req = self.request(&format!("/wallet/{}", owner))?;
        let data: StWallet = self.http.get_json(req).await?;
        let mut sol_balance = data.total_sol.unwrap_or(0.0);
        let mut holdings = Vec::with_capacity(data.tokens.len());

        for entry in data.tokens {
            let amount = entry.balance.unwrap_or(0.0);
            // SOL shows up as a token row; fold it into the native balance
            if entry.token.mint == SOL_MINT {
                if data.total_sol.is_none() {
                    sol_balance = amount;
                }
                continue;
            }
            let price_usd = match (entry.value, amount > 0.0) {
                (Some(value), true) => Some(value / amount),
                _ => None,
            };
            holdings.push(Holding {
                mint: entry.token.mint,
                symbol: entry.token.symbol,
                name: entry.token.name,
                amount,
                price_usd,
                value_usd: entry.value,
                image: entry.token.image,
            });
        }
        Ok((sol_balance, holdings))
    }

    pub async fn wallet_trades(&self, owner: &str) -> Result<Vec<WalletTrade>> {
        let page: StTradesPage = self
            .http
            .get_json(self.request(&format!("/wallet/{}/trades", owner))?)
            .await?;
        Ok(page.trades.iter().filter_map(|t| t.to_trade(owner)).collect())
    }

    pub async fn first_buyers(&self, mint: &str) -> Result<Vec<StFirstBuyer>> {
        Ok(self
            .http
            .get_json(self.request(&format!("/first-buyers/{}", mint))?)
            .await?)
    }
}
