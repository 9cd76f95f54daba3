//! Moralis Solana gateway client
//!
//! Requires `MORALIS_API_KEY` (sent as `X-API-Key`). Covers pump.fun
//! launch/graduation lists, single-token prices, wallet portfolio and swaps.

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::Deserialize;
use tracing::debug;

use crate::models::errors::AppError;
use crate::models::types::{DataSource, Holding, Token, TradeSide, WalletTrade};
use crate::providers::http::{de_opt_f64, HttpClient, Request};
use crate::utils::constants::MORALIS_TIMEOUT;

const PROVIDER: &str = "moralis";

#[derive(Debug, Deserialize)]
pub struct MoralisPage<T> {
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

/// pump.fun token entry (new / graduated lists)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisPumpToken {
    pub token_address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_native: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price_usd: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub liquidity: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub fully_diluted_valuation: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub graduated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub bonding_curve_progress: Option<f64>,
}

impl MoralisPumpToken {
    pub fn to_token(&self) -> Token {
        let mut token = Token::new(
            self.token_address.clone(),
            self.symbol.clone().unwrap_or_default(),
            self.name.clone().unwrap_or_default(),
            DataSource::Moralis,
        );
        token.image = self.logo.clone();
        token.price_sol = self.price_native;
        token.price_usd = self.price_usd;
        token.liquidity_usd = self.liquidity;
        token.market_cap_usd = self.fully_diluted_valuation;
        token.created_at = self.created_at;
        token.graduated = self.graduated_at.is_some();
        token.bonding_curve_progress = if token.graduated {
            Some(100.0)
        } else {
            self.bonding_curve_progress.map(|p| p.clamp(0.0, 100.0))
        };
        token
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisPrice {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub usd_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisPortfolio {
    pub native_balance: Option<MoralisNativeBalance>,
    #[serde(default)]
    pub tokens: Vec<MoralisTokenBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoralisNativeBalance {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub solana: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoralisTokenBalance {
    pub mint: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub logo: Option<String>,
    /// UI amount, decimals applied
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisSwap {
    pub transaction_hash: String,
    /// "buy" or "sell"
    pub transaction_type: String,
    pub block_timestamp: DateTime<Utc>,
    pub wallet_address: Option<String>,
    pub bought: Option<MoralisSwapLeg>,
    pub sold: Option<MoralisSwapLeg>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_value_usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoralisSwapLeg {
    pub address: String,
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub amount: Option<f64>,
}

impl MoralisSwap {
    /// Reshape; the traded token is what was bought on a buy and sold on a sell
    pub fn to_trade(&self, wallet: &str) -> Option<WalletTrade> {
        let side = match self.transaction_type.to_ascii_lowercase().as_str() {
            "buy" => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            _ => return None,
        };
        let leg = match side {
            TradeSide::Buy => self.bought.as_ref()?,
            TradeSide::Sell => self.sold.as_ref()?,
        };
        Some(WalletTrade {
            signature: self.transaction_hash.clone(),
            wallet: self.wallet_address.clone().unwrap_or_else(|| wallet.to_string()),
            side,
            token_mint: leg.address.clone(),
            token_symbol: leg.symbol.clone().unwrap_or_default(),
            token_amount: leg.amount.unwrap_or(0.0).abs(),
            value_usd: self.total_value_usd,
            timestamp: self.block_timestamp,
            source: DataSource::Moralis,
        })
    }
}

/// Token balances + native SOL, before pricing
#[derive(Debug, Clone)]
pub struct RawPortfolio {
    pub sol_balance: f64,
    pub holdings: Vec<Holding>,
}

#[derive(Clone)]
pub struct MoralisClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl MoralisClient {
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
            .ok_or_else(|| AppError::missing_api_key("MORALIS_API_KEY"))?;
        Ok(Request::get(PROVIDER, format!("{}{}", self.base_url, path), MORALIS_TIMEOUT)
            .header("X-API-Key", key.clone()))
    }

    pub async fn new_pumpfun_tokens(&self, limit: usize) -> Result<Vec<Token>> {
        let req = self.request("/token/mainnet/exchange/pumpfun/new")?.query("limit", limit);
        let page: MoralisPage<MoralisPumpToken> = self.http.get_json(req).await?;
        debug!("🆕 Moralis: {} new pump.fun tokens", page.result.len());
        Ok(page.result.iter().take(limit).map(MoralisPumpToken::to_token).collect())
    }

    pub async fn graduated_pumpfun_tokens(&self, limit: usize) -> Result<Vec<Token>> {
        let req = self.request("/token/mainnet/exchange/pumpfun/graduated")?.query("limit", limit);
        let page: MoralisPage<MoralisPumpToken> = self.http.get_json(req).await?;
        Ok(page
            .result
            .iter()
            .take(limit)
            .map(|t| {
                let mut token = t.to_token();
                token.graduated = true;
                token.bonding_curve_progress = Some(100.0);
                token
            })
            .collect())
    }

    pub async fn token_price(&self, mint: &str) -> Result<Option<f64>> {
        let req = self.request(&format!("/token/mainnet/{}/price", mint))?;
        let price: MoralisPrice = self.http.get_json(req).await?;
        Ok(price.usd_price)
    }

    /// Native balance and SPL balances (unpriced)
    pub async fn portfolio(&self, wallet: &str) -> Result<RawPortfolio> {
        let req = self.request(&format!("/account/mainnet/{}/portfolio", wallet))?;
        let data: MoralisPortfolio = self.http.get_json(req).await?;

        let holdings = data
            .tokens
            .into_iter()
            .map(|t| Holding {
                mint: t.mint,
                symbol: t.symbol.unwrap_or_default(),
                name: t.name.unwrap_or_default(),
                amount: t.amount.unwrap_or(0.0),
                price_usd: None,
                value_usd: None,
                image: t.logo,
            })
            .collect();

        Ok(RawPortfolio {
            sol_balance: data.native_balance.and_then(|n| n.solana).unwrap_or(0.0),
            holdings,
        })
    }

    pub async fn swaps(&self, wallet: &str, limit: usize) -> Result<Vec<WalletTrade>> {
        let req = self
            .request(&format!("/account/mainnet/{}/swaps", wallet))?
            .query("limit", limit)
            .query("order", "DESC");
        let page: MoralisPage<MoralisSwap> = self.http.get_json(req).await?;
        Ok(page
            .result
            .iter()
            .filter_map(|s| s.to_trade(wallet))
            .take(limit)
            .collect())
    }
}
