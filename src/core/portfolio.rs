//! Wallet portfolio and trade history
//!
//! Holdings: Moralis portfolio → SolanaTracker wallet → demo.
//! Trades:   Moralis swaps → SolanaTracker trades → demo.
//! Moralis balances come unpriced and are priced through the Jupiter price
//! cache; SolanaTracker values its own holdings.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::aggregator::{Providers, Sourced, TokenService};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{DataSource, Holding, WalletPortfolio, WalletTrade};
use crate::utils::constants::{is_valid_solana_address, DUST_THRESHOLD_USD, SOL_MINT};
use crate::utils::mock::MockFactory;

fn validate_wallet(wallet: &str) -> AppResult<&str> {
    let wallet = wallet.trim();
    if is_valid_solana_address(wallet) {
        Ok(wallet)
    } else {
        Err(AppError::bad_request(format!("Invalid wallet address: {}", wallet)))
    }
}

/// Price, total, sort, and optionally hide dust.
/// The total always includes every priced holding, shown or not.
pub fn finalize_portfolio(
    address: &str,
    sol_balance: f64,
    sol_price_usd: Option<f64>,
    mut holdings: Vec<Holding>,
    include_dust: bool,
    source: DataSource,
) -> WalletPortfolio {
    for h in holdings.iter_mut() {
        if h.price_usd.is_some() {
            h.revalue();
        }
    }

    let tokens_value: f64 = holdings.iter().filter_map(|h| h.value_usd).sum();
    let total_value_usd = tokens_value + sol_price_usd.map(|p| p * sol_balance).unwrap_or(0.0);

    if !include_dust {
        holdings.retain(|h| h.value_usd.map(|v| v >= DUST_THRESHOLD_USD).unwrap_or(false));
    }
    holdings.sort_by(|a, b| {
        b.value_usd
            .unwrap_or(0.0)
            .partial_cmp(&a.value_usd.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    WalletPortfolio {
        address: address.to_string(),
        sol_balance,
        sol_price_usd,
        holdings,
        total_value_usd,
        source,
    }
}

pub struct PortfolioService {
    providers: Providers,
    tokens: Arc<TokenService>,
    demo_mode: bool,
}

impl PortfolioService {
    pub fn new(providers: Providers, tokens: Arc<TokenService>, demo_mode: bool) -> Self {
        Self {
            providers,
            tokens,
            demo_mode,
        }
    }

    pub async fn portfolio(
        &self,
        wallet: &str,
        include_dust: bool,
    ) -> AppResult<Sourced<WalletPortfolio>> {
        let wallet = validate_wallet(wallet)?;

        if !self.demo_mode {
            if self.providers.moralis.is_configured() {
                match self.from_moralis(wallet, include_dust).await {
                    Ok(portfolio) => return Ok(Sourced::live(portfolio, DataSource::Moralis)),
                    Err(e) => warn!("⚠️ Moralis portfolio failed for {}: {}", wallet, e),
                }
            }
            if self.providers.solana_tracker.is_configured() {
                match self.from_solana_tracker(wallet, include_dust).await {
                    Ok(portfolio) => return Ok(Sourced::live(portfolio, DataSource::SolanaTracker)),
                    Err(e) => warn!("⚠️ SolanaTracker wallet failed for {}: {}", wallet, e),
                }
            }
            warn!("⚠️ Portfolio chain exhausted for {}, serving demo data", wallet);
        }

        let demo = MockFactory::for_key(wallet, Utc::now()).portfolio(wallet);
        let portfolio = finalize_portfolio(
            wallet,
            demo.sol_balance,
            demo.sol_price_usd,
            demo.holdings,
            include_dust,
            DataSource::Demo,
        );
        Ok(Sourced::demo(portfolio))
    }

    async fn from_moralis(
        &self,
        wallet: &str,
        include_dust: bool,
    ) -> eyre::Result<WalletPortfolio> {
        let raw = self.providers.moralis.portfolio(wallet).await?;

        let mut ids: Vec<String> = raw
            .holdings
            .iter()
            .map(|h| h.mint.clone())
            .filter(|m| is_valid_solana_address(m))
            .collect();
        ids.push(SOL_MINT.to_string());

        // Unpriced holdings are still worth showing
        let prices = match self.tokens.prices(&ids).await {
            Ok(p) => p.data,
            Err(e) => {
                warn!("⚠️ Pricing {} holdings failed: {}", ids.len(), e);
                Default::default()
            }
        };

        let holdings: Vec<Holding> = raw
            .holdings
            .into_iter()
            .map(|mut h| {
                h.price_usd = prices.get(&h.mint).copied();
                h
            })
            .collect();

        let portfolio = finalize_portfolio(
            wallet,
            raw.sol_balance,
            prices.get(SOL_MINT).copied(),
            holdings,
            include_dust,
            DataSource::Moralis,
        );
        info!(
            "💼 {}: {} holdings, ${:.2}",
            wallet,
            portfolio.holdings.len(),
            portfolio.total_value_usd
        );
        Ok(portfolio)
    }

    async fn from_solana_tracker(
        &self,
        wallet: &str,
        include_dust: bool,
    ) -> eyre::Result<WalletPortfolio> {
        let (sol_balance, holdings) = self.providers.solana_tracker.wallet(wallet).await?;
        let sol_price = match self.tokens.prices(&[SOL_MINT.to_string()]).await {
            Ok(p) => p.data.get(SOL_MINT).copied(),
            Err(e) => {
                warn!("⚠️ SOL price lookup failed: {}", e);
                None
            }
        };
        Ok(finalize_portfolio(
            wallet,
            sol_balance,
            sol_price,
            holdings,
            include_dust,
            DataSource::SolanaTracker,
        ))
    }

    /// Most recent swaps first
    pub async fn wallet_trades(
        &self,
        wallet: &str,
        limit: usize,
    ) -> AppResult<Sourced<Vec<WalletTrade>>> {
        let wallet = validate_wallet(wallet)?;
        let p = &self.providers;

        if !self.demo_mode {
            if p.moralis.is_configured() {
                match p.moralis.swaps(wallet, limit).await {
                    Ok(trades) => {
                        return Ok(Sourced::live(sorted_trades(trades, limit), DataSource::Moralis))
                    }
                    Err(e) => warn!("⚠️ Moralis swaps failed for {}: {}", wallet, e),
                }
            }
            if p.solana_tracker.is_configured() {
                match p.solana_tracker.wallet_trades(wallet).await {
                    Ok(trades) => {
                        let trades = sorted_trades(trades, limit);
                        return Ok(Sourced::live(trades, DataSource::SolanaTracker));
                    }
                    Err(e) => warn!("⚠️ SolanaTracker trades failed for {}: {}", wallet, e),
                }
            }
            warn!("⚠️ Trade chain exhausted for {}, serving demo data", wallet);
        }

        Ok(Sourced::demo(
            MockFactory::for_key(wallet, Utc::now()).wallet_trades(wallet, limit),
        ))
    }
}

fn sorted_trades(mut trades: Vec<WalletTrade>, limit: usize) -> Vec<WalletTrade> {
    trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    trades.truncate(limit);
    trades
}
