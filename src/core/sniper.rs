//! Sniper labelling
//!
//! A "sniper" is a display label for wallets that bought within seconds of a
//! launch. Nothing here trades.
//! - 0-10s after launch: sniper
//! - 11-60s: early
//! - later, or unknown launch time: regular

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::aggregator::{Providers, Sourced};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{DataSource, SniperEntry, SniperLabel};
use crate::utils::constants::{is_valid_solana_address, EARLY_WINDOW_SECS, SNIPER_WINDOW_SECS};
use crate::utils::mock::MockFactory;

/// Label from seconds between launch and first buy.
/// Negative offsets (clock skew between sources) count as instant buys.
pub fn label_for(seconds_after_launch: Option<i64>) -> SniperLabel {
    match seconds_after_launch {
        Some(s) if s <= SNIPER_WINDOW_SECS => SniperLabel::Sniper,
        Some(s) if s <= EARLY_WINDOW_SECS => SniperLabel::Early,
        _ => SniperLabel::Regular,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SniperReport {
    pub mint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launched_at: Option<DateTime<Utc>>,
    pub snipers: usize,
    pub early: usize,
    pub regular: usize,
    /// Snipers that still hold the token
    pub snipers_holding: usize,
    pub entries: Vec<SniperEntry>,
}

impl SniperReport {
    /// Sort by first buy, cap, and count labels
    pub fn build(
        mint: &str,
        launched_at: Option<DateTime<Utc>>,
        mut entries: Vec<SniperEntry>,
        limit: usize,
    ) -> Self {
        entries.sort_by_key(|e| e.first_buy_at);
        entries.truncate(limit);

        let count = |label: SniperLabel| entries.iter().filter(|e| e.label == label).count();
        Self {
            mint: mint.to_string(),
            launched_at,
            snipers: count(SniperLabel::Sniper),
            early: count(SniperLabel::Early),
            regular: count(SniperLabel::Regular),
            snipers_holding: entries
                .iter()
                .filter(|e| e.label == SniperLabel::Sniper && e.holding)
                .count(),
            entries,
        }
    }
}

pub struct SniperService {
    providers: Providers,
    demo_mode: bool,
}

impl SniperService {
    pub fn new(providers: Providers, demo_mode: bool) -> Self {
        Self { providers, demo_mode }
    }

    /// Early buyers of `mint`: SolanaTracker first buyers, demo fallback
    pub async fn snipers(&self, mint: &str, limit: usize) -> AppResult<Sourced<SniperReport>> {
        let mint = mint.trim();
        if !is_valid_solana_address(mint) {
            return Err(AppError::bad_request(format!("Invalid mint address: {}", mint)));
        }

        if !self.demo_mode && self.providers.solana_tracker.is_configured() {
            match self.live(mint, limit).await {
                Ok(report) => return Ok(Sourced::live(report, DataSource::SolanaTracker)),
                Err(e) => warn!("⚠️ SolanaTracker first buyers failed for {}: {}", mint, e),
            }
        }

        Ok(Sourced::demo(Self::demo_report(mint, limit)))
    }

    async fn live(&self, mint: &str, limit: usize) -> eyre::Result<SniperReport> {
        let st = &self.providers.solana_tracker;
        let (buyers, token) = tokio::join!(st.first_buyers(mint), st.token(mint));
        let buyers = buyers?;

        // Token lookup is best effort; without it the earliest buy stands in for launch
        let launched_at = token
            .ok()
            .and_then(|t| t.launched_at())
            .or_else(|| buyers.iter().filter_map(|b| b.first_buy_at()).min());

        let entries: Vec<SniperEntry> = buyers
            .iter()
            .filter_map(|b| {
                let first_buy_at = b.first_buy_at()?;
                let seconds_after_launch = launched_at.map(|l| (first_buy_at - l).num_seconds());
                Some(SniperEntry {
                    wallet: b.wallet.clone(),
                    first_buy_at,
                    seconds_after_launch,
                    invested_usd: b.total_invested,
                    holding: b.still_holding(),
                    label: label_for(seconds_after_launch),
                })
            })
            .collect();

        let report = SniperReport::build(mint, launched_at, entries, limit);
        info!(
            "🎯 {}: {} snipers, {} early of {} buyers",
            mint,
            report.snipers,
            report.early,
            report.entries.len()
        );
        Ok(report)
    }

    fn demo_report(mint: &str, limit: usize) -> SniperReport {
        let now = Utc::now();
        let mut factory = MockFactory::for_key(mint, now);
        let launched_at = factory
            .token(mint)
            .created_at
            .unwrap_or(now - Duration::hours(1));
        let entries = factory.snipers(launched_at, limit.min(40));
        SniperReport::build(mint, Some(launched_at), entries, limit)
    }
}
