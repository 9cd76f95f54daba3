//! Type definitions for TokenScope
//! Internal token/wallet schema every provider response is reshaped into

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    DexScreener,
    Moralis,
    PumpFun,
    Jupiter,
    SolanaTracker,
    Demo,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::DexScreener => "dexscreener",
            DataSource::Moralis => "moralis",
            DataSource::PumpFun => "pumpfun",
            DataSource::Jupiter => "jupiter",
            DataSource::SolanaTracker => "solanatracker",
            DataSource::Demo => "demo",
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, DataSource::Demo)
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fungible token as the dashboard sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Mint address (base58)
    pub address: String,
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_sol: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h_usd: Option<f64>,
    /// 24h price change in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// pump.fun bonding curve progress (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonding_curve_progress: Option<f64>,
    #[serde(default)]
    pub graduated: bool,
    pub source: DataSource,
}

impl Token {
    /// Minimal token with only identity fields set
    pub fn new(
        address: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        source: DataSource,
    ) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            name: name.into(),
            image: None,
            price_usd: None,
            price_sol: None,
            market_cap_usd: None,
            liquidity_usd: None,
            volume_24h_usd: None,
            price_change_24h: None,
            created_at: None,
            bonding_curve_progress: None,
            graduated: false,
            source,
        }
    }

    /// Minutes since creation, None when the provider gave no timestamp
    pub fn age_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at
            .map(|created| (now - created).num_minutes().max(0))
    }

    /// Fill fields this view is missing from another provider's view of the same mint.
    /// Fields already present win; identity and source are kept.
    pub fn merge(&mut self, other: &Token) {
        if self.address != other.address {
            return;
        }
        if self.symbol.is_empty() {
            self.symbol = other.symbol.clone();
        }
        if self.name.is_empty() {
            self.name = other.name.clone();
        }
        self.image = self.image.take().or_else(|| other.image.clone());
        self.price_usd = self.price_usd.or(other.price_usd);
        self.price_sol = self.price_sol.or(other.price_sol);
        self.market_cap_usd = self.market_cap_usd.or(other.market_cap_usd);
        self.liquidity_usd = self.liquidity_usd.or(other.liquidity_usd);
        self.volume_24h_usd = self.volume_24h_usd.or(other.volume_24h_usd);
        self.price_change_24h = self.price_change_24h.or(other.price_change_24h);
        self.created_at = self.created_at.or(other.created_at);
        self.bonding_curve_progress = self.bonding_curve_progress.or(other.bonding_curve_progress);
        self.graduated = self.graduated || other.graduated;
    }
}

/// Drop repeated mints, keeping the first occurrence and merging later views into it
pub fn dedupe_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match out.iter_mut().find(|t| t.address == token.address) {
            Some(existing) => existing.merge(&token),
            None => out.push(token),
        }
    }
    out
}

// ============================================
// Wallet / Portfolio
// ============================================

/// One SPL token position inside a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    /// UI amount (decimals applied)
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Holding {
    /// Recompute value from amount and price
    pub fn revalue(&mut self) {
        self.value_usd = self.price_usd.map(|p| p * self.amount);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPortfolio {
    pub address: String,
    pub sol_balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sol_price_usd: Option<f64>,
    pub holdings: Vec<Holding>,
    pub total_value_usd: f64,
    pub source: DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A swap performed by a tracked wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTrade {
    pub signature: String,
    pub wallet: String,
    pub side: TradeSide,
    pub token_mint: String,
    pub token_symbol: String,
    pub token_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub source: DataSource,
}

// ============================================
// Sniper labels
// ============================================

/// Display label for how early a wallet bought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SniperLabel {
    Sniper,
    Early,
    Regular,
}

impl SniperLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SniperLabel::Sniper => "sniper",
            SniperLabel::Early => "early",
            SniperLabel::Regular => "regular",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SniperLabel::Sniper => "🎯",
            SniperLabel::Early => "⚡",
            SniperLabel::Regular => "👤",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniperEntry {
    pub wallet: String,
    pub first_buy_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_after_launch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invested_usd: Option<f64>,
    /// Whether the wallet still holds the token
    pub holding: bool,
    pub label: SniperLabel,
}

// ============================================
// Automations (demo records)
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationKind {
    CopyTrade,
    LimitOrder,
    StopLoss,
    TakeProfit,
    DcaBuy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub name: String,
    pub kind: AutomationKind,
    pub status: AutomationStatus,
    /// Human-readable trigger description
    pub trigger: String,
    pub executions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================
// UI preferences (client-persisted view-model)
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Preference record the dashboard keeps in browser storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiPreferences {
    #[serde(default = "default_sound_enabled")]
    pub sound_enabled: bool,
    /// 0.0 - 1.0
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_token: Option<String>,
}

fn default_sound_enabled() -> bool {
    true
}

fn default_volume() -> f32 {
    0.5
}

/// Watchlist size cap
pub const MAX_WATCHLIST: usize = 50;

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            sound_enabled: default_sound_enabled(),
            volume: default_volume(),
            theme: Theme::default(),
            watchlist: Vec::new(),
            selected_token: None,
        }
    }
}

impl UiPreferences {
    /// Clamp volume, trim and dedupe the watchlist, drop blank selection
    pub fn normalized(mut self) -> Self {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            default_volume()
        };

        let mut seen = std::collections::HashSet::new();
        self.watchlist = self
            .watchlist
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && seen.insert(a.clone()))
            .take(MAX_WATCHLIST)
            .collect();

        self.selected_token = self
            .selected_token
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }
}
