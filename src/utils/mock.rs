//! Demo data factories
//!
//! Served when demo mode is on or every live provider failed. Output depends
//! only on the seed and the reference time, so the same request renders the
//! same dashboard.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::types::{
    Automation, AutomationKind, AutomationStatus, DataSource, Holding, SniperEntry, Token,
    TradeSide, WalletPortfolio, WalletTrade,
};
use crate::core::sniper::label_for;

const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const NAME_PARTS: &[&str] = &[
    "Moon", "Pepe", "Doge", "Cat", "Frog", "Rocket", "Based", "Giga", "Chad", "Bonk", "Wif",
    "Sol", "Turbo", "Degen", "Shiba", "Pump", "Alpha", "Laser", "Meme", "Ape",
];

const DEMO_SOL_PRICE: f64 = 150.0;

/// Stable 64-bit seed from a string (FNV-1a)
pub fn seed_from_str(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

pub struct MockFactory {
    rng: StdRng,
    now: DateTime<Utc>,
}

impl MockFactory {
    pub fn new(seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            now,
        }
    }

    /// Factory seeded from a string key (wallet, mint, route name)
    pub fn for_key(key: &str, now: DateTime<Utc>) -> Self {
        Self::new(seed_from_str(key), now)
    }

    pub fn address(&mut self) -> String {
        (0..44)
            .map(|_| BASE58[self.rng.gen_range(0..BASE58.len())] as char)
            .collect()
    }

    fn signature(&mut self) -> String {
        (0..88)
            .map(|_| BASE58[self.rng.gen_range(0..BASE58.len())] as char)
            .collect()
    }

    fn name(&mut self) -> (String, String) {
        let a = NAME_PARTS[self.rng.gen_range(0..NAME_PARTS.len())];
        let b = NAME_PARTS[self.rng.gen_range(0..NAME_PARTS.len())];
        let name = format!("{} {}", a, b);
        let symbol: String = format!("{}{}", a, b)
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(self.rng.gen_range(3..=6))
            .collect::<String>()
            .to_uppercase();
        (name, symbol)
    }

    /// A token at a known mint
    pub fn token(&mut self, address: &str) -> Token {
        let (name, symbol) = self.name();
        let progress: f64 = self.rng.gen_range(0.0..100.0);
        let graduated = progress > 97.0;
        let price_sol: f64 = self.rng.gen_range(0.000_000_02..0.000_5);
        let market_cap = price_sol * DEMO_SOL_PRICE * 1_000_000_000.0;
        let age_minutes = self.rng.gen_range(0..24 * 60);

        let mut token = Token::new(address, symbol, name, DataSource::Demo);
        token.price_sol = Some(price_sol);
        token.price_usd = Some(price_sol * DEMO_SOL_PRICE);
        token.market_cap_usd = Some(market_cap);
        token.liquidity_usd = Some(market_cap * self.rng.gen_range(0.05..0.3));
        token.volume_24h_usd = Some(market_cap * self.rng.gen_range(0.1..3.0));
        token.price_change_24h = Some(self.rng.gen_range(-90.0..400.0));
        token.created_at = Some(self.now - Duration::minutes(age_minutes));
        token.bonding_curve_progress = Some(if graduated { 100.0 } else { progress });
        token.graduated = graduated;
        token
    }

    /// `n` tokens, newest first
    pub fn tokens(&mut self, n: usize) -> Vec<Token> {
        let mut tokens: Vec<Token> = (0..n)
            .map(|_| {
                let address = self.address();
                self.token(&address)
            })
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tokens
    }

    pub fn portfolio(&mut self, wallet: &str) -> WalletPortfolio {
        let sol_balance = self.rng.gen_range(0.1..250.0);
        let count = self.rng.gen_range(2..10);
        let mut holdings: Vec<Holding> = (0..count)
            .map(|_| {
                let mint = self.address();
                let token = self.token(&mint);
                let mut holding = Holding {
                    mint,
                    symbol: token.symbol,
                    name: token.name,
                    amount: self.rng.gen_range(1_000.0..50_000_000.0),
                    price_usd: token.price_usd,
                    value_usd: None,
                    image: None,
                };
                holding.revalue();
                holding
            })
            .collect();
        holdings.sort_by(|a, b| {
            b.value_usd
                .unwrap_or(0.0)
                .partial_cmp(&a.value_usd.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let tokens_value: f64 = holdings.iter().filter_map(|h| h.value_usd).sum();
        WalletPortfolio {
            address: wallet.to_string(),
            sol_balance,
            sol_price_usd: Some(DEMO_SOL_PRICE),
            holdings,
            total_value_usd: tokens_value + sol_balance * DEMO_SOL_PRICE,
            source: DataSource::Demo,
        }
    }

    /// `n` trades, most recent first
    pub fn wallet_trades(&mut self, wallet: &str, n: usize) -> Vec<WalletTrade> {
        let mut offset_secs = 0i64;
        (0..n)
            .map(|_| {
                offset_secs += self.rng.gen_range(5..1800);
                let mint = self.address();
                let (_, symbol) = self.name();
                WalletTrade {
                    signature: self.signature(),
                    wallet: wallet.to_string(),
                    side: if self.rng.gen_bool(0.55) { TradeSide::Buy } else { TradeSide::Sell },
                    token_mint: mint,
                    token_symbol: symbol,
                    token_amount: self.rng.gen_range(10_000.0..20_000_000.0),
                    value_usd: Some(self.rng.gen_range(5.0..5_000.0)),
                    timestamp: self.now - Duration::seconds(offset_secs),
                    source: DataSource::Demo,
                }
            })
            .collect()
    }

    /// `n` early buyers of a token launched at `launch`, earliest first
    pub fn snipers(&mut self, launch: DateTime<Utc>, n: usize) -> Vec<SniperEntry> {
        let mut entries: Vec<SniperEntry> = (0..n)
            .map(|_| {
                let secs = self.rng.gen_range(0..300);
                SniperEntry {
                    wallet: self.address(),
                    first_buy_at: launch + Duration::seconds(secs),
                    seconds_after_launch: Some(secs),
                    invested_usd: Some(self.rng.gen_range(20.0..3_000.0)),
                    holding: self.rng.gen_bool(0.4),
                    label: label_for(Some(secs)),
                }
            })
            .collect();
        entries.sort_by_key(|e| e.first_buy_at);
        entries
    }

    pub fn automations(&mut self, n: usize) -> Vec<Automation> {
        const KINDS: [AutomationKind; 5] = [
            AutomationKind::CopyTrade,
            AutomationKind::LimitOrder,
            AutomationKind::StopLoss,
            AutomationKind::TakeProfit,
            AutomationKind::DcaBuy,
        ];
        const STATUSES: [AutomationStatus; 4] = [
            AutomationStatus::Active,
            AutomationStatus::Paused,
            AutomationStatus::Completed,
            AutomationStatus::Failed,
        ];

        (0..n)
            .map(|_| {
                let kind = KINDS[self.rng.gen_range(0..KINDS.len())];
                let status = STATUSES[self.rng.gen_range(0..STATUSES.len())];
                let (_, symbol) = self.name();
                let trigger = match kind {
                    AutomationKind::CopyTrade => format!("Mirror wallet {}", &self.address()[..8]),
                    AutomationKind::LimitOrder => {
                        format!("Buy {} at ${:.6}", symbol, self.rng.gen_range(0.000_01..0.01))
                    }
                    AutomationKind::StopLoss => {
                        format!("Sell {} at -{}%", symbol, self.rng.gen_range(10..60))
                    }
                    AutomationKind::TakeProfit => {
                        format!("Sell {} at +{}%", symbol, self.rng.gen_range(50..1000))
                    }
                    AutomationKind::DcaBuy => {
                        format!("Buy {} every {}h", symbol, self.rng.gen_range(1..24))
                    }
                };
                let created_at = self.now - Duration::hours(self.rng.gen_range(1..24 * 30));
                let executions = self.rng.gen_range(0..40);
                let last_run = (executions > 0)
                    .then(|| self.now - Duration::minutes(self.rng.gen_range(1..600)));
                Automation {
                    id: uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid().to_string(),
                    name: format!("{} {}", symbol, kind_label(kind)),
                    kind,
                    status,
                    trigger,
                    executions,
                    last_run,
                    created_at,
                }
            })
            .collect()
    }
}

fn kind_label(kind: AutomationKind) -> &'static str {
    match kind {
        AutomationKind::CopyTrade => "copy trade",
        AutomationKind::LimitOrder => "limit order",
        AutomationKind::StopLoss => "stop loss",
        AutomationKind::TakeProfit => "take profit",
        AutomationKind::DcaBuy => "DCA",
    }
}
