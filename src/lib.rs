//! TokenScope Library
//!
//! Solana token market-data aggregator behind a trading dashboard:
//! - New and trending token feeds from pump.fun, Moralis, DexScreener and
//!   SolanaTracker, with a demo-data fallback
//! - Token detail, search and Jupiter prices
//! - Scanner filters, sniper labels, wallet portfolio and trade history
//! - SSE streams over the feed cache and the PumpPortal WebSocket

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    PortfolioService, Providers, ScannerQuery, SniperService, Sourced, TokenService,
};
pub use models::{AppConfig, AppError, AppResult, DataSource, ErrorCode, Token};
pub use providers::{PumpLiveRelay, RelayEvent, RelayEventKind};
pub use utils::{FeedKind, TokenFeedCache};
