//! Core Module - Aggregation Logic
//!
//! Fallback chains over the providers, scanner filtering, portfolio
//! valuation and sniper labelling.

pub mod aggregator;
pub mod portfolio;
pub mod scanner;
pub mod sniper;

pub use aggregator::{Providers, Sourced, TokenService};
pub use portfolio::PortfolioService;
pub use scanner::{scan, ScannerQuery};
pub use sniper::{label_for, SniperReport, SniperService};
