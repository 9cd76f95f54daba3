//! Providers Module - External Data Sources
//!
//! HTTP clients for DexScreener, pump.fun, Moralis, Jupiter and SolanaTracker
//! (all sharing one `HttpClient`), plus the PumpPortal WebSocket relay.

pub mod dexscreener;
pub mod http;
pub mod jupiter;
pub mod moralis;
pub mod pumpfun;
pub mod solanatracker;
pub mod websocket;

pub use dexscreener::DexScreenerClient;
pub use http::{HttpClient, UpstreamStats};
pub use jupiter::JupiterClient;
pub use moralis::MoralisClient;
pub use pumpfun::PumpFunClient;
pub use solanatracker::SolanaTrackerClient;
pub use websocket::{PumpLiveRelay, RelayEvent, RelayEventKind};
