//! Models Module - Data Structures & Configuration
//!
//! Token/wallet schema shared by every provider, the error type, and
//! environment configuration.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
