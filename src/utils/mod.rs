//! Utils Module - Helper Functions & Shared Utilities

pub mod cache;
pub mod constants;
pub mod mock;
pub mod retry;

pub use cache::*;
pub use constants::*;
pub use mock::{seed_from_str, MockFactory};
pub use retry::{retry, RetryPolicy};
