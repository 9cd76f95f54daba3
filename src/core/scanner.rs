//! Scanner: filter and sort a token feed
//!
//! `ScannerQuery` is the dashboard's filter/sort state sent as query
//! parameters. Filters on a field exclude tokens that lack that field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Token;
use crate::utils::cache::FeedKind;
use crate::utils::constants::clamp_limit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    MarketCap,
    Liquidity,
    Volume,
    PriceChange,
    Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerQuery {
    pub min_liquidity: Option<f64>,
    pub max_liquidity: Option<f64>,
    pub min_market_cap: Option<f64>,
    pub max_market_cap: Option<f64>,
    pub max_age_minutes: Option<i64>,
    /// Some(true): graduated only, Some(false): still on the curve
    pub graduated: Option<bool>,
    /// Case-insensitive match on symbol/name, or address prefix
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub order: SortOrder,
    pub limit: Option<usize>,
    #[serde(default)]
    pub feed: FeedKind,
}

fn check_range(name: &str, min: Option<f64>, max: Option<f64>) -> AppResult<()> {
    for v in [min, max].into_iter().flatten() {
        if !v.is_finite() || v < 0.0 {
            return Err(AppError::bad_request(format!("{} must be a non-negative number", name)));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::bad_request(format!("{}: min is greater than max", name)));
        }
    }
    Ok(())
}

fn in_range(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    match value {
        Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
        None => false,
    }
}

impl ScannerQuery {
    pub fn validate(&self) -> AppResult<()> {
        check_range("liquidity", self.min_liquidity, self.max_liquidity)?;
        check_range("market_cap", self.min_market_cap, self.max_market_cap)?;
        if matches!(self.max_age_minutes, Some(m) if m < 0) {
            return Err(AppError::bad_request("max_age_minutes must be >= 0"));
        }
        Ok(())
    }

    fn matches(&self, token: &Token, now: DateTime<Utc>) -> bool {
        if !in_range(token.liquidity_usd, self.min_liquidity, self.max_liquidity) {
            return false;
        }
        if !in_range(token.market_cap_usd, self.min_market_cap, self.max_market_cap) {
            return false;
        }
        if let Some(max_age) = self.max_age_minutes {
            match token.age_minutes(now) {
                Some(age) if age <= max_age => {}
                _ => return false,
            }
        }
        if let Some(graduated) = self.graduated {
            if token.graduated != graduated {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = token.symbol.to_lowercase().contains(&needle)
                || token.name.to_lowercase().contains(&needle)
                || token.address.starts_with(search);
            if !hit {
                return false;
            }
        }
        true
    }

    fn sort_value(&self, token: &Token) -> Option<f64> {
        match self.sort {
            SortKey::Newest => token.created_at.map(|t| t.timestamp_millis() as f64),
            SortKey::MarketCap => token.market_cap_usd,
            SortKey::Liquidity => token.liquidity_usd,
            SortKey::Volume => token.volume_24h_usd,
            SortKey::PriceChange => token.price_change_24h,
            SortKey::Progress => token.bonding_curve_progress,
        }
    }
}

/// Filter, sort (missing values last in either order), truncate
pub fn scan(tokens: &[Token], query: &ScannerQuery, now: DateTime<Utc>) -> Vec<Token> {
    let mut out: Vec<Token> = tokens
        .iter()
        .filter(|t| query.matches(t, now))
        .cloned()
        .collect();

    out.sort_by(|a, b| match (query.sort_value(a), query.sort_value(b)) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    out.truncate(clamp_limit(query.limit));
    out
}
