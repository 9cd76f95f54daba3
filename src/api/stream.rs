//! Server-Sent-Events routes
//!
//! - `/api/stream/tokens`: polls the feed cache every `interval_ms`
//!   (clamped 10..=60000) and sends a `tokens` frame when the snapshot
//!   version changed. The first frame is always sent. Idle periods carry
//!   keep-alive comments only.
//! - `/api/pump-live`: one `status` frame, then every relay event under its
//!   own event name. A subscriber that falls behind gets a `lagged` frame
//!   with the number of skipped events.
//!
//! Both streams end when the client disconnects and the stream is dropped.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::handlers::{parse_query, AppState};
use super::types::StreamQuery;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{DataSource, Token};
use crate::providers::websocket::RelayEvent;
use crate::utils::cache::{FeedKind, FeedSnapshot, TokenFeedCache};
use crate::utils::constants::clamp_stream_interval;

const KEEP_ALIVE_SECS: u64 = 15;

/// One `tokens` frame
#[derive(Debug, Serialize)]
pub struct FeedFrame<'a> {
    pub feed: FeedKind,
    pub version: u64,
    pub source: DataSource,
    pub demo: bool,
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub tokens: &'a [Token],
}

impl<'a> From<&'a FeedSnapshot> for FeedFrame<'a> {
    fn from(snapshot: &'a FeedSnapshot) -> Self {
        Self {
            feed: snapshot.kind,
            version: snapshot.version,
            source: snapshot.source,
            demo: snapshot.source.is_demo(),
            updated_at: snapshot.updated_at,
            count: snapshot.tokens.len(),
            tokens: &snapshot.tokens,
        }
    }
}

fn feed_event(snapshot: &FeedSnapshot) -> Event {
    let event = Event::default()
        .event("tokens")
        .id(snapshot.version.to_string());
    match event.json_data(FeedFrame::from(snapshot)) {
        Ok(event) => event,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

fn relay_event(event: &RelayEvent) -> Event {
    match Event::default().event(event.kind.as_str()).json_data(&event.payload) {
        Ok(event) => event,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(KEEP_ALIVE_SECS))
        .text("keep-alive")
}

/// Poll the cache; yield only snapshots whose version differs from the last one sent
pub fn feed_stream(
    cache: Arc<TokenFeedCache>,
    feed: FeedKind,
    interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold((cache, ticker, None::<u64>), move |(cache, mut ticker, last)| async move {
        loop {
            ticker.tick().await;
            let snapshot = cache.snapshot(feed);
            if last != Some(snapshot.version) {
                let event = feed_event(&snapshot);
                return Some((Ok(event), (cache, ticker, Some(snapshot.version))));
            }
        }
    })
}

/// GET /api/stream/tokens?interval_ms=&feed=
pub async fn stream_tokens(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let query = parse_query(query)?;
    let requested = query
        .interval_ms
        .unwrap_or(state.config.stream_interval.as_millis() as u64);
    let interval = clamp_stream_interval(requested);

    info!(
        "📡 Token stream opened: feed={}, every {}ms",
        query.feed.as_str(),
        interval.as_millis()
    );
    let stream = feed_stream(state.feed_cache.clone(), query.feed, interval);
    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

/// GET /api/pump-live
pub async fn pump_live(
    State(state): State<Arc<AppState>>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if !state.config.pump_live_enabled || !state.relay.is_started() {
        return Err(AppError::relay_unavailable());
    }

    let rx = state.relay.subscribe();
    info!("📡 Pump live subscriber joined ({} total)", state.relay.subscriber_count());

    let status = serde_json::json!({
        "connected": state.relay.is_connected(),
        "subscribers": state.relay.subscriber_count(),
    });
    let first = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("status").data(status.to_string()))
    });

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Ok(relay_event(&event)), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("🐢 Pump live subscriber lagged by {}", skipped);
                    let event = Event::default()
                        .event("lagged")
                        .data(serde_json::json!({ "skipped": skipped }).to_string());
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(first.chain(events)).keep_alive(keep_alive()))
}
