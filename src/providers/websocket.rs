//! PumpPortal WebSocket relay
//!
//! One upstream connection to PumpPortal shared by every `/api/pump-live`
//! client. Frames are parsed to JSON, tagged, and fanned out on a
//! `broadcast` channel; slow subscribers lag instead of blocking the reader.
//!
//! Subscriptions sent on every (re)connect:
//! - subscribeNewToken: token creation events
//! - subscribeMigration: bonding-curve graduation events
//!
//! Reconnects with exponential backoff capped at 30s and never gives up
//! while the task is alive.

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

// ============================================
// WEBSOCKET CONSTANTS
// ============================================

/// Reconnection base delay (milliseconds)
const WS_RECONNECT_BASE_MS: u64 = 1000;

/// Maximum reconnection delay (milliseconds)
const WS_RECONNECT_MAX_MS: u64 = 30000;

/// Client ping interval (seconds)
const WS_PING_INTERVAL_SECS: u64 = 30;

/// Characters of each frame shown in debug logs
const WS_LOG_PREVIEW_CHARS: usize = 200;

// ============================================
// EVENT TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayEventKind {
    NewToken,
    Migration,
    Trade,
    /// Acks and anything unrecognised
    Message,
    /// Connection state change emitted by the relay itself
    Status,
}

impl RelayEventKind {
    /// SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayEventKind::NewToken => "new_token",
            RelayEventKind::Migration => "migration",
            RelayEventKind::Trade => "trade",
            RelayEventKind::Message => "message",
            RelayEventKind::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayEvent {
    pub kind: RelayEventKind,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl RelayEvent {
    fn status(connected: bool, detail: &str) -> Self {
        Self {
            kind: RelayEventKind::Status,
            payload: serde_json::json!({ "connected": connected, "detail": detail }),
            received_at: Utc::now(),
        }
    }
}

/// First `max_chars` characters of a frame, cut on a char boundary
fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

/// Tag an upstream text frame. Non-JSON frames are dropped.
pub fn classify(text: &str) -> Option<RelayEvent> {
    let payload: serde_json::Value = serde_json::from_str(text).ok()?;

    let tx_type = payload
        .get("txType")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase());

    let kind = match tx_type.as_deref() {
        Some("create") => RelayEventKind::NewToken,
        Some("migrate") | Some("migration") => RelayEventKind::Migration,
        Some("buy") | Some("sell") => RelayEventKind::Trade,
        _ if payload.get("pool").is_some() && payload.get("signature").is_some() => {
            RelayEventKind::Migration
        }
        _ => RelayEventKind::Message,
    };

    Some(RelayEvent {
        kind,
        payload,
        received_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayStats {
    pub enabled: bool,
    pub connected: bool,
    pub subscribers: usize,
    pub messages: u64,
    pub reconnects: u64,
}

// ============================================
// RELAY
// ============================================

pub struct PumpLiveRelay {
    url: String,
    tx: broadcast::Sender<RelayEvent>,
    is_connected: Arc<AtomicBool>,
    started: AtomicBool,
    messages: AtomicU64,
    reconnects: AtomicU64,
}

impl PumpLiveRelay {
    pub fn new(url: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            url: url.into(),
            tx,
            is_connected: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            messages: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            enabled: self.is_started(),
            connected: self.is_connected(),
            subscribers: self.subscriber_count(),
            messages: self.messages.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }

    /// Start the upstream loop. Returns None if already started.
    pub fn spawn(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }
        let relay = self.clone();
        Some(tokio::spawn(async move { relay.run().await }))
    }

    /// Fan an event out; no subscribers is not an error
    fn publish(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }

    async fn run(&self) {
        let mut reconnect_delay = WS_RECONNECT_BASE_MS;

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("🔌 PumpPortal connected ({})", self.url);
                    self.is_connected.store(true, Ordering::SeqCst);
                    reconnect_delay = WS_RECONNECT_BASE_MS;
                    self.publish(RelayEvent::status(true, "connected"));

                    let (mut write, mut read) = ws_stream.split();

                    let mut subscribed = true;
                    for method in ["subscribeNewToken", "subscribeMigration"] {
                        let msg = serde_json::json!({ "method": method });
                        if let Err(e) = write.send(Message::Text(msg.to_string())).await {
                            error!("❌ Failed to send {}: {}", method, e);
                            subscribed = false;
                            break;
                        }
                    }

                    if subscribed {
                        let mut ping =
                            tokio::time::interval(Duration::from_secs(WS_PING_INTERVAL_SECS));
                        ping.tick().await;

                        loop {
                            tokio::select! {
                                msg = read.next() => match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        let shown = preview(&text, WS_LOG_PREVIEW_CHARS);
                                        debug!("📨 WS message: {}", shown);
                                        if let Some(event) = classify(&text) {
                                            self.messages.fetch_add(1, Ordering::Relaxed);
                                            self.publish(event);
                                        }
                                    }
                                    Some(Ok(Message::Ping(data))) => {
                                        let _ = write.send(Message::Pong(data)).await;
                                    }
                                    Some(Ok(Message::Close(_))) | None => {
                                        warn!("🔌 PumpPortal closed the connection");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        error!("❌ WebSocket error: {}", e);
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                },
                                _ = ping.tick() => {
                                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                                        warn!("⚠️ Ping failed, reconnecting");
                                        break;
                                    }
                                }
                            }
                        }
                    }

                    self.is_connected.store(false, Ordering::SeqCst);
                    self.publish(RelayEvent::status(false, "disconnected"));
                }
                Err(e) => {
                    error!("❌ PumpPortal connection failed: {}", e);
                }
            }

            self.reconnects.fetch_add(1, Ordering::Relaxed);
            warn!("🔄 Reconnecting to PumpPortal in {}ms", reconnect_delay);
            tokio::time::sleep(Duration::from_millis(reconnect_delay)).await;

            // Exponential backoff with cap
            reconnect_delay = (reconnect_delay * 2).min(WS_RECONNECT_MAX_MS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_new_token() {
        let frame = r#"{"signature":"s","mint":"M","txType":"create","name":"Frog","symbol":"FROG"}"#;
        let e = classify(frame).unwrap();
        assert_eq!(e.kind, RelayEventKind::NewToken);
        assert_eq!(e.payload["symbol"], "FROG");
    }

    #[test]
    fn test_classify_trade_and_migration() {
        let buy = classify(r#"{"txType":"buy","mint":"M"}"#).unwrap();
        assert_eq!(buy.kind, RelayEventKind::Trade);
        let migrate = classify(r#"{"txType":"migrate","mint":"M"}"#).unwrap();
        assert_eq!(migrate.kind, RelayEventKind::Migration);
        assert_eq!(
            classify(r#"{"signature":"s","mint":"M","pool":"raydium"}"#).unwrap().kind,
            RelayEventKind::Migration
        );
    }

    #[test]
    fn test_classify_ack_and_garbage() {
        let ack = r#"{"message":"Successfully subscribed to token creation events."}"#;
        let ack = classify(ack).unwrap();
        assert_eq!(ack.kind, RelayEventKind::Message);
        assert!(classify("not json").is_none());
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        // 198 ASCII bytes then a 4-byte emoji spanning byte 200
        let text = format!("{}🐸tail", "a".repeat(198));
        let cut = preview(&text, 199);
        assert_eq!(cut.chars().count(), 199);
        assert!(cut.ends_with('🐸'));

        assert_eq!(preview(&text, WS_LOG_PREVIEW_CHARS).chars().count(), 200);
        assert_eq!(preview("short", WS_LOG_PREVIEW_CHARS), "short");
        assert_eq!(preview("", 3), "");
    }

    #[tokio::test]
    async fn test_spawn_once_and_subscriber_count() {
        // Port 9 on localhost refuses connections; the loop just keeps retrying
        let relay = Arc::new(PumpLiveRelay::new("ws://127.0.0.1:9", 16));
        assert!(!relay.is_started());
        let _rx1 = relay.subscribe();
        let _rx2 = relay.subscribe();
        assert_eq!(relay.subscriber_count(), 2);

        let handle = relay.spawn().unwrap();
        assert!(relay.spawn().is_none());
        assert!(relay.stats().enabled);
        handle.abort();
    }
}
