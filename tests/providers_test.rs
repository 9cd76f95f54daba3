//! Provider client tests against a local fake upstream
//!
//! Every test binds an axum app on 127.0.0.1:0 and points the client at it.
//! Nothing here reaches the network.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use tokenscope::models::errors::ErrorCode;
use tokenscope::providers::http::Request;
use tokenscope::providers::{
    DexScreenerClient, HttpClient, JupiterClient, PumpFunClient, SolanaTrackerClient,
};
use tokenscope::utils::retry::RetryPolicy;
use tokenscope::{AppError, DataSource};

const MINT_A: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const MINT_B: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
const SOL: &str = "So11111111111111111111111111111111111111112";

async fn spawn_upstream(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fake_request(base: &str, path: &str) -> Request<'static> {
    Request::get("fake", format!("{}{}", base, path), Duration::from_secs(5))
}

fn http(attempts: u32) -> HttpClient {
    HttpClient::new(RetryPolicy::new(attempts, Duration::ZERO)).unwrap()
}

fn pair(base: &str, symbol: &str, liquidity: f64, price: &str) -> Value {
    json!({
        "chainId": "solana",
        "dexId": "raydium",
        "pairAddress": format!("pair-{}-{}", symbol, liquidity),
        "baseToken": {"address": base, "name": format!("{} Token", symbol), "symbol": symbol},
        "quoteToken": {"address": SOL, "name": "Wrapped SOL", "symbol": "SOL"},
        "liquidity": {"usd": liquidity},
        "priceUsd": price,
        "priceNative": "0.0001",
        "marketCap": 1_000_000.0,
        "pairCreatedAt": 1_700_000_000_000i64
    })
}

// ============================================
// HttpClient retry + stats
// ============================================

#[tokio::test]
async fn test_http_retries_server_errors_then_succeeds() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/flaky",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})))
                } else {
                    (StatusCode::OK, Json(json!({"ok": true})))
                }
            }),
        )
        .with_state(hits.clone());
    let base = spawn_upstream(app).await;

    let client = http(3);
    let body: Value = client
        .get_json(fake_request(&base, "/flaky"))
        .await
        .unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let stats = client.stats().get("fake").unwrap();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn test_http_does_not_retry_client_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/missing",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NOT_FOUND
            }),
        )
        .with_state(hits.clone());
    let base = spawn_upstream(app).await;

    let client = http(3);
    let err = client
        .get_json::<Value>(fake_request(&base, "/missing"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::UpstreamRejected);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(client.stats().get("fake").unwrap().failures, 1);
}

#[tokio::test]
async fn test_http_rate_limit_is_retryable_and_reported() {
    let app = Router::new().route("/limited", get(|| async { StatusCode::TOO_MANY_REQUESTS }));
    let base = spawn_upstream(app).await;

    let err = http(2)
        .get_json::<Value>(fake_request(&base, "/limited"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UpstreamRateLimited);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_http_invalid_json() {
    let app = Router::new().route("/garbage", get(|| async { "<html>not json</html>" }));
    let base = spawn_upstream(app).await;

    let err = http(1)
        .get_json::<Vec<Value>>(fake_request(&base, "/garbage"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UpstreamInvalidResponse);
}

// ============================================
// pump.fun
// ============================================

#[tokio::test]
async fn test_pumpfun_latest_sends_query_and_reshapes() {
    let app = Router::new().route(
        "/coins",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            assert_eq!(q.get("sort").map(String::as_str), Some("created_timestamp"));
            assert_eq!(q.get("order").map(String::as_str), Some("DESC"));
            Json(json!([
                {
                    "mint": MINT_A, "name": "Frog", "symbol": "FROG",
                    "created_timestamp": 1_700_000_000_000i64,
                    "complete": false,
                    "virtual_sol_reserves": 30_000_000_000u64,
                    "virtual_token_reserves": 1_073_000_000_000_000u64,
                    "usd_market_cap": 5_000.0,
                    "total_supply": 1_000_000_000_000_000u64
                },
                {
                    "mint": MINT_B, "name": "Cat", "symbol": "CAT",
                    "complete": true,
                    "usd_market_cap": "90000.5"
                }
            ]))
        }),
    );
    let base = spawn_upstream(app).await;

    let tokens = PumpFunClient::new(http(1), base).latest_coins(10).await.unwrap();
    assert_eq!(tokens.len(), 2);

    let frog = &tokens[0];
    assert_eq!(frog.source, DataSource::PumpFun);
    assert!(!frog.graduated);
    assert!(frog.bonding_curve_progress.unwrap() < 1.0);
    assert!((frog.price_usd.unwrap() - 5_000.0 / 1_000_000_000.0).abs() < 1e-12);

    let cat = &tokens[1];
    assert!(cat.graduated);
    assert_eq!(cat.bonding_curve_progress, Some(100.0));
    assert_eq!(cat.market_cap_usd, Some(90_000.5));
}

// ============================================
// DexScreener
// ============================================

#[tokio::test]
async fn test_dexscreener_trending_resolves_boosts_to_best_pairs() {
    let app = Router::new()
        .route(
            "/token-boosts/top/v1",
            get(|| async {
                Json(json!([
                    {"chainId": "solana", "tokenAddress": MINT_B, "totalAmount": 500, "icon": "b.png"},
                    {"chainId": "ethereum", "tokenAddress": "0xabc", "totalAmount": 900},
                    {"chainId": "solana", "tokenAddress": MINT_A, "totalAmount": 100}
                ]))
            }),
        )
        .route(
            "/latest/dex/tokens/:addresses",
            get(|Path(addresses): Path<String>| async move {
                let requested: Vec<&str> = addresses.split(',').collect();
                assert_eq!(requested.len(), 2);
                Json(json!({
                    "pairs": [
                        pair(MINT_A, "AAA", 1_000.0, "0.10"),
                        pair(MINT_A, "AAA", 50_000.0, "0.11"),
                        pair(MINT_B, "BBB", 7_000.0, "2.5")
                    ]
                }))
            }),
        );
    let base = spawn_upstream(app).await;

    let tokens = DexScreenerClient::new(http(1), base).trending(10).await.unwrap();
    let addrs: Vec<&str> = tokens.iter().map(|t| t.address.as_str()).collect();
    // Boost order kept, non-Solana listings dropped
    assert_eq!(addrs, vec![MINT_B, MINT_A]);
    // Deepest pool wins
    assert_eq!(tokens[1].liquidity_usd, Some(50_000.0));
    assert_eq!(tokens[1].price_usd, Some(0.11));
    assert!(tokens.iter().all(|t| t.source == DataSource::DexScreener));
}

#[tokio::test]
async fn test_dexscreener_token_none_without_pairs() {
    let app = Router::new().route(
        "/latest/dex/tokens/:addresses",
        get(|| async { Json(json!({"pairs": null})) }),
    );
    let base = spawn_upstream(app).await;

    let token = DexScreenerClient::new(http(1), base).token(MINT_A).await.unwrap();
    assert!(token.is_none());
}

// ============================================
// Jupiter
// ============================================

#[tokio::test]
async fn test_jupiter_prices_skip_nulls_and_send_key() {
    let app = Router::new().route(
        "/price/v3",
        get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
            assert_eq!(headers.get("x-api-key").and_then(|v| v.to_str().ok()), Some("jup-key"));
            let ids = q.get("ids").cloned().unwrap_or_default();
            assert!(ids.contains(MINT_A) && ids.contains(MINT_B));
            Json(json!({
                MINT_A: {"usdPrice": 0.9998, "priceChange24h": 0.01},
                MINT_B: null
            }))
        }),
    );
    let base = spawn_upstream(app).await;

    let client = JupiterClient::new(http(1), base, Some("jup-key".into()));
    let prices = client
        .prices(&[MINT_A.to_string(), MINT_B.to_string()])
        .await
        .unwrap();
    assert_eq!(prices.len(), 1);
    assert_eq!(prices.get(MINT_A), Some(&0.9998));
}

// ============================================
// SolanaTracker
// ============================================

#[tokio::test]
async fn test_solanatracker_first_buyers_with_key() {
    let app = Router::new().route(
        "/first-buyers/:mint",
        get(|headers: HeaderMap, Path(mint): Path<String>| async move {
            if headers.get("x-api-key").is_none() {
                return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no key"})));
            }
            assert_eq!(mint, MINT_A);
            (
                StatusCode::OK,
                Json(json!([
                    {"wallet": "w1", "first_buy_time": 1_700_000_005_000i64, "total_invested": 120.0, "held": 10.0},
                    {"wallet": "w2", "first_buy_time": 1_700_000_030_000i64, "held": 0}
                ])),
            )
        }),
    );
    let base = spawn_upstream(app).await;

    let client = SolanaTrackerClient::new(http(1), base, Some("st-key".into()));
    assert!(client.is_configured());
    let buyers = client.first_buyers(MINT_A).await.unwrap();
    assert_eq!(buyers.len(), 2);
    assert!(buyers[0].still_holding());
    assert!(!buyers[1].still_holding());
}

#[tokio::test]
async fn test_solanatracker_without_key_is_skipped() {
    // Unroutable base: the call must fail before any request is made
    let client = SolanaTrackerClient::new(http(1), "http://127.0.0.1:9", None);
    assert!(!client.is_configured());
    let err = client.trending(5).await.unwrap_err();
    let app_err = AppError::from(err);
    assert_eq!(app_err.code, ErrorCode::ConfigMissingApiKey);
}

// ============================================
// PumpPortal relay
// ============================================

/// Local PumpPortal: reports the subscribe methods it receives, then sends
/// `frames` and holds the socket open
async fn spawn_pumpportal(
    frames: Vec<String>,
) -> (String, tokio::sync::oneshot::Receiver<Vec<String>>) {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (methods_tx, methods_rx) = tokio::sync::oneshot::channel::<Vec<String>>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut methods = Vec::new();
        while methods.len() < 2 {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let v: Value = serde_json::from_str(&text).unwrap();
                    methods.push(v["method"].as_str().unwrap_or_default().to_string());
                }
                Some(Ok(_)) => {}
                _ => return,
            }
        }
        let _ = methods_tx.send(methods);

        for frame in frames {
            if ws.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
        // Hold the socket open until the test ends
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    (format!("ws://{}", addr), methods_rx)
}

#[tokio::test]
async fn test_relay_subscribes_and_fans_out() {
    use tokenscope::{PumpLiveRelay, RelayEventKind};

    let create = json!({"signature": "sig1", "mint": MINT_A, "txType": "create", "symbol": "FROG"});
    let (url, methods_rx) = spawn_pumpportal(vec![create.to_string()]).await;

    let relay = Arc::new(PumpLiveRelay::new(url, 16));
    let mut rx = relay.subscribe();
    let handle = relay.spawn().unwrap();
    assert!(relay.spawn().is_none());

    let methods = tokio::time::timeout(Duration::from_secs(2), methods_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(methods, vec!["subscribeNewToken", "subscribeMigration"]);

    let mut kinds = Vec::new();
    while kinds.len() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if event.kind == RelayEventKind::NewToken {
            assert_eq!(event.payload["symbol"], "FROG");
        }
        kinds.push(event.kind);
    }
    assert_eq!(kinds, vec![RelayEventKind::Status, RelayEventKind::NewToken]);
    assert!(relay.is_connected());
    assert_eq!(relay.stats().messages, 1);

    handle.abort();
}

#[tokio::test]
async fn test_relay_survives_multibyte_frame_under_debug_logging() {
    use tokenscope::{PumpLiveRelay, RelayEventKind};

    // Debug logging formats a preview of every frame
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();
    let _log = tracing::subscriber::set_default(subscriber);

    // The frog emoji occupies bytes 198..202 of the serialized frame
    let emoji_frame = format!(r#"{{"txType":"create","name":"{}🐸"}}"#, "a".repeat(171));
    assert!(!emoji_frame.is_char_boundary(200));
    let follow_up = json!({"txType": "buy", "mint": MINT_A}).to_string();
    let (url, _methods) = spawn_pumpportal(vec![emoji_frame, follow_up]).await;

    let relay = Arc::new(PumpLiveRelay::new(url, 16));
    let mut rx = relay.subscribe();
    let handle = relay.spawn().unwrap();

    let mut kinds = Vec::new();
    while kinds.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if event.kind == RelayEventKind::NewToken {
            assert!(event.payload["name"].as_str().unwrap().ends_with('🐸'));
        }
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![RelayEventKind::Status, RelayEventKind::NewToken, RelayEventKind::Trade]
    );
    assert!(!handle.is_finished());
    assert_eq!(relay.stats().messages, 2);

    handle.abort();
}
