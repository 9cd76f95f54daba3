//! Router tests
//!
//! The real router is driven with `oneshot`. Demo-config tests make no
//! outbound calls; live-config tests point every provider at a local fake
//! upstream bound to 127.0.0.1:0.

use axum::{
    body::{to_bytes, Body, BodyDataStream},
    extract::Path,
    http::{header, Method, Request, StatusCode},
    response::IntoResponse,
    routing::{get, MethodRouter},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use tokenscope::api::{create_router, AppState};
use tokenscope::models::config::{ApiKeys, Endpoints, RetryConfig};
use tokenscope::utils::cache::FeedKind;
use tokenscope::{AppConfig, DataSource, PumpLiveRelay, Token};

const MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
const SOL: &str = "So11111111111111111111111111111111111111112";
const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
const JUP: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";

fn demo_state() -> Arc<AppState> {
    Arc::new(AppState::new(AppConfig::demo()).unwrap())
}

fn live_config(base: &str) -> AppConfig {
    AppConfig {
        demo_mode: false,
        pump_live_enabled: false,
        retry: RetryConfig {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        },
        endpoints: Endpoints::all_at(base),
        ..AppConfig::default()
    }
}

/// Live config with Moralis and SolanaTracker keys set
fn keyed_config(base: &str) -> AppConfig {
    AppConfig {
        keys: ApiKeys {
            moralis: Some("test-moralis".into()),
            solana_tracker: Some("test-tracker".into()),
            jupiter: None,
        },
        ..live_config(base)
    }
}

async fn spawn_upstream(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn send(
    state: Arc<AppState>,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = create_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(state, request).await;
    (status, body)
}

// ============================================
// Health, envelope, validation
// ============================================

#[tokio::test]
async fn test_health_both_paths() {
    let state = demo_state();
    for uri in ["/health", "/api/health"] {
        let (status, body) = get_json(state.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["demo_mode"], true);
        assert!(body["meta"]["timestamp"].is_i64());
    }
}

#[tokio::test]
async fn test_demo_feeds_flag_meta() {
    let (status, body) = get_json(demo_state(), "/api/tokens/new?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["meta"]["demo"], true);
    assert_eq!(body["meta"]["source"], "demo");
    assert_eq!(body["meta"]["count"], 5);

    let (_, body) = get_json(demo_state(), "/api/tokens/trending?limit=500").await;
    // Limit clamps to the feed maximum
    assert_eq!(body["data"].as_array().unwrap().len(), 200);
}

#[tokio::test]
async fn test_feed_served_from_cache() {
    let state = demo_state();
    let mut token = Token::new(MINT, "USDC", "USD Coin", DataSource::DexScreener);
    token.price_usd = Some(1.0);
    state.feed_cache.store(FeedKind::Trending, vec![token], DataSource::DexScreener);

    let (_, body) = get_json(state.clone(), "/api/tokens/trending").await;
    assert_eq!(body["meta"]["cached"], true);
    assert_eq!(body["meta"]["demo"], false);
    assert_eq!(body["meta"]["source"], "dexscreener");
    assert_eq!(body["data"][0]["address"], MINT);

    let (_, body) = get_json(state, "/api/tokens/trending?fresh=true").await;
    assert_eq!(body["meta"]["cached"], false);
    assert_eq!(body["meta"]["demo"], true);
}

#[tokio::test]
async fn test_cached_feed_smaller_than_limit_goes_live() {
    let state = demo_state();
    let tokens: Vec<Token> = (0..50)
        .map(|i| Token::new(format!("Mint{:040}", i), "T", "Token", DataSource::PumpFun))
        .collect();
    state
        .feed_cache
        .store_requested(FeedKind::New, tokens, DataSource::PumpFun, 50);

    // Within what the refresher asked for: served from the snapshot
    let (_, body) = get_json(state.clone(), "/api/tokens/new?limit=30").await;
    assert_eq!(body["meta"]["cached"], true);
    assert_eq!(body["meta"]["source"], "pumpfun");
    assert_eq!(body["data"].as_array().unwrap().len(), 30);

    // Larger than the snapshot: fetched instead of truncated
    let (_, body) = get_json(state.clone(), "/api/tokens/new?limit=150").await;
    assert_eq!(body["meta"]["cached"], false);
    assert_eq!(body["data"].as_array().unwrap().len(), 150);
    assert_eq!(body["meta"]["count"], 150);

    // A short upstream list fetched at the full size still counts as complete
    let few = vec![Token::new(MINT, "USDC", "USD Coin", DataSource::PumpFun)];
    state.feed_cache.store(FeedKind::New, few, DataSource::PumpFun);
    let (_, body) = get_json(state, "/api/tokens/new?limit=150").await;
    assert_eq!(body["meta"]["cached"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_input_returns_400_envelope() {
    let state = demo_state();
    for uri in [
        "/api/tokens/new?limit=abc",
        "/api/tokens/not-a-mint",
        "/api/tokens/search?q=",
        "/api/prices",
        "/api/scanner?min_market_cap=10&max_market_cap=1",
        "/api/wallet/0xdeadbeef/portfolio",
        "/api/sniper/short",
    ] {
        let (status, body) = get_json(state.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false, "{}", uri);
        assert_eq!(body["error"]["code"], "API_BAD_REQUEST", "{}", uri);
    }
}

// ============================================
// Dashboard views (demo)
// ============================================

#[tokio::test]
async fn test_scanner_sorts_and_limits() {
    let uri = "/api/scanner?sort=market_cap&order=asc&limit=4";
    let (status, body) = get_json(demo_state(), uri).await;
    assert_eq!(status, StatusCode::OK);
    let caps: Vec<f64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["market_cap_usd"].as_f64().unwrap_or(f64::MAX))
        .collect();
    assert_eq!(caps.len(), 4);
    assert!(caps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_wallet_and_sniper_demo() {
    let state = demo_state();

    let uri = format!("/api/wallet/{}/portfolio", WALLET);
    let (status, body) = get_json(state.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["address"], WALLET);
    assert_eq!(body["meta"]["demo"], true);

    let uri = format!("/api/wallet/{}/trades?limit=7", WALLET);
    let (_, body) = get_json(state.clone(), &uri).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 7);

    let (_, body) = get_json(state.clone(), &format!("/api/sniper/{}?limit=20", MINT)).await;
    let report = &body["data"];
    assert_eq!(report["mint"], MINT);
    let total = report["snipers"].as_u64().unwrap()
        + report["early"].as_u64().unwrap()
        + report["regular"].as_u64().unwrap();
    assert_eq!(total as usize, report["entries"].as_array().unwrap().len());

    let (_, body) = get_json(state, "/api/automations").await;
    assert!(!body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["meta"]["demo"], true);
}

#[tokio::test]
async fn test_preferences_validate() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/preferences/validate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"volume": 2.5, "theme": "light", "watchlist": [" A ", "A", ""]}).to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(demo_state(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["adjusted"], true);
    assert_eq!(body["data"]["preferences"]["volume"], 1.0);
    assert_eq!(body["data"]["preferences"]["watchlist"], json!(["A"]));

    let bad = Request::builder()
        .method(Method::POST)
        .uri("/api/preferences/validate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(demo_state(), bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "API_BAD_REQUEST");
}

#[tokio::test]
async fn test_stats_shape() {
    let (status, body) = get_json(demo_state(), "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["demo_mode"], true);
    assert_eq!(data["feeds"]["version"], 0);
    assert_eq!(data["caches"].as_array().unwrap().len(), 2);
    assert_eq!(data["relay"]["enabled"], false);
}

// ============================================
// Middleware
// ============================================

#[tokio::test]
async fn test_inbound_api_key() {
    let config = AppConfig {
        inbound_api_key: Some("secret".into()),
        ..AppConfig::demo()
    };
    let state = Arc::new(AppState::new(config).unwrap());

    let (status, body) = get_json(state.clone(), "/api/stats").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "API_UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/stats")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(state.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    // Health stays open
    let (status, _) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_headers_and_429() {
    let config = AppConfig {
        rate_limit_per_minute: 2,
        ..AppConfig::demo()
    };
    let state = Arc::new(AppState::new(config).unwrap());

    let request = || {
        Request::builder()
            .uri("/api/automations")
            .header("x-forwarded-for", "10.1.2.3")
            .body(Body::empty())
            .unwrap()
    };

    let (status, headers, _) = send(state.clone(), request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "1");

    send(state.clone(), request()).await;
    let (status, headers, body) = send(state.clone(), request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key("retry-after"));
    assert_eq!(body["error"]["code"], "API_RATE_LIMITED");

    // Health is exempt
    let (status, _) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================
// Streams
// ============================================

#[tokio::test]
async fn test_pump_live_disabled_returns_503() {
    let (status, body) = get_json(demo_state(), "/api/pump-live").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "STREAM_RELAY_UNAVAILABLE");
}

#[tokio::test]
async fn test_token_stream_first_frame() {
    let state = demo_state();
    state.feed_cache.store(
        FeedKind::New,
        vec![Token::new(MINT, "USDC", "USD Coin", DataSource::PumpFun)],
        DataSource::PumpFun,
    );

    let request = Request::builder()
        .uri("/api/stream/tokens?interval_ms=10&feed=new")
        .body(Body::empty())
        .unwrap();
    let response = create_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .expect("no frame within 2s")
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&chunk);
    assert!(text.contains("event: tokens"), "{}", text);
    assert!(text.contains(MINT), "{}", text);
}

#[tokio::test]
async fn test_token_stream_rejects_bad_feed() {
    let (status, body) = get_json(demo_state(), "/api/stream/tokens?feed=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "API_BAD_REQUEST");
}

// ============================================
// Live chains against a fake upstream
// ============================================

fn dex_pair(base: &str, liquidity: f64, price: &str) -> Value {
    json!({
        "chainId": "solana",
        "dexId": "raydium",
        "pairAddress": "pair1",
        "baseToken": {"address": base, "name": "USD Coin", "symbol": "USDC"},
        "quoteToken": {"address": SOL, "name": "Wrapped SOL", "symbol": "SOL"},
        "liquidity": {"usd": liquidity},
        "priceUsd": price,
        "marketCap": 1_000_000.0
    })
}

#[tokio::test]
async fn test_live_new_tokens_from_pumpfun() {
    let upstream = Router::new().route(
        "/coins",
        get(|| async {
            Json(json!([
                {"mint": MINT, "name": "USD Coin", "symbol": "USDC", "usd_market_cap": 4200.0}
            ]))
        }),
    );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(live_config(&base)).unwrap());

    let (status, body) = get_json(state, "/api/tokens/new?fresh=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "pumpfun");
    assert_eq!(body["meta"]["demo"], false);
    assert_eq!(body["data"][0]["address"], MINT);
}

#[tokio::test]
async fn test_live_failures_fall_back_or_exhaust() {
    // Every provider answers 500
    let upstream = Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(live_config(&base)).unwrap());

    // Feeds fall back to demo
    let (status, body) = get_json(state.clone(), "/api/tokens/trending?fresh=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["demo"], true);

    // Search and prices have no demo fallback
    let (status, body) = get_json(state.clone(), "/api/tokens/search?q=pepe").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_EXHAUSTED");

    let (status, body) = get_json(state.clone(), &format!("/api/prices?ids={}", MINT)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_EXHAUSTED");

    // Failures show up in upstream stats
    let (_, body) = get_json(state, "/api/stats").await;
    let upstream = body["data"]["upstream"].as_array().unwrap();
    assert!(upstream
        .iter()
        .any(|u| u["provider"] == "dexscreener" && u["failures"].as_u64().unwrap() > 0));
}

#[tokio::test]
async fn test_live_detail_merges_jupiter_price_and_caches() {
    let upstream = Router::new()
        .route(
            "/latest/dex/tokens/:addresses",
            get(|Path(addresses): Path<String>| async move {
                Json(json!({"pairs": [dex_pair(&addresses, 80_000.0, "0.98")]}))
            }),
        )
        .route(
            "/price/v3",
            get(|| async { Json(json!({ MINT: {"usdPrice": 1.0001} })) }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(live_config(&base)).unwrap());

    let (status, body) = get_json(state.clone(), &format!("/api/tokens/{}", MINT)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "dexscreener");
    assert_eq!(body["meta"]["cached"], false);
    assert_eq!(body["data"]["price_usd"], 1.0001);
    assert_eq!(body["data"]["liquidity_usd"], 80_000.0);

    let (_, body) = get_json(state.clone(), &format!("/api/tokens/{}", MINT)).await;
    assert_eq!(body["meta"]["cached"], true);

    // The Jupiter price landed in the price cache too
    let (_, body) = get_json(state, &format!("/api/prices?ids={}", MINT)).await;
    assert_eq!(body["data"][MINT], 1.0001);
    assert_eq!(body["meta"]["cached"], true);
}

fn pump_coin(mint: &str, symbol: &str) -> Value {
    json!({
        "mint": mint,
        "name": format!("{} Coin", symbol),
        "symbol": symbol,
        "complete": false,
        "usd_market_cap": 31_000.0,
        "created_timestamp": 1_700_000_000_000i64
    })
}

fn moralis_token(mint: &str, symbol: &str) -> Value {
    json!({
        "tokenAddress": mint,
        "name": format!("{} Token", symbol),
        "symbol": symbol,
        "priceUsd": "0.0021",
        "liquidity": "5400.5",
        "fullyDilutedValuation": "21000"
    })
}

fn tracker_entry(mint: &str, symbol: &str, created_at_ms: i64) -> Value {
    json!({
        "token": {"mint": mint, "name": format!("{} Token", symbol), "symbol": symbol},
        "pools": [{
            "liquidity": {"usd": 12_000.0},
            "price": {"usd": 0.004, "quote": 0.00003},
            "marketCap": {"usd": 40_000.0},
            "createdAt": created_at_ms,
            "market": "pumpfun",
            "curvePercentage": 62.5
        }]
    })
}

fn failing() -> MethodRouter {
    get(|| async { StatusCode::INTERNAL_SERVER_ERROR })
}

#[tokio::test]
async fn test_live_new_tokens_fall_through_keyed_providers() {
    // pump.fun down, Moralis answers
    let upstream = Router::new()
        .route("/coins", failing())
        .route(
            "/token/mainnet/exchange/pumpfun/new",
            get(|| async { Json(json!({"result": [moralis_token(MINT, "USDC")]})) }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let (status, body) = get_json(state, "/api/tokens/new?fresh=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "moralis");
    assert_eq!(body["meta"]["demo"], false);
    assert_eq!(body["data"][0]["address"], MINT);
    assert_eq!(body["data"][0]["price_usd"], 0.0021);

    // pump.fun and Moralis down, SolanaTracker answers
    let upstream = Router::new()
        .route("/coins", failing())
        .route("/token/mainnet/exchange/pumpfun/new", failing())
        .route(
            "/tokens/latest",
            get(|| async { Json(json!([tracker_entry(BONK, "BONK", 1_700_000_000_000)])) }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let (_, body) = get_json(state, "/api/tokens/new?fresh=true").await;
    assert_eq!(body["meta"]["source"], "solanatracker");
    assert_eq!(body["data"][0]["address"], BONK);
    assert_eq!(body["data"][0]["bonding_curve_progress"], 62.5);
}

#[tokio::test]
async fn test_live_trending_falls_back_to_solana_tracker() {
    let upstream = Router::new().route(
        "/tokens/trending",
        get(|| async { Json(json!([tracker_entry(MINT, "USDC", 1_700_000_000_000)])) }),
    );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    // DexScreener routes are absent, so they 404
    let (_, body) = get_json(state, "/api/tokens/trending?fresh=true").await;
    assert_eq!(body["meta"]["source"], "solanatracker");
    assert_eq!(body["data"][0]["address"], MINT);
}

#[tokio::test]
async fn test_live_graduated_and_king_of_the_hill() {
    let upstream = Router::new()
        .route(
            "/token/mainnet/exchange/pumpfun/graduated",
            get(|| async {
                let mut token = moralis_token(MINT, "USDC");
                token["graduatedAt"] = json!("2024-01-01T00:00:00Z");
                Json(json!({"result": [token, moralis_token(BONK, "BONK")]}))
            }),
        )
        .route(
            "/coins/king-of-the-hill",
            get(|| async { Json(pump_coin(JUP, "KING")) }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let (status, body) = get_json(state.clone(), "/api/tokens/graduated?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "moralis");
    let tokens = body["data"].as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    // Everything on the graduated list is graduated, timestamp or not
    assert!(tokens.iter().all(|t| t["graduated"] == true));
    assert!(tokens.iter().all(|t| t["bonding_curve_progress"] == 100.0));

    let (status, body) = get_json(state, "/api/tokens/king-of-the-hill").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "pumpfun");
    assert_eq!(body["data"]["address"], JUP);
    assert_eq!(body["data"]["symbol"], "KING");
}

#[tokio::test]
async fn test_live_graduated_and_king_fall_back_to_demo() {
    let upstream = Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let (status, body) = get_json(state.clone(), "/api/tokens/graduated").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["demo"], true);
    assert!(body["data"].as_array().unwrap().iter().all(|t| t["graduated"] == true));

    let (status, body) = get_json(state, "/api/tokens/king-of-the-hill").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["demo"], true);
    assert_eq!(body["data"]["graduated"], false);
}

#[tokio::test]
async fn test_live_prices_fall_back_to_moralis() {
    let upstream = Router::new()
        .route("/price/v3", failing())
        .route(
            "/token/mainnet/:mint/price",
            get(|Path(mint): Path<String>| async move {
                if mint == MINT {
                    Json(json!({"usdPrice": 0.5})).into_response()
                } else {
                    StatusCode::NOT_FOUND.into_response()
                }
            }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let uri = format!("/api/prices?ids={},{}", MINT, BONK);
    let (status, body) = get_json(state.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "moralis");
    assert_eq!(body["data"][MINT], 0.5);
    // One mint failing does not sink the batch
    assert!(body["data"].get(BONK).is_none());

    // The Moralis price is cached like a Jupiter one
    let (_, body) = get_json(state, &format!("/api/prices?ids={}", MINT)).await;
    assert_eq!(body["meta"]["cached"], true);
    assert_eq!(body["data"][MINT], 0.5);
}

#[tokio::test]
async fn test_live_detail_falls_back_to_pumpfun() {
    let upstream = Router::new()
        .route(
            "/latest/dex/tokens/:addresses",
            get(|| async { Json(json!({"pairs": null})) }),
        )
        .route(
            "/coins/:mint",
            get(|Path(mint): Path<String>| async move { Json(pump_coin(&mint, "FROG")) }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(live_config(&base)).unwrap());

    let (status, body) = get_json(state.clone(), &format!("/api/tokens/{}", JUP)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "pumpfun");
    assert_eq!(body["meta"]["demo"], false);
    assert_eq!(body["data"]["address"], JUP);
    assert_eq!(body["data"]["symbol"], "FROG");
    assert_eq!(body["data"]["market_cap_usd"], 31_000.0);
}

// ============================================
// Live wallet and sniper views
// ============================================

#[tokio::test]
async fn test_live_moralis_portfolio_priced_through_jupiter() {
    let upstream = Router::new()
        .route(
            "/account/mainnet/:wallet/portfolio",
            get(|| async {
                Json(json!({
                    "nativeBalance": {"solana": "2"},
                    "tokens": [
                        {"mint": MINT, "symbol": "USDC", "name": "USD Coin", "amount": "100"},
                        {"mint": BONK, "symbol": "BONK", "name": "Bonk", "amount": "1"},
                        {"mint": JUP, "symbol": "JUP", "name": "Jupiter", "amount": "5"}
                    ]
                }))
            }),
        )
        .route(
            "/price/v3",
            get(|| async {
                Json(json!({
                    MINT: {"usdPrice": 1.0},
                    BONK: {"usdPrice": 0.000001},
                    SOL: {"usdPrice": 150.0}
                }))
            }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let uri = format!("/api/wallet/{}/portfolio", WALLET);
    let (status, body) = get_json(state.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "moralis");
    let portfolio = &body["data"];
    assert_eq!(portfolio["sol_balance"], 2.0);
    assert_eq!(portfolio["sol_price_usd"], 150.0);
    // Dust and unpriced holdings are hidden by default
    let holdings = portfolio["holdings"].as_array().unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0]["mint"], MINT);
    assert_eq!(holdings[0]["value_usd"], 100.0);
    // 100 USDC + 2 SOL at $150, dust included in the total
    let total = portfolio["total_value_usd"].as_f64().unwrap();
    assert!((total - 400.0).abs() < 0.01, "{}", total);

    let uri = format!("/api/wallet/{}/portfolio?include_dust=true", WALLET);
    let (_, body) = get_json(state, &uri).await;
    let holdings = body["data"]["holdings"].as_array().unwrap();
    assert_eq!(holdings.len(), 3);
    // Highest value first
    assert_eq!(holdings[0]["mint"], MINT);
}

#[tokio::test]
async fn test_live_portfolio_falls_back_to_solana_tracker() {
    let upstream = Router::new()
        .route("/account/mainnet/:wallet/portfolio", failing())
        .route(
            "/wallet/:owner",
            get(|| async {
                Json(json!({
                    "tokens": [
                        {"token": {"mint": MINT, "name": "USD Coin", "symbol": "USDC"},
                         "balance": 10.0, "value": 10.0},
                        {"token": {"mint": SOL, "name": "Wrapped SOL", "symbol": "SOL"},
                         "balance": 3.0, "value": 450.0}
                    ],
                    "total_sol": 3.0
                }))
            }),
        )
        .route(
            "/price/v3",
            get(|| async { Json(json!({ SOL: {"usdPrice": 150.0} })) }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let uri = format!("/api/wallet/{}/portfolio", WALLET);
    let (status, body) = get_json(state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "solanatracker");
    let portfolio = &body["data"];
    // The SOL row is folded into the native balance
    assert_eq!(portfolio["holdings"].as_array().unwrap().len(), 1);
    assert_eq!(portfolio["sol_balance"], 3.0);
    assert_eq!(portfolio["holdings"][0]["price_usd"], 1.0);
    let total = portfolio["total_value_usd"].as_f64().unwrap();
    assert!((total - 460.0).abs() < 0.01, "{}", total);
}

#[tokio::test]
async fn test_live_wallet_trades_chain() {
    let upstream = Router::new().route(
        "/account/mainnet/:wallet/swaps",
        get(|| async {
            Json(json!({"result": [
                {
                    "transactionHash": "sig-buy",
                    "transactionType": "buy",
                    "blockTimestamp": "2024-05-01T12:00:00Z",
                    "bought": {"address": MINT, "symbol": "USDC", "amount": "25"},
                    "sold": {"address": SOL, "symbol": "SOL", "amount": "-0.17"},
                    "totalValueUsd": 25.0
                },
                {
                    "transactionHash": "sig-other",
                    "transactionType": "addLiquidity",
                    "blockTimestamp": "2024-05-01T11:00:00Z"
                }
            ]}))
        }),
    );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let uri = format!("/api/wallet/{}/trades?limit=10", WALLET);
    let (status, body) = get_json(state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "moralis");
    let trades = body["data"].as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["signature"], "sig-buy");
    assert_eq!(trades[0]["side"], "buy");
    assert_eq!(trades[0]["token_mint"], MINT);
    assert_eq!(trades[0]["wallet"], WALLET);

    // Moralis down: SolanaTracker trades, SOL arriving means a sell
    let upstream = Router::new()
        .route("/account/mainnet/:wallet/swaps", failing())
        .route(
            "/wallet/:owner/trades",
            get(|| async {
                Json(json!({"trades": [{
                    "tx": "sig-sell",
                    "from": {"address": BONK, "amount": 1_000_000.0, "token": {"symbol": "BONK"}},
                    "to": {"address": SOL, "amount": 0.2, "token": {"symbol": "SOL"}},
                    "volume": {"usd": 30.0},
                    "time": 1_714_564_800_000i64
                }]}))
            }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let (_, body) = get_json(state, &uri).await;
    assert_eq!(body["meta"]["source"], "solanatracker");
    assert_eq!(body["data"][0]["side"], "sell");
    assert_eq!(body["data"][0]["token_mint"], BONK);
    assert_eq!(body["data"][0]["value_usd"], 30.0);
}

#[tokio::test]
async fn test_live_sniper_labels_from_first_buyers() {
    const LAUNCH_MS: i64 = 1_700_000_000_000;
    let upstream = Router::new()
        .route(
            "/tokens/:mint",
            get(|Path(mint): Path<String>| async move {
                Json(tracker_entry(&mint, "FROG", LAUNCH_MS))
            }),
        )
        .route(
            "/first-buyers/:mint",
            get(|| async {
                Json(json!([
                    {"wallet": "late", "first_buy_time": LAUNCH_MS + 600_000,
                     "total_invested": 5.0, "held": 0.0},
                    {"wallet": "fast", "first_buy_time": LAUNCH_MS + 4_000,
                     "total_invested": 120.0, "held": 10.0},
                    {"wallet": "quick", "first_buy_time": LAUNCH_MS + 45_000,
                     "total_invested": 60.0, "held": 0.0}
                ]))
            }),
        );
    let base = spawn_upstream(upstream).await;
    let state = Arc::new(AppState::new(keyed_config(&base)).unwrap());

    let (status, body) = get_json(state, &format!("/api/sniper/{}", MINT)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["source"], "solanatracker");
    let report = &body["data"];
    assert_eq!(report["launched_at"], "2023-11-14T22:13:20Z");
    assert_eq!(report["snipers"], 1);
    assert_eq!(report["early"], 1);
    assert_eq!(report["regular"], 1);
    assert_eq!(report["snipers_holding"], 1);

    // Ordered by first buy
    let entries = report["entries"].as_array().unwrap();
    let wallets: Vec<&str> = entries.iter().map(|e| e["wallet"].as_str().unwrap()).collect();
    assert_eq!(wallets, vec!["fast", "quick", "late"]);
    assert_eq!(entries[0]["label"], "sniper");
    assert_eq!(entries[0]["seconds_after_launch"], 4);
    assert_eq!(entries[1]["label"], "early");
    assert_eq!(entries[2]["label"], "regular");
}

// ============================================
// Pump live relay through the router
// ============================================

/// Fake PumpPortal: reports once both subscriptions arrive, then waits for
/// `go` before sending `frames`.
async fn spawn_gated_pumpportal(
    frames: Vec<String>,
) -> (String, oneshot::Receiver<()>, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subscribed_tx, subscribed_rx) = oneshot::channel();
    let (go_tx, go_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut subscriptions = 0;
        while subscriptions < 2 {
            match ws.next().await {
                Some(Ok(Message::Text(_))) => subscriptions += 1,
                Some(Ok(_)) => {}
                _ => return,
            }
        }
        let _ = subscribed_tx.send(());

        if go_rx.await.is_err() {
            return;
        }
        for frame in frames {
            if ws.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    (format!("ws://{}", addr), subscribed_rx, go_tx)
}

fn relay_config(ws_url: &str) -> AppConfig {
    let mut config = AppConfig::demo();
    config.pump_live_enabled = true;
    config.endpoints.pumpportal_ws = ws_url.to_string();
    config
}

/// Collect SSE chunks until `needle` shows up
async fn read_sse_until(body: &mut BodyDataStream, needle: &str) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap_or_else(|_| panic!("no '{}' within 2s, got: {}", needle, text))
            .expect("stream ended")
            .unwrap();
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
    text
}

async fn open_pump_live(state: Arc<AppState>) -> BodyDataStream {
    let request = Request::builder()
        .uri("/api/pump-live")
        .body(Body::empty())
        .unwrap();
    let response = create_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    response.into_body().into_data_stream()
}

#[tokio::test]
async fn test_pump_live_relays_upstream_frames() {
    let create = json!({"signature": "s1", "mint": MINT, "txType": "create", "symbol": "FROG"});
    let migrate = json!({"signature": "s2", "mint": MINT, "txType": "migrate"});
    let (url, subscribed, go) =
        spawn_gated_pumpportal(vec![create.to_string(), migrate.to_string()]).await;

    let state = Arc::new(AppState::new(relay_config(&url)).unwrap());
    let handle = state.relay.spawn().unwrap();
    tokio::time::timeout(Duration::from_secs(2), subscribed)
        .await
        .unwrap()
        .unwrap();

    let mut body = open_pump_live(state.clone()).await;
    let first = read_sse_until(&mut body, "event: status").await;
    assert!(first.contains(r#""connected":true"#), "{}", first);
    assert!(first.contains(r#""subscribers":1"#), "{}", first);

    go.send(()).unwrap();
    let text = read_sse_until(&mut body, "event: migration").await;
    assert!(text.contains("event: new_token"), "{}", text);
    assert!(text.contains("FROG"), "{}", text);
    assert!(text.find("event: new_token") < text.find("event: migration"));

    handle.abort();
}

#[tokio::test]
async fn test_pump_live_reports_lagged_subscriber() {
    let frames: Vec<String> = (0..3)
        .map(|i| {
            let signature = format!("s{}", i);
            json!({"signature": signature, "mint": MINT, "txType": "buy"}).to_string()
        })
        .collect();
    let (url, subscribed, go) = spawn_gated_pumpportal(frames).await;

    // Room for a single event per subscriber
    let mut state = AppState::new(relay_config(&url)).unwrap();
    state.relay = Arc::new(PumpLiveRelay::new(url, 1));
    let state = Arc::new(state);
    let handle = state.relay.spawn().unwrap();
    tokio::time::timeout(Duration::from_secs(2), subscribed)
        .await
        .unwrap()
        .unwrap();

    let mut body = open_pump_live(state.clone()).await;
    read_sse_until(&mut body, "event: status").await;

    // Let all three frames land before the subscriber reads again
    go.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while state.relay.stats().messages < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let text = read_sse_until(&mut body, "event: trade").await;
    assert!(text.contains("event: lagged"), "{}", text);
    assert!(text.contains(r#""skipped":2"#), "{}", text);
    // The newest frame still arrives
    assert!(text.contains(r#""signature":"s2""#), "{}", text);

    handle.abort();
}
