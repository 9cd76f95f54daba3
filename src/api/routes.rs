//! API Route Configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{auth_middleware, logging_middleware, rate_limit_middleware};
use super::stream;

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    // The dashboard is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        // Tokens (static segments win over :address)
        .route("/tokens/new", get(handlers::new_tokens))
        .route("/tokens/trending", get(handlers::trending_tokens))
        .route("/tokens/graduated", get(handlers::graduated_tokens))
        .route("/tokens/king-of-the-hill", get(handlers::king_of_the_hill))
        .route("/tokens/search", get(handlers::search_tokens))
        .route("/tokens/:address", get(handlers::token_detail))
        .route("/prices", get(handlers::get_prices))
        // Dashboard views
        .route("/scanner", get(handlers::scanner))
        .route("/sniper/:mint", get(handlers::sniper_report))
        .route("/wallet/:address/portfolio", get(handlers::wallet_portfolio))
        .route("/wallet/:address/trades", get(handlers::wallet_trades))
        .route("/automations", get(handlers::automations))
        .route("/preferences/validate", post(handlers::validate_preferences))
        // Streams
        .route("/stream/tokens", get(stream::stream_tokens))
        .route("/pump-live", get(stream::pump_live));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health_check))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
