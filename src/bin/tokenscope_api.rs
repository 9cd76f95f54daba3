//! TokenScope API Server
//!
//! Dashboard backend: token feeds, wallet views and SSE streams
//!
//! Usage:
//!   cargo run --bin tokenscope_api
//!
//! Environment:
//!   PORT / TOKENSCOPE_PORT - Server port (default: 8080)
//!   TOKENSCOPE_HOST        - Server host (default: 0.0.0.0)
//!   DEMO_MODE              - Serve generated data only
//!   RUST_LOG               - Log filter (default: info)

use std::sync::Arc;
use tokio::net::TcpListener;
use tokenscope::api::{create_router, start_cleanup_task, AppState};
use tokenscope::utils::constants::MAX_FEED_LIMIT;
use tokenscope::AppConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let config = AppConfig::from_env()?;
    config.log_summary();
    let addr = config.socket_addr()?;

    let state = Arc::new(AppState::new(config)?);

    // Background tasks. The refresher fetches the widest feed so cached
    // routes can answer any clamped limit.
    let refresher = state.feed_cache.spawn_refresher(
        state.tokens.clone(),
        state.config.cache_refresh,
        MAX_FEED_LIMIT,
    );
    let cleanup = start_cleanup_task(state.rate_limiter.clone(), state.tokens.clone());
    info!("🧹 Background cleanup task started");

    let relay = if state.config.pump_live_enabled {
        state.relay.spawn()
    } else {
        info!("📴 Pump live relay disabled");
        None
    };

    let app = create_router(state.clone());

    info!("🚀 TokenScope API starting on http://{}", addr);
    info!("");
    info!("Endpoints:");
    info!("  GET  /api/tokens/new            - Newest launches (cached feed)");
    info!("  GET  /api/tokens/trending       - Trending tokens (cached feed)");
    info!("  GET  /api/tokens/graduated      - Finished bonding curves");
    info!("  GET  /api/tokens/king-of-the-hill - pump.fun featured coin");
    info!("  GET  /api/tokens/search?q=      - Token search");
    info!("  GET  /api/tokens/:address       - Token detail");
    info!("  GET  /api/prices?ids=           - USD prices");
    info!("  GET  /api/scanner               - Filtered/sorted feed");
    info!("  GET  /api/sniper/:mint          - Early buyers");
    info!("  GET  /api/wallet/:address/...   - Portfolio and trades");
    info!("  GET  /api/stream/tokens         - SSE feed stream");
    info!("  GET  /api/pump-live             - SSE PumpPortal relay");
    info!("  GET  /api/stats                 - Cache and upstream statistics");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");
    info!("");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Graceful shutdown sequence
    info!("");
    info!("🛑 Shutdown signal received, cleaning up...");
    refresher.abort();
    cleanup.abort();
    if let Some(handle) = relay {
        handle.abort();
    }

    let feeds = state.feed_cache.stats();
    let relay_stats = state.relay.stats();
    info!("📊 Final statistics:");
    info!("   Uptime: {}s", state.uptime_seconds());
    info!(
        "   Feed refreshes: {} ({} skipped, {} failed)",
        feeds.refreshes, feeds.skipped, feeds.failures
    );
    info!("   Relay messages: {} ({} reconnects)", relay_stats.messages, relay_stats.reconnects);
    for (provider, stats) in state.tokens.providers().upstream_stats().snapshot() {
        info!(
            "   {}: {} ok / {} failed, avg {:.0}ms",
            provider,
            stats.successes,
            stats.failures,
            stats.avg_latency_ms()
        );
    }

    info!("👋 TokenScope API shutdown complete");

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════╗
    ║                                                  ║
    ║            T O K E N S C O P E   A P I           ║
    ║        Solana token feeds for the dashboard      ║
    ║                                                  ║
    ╚══════════════════════════════════════════════════╝
    "#
    );
}
