//! TokenScope - terminal feed watcher
//!
//! Refreshes the new and trending feeds on the cache interval and prints the
//! top tokens of each. Uses the same providers and fallbacks as the API.

use tokenscope::utils::cache::{FeedKind, FeedSnapshot, TokenFeedCache};
use tokenscope::{AppConfig, Token, TokenService};

use chrono::Utc;
use eyre::Result;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Rows printed per feed
const ROWS: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!(
        r#"
    ╔══════════════════════════════════════════════════╗
    ║            T O K E N S C O P E                   ║
    ║        Solana new & trending token watch         ║
    ╚══════════════════════════════════════════════════╝
    "#
    );

    let config = AppConfig::from_env()?;
    if config.demo_mode {
        println!("🎭 DEMO_MODE is on: showing generated data\n");
    }

    let service = Arc::new(TokenService::from_config(&config)?);
    let cache = Arc::new(TokenFeedCache::new());

    let mut ticker = tokio::time::interval(config.cache_refresh);
    let mut last_printed = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !cache.refresh(&service, ROWS).await {
                    continue;
                }
                let new = cache.snapshot(FeedKind::New);
                let trending = cache.snapshot(FeedKind::Trending);
                let version = new.version.max(trending.version);
                if version != last_printed {
                    last_printed = version;
                    print_feed(&new);
                    print_feed(&trending);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n\n🛑 Shutting down...");
                let stats = cache.stats();
                println!("\n📊 Final Statistics:");
                println!("   Refreshes:  {}", stats.refreshes);
                println!("   Skipped:    {}", stats.skipped);
                println!("   Failures:   {}", stats.failures);
                for (provider, s) in service.providers().upstream_stats().snapshot() {
                    println!(
                        "   {:<14} {} ok / {} failed, avg {:.0}ms",
                        provider,
                        s.successes,
                        s.failures,
                        s.avg_latency_ms()
                    );
                }
                break;
            }
        }
    }

    Ok(())
}

fn print_feed(snapshot: &FeedSnapshot) {
    let now = Utc::now();
    println!(
        "\n{} {} feed ({} via {}, v{})",
        if snapshot.source.is_demo() { "🎭" } else { "📡" },
        snapshot.kind.as_str(),
        snapshot.tokens.len(),
        snapshot.source,
        snapshot.version,
    );
    println!("   {:<10} {:>14} {:>14} {:>8} {:>7}", "SYMBOL", "PRICE", "MCAP", "AGE", "CURVE");
    for token in snapshot.tokens.iter().take(ROWS) {
        println!("   {}", row(token, now));
    }
}

fn row(token: &Token, now: chrono::DateTime<Utc>) -> String {
    let price = token.price_usd.map(|p| format!("${:.8}", p)).unwrap_or_else(|| "-".into());
    let mcap = token.market_cap_usd.map(|m| format!("${:.0}", m)).unwrap_or_else(|| "-".into());
    let age = token.age_minutes(now).map(|m| format!("{}m", m)).unwrap_or_else(|| "-".into());
    let curve = if token.graduated {
        "🎓".to_string()
    } else {
        token.bonding_curve_progress.map(|p| format!("{:.0}%", p)).unwrap_or_else(|| "-".into())
    };
    let symbol: String = token.symbol.chars().take(10).collect();
    format!("{:<10} {:>14} {:>14} {:>8} {:>7}", symbol, price, mcap, age, curve)
}
