use anyhow::{Context, Result};
use bitrue::constants::LISTEN_KEY_KEEPALIVE_INTERVAL;
use bitrue::{BitrueRestClient, OrderBookFeed, SymbolMap, UserStreamFeed};
use feedsock::ShutdownSignal;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let api_key = std::env::var("BITRUE_API_KEY").unwrap_or_default();
    let pairs: Vec<String> = std::env::var("BITRUE_TRADING_PAIRS")
        .unwrap_or_else(|_| "BTC-USDT".to_string())
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    print_banner(&pairs);

    let shutdown = ShutdownSignal::new();
    shutdown.spawn_signal_handler();

    let rest = Arc::new(BitrueRestClient::new(api_key.clone()));
    let symbols = SymbolMap::for_pairs(&pairs);

    let mut market = OrderBookFeed::new(pairs, symbols, Arc::clone(&rest), shutdown.clone());
    let mut book_events = market
        .events()
        .context("order book event stream already taken")?;

    // Downstream stand-in: a real host hands these streams to its book
    // applier and order tracker.
    let book_consumer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = book_events.recv() => match event {
                        Some(event) => info!("book event: {:?}", event),
                        None => break,
                    },
                }
            }
        })
    };

    let market_task = tokio::spawn(async move { market.run().await });

    // The private feed only makes sense with an API key.
    let user_tasks = if api_key.is_empty() {
        warn!("BITRUE_API_KEY not set, running without the user stream");
        None
    } else {
        let mut user = UserStreamFeed::new(Arc::clone(&rest), shutdown.clone());
        let mut account_events = user
            .events()
            .context("user event stream already taken")?;
        let listen_key = user.listen_key();

        let account_consumer = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        event = account_events.recv() => match event {
                            Some(event) => info!("account event: {:?}", event),
                            None => break,
                        },
                    }
                }
            })
        };

        // Keepalive ticker: the exchange expires idle listen keys after
        // 30 minutes, so renew well inside that window.
        let keepalive = {
            let listen_key = Arc::clone(&listen_key);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    if !shutdown.sleep(LISTEN_KEY_KEEPALIVE_INTERVAL).await {
                        break;
                    }
                    if let Err(e) = listen_key.keep_alive().await {
                        error!("listen key keepalive failed: {}", e);
                    }
                }
            })
        };

        let runner = tokio::spawn(async move { user.run().await });

        Some((listen_key, account_consumer, keepalive, runner))
    };

    shutdown.cancelled().await;
    info!("shutting down feeds");

    let _ = market_task.await;
    let _ = book_consumer.await;

    if let Some((listen_key, account_consumer, keepalive, runner)) = user_tasks {
        let _ = runner.await;
        let _ = keepalive.await;
        let _ = account_consumer.await;
        if let Err(e) = listen_key.close().await {
            warn!("listen key close failed: {}", e);
        }
    }

    info!("feeds stopped gracefully");
    Ok(())
}

fn print_banner(pairs: &[String]) {
    info!("========================================");
    info!("Starting Bitrue feed client");
    info!("Trading pairs: {}", pairs.join(", "));
    info!("Press Ctrl+C to stop");
    info!("========================================");
}
