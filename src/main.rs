// src/main.rs
use anyhow::Context;
use chrono::Utc;
use dotenvy::dotenv;
use grid_sim::config::AppConfig;
use grid_sim::connectors::coincheck::CoincheckClient;
use grid_sim::connectors::traits::StreamClient;
use grid_sim::core::engine::TradingEngine;
use grid_sim::core::ledger::Ledger;
use grid_sim::storage::CsvHistorySink;
use grid_sim::strategies::grid::GridStrategy;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "grid_sim.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tungstenite=warn,tokio_tungstenite=warn"));

    let console_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _log_guard = init_logging();

    // 1. Load Configuration
    let config = AppConfig::new().context("Configuration rejected")?;

    info!("========================================");
    info!("       GRID SIM - v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Feed:    {} ({})", config.ws_url, config.channel);
    info!("Mode:    PAPER TRADING");
    config.strategy.log_summary();

    // 2. Initialize Components
    let sink = CsvHistorySink::for_run(&config.history_dir, Utc::now())?;
    let ledger = Ledger::new(&config.strategy, Box::new(sink));
    let strategy = GridStrategy::new(&config.strategy);

    // 3. Create Channels
    let (feed_tx, feed_rx) = mpsc::channel(config.feed_buffer);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 4. Subscribe to Data
    let mut client = CoincheckClient::new(config.ws_url.clone());
    client
        .subscribe_trades(&config.channel, feed_tx)
        .await
        .context("Trade feed unavailable")?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would stop the engine, so park instead.
                error!("Unable to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    // 5. Run Engine
    let mut engine = TradingEngine::new(strategy, ledger, feed_rx, shutdown_rx);
    if let Err(e) = engine.run().await {
        error!("Fatal Engine Error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
