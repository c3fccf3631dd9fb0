//! AMM Ladder Bot — Entry Point
//!
//! Initializes configuration, logging, the ledger gateway client, and
//! the monitoring tasks, then runs the order manager until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load the signing credential from STELLAR_SECRET_KEY
//! 4. Create GatewayClient (HTTP + signing + retry + rate limit)
//! 5. Spawn health/metrics server (/live, /ready, /metrics)
//! 6. Spawn the spot price monitor (ledger poll → broadcast)
//! 7. Spawn the fill stream monitor (SSE → mpsc, auto-resubscribe)
//! 8. Log starting balances
//! 9. Spawn the OrderManager actor (event-driven tokio::select!)
//! 10. Wait for SIGINT → graceful shutdown (cancel ladder → exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use amm_ladder_bot::adapters::gateway::{GatewayAuth, GatewayClient, GatewayClientConfig, GatewayLedger};
use amm_ladder_bot::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use amm_ladder_bot::config;
use amm_ladder_bot::usecases::fill_monitor::{FILL_CHANNEL_CAPACITY, FillMonitor};
use amm_ladder_bot::usecases::order_manager::OrderManager;
use amm_ladder_bot::usecases::price_monitor::{PRICE_CHANNEL_CAPACITY, PriceMonitor};
use amm_ladder_bot::usecases::wallet_manager::WalletManager;

/// Grace period for monitor tasks after the manager stopped.
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config_path = std::env::var("LADDER_BOT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        pool = %config.pool.contract,
        pair = %config.pair.trading_pair(),
        "Starting AMM ladder bot"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Signing credential + gateway client ──────────────
    let auth = Arc::new(
        GatewayAuth::from_env(&config.account.public_key)
            .context("Failed to load signing credential from env")?,
    );
    let gateway = Arc::new(
        GatewayClient::new(Arc::clone(&auth), GatewayClientConfig::from(&config.gateway))
            .context("Failed to create gateway client")?,
    );
    let ledger = Arc::new(GatewayLedger::new(gateway));

    // ── 5. Metrics + health server ──────────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new());

    let health_handle = if config.metrics.enabled {
        let server = HealthServer::new(
            Arc::clone(&health),
            Arc::clone(&metrics),
            config.metrics.bind_address.clone(),
        );
        let server_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 6. Spot price monitor ───────────────────────────────
    let (price_tx, price_rx) = broadcast::channel(PRICE_CHANNEL_CAPACITY);
    let price_monitor = PriceMonitor::new(Arc::clone(&ledger), &config, price_tx)
        .context("Invalid pool configuration")?
        .with_metrics(Arc::clone(&metrics));

    // ── 7. Fill stream monitor ──────────────────────────────
    let (fill_tx, fill_rx) = mpsc::channel(FILL_CHANNEL_CAPACITY);
    let fill_monitor = FillMonitor::new(Arc::clone(&ledger), &config, fill_tx)
        .with_observability(Arc::clone(&metrics), Arc::clone(&health));

    // ── 8. Order manager ────────────────────────────────────
    let manager = OrderManager::new(Arc::clone(&ledger), &config, price_rx, fill_rx)
        .context("Invalid ladder configuration")?
        .with_observability(Arc::clone(&metrics), Arc::clone(&health));

    let wallet = WalletManager::new(
        Arc::clone(&ledger),
        config.account.public_key.clone(),
        config.pair.trading_pair(),
    );
    if let Err(e) = wallet.report("startup").await {
        warn!(error = %e, "Could not read starting balances");
    }

    let price_handle = tokio::spawn(price_monitor.run(shutdown_tx.subscribe()));
    let fill_handle = tokio::spawn(fill_monitor.run(shutdown_tx.subscribe()));
    let manager_handle = tokio::spawn(manager.run(shutdown_tx.subscribe()));

    info!("All tasks spawned — bot is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for SIGINT, shutting down");
    } else {
        info!("SIGINT received, initiating graceful shutdown");
    }

    // ── Graceful shutdown ───────────────────────────────────

    // 1. Signal all tasks to stop; the manager cancels the ladder itself
    let _ = shutdown_tx.send(());

    // 2. Wait for the manager's bounded cancellation
    let manager_budget =
        Duration::from_millis(config.manager.shutdown_timeout_ms) + TASK_DRAIN_TIMEOUT;
    if tokio::time::timeout(manager_budget, manager_handle).await.is_err() {
        warn!("Order manager did not stop in time");
    }

    // 3. Monitors stop on the same signal
    let _ = tokio::time::timeout(TASK_DRAIN_TIMEOUT, price_handle).await;
    let _ = tokio::time::timeout(TASK_DRAIN_TIMEOUT, fill_handle).await;

    match tokio::time::timeout(TASK_DRAIN_TIMEOUT, wallet.report("shutdown")).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "Could not read final balances"),
        Err(_) => warn!("Final balance report timed out"),
    }

    // 4. Stop health server
    if let Some(handle) = health_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}
