use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, DeliveryMode, HealthStatus, Notifier};
use dedup::DedupStore;
use dryrun::LogNotifier;
use engine::{MexcClient, Scheduler, SchedulerSettings};
use strategy::{SweepWickVolume, WatchlistConfig};
use telegram_notify::TelegramNotifier;

/// Cycles may be missed this many times before `/healthz` reports stale.
const STALE_AFTER_INTERVALS: u32 = 3;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Invalid environment: {e}");
            std::process::exit(1);
        }
    };
    info!(delivery = %cfg.delivery_mode, "WickWatch starting");

    let watchlist = match WatchlistConfig::load_or_default(&cfg.watchlist_config_path) {
        Ok(w) => w,
        Err(e) => {
            error!(path = %cfg.watchlist_config_path, "Invalid watchlist: {e}");
            std::process::exit(1);
        }
    };

    // ── Provider ──────────────────────────────────────────────────────────────
    let provider = match MexcClient::new(
        cfg.mexc_base_url.clone(),
        Duration::from_secs(cfg.http_timeout_secs),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build MEXC client: {e}");
            std::process::exit(1);
        }
    };

    // ── Notifier (injected based on DELIVERY_MODE) ────────────────────────────
    let notifier: Arc<dyn Notifier> = match (cfg.delivery_mode, &cfg.telegram) {
        (DeliveryMode::Telegram, Some(creds)) => {
            info!(chats = creds.chat_ids.len(), "Telegram delivery");
            Arc::new(TelegramNotifier::new(creds))
        }
        (DeliveryMode::Telegram, None) => {
            error!("Telegram delivery selected without credentials");
            std::process::exit(1);
        }
        (DeliveryMode::Log, _) => {
            info!("Log delivery — alerts are written to the log only");
            Arc::new(LogNotifier::new())
        }
    };

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let settings = SchedulerSettings::from_watchlist(&watchlist);
    info!(pairs = settings.keys.len(), "Watchlist ready");
    let health = Arc::new(RwLock::new(HealthStatus::default()));
    let stale_after = settings.poll_interval * STALE_AFTER_INTERVALS;
    let evaluator = Arc::new(SweepWickVolume::new(watchlist.signal));
    let scheduler = Scheduler::new(provider, notifier, evaluator, settings, health.clone());

    // ── Health endpoint ───────────────────────────────────────────────────────
    let api_state = api::AppState {
        health,
        delivery_mode: cfg.delivery_mode,
        started_at: chrono::Utc::now(),
        stale_after,
    };
    let port = cfg.health_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!("Health endpoint stopped: {e}");
        }
    });

    // ── Run until interrupted ─────────────────────────────────────────────────
    tokio::select! {
        _ = scheduler.run(DedupStore::new()) => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutdown signal received. Exiting.");
        }
    }
}
