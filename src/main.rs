use matchup::config::{LoggingSettings, Settings};
use matchup::{
    CandidateStore, CohortRegistry, LeaderboardCache, Matchmaker, PairingSelector, PostgresStore,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging. LOG_LEVEL and LOG_FORMAT override the settings file.
fn init_tracing(logging: &LoggingSettings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&settings.logging);
    info!("Starting matchup reconciliation host...");

    let store = match PostgresStore::from_settings(&settings.database).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to PostgreSQL: {}", e);
            std::process::exit(1);
        }
    };
    let store: Arc<dyn CandidateStore> = Arc::new(store);

    info!(
        "PostgreSQL store initialized (max: {} connections)",
        settings.database.max_connections
    );

    // Serving against an unknown cohort set is worse than not starting
    let selector = PairingSelector::new(settings.matching.fairness_window);
    let registry =
        match CohortRegistry::load(store.as_ref(), settings.matching.decay_interval(), selector)
            .await
        {
            Ok(registry) => Arc::new(registry),
            Err(e) => {
                error!("Failed to load cohorts, refusing to start: {}", e);
                std::process::exit(1);
            }
        };

    let leaderboards = LeaderboardCache::new(
        settings.leaderboard.cache_capacity,
        settings.reconciliation.interval(),
    );
    let matchmaker = Matchmaker::new(registry, store, leaderboards, settings.leaderboard.size);

    let reconciler = matchmaker.reconciler();
    if let Err(e) = reconciler.run_once().await {
        warn!("Initial reconciliation aborted: {}", e);
    }

    for summary in matchmaker.summaries() {
        info!(
            cohort = summary.id,
            category = %summary.category,
            gender = %summary.gender,
            candidates = summary.candidate_count,
            "Cohort ready"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = reconciler.spawn(settings.reconciliation.interval(), shutdown_rx);

    info!(
        "Reconciliation scheduled every {}s",
        settings.reconciliation.interval_secs
    );

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        error!("Reconciler task failed: {}", e);
    }
}
