//! Token aggregator
//!
//! Main entry point: polls observation sources and keeps the volume-ranked
//! token records current until shutdown

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::oneshot;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tokenagg_core::{AggregatorSettings, Notification};
use tokenagg_service::Runtime;
use tokenagg_store::MemoryStore;

/// Interval for purging expired records from the in-process store
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting token aggregator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = env::var("TOKENAGG_CONFIG_FILE").ok().map(PathBuf::from);
    let settings = AggregatorSettings::load(config_path.as_deref())?;
    info!(
        "Loaded settings: {} sources, poll every {:?}, record ttl {:?}s",
        settings.sources.len(),
        settings.poll_interval(),
        settings.record_ttl_secs()
    );
    if settings.sources.is_empty() {
        warn!("No sources configured; set TOKENAGG_SOURCES to a comma-separated list of files");
    }

    let store = Arc::new(MemoryStore::new());
    let runtime = Runtime::build(&settings, store.clone());

    // Periodic expiry sweep
    let purge_store = Arc::clone(&store);
    let purge_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_store.purge_expired();
            if purged > 0 {
                debug!("Purged {} expired records", purged);
            }
        }
    });

    // Log notifications as they are published
    let mut events = runtime.service.subscribe();
    let events_handle = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(Notification::TokenUpdate(update)) => {
                    debug!(
                        "token_update {} price={:.6} volume={:.2}",
                        update.address, update.price, update.volume
                    );
                }
                Ok(Notification::VolumeSpike(spike)) => {
                    info!(
                        "volume_spike {} volume={:.2} delta={:.2}",
                        spike.address, spike.volume, spike.delta
                    );
                }
                Err(e) => warn!("Notification logger lagged: {}", e),
            }
        }
    });

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let aggregator = Arc::clone(&runtime.aggregator);
    let aggregator_handle = tokio::spawn(async move { aggregator.run(shutdown_rx).await });

    info!("Press Ctrl+C to shutdown");
    wait_for_signal().await;

    let _ = shutdown_tx.send(());

    match aggregator_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Aggregator error: {}", e),
        Err(e) => error!("Aggregator task failed: {}", e),
    }

    purge_handle.abort();
    events_handle.abort();

    let stats = runtime.aggregator.stats();
    info!(
        "Shutdown complete: {} cycles, {} observations, {} merges, {} notifications, {} source failures, {} store failures",
        stats.cycles,
        stats.observations,
        stats.merges,
        stats.notifications,
        stats.source_failures,
        stats.store_failures
    );
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}
