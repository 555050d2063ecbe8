//! price-monitor: binary entrypoint.
//! Loads config, wires discovery + download, then either runs once or hands
//! the job to the daily scheduler until Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use price_monitor::config;
use price_monitor::discover::fetch::{build_client, HttpListingFetcher};
use price_monitor::ingest::processor::DownloadProcessor;
use price_monitor::schedule::clock::SystemClock;
use price_monitor::{telemetry, PriceUpdateJob, Resolver, Scheduler};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cfg = config::load_default().context("loading configuration")?;
    telemetry::init(&cfg.log_file)?;

    info!(
        schedule_time = %cfg.schedule_time,
        utc_offset = %cfg.zone.offset(),
        sources = cfg.sources.len(),
        log_file = %cfg.log_file.display(),
        "price monitor starting"
    );

    let client = build_client(cfg.fetch_timeout, &cfg.user_agent)?;
    let resolver = Resolver::new(Box::new(HttpListingFetcher::from_client(client.clone())))
        .with_marker(cfg.link_marker.clone());
    let processor = DownloadProcessor::new(client, cfg.download_dir.clone());
    let job = PriceUpdateJob::new(cfg.sources.clone(), resolver, Box::new(processor));

    if !cfg.schedule_enabled {
        let summary = job.run_once().await;
        info!(
            processed = summary.processed,
            total = summary.total,
            "single run finished"
        );
        return Ok(());
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = tx.send(true);
    });

    let scheduler = Scheduler::new(cfg.scheduler_cfg(), SystemClock);
    scheduler.run(&job, rx).await;
    Ok(())
}
