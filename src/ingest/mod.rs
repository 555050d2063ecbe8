// src/ingest/mod.rs
pub mod processor;
pub mod types;

use async_trait::async_trait;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::sync::Mutex;

use crate::discover::Resolver;
use crate::ingest::types::{DocumentProcessor, Outcome, RunResult, RunSummary, Source};
use crate::schedule::Job;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("price_monitor_runs_total", "Completed multi-source runs.");
        describe_counter!(
            "price_monitor_source_outcomes_total",
            "Per-source outcomes, labelled by outcome."
        );
        describe_counter!(
            "price_monitor_fetch_errors_total",
            "Listing page fetch failures."
        );
        describe_gauge!(
            "price_monitor_last_run_ts",
            "Unix ts when the last run finished."
        );
    });
}

/// Resolve and ingest one source. Never fails; every problem becomes an outcome.
pub async fn run_source(
    source: &Source,
    resolver: &Resolver,
    processor: &dyn DocumentProcessor,
) -> RunResult {
    let found = match resolver.resolve_latest(&source.listing_url).await {
        Some(url) => Some(url),
        None => match &source.fallback_document_url {
            Some(fallback) => {
                tracing::warn!(
                    target: "ingest",
                    source = %source.name,
                    url = %fallback,
                    "no document discovered, using configured fallback"
                );
                Some(fallback.clone())
            }
            None => None,
        },
    };

    let Some(url) = found else {
        return RunResult {
            source_name: source.name.clone(),
            document_url: None,
            outcome: Outcome::NoDocumentFound,
        };
    };

    tracing::info!(target: "ingest", source = %source.name, url = %url, "ingesting document");
    let outcome = if processor.process(&url).await {
        Outcome::Processed
    } else {
        Outcome::IngestionFailed
    };

    RunResult {
        source_name: source.name.clone(),
        document_url: Some(url),
        outcome,
    }
}

/// Run every source in configured order. Partial failure is normal:
/// one bad source never stops the rest.
pub async fn run_all(
    sources: &[Source],
    resolver: &Resolver,
    processor: &dyn DocumentProcessor,
) -> RunSummary {
    ensure_metrics_described();

    let mut summary = RunSummary {
        total: sources.len(),
        ..Default::default()
    };

    for source in sources {
        let result = run_source(source, resolver, processor).await;

        match result.outcome {
            Outcome::Processed => {
                summary.processed += 1;
                tracing::info!(target: "ingest", source = %result.source_name, outcome = result.outcome.as_str(), "source done");
            }
            Outcome::NoDocumentFound | Outcome::IngestionFailed => {
                tracing::warn!(target: "ingest", source = %result.source_name, outcome = result.outcome.as_str(), "source done");
            }
        }
        counter!("price_monitor_source_outcomes_total", "outcome" => result.outcome.as_str())
            .increment(1);

        summary.results.push(result);
    }

    counter!("price_monitor_runs_total").increment(1);
    gauge!("price_monitor_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    tracing::info!(
        target: "ingest",
        processed = summary.processed,
        total = summary.total,
        "run summary"
    );
    summary
}

/// The daily job: every configured source through discovery and ingestion.
pub struct PriceUpdateJob {
    sources: Vec<Source>,
    resolver: Resolver,
    processor: Box<dyn DocumentProcessor>,
    last: Mutex<Option<RunSummary>>,
}

impl PriceUpdateJob {
    pub fn new(
        sources: Vec<Source>,
        resolver: Resolver,
        processor: Box<dyn DocumentProcessor>,
    ) -> Self {
        Self {
            sources,
            resolver,
            processor,
            last: Mutex::new(None),
        }
    }

    pub async fn run_once(&self) -> RunSummary {
        tracing::info!(target: "ingest", sources = self.sources.len(), "price update starting");
        let summary = run_all(&self.sources, &self.resolver, self.processor.as_ref()).await;
        if let Ok(mut last) = self.last.lock() {
            *last = Some(summary.clone());
        }
        summary
    }

    pub fn last_summary(&self) -> Option<RunSummary> {
        self.last.lock().ok().and_then(|l| l.clone())
    }
}

#[async_trait]
impl Job for PriceUpdateJob {
    async fn execute(&self) {
        self.run_once().await;
    }
}
