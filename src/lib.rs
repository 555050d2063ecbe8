// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod discover;
pub mod error;
pub mod ingest;
pub mod schedule;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::discover::date::{extract_date, DateOrigin};
pub use crate::discover::{resolve_latest, Candidate, Resolver};
pub use crate::error::{ConfigError, FetchError, IngestionFailure, ParseError};
pub use crate::ingest::types::{DocumentProcessor, Outcome, RunResult, RunSummary, Source};
pub use crate::ingest::{run_all, PriceUpdateJob};
pub use crate::schedule::{compute_next_run, DailyTime, ReferenceZone, Scheduler, SchedulerCfg};
