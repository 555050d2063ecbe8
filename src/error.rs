// src/error.rs
//! Error taxonomy. Only `ConfigError` is fatal; everything else is caught at
//! the narrowest scope (per link, per source) and turned into a logged outcome.

use thiserror::Error;

/// Startup-only configuration problems. Aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("reading config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported config format: {0}")]
    Format(String),
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),
    #[error("no sources configured")]
    NoSources,
    #[error("source #{index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("invalid schedule time `{0}` (expected HH:MM)")]
    InvalidScheduleTime(String),
    #[error("invalid reference utc offset: {0} hours")]
    InvalidOffset(i32),
    #[error("invalid value for {key}: `{value}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("building http client: {0}")]
    HttpClient(String),
}

/// Listing page could not be fetched. Yields "no candidate" for that source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid listing url `{0}`")]
    InvalidUrl(String),
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no fixture registered for {0}")]
    NoFixture(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Malformed date fragment. Excludes a single candidate, never the page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown month name `{0}`")]
    UnknownMonth(String),
    #[error("malformed number `{0}`")]
    Number(String),
    #[error("day {day} is out of range for {year}-{month:02}")]
    DayOutOfRange { year: i32, month: u32, day: u32 },
}

/// Ingestion of a resolved document failed. Reported per source.
#[derive(Debug, Error)]
pub enum IngestionFailure {
    #[error("download failed: {0}")]
    Download(#[from] FetchError),
    #[error("document at {0} is not a PDF")]
    NotPdf(String),
    #[error("storing document: {0}")]
    Store(#[from] std::io::Error),
}
