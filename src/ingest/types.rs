// src/ingest/types.rs
use serde::{Deserialize, Serialize};

/// A named listing page, e.g. one regional DA office.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub listing_url: String,
    /// Ingested instead when discovery finds nothing.
    #[serde(default)]
    pub fallback_document_url: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>, listing_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listing_url: listing_url.into(),
            fallback_document_url: None,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_document_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Processed,
    NoDocumentFound,
    IngestionFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Processed => "processed",
            Outcome::NoDocumentFound => "no_document_found",
            Outcome::IngestionFailed => "ingestion_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunResult {
    pub source_name: String,
    pub document_url: Option<String>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub total: usize,
    pub results: Vec<RunResult>,
}

impl RunSummary {
    pub fn outcome_of(&self, source_name: &str) -> Option<Outcome> {
        self.results
            .iter()
            .find(|r| r.source_name == source_name)
            .map(|r| r.outcome)
    }
}

/// Downstream ingestion of one resolved document. Opaque to the scraper:
/// `false` means "logged and counted", never a propagated error.
#[async_trait::async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, document_url: &str) -> bool;
}
