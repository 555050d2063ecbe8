// src/ingest/processor.rs
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;

use crate::error::{FetchError, IngestionFailure};
use crate::ingest::types::DocumentProcessor;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Downloads the resolved PDF into a local directory, where the extraction
/// job picks it up.
#[derive(Clone)]
pub struct DownloadProcessor {
    client: Client,
    dir: PathBuf,
}

impl DownloadProcessor {
    /// `client` should carry the same timeout and user agent as the listing fetcher.
    pub fn new(client: Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dir: dir.into(),
        }
    }

    pub async fn download(&self, url: &str) -> Result<PathBuf, IngestionFailure> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        self.store(url, &body).await
    }

    /// Validate and write the body atomically (`.part` then rename).
    pub async fn store(&self, url: &str, body: &[u8]) -> Result<PathBuf, IngestionFailure> {
        if !body.starts_with(PDF_MAGIC) {
            return Err(IngestionFailure::NotPdf(url.to_string()));
        }
        fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(file_name_for(url));
        let partial = target.with_extension("part");
        fs::write(&partial, body).await?;
        fs::rename(&partial, &target).await?;
        Ok(target)
    }
}

/// Short hex digest of the full URL. Keeps same-named documents from
/// different sources apart.
fn url_hash(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(url.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// `<url hash>_<last path segment>`, restricted to a safe charset.
pub fn file_name_for(url: &str) -> String {
    let raw = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());

    let name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", url_hash(url), name)
}

#[async_trait]
impl DocumentProcessor for DownloadProcessor {
    async fn process(&self, document_url: &str) -> bool {
        match self.download(document_url).await {
            Ok(path) => {
                tracing::info!(target: "ingest", url = document_url, path = %path.display(), "document stored");
                true
            }
            Err(e) => {
                tracing::error!(target: "ingest", url = document_url, error = %e, "ingestion failed");
                false
            }
        }
    }
}

// --- Test helper ---
pub struct MockProcessor {
    succeed: bool,
    calls: Mutex<Vec<String>>,
}

impl MockProcessor {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            calls: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentProcessor for MockProcessor {
    async fn process(&self, document_url: &str) -> bool {
        if let Ok(mut c) = self.calls.lock() {
            c.push(document_url.to_string());
        }
        self.succeed
    }
}
