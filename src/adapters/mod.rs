//! Adapter interfaces for the remote catalog.
//!
//! The core never talks to the network itself. It is handed a
//! [`ByteFetcher`] and lets whatever error that fetcher produces propagate
//! unchanged.

pub mod http;
pub mod media;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

pub use http::HttpFetcher;
pub use media::{ensure_dir, save_media, MediaWriteOutcome};

/// Trait for retrieving raw bytes by URL
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Human-readable fetcher name
    fn name(&self) -> &str;

    /// Fetch the full body at `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Write the body at `url` to `dest`, returning the number of bytes written.
    ///
    /// `dest` only appears once the whole body is on disk. The default
    /// buffers the body; network fetchers override it to stream.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let bytes = self.fetch(url).await?;
        let part = partial_path(dest);

        if let Err(e) = fs::write(&part, &bytes).await {
            let _ = fs::remove_file(&part).await;
            return Err(e).with_context(|| format!("Failed to write {}", part.display()));
        }
        commit_partial(&part, dest).await?;
        Ok(bytes.len() as u64)
    }
}

/// In-progress download path for `dest` (`<name>.part`)
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Move a completed `.part` file into place
async fn commit_partial(part: &Path, dest: &Path) -> Result<()> {
    fs::rename(part, dest)
        .await
        .with_context(|| format!("Failed to move {} into place", part.display()))
}

/// Fetcher backed by an in-memory URL map
///
/// Used for tests and offline replays of captured index files.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`
    pub fn with_response(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }

    /// Serve a packed index file listing `ids` for `url`
    pub fn with_index(self, url: impl Into<String>, ids: &[u32]) -> Self {
        let body: Vec<u8> = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
        self.with_response(url, body)
    }

    /// URLs requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ByteFetcher for StaticFetcher {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.responses
            .get(url)
            .cloned()
            .with_context(|| format!("No response registered for {}", url))
    }
}
