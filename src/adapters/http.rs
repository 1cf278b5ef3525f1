//! HTTP fetcher for the catalog's static file hosts.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, REFERER};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{commit_partial, partial_path, ByteFetcher};

/// Referer the media hosts expect on asset requests
const CATALOG_REFERER: &str = "https://nozomi.la/";

/// `reqwest`-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given timeout and user agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(REFERER, HeaderValue::from_static(CATALOG_REFERER));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Create a fetcher from the resolved configuration
    pub fn from_config(config: &crate::config::ResolvedConfig) -> Result<Self> {
        Self::new(
            Duration::from_secs(config.timeout_seconds),
            &config.user_agent,
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        response
            .error_for_status()
            .with_context(|| format!("Catalog returned an error for {}", url))
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let body = self
            .get(url)
            .await?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        debug!(%url, bytes = body.len(), "Fetched");
        Ok(body.to_vec())
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.get(url).await?;
        let part = partial_path(dest);

        let written = match stream_body(response, url, &part).await {
            Ok(written) => written,
            Err(e) => {
                warn!(%url, part = %part.display(), "Discarding partial download");
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };
        commit_partial(&part, dest).await?;

        debug!(%url, bytes = written, dest = %dest.display(), "Saved");
        Ok(written)
    }
}

/// Stream a response body into `path`
async fn stream_body(mut response: reqwest::Response, url: &str, path: &Path) -> Result<u64> {
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("Failed to read body of {}", url))?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_http_fetcher_creation() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5), "nozomi-test").unwrap();
        assert_eq!(fetcher.name(), "http");
    }

    /// Serve one response that promises more body than it sends
    async fn truncated_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc")
                .await
                .unwrap();
        });

        format!("http://{}/1234.webp", addr)
    }

    #[tokio::test]
    async fn test_truncated_body_leaves_no_file() {
        let url = truncated_server().await;
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("1234.webp");
        let fetcher = HttpFetcher::new(Duration::from_secs(5), "nozomi-test").unwrap();

        let result = fetcher.fetch_to_file(&url, &dest).await;

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    // Live requests against the catalog belong in manual runs, not unit tests.
}
