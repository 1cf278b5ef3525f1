//! High-level catalog client.
//!
//! Ties the pure core (tag sanitization, index decoding, set algebra, path
//! derivation) to a [`ByteFetcher`] to answer user-facing questions: which
//! posts match these tags, what does post N contain, and download its media.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{ensure_dir, partial_path, save_media, ByteFetcher, HttpFetcher};
use crate::config::ResolvedConfig;
use crate::domain::Post;

use super::paths::content_url;
use super::reference::parse_reference;
use super::resolver::{IdentifierSetResolver, DEFAULT_MAX_CONCURRENT_FETCHES};

/// Client for the nozomi catalog
pub struct CatalogClient {
    fetcher: Arc<dyn ByteFetcher>,
    resolver: IdentifierSetResolver,
    max_concurrent_fetches: usize,
}

impl CatalogClient {
    /// Create a client over any fetcher
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self::with_concurrency(fetcher, DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    /// Create a client with a custom fetch concurrency
    pub fn with_concurrency(fetcher: Arc<dyn ByteFetcher>, max_concurrent_fetches: usize) -> Self {
        let resolver =
            IdentifierSetResolver::with_concurrency(Arc::clone(&fetcher), max_concurrent_fetches);
        Self {
            fetcher,
            max_concurrent_fetches: resolver.max_concurrent_fetches(),
            resolver,
        }
    }

    /// Create an HTTP client from the resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(config)?;
        Ok(Self::with_concurrency(
            Arc::new(fetcher),
            config.max_concurrent_fetches,
        ))
    }

    pub fn resolver(&self) -> &IdentifierSetResolver {
        &self.resolver
    }

    /// Fetch a single post by identifier
    #[instrument(skip(self))]
    pub async fn get_post(&self, id: u32) -> Result<Post> {
        fetch_post(self.fetcher.as_ref(), id).await
    }

    /// Fetch the post a page URL refers to
    pub async fn get_post_by_reference(&self, reference: &str) -> Result<Post> {
        let id = parse_reference(reference)?;
        self.get_post(id).await
    }

    /// Stream every post matching the query.
    ///
    /// The identifier set is resolved before this returns, so validation
    /// and index fetch errors surface here. Posts are then fetched one at a
    /// time, newest identifier first, into a bounded channel; the producer
    /// stops after the first failed post or when the receiver is dropped.
    #[instrument(skip_all)]
    pub async fn get_posts<S: AsRef<str>>(
        &self,
        required: &[S],
        excluded: &[S],
    ) -> Result<mpsc::Receiver<Result<Post>>> {
        let mut ids = self.resolver.resolve_sorted(required, excluded).await?;
        ids.reverse();
        info!(posts = ids.len(), "Streaming matching posts");

        let (tx, rx) = mpsc::channel(self.max_concurrent_fetches);
        let fetcher = Arc::clone(&self.fetcher);

        tokio::spawn(async move {
            for id in ids {
                let post = fetch_post(fetcher.as_ref(), id).await;
                let failed = post.is_err();

                if tx.send(post).await.is_err() {
                    debug!("Post receiver dropped, stopping producer");
                    break;
                }
                if failed {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Fetch every post matching the query into memory
    pub async fn get_all_posts<S: AsRef<str>>(
        &self,
        required: &[S],
        excluded: &[S],
    ) -> Result<Vec<Post>> {
        let mut rx = self.get_posts(required, excluded).await?;
        let mut posts = Vec::new();
        while let Some(post) = rx.recv().await {
            posts.push(post?);
        }
        Ok(posts)
    }

    /// Download every media asset of `post` into `dir`.
    ///
    /// Assets download concurrently. Returns the saved file names in the
    /// order the post lists its media. If any asset fails, the remaining
    /// downloads are cancelled and the files this call already saved are
    /// removed.
    #[instrument(skip(self, post, dir), fields(post = post.postid, dir = %dir.display()))]
    pub async fn download_media(&self, post: &Post, dir: &Path) -> Result<Vec<String>> {
        ensure_dir(dir).await?;

        let mut join_set = JoinSet::new();
        for (index, media) in post.imageurls.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let dir: PathBuf = dir.to_path_buf();

            join_set.spawn(async move {
                let outcome = save_media(fetcher.as_ref(), &media, &dir).await?;
                Ok::<_, anyhow::Error>((index, outcome))
            });
        }

        let mut names = vec![String::new(); post.imageurls.len()];
        while let Some(joined) = join_set.join_next().await {
            let result = joined
                .map_err(|e| anyhow!("Media download task failed: {}", e))
                .and_then(|done| done);

            match result {
                Ok((index, outcome)) => {
                    debug!(file = %outcome.file_name, bytes = outcome.bytes, "Saved media");
                    names[index] = outcome.file_name;
                }
                Err(e) => {
                    warn!(post = post.postid, "Media download failed: {:#}", e);
                    join_set.shutdown().await;
                    discard_downloads(post, dir, &names).await;
                    return Err(e);
                }
            }
        }

        info!(files = names.len(), "Downloaded post media");
        Ok(names)
    }
}

/// Remove the files a failed `download_media` call left behind
async fn discard_downloads(post: &Post, dir: &Path, saved: &[String]) {
    for name in saved.iter().filter(|name| !name.is_empty()) {
        let _ = tokio::fs::remove_file(dir.join(name)).await;
    }
    for media in &post.imageurls {
        let _ = tokio::fs::remove_file(partial_path(&dir.join(media.file_name()))).await;
    }
}

/// Fetch and decode one post record
async fn fetch_post(fetcher: &dyn ByteFetcher, id: u32) -> Result<Post> {
    let url = content_url(id);
    let body = fetcher.fetch(&url).await?;
    serde_json::from_slice(&body).with_context(|| format!("Failed to parse post JSON from {}", url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticFetcher;

    #[tokio::test]
    async fn test_get_post_uses_sharded_url() {
        let fetcher = Arc::new(StaticFetcher::new().with_response(
            "https://j.nozomi.la/post/9/26/4269.json",
            br#"{"postid": 4269, "date": "2020-01-01 00:00:00-05"}"#.to_vec(),
        ));
        let client = CatalogClient::new(fetcher);

        let post = client.get_post(4269).await.unwrap();
        assert_eq!(post.postid, 4269);
        assert!(post.imageurls.is_empty());
    }

    #[tokio::test]
    async fn test_get_post_rejects_bad_json() {
        let fetcher = Arc::new(
            StaticFetcher::new().with_response("https://j.nozomi.la/post/5.json", b"<html>".to_vec()),
        );
        let client = CatalogClient::new(fetcher);

        let err = client.get_post(5).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse post JSON"));
    }

    #[tokio::test]
    async fn test_get_post_by_reference_rejects_media_url() {
        let client = CatalogClient::new(Arc::new(StaticFetcher::new()));

        let err = client
            .get_post_by_reference("https://w.nozomi.la/a/bc/abc.webp")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::core::NozomiError>(),
            Some(crate::core::NozomiError::InvalidUrlFormat(_))
        ));
    }
}
