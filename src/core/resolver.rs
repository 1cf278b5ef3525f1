//! Tag query resolution.
//!
//! A query is a list of required tags and a list of excluded tags. Each
//! tag's index file is fetched and decoded, then:
//!
//! ```text
//! result = (required_1 ∩ required_2 ∩ ...) − (excluded_1 ∪ excluded_2 ∪ ...)
//! ```
//!
//! All index fetches for one query run concurrently, bounded by a
//! semaphore, and are joined before any set algebra happens.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::adapters::ByteFetcher;
use crate::domain::{sanitize, SanitizedTag};

use super::decoder::{decode_set, IdentifierSet};
use super::error::NozomiError;
use super::paths::tag_index_path;

/// Default number of index files fetched at once
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Resolves tag queries to sets of post identifiers
pub struct IdentifierSetResolver {
    fetcher: Arc<dyn ByteFetcher>,
    max_concurrent_fetches: usize,
}

impl IdentifierSetResolver {
    /// Create a resolver using the default fetch concurrency
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self::with_concurrency(fetcher, DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    /// Create a resolver with a custom fetch concurrency (minimum 1)
    pub fn with_concurrency(fetcher: Arc<dyn ByteFetcher>, max_concurrent_fetches: usize) -> Self {
        Self {
            fetcher,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    /// Resolve a query to the identifiers of every matching post.
    ///
    /// Fails with [`NozomiError::InvalidArgument`] when `required` is empty
    /// and with [`NozomiError::InvalidTagFormat`] for a bad tag; both are
    /// raised before anything is fetched. Fetch errors are returned as the
    /// fetcher produced them.
    #[instrument(skip_all, fields(required = required.len(), excluded = excluded.len()))]
    pub async fn resolve<S: AsRef<str>>(
        &self,
        required: &[S],
        excluded: &[S],
    ) -> Result<IdentifierSet> {
        if required.is_empty() {
            return Err(NozomiError::InvalidArgument(
                "required tags must contain at least one tag".to_string(),
            )
            .into());
        }

        let required_tags = sanitize_all(required)?;
        let excluded_tags = sanitize_all(excluded)?;
        debug!(?required_tags, ?excluded_tags, "Resolving tag query");

        let urls: Vec<String> = required_tags
            .iter()
            .chain(&excluded_tags)
            .map(tag_index_path)
            .collect();
        let fetched = self.fetch_index_sets(&urls).await?;

        let set_for = |url: &String| fetched.get(url).cloned().unwrap_or_default();
        let (required_urls, excluded_urls) = urls.split_at(required_tags.len());
        let required_sets: Vec<IdentifierSet> = required_urls.iter().map(set_for).collect();
        let excluded_sets: Vec<IdentifierSet> = excluded_urls.iter().map(set_for).collect();

        let result = combine(required_sets, excluded_sets);
        info!(matches = result.len(), "Resolved tag query");
        Ok(result)
    }

    /// Resolve a query and return the identifiers in ascending order
    pub async fn resolve_sorted<S: AsRef<str>>(
        &self,
        required: &[S],
        excluded: &[S],
    ) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self.resolve(required, excluded).await?.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Fetch and decode every distinct index URL concurrently
    async fn fetch_index_sets(&self, urls: &[String]) -> Result<HashMap<String, IdentifierSet>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut join_set = JoinSet::new();

        let mut seen = HashSet::new();
        for url in urls {
            if !seen.insert(url.as_str()) {
                continue;
            }
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let url = url.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                let buffer = fetcher.fetch(&url).await?;
                let ids = decode_set(&buffer);
                debug!(%url, bytes = buffer.len(), ids = ids.len(), "Decoded index");
                Ok::<_, anyhow::Error>((url, ids))
            });
        }

        let mut sets = HashMap::with_capacity(seen.len());
        while let Some(joined) = join_set.join_next().await {
            let (url, ids) = joined.map_err(|e| anyhow!("Index fetch task failed: {}", e))??;
            sets.insert(url, ids);
        }

        Ok(sets)
    }
}

fn sanitize_all<S: AsRef<str>>(tags: &[S]) -> Result<Vec<SanitizedTag>, NozomiError> {
    tags.iter().map(|tag| sanitize(tag.as_ref())).collect()
}

/// Intersect the required sets and subtract the union of the excluded sets.
///
/// Order of either list does not affect the result. An empty `required`
/// yields an empty set.
pub fn combine(required: Vec<IdentifierSet>, excluded: Vec<IdentifierSet>) -> IdentifierSet {
    let mut required = required;
    // Start from the smallest set so the intersection only shrinks it.
    required.sort_by_key(|set| set.len());

    let mut sets = required.into_iter();
    let Some(mut result) = sets.next() else {
        return IdentifierSet::new();
    };
    for set in sets {
        result.retain(|id| set.contains(id));
    }

    for set in &excluded {
        result.retain(|id| !set.contains(id));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> IdentifierSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_combine_intersection() {
        let result = combine(vec![set(&[1, 2, 3]), set(&[2, 3, 4])], vec![]);
        assert_eq!(result, set(&[2, 3]));
    }

    #[test]
    fn test_combine_subtraction() {
        let result = combine(vec![set(&[1, 2, 3])], vec![set(&[2])]);
        assert_eq!(result, set(&[1, 3]));
    }

    #[test]
    fn test_combine_excluded_union() {
        let result = combine(vec![set(&[1, 2, 3, 4])], vec![set(&[1]), set(&[4, 9])]);
        assert_eq!(result, set(&[2, 3]));
    }

    #[test]
    fn test_combine_single_required_unchanged() {
        let result = combine(vec![set(&[5, 6, 7])], vec![]);
        assert_eq!(result, set(&[5, 6, 7]));
    }

    #[test]
    fn test_combine_no_required() {
        assert!(combine(vec![], vec![set(&[1])]).is_empty());
    }

    #[test]
    fn test_combine_is_order_independent() {
        let a = set(&[1, 2, 3, 8]);
        let b = set(&[2, 3, 4, 8]);
        let c = set(&[3, 8, 9]);

        let forward = combine(vec![a.clone(), b.clone(), c.clone()], vec![set(&[8])]);
        let reverse = combine(vec![c, b, a], vec![set(&[8])]);
        assert_eq!(forward, reverse);
        assert_eq!(forward, set(&[3]));
    }

    #[test]
    fn test_concurrency_floor() {
        let fetcher: Arc<dyn ByteFetcher> = Arc::new(crate::adapters::StaticFetcher::new());
        let resolver = IdentifierSetResolver::with_concurrency(fetcher, 0);
        assert_eq!(resolver.max_concurrent_fetches(), 1);
    }
}
