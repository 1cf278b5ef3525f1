//! Writing media assets to disk.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs;

use super::ByteFetcher;
use crate::domain::MediaMetaData;

/// Result of saving one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaWriteOutcome {
    /// File name written inside the destination directory
    pub file_name: String,

    pub bytes: u64,
}

/// Download `media` into `dir` as `<dataid>.<ext>`.
///
/// `dir` must already exist. An existing file with the same name is
/// overwritten.
pub async fn save_media(
    fetcher: &dyn ByteFetcher,
    media: &MediaMetaData,
    dir: &Path,
) -> Result<MediaWriteOutcome> {
    let file_name = media.file_name();
    let dest = dir.join(&file_name);

    let bytes = fetcher.fetch_to_file(&media.imageurl, &dest).await?;
    Ok(MediaWriteOutcome { file_name, bytes })
}

/// Create the destination directory for downloads
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create download directory: {}", dir.display()))
}
