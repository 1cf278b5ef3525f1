//! nozomi - Tag-indexed media catalog client
//!
//! A Rust client for a media catalog published purely as static files:
//! one binary index file per tag, and JSON post records and media assets
//! stored under sharded paths derived from their identifiers.
//!
//! # Architecture
//!
//! The core is pure and synchronous:
//! - Tags are sanitized before they reach a path
//! - Index files decode to sets of `u32` post identifiers
//! - Queries intersect required tags and subtract excluded ones
//! - Post and media locations are derived from identifiers alone
//!
//! All network access goes through the [`adapters::ByteFetcher`] trait.
//!
//! # Modules
//!
//! - `adapters`: Byte fetchers (HTTP, in-memory) and media writing
//! - `core`: Paths, index decoding, query resolution, catalog client
//! - `domain`: Data structures (SanitizedTag, Post, MediaMetaData)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Identifiers of posts tagged both akali and sakimichan, without nudity
//! nozomi ids --tag akali --tag sakimichan --exclude nudity
//!
//! # Download every media file of one post
//! nozomi download https://nozomi.la/post/26905532.html
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{ByteFetcher, HttpFetcher, StaticFetcher};
pub use self::core::{
    content_path, decode, media_path, parse_reference, tag_index_path, CatalogClient,
    IdentifierSet, IdentifierSetResolver, NozomiError,
};
pub use domain::{sanitize, MediaMetaData, Post, SanitizedTag, Tag};
