//! Core catalog logic.
//!
//! This module contains:
//! - Paths: deterministic index, post and media locations
//! - Decoder: `.nozomi` index file decoding
//! - Resolver: tag query set algebra over fetched indexes
//! - Reference: post identifiers from page URLs
//! - Client: post retrieval and media downloads

pub mod client;
pub mod decoder;
pub mod error;
pub mod paths;
pub mod reference;
pub mod resolver;

// Re-export commonly used types
pub use client::CatalogClient;
pub use decoder::{decode, decode_set, IdentifierSet};
pub use error::NozomiError;
pub use paths::{
    content_path, content_url, media_path, shard_segments, tag_index_path, MediaDescriptor,
    MediaKind,
};
pub use reference::parse_reference;
pub use resolver::{combine, IdentifierSetResolver, DEFAULT_MAX_CONCURRENT_FETCHES};
