//! Domain types for the nozomi catalog.
//!
//! This module contains:
//! - Tag: sanitized search tags
//! - Post: post records, their tags and media

pub mod post;
pub mod tag;

pub use post::{MediaMetaData, Post, Tag};
pub use tag::{sanitize, SanitizedTag};
