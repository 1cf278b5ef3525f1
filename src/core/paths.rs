//! Deterministic remote paths for index files, post records and media.
//!
//! The catalog is served as static files. Anything keyed by an identifier
//! of 100 or more is sharded two levels deep using its last three digits:
//!
//! ```text
//! 4269     -> 9/26/4269
//! 9017646  -> 6/64/9017646
//! 100      -> 0/10/100
//! 5        -> 5            (stored flat)
//! ```

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::domain::SanitizedTag;

/// Host serving `.nozomi` index files
pub const INDEX_HOST: &str = "j.nozomi.la";

/// Host serving post JSON records
pub const CONTENT_HOST: &str = "j.nozomi.la";

/// Host serving transcoded still images
pub const IMAGE_HOST: &str = "w.nozomi.la";

/// Host serving animated gifs
pub const GIF_HOST: &str = "g.nozomi.la";

/// Host serving videos
pub const VIDEO_HOST: &str = "v.nozomi.la";

/// Identifiers below this value are stored without shard directories
pub const UNSHARDED_LIMIT: u64 = 100;

/// Bytes left alone when encoding a tag into an index path.
///
/// Unreserved characters plus the parentheses, which the catalog keeps
/// literal in series names such as `shuten_douji_(fategrand_order)`.
const TAG_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'(')
    .remove(b')');

/// Which host family a media asset is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Gif,
    Image,
}

impl MediaKind {
    /// Classify a descriptor by its video flag and declared file type
    pub fn classify(is_video: bool, declared_type: &str) -> Self {
        if is_video {
            MediaKind::Video
        } else if declared_type.eq_ignore_ascii_case("gif") {
            MediaKind::Gif
        } else {
            MediaKind::Image
        }
    }

    pub fn host(&self) -> &'static str {
        match self {
            MediaKind::Video => VIDEO_HOST,
            MediaKind::Gif => GIF_HOST,
            MediaKind::Image => IMAGE_HOST,
        }
    }

    /// File extension served by the host.
    ///
    /// Still images are transcoded server-side, so they are always `webp`.
    pub fn extension<'a>(&self, declared_type: &'a str) -> &'a str {
        match self {
            MediaKind::Video => declared_type,
            MediaKind::Gif => "gif",
            MediaKind::Image => "webp",
        }
    }
}

/// The fields of a media asset that decide where it lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaDescriptor<'a> {
    /// Asset identifier (`dataid`), numeric or hash
    pub id: &'a str,
    pub is_video: bool,
    /// File type the post declares for the asset
    pub declared_type: &'a str,
}

impl<'a> MediaDescriptor<'a> {
    pub fn new(id: &'a str, is_video: bool, declared_type: &'a str) -> Self {
        Self {
            id,
            is_video,
            declared_type,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::classify(self.is_video, self.declared_type)
    }

    /// Extension of the file the catalog actually serves
    pub fn extension(&self) -> &'a str {
        self.kind().extension(self.declared_type)
    }

    /// Local file name for the asset (`<id>.<ext>`)
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.extension())
    }
}

/// Split an identifier into its two shard directory names.
///
/// The identifier is left-padded with `0` to three characters and the last
/// three are taken: the final character is the outer shard, the two before
/// it the inner one.
pub fn shard_segments(id: &str) -> (String, String) {
    let padded = format!("{:0>3}", id);
    let chars: Vec<char> = padded.chars().collect();
    let tail = &chars[chars.len() - 3..];

    let outer = tail[2].to_string();
    let inner: String = tail[..2].iter().collect();
    (outer, inner)
}

/// Relative location `<a>/<b>/<id>` or just `<id>` below the limit
fn sharded_stem(id: &str) -> String {
    if is_unsharded(id) {
        id.to_string()
    } else {
        let (outer, inner) = shard_segments(id);
        format!("{}/{}/{}", outer, inner, id)
    }
}

/// Numeric identifiers below [`UNSHARDED_LIMIT`] are stored flat.
///
/// Non-numeric identifiers (hashes) shorter than three characters have no
/// shard digits to take and are stored flat as well.
fn is_unsharded(id: &str) -> bool {
    match id.parse::<u64>() {
        Ok(value) => value < UNSHARDED_LIMIT,
        Err(_) => id.chars().count() < 3,
    }
}

/// URL of the `.nozomi` index file listing every post carrying `tag`
pub fn tag_index_path(tag: &SanitizedTag) -> String {
    encoded_index_url(tag.as_str())
}

fn encoded_index_url(tag: &str) -> String {
    let encoded = utf8_percent_encode(tag, TAG_ENCODE_SET);
    format!("https://{}/nozomi/{}.nozomi", INDEX_HOST, encoded)
}

/// Path of a post's JSON record, relative to [`CONTENT_HOST`]
pub fn content_path(id: u32) -> String {
    format!("post/{}.json", sharded_stem(&id.to_string()))
}

/// Absolute URL of a post's JSON record
pub fn content_url(id: u32) -> String {
    format!("https://{}/{}", CONTENT_HOST, content_path(id))
}

/// Absolute URL of a media asset
pub fn media_path(descriptor: &MediaDescriptor<'_>) -> String {
    let kind = descriptor.kind();
    format!(
        "https://{}/{}.{}",
        kind.host(),
        sharded_stem(descriptor.id),
        kind.extension(descriptor.declared_type)
    )
}
