//! Post records as served by the catalog's JSON files.
//!
//! Derived fields (`MediaMetaData::imageurl`, `Tag::sanitized_tag`) are
//! computed once when the record is built and never re-derived.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::paths::{media_path, MediaDescriptor};

/// Metadata for one media file (image, gif or video) attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMediaMetaData")]
pub struct MediaMetaData {
    /// Whether the asset is a video
    pub is_video: bool,

    /// File type the post declares; may differ from the served extension
    #[serde(rename = "type")]
    pub media_type: String,

    /// Asset identifier (content hash)
    pub dataid: String,

    pub width: u32,
    pub height: u32,

    /// Absolute URL of the served asset
    pub imageurl: String,
}

#[derive(Deserialize)]
struct RawMediaMetaData {
    #[serde(default, deserialize_with = "flexible_bool")]
    is_video: bool,
    #[serde(rename = "type", default)]
    media_type: String,
    #[serde(deserialize_with = "flexible_string")]
    dataid: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

impl From<RawMediaMetaData> for MediaMetaData {
    fn from(raw: RawMediaMetaData) -> Self {
        Self::new(raw.dataid, raw.is_video, raw.media_type, raw.width, raw.height)
    }
}

impl MediaMetaData {
    /// Build media metadata, resolving the asset URL immediately
    pub fn new(
        dataid: impl Into<String>,
        is_video: bool,
        media_type: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        let dataid = dataid.into();
        let media_type = media_type.into();
        let imageurl = media_path(&MediaDescriptor::new(&dataid, is_video, &media_type));
        Self {
            is_video,
            media_type,
            dataid,
            width,
            height,
            imageurl,
        }
    }

    /// The path-deciding view of this asset
    pub fn descriptor(&self) -> MediaDescriptor<'_> {
        MediaDescriptor::new(&self.dataid, self.is_video, &self.media_type)
    }

    /// Name the asset is saved under locally
    pub fn file_name(&self) -> String {
        self.descriptor().file_name()
    }
}

/// A tag attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTag")]
pub struct Tag {
    /// URL of the tag's page
    pub tagurl: String,

    /// Tag name as stored (unsanitized)
    pub tag: String,

    pub tagname_display: String,

    /// Category (general, copyright, character, artist)
    pub tagtype: Option<String>,

    /// Total number of posts carrying the tag
    pub count: Option<u64>,

    /// Tag name as it appears in the tag page URL
    pub sanitized_tag: String,
}

#[derive(Deserialize)]
struct RawTag {
    #[serde(default)]
    tagurl: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    tagname_display: String,
    #[serde(default)]
    tagtype: Option<String>,
    #[serde(default)]
    count: Option<u64>,
}

impl From<RawTag> for Tag {
    fn from(raw: RawTag) -> Self {
        let sanitized_tag = tag_from_url(&raw.tagurl);
        Self {
            tagurl: raw.tagurl,
            tag: raw.tag,
            tagname_display: raw.tagname_display,
            tagtype: raw.tagtype,
            count: raw.count,
            sanitized_tag,
        }
    }
}

/// `https://nozomi.la/tag/akali-1.html` -> `akali`
fn tag_from_url(tagurl: &str) -> String {
    let last_segment = tagurl.rsplit('/').next().unwrap_or_default();
    last_segment
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// A post record
///
/// A post is itself a media record: the top-level `is_video`, `type`,
/// `dataid`, `width` and `height` describe its main asset. Records that omit
/// `dataid` have no main asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPost")]
pub struct Post {
    /// Unique post identifier
    pub postid: u32,

    /// Upload date as served (e.g. `2019-06-23 10:50:42-05`)
    pub date: String,

    /// Main asset, with its URL resolved at load
    #[serde(flatten)]
    pub media: Option<MediaMetaData>,

    pub general: Vec<Tag>,

    /// Series the media is based on
    pub copyright: Vec<Tag>,

    pub character: Vec<Tag>,
    pub artist: Vec<Tag>,

    /// Media attached to the post
    pub imageurls: Vec<MediaMetaData>,
}

#[derive(Deserialize)]
struct RawPost {
    postid: u32,
    #[serde(default)]
    date: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    is_video: bool,
    #[serde(rename = "type", default)]
    media_type: String,
    #[serde(default, deserialize_with = "flexible_opt_string")]
    dataid: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    general: Vec<Tag>,
    #[serde(default)]
    copyright: Vec<Tag>,
    #[serde(default)]
    character: Vec<Tag>,
    #[serde(default)]
    artist: Vec<Tag>,
    #[serde(default)]
    imageurls: Vec<MediaMetaData>,
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        let media = raw.dataid.map(|dataid| {
            MediaMetaData::new(dataid, raw.is_video, raw.media_type, raw.width, raw.height)
        });
        Self {
            postid: raw.postid,
            date: raw.date,
            media,
            general: raw.general,
            copyright: raw.copyright,
            character: raw.character,
            artist: raw.artist,
            imageurls: raw.imageurls,
        }
    }
}

impl Post {
    /// Parse the post's upload date
    pub fn uploaded_at(&self) -> Result<DateTime<Utc>> {
        let parsed = DateTime::parse_from_str(&self.date, "%Y-%m-%d %H:%M:%S%#z")
            .or_else(|_| DateTime::parse_from_rfc3339(&self.date))
            .with_context(|| format!("Unrecognized post date: {}", self.date))?;
        Ok(parsed.with_timezone(&Utc))
    }

    /// Every tag on the post, across all categories
    pub fn all_tags(&self) -> impl Iterator<Item = &Tag> {
        self.general
            .iter()
            .chain(&self.copyright)
            .chain(&self.character)
            .chain(&self.artist)
    }

    /// Whether any tag on the post has the given name
    pub fn has_tag(&self, name: &str) -> bool {
        self.all_tags()
            .any(|t| t.tag.eq_ignore_ascii_case(name) || t.sanitized_tag == name)
    }
}

/// Like [`flexible_string`], with `null` as absent
fn flexible_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Accept `true`, `"1"`, `1` and similar for boolean flags
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !matches!(s.trim(), "" | "0" | "false"),
        _ => false,
    })
}

/// Identifiers arrive as either strings or bare numbers
fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_POST: &str = r#"{
        "postid": 4269,
        "date": "2019-06-23 10:50:42-05",
        "general": [
            {"tagurl": "https://nozomi.la/tag/1girl-1.html", "tag": "1girl",
             "tagname_display": "1girl", "tagtype": "general", "count": 1200}
        ],
        "character": [
            {"tagurl": "https://nozomi.la/tag/akali-1.html", "tag": "akali",
             "tagname_display": "akali (league of legends)"}
        ],
        "imageurls": [
            {"is_video": "", "type": "jpg", "dataid": "9a1d1e6e0d6d5d5d", "width": 800, "height": 600},
            {"is_video": "1", "type": "mp4", "dataid": "42", "width": 1920, "height": 1080}
        ]
    }"#;

    #[test]
    fn test_post_deserialization() {
        let post: Post = serde_json::from_str(SAMPLE_POST).unwrap();

        assert_eq!(post.postid, 4269);
        assert_eq!(post.general.len(), 1);
        assert!(post.copyright.is_empty());
        assert!(post.artist.is_empty());
        assert_eq!(post.imageurls.len(), 2);
    }

    #[test]
    fn test_media_url_derived_on_load() {
        let post: Post = serde_json::from_str(SAMPLE_POST).unwrap();

        let image = &post.imageurls[0];
        assert!(!image.is_video);
        assert_eq!(image.imageurl, "https://w.nozomi.la/d/d5/9a1d1e6e0d6d5d5d.webp");
        assert_eq!(image.file_name(), "9a1d1e6e0d6d5d5d.webp");

        let video = &post.imageurls[1];
        assert!(video.is_video);
        assert_eq!(video.imageurl, "https://v.nozomi.la/42.mp4");
    }

    #[test]
    fn test_tag_sanitized_from_url() {
        let post: Post = serde_json::from_str(SAMPLE_POST).unwrap();
        assert_eq!(post.character[0].sanitized_tag, "akali");
        assert_eq!(post.general[0].count, Some(1200));
        assert!(post.has_tag("akali"));
        assert!(!post.has_tag("veigar"));
    }

    #[test]
    fn test_uploaded_at() {
        let post: Post = serde_json::from_str(SAMPLE_POST).unwrap();
        let uploaded = post.uploaded_at().unwrap();
        assert_eq!(uploaded.to_rfc3339(), "2019-06-23T15:50:42+00:00");
    }

    #[test]
    fn test_serialization_round_trip_keeps_url() {
        let media = MediaMetaData::new("1234", false, "gif", 10, 10);
        let json = serde_json::to_string(&media).unwrap();
        let parsed: MediaMetaData = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, media);
        assert_eq!(parsed.imageurl, "https://g.nozomi.la/4/23/1234.gif");
    }

    #[test]
    fn test_post_main_asset_derived_on_load() {
        let json = r#"{"postid": 4269, "date": "2019-06-23 10:50:42-05",
            "is_video": "", "type": "jpg", "dataid": "9a1d1e6e0d6d5d5d",
            "width": 800, "height": 600, "imageurls": []}"#;
        let post: Post = serde_json::from_str(json).unwrap();

        let media = post.media.as_ref().unwrap();
        assert_eq!(media.dataid, "9a1d1e6e0d6d5d5d");
        assert_eq!(media.media_type, "jpg");
        assert_eq!((media.width, media.height), (800, 600));
        assert_eq!(media.imageurl, "https://w.nozomi.la/d/d5/9a1d1e6e0d6d5d5d.webp");

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["dataid"], "9a1d1e6e0d6d5d5d");
        assert_eq!(value["imageurl"], media.imageurl.as_str());

        let reparsed: Post = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, post);
    }

    #[test]
    fn test_post_without_main_asset() {
        let post: Post = serde_json::from_str(r#"{"postid": 5}"#).unwrap();
        assert!(post.media.is_none());
        assert!(post.imageurls.is_empty());
    }

    #[test]
    fn test_numeric_dataid() {
        let media: MediaMetaData =
            serde_json::from_str(r#"{"is_video": false, "type": "png", "dataid": 7}"#).unwrap();
        assert_eq!(media.dataid, "7");
        assert_eq!(media.imageurl, "https://w.nozomi.la/7.webp");
    }
}
