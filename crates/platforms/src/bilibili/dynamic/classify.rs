//! Normalization of raw feed items.
//!
//! Each item type keeps its payload in a different `major` section. The
//! classifier maps all of them onto [`DynamicEntry`]. Forwards recurse
//! into the embedded original item.

use tracing::{debug, warn};

use super::models::{DynamicItem, LiveRcmdContent, Major, ModuleDynamic};
use crate::bilibili::{ARTICLE_URL_PREFIX, AUDIO_URL_PREFIX, DYNAMIC_URL_PREFIX, VIDEO_URL_PREFIX};

pub const TYPE_FORWARD: &str = "DYNAMIC_TYPE_FORWARD";
pub const TYPE_DRAW: &str = "DYNAMIC_TYPE_DRAW";
pub const TYPE_AV: &str = "DYNAMIC_TYPE_AV";
pub const TYPE_WORD: &str = "DYNAMIC_TYPE_WORD";
pub const TYPE_ARTICLE: &str = "DYNAMIC_TYPE_ARTICLE";
pub const TYPE_MUSIC: &str = "DYNAMIC_TYPE_MUSIC";
pub const TYPE_PGC: &str = "DYNAMIC_TYPE_PGC";
pub const TYPE_LIVE_RCMD: &str = "DYNAMIC_TYPE_LIVE_RCMD";

/// Body used for item types without a dedicated mapping.
pub const UNHANDLED_BODY: &str = "unhandled dynamic type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicCategory {
    Post,
    Video,
    Article,
    Audio,
    Share,
    Forward,
    ShareLive,
}

impl DynamicCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Video => "video",
            Self::Article => "article",
            Self::Audio => "audio",
            Self::Share => "share",
            Self::Forward => "forward",
            Self::ShareLive => "share-live",
        }
    }
}

impl std::fmt::Display for DynamicCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicEntry {
    /// Item id, or the canonical id of the uploaded work (bvid, cv, au).
    pub id: String,
    pub category: DynamicCategory,
    pub author: String,
    /// Publish time in unix seconds.
    pub timestamp: i64,
    pub body: String,
    pub images: Vec<String>,
    pub link: String,
}

/// Outcome of classifying one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Entry(DynamicEntry),
    /// Live recommendation. Only meaningful as the target of a forward.
    LiveStub(DynamicEntry),
    Suppressed,
}

/// Classify a top level item. Live stubs and malformed items yield `None`.
pub fn classify(item: &DynamicItem) -> Option<DynamicEntry> {
    match classify_item(item) {
        Classified::Entry(entry) => Some(entry),
        Classified::LiveStub(_) | Classified::Suppressed => None,
    }
}

pub fn classify_item(item: &DynamicItem) -> Classified {
    let Some(dynamic) = item.modules.module_dynamic.as_ref() else {
        debug!(id = %item.id_str, "dynamic item without module_dynamic");
        return Classified::Suppressed;
    };
    let (author, timestamp) = item
        .modules
        .module_author
        .as_ref()
        .map(|a| (a.name.clone(), a.pub_ts))
        .unwrap_or_default();

    let mut entry = DynamicEntry {
        id: item.id_str.clone(),
        category: DynamicCategory::Post,
        author,
        timestamp,
        body: String::new(),
        images: Vec::new(),
        link: format!("{DYNAMIC_URL_PREFIX}{}", item.id_str),
    };
    let major = dynamic.major.as_ref();

    match item.kind.as_str() {
        TYPE_WORD => {
            entry.body = desc_text(dynamic);
        }
        TYPE_DRAW => {
            entry.body = desc_text(dynamic);
            entry.images = major
                .and_then(|m| m.draw.as_ref())
                .map(|d| d.items.iter().map(|i| i.src.clone()).collect())
                .unwrap_or_default();
        }
        TYPE_AV => {
            let archive = major.and_then(|m| m.archive.clone()).unwrap_or_default();
            entry.category = DynamicCategory::Video;
            entry.link = format!("{VIDEO_URL_PREFIX}{}", archive.bvid);
            entry.id = archive.bvid;
            entry.body = format!("{}\n{}", archive.title, archive.desc);
            entry.images = vec![archive.cover];
        }
        TYPE_ARTICLE => {
            let article = major.and_then(|m| m.article.clone()).unwrap_or_default();
            entry.category = DynamicCategory::Article;
            entry.id = article.id.to_string();
            entry.link = format!("{ARTICLE_URL_PREFIX}{}", entry.id);
            entry.body = format!("{}\n{}", article.title, article.desc);
            entry.images = vec![article.covers.into_iter().next().unwrap_or_default()];
        }
        TYPE_MUSIC => {
            let music = major.and_then(|m| m.music.clone()).unwrap_or_default();
            entry.category = DynamicCategory::Audio;
            entry.id = music.id.to_string();
            entry.link = format!("{AUDIO_URL_PREFIX}{}", entry.id);
            entry.body = music.title;
            entry.images = vec![music.cover];
        }
        TYPE_PGC => {
            let pgc = major.and_then(|m| m.pgc.clone()).unwrap_or_default();
            entry.category = DynamicCategory::Share;
            entry.body = pgc.title;
            entry.images = vec![pgc.cover];
        }
        TYPE_FORWARD => {
            let comment = desc_text(dynamic);
            let Some(orig) = item.orig.as_deref() else {
                debug!(id = %item.id_str, "forward without original item");
                return Classified::Suppressed;
            };
            match classify_item(orig) {
                Classified::Suppressed => return Classified::Suppressed,
                Classified::LiveStub(orig) => {
                    entry.category = DynamicCategory::ShareLive;
                    entry.body = format!(
                        "{comment}\nshares {}'s live room\n{}",
                        orig.author, orig.body
                    );
                    entry.images = orig.images;
                }
                Classified::Entry(orig) => {
                    entry.category = DynamicCategory::Forward;
                    entry.body = format!(
                        "{comment}\nforwarded from: @{}\n{}",
                        orig.author, orig.body
                    );
                    entry.images = orig.images;
                }
            }
        }
        TYPE_LIVE_RCMD => {
            return match live_play_info(major) {
                Some((title, cover)) => {
                    entry.body = format!("title: \"{title}\"");
                    entry.images = vec![cover];
                    Classified::LiveStub(entry)
                }
                None => Classified::Suppressed,
            };
        }
        other => {
            warn!(kind = other, id = %item.id_str, "unhandled dynamic type");
            entry.body = UNHANDLED_BODY.to_string();
        }
    }

    Classified::Entry(entry)
}

fn desc_text(dynamic: &ModuleDynamic) -> String {
    dynamic
        .desc
        .as_ref()
        .map(|d| d.text.clone())
        .unwrap_or_default()
}

/// Title and cover of a live stub, decoded from its embedded JSON content.
fn live_play_info(major: Option<&Major>) -> Option<(String, String)> {
    let content = major
        .and_then(|m| m.live_rcmd.as_ref())
        .map(|l| l.content.as_str())
        .unwrap_or_default();
    if content.is_empty() {
        return None;
    }

    match serde_json::from_str::<LiveRcmdContent>(content) {
        Ok(content) => Some((content.live_play_info.title, content.live_play_info.cover)),
        Err(e) => {
            warn!(error = %e, "malformed live_rcmd content");
            None
        }
    }
}
