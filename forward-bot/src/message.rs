//! Normalized messages flowing from sources to sinks.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use feed_platforms::LiveRoomInfo;
use feed_platforms::bilibili::{DynamicCategory, DynamicEntry};

/// Body of a "went offline" message.
pub const OFFLINE_BODY: &str = "the stream has ended";

/// Author of messages produced by the bot itself.
pub const BOT_AUTHOR: &str = "Bot";

pub const TEST_IMAGE: &str =
    "https://i0.hdslb.com/bfs/emote/332a6df0e6def8da77e09310a62f3bffdc397640.png";

/// Which source produced a message. Used only for subscription routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFlag {
    BiliLive,
    BiliDynamic,
    DouyinLive,
}

impl SourceFlag {
    pub const ALL: [SourceFlag; 3] = [Self::BiliLive, Self::BiliDynamic, Self::DouyinLive];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BiliLive => "bili-live",
            Self::BiliDynamic => "bili-dynamic",
            Self::DouyinLive => "douyin-live",
        }
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for SourceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of [`SourceFlag`]s, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagSet(u8);

impl FlagSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        SourceFlag::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, flag: SourceFlag) {
        self.0 |= flag.bit();
    }

    pub fn remove(&mut self, flag: SourceFlag) {
        self.0 &= !flag.bit();
    }

    pub fn contains(self, flag: SourceFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = SourceFlag> {
        SourceFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<SourceFlag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = SourceFlag>>(iter: I) -> Self {
        let mut set = Self::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Post,
    Video,
    Article,
    Audio,
    Share,
    Forward,
    ShareLive,
    WentLive,
    WentOffline,
    Test,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Video => "video",
            Self::Article => "article",
            Self::Audio => "audio",
            Self::Share => "share",
            Self::Forward => "forward",
            Self::ShareLive => "share-live",
            Self::WentLive => "went live",
            Self::WentOffline => "went offline",
            Self::Test => "test",
        }
    }

    /// Phrase shown after the author name.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Post => "posted an update",
            Self::Video => "uploaded a video",
            Self::Article => "published an article",
            Self::Audio => "uploaded audio",
            Self::Share => "shared an episode",
            Self::Forward => "forwarded an update",
            Self::ShareLive => "shared a live room",
            Self::WentLive => "went live",
            Self::WentOffline => "went offline",
            Self::Test => "push test",
        }
    }
}

impl From<DynamicCategory> for Category {
    fn from(category: DynamicCategory) -> Self {
        match category {
            DynamicCategory::Post => Self::Post,
            DynamicCategory::Video => Self::Video,
            DynamicCategory::Article => Self::Article,
            DynamicCategory::Audio => Self::Audio,
            DynamicCategory::Share => Self::Share,
            DynamicCategory::Forward => Self::Forward,
            DynamicCategory::ShareLive => Self::ShareLive,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub author: String,
    pub title: String,
    pub body: String,
    pub images: Vec<String>,
    /// Empty when there is nothing to link to.
    pub link: String,
    pub source: SourceFlag,
}

impl FeedItem {
    pub fn from_dynamic(entry: DynamicEntry) -> Self {
        let category = Category::from(entry.category);
        Self {
            timestamp: DateTime::from_timestamp(entry.timestamp, 0).unwrap_or_default(),
            category,
            author: entry.author,
            title: category.headline().to_string(),
            body: entry.body,
            images: entry.images,
            link: entry.link,
            source: SourceFlag::BiliDynamic,
        }
    }

    pub fn went_live(info: &LiveRoomInfo, source: SourceFlag, now: DateTime<Utc>) -> Self {
        let mut body = format!("title: \"{}\"", info.title);
        if let Some(area) = &info.area {
            body.push_str(&format!("\narea: \"{area}\""));
        }
        Self {
            timestamp: now,
            category: Category::WentLive,
            author: info.user_name.clone(),
            title: Category::WentLive.headline().to_string(),
            body,
            images: vec![info.cover.clone()],
            link: info.link.clone(),
            source,
        }
    }

    pub fn went_offline(info: &LiveRoomInfo, source: SourceFlag, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            category: Category::WentOffline,
            author: info.user_name.clone(),
            title: Category::WentOffline.headline().to_string(),
            body: OFFLINE_BODY.to_string(),
            images: Vec::new(),
            link: String::new(),
            source,
        }
    }

    pub fn push_test(source: SourceFlag, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            category: Category::Test,
            author: BOT_AUTHOR.to_string(),
            title: Category::Test.headline().to_string(),
            body: format!("test message, flag={}", source.index()),
            images: vec![TEST_IMAGE.to_string()],
            link: String::new(),
            source,
        }
    }

    /// Timestamp in local time, minute precision.
    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set_operations() {
        let mut set = FlagSet::empty();
        assert!(set.is_empty());

        set.insert(SourceFlag::BiliLive);
        set.insert(SourceFlag::DouyinLive);
        set.insert(SourceFlag::BiliLive);
        assert!(set.contains(SourceFlag::BiliLive));
        assert!(!set.contains(SourceFlag::BiliDynamic));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![SourceFlag::BiliLive, SourceFlag::DouyinLive]
        );

        set.remove(SourceFlag::BiliLive);
        set.remove(SourceFlag::BiliDynamic);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![SourceFlag::DouyinLive]);

        set.remove(SourceFlag::DouyinLive);
        assert!(set.is_empty());
        assert_eq!(set, FlagSet::default());
    }

    #[test]
    fn test_flag_set_all() {
        let all = FlagSet::all();
        assert!(SourceFlag::ALL.iter().all(|f| all.contains(*f)));
    }

    #[test]
    fn test_source_flag_index() {
        for flag in SourceFlag::ALL {
            assert_eq!(SourceFlag::from_index(flag.index()), Some(flag));
        }
        assert_eq!(SourceFlag::from_index(3), None);
    }

    #[test]
    fn test_went_live_body() {
        let info = LiveRoomInfo {
            user_name: "streamer".to_string(),
            is_live: true,
            title: "T".to_string(),
            cover: "c".to_string(),
            area: Some("Games-Minecraft".to_string()),
            link: "https://live.bilibili.com/1".to_string(),
            ..Default::default()
        };
        let item = FeedItem::went_live(&info, SourceFlag::BiliLive, Utc::now());
        assert_eq!(item.body, "title: \"T\"\narea: \"Games-Minecraft\"");
        assert_eq!(item.images, vec!["c"]);
        assert_eq!(item.title, "went live");

        let offline = FeedItem::went_offline(&info, SourceFlag::BiliLive, Utc::now());
        assert_eq!(offline.body, OFFLINE_BODY);
        assert!(offline.images.is_empty());
        assert!(offline.link.is_empty());
    }

    #[test]
    fn test_from_dynamic() {
        let entry = DynamicEntry {
            id: "1".to_string(),
            category: DynamicCategory::ShareLive,
            author: "fan".to_string(),
            timestamp: 1_662_361_916,
            body: "b".to_string(),
            images: vec!["x".to_string()],
            link: "https://t.bilibili.com/1".to_string(),
        };
        let item = FeedItem::from_dynamic(entry);
        assert_eq!(item.category, Category::ShareLive);
        assert_eq!(item.title, "shared a live room");
        assert_eq!(item.timestamp.timestamp(), 1_662_361_916);
        assert_eq!(item.source, SourceFlag::BiliDynamic);
    }
}
