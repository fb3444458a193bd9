/// Snapshot of a live room as reported by a platform.
///
/// `title`, `cover` and `area` are only filled while the room is live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveRoomInfo {
    pub user_id: String,
    pub user_name: String,
    pub room_id: String,
    pub is_live: bool,
    pub title: String,
    pub cover: String,
    /// Category label, dropped when the platform returned an unusable one.
    pub area: Option<String>,
    /// Public link to the room.
    pub link: String,
}
