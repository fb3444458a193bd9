use serde::Deserialize;
use tracing::warn;

use super::{BiliResponse, LIVE_URL_PREFIX};
use crate::client::HttpClient;
use crate::error::{PlatformError, Result};
use crate::live::LiveRoomInfo;

const ROOM_INFO_URL: &str = "https://api.live.bilibili.com/xlive/web-room/v1/index/getInfoByRoom";

/// Shortest `"{parent}-{area}"` label that is still considered meaningful.
const MIN_AREA_LEN: usize = 3;

#[derive(Debug, Deserialize)]
struct RoomInfoData {
    room_info: Option<RoomInfo>,
    anchor_info: Option<AnchorInfo>,
}

#[derive(Debug, Deserialize)]
struct RoomInfo {
    #[serde(default)]
    uid: u64,
    live_status: Option<i64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    cover: String,
    #[serde(default)]
    area_name: String,
    #[serde(default)]
    parent_area_name: String,
}

#[derive(Debug, Deserialize)]
struct AnchorInfo {
    base_info: Option<BaseInfo>,
}

#[derive(Debug, Deserialize)]
struct BaseInfo {
    uname: Option<String>,
}

/// Live room status fetcher backed by `getInfoByRoom`.
#[derive(Debug, Clone)]
pub struct BilibiliLive {
    client: HttpClient,
}

impl BilibiliLive {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetch the room status. `room_id` may be a short room number.
    pub async fn room_info(&self, room_id: u64) -> Result<LiveRoomInfo> {
        let body = self
            .client
            .get(ROOM_INFO_URL, &[("room_id", room_id.to_string())])
            .await?;
        parse_room_info(room_id, &body)
    }
}

pub fn parse_room_info(room_id: u64, body: &[u8]) -> Result<LiveRoomInfo> {
    let resp: BiliResponse<RoomInfoData> = serde_json::from_slice(body)?;
    let data = resp.into_data()?;

    let room = data
        .room_info
        .ok_or(PlatformError::MissingField("data.room_info"))?;
    let uname = data
        .anchor_info
        .and_then(|a| a.base_info)
        .ok_or(PlatformError::MissingField("data.anchor_info.base_info"))?
        .uname
        .ok_or(PlatformError::MissingField("base_info.uname"))?;
    let status = room
        .live_status
        .ok_or(PlatformError::MissingField("room_info.live_status"))?;

    let mut info = LiveRoomInfo {
        user_id: room.uid.to_string(),
        user_name: uname,
        room_id: room_id.to_string(),
        is_live: status == 1,
        link: format!("{LIVE_URL_PREFIX}{room_id}"),
        ..Default::default()
    };
    if !info.is_live {
        return Ok(info);
    }

    let area = format!("{}-{}", room.parent_area_name, room.area_name);
    if area.len() < MIN_AREA_LEN {
        warn!(room_id, "room area label is empty, dropping it");
    } else {
        info.area = Some(area);
    }
    info.title = room.title;
    info.cover = room.cover;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(live_status: i64, parent: &str, area: &str) -> String {
        serde_json::json!({
            "code": 0,
            "msg": "ok",
            "message": "ok",
            "data": {
                "room_info": {
                    "uid": 1234,
                    "room_id": 21452505,
                    "live_status": live_status,
                    "title": "late night stream",
                    "cover": "https://i0.hdslb.com/cover.jpg",
                    "area_name": area,
                    "parent_area_name": parent
                },
                "anchor_info": { "base_info": { "uname": "streamer" } }
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_live_room() {
        let info = parse_room_info(510, body(1, "Games", "Minecraft").as_bytes()).unwrap();
        assert!(info.is_live);
        assert_eq!(info.user_id, "1234");
        assert_eq!(info.user_name, "streamer");
        assert_eq!(info.room_id, "510");
        assert_eq!(info.title, "late night stream");
        assert_eq!(info.cover, "https://i0.hdslb.com/cover.jpg");
        assert_eq!(info.area.as_deref(), Some("Games-Minecraft"));
        assert_eq!(info.link, "https://live.bilibili.com/510");
    }

    #[test]
    fn test_parse_offline_room_skips_details() {
        let info = parse_room_info(510, body(0, "Games", "Minecraft").as_bytes()).unwrap();
        assert!(!info.is_live);
        assert!(info.title.is_empty());
        assert!(info.cover.is_empty());
        assert_eq!(info.area, None);
    }

    #[test]
    fn test_short_area_is_dropped() {
        let info = parse_room_info(510, body(1, "", "").as_bytes()).unwrap();
        assert_eq!(info.area, None);
    }

    #[test]
    fn test_round_status_is_not_live() {
        // 2 means the room is looping recorded videos
        let info = parse_room_info(510, body(2, "a", "b").as_bytes()).unwrap();
        assert!(!info.is_live);
    }

    #[test]
    fn test_missing_live_status() {
        let raw = r#"{"code":0,"data":{"room_info":{"uid":1},"anchor_info":{"base_info":{"uname":"x"}}}}"#;
        assert!(matches!(
            parse_room_info(1, raw.as_bytes()),
            Err(PlatformError::MissingField("room_info.live_status"))
        ));
    }

    #[test]
    fn test_api_error() {
        let raw = r#"{"code":19002000,"msg":"room not found"}"#;
        assert!(matches!(
            parse_room_info(1, raw.as_bytes()),
            Err(PlatformError::Api { code: 19002000, .. })
        ));
    }
}
