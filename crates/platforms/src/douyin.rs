//! Douyin live room status, scraped from the web live page.
//!
//! The page embeds its initial state as URL-encoded JSON inside a
//! `RENDER_DATA` script tag. The page is only served with valid
//! `__ac_nonce` / `__ac_signature` cookies.

use serde::Deserialize;

use crate::client::HttpClient;
use crate::error::{PlatformError, Result};
use crate::live::LiveRoomInfo;

const LIVE_URL: &str = "https://live.douyin.com/";
pub const LIVE_SHARE_URL_PREFIX: &str = "https://webcast.amemv.com/douyin/webcast/reflow/";

const RENDER_DATA_START: &str = r#"<script id="RENDER_DATA" type="application/json">"#;
const RENDER_DATA_END: &str = "</script>";
const ROOM_INFO_POINTER: &str = "/app/initialState/roomStore/roomInfo";

/// `room.status` value of a room that is currently live.
const STATUS_LIVE: i64 = 2;

#[derive(Debug, Deserialize)]
struct RoomInfo {
    room: Option<Room>,
    anchor: Option<Anchor>,
    /// Mobile room id, differs from the web id used in the page URL.
    #[serde(rename = "roomId", default)]
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct Room {
    status: Option<i64>,
    #[serde(default)]
    title: String,
    cover: Option<Cover>,
}

#[derive(Debug, Deserialize)]
struct Cover {
    #[serde(default)]
    url_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Anchor {
    #[serde(default)]
    id_str: String,
    #[serde(default)]
    nickname: String,
}

#[derive(Debug, Clone)]
pub struct DouyinLive {
    client: HttpClient,
}

impl DouyinLive {
    pub fn new(mut client: HttpClient, nonce: &str, signature: &str) -> Self {
        client.set_cookie("__ac_nonce", nonce);
        client.set_cookie("__ac_signature", signature);
        client.set_cookie("__ac_referer", LIVE_URL);
        Self { client }
    }

    /// Fetch the status of the room behind `web_rid` (the id in the page URL).
    pub async fn room_info(&self, web_rid: &str) -> Result<LiveRoomInfo> {
        let body = self.client.get(&format!("{LIVE_URL}{web_rid}"), &[]).await?;
        let html = String::from_utf8_lossy(&body);
        parse_live_page(&html)
    }
}

/// Cut the URL-decoded `RENDER_DATA` JSON out of a live page.
pub fn extract_render_data(html: &str) -> Result<String> {
    let start = html.find(RENDER_DATA_START).ok_or_else(|| {
        PlatformError::markup("render data start not found, signature may be invalid")
    })?;
    let rest = &html[start + RENDER_DATA_START.len()..];
    let end = rest.find(RENDER_DATA_END).ok_or_else(|| {
        PlatformError::markup("render data end not found, signature may be invalid")
    })?;

    urlencoding::decode(&rest[..end])
        .map(|s| s.into_owned())
        .map_err(|e| PlatformError::markup(format!("render data is not valid utf-8: {e}")))
}

pub fn parse_live_page(html: &str) -> Result<LiveRoomInfo> {
    let json = extract_render_data(html)?;
    let mut state: serde_json::Value = serde_json::from_str(&json)?;
    let room_info = state
        .pointer_mut(ROOM_INFO_POINTER)
        .map(serde_json::Value::take)
        .ok_or(PlatformError::MissingField("app.initialState.roomStore.roomInfo"))?;
    let room_info: RoomInfo = serde_json::from_value(room_info)?;

    let room = room_info
        .room
        .ok_or(PlatformError::MissingField("roomInfo.room"))?;
    let anchor = room_info
        .anchor
        .ok_or(PlatformError::MissingField("roomInfo.anchor"))?;
    let status = room
        .status
        .ok_or(PlatformError::MissingField("room.status"))?;

    let mut info = LiveRoomInfo {
        user_id: anchor.id_str,
        user_name: anchor.nickname,
        is_live: status == STATUS_LIVE,
        link: format!("{LIVE_SHARE_URL_PREFIX}{}", room_info.room_id),
        room_id: room_info.room_id,
        ..Default::default()
    };
    if info.is_live {
        info.title = room.title;
        info.cover = room
            .cover
            .and_then(|c| c.url_list.into_iter().next())
            .unwrap_or_default();
    }
    Ok(info)
}
