//! Inbound frames pushed by the OneBot server.
//!
//! Three shapes matter here: heartbeats (`post_type = meta_event`), guild
//! channel messages that mention the bot, and echoes of API calls (any
//! frame carrying `retcode`).

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cq_code::CqCode;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Heartbeat { time: i64 },
    GuildMessage(GuildMessage),
    Echo(EchoResponse),
}

/// Channel message addressed to the bot. `text` has the leading mention
/// removed and is trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMessage {
    pub time: i64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub self_id: u64,
    pub sender_id: u64,
    pub message_id: String,
    pub text: String,
}

/// Response to an API call, matched to its request by `echo`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EchoResponse {
    #[serde(default)]
    pub status: String,
    pub retcode: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub wording: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub echo: Option<String>,
}

impl EchoResponse {
    pub fn is_ok(&self) -> bool {
        self.retcode == 0
    }
}

/// Ids arrive as strings or numbers depending on the server build.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    post_type: Option<String>,
    #[serde(default)]
    time: i64,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    sub_type: Option<String>,
    #[serde(default)]
    message: Value,
    #[serde(default, deserialize_with = "id_string")]
    message_id: Option<String>,
    #[serde(default, deserialize_with = "id_string")]
    self_tiny_id: Option<String>,
    #[serde(default, deserialize_with = "id_string")]
    guild_id: Option<String>,
    #[serde(default, deserialize_with = "id_string")]
    channel_id: Option<String>,
    #[serde(default)]
    sender: Option<RawSender>,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    #[serde(default, deserialize_with = "id_string")]
    user_id: Option<String>,
}

/// Parse one text frame. `Ok(None)` means the frame is valid but not
/// relevant to the bot.
pub fn parse_event(raw: &str) -> Result<Option<Event>> {
    let value: Value = serde_json::from_str(raw)?;
    if value.get("retcode").is_some() {
        let echo: EchoResponse = serde_json::from_value(value)?;
        return Ok(Some(Event::Echo(echo)));
    }

    let event: RawEvent = serde_json::from_value(value)?;
    Ok(match event.post_type.as_deref() {
        Some("meta_event") => Some(Event::Heartbeat { time: event.time }),
        Some("message") => guild_message(event).map(Event::GuildMessage),
        _ => None,
    })
}

fn guild_message(event: RawEvent) -> Option<GuildMessage> {
    if event.message_type.as_deref() != Some("guild")
        || event.sub_type.as_deref() != Some("channel")
    {
        return None;
    }

    let text = event.message.as_str()?;
    if !text.starts_with("[CQ:at") {
        return None;
    }
    let end = text.find(']')?;
    let mention = CqCode::parse(&text[..=end])?;
    let self_tiny_id = event.self_tiny_id?;
    if mention.kind != "at" || mention.get("qq") != Some(self_tiny_id.as_str()) {
        return None;
    }

    Some(GuildMessage {
        time: event.time,
        guild_id: event.guild_id?.parse().ok()?,
        channel_id: event.channel_id?.parse().ok()?,
        self_id: self_tiny_id.parse().ok()?,
        sender_id: event
            .sender
            .and_then(|s| s.user_id)
            .and_then(|id| id.parse().ok())
            .unwrap_or_default(),
        message_id: event.message_id.unwrap_or_default(),
        text: text[end + 1..].trim().to_string(),
    })
}
