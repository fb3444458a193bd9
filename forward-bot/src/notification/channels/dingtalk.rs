//! DingTalk group robot channel.
//!
//! Messages are posted as markdown to a signed robot webhook. The signature
//! is `HMAC-SHA256(secret, "{timestamp}\n{secret}")`, base64 then URL encoded,
//! with the timestamp in unix milliseconds.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::error::{Error, Result};
use crate::message::FeedItem;

type HmacSha256 = Hmac<Sha256>;

/// DingTalk channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DingTalkConfig {
    /// Whether the channel is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Robot webhook URL, including its `access_token` query.
    #[serde(default)]
    pub webhook: String,
    /// Signing secret of the robot.
    #[serde(default)]
    pub secret: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    10
}

impl Default for DingTalkConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            webhook: String::new(),
            secret: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DingTalkResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl DingTalkResponse {
    /// Decode the robot reply. An empty or malformed body is a failure.
    fn parse(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Err(Error::delivery("DingTalk returned an empty response"));
        }
        serde_json::from_str(body)
            .map_err(|e| Error::delivery(format!("DingTalk returned an invalid response: {e}")))
    }

    fn check(&self) -> Result<()> {
        if self.errcode != 0 {
            return Err(Error::delivery(format!(
                "DingTalk rejected message: {} ({})",
                self.errmsg, self.errcode
            )));
        }
        Ok(())
    }
}

pub struct DingTalkChannel {
    config: DingTalkConfig,
    client: Client,
}

impl DingTalkChannel {
    pub fn new(config: DingTalkConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    fn signed_url(&self, timestamp_ms: i64) -> Result<String> {
        let sign = sign(&self.config.secret, timestamp_ms)?;
        Ok(format!(
            "{}&timestamp={timestamp_ms}&sign={sign}",
            self.config.webhook
        ))
    }
}

/// Compute the URL-encoded request signature.
pub fn sign(secret: &str, timestamp_ms: i64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::config(format!("invalid DingTalk secret: {e}")))?;
    mac.update(format!("{timestamp_ms}\n{secret}").as_bytes());
    let digest = STANDARD.encode(mac.finalize().into_bytes());
    Ok(urlencoding::encode(&digest).into_owned())
}

/// Escape markdown control characters. Single newlines become paragraph
/// breaks, since DingTalk collapses them otherwise.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '*' | '[' | ']' | '(' | ')' | '>' | '-' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\n\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Markdown text of a message, headed by `time`.
pub fn build_text(item: &FeedItem, time: &str) -> String {
    let mut text = format!(
        "{time}\n\n{} {}\n\n{}\n\n",
        item.author,
        item.title,
        escape_markdown(&item.body)
    );
    if !item.link.is_empty() {
        text.push_str(&format!("<a>{}</a>\n\n", item.link));
        text.push_str(&format!("[open link]({})\n\n", item.link));
    }
    let images: Vec<String> = item
        .images
        .iter()
        .map(|img| format!("![cover]({img})"))
        .collect();
    text.push_str(&images.join("\n\n"));
    text
}

pub fn build_payload(item: &FeedItem, time: &str) -> Value {
    json!({
        "msgtype": "markdown",
        "markdown": {
            "title": format!("{}{}", item.author, item.title),
            "text": build_text(item, time),
        }
    })
}

#[async_trait]
impl NotificationChannel for DingTalkChannel {
    fn channel_type(&self) -> &'static str {
        "dingtalk"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.webhook.is_empty()
    }

    async fn send(&self, item: &FeedItem) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let url = self.signed_url(Utc::now().timestamp_millis())?;
        let payload = build_payload(item, &item.local_time());

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::delivery(format!("DingTalk request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("DingTalk webhook failed: {} - {}", status, body);
            return Err(Error::delivery(format!(
                "DingTalk webhook failed: {status} - {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::delivery(format!("DingTalk response unreadable: {e}")))?;
        DingTalkResponse::parse(&body)?.check()?;

        debug!(author = %item.author, category = %item.category, "DingTalk message sent");
        Ok(())
    }
}
