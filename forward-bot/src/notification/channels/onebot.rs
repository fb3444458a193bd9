//! Guild channel delivery through a OneBot connection.
//!
//! A message goes to every guild whose subscription includes the message's
//! source flag. Delivery results arrive later as echo frames and are only
//! logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use onebot::{CqCode, ECHO_SEND_GUILD_MSG, EchoRegistry, OneBotClient, OneBotConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::NotificationChannel;
use crate::error::{Error, Result};
use crate::message::FeedItem;
use crate::subscription::SubscriptionTable;

/// OneBot channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotChannelConfig {
    /// Whether the channel is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Websocket endpoint of the bot, `ws://` or `wss://`.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Capacity of the inbound and outbound frame queues.
    #[serde(default = "default_buf_size")]
    pub buf_size: usize,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_url() -> String {
    "ws://127.0.0.1:6700".to_string()
}

fn default_buf_size() -> usize {
    16
}

fn default_heartbeat_timeout() -> u64 {
    20
}

impl Default for OneBotChannelConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_url(),
            access_token: None,
            buf_size: default_buf_size(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
        }
    }
}

impl OneBotChannelConfig {
    pub fn client_config(&self) -> OneBotConfig {
        OneBotConfig {
            url: self.url.clone(),
            access_token: self.access_token.clone(),
            buffer: self.buf_size,
            ..Default::default()
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

pub struct OneBotChannel {
    client: OneBotClient,
    subscriptions: Arc<SubscriptionTable>,
}

impl OneBotChannel {
    pub fn new(client: OneBotClient, subscriptions: Arc<SubscriptionTable>) -> Self {
        register_send_echo(client.echo_registry());
        Self {
            client,
            subscriptions,
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionTable> {
        &self.subscriptions
    }
}

/// Log the outcome of every `send_guild_channel_msg` action.
fn register_send_echo(registry: &EchoRegistry) {
    registry.register(ECHO_SEND_GUILD_MSG, |response| {
        if response.is_ok() {
            debug!("Guild message delivered");
        } else {
            warn!(
                retcode = response.retcode,
                msg = response.msg.as_deref().unwrap_or_default(),
                wording = response.wording.as_deref().unwrap_or_default(),
                "Guild message rejected"
            );
        }
        true
    });
}

/// Plain text of a message, headed by `time`. Images are appended as CQ
/// codes.
pub fn build_message(item: &FeedItem, time: &str) -> String {
    let mut text = format!("{time}\n{} {}\n{}", item.author, item.title, item.body);
    if !item.link.is_empty() {
        text.push('\n');
        text.push_str(&item.link);
    }
    for image in &item.images {
        text.push_str(&CqCode::image(image.as_str()).to_string());
    }
    text
}

#[async_trait]
impl NotificationChannel for OneBotChannel {
    fn channel_type(&self) -> &'static str {
        "onebot"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, item: &FeedItem) -> Result<()> {
        // snapshot so the table lock is not held across sends
        let targets = self.subscriptions.targets(item.source);
        if targets.is_empty() {
            debug!(source = %item.source, "No guild subscribed");
            return Ok(());
        }

        let text = build_message(item, &item.local_time());
        let mut failed = 0;
        for (guild_id, channel_id) in &targets {
            if let Err(e) = self.client.send_guild_msg(*guild_id, *channel_id, &text).await {
                error!(guild_id, channel_id, error = %e, "Failed to queue guild message");
                failed += 1;
            }
        }

        info!(
            source = %item.source,
            targets = targets.len(),
            failed,
            "Guild messages queued"
        );
        if failed > 0 {
            return Err(Error::delivery(format!(
                "{failed} of {} guild messages could not be queued",
                targets.len()
            )));
        }
        Ok(())
    }
}
