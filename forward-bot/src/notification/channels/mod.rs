//! Notification channels.
//!
//! - DingTalk group robot (signed markdown webhook)
//! - OneBot guild channels, routed by subscription

mod dingtalk;
mod onebot;

pub use dingtalk::{DingTalkChannel, DingTalkConfig, build_payload, escape_markdown, sign};
pub use onebot::{OneBotChannel, OneBotChannelConfig, build_message};

use async_trait::async_trait;

use crate::error::Result;
use crate::message::FeedItem;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool;

    /// Deliver one message.
    async fn send(&self, item: &FeedItem) -> Result<()>;
}
