//! Guild bot command listener.
//!
//! Consumes the events of a [`OneBotClient`], applies subscription commands
//! and watches the heartbeat stream.

mod commands;

pub use commands::{BotCommand, help_text};

use std::sync::Arc;
use std::time::Duration;

use onebot::{Command, CqCode, Event, GuildMessage, OneBotClient};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::monitor::TestTrigger;
use crate::subscription::SubscriptionTable;

/// Default time without heartbeat before warning.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct BotListener {
    client: OneBotClient,
    subscriptions: Arc<SubscriptionTable>,
    trigger: Option<TestTrigger>,
    heartbeat_timeout: Duration,
}

impl BotListener {
    pub fn new(
        client: OneBotClient,
        subscriptions: Arc<SubscriptionTable>,
        trigger: Option<TestTrigger>,
        heartbeat_timeout: Duration,
    ) -> Self {
        Self {
            client,
            subscriptions,
            trigger,
            heartbeat_timeout,
        }
    }

    /// Apply the command carried by `message` and return the reply to post.
    pub async fn execute(&self, message: &GuildMessage) -> Option<String> {
        let Some(command) = Command::parse(&message.text) else {
            debug!(text = %message.text, "Mention without command");
            return None;
        };
        let Some(action) = BotCommand::from_command(&command) else {
            warn!(
                command = %command.name,
                guild_id = message.guild_id,
                "Unknown command"
            );
            return None;
        };

        info!(
            ?action,
            guild_id = message.guild_id,
            channel_id = message.channel_id,
            sender_id = message.sender_id,
            "Command received"
        );

        let (guild, channel) = (message.guild_id, message.channel_id);
        let outcome = match action {
            BotCommand::Help => {
                return Some(format!("{}\n{}", CqCode::at(message.sender_id), help_text()));
            }
            BotCommand::PushTest(index) => {
                self.push_test(index).await;
                return None;
            }
            BotCommand::SubscribeAll => self.subscriptions.subscribe_all(guild, channel),
            BotCommand::UnsubscribeAll => self.subscriptions.unsubscribe_all(guild),
            BotCommand::Subscribe(flag) => self.subscriptions.subscribe(guild, channel, flag),
            BotCommand::Unsubscribe(flag) => self.subscriptions.unsubscribe(guild, channel, flag),
        };
        Some(outcome.reply().to_string())
    }

    async fn push_test(&self, index: usize) {
        let Some(trigger) = &self.trigger else {
            warn!("Push test requested but no test source is configured");
            return;
        };
        if let Err(e) = trigger.trigger(index).await {
            error!(error = %e, "Failed to queue test message");
        }
    }

    async fn handle(&self, message: &GuildMessage) {
        let Some(reply) = self.execute(message).await else {
            return;
        };
        if let Err(e) = self
            .client
            .send_guild_msg(message.guild_id, message.channel_id, &reply)
            .await
        {
            error!(
                guild_id = message.guild_id,
                channel_id = message.channel_id,
                error = %e,
                "Failed to send reply"
            );
        }
    }

    /// Process events until cancelled or the connection task ends.
    pub async fn run(self, mut events: mpsc::Receiver<Event>, cancel: CancellationToken) {
        let mut watchdog = tokio::time::interval(self.heartbeat_timeout);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_heartbeat = Instant::now();
        info!("Bot listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = watchdog.tick() => {
                    let silent = last_heartbeat.elapsed();
                    if silent >= self.heartbeat_timeout {
                        warn!(silent_secs = silent.as_secs(), "No heartbeat from bot");
                    }
                }
                event = events.recv() => match event {
                    Some(Event::Heartbeat { time }) => {
                        trace!(time, "Heartbeat");
                        last_heartbeat = Instant::now();
                    }
                    Some(Event::GuildMessage(message)) => self.handle(&message).await,
                    Some(Event::Echo(response)) => {
                        debug!(echo = ?response.echo, retcode = response.retcode, "Unhandled echo");
                    }
                    None => break,
                },
            }
        }

        info!("Bot listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SourceFlag;
    use crate::monitor::test_source;
    use onebot::OneBotConfig;

    fn message(text: &str) -> GuildMessage {
        GuildMessage {
            time: 0,
            guild_id: 1,
            channel_id: 10,
            self_id: 99,
            sender_id: 42,
            message_id: "m".to_string(),
            text: text.to_string(),
        }
    }

    /// A client whose connection never comes up; replies are never sent.
    fn offline_client(cancel: &CancellationToken) -> OneBotClient {
        let config = OneBotConfig {
            url: "ws://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let (client, _events, _handle) = OneBotClient::spawn(config, cancel.clone()).unwrap();
        client
    }

    #[tokio::test]
    async fn test_subscription_commands() {
        let cancel = CancellationToken::new();
        let table = Arc::new(SubscriptionTable::new());
        let listener = BotListener::new(
            offline_client(&cancel),
            table.clone(),
            None,
            DEFAULT_HEARTBEAT_TIMEOUT,
        );

        let reply = listener.execute(&message("/b站开播")).await;
        assert_eq!(reply.as_deref(), Some("subscribed"));
        let reply = listener.execute(&message("/sub-bili-live")).await;
        assert_eq!(reply.as_deref(), Some("already subscribed"));
        assert_eq!(table.targets(SourceFlag::BiliLive), vec![(1, 10)]);

        let reply = listener.execute(&message("/取消订阅")).await;
        assert_eq!(reply.as_deref(), Some("unsubscribed"));
        assert!(table.is_empty());

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_help_mentions_sender() {
        let cancel = CancellationToken::new();
        let listener = BotListener::new(
            offline_client(&cancel),
            Arc::new(SubscriptionTable::new()),
            None,
            DEFAULT_HEARTBEAT_TIMEOUT,
        );

        let reply = listener.execute(&message("/啵啵")).await.unwrap();
        assert!(reply.starts_with("[CQ:at,qq=42]\n"));
        assert!(reply.contains("/subscribe-all"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unknown_and_plain_text_are_ignored() {
        let cancel = CancellationToken::new();
        let listener = BotListener::new(
            offline_client(&cancel),
            Arc::new(SubscriptionTable::new()),
            None,
            DEFAULT_HEARTBEAT_TIMEOUT,
        );

        assert_eq!(listener.execute(&message("/dance")).await, None);
        assert_eq!(listener.execute(&message("hello")).await, None);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_push_test_queues_message() {
        let cancel = CancellationToken::new();
        let (source, trigger) = test_source();
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(crate::monitor::Source::run(Box::new(source), tx, cancel.clone()));

        let listener = BotListener::new(
            offline_client(&cancel),
            Arc::new(SubscriptionTable::new()),
            Some(trigger),
            DEFAULT_HEARTBEAT_TIMEOUT,
        );

        assert_eq!(listener.execute(&message("/推送测试 1")).await, None);
        let item = rx.recv().await.unwrap();
        assert_eq!(item.source, SourceFlag::BiliDynamic);
        cancel.cancel();
    }
}
