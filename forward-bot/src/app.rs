//! Wires sources, channels and the guild bot from a [`Config`].

use std::sync::{Arc, OnceLock};

use feed_platforms::HttpClient;
use feed_platforms::bilibili::{BilibiliDynamic, BilibiliLive};
use feed_platforms::douyin::DouyinLive;
use onebot::{Event, OneBotClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bot::BotListener;
use crate::config::Config;
use crate::error::Result;
use crate::monitor::{DynamicPoller, LivePoller, test_source};
use crate::notification::channels::{DingTalkChannel, OneBotChannel};
use crate::notification::{NotificationService, NotificationServiceConfig};
use crate::subscription::SubscriptionTable;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

struct BotTasks {
    listener: BotListener,
    events: mpsc::Receiver<Event>,
    connection: JoinHandle<()>,
}

pub struct App {
    service: NotificationService,
    bot: Option<BotTasks>,
    subscriptions: Option<Arc<SubscriptionTable>>,
}

impl App {
    /// Build every component. The bot connection starts immediately and
    /// stops with `cancel`.
    pub fn build(config: &Config, cancel: &CancellationToken) -> Result<Self> {
        install_rustls_provider();

        let poller = config.poller_config();
        let mut service = NotificationService::new(NotificationServiceConfig {
            buffer: config.msg_buf,
        });

        if !config.bilibili.live.is_empty() {
            let fetcher = BilibiliLive::new(HttpClient::new()?);
            service.add_source(Box::new(LivePoller::new(
                fetcher,
                config.bilibili.live.clone(),
                poller,
            )));
        }
        if !config.bilibili.dynamic.is_empty() {
            let fetcher = BilibiliDynamic::new(HttpClient::new()?);
            service.add_source(Box::new(DynamicPoller::new(
                fetcher,
                config.bilibili.dynamic.clone(),
                poller,
            )));
        }
        if !config.douyin.users.is_empty() {
            let fetcher = DouyinLive::new(
                HttpClient::new()?,
                &config.douyin.nonce,
                &config.douyin.signature,
            );
            service.add_source(Box::new(LivePoller::new(
                fetcher,
                config.douyin.users.clone(),
                poller,
            )));
        }

        if let Some(dingtalk) = &config.dingtalk {
            service.add_channel(Arc::new(DingTalkChannel::new(dingtalk.clone())));
        }

        let mut bot = None;
        let mut subscriptions = None;
        if let Some(onebot) = config.onebot.as_ref().filter(|o| o.enabled) {
            let (client, events, connection) =
                OneBotClient::spawn(onebot.client_config(), cancel.child_token())?;
            let table = Arc::new(SubscriptionTable::new());
            let (source, trigger) = test_source();

            service.add_source(Box::new(source));
            service.add_channel(Arc::new(OneBotChannel::new(client.clone(), table.clone())));
            bot = Some(BotTasks {
                listener: BotListener::new(
                    client,
                    table.clone(),
                    Some(trigger),
                    onebot.heartbeat_timeout(),
                ),
                events,
                connection,
            });
            subscriptions = Some(table);
        }

        if service.channel_count() == 0 {
            warn!("No delivery channel configured");
        }

        Ok(Self {
            service,
            bot,
            subscriptions,
        })
    }

    pub fn subscriptions(&self) -> Option<&Arc<SubscriptionTable>> {
        self.subscriptions.as_ref()
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let bot = self.bot.map(|bot| {
            let listener = tokio::spawn(bot.listener.run(bot.events, cancel.clone()));
            (listener, bot.connection)
        });

        self.service.run(cancel.clone()).await;
        cancel.cancel();

        if let Some((listener, connection)) = bot {
            if let Err(e) = listener.await {
                warn!(error = %e, "Bot listener task failed");
            }
            if let Err(e) = connection.await {
                warn!(error = %e, "Bot connection task failed");
            }
        }
        info!("All tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_without_bot() {
        let config = Config::parse("[bilibili]\nlive = [1]\ndynamic = [2]").unwrap();
        let cancel = CancellationToken::new();
        let app = App::build(&config, &cancel).unwrap();
        assert!(app.subscriptions().is_none());
        assert_eq!(app.service.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_build_with_channels() {
        let config = Config::parse(
            r#"
[dingtalk]
webhook = "https://oapi.dingtalk.com/robot/send?access_token=x"
secret = "s"

[onebot]
url = "ws://127.0.0.1:9"
"#,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let app = App::build(&config, &cancel).unwrap();
        assert!(app.subscriptions().is_some());
        assert_eq!(app.service.channel_count(), 2);

        cancel.cancel();
        app.run(cancel).await;
    }
}
