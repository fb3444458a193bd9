//! Live status polling.

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_platforms::LiveRoomInfo;
use feed_platforms::bilibili::BilibiliLive;
use feed_platforms::douyin::DouyinLive;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::detector::{LiveStateTracker, LiveTransition};
use super::{PollerConfig, Source};
use crate::error::{Error, Result};
use crate::message::{FeedItem, SourceFlag};

/// Fetches the current state of one live room.
#[async_trait]
pub trait LiveFetcher: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;

    fn source(&self) -> SourceFlag;

    async fn fetch(&self, key: &Self::Key) -> feed_platforms::Result<LiveRoomInfo>;
}

#[async_trait]
impl LiveFetcher for BilibiliLive {
    type Key = u64;

    fn source(&self) -> SourceFlag {
        SourceFlag::BiliLive
    }

    async fn fetch(&self, room_id: &u64) -> feed_platforms::Result<LiveRoomInfo> {
        self.room_info(*room_id).await
    }
}

#[async_trait]
impl LiveFetcher for DouyinLive {
    type Key = String;

    fn source(&self) -> SourceFlag {
        SourceFlag::DouyinLive
    }

    async fn fetch(&self, web_rid: &String) -> feed_platforms::Result<LiveRoomInfo> {
        self.room_info(web_rid).await
    }
}

/// Polls a fixed list of rooms and emits one message per live transition.
pub struct LivePoller<F: LiveFetcher> {
    fetcher: F,
    rooms: Vec<F::Key>,
    tracker: LiveStateTracker<F::Key>,
    config: PollerConfig,
}

impl<F: LiveFetcher> LivePoller<F> {
    pub fn new(fetcher: F, rooms: Vec<F::Key>, config: PollerConfig) -> Self {
        Self {
            fetcher,
            rooms,
            tracker: LiveStateTracker::new(),
            config,
        }
    }

    pub fn tracker(&self) -> &LiveStateTracker<F::Key> {
        &self.tracker
    }

    /// Poll every room once and return how many messages were emitted.
    ///
    /// A failed fetch leaves the room's state untouched.
    pub async fn poll_once(
        &mut self,
        now: DateTime<Utc>,
        tx: &mpsc::Sender<FeedItem>,
    ) -> Result<usize> {
        let source = self.fetcher.source();
        let mut emitted = 0;

        for (index, room) in self.rooms.iter().enumerate() {
            if index > 0 && !self.config.entity_delay.is_zero() {
                tokio::time::sleep(self.config.entity_delay).await;
            }

            let info = match self.fetcher.fetch(room).await {
                Ok(info) => info,
                Err(e) => {
                    error!(%source, %room, error = %e, "Failed to fetch live status");
                    continue;
                }
            };

            let Some(transition) = self.tracker.observe(room, info.is_live) else {
                debug!(%source, %room, is_live = info.is_live, "Live status unchanged");
                continue;
            };

            let item = match transition {
                LiveTransition::WentLive => FeedItem::went_live(&info, source, now),
                LiveTransition::WentOffline => FeedItem::went_offline(&info, source, now),
            };
            info!(
                %source,
                %room,
                user = %info.user_name,
                ?transition,
                "Live status changed"
            );

            tx.send(item).await.map_err(|_| Error::ChannelClosed)?;
            emitted += 1;
        }

        Ok(emitted)
    }
}

#[async_trait]
impl<F: LiveFetcher> Source for LivePoller<F> {
    fn name(&self) -> &'static str {
        self.fetcher.source().as_str()
    }

    async fn run(mut self: Box<Self>, tx: mpsc::Sender<FeedItem>, cancel: CancellationToken) {
        let name = self.name();
        info!(source = name, rooms = self.rooms.len(), "Live poller started");
        let mut ticker = self.config.ticker();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.poll_once(Utc::now(), &tx) => result,
            };
            if let Err(e) = result {
                warn!(source = name, error = %e, "Live poller stopping");
                break;
            }
        }

        info!(source = name, "Live poller stopped");
    }
}
