//! Bilibili dynamic feed polling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_platforms::bilibili::{BilibiliDynamic, DynamicEntry, DynamicItem, classify};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::detector::HighWaterMarks;
use super::{PollerConfig, Source};
use crate::error::{Error, Result};
use crate::message::{FeedItem, SourceFlag};

/// Fetches the latest page of a user's dynamic feed.
#[async_trait]
pub trait DynamicFetcher: Send + Sync + 'static {
    async fn fetch(&self, uid: u64) -> feed_platforms::Result<Vec<DynamicItem>>;
}

#[async_trait]
impl DynamicFetcher for BilibiliDynamic {
    async fn fetch(&self, uid: u64) -> feed_platforms::Result<Vec<DynamicItem>> {
        self.space(uid).await
    }
}

pub struct DynamicPoller<F: DynamicFetcher> {
    fetcher: F,
    uids: Vec<u64>,
    marks: HighWaterMarks<u64>,
    config: PollerConfig,
}

impl<F: DynamicFetcher> DynamicPoller<F> {
    pub fn new(fetcher: F, uids: Vec<u64>, config: PollerConfig) -> Self {
        Self {
            fetcher,
            uids,
            marks: HighWaterMarks::new(),
            config,
        }
    }

    pub fn marks(&self) -> &HighWaterMarks<u64> {
        &self.marks
    }

    /// Poll every user once and emit the entries newer than their mark.
    ///
    /// On first sight of a user the mark starts one interval before `now`,
    /// so a restart does not replay the whole feed.
    pub async fn poll_once(
        &mut self,
        now: DateTime<Utc>,
        tx: &mpsc::Sender<FeedItem>,
    ) -> Result<usize> {
        let seed = now.timestamp() - self.config.interval.as_secs() as i64;
        let mut emitted = 0;

        for (index, uid) in self.uids.iter().enumerate() {
            if index > 0 && !self.config.entity_delay.is_zero() {
                tokio::time::sleep(self.config.entity_delay).await;
            }

            let items = match self.fetcher.fetch(*uid).await {
                Ok(items) => items,
                Err(e) => {
                    error!(uid, error = %e, "Failed to fetch dynamics");
                    continue;
                }
            };

            let fetched = items.len();
            let entries: Vec<DynamicEntry> = items.iter().filter_map(classify).collect();
            let fresh = self
                .marks
                .admit(uid, seed, entries, |entry| entry.timestamp);
            debug!(uid, fetched, fresh = fresh.len(), "Dynamics polled");

            for entry in fresh {
                info!(
                    uid,
                    id = %entry.id,
                    category = %entry.category,
                    author = %entry.author,
                    "New dynamic"
                );
                tx.send(FeedItem::from_dynamic(entry))
                    .await
                    .map_err(|_| Error::ChannelClosed)?;
                emitted += 1;
            }
        }

        Ok(emitted)
    }
}

#[async_trait]
impl<F: DynamicFetcher> Source for DynamicPoller<F> {
    fn name(&self) -> &'static str {
        SourceFlag::BiliDynamic.as_str()
    }

    async fn run(mut self: Box<Self>, tx: mpsc::Sender<FeedItem>, cancel: CancellationToken) {
        info!(users = self.uids.len(), "Dynamic poller started");
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
                warn!(error = %e, "Dynamic poller stopping");
                break;
            }
        }

        info!("Dynamic poller stopped");
    }
}
