//! Sources that watch external feeds and emit [`FeedItem`]s.
//!
//! - [`LivePoller`]: live status of rooms, one message per transition
//! - [`DynamicPoller`]: new posts in a user's dynamic feed
//! - [`TestSource`]: messages injected on demand through a [`TestTrigger`]
//!
//! Every source pushes onto the shared bounded channel consumed by the
//! notification service. A full channel blocks the source.

mod detector;
mod dynamic;
mod live;
mod test_source;

pub use detector::{HighWaterMarks, LiveStateTracker, LiveTransition};
pub use dynamic::{DynamicFetcher, DynamicPoller};
pub use live::{LiveFetcher, LivePoller};
pub use test_source::{TestSource, TestTrigger, test_source};

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::message::FeedItem;

/// Default time between two polls of the same source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default pause between two entities within one poll.
pub const DEFAULT_ENTITY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval: Duration,
    pub entity_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            entity_delay: DEFAULT_ENTITY_DELAY,
        }
    }
}

impl PollerConfig {
    /// Ticker whose first tick fires one interval from now.
    pub(crate) fn ticker(&self) -> tokio::time::Interval {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

/// A producer of feed items.
#[async_trait]
pub trait Source: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Produce items until cancelled or the channel closes.
    async fn run(self: Box<Self>, tx: mpsc::Sender<FeedItem>, cancel: CancellationToken);
}
