//! Source fed on demand, used by the bot's push-test command.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Source;
use crate::error::{Error, Result};
use crate::message::{FeedItem, SourceFlag};

const TRIGGER_BUFFER: usize = 10;

/// Create a connected source/trigger pair.
pub fn test_source() -> (TestSource, TestTrigger) {
    let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
    let running = Arc::new(AtomicBool::new(false));
    (
        TestSource {
            rx,
            running: running.clone(),
        },
        TestTrigger { tx, running },
    )
}

pub struct TestSource {
    rx: mpsc::Receiver<FeedItem>,
    running: Arc<AtomicBool>,
}

/// Cloneable handle that injects test messages into a [`TestSource`].
#[derive(Debug, Clone)]
pub struct TestTrigger {
    tx: mpsc::Sender<FeedItem>,
    running: Arc<AtomicBool>,
}

impl TestTrigger {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Queue a test message routed as the flag at `index`. An index outside
    /// the known flags falls back to the first one.
    pub async fn trigger(&self, index: usize) -> Result<SourceFlag> {
        if !self.is_running() {
            warn!("Test source is not running, message will wait in queue");
        }
        let flag = SourceFlag::from_index(index).unwrap_or_else(|| {
            warn!(index, "Unknown flag index, using 0");
            SourceFlag::ALL[0]
        });
        self.tx
            .send(FeedItem::push_test(flag, Utc::now()))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        debug!(%flag, "Test message queued");
        Ok(flag)
    }
}

#[async_trait]
impl Source for TestSource {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn run(mut self: Box<Self>, tx: mpsc::Sender<FeedItem>, cancel: CancellationToken) {
        self.running.store(true, Ordering::Release);
        info!("Test source started");

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => break,
                item = self.rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            let sent = tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(item) => sent,
            };
            if sent.is_err() {
                warn!("Message channel closed");
                break;
            }
        }

        self.running.store(false, Ordering::Release);
        info!("Test source stopped");
    }
}
