//! The dispatch hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::channels::NotificationChannel;
use crate::message::FeedItem;
use crate::monitor::Source;

/// Default capacity of the source queue.
pub const DEFAULT_BUFFER: usize = 10;

#[derive(Debug, Clone)]
pub struct NotificationServiceConfig {
    /// Capacity of the queue shared by all sources.
    pub buffer: usize,
}

impl Default for NotificationServiceConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }
}

/// Delivery counters.
#[derive(Debug, Default)]
pub struct NotificationStats {
    received: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl NotificationStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub struct NotificationService {
    config: NotificationServiceConfig,
    sources: Vec<Box<dyn Source>>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    stats: Arc<NotificationStats>,
}

impl NotificationService {
    pub fn new(config: NotificationServiceConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            channels: Vec::new(),
            stats: Arc::new(NotificationStats::default()),
        }
    }

    pub fn add_source(&mut self, source: Box<dyn Source>) {
        info!(source = source.name(), "Source registered");
        self.sources.push(source);
    }

    /// Register a channel. Disabled channels are dropped.
    pub fn add_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        if !channel.is_enabled() {
            info!(channel = channel.channel_type(), "Channel disabled, skipping");
            return;
        }
        info!(channel = channel.channel_type(), "Channel registered");
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn stats(&self) -> Arc<NotificationStats> {
        self.stats.clone()
    }

    /// Run until cancelled or every source has finished.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            config,
            sources,
            channels,
            stats,
        } = self;

        let (tx, mut rx) = mpsc::channel(config.buffer.max(1));
        let source_cancel = cancel.child_token();
        let mut source_tasks = JoinSet::new();
        for source in sources {
            source_tasks.spawn(source.run(tx.clone(), source_cancel.clone()));
        }
        // the queue closes once every source has dropped its sender
        drop(tx);

        if channels.is_empty() {
            warn!("No notification channel enabled, messages will be dropped");
        }
        info!(
            sources = source_tasks.len(),
            channels = channels.len(),
            "Notification service started"
        );

        let mut deliveries = JoinSet::new();
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => {
                        info!("All sources finished");
                        break;
                    }
                },
            };

            stats.received.fetch_add(1, Ordering::Relaxed);
            debug!(
                author = %item.author,
                category = %item.category,
                source = %item.source,
                "Dispatching message"
            );

            let item = Arc::new(item);
            for channel in &channels {
                let channel = channel.clone();
                let item = item.clone();
                let stats = stats.clone();
                deliveries.spawn(async move {
                    match channel.send(&item).await {
                        Ok(()) => {
                            stats.delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            error!(
                                channel = channel.channel_type(),
                                author = %item.author,
                                error = %e,
                                "Delivery failed"
                            );
                        }
                    }
                });
            }

            while deliveries.try_join_next().is_some() {}
        }

        source_cancel.cancel();
        while source_tasks.join_next().await.is_some() {}

        // in-flight deliveries run to completion, bounded by their transport timeouts
        if !deliveries.is_empty() {
            info!(pending = deliveries.len(), "Waiting for in-flight deliveries");
        }
        while let Some(result) = deliveries.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Delivery task panicked");
            }
        }

        info!(
            received = stats.received(),
            delivered = stats.delivered(),
            failed = stats.failed(),
            "Notification service stopped"
        );
    }
}
