//! Fan-out of feed items to delivery channels.
//!
//! The [`NotificationService`] owns every source task and the receiving end
//! of their shared queue. Each received item is handed to every enabled
//! channel on its own task, so a slow channel never delays the others.

pub mod channels;
pub mod service;

pub use channels::NotificationChannel;
pub use service::{NotificationService, NotificationServiceConfig, NotificationStats};
