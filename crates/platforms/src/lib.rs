//! Fetchers for the feeds watched by forward-bot.
//!
//! - [`bilibili`]: live room status and the dynamic (social post) feed,
//!   including the classifier that normalizes feed items.
//! - [`douyin`]: live room status scraped from the web live page.
//!
//! All fetchers share [`client::HttpClient`].

pub mod bilibili;
pub mod client;
pub mod douyin;
pub mod error;
pub mod live;

pub use client::HttpClient;
pub use error::{PlatformError, Result};
pub use live::LiveRoomInfo;
