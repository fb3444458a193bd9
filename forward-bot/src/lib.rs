//! Watches Bilibili live rooms, Bilibili dynamic feeds and Douyin live rooms
//! and forwards every change to DingTalk and subscribed guild channels.

pub mod app;
pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod monitor;
pub mod notification;
pub mod subscription;

pub use error::{Error, Result};
