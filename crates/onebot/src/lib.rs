//! OneBot v11 client for guild channels, as served by go-cqhttp.
//!
//! Covers what a notification bot needs: CQ code markup, parsing of
//! heartbeat / guild message / echo frames, slash commands, and a
//! reconnecting websocket client that sends channel messages.

pub mod client;
pub mod command;
pub mod cq_code;
pub mod echo;
pub mod error;
pub mod event;

pub use client::{ECHO_SEND_GUILD_MSG, OneBotClient, OneBotConfig};
pub use command::Command;
pub use cq_code::CqCode;
pub use echo::EchoRegistry;
pub use error::{OneBotError, Result};
pub use event::{EchoResponse, Event, GuildMessage};
