//! TOML configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOG_FILTER;
use crate::monitor::PollerConfig;
use crate::notification::channels::{DingTalkConfig, OneBotChannelConfig};
use crate::notification::service::DEFAULT_BUFFER;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of the queue between sources and the dispatch hub.
    #[serde(default = "default_msg_buf")]
    pub msg_buf: usize,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Directory for rolling log files. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Pause between two entities of the same poll.
    #[serde(default = "default_entity_delay")]
    pub entity_delay_ms: u64,
    #[serde(default)]
    pub bilibili: BilibiliConfig,
    #[serde(default)]
    pub douyin: DouyinConfig,
    /// DingTalk robot. Disabled when the section is absent.
    #[serde(default)]
    pub dingtalk: Option<DingTalkConfig>,
    /// Guild bot. Disabled when the section is absent.
    #[serde(default)]
    pub onebot: Option<OneBotChannelConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BilibiliConfig {
    /// Live room ids to watch.
    #[serde(default)]
    pub live: Vec<u64>,
    /// User ids whose dynamic feed is watched.
    #[serde(default)]
    pub dynamic: Vec<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DouyinConfig {
    /// `__ac_nonce` cookie.
    #[serde(default)]
    pub nonce: String,
    /// `__ac_signature` cookie.
    #[serde(default)]
    pub signature: String,
    /// Web room ids to watch.
    #[serde(default)]
    pub users: Vec<String>,
}

fn default_msg_buf() -> usize {
    DEFAULT_BUFFER
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_entity_delay() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            msg_buf: default_msg_buf(),
            log_filter: default_log_filter(),
            log_dir: None,
            poll_interval_secs: default_poll_interval(),
            entity_delay_ms: default_entity_delay(),
            bilibili: BilibiliConfig::default(),
            douyin: DouyinConfig::default(),
            dingtalk: None,
            onebot: None,
        }
    }
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.msg_buf == 0 {
            return Err(Error::config("msg_buf must be at least 1"));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::config("poll_interval_secs must be at least 1"));
        }
        if !self.douyin.users.is_empty()
            && (self.douyin.nonce.is_empty() || self.douyin.signature.is_empty())
        {
            return Err(Error::config(
                "douyin.nonce and douyin.signature are required to watch douyin users",
            ));
        }
        if let Some(dingtalk) = self.dingtalk.as_ref().filter(|d| d.enabled) {
            if !dingtalk.webhook.starts_with("http://") && !dingtalk.webhook.starts_with("https://")
            {
                return Err(Error::config("dingtalk.webhook must be an http(s) url"));
            }
            if dingtalk.secret.is_empty() {
                return Err(Error::config("dingtalk.secret is required"));
            }
        }
        if let Some(onebot) = self.onebot.as_ref().filter(|o| o.enabled) {
            onebot.client_config().connect_url()?;
        }
        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            entity_delay: Duration::from_millis(self.entity_delay_ms),
        }
    }

    pub fn has_sources(&self) -> bool {
        !self.bilibili.live.is_empty()
            || !self.bilibili.dynamic.is_empty()
            || !self.douyin.users.is_empty()
    }
}
