use thiserror::Error;

#[derive(Debug, Error)]
pub enum OneBotError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, OneBotError>;
