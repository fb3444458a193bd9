use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("api error: code={code}, msg={message}")]
    Api { code: i64, message: String },
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("page markup error: {0}")]
    Markup(String),
}

impl PlatformError {
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    pub fn markup(message: impl Into<String>) -> Self {
        Self::Markup(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
