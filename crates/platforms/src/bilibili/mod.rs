mod dynamic;
mod live;

pub use dynamic::{
    BilibiliDynamic, Classified, DynamicCategory, DynamicEntry, DynamicItem, UNHANDLED_BODY,
    classify, classify_item, parse_space,
};
pub use live::{BilibiliLive, parse_room_info};

use serde::Deserialize;

use crate::error::{PlatformError, Result};

pub const LIVE_URL_PREFIX: &str = "https://live.bilibili.com/";
pub const DYNAMIC_URL_PREFIX: &str = "https://t.bilibili.com/";
pub const VIDEO_URL_PREFIX: &str = "https://www.bilibili.com/video/";
pub const ARTICLE_URL_PREFIX: &str = "https://www.bilibili.com/read/cv";
pub const AUDIO_URL_PREFIX: &str = "https://www.bilibili.com/audio/au";

/// Common `{code, msg, data}` envelope of the Bilibili web APIs.
///
/// Some endpoints send both `msg` and `message`, so they are kept apart.
#[derive(Debug, Deserialize)]
pub(crate) struct BiliResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> BiliResponse<T> {
    pub(crate) fn into_data(self) -> Result<T> {
        if self.code != 0 {
            let message = self.msg.or(self.message).unwrap_or_default();
            return Err(PlatformError::api(self.code, message));
        }
        self.data.ok_or(PlatformError::MissingField("data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_uses_msg() {
        let resp: BiliResponse<serde_json::Value> =
            serde_json::from_str(r#"{"code":-400,"msg":"bad request","message":"other"}"#)
                .unwrap();
        match resp.into_data() {
            Err(PlatformError::Api { code, message }) => {
                assert_eq!(code, -400);
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_envelope_error_falls_back_to_message() {
        let resp: BiliResponse<serde_json::Value> =
            serde_json::from_str(r#"{"code":-352,"message":"risk control"}"#).unwrap();
        assert!(matches!(
            resp.into_data(),
            Err(PlatformError::Api { code: -352, ref message }) if message == "risk control"
        ));
    }

    #[test]
    fn test_envelope_missing_data() {
        let resp: BiliResponse<serde_json::Value> =
            serde_json::from_str(r#"{"code":0,"msg":"ok"}"#).unwrap();
        assert!(matches!(
            resp.into_data(),
            Err(PlatformError::MissingField("data"))
        ));
    }
}
