mod classify;
mod models;

pub use classify::{
    Classified, DynamicCategory, DynamicEntry, UNHANDLED_BODY, classify, classify_item,
};
pub use models::DynamicItem;

use tracing::warn;

use super::BiliResponse;
use crate::client::HttpClient;
use crate::error::{PlatformError, Result};
use models::SpaceData;

const SPACE_URL: &str = "https://api.bilibili.com/x/polymer/web-dynamic/v1/feed/space";

/// Fetcher for the first page of a user's dynamic feed.
#[derive(Debug, Clone)]
pub struct BilibiliDynamic {
    client: HttpClient,
}

impl BilibiliDynamic {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn space(&self, uid: u64) -> Result<Vec<DynamicItem>> {
        let query = [
            ("offset", String::new()),
            ("host_mid", uid.to_string()),
            ("timezone_offset", "-480".to_string()),
        ];
        let body = self.client.get(SPACE_URL, &query).await?;
        parse_space(&body)
    }
}

/// Decode a `feed/space` response. Items that do not fit the expected
/// shape are skipped individually.
pub fn parse_space(body: &[u8]) -> Result<Vec<DynamicItem>> {
    let resp: BiliResponse<SpaceData> = serde_json::from_slice(body)?;
    let items = resp
        .into_data()?
        .items
        .ok_or(PlatformError::MissingField("data.items"))?;

    Ok(items
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<DynamicItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed dynamic item");
                None
            }
        })
        .collect())
}
