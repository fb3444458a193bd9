//! Shared HTTP client used by every platform fetcher.
//!
//! Requests carry a fixed desktop browser identity, the response body is
//! decompressed transparently by reqwest (gzip, deflate, brotli), and each
//! client may hold its own cookie set that is sent on every request.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{
    Client, RequestBuilder, StatusCode,
    header::{ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue},
};
use tracing::trace;

use crate::error::{PlatformError, Result};

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    // insertion order is kept so the Cookie header is stable
    cookies: Vec<(String, String)>,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .user_agent(DEFAULT_UA)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self::from_client(client))
    }

    /// Wrap an already configured reqwest client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            cookies: Vec::new(),
        }
    }

    /// Set a cookie, replacing any previous value with the same name.
    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.cookies.push((name, value)),
        }
    }

    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Bytes> {
        let request = self.client.get(url).query(query);
        self.execute(request).await
    }

    async fn execute(&self, mut request: RequestBuilder) -> Result<Bytes> {
        if let Some(cookie) = self.cookie_header() {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        trace!(url = %response.url(), status = %status, "response received");
        if status != StatusCode::OK {
            return Err(PlatformError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_client() -> Client {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        Client::new()
    }

    #[test]
    fn test_cookie_header_empty() {
        let client = HttpClient::from_client(new_client());
        assert_eq!(client.cookie_header(), None);
    }

    #[test]
    fn test_cookie_header_keeps_order_and_replaces() {
        let mut client = HttpClient::from_client(new_client());
        client.set_cookie("__ac_nonce", "a");
        client.set_cookie("__ac_signature", "b");
        client.set_cookie("__ac_nonce", "c");

        assert_eq!(
            client.cookie_header().as_deref(),
            Some("__ac_nonce=c; __ac_signature=b")
        );
    }
}
