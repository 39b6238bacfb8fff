//! Range fetcher: size probe and single Range GET against the origin

use std::future::Future;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::planner::ChunkRange;

/// Origin that can report its size and serve byte ranges.
///
/// [`HttpRangeSource`] is the production implementation; the scheduler only
/// depends on this trait so tests can drive it with in-memory sources.
pub trait RangeSource: Send + Sync {
    /// Total size in bytes, or `None` when the origin does not report one.
    fn probe_size(&self) -> impl Future<Output = Result<Option<u64>, FetchError>> + Send;

    /// Fetch one inclusive byte range.
    ///
    /// Must resolve to [`FetchError::Cancelled`] once `cancel` fires.
    fn fetch_range(
        &self,
        range: ChunkRange,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// Parse a `Content-Length` header; reqwest reports 0 for HEAD bodies so the header is read directly.
pub(crate) fn header_content_length(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[derive(Debug, Clone)]
pub struct HttpRangeSource {
    client: Client,
    url: String,
}

impl HttpRangeSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RangeSource for HttpRangeSource {
    async fn probe_size(&self) -> Result<Option<u64>, FetchError> {
        let response = self.client.head(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let size = header_content_length(response.headers()).filter(|size| *size > 0);
        debug!("probe_size: {} size={:?}", self.url, size);
        Ok(size)
    }

    async fn fetch_range(
        &self,
        range: ChunkRange,
        cancel: CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let request = async {
            let response = self
                .client
                .get(&self.url)
                .header(RANGE, range.header_value())
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            if status != StatusCode::PARTIAL_CONTENT {
                warn!(
                    "range_ignored: {} index={} status={}",
                    self.url,
                    range.index,
                    status.as_u16()
                );
            }
            // Refuse before reading a body that is not the requested slice.
            if let Some(announced) = header_content_length(response.headers()) {
                if announced != range.len() {
                    return Err(FetchError::RangeNotHonored {
                        expected: range.len(),
                        announced,
                    });
                }
            }

            Ok(response.bytes().await?)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = request => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn content_length_header_is_parsed() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_content_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("16777216"));
        assert_eq!(header_content_length(&headers), Some(16_777_216));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("abc"));
        assert_eq!(header_content_length(&headers), None);
    }
}
