//! Metadata client for the drive API

use log::{debug, error, info};
use reqwest::Client;
use std::time::Duration;

use super::types::{FileDetail, ItemInfo, OriginError};

#[derive(Debug, Clone)]
pub struct OriginClient {
    client: Client,
    api_base: String,
}

impl OriginClient {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    pub fn detail_url(&self, item_id: &str) -> String {
        format!(
            "{}/file/detail?itemId={}&needUser=1&needTpInfo=1&platform=web&pf=web&lan=en",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(item_id)
        )
    }

    /// Fetch name, size and the current download URL for `item_id`.
    ///
    /// The whole exchange, body included, is bounded by `timeout`.
    pub async fn file_detail(
        &self,
        item_id: &str,
        timeout: Duration,
    ) -> Result<ItemInfo, OriginError> {
        let url = self.detail_url(item_id);
        debug!("origin_detail: {} url={}", item_id, url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            error!("origin_detail: {} status={}", item_id, status.as_u16());
            return Err(OriginError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let detail: FileDetail = response.json().await.map_err(|e| {
            if e.is_timeout() {
                OriginError::Timeout
            } else {
                OriginError::Decode(e.to_string())
            }
        })?;
        let item = detail.into_item().unwrap_or_default();

        info!(
            "origin_detail: {} name={:?} size={:?} has_url={}",
            item_id,
            item.name,
            item.size,
            item.download_url().is_some()
        );
        Ok(item)
    }
}

fn classify(e: reqwest::Error) -> OriginError {
    if e.is_timeout() {
        OriginError::Timeout
    } else {
        OriginError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn detail_url_carries_fixed_parameters() {
        let origin = OriginClient::new(Client::new(), "https://drive.example/api/");
        assert_eq!(
            origin.detail_url("a b"),
            "https://drive.example/api/file/detail?itemId=a%20b&needUser=1&needTpInfo=1&platform=web&pf=web&lan=en"
        );
    }

    #[tokio::test]
    async fn resolves_item_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/file/detail"))
            .and(query_param("itemId", "abc"))
            .and(query_param("platform", "web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"itemInfo": {"name": "movie.mkv", "size": 42, "url": "https://cdn/movie"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let origin = OriginClient::new(Client::new(), format!("{}/api", server.uri()));
        let item = origin
            .file_detail("abc", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(item.name, "movie.mkv");
        assert_eq!(item.download_url(), Some("https://cdn/movie"));
    }

    #[tokio::test]
    async fn error_status_and_timeout_are_distinguished() {
        let server = MockServer::start().await;
        Mock::given(path("/api/file/detail"))
            .and(query_param("itemId", "missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/api/file/detail"))
            .and(query_param("itemId", "slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let origin = OriginClient::new(Client::new(), format!("{}/api", server.uri()));

        let err = origin
            .file_detail("missing", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, OriginError::Status { status: 404, .. }));
        assert_eq!(err.to_string(), "Failed to get file details: 404 Not Found");

        let err = origin
            .file_detail("slow", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, OriginError::Timeout));
    }
}
