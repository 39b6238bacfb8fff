//! Origin metadata payloads

use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("file details request timed out")]
    Timeout,

    /// Non-success status from the metadata API; `reason` is the canonical phrase.
    #[error("Failed to get file details: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("file details request failed: {0}")]
    Request(String),

    #[error("invalid file details response: {0}")]
    Decode(String),
}

/// `GET /file/detail` response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDetail {
    #[serde(default)]
    pub data: Option<FileDetailData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDetailData {
    #[serde(rename = "itemInfo", default)]
    pub item_info: Option<ItemInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub size: Option<u64>,
    /// Time-limited origin URL; absent when the item cannot be downloaded
    #[serde(default)]
    pub url: Option<String>,
}

impl FileDetail {
    pub fn into_item(self) -> Option<ItemInfo> {
        self.data.and_then(|d| d.item_info)
    }
}

impl ItemInfo {
    /// The download URL, if present and non-empty
    pub fn download_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

// The API reports sizes both as numbers and as numeric strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Size>::deserialize(deserializer)? {
        Some(Size::Number(n)) => Some(n),
        Some(Size::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_info() {
        let detail: FileDetail = serde_json::from_str(
            r#"{"data":{"itemInfo":{"name":"a.mp4","size":"1024","url":"https://cdn/x"}}}"#,
        )
        .unwrap();
        let item = detail.into_item().unwrap();
        assert_eq!(item.name, "a.mp4");
        assert_eq!(item.size, Some(1024));
        assert_eq!(item.download_url(), Some("https://cdn/x"));
    }

    #[test]
    fn missing_url_or_data_is_tolerated() {
        let detail: FileDetail =
            serde_json::from_str(r#"{"data":{"itemInfo":{"name":"a","size":5,"url":""}}}"#)
                .unwrap();
        assert_eq!(detail.into_item().unwrap().download_url(), None);

        let detail: FileDetail = serde_json::from_str(r#"{"status":0,"data":null}"#).unwrap();
        assert!(detail.into_item().is_none());
    }
}
