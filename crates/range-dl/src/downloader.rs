//! Download orchestration: chunked transfer first, proxy stream on failure

use bytes::Bytes;
use log::{error, info, warn};
use reqwest::Client;
use serde::Serialize;

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::events::TransferEvent;
use crate::fallback::FallbackStreamer;
use crate::source::{HttpRangeSource, RangeSource};
use crate::transfer::{Transfer, TransferHandle, TransferOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Origin URL that serves Range requests
    pub url: String,
    /// Stable identifier the proxy can resolve when the origin URL fails
    pub file_id: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_id: None,
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }
}

/// Which tier produced the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPath {
    Chunked,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Bytes,
    pub via: DownloadPath,
}

/// Runs one [`Transfer`] per download and escalates to the
/// [`FallbackStreamer`] when it fails. Each tier is tried once.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    config: TransferConfig,
    fallback: Option<FallbackStreamer>,
}

impl Downloader {
    pub fn new(client: Client, config: TransferConfig) -> Self {
        Self {
            client,
            config,
            fallback: None,
        }
    }

    /// Enable the proxy fallback at `proxy_base` (e.g. `http://127.0.0.1:3000`)
    pub fn with_fallback(mut self, proxy_base: impl Into<String>) -> Self {
        self.fallback = Some(FallbackStreamer::new(self.client.clone(), proxy_base));
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub async fn download(
        &self,
        request: &DownloadRequest,
        handle: &TransferHandle,
    ) -> Result<Download, TransferError> {
        let source = HttpRangeSource::new(self.client.clone(), request.url.clone());
        self.download_from(source, request.file_id.as_deref(), handle)
            .await
    }

    /// Same as [`Downloader::download`] with an explicit primary source.
    pub async fn download_from<S: RangeSource + 'static>(
        &self,
        source: S,
        file_id: Option<&str>,
        handle: &TransferHandle,
    ) -> Result<Download, TransferError> {
        let label = file_id.unwrap_or("download").to_string();
        let outcome = Transfer::new(source, self.config.clone(), handle.clone())
            .with_label(label.clone())
            .start()
            .await;

        let reason = match outcome {
            TransferOutcome::Completed(bytes) => {
                return Ok(Download {
                    bytes,
                    via: DownloadPath::Chunked,
                })
            }
            TransferOutcome::Stopped => return Err(TransferError::Stopped),
            TransferOutcome::Failed(err @ TransferError::InvalidConfig(_)) => return Err(err),
            TransferOutcome::Failed(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            error!("download_failed: {} error={} (no fallback)", label, reason);
            return Err(reason);
        };
        if handle.is_stopped() {
            return Err(TransferError::Stopped);
        }
        let Some(file_id) = file_id.filter(|id| !id.is_empty()) else {
            error!("download_failed: {} error={} (no file identifier)", label, reason);
            return Err(TransferError::MissingFileId);
        };

        warn!("fallback_escalate: {} reason={}", label, reason);
        handle.events().emit(TransferEvent::FallbackStarted {
            reason: reason.to_string(),
        });

        let bytes = fallback.fetch(Some(file_id), 0, handle).await?;
        info!("download_complete: {} via=fallback bytes={}", label, bytes.len());
        Ok(Download {
            bytes,
            via: DownloadPath::Fallback,
        })
    }
}
