//! Single-stream download through the origin proxy, used after the chunked path fails

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use log::{debug, error, info};
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::{FallbackError, TransferError};
use crate::events::TransferEvent;
use crate::monitor::ProgressGate;
use crate::source::header_content_length;
use crate::transfer::TransferHandle;

/// Upper bound on the buffer reserved up front; larger bodies grow it as they arrive.
const INITIAL_BUFFER_CAPACITY: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackState {
    Idle,
    Requesting,
    Streaming,
    Complete,
    Failed,
}

impl FallbackState {
    pub fn can_transition_to(self, next: FallbackState) -> bool {
        use FallbackState::*;
        matches!(
            (self, next),
            (Idle, Requesting)
                | (Idle, Failed)
                | (Requesting, Streaming)
                | (Requesting, Failed)
                | (Streaming, Complete)
                | (Streaming, Failed)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, FallbackState::Complete | FallbackState::Failed)
    }
}

struct FallbackSession<'a> {
    file_id: &'a str,
    state: FallbackState,
}

impl<'a> FallbackSession<'a> {
    fn new(file_id: &'a str) -> Self {
        Self {
            file_id,
            state: FallbackState::Idle,
        }
    }

    fn transition(&mut self, next: FallbackState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid fallback transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(
            "fallback_state: {} {:?} -> {:?}",
            self.file_id, self.state, next
        );
        self.state = next;
    }
}

#[derive(Debug, Clone)]
pub struct FallbackStreamer {
    client: Client,
    proxy_base: String,
}

impl FallbackStreamer {
    pub fn new(client: Client, proxy_base: impl Into<String>) -> Self {
        Self {
            client,
            proxy_base: proxy_base.into(),
        }
    }

    /// `GET {proxy_base}/file/{id}/download`
    pub fn download_url(&self, file_id: &str) -> String {
        format!(
            "{}/file/{}/download",
            self.proxy_base.trim_end_matches('/'),
            urlencoding::encode(file_id)
        )
    }

    /// Stream the whole file (or everything from `offset` on) through the proxy.
    ///
    /// Without a file identifier this fails at once with
    /// [`TransferError::MissingFileId`] and makes no request. With `offset > 0`
    /// the request carries `Range: bytes=<offset>-`, the proxy must answer 206,
    /// and only the bytes from `offset` on are returned.
    pub async fn fetch(
        &self,
        file_id: Option<&str>,
        offset: u64,
        handle: &TransferHandle,
    ) -> Result<Bytes, TransferError> {
        let Some(file_id) = file_id.filter(|id| !id.is_empty()) else {
            error!("fallback_unavailable: no file identifier");
            return Err(TransferError::MissingFileId);
        };

        let mut session = FallbackSession::new(file_id);
        match self.stream(&mut session, offset, handle).await {
            Ok(bytes) => {
                session.transition(FallbackState::Complete);
                info!("fallback_complete: {} bytes={}", file_id, bytes.len());
                Ok(bytes)
            }
            Err(err) => {
                session.transition(FallbackState::Failed);
                if err != TransferError::Stopped {
                    error!("fallback_failed: {} error={}", file_id, err);
                }
                Err(err)
            }
        }
    }

    async fn stream(
        &self,
        session: &mut FallbackSession<'_>,
        offset: u64,
        handle: &TransferHandle,
    ) -> Result<Bytes, TransferError> {
        let url = self.download_url(session.file_id);
        let stop = handle.stop_token();
        let events = handle.events();

        session.transition(FallbackState::Requesting);
        info!(
            "fallback_start: {} url={} offset={}",
            session.file_id, url, offset
        );

        let mut request = self.client.get(&url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let response = tokio::select! {
            _ = stop.cancelled() => return Err(TransferError::Stopped),
            response = request.send() => response
                .map_err(|e| TransferError::Fallback(FallbackError::Request(e.to_string())))?,
        };

        let status = response.status();
        let status_ok = if offset > 0 {
            status == StatusCode::PARTIAL_CONTENT
        } else {
            status.is_success()
        };
        if !status_ok {
            return Err(TransferError::Fallback(FallbackError::Status(status.as_u16())));
        }

        let content_length = header_content_length(response.headers())
            .filter(|len| *len > 0)
            .ok_or(TransferError::Fallback(FallbackError::MissingContentLength))?;

        session.transition(FallbackState::Streaming);

        let total = offset + content_length;
        let mut progress = ProgressGate::new(total);
        let capacity = content_length.min(INITIAL_BUFFER_CAPACITY) as usize;
        let mut body = BytesMut::with_capacity(capacity);
        let mut received: u64 = 0;
        let mut last_chunk_at = Instant::now();
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                _ = stop.cancelled() => return Err(TransferError::Stopped),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| {
                TransferError::Fallback(FallbackError::Read {
                    received,
                    message: e.to_string(),
                })
            })?;

            received += chunk.len() as u64;
            body.extend_from_slice(&chunk);

            let now = Instant::now();
            let elapsed = now.saturating_duration_since(last_chunk_at).as_secs_f64();
            last_chunk_at = now;
            let bytes_per_second = if elapsed > 0.0 {
                (chunk.len() as f64 / elapsed).round()
            } else {
                chunk.len() as f64
            };
            events.emit(TransferEvent::Speed { bytes_per_second });
            if let Some(percent) = progress.update(offset + received) {
                events.emit(TransferEvent::Progress { percent });
            }
        }

        if received != content_length {
            return Err(TransferError::Fallback(FallbackError::Incomplete {
                received,
                expected: content_length,
            }));
        }

        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_only_moves_forward() {
        use FallbackState::*;
        assert!(Idle.can_transition_to(Requesting));
        assert!(Requesting.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Complete));
        assert!(Streaming.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Streaming));
        assert!(!Complete.can_transition_to(Requesting));
        assert!(!Failed.can_transition_to(Requesting));
        assert!(Complete.is_finished() && Failed.is_finished());
    }

    #[test]
    fn download_url_escapes_the_identifier() {
        let streamer = FallbackStreamer::new(Client::new(), "http://proxy.local/");
        assert_eq!(
            streamer.download_url("drive-a 42"),
            "http://proxy.local/file/drive-a%2042/download"
        );
    }

    #[tokio::test]
    async fn missing_identifier_fails_without_a_request() {
        // Port 9 (discard) is never contacted; a request would error differently.
        let streamer = FallbackStreamer::new(Client::new(), "http://127.0.0.1:9");
        let handle = TransferHandle::default();

        assert_eq!(
            streamer.fetch(None, 0, &handle).await,
            Err(TransferError::MissingFileId)
        );
        assert_eq!(
            streamer.fetch(Some(""), 0, &handle).await,
            Err(TransferError::MissingFileId)
        );
    }
}
