//! `GET /file/{id}/download`: resolve the identifier and relay the origin body

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use log::{debug, info, warn};

use super::error::ProxyError;
use super::filename::content_disposition;
use super::ProxyState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub async fn download_file(
    State(state): State<ProxyState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    info!("proxy_download: {} start", id);

    let item = state
        .origin
        .file_detail(&id, state.config.metadata_timeout())
        .await?;
    let url = item.download_url().ok_or(ProxyError::NoDownloadUrl)?;

    let mut request = state
        .client
        .get(url)
        .timeout(state.config.relay_timeout());
    if let Some(range) = headers.get(RANGE) {
        debug!("proxy_download: {} range={:?}", id, range);
        request = request.header(RANGE, range.clone());
    }

    let upstream = request.send().await.map_err(ProxyError::from_relay)?;
    let status = upstream.status();
    if !status.is_success() {
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message: format!("Failed to download file: {}", status),
        });
    }

    let mut out = HeaderMap::new();
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    out.insert(CONTENT_TYPE, content_type);
    if let Some(len) = upstream.headers().get(CONTENT_LENGTH) {
        out.insert(CONTENT_LENGTH, len.clone());
    }
    let disposition = HeaderValue::from_str(&content_disposition(&item.name))
        .map_err(|e| ProxyError::Internal(e.to_string()))?;
    out.insert(CONTENT_DISPOSITION, disposition);
    out.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let relay_status = if status == StatusCode::PARTIAL_CONTENT {
        if let Some(content_range) = upstream.headers().get(CONTENT_RANGE) {
            out.insert(CONTENT_RANGE, content_range.clone());
        }
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    info!(
        "proxy_download: {} relaying status={} length={:?}",
        id,
        relay_status.as_u16(),
        out.get(CONTENT_LENGTH)
    );

    // A mid-stream error ends the body early, so the client sees a broken stream.
    let stream = upstream.bytes_stream().inspect_err(move |e| {
        warn!("proxy_download: {} stream error={}", id, e);
    });

    Ok((relay_status, out, Body::from_stream(stream)).into_response())
}

pub async fn health() -> &'static str {
    "ok"
}
