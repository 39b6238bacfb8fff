//! Proxy errors and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::origin::OriginError;

/// Non-standard status for a request whose upstream ended before headers arrived
pub const STATUS_INTERRUPTED: u16 = 499;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Download timeout exceeded")]
    Timeout,

    #[error("Download was interrupted")]
    Interrupted,

    /// Metadata or origin answered with an error status; it is passed through.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("No download URL available")]
    NoDownloadUrl,

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ProxyError {
    /// Classify a failure of the relayed origin request before its headers arrived.
    pub fn from_relay(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Timeout
        } else if e.is_request() && !e.is_connect() {
            ProxyError::Interrupted
        } else {
            ProxyError::Internal(e.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Interrupted => StatusCode::from_u16(STATUS_INTERRUPTED)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::NoDownloadUrl => StatusCode::BAD_REQUEST,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OriginError> for ProxyError {
    fn from(e: OriginError) -> Self {
        match e {
            OriginError::Timeout => ProxyError::Timeout,
            OriginError::Status { status, .. } => ProxyError::Upstream {
                status,
                message: e.to_string(),
            },
            OriginError::Request(_) | OriginError::Decode(_) => ProxyError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!("proxy_error: status={} error={}", status.as_u16(), self);
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(ProxyError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ProxyError::Interrupted.status().as_u16(), 499);
        assert_eq!(ProxyError::NoDownloadUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn origin_status_passes_through() {
        let err = ProxyError::from(OriginError::Status {
            status: 403,
            reason: "Forbidden".into(),
        });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Failed to get file details: 403 Forbidden");
        assert!(matches!(
            ProxyError::from(OriginError::Timeout),
            ProxyError::Timeout
        ));
    }
}
