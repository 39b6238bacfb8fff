//! Download result payloads

use range_dl::DownloadPath;
use serde::Serialize;
use std::path::PathBuf;

/// Printed as one JSON line once the file is written
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub via: DownloadPath,
    pub elapsed_ms: u128,
}
