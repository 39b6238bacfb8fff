//! `get` command - downloads one file through range-dl and saves it
//!
//! Provides:
//! - Parallel Range download with proxy fallback
//! - Progress and speed logging from transfer events
//! - Ctrl-C stops the transfer without writing anything

mod types;
mod worker;

pub use types::DownloadSummary;
pub use worker::{output_path, run_get};
