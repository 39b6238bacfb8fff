//! Origin module - resolves drive file identifiers to time-limited download URLs
//!
//! This module is organized into submodules:
//! - `types`: Metadata payloads and errors
//! - `resolve`: The metadata client

mod resolve;
mod types;

pub use resolve::OriginClient;
pub use types::{FileDetail, ItemInfo, OriginError};
