//! Concurrent HTTP download engine.
//!
//! A file is probed with `HEAD`, split into fixed-size inclusive byte ranges
//! and fetched with a bounded number of parallel `Range` requests. Completed
//! chunks are reassembled in index order in memory. When the chunked path
//! fails, [`Downloader`] falls back to a single stream through an origin proxy
//! (`GET <proxy>/file/{id}/download`).
//!
//! ```no_run
//! use range_dl::{DownloadRequest, Downloader, EventSink, TransferConfig, TransferHandle};
//!
//! # async fn demo() -> Result<(), range_dl::TransferError> {
//! let (events, mut rx) = EventSink::channel();
//! let handle = TransferHandle::new(events);
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{:?}", event);
//!     }
//! });
//!
//! let downloader = Downloader::new(reqwest::Client::new(), TransferConfig::default())
//!     .with_fallback("http://127.0.0.1:3000");
//! let request = DownloadRequest::new("https://example.com/big.bin").with_file_id("abc123");
//! let download = downloader.download(&request, &handle).await?;
//! println!("{} bytes via {:?}", download.bytes.len(), download.via);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod config;
pub mod downloader;
pub mod error;
pub mod events;
pub mod fallback;
pub mod monitor;
pub mod planner;
pub mod source;
pub mod transfer;

pub use assembler::{Assembler, InsertOutcome};
pub use config::{TransferConfig, CHUNK_SIZE, MAX_CONCURRENT_CHUNKS, SPEED_INTERVAL_MS};
pub use downloader::{Download, DownloadPath, DownloadRequest, Downloader};
pub use error::{FallbackError, FetchError, TransferError};
pub use events::{EventSink, TransferEvent};
pub use fallback::{FallbackState, FallbackStreamer};
pub use monitor::{ProgressGate, SpeedSampler, SpeedTicker};
pub use planner::{plan_chunks, ChunkRange};
pub use source::{HttpRangeSource, RangeSource};
pub use transfer::{Transfer, TransferHandle, TransferOutcome};
