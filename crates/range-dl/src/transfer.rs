//! Concurrency scheduler: one chunked transfer with bounded in-flight Range requests

use bytes::Bytes;
use log::{debug, info, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::assembler::{Assembler, InsertOutcome};
use crate::config::TransferConfig;
use crate::error::{FetchError, TransferError};
use crate::events::{EventSink, TransferEvent};
use crate::monitor::{ProgressGate, SpeedTicker};
use crate::planner::{plan_chunks, ChunkRange};
use crate::source::RangeSource;

/// The single terminal result of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed(Bytes),
    Failed(TransferError),
    Stopped,
}

impl TransferOutcome {
    pub fn into_result(self) -> Result<Bytes, TransferError> {
        match self {
            TransferOutcome::Completed(bytes) => Ok(bytes),
            TransferOutcome::Failed(err) => Err(err),
            TransferOutcome::Stopped => Err(TransferError::Stopped),
        }
    }
}

/// Stop switch and event sink shared between a transfer and its owner.
///
/// Stopping is idempotent: it cancels every in-flight fetch and closes the
/// event sink so no progress, speed or completion event follows.
#[derive(Debug, Clone)]
pub struct TransferHandle {
    stop: CancellationToken,
    events: EventSink,
}

impl TransferHandle {
    pub fn new(events: EventSink) -> Self {
        Self {
            stop: CancellationToken::new(),
            events,
        }
    }

    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            info!("transfer_stop: stop requested");
        }
        self.stop.cancel();
        self.events.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }
}

impl Default for TransferHandle {
    fn default() -> Self {
        Self::new(EventSink::discard())
    }
}

pub struct Transfer<S> {
    source: Arc<S>,
    config: TransferConfig,
    handle: TransferHandle,
    label: String,
}

impl<S: RangeSource + 'static> Transfer<S> {
    pub fn new(source: S, config: TransferConfig, handle: TransferHandle) -> Self {
        Self {
            source: Arc::new(source),
            config,
            handle,
            label: "transfer".to_string(),
        }
    }

    /// Name used in log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn handle(&self) -> TransferHandle {
        self.handle.clone()
    }

    /// Probe the size, then fetch every chunk. Consumes the transfer so it
    /// yields exactly one outcome.
    pub async fn start(self) -> TransferOutcome {
        if let Err(e) = self.config.validate() {
            return TransferOutcome::Failed(e);
        }
        if self.handle.is_stopped() {
            return TransferOutcome::Stopped;
        }

        let probed = tokio::select! {
            _ = self.handle.stop_token().cancelled() => return TransferOutcome::Stopped,
            probed = self.source.probe_size() => probed,
        };

        let total_size = match probed {
            Ok(Some(size)) => size,
            Ok(None) => {
                warn!("transfer_probe: {} size unknown", self.label);
                return TransferOutcome::Failed(TransferError::SizeUnknown);
            }
            Err(e) if e.is_cancelled() => return TransferOutcome::Stopped,
            Err(e) => {
                warn!("transfer_probe: {} error={}", self.label, e);
                return TransferOutcome::Failed(TransferError::Probe(e));
            }
        };

        let ranges = match plan_chunks(total_size, self.config.chunk_size) {
            Ok(ranges) => ranges,
            Err(e) => return TransferOutcome::Failed(e),
        };

        info!(
            "transfer_start: {} total_bytes={} chunks={} max_in_flight={}",
            self.label,
            total_size,
            ranges.len(),
            self.config.max_concurrent_chunks
        );

        self.run(total_size, ranges).await
    }

    async fn run(&self, total_size: u64, ranges: Vec<ChunkRange>) -> TransferOutcome {
        let events = self.handle.events().clone();
        let downloaded = Arc::new(AtomicU64::new(0));
        let _ticker = SpeedTicker::start(
            downloaded.clone(),
            self.config.speed_interval(),
            events.clone(),
        );

        let mut assembler = Assembler::new(total_size);
        let mut progress = ProgressGate::new(total_size);
        let mut queue: VecDeque<ChunkRange> = ranges.into();
        let mut in_flight: JoinSet<Result<Bytes, FetchError>> = JoinSet::new();
        let mut in_flight_ranges: HashMap<Id, ChunkRange> = HashMap::new();

        // Child of the stop token: a chunk failure cancels the remaining
        // fetches without marking the whole transfer as stopped.
        let fetch_cancel = self.handle.stop_token().child_token();

        loop {
            while in_flight.len() < self.config.max_concurrent_chunks {
                let Some(range) = queue.pop_front() else {
                    break;
                };
                let source = Arc::clone(&self.source);
                let cancel = fetch_cancel.clone();
                debug!(
                    "chunk_dispatch: {} index={} range={}..={}",
                    self.label, range.index, range.start, range.end
                );
                let task = in_flight.spawn(async move { source.fetch_range(range, cancel).await });
                in_flight_ranges.insert(task.id(), range);
            }

            if in_flight.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.handle.stop_token().cancelled() => {
                    fetch_cancel.cancel();
                    in_flight.abort_all();
                    assembler.stop();
                    info!(
                        "transfer_stopped: {} discarded_in_flight={}",
                        self.label,
                        in_flight.len()
                    );
                    return TransferOutcome::Stopped;
                }
                joined = in_flight.join_next_with_id() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            let (range, result) = match joined {
                Ok((id, result)) => match in_flight_ranges.remove(&id) {
                    Some(range) => (range, result),
                    None => continue,
                },
                Err(join_err) => {
                    let Some(range) = in_flight_ranges.remove(&join_err.id()) else {
                        continue;
                    };
                    if join_err.is_cancelled() {
                        continue;
                    }
                    (range, Err(FetchError::Network("chunk task panicked".to_string())))
                }
            };

            match result {
                Ok(payload) => {
                    let actual = payload.len() as u64;
                    if actual != range.len() {
                        warn!(
                            "chunk_length_mismatch: {} index={} expected={} actual={}",
                            self.label,
                            range.index,
                            range.len(),
                            actual
                        );
                        fetch_cancel.cancel();
                        in_flight.abort_all();
                        assembler.clear();
                        return TransferOutcome::Failed(TransferError::ChunkLengthMismatch {
                            index: range.index,
                            expected: range.len(),
                            actual,
                        });
                    }

                    match assembler.insert(range.index, payload) {
                        InsertOutcome::Accepted | InsertOutcome::Complete => {
                            let received = assembler.received();
                            downloaded.store(received, Ordering::SeqCst);
                            debug!(
                                "chunk_done: {} index={} received={}/{}",
                                self.label, range.index, received, total_size
                            );
                            if let Some(percent) = progress.update(received) {
                                events.emit(TransferEvent::Progress { percent });
                            }
                        }
                        InsertOutcome::Stopped => {}
                        rejected => {
                            warn!(
                                "chunk_rejected: {} index={} outcome={:?}",
                                self.label, range.index, rejected
                            );
                        }
                    }
                }
                Err(e) if e.is_cancelled() => {
                    debug!("chunk_cancelled: {} index={}", self.label, range.index);
                }
                Err(e) => {
                    warn!(
                        "chunk_failed: {} index={} error={}",
                        self.label, range.index, e
                    );
                    fetch_cancel.cancel();
                    in_flight.abort_all();
                    assembler.clear();
                    return TransferOutcome::Failed(TransferError::Chunk {
                        index: range.index,
                        source: e,
                    });
                }
            }
        }

        if self.handle.is_stopped() {
            assembler.stop();
            return TransferOutcome::Stopped;
        }

        let received = assembler.received();
        match assembler.assemble() {
            Some(bytes) => {
                info!("transfer_complete: {} bytes={}", self.label, bytes.len());
                TransferOutcome::Completed(bytes)
            }
            None => {
                assembler.clear();
                TransferOutcome::Failed(TransferError::Incomplete {
                    received,
                    expected: total_size,
                })
            }
        }
    }
}
