//! In-memory chunk assembly

use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;

/// What happened to a payload handed to [`Assembler::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored; the assembler is still waiting for more bytes.
    Accepted,
    /// Stored and the accumulated size now equals the total.
    Complete,
    /// Ignored because the transfer was stopped.
    Stopped,
    /// Ignored because this index was already stored.
    Duplicate,
    /// Ignored because it would exceed the total size.
    Overflow,
}

/// Holds fetched chunk payloads keyed by index until the transfer completes
#[derive(Debug)]
pub struct Assembler {
    total_size: u64,
    received: u64,
    chunks: BTreeMap<usize, Bytes>,
    stopped: bool,
}

impl Assembler {
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            received: 0,
            chunks: BTreeMap::new(),
            stopped: false,
        }
    }

    pub fn insert(&mut self, index: usize, payload: Bytes) -> InsertOutcome {
        if self.stopped {
            return InsertOutcome::Stopped;
        }
        if self.chunks.contains_key(&index) {
            return InsertOutcome::Duplicate;
        }
        let len = payload.len() as u64;
        if self.received + len > self.total_size {
            return InsertOutcome::Overflow;
        }

        self.received += len;
        self.chunks.insert(index, payload);

        if self.is_complete() {
            InsertOutcome::Complete
        } else {
            InsertOutcome::Accepted
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.stopped && self.received == self.total_size
    }

    /// Concatenate every stored chunk in index order and release them.
    ///
    /// Returns `None` unless the assembler is complete; either way no chunk
    /// memory is retained afterwards when it succeeds.
    pub fn assemble(&mut self) -> Option<Bytes> {
        if !self.is_complete() {
            return None;
        }
        let mut out = BytesMut::with_capacity(self.total_size as usize);
        for payload in std::mem::take(&mut self.chunks).into_values() {
            out.extend_from_slice(&payload);
        }
        self.received = 0;
        Some(out.freeze())
    }

    /// Stop accepting payloads and drop everything received so far.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.received = 0;
    }
}
