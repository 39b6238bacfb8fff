//! Speed and progress monitoring

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::events::{EventSink, TransferEvent};

/// Percentage reporter that only lets strictly increasing values through
#[derive(Debug, Clone)]
pub struct ProgressGate {
    total: u64,
    last_reported: f64,
}

impl ProgressGate {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            last_reported: 0.0,
        }
    }

    /// Returns the percentage to report for `bytes`, or `None` if it would not advance.
    pub fn update(&mut self, bytes: u64) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let percent = (bytes as f64 / self.total as f64) * 100.0;
        if percent > self.last_reported {
            self.last_reported = percent;
            Some(percent)
        } else {
            None
        }
    }

    pub fn last_reported(&self) -> f64 {
        self.last_reported
    }
}

/// Throughput between consecutive samples
#[derive(Debug, Clone)]
pub struct SpeedSampler {
    last_bytes: u64,
    last_sample: Instant,
}

impl SpeedSampler {
    pub fn new(now: Instant) -> Self {
        Self {
            last_bytes: 0,
            last_sample: now,
        }
    }

    pub fn sample(&mut self, bytes_now: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_sample).as_secs_f64();
        let delta = bytes_now.saturating_sub(self.last_bytes);
        self.last_bytes = bytes_now;
        self.last_sample = now;
        if elapsed > 0.0 {
            (delta as f64 / elapsed).round()
        } else {
            0.0
        }
    }
}

/// Periodic speed reporter; the task is aborted when the ticker is dropped.
pub struct SpeedTicker {
    handle: JoinHandle<()>,
}

impl SpeedTicker {
    pub fn start(downloaded: Arc<AtomicU64>, period: Duration, events: EventSink) -> Self {
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut sampler = SpeedSampler::new(start);
            let mut ticker = interval_at(start + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let bytes_now = downloaded.load(Ordering::SeqCst);
                let speed = sampler.sample(bytes_now, Instant::now());
                events.emit(TransferEvent::Speed {
                    bytes_per_second: speed,
                });
            }
        });
        Self { handle }
    }
}

impl Drop for SpeedTicker {
    fn drop(&mut self) {
        debug!("speed_ticker: stopped");
        self.handle.abort();
    }
}
