//! Transfer tuning knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TransferError;

/// Size of one Range request (8 MB)
pub const CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Maximum Range requests in flight for one transfer
pub const MAX_CONCURRENT_CHUNKS: usize = 10;

/// Interval between speed samples
pub const SPEED_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_size: u64,
    pub max_concurrent_chunks: usize,
    pub speed_interval_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_concurrent_chunks: MAX_CONCURRENT_CHUNKS,
            speed_interval_ms: SPEED_INTERVAL_MS,
        }
    }
}

impl TransferConfig {
    pub fn speed_interval(&self) -> Duration {
        Duration::from_millis(self.speed_interval_ms)
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(TransferError::InvalidConfig(
                "max_concurrent_chunks must be > 0".into(),
            ));
        }
        if self.speed_interval_ms == 0 {
            return Err(TransferError::InvalidConfig(
                "speed_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = TransferConfig::default();
        assert_eq!(config.chunk_size, 8_388_608);
        assert_eq!(config.max_concurrent_chunks, 10);
        assert_eq!(config.speed_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = TransferConfig {
            max_concurrent_chunks: 0,
            ..TransferConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TransferError::InvalidConfig(_))
        ));
    }
}
