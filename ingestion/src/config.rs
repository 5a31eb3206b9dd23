//! Session configuration.

use std::time::Duration;

use ampoule_shared::MAX_PACKET_SIZE;

use crate::error::{IngestionError, Result};

/// Configuration for an ingestion session
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Largest payload accepted; must not exceed the receive buffer capacity
    pub max_packet_size: usize,
    /// How long a partially received message may wait for its remaining bytes
    pub timeout_ms: u32,
    /// Consecutive zero-byte transport writes tolerated before a response is abandoned
    pub max_write_retries: u8,
}

impl IngestionConfig {
    /// Stall window as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Check the configuration against a receive buffer of `capacity` bytes
    pub fn validate(&self, capacity: usize) -> Result<()> {
        if self.max_packet_size == 0 {
            return Err(IngestionError::InvalidArgument("max_packet_size is zero"));
        }
        if self.max_packet_size > capacity {
            return Err(IngestionError::InvalidArgument(
                "max_packet_size exceeds buffer capacity",
            ));
        }
        if self.max_packet_size > usize::from(u16::MAX) {
            return Err(IngestionError::InvalidArgument(
                "max_packet_size exceeds the 16-bit length prefix",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(IngestionError::InvalidArgument("timeout_ms is zero"));
        }
        Ok(())
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            timeout_ms: 500,
            max_write_retries: 3,
        }
    }
}
