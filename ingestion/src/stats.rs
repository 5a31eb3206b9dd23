use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about an ingestion session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Bytes accepted into the receive buffer
    pub bytes_received: u64,
    /// Messages handed to the command processor
    pub messages_dispatched: u64,
    /// Payloads that failed to decode (dropped, no response)
    pub decode_errors: u64,
    /// Declared lengths above the packet limit
    pub protocol_violations: u64,
    /// Partial messages discarded by the stall timeout
    pub timeouts: u64,
    /// `feed` calls that did not fit in the receive buffer
    pub overflows: u64,
    /// Responses that could not be encoded
    pub encode_errors: u64,
    /// Responses abandoned because the transport failed
    pub transport_errors: u64,
}

/// Live counters shared between the producer handle and the dispatcher
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub bytes_received: AtomicU64,
    pub messages_dispatched: AtomicU64,
    pub decode_errors: AtomicU64,
    pub protocol_violations: AtomicU64,
    pub timeouts: AtomicU64,
    pub overflows: AtomicU64,
    pub encode_errors: AtomicU64,
    pub transport_errors: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestionStats {
        IngestionStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}
