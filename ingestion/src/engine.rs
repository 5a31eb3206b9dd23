//! # Framing State Machine
//!
//! Reassembles `[len_hi][len_lo][payload]` frames from whatever the ring
//! buffer holds, one transition at a time:
//!
//! ```text
//!            pop hi             pop lo, arm timeout
//! AwaitLengthHigh ───► AwaitLengthLow ──────────────────► AwaitData
//!       ▲                                                     │
//!       │                            size >= expected,        │
//!       │  claim, dispatch, finish   cancel timeout           ▼
//!       └─────────────────────────────────────────────── Parsing
//! ```
//!
//! The length is read one byte per state so progress never depends on how
//! the transport chunked its deliveries. [`FramingEngine::drain`] keeps
//! stepping until the buffered bytes cannot move the machine any further, so
//! several messages queued back-to-back are all handled in one pass.

use std::sync::{Arc, Mutex};

use ampoule_shared::RingBuffer;
use log::{debug, error, warn};

use crate::dispatcher::lock;
use crate::dispatch::PacketHandler;
use crate::error::IngestionError;
use crate::stats::Counters;
use crate::timeout::TimeoutControl;

/// Where the engine is within the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingState {
    /// Waiting for the high byte of the length prefix
    AwaitLengthHigh,
    /// Waiting for the low byte of the length prefix
    AwaitLengthLow,
    /// Length known, waiting for the whole payload to be buffered
    AwaitData,
    /// Payload complete, handing it to the packet handler
    Parsing,
}

pub struct FramingEngine<const N: usize> {
    state: FramingState,
    expected_size: u16,
    /// Payload length of the last message handed off
    bytes_read: usize,
    max_packet_size: usize,
    /// Copy of a payload that wrapped around the end of the ring buffer
    scratch: heapless::Vec<u8, N>,
    stats: Arc<Counters>,
}

impl<const N: usize> FramingEngine<N> {
    pub(crate) fn new(max_packet_size: usize, stats: Arc<Counters>) -> Self {
        Self {
            state: FramingState::AwaitLengthHigh,
            expected_size: 0,
            bytes_read: 0,
            max_packet_size: max_packet_size.min(N),
            scratch: heapless::Vec::new(),
            stats,
        }
    }

    pub fn state(&self) -> FramingState {
        self.state
    }

    pub fn expected_size(&self) -> u16 {
        self.expected_size
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Run as many transitions as the buffered bytes allow
    pub fn drain<H, T>(&mut self, ring: &Mutex<RingBuffer<N>>, timeout: &mut T, handler: &mut H)
    where
        H: PacketHandler,
        T: TimeoutControl,
    {
        while self.step(ring, timeout, handler) {}
    }

    /// Perform one transition, returning `false` when more bytes are needed
    fn step<H, T>(&mut self, ring: &Mutex<RingBuffer<N>>, timeout: &mut T, handler: &mut H) -> bool
    where
        H: PacketHandler,
        T: TimeoutControl,
    {
        let mut rb = lock(ring);

        match self.state {
            FramingState::AwaitLengthHigh => {
                let Some(high) = rb.pop() else {
                    return false;
                };
                self.expected_size = u16::from(high) << 8;
                self.state = FramingState::AwaitLengthLow;
            }
            FramingState::AwaitLengthLow => {
                let Some(low) = rb.pop() else {
                    return false;
                };
                self.expected_size |= u16::from(low);

                let declared = usize::from(self.expected_size);
                if declared > self.max_packet_size {
                    // The stream position is lost; drop everything buffered
                    rb.reset();
                    self.reset();
                    self.record(IngestionError::ProtocolViolation {
                        declared,
                        max: self.max_packet_size,
                    });
                    return false;
                }

                timeout.arm();
                self.state = FramingState::AwaitData;
            }
            FramingState::AwaitData => {
                if rb.size() < usize::from(self.expected_size) {
                    return false;
                }
                timeout.cancel();
                self.state = FramingState::Parsing;
            }
            FramingState::Parsing => {
                let len = usize::from(self.expected_size);

                let claimed = rb.claim(len);
                let accepted = if claimed.len() == len {
                    let accepted = handler.accept(claimed);
                    if let Err(e) = rb.finish(len) {
                        error!("lost track of {} claimed bytes: {:?}", len, e);
                        rb.reset();
                    }
                    accepted
                } else {
                    // Payload wraps past the end of storage; copy it out.
                    // `max_packet_size` is clamped to N, so this only fails if
                    // that invariant is broken.
                    self.scratch.clear();
                    if self.scratch.resize(len, 0).is_err() {
                        rb.reset();
                        drop(rb);
                        self.reset();
                        self.record(IngestionError::ProtocolViolation {
                            declared: len,
                            max: N,
                        });
                        return true;
                    }
                    rb.read(&mut self.scratch);
                    handler.accept(&self.scratch)
                };
                drop(rb);

                self.bytes_read = len;
                self.expected_size = 0;
                self.state = FramingState::AwaitLengthHigh;

                match accepted.and_then(|pending| handler.complete(pending)) {
                    Ok(()) => {
                        Counters::bump(&self.stats.messages_dispatched);
                        debug!("dispatched {} byte message", len);
                    }
                    Err(e) => self.record(e),
                }
            }
        }

        true
    }

    /// Drop the partial message after its deadline passed
    pub fn on_timeout(&mut self, ring: &Mutex<RingBuffer<N>>) {
        let buffered = {
            let mut rb = lock(ring);
            let buffered = rb.size();
            rb.reset();
            buffered
        };

        warn!(
            "receive timed out waiting for {} byte message ({} bytes buffered), dropping",
            self.expected_size, buffered
        );
        Counters::bump(&self.stats.timeouts);
        self.reset();
    }

    fn reset(&mut self) {
        self.state = FramingState::AwaitLengthHigh;
        self.expected_size = 0;
    }

    fn record(&self, e: IngestionError) {
        let counter = match &e {
            IngestionError::Decode(_) => &self.stats.decode_errors,
            IngestionError::ProtocolViolation { .. } => &self.stats.protocol_violations,
            IngestionError::Encode(_) => &self.stats.encode_errors,
            IngestionError::TransportWrite(_) => &self.stats.transport_errors,
            _ => {
                error!("unexpected dispatch error: {}", e);
                return;
            }
        };
        Counters::bump(counter);
        warn!("message dropped: {}", e);
    }
}
