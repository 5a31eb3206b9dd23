//! # Message Dispatch
//!
//! What happens to a payload once the framing engine has a complete one.
//!
//! Handling is split in two so the receive buffer is only locked while the
//! payload is actually borrowed:
//!
//! 1. [`PacketHandler::accept`] runs with the payload borrowed straight out
//!    of the ring buffer (zero-copy). It should do as little as possible,
//!    typically decode into an owned value.
//! 2. [`PacketHandler::complete`] runs after the bytes have been released,
//!    still on the dispatcher. Slow work (processing, encoding, writing the
//!    response) goes here so producers are never held up by it.

use ampoule_shared::protocol::write_frame;
use ampoule_shared::{CommandProcessor, MessageCodec, Transport, LENGTH_PREFIX_SIZE};
use log::{debug, trace};

use crate::config::IngestionConfig;
use crate::error::{IngestionError, Result};

/// Consumer of complete payloads
pub trait PacketHandler {
    /// Work carried from `accept` to `complete`
    type Pending;

    /// Inspect a payload borrowed from the receive buffer
    fn accept(&mut self, payload: &[u8]) -> Result<Self::Pending>;

    /// Finish handling once the payload has been released
    fn complete(&mut self, pending: Self::Pending) -> Result<()>;
}

/// Decode, process, encode and answer each message
pub struct CommandDispatcher<C, P, T> {
    codec: C,
    processor: P,
    transport: T,
    /// Response frame under construction
    tx: Vec<u8>,
    max_packet_size: usize,
    max_write_retries: u8,
}

impl<C, P, T> CommandDispatcher<C, P, T>
where
    C: MessageCodec,
    P: CommandProcessor<Command = C::Command, Response = C::Response>,
    T: Transport,
{
    pub fn new(codec: C, processor: P, transport: T, config: &IngestionConfig) -> Self {
        Self {
            codec,
            processor,
            transport,
            tx: vec![0u8; config.max_packet_size + LENGTH_PREFIX_SIZE],
            max_packet_size: config.max_packet_size,
            max_write_retries: config.max_write_retries,
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<C, P, T> PacketHandler for CommandDispatcher<C, P, T>
where
    C: MessageCodec,
    P: CommandProcessor<Command = C::Command, Response = C::Response>,
    T: Transport,
{
    type Pending = C::Command;

    fn accept(&mut self, payload: &[u8]) -> Result<C::Command> {
        self.codec.decode(payload).map_err(IngestionError::Decode)
    }

    fn complete(&mut self, command: C::Command) -> Result<()> {
        let response = self.processor.on_command(command);

        let codec = &self.codec;
        let len = write_frame(&mut self.tx, self.max_packet_size, |out| {
            codec.encode(&response, out)
        })
        .map_err(IngestionError::Encode)?;

        trace!("writing {} byte response frame", len);
        self.transport
            .write_all(&self.tx[..len], self.max_write_retries)
            .map_err(IngestionError::TransportWrite)?;

        debug!("response sent ({} byte payload)", len - LENGTH_PREFIX_SIZE);
        Ok(())
    }
}

/// Hands every raw payload to a callback, without decoding or answering
///
/// The callback runs while the receive buffer is locked and must be quick.
pub struct RawObserver<F> {
    observer: F,
}

impl<F: FnMut(&[u8])> RawObserver<F> {
    pub fn new(observer: F) -> Self {
        Self { observer }
    }
}

impl<F: FnMut(&[u8])> PacketHandler for RawObserver<F> {
    type Pending = ();

    fn accept(&mut self, payload: &[u8]) -> Result<()> {
        (self.observer)(payload);
        Ok(())
    }

    fn complete(&mut self, _pending: ()) -> Result<()> {
        Ok(())
    }
}
