//! # Capability Traits
//!
//! The ingestion engine only talks to its collaborators through these traits:
//!
//! - **Transport**: where framed responses are written
//! - **CommandProcessor**: the application logic answering each command
//! - **MessageCodec**: turns payload bytes into commands and responses into bytes
//!
//! Keeping them abstract lets the firmware plug in a UART while tests plug in
//! recording mocks.

use crate::protocol::CodecError;

/// Errors reported by a [`Transport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The underlying link is down
    Disconnected,
    /// Write operation timed out
    WriteTimeout,
    /// The transport kept accepting zero bytes
    WriteZero,
    /// Generic I/O error
    IoError,
    /// Driver-specific negative error code
    Code(i32),
}

impl TransportError {
    /// Classify an `embedded_io` error
    pub fn from_io<E: embedded_io::Error>(e: &E) -> Self {
        use embedded_io::ErrorKind;

        match e.kind() {
            ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => TransportError::Disconnected,
            ErrorKind::TimedOut => TransportError::WriteTimeout,
            _ => TransportError::IoError,
        }
    }
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Byte sink for framed responses
///
/// Partial writes are allowed: `write` reports how many bytes it took and the
/// caller retries with the rest.
pub trait Transport {
    /// Write some prefix of `data`, returning its length
    fn write(&mut self, data: &[u8]) -> TransportResult<usize>;

    /// Write all of `data`, retrying partial writes
    ///
    /// A write that accepts nothing counts as a stall; more than
    /// `max_stalls` stalls in a row gives up with
    /// [`TransportError::WriteZero`]. Any error aborts immediately and the
    /// remainder is abandoned.
    fn write_all(&mut self, data: &[u8], max_stalls: u8) -> TransportResult<()> {
        drain_writes(self, data, max_stalls)
    }
}

fn drain_writes<T: Transport + ?Sized>(
    transport: &mut T,
    mut data: &[u8],
    max_stalls: u8,
) -> TransportResult<()> {
    let mut stalls = 0u16;
    while !data.is_empty() {
        match transport.write(data)? {
            0 => {
                stalls += 1;
                if stalls > u16::from(max_stalls) {
                    return Err(TransportError::WriteZero);
                }
            }
            written => {
                stalls = 0;
                data = &data[written.min(data.len())..];
            }
        }
    }
    Ok(())
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        (**self).write(data)
    }

    fn write_all(&mut self, data: &[u8], max_stalls: u8) -> TransportResult<()> {
        (**self).write_all(data, max_stalls)
    }
}

/// Application logic answering decoded commands
///
/// Called on the serialized dispatcher; implementations must return quickly
/// and must not feed bytes back into the session that called them.
pub trait CommandProcessor {
    type Command;
    type Response;

    fn on_command(&mut self, command: Self::Command) -> Self::Response;
}

/// Payload codec for one message schema
pub trait MessageCodec {
    type Command;
    type Response;

    /// Decode a complete payload into a command
    fn decode(&self, payload: &[u8]) -> Result<Self::Command, CodecError>;

    /// Encode a response into `out`, returning the encoded length
    fn encode(&self, response: &Self::Response, out: &mut [u8]) -> Result<usize, CodecError>;
}

/// [`Transport`] over any blocking `embedded_io::Write` (e.g. a UART driver)
pub struct IoTransport<W> {
    inner: W,
}

impl<W: embedded_io::Write> IoTransport<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the transport and return the writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: embedded_io::Write> Transport for IoTransport<W> {
    fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        self.inner.write(data).map_err(|e| TransportError::from_io(&e))
    }

    fn write_all(&mut self, data: &[u8], max_stalls: u8) -> TransportResult<()> {
        drain_writes(self, data, max_stalls)?;
        self.inner.flush().map_err(|e| TransportError::from_io(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `chunk` bytes per call, or replays a scripted error
    struct Chunked {
        written: heapless::Vec<u8, 64>,
        chunk: usize,
        fail_after: Option<usize>,
    }

    impl Transport for Chunked {
        fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
            if let Some(limit) = self.fail_after {
                if self.written.len() >= limit {
                    return Err(TransportError::Code(-5));
                }
            }
            let len = data.len().min(self.chunk);
            self.written.extend_from_slice(&data[..len]).unwrap();
            Ok(len)
        }
    }

    #[derive(Debug)]
    struct Reset;

    impl embedded_io::Error for Reset {
        fn kind(&self) -> embedded_io::ErrorKind {
            embedded_io::ErrorKind::ConnectionReset
        }
    }

    struct FlakyUart {
        sent: heapless::Vec<u8, 64>,
        flushed: bool,
        broken: bool,
    }

    impl embedded_io::ErrorType for FlakyUart {
        type Error = Reset;
    }

    impl embedded_io::Write for FlakyUart {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Reset> {
            if self.broken {
                return Err(Reset);
            }
            let len = buf.len().min(3);
            self.sent.extend_from_slice(&buf[..len]).unwrap();
            Ok(len)
        }

        fn flush(&mut self) -> Result<(), Reset> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_write_all_retries_partial_writes() {
        let mut transport = Chunked {
            written: heapless::Vec::new(),
            chunk: 2,
            fail_after: None,
        };
        transport.write_all(&[1, 2, 3, 4, 5], 3).unwrap();
        assert_eq!(transport.written.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_write_all_stops_on_error() {
        let mut transport = Chunked {
            written: heapless::Vec::new(),
            chunk: 2,
            fail_after: Some(2),
        };
        let result = transport.write_all(&[1, 2, 3, 4, 5], 3);
        assert_eq!(result, Err(TransportError::Code(-5)));
        assert_eq!(transport.written.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_write_all_gives_up_on_stalls() {
        let mut transport = Chunked {
            written: heapless::Vec::new(),
            chunk: 0,
            fail_after: None,
        };
        assert_eq!(
            transport.write_all(&[1], 3),
            Err(TransportError::WriteZero)
        );
    }

    #[test]
    fn test_write_all_gives_up_at_max_stall_limit() {
        let mut transport = Chunked {
            written: heapless::Vec::new(),
            chunk: 0,
            fail_after: None,
        };
        assert_eq!(
            transport.write_all(&[1], u8::MAX),
            Err(TransportError::WriteZero)
        );
    }

    #[test]
    fn test_io_transport_writes_and_flushes() {
        let mut transport = IoTransport::new(FlakyUart {
            sent: heapless::Vec::new(),
            flushed: false,
            broken: false,
        });
        transport.write_all(&[9, 8, 7, 6, 5], 0).unwrap();

        let uart = transport.into_inner();
        assert_eq!(uart.sent.as_slice(), &[9, 8, 7, 6, 5]);
        assert!(uart.flushed);
    }

    #[test]
    fn test_io_transport_maps_error_kind() {
        let mut transport = IoTransport::new(FlakyUart {
            sent: heapless::Vec::new(),
            flushed: false,
            broken: true,
        });
        assert_eq!(transport.write(&[1]), Err(TransportError::Disconnected));
    }
}
