use ampoule_shared::{CodecError, FrameError, TransportError};
use thiserror::Error;

/// Errors raised by the ingestion engine
///
/// Only `InvalidArgument`, `NoRuntime`, `Overflow` and `Closed` ever reach a
/// caller. The others are handled on the dispatcher (message dropped,
/// engine resumed) and only show up in logs and [`crate::IngestionStats`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("no tokio runtime to run the dispatcher on")]
    NoRuntime,
    #[error("receive buffer full: accepted {accepted} of {offered} bytes")]
    Overflow { accepted: usize, offered: usize },
    #[error("declared length {declared} exceeds packet limit {max}")]
    ProtocolViolation { declared: usize, max: usize },
    #[error("payload decode failed: {0:?}")]
    Decode(CodecError),
    #[error("response encode failed: {0:?}")]
    Encode(FrameError),
    #[error("transport write failed: {0:?}")]
    TransportWrite(TransportError),
    #[error("transport read failed: {0:?}")]
    TransportRead(TransportError),
    #[error("ingestion session closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, IngestionError>;
