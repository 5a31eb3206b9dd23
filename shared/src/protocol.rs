//! # Protocol Message Definitions
//!
//! This module defines the command/response schema exchanged over the
//! command channel and the length-prefixed frame that carries it.
//! Messages are serialized using `postcard` for compact, no_std-compatible
//! encoding.
//!
//! ## Frame Format
//!
//! Both directions use the same framing:
//!
//! ```text
//! ┌───────────────────┬──────────────────────────────┐
//! │      Length       │           Payload            │
//! │ 2 bytes, big-end. │ `Length` bytes (postcard)    │
//! └───────────────────┴──────────────────────────────┘
//! ```
//!
//! The length never exceeds [`MAX_PACKET_SIZE`].

use serde::{Deserialize, Serialize};

use crate::traits::MessageCodec;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload accepted on the wire (also the receive buffer capacity)
pub const MAX_PACKET_SIZE: usize = 1024;

/// Largest complete frame, prefix included
pub const MAX_FRAME_SIZE: usize = MAX_PACKET_SIZE + LENGTH_PREFIX_SIZE;

/// Operation codes carried in responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    /// Liveness probe
    Ping,
    /// Answer to [`Opcode::Ping`]
    Pong,
    /// Drive the status LED
    SetLed,
}

/// Colors the status LED can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColor {
    Off,
    White,
}

/// Commands received from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Keep-alive ping
    Ping,
    /// Set the status LED
    SetLed { color: LedColor },
}

impl Command {
    /// Get the opcode this command is filed under
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Ping => Opcode::Ping,
            Command::SetLed { .. } => Opcode::SetLed,
        }
    }
}

/// Response sent back for every decoded command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    pub opcode: Opcode,
    pub success: bool,
}

/// Errors raised by a [`MessageCodec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Output buffer too small for the encoded message
    BufferTooSmall,
    /// Payload is not a valid message
    Malformed,
    /// Payload decoded but bytes were left over
    TrailingBytes,
    /// Serializer rejected the value
    Unencodable,
}

impl From<postcard::Error> for CodecError {
    fn from(e: postcard::Error) -> Self {
        match e {
            postcard::Error::SerializeBufferFull => CodecError::BufferTooSmall,
            postcard::Error::SerializeSeqLengthUnknown
            | postcard::Error::SerdeSerCustom
            | postcard::Error::WontImplement
            | postcard::Error::NotYetImplemented => CodecError::Unencodable,
            _ => CodecError::Malformed,
        }
    }
}

/// Errors during frame building/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Buffer too small for frame
    BufferTooSmall,
    /// Frame data shorter than its length prefix announces
    TooShort,
    /// Payload does not fit the 16-bit length prefix or the packet limit
    PayloadTooLarge { len: usize, max: usize },
    /// Encoding or decoding the payload failed
    Codec(CodecError),
}

impl From<CodecError> for FrameError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::BufferTooSmall => FrameError::BufferTooSmall,
            other => FrameError::Codec(other),
        }
    }
}

/// Postcard encoding of [`Command`] and [`Response`]
#[derive(Debug, Default, Clone, Copy)]
pub struct PostcardCodec;

impl MessageCodec for PostcardCodec {
    type Command = Command;
    type Response = Response;

    fn decode(&self, payload: &[u8]) -> Result<Command, CodecError> {
        let (command, rest) = postcard::take_from_bytes(payload)?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes);
        }
        Ok(command)
    }

    fn encode(&self, response: &Response, out: &mut [u8]) -> Result<usize, CodecError> {
        Ok(postcard::to_slice(response, out)?.len())
    }
}

/// Big-endian length prefix for a payload of `len` bytes
pub fn length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], FrameError> {
    let len = u16::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        len,
        max: u16::MAX as usize,
    })?;
    Ok(len.to_be_bytes())
}

/// Build a frame in `out` around a payload produced by `encode`
///
/// `encode` receives the space after the prefix and returns how many bytes
/// it wrote. Payloads longer than `max_payload` are rejected. Returns the
/// total frame length.
pub fn write_frame<F>(out: &mut [u8], max_payload: usize, encode: F) -> Result<usize, FrameError>
where
    F: FnOnce(&mut [u8]) -> Result<usize, CodecError>,
{
    if out.len() < LENGTH_PREFIX_SIZE {
        return Err(FrameError::BufferTooSmall);
    }

    let payload_len = encode(&mut out[LENGTH_PREFIX_SIZE..])?;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            len: payload_len,
            max: max_payload,
        });
    }

    out[..LENGTH_PREFIX_SIZE].copy_from_slice(&length_prefix(payload_len)?);
    Ok(LENGTH_PREFIX_SIZE + payload_len)
}

/// Split a complete frame into its payload
pub fn frame_payload(frame: &[u8]) -> Result<&[u8], FrameError> {
    if frame.len() < LENGTH_PREFIX_SIZE {
        return Err(FrameError::TooShort);
    }

    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    frame[LENGTH_PREFIX_SIZE..]
        .get(..len)
        .ok_or(FrameError::TooShort)
}

/// Encode a command as a complete frame (host side)
pub fn frame_command<const F: usize>(command: &Command) -> Result<heapless::Vec<u8, F>, FrameError> {
    let mut frame = heapless::Vec::<u8, F>::new();
    frame
        .resize(F, 0)
        .map_err(|_| FrameError::BufferTooSmall)?;

    let len = write_frame(&mut frame, MAX_PACKET_SIZE, |out| {
        Ok(postcard::to_slice(command, out)?.len())
    })?;
    frame.truncate(len);
    Ok(frame)
}

/// Decode a response frame (host side)
pub fn parse_response(frame: &[u8]) -> Result<Response, FrameError> {
    let payload = frame_payload(frame)?;
    let (response, rest) = postcard::take_from_bytes(payload).map_err(CodecError::from)?;
    if !rest.is_empty() {
        return Err(FrameError::Codec(CodecError::TrailingBytes));
    }
    Ok(response)
}
