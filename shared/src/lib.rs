//! # Shared Protocol Library
//!
//! This crate provides the building blocks of the Ampoule command channel:
//!
//! - **Ring Buffer**: Fixed-capacity receive buffer with zero-copy claim/finish reads
//! - **Protocol Messages**: Command/response schema and length-prefixed framing
//! - **Capability Traits**: Transport, command processor and message codec seams
//! - **Device Commands**: The firmware's built-in command processor
//!
//! ## Architecture
//!
//! ```text
//! UART RX ──► RingBuffer ──► framing ──► MessageCodec::decode
//!                                              │
//!                                   CommandProcessor::on_command
//!                                              │
//! UART TX ◄── Transport::write_all ◄── [len][MessageCodec::encode]
//! ```
//!
//! The framing state machine and dispatcher live in `ampoule-ingestion`;
//! everything here is `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod buffer;
pub mod command;
pub mod protocol;
pub mod traits;

// Re-export main types for convenience
pub use buffer::{BufferError, BufferSlice, RingBuffer};
pub use command::{DeviceCommands, Indicator, NoIndicator};
pub use protocol::{
    Command, CodecError, FrameError, LedColor, Opcode, PostcardCodec, Response,
    LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, MAX_PACKET_SIZE,
};
pub use traits::{
    CommandProcessor, IoTransport, MessageCodec, Transport, TransportError, TransportResult,
};

/// Library version for protocol compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
