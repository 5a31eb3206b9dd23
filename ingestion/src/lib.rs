//! # Ampoule Ingestion Engine
//!
//! Receive side of the command channel. Bytes arrive from a transport in
//! arbitrary fragments; this crate buffers them, reassembles
//! `[len_hi][len_lo][payload]` messages, and hands each complete payload to
//! a handler on a single serialized dispatcher task.
//!
//! ## Components
//!
//! - **Session**: owns the receive buffer and the dispatcher; producers call
//!   [`IngestionHandle::feed`] from any thread
//! - **Framing engine**: byte-at-a-time length prefix, zero-copy payload
//!   claims, copy extraction only when a payload wraps
//! - **Timeout guard**: drops a partial message that stalls past its window
//! - **Dispatch**: [`CommandDispatcher`] decodes, processes and answers;
//!   [`RawObserver`] just sees the raw payload
//! - **Pump**: drives a session from an `embedded-io-async` reader
//!
//! ## Example
//!
//! ```no_run
//! use ampoule_ingestion::IngestionSession;
//! use ampoule_shared::{DeviceCommands, Transport, TransportResult};
//!
//! struct Uart;
//!
//! impl Transport for Uart {
//!     fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
//!         Ok(data.len())
//!     }
//! }
//!
//! # async fn run() -> ampoule_ingestion::Result<()> {
//! let session = IngestionSession::builder()
//!     .transport(Uart)
//!     .processor(DeviceCommands::without_led())
//!     .spawn()?;
//!
//! // PING
//! session.feed(&[0x00, 0x01, 0x00])?;
//! session.shutdown().await
//! # }
//! ```

pub mod config;
pub mod dispatch;
mod dispatcher;
pub mod engine;
pub mod error;
pub mod pump;
pub mod session;
pub mod stats;
pub mod timeout;

pub use config::IngestionConfig;
pub use dispatch::{CommandDispatcher, PacketHandler, RawObserver};
pub use engine::{FramingEngine, FramingState};
pub use error::{IngestionError, Result};
pub use pump::pump;
pub use session::{IngestionHandle, IngestionSession, SessionBuilder};
pub use stats::IngestionStats;
pub use timeout::{
    ExpiryNotifier, ScheduledWork, Scheduler, TimeoutControl, TimeoutGuard, TokioScheduler,
};
