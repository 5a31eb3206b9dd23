//! # Ingestion Session
//!
//! The unit of ownership for one command channel: a receive ring buffer, a
//! framing engine, a timeout guard and a dispatcher task, wired to one
//! transport and one command processor.
//!
//! ```text
//!  UART ISR / socket callback            dispatcher task
//!  ──────────────────────────            ───────────────
//!  IngestionHandle::feed(bytes)
//!    ├─ push into RingBuffer ───────────► FramingEngine::drain
//!    └─ wake (coalesced) ───── Work ───►   ├─ decode, on_command
//!                                          └─ encode, Transport::write_all
//!  timeout expiry ─────────── Work ───► FramingEngine::on_timeout
//! ```

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ampoule_shared::{CommandProcessor, MessageCodec, PostcardCodec, Transport, MAX_PACKET_SIZE};
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::IngestionConfig;
use crate::dispatch::{CommandDispatcher, PacketHandler, RawObserver};
use crate::dispatcher::{lock, Shared, Work, Worker};
use crate::engine::FramingEngine;
use crate::error::{IngestionError, Result};
use crate::stats::{Counters, IngestionStats};
use crate::timeout::{Scheduler, TimeoutGuard, TokioScheduler};

/// Producer-side handle to a session
///
/// Cheap to clone and safe to use from any thread. `feed` never waits on the
/// dispatcher; it only holds the ring buffer lock long enough to copy bytes.
pub struct IngestionHandle<const N: usize> {
    pub(crate) shared: Arc<Shared<N>>,
    pub(crate) queue: UnboundedSender<Work>,
}

impl<const N: usize> Clone for IngestionHandle<N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
        }
    }
}

impl<const N: usize> IngestionHandle<N> {
    /// Append received bytes and wake the dispatcher
    ///
    /// If the buffer cannot take all of `bytes`, the prefix that fit stays
    /// queued, the dispatcher is still woken, and
    /// [`IngestionError::Overflow`] tells the caller how many bytes were
    /// accepted so it can offer the rest again later.
    pub fn feed(&self, bytes: &[u8]) -> Result<()> {
        if self.queue.is_closed() {
            return Err(IngestionError::Closed);
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let accepted = lock(&self.shared.ring).push(bytes);
        self.shared
            .stats
            .bytes_received
            .fetch_add(accepted as u64, Ordering::Relaxed);

        self.wake()?;

        if accepted < bytes.len() {
            Counters::bump(&self.shared.stats.overflows);
            warn!(
                "receive buffer full, accepted {} of {} bytes",
                accepted,
                bytes.len()
            );
            return Err(IngestionError::Overflow {
                accepted,
                offered: bytes.len(),
            });
        }

        Ok(())
    }

    /// Free space in the receive buffer
    pub fn space(&self) -> usize {
        lock(&self.shared.ring).space()
    }

    pub fn stats(&self) -> IngestionStats {
        self.shared.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    fn wake(&self) -> Result<()> {
        if self.shared.scheduled.swap(true, Ordering::SeqCst) {
            // A run is already queued and will see these bytes
            return Ok(());
        }
        self.queue.send(Work::Process).map_err(|_| {
            self.shared.scheduled.store(false, Ordering::SeqCst);
            IngestionError::Closed
        })
    }
}

/// A running ingestion session
///
/// `N` is the receive buffer capacity and therefore the hard upper bound on
/// a message payload.
pub struct IngestionSession<const N: usize = MAX_PACKET_SIZE> {
    handle: IngestionHandle<N>,
    worker: JoinHandle<()>,
}

impl IngestionSession<MAX_PACKET_SIZE> {
    /// Start configuring a session with the default buffer capacity
    pub fn builder<T, P>() -> SessionBuilder<T, P, PostcardCodec, MAX_PACKET_SIZE> {
        SessionBuilder::new()
    }

    /// Start a session that hands raw payloads to `observer`
    ///
    /// Nothing is decoded and no response is sent.
    pub fn spawn_observer<F>(config: IngestionConfig, observer: F) -> Result<Self>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        Self::spawn_with(RawObserver::new(observer), config, None)
    }
}

impl<const N: usize> IngestionSession<N> {
    /// Start a session around any packet handler
    ///
    /// Must be called from within a tokio runtime; the dispatcher runs as a
    /// task on it. Without a `scheduler`, timeouts use tokio timers.
    pub fn spawn_with<H>(
        handler: H,
        config: IngestionConfig,
        scheduler: Option<Arc<dyn Scheduler>>,
    ) -> Result<Self>
    where
        H: PacketHandler + Send + 'static,
    {
        config.validate(N)?;
        let runtime = Handle::try_current().map_err(|_| IngestionError::NoRuntime)?;
        let scheduler =
            scheduler.unwrap_or_else(|| Arc::new(TokioScheduler::new(runtime.clone())));

        let (queue, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::<N>::new());

        // A weak sender, so a pending deadline does not keep the worker alive
        // once every producer handle is gone
        let expiry_queue = queue.downgrade();
        let guard = TimeoutGuard::new(
            scheduler,
            config.timeout(),
            Arc::new(move |generation: u64| {
                if let Some(queue) = expiry_queue.upgrade() {
                    let _ = queue.send(Work::Timeout(generation));
                }
            }),
        );

        let worker = Worker {
            shared: Arc::clone(&shared),
            engine: FramingEngine::new(config.max_packet_size, Arc::clone(&shared.stats)),
            guard,
            handler,
            queue: receiver,
        };
        let worker = runtime.spawn(worker.run());

        info!(
            "ingestion session started (capacity {} bytes, max packet {} bytes, timeout {} ms)",
            N, config.max_packet_size, config.timeout_ms
        );

        Ok(Self {
            handle: IngestionHandle { shared, queue },
            worker,
        })
    }

    /// Append received bytes and wake the dispatcher
    ///
    /// See [`IngestionHandle::feed`].
    pub fn feed(&self, bytes: &[u8]) -> Result<()> {
        self.handle.feed(bytes)
    }

    /// Another producer handle for this session
    pub fn handle(&self) -> IngestionHandle<N> {
        self.handle.clone()
    }

    pub fn stats(&self) -> IngestionStats {
        self.handle.stats()
    }

    /// Stop the dispatcher after the work already queued
    ///
    /// Bytes still buffered as a partial message are discarded.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.handle.queue.send(Work::Shutdown);
        self.worker.await.map_err(|e| {
            error!("dispatcher task failed: {}", e);
            IngestionError::Closed
        })?;
        debug!("ingestion session shut down");
        Ok(())
    }
}

/// Builder for a session that decodes, processes and answers commands
pub struct SessionBuilder<T, P, C, const N: usize> {
    transport: Option<T>,
    processor: Option<P>,
    codec: C,
    config: IngestionConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    _capacity: PhantomData<[u8; N]>,
}

impl<T, P, const N: usize> SessionBuilder<T, P, PostcardCodec, N> {
    pub fn new() -> Self {
        Self {
            transport: None,
            processor: None,
            codec: PostcardCodec,
            config: IngestionConfig::default(),
            scheduler: None,
            _capacity: PhantomData,
        }
    }
}

impl<T, P, const N: usize> Default for SessionBuilder<T, P, PostcardCodec, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P, C, const N: usize> SessionBuilder<T, P, C, N> {
    /// Where responses are written
    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Who answers decoded commands
    pub fn processor(mut self, processor: P) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn config(mut self, config: IngestionConfig) -> Self {
        self.config = config;
        self
    }

    /// Schedule timeouts somewhere other than tokio timers
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Use a different message schema
    pub fn codec<C2>(self, codec: C2) -> SessionBuilder<T, P, C2, N> {
        SessionBuilder {
            transport: self.transport,
            processor: self.processor,
            codec,
            config: self.config,
            scheduler: self.scheduler,
            _capacity: PhantomData,
        }
    }

    /// Validate and start the session
    ///
    /// Fails with [`IngestionError::InvalidArgument`] when the transport or
    /// processor was never supplied; nothing is started in that case.
    pub fn spawn(self) -> Result<IngestionSession<N>>
    where
        C: MessageCodec + Send + 'static,
        P: CommandProcessor<Command = C::Command, Response = C::Response> + Send + 'static,
        T: Transport + Send + 'static,
    {
        let transport = self
            .transport
            .ok_or(IngestionError::InvalidArgument("transport is missing"))?;
        let processor = self
            .processor
            .ok_or(IngestionError::InvalidArgument("command processor is missing"))?;
        self.config.validate(N)?;

        let dispatcher = CommandDispatcher::new(self.codec, processor, transport, &self.config);
        IngestionSession::spawn_with(dispatcher, self.config, self.scheduler)
    }
}
