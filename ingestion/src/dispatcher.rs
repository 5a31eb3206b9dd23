//! # Serialized Dispatcher
//!
//! One worker task per session. Everything that touches framing state
//! (draining the ring buffer, arming/cancelling the timeout, reacting to the
//! timeout) arrives as a [`Work`] item on a single queue and runs on this
//! task, one item at a time. No other context ever mutates the engine.
//!
//! Producers only push bytes and request a run. Requests coalesce: while a
//! `Process` item is queued and not yet started, further `feed` calls do not
//! enqueue another one, since the pending run will drain their bytes too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ampoule_shared::RingBuffer;
use log::{debug, trace};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::dispatch::PacketHandler;
use crate::engine::FramingEngine;
use crate::stats::Counters;
use crate::timeout::{TimeoutControl, TimeoutGuard};

/// Unit of work for the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Work {
    /// Drain the ring buffer
    Process,
    /// The timeout armed under this generation expired
    Timeout(u64),
    /// Stop the worker
    Shutdown,
}

/// State shared between producers and the dispatcher
pub(crate) struct Shared<const N: usize> {
    pub ring: Mutex<RingBuffer<N>>,
    /// A `Process` item is queued and has not started yet
    pub scheduled: AtomicBool,
    pub stats: Arc<Counters>,
}

impl<const N: usize> Shared<N> {
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(RingBuffer::new()),
            scheduled: AtomicBool::new(false),
            stats: Arc::new(Counters::default()),
        }
    }
}

/// Lock a mutex, carrying on with the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Worker<H, const N: usize> {
    pub shared: Arc<Shared<N>>,
    pub engine: FramingEngine<N>,
    pub guard: TimeoutGuard,
    pub handler: H,
    pub queue: UnboundedReceiver<Work>,
}

impl<H: PacketHandler, const N: usize> Worker<H, N> {
    pub async fn run(mut self) {
        debug!("dispatcher started");

        while let Some(work) = self.queue.recv().await {
            trace!("dispatcher work: {:?}", work);
            match work {
                Work::Process => {
                    // Cleared before draining so bytes pushed from here on
                    // schedule a fresh run
                    self.shared.scheduled.store(false, Ordering::SeqCst);
                    self.engine
                        .drain(&self.shared.ring, &mut self.guard, &mut self.handler);
                }
                Work::Timeout(generation) => {
                    if self.guard.expire(generation) {
                        self.engine.on_timeout(&self.shared.ring);
                    } else {
                        trace!("ignoring stale timeout {}", generation);
                    }
                }
                Work::Shutdown => break,
            }
        }

        self.guard.cancel();
        debug!("dispatcher stopped");
    }
}
