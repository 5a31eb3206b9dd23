//! # Timeout Guard
//!
//! A re-armable, cancellable one-shot deadline for the message currently
//! being reassembled.
//!
//! The guard never touches session state itself. When its deadline passes it
//! only reports the generation that expired (the session posts it onto the
//! dispatcher queue), and the dispatcher asks [`TimeoutGuard::expire`]
//! whether that generation is still the live one. Arming, cancelling and
//! firing are therefore totally ordered with buffer draining, and a firing
//! that lost a race against `cancel` or a re-arm is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Handle to one pending delayed callback
pub trait ScheduledWork: Send {
    /// Prevent the callback from running; no-op if it already ran
    fn cancel(&mut self);
}

/// Delayed-callback facility the guard schedules its deadline on
pub trait Scheduler: Send + Sync {
    /// Run `fire` once after `delay` unless the returned handle is cancelled
    fn schedule_once(
        &self,
        delay: Duration,
        fire: Box<dyn FnOnce() + Send + 'static>,
    ) -> Box<dyn ScheduledWork>;
}

/// [`Scheduler`] backed by tokio timers
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

struct SleepTask(JoinHandle<()>);

impl ScheduledWork for SleepTask {
    fn cancel(&mut self) {
        self.0.abort();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        fire: Box<dyn FnOnce() + Send + 'static>,
    ) -> Box<dyn ScheduledWork> {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        });
        Box::new(SleepTask(task))
    }
}

/// Deadline control used by the framing engine
pub trait TimeoutControl {
    /// Start (or restart) the deadline
    fn arm(&mut self);
    /// Stop the deadline; no-op when not armed
    fn cancel(&mut self);
}

/// Callback receiving the generation of an expired deadline
pub type ExpiryNotifier = Arc<dyn Fn(u64) + Send + Sync>;

pub struct TimeoutGuard {
    scheduler: Arc<dyn Scheduler>,
    window: Duration,
    notify: ExpiryNotifier,
    generation: u64,
    pending: Option<Box<dyn ScheduledWork>>,
}

impl TimeoutGuard {
    pub fn new(scheduler: Arc<dyn Scheduler>, window: Duration, notify: ExpiryNotifier) -> Self {
        Self {
            scheduler,
            window,
            notify,
            generation: 0,
            pending: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Generation of the most recent arm
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consume an expiry notification
    ///
    /// Returns `true` exactly once per arm, and only if `generation` is the
    /// deadline currently armed. The guard is disarmed when it returns `true`.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            return false;
        }
        self.pending = None;
        true
    }
}

impl TimeoutControl for TimeoutGuard {
    fn arm(&mut self) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let notify = Arc::clone(&self.notify);
        self.pending = Some(
            self.scheduler
                .schedule_once(self.window, Box::new(move || notify(generation))),
        );
    }

    fn cancel(&mut self) {
        if let Some(mut pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}
