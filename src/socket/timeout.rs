//! Idle timeout for one connection.
//!
//! A single rearmable timer runs as a tokio task. Successful writes rearm
//! it with the last configured interval, so it measures idle time rather
//! than time since connect. When it fires it emits a `timeout` event on
//! the connection and clears itself; it never closes the connection.
//!
//! The timer task runs on the tokio runtime the controller was created
//! in, so it may be armed from any thread, including a transport's own
//! I/O thread completing a write.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::protocol::{EventKind, EventPayload};

use super::router::{Delivery, EventRouter, Subscription};

// ============================================================================
// Types
// ============================================================================

/// One-shot callback run on the next `timeout` event.
pub type TimeoutCallback = Box<dyn FnOnce() + Send + 'static>;

/// The live timer.
struct TimerRecord {
    /// Task sleeping until the deadline.
    handle: JoinHandle<()>,
    /// Interval it was armed with.
    interval: Duration,
}

/// Timer state shared with the timer task.
#[derive(Default)]
struct TimerState {
    /// Interval used for rearming; `None` when disabled.
    interval: Option<Duration>,
    /// At most one live timer.
    timer: Option<TimerRecord>,
    /// Bumped on every arm/disarm; a woken task with a stale value exits.
    generation: u64,
    /// Callbacks registered through `set_timeout`.
    callbacks: Vec<Subscription>,
    /// Runtime the timer task is spawned on.
    runtime: Option<Handle>,
}

// ============================================================================
// TimeoutController
// ============================================================================

/// Owner of a connection's idle timer.
pub(crate) struct TimeoutController {
    /// Router the `timeout` event is emitted through.
    router: EventRouter,
    /// Shared with the timer task.
    state: Arc<Mutex<TimerState>>,
}

impl TimeoutController {
    /// Creates a disarmed controller bound to the current tokio runtime,
    /// if any.
    pub(crate) fn new(router: EventRouter) -> Self {
        let state = TimerState {
            runtime: Handle::try_current().ok(),
            ..TimerState::default()
        };

        Self {
            router,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Configures the idle timeout.
    ///
    /// A zero `timeout` disarms the timer and removes callbacks registered
    /// by earlier calls. Otherwise the timer is (re)armed for `timeout`
    /// and `callback`, if any, runs once on the next `timeout` event.
    ///
    /// Without a tokio runtime the interval is recorded but no timer runs.
    pub(crate) fn set_timeout(&self, timeout: Duration, callback: Option<TimeoutCallback>) {
        if timeout.is_zero() {
            let callbacks = {
                let mut state = self.state.lock();
                state.interval = None;
                Self::cancel(&mut state);
                std::mem::take(&mut state.callbacks)
            };
            for subscription in callbacks {
                self.router.off(subscription);
            }
            debug!(id = %self.router.id(), "Idle timeout disabled");
            return;
        }

        if let Some(callback) = callback {
            let slot = Mutex::new(Some(callback));
            let subscription = self.router.on(EventKind::Timeout, Delivery::Once, move || {
                if let Some(callback) = slot.lock().take() {
                    callback();
                }
            });
            let mut state = self.state.lock();
            state.callbacks.retain(|s| self.router.is_registered(*s));
            state.callbacks.push(subscription);
        }

        self.arm(timeout);
    }

    /// Rearms with the configured interval.
    ///
    /// Returns `false` if no interval is configured.
    pub(crate) fn rearm(&self) -> bool {
        let interval = self.state.lock().interval;
        match interval {
            Some(interval) => {
                self.arm(interval);
                true
            }
            None => false,
        }
    }

    /// Cancels the live timer, keeping the configured interval.
    ///
    /// Returns `true` if a timer was pending.
    pub(crate) fn disarm(&self) -> bool {
        let disarmed = Self::cancel(&mut self.state.lock());
        if disarmed {
            trace!(id = %self.router.id(), "Idle timer disarmed");
        }
        disarmed
    }

    /// Forgets callback subscriptions whose listeners were already
    /// released.
    pub(crate) fn forget_callbacks(&self) {
        self.state.lock().callbacks.clear();
    }

    /// Returns the configured interval.
    pub(crate) fn interval(&self) -> Option<Duration> {
        self.state.lock().interval
    }

    /// Returns `true` if a timer is pending.
    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.state.lock().timer.is_some()
    }

    /// Replaces any live timer with one firing after `interval`.
    fn arm(&self, interval: Duration) {
        let mut state = self.state.lock();
        Self::cancel(&mut state);
        state.interval = Some(interval);

        let Some(runtime) = state.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(id = %self.router.id(), "No tokio runtime, idle timer not armed");
            return;
        };
        state.runtime = Some(runtime.clone());

        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let router = self.router.clone();

        let handle = runtime.spawn(async move {
            sleep(interval).await;

            {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
            }

            debug!(
                id = %router.id(),
                interval_ms = interval.as_millis() as u64,
                "Idle timeout elapsed"
            );
            router.emit(EventPayload::Timeout);
        });

        state.timer = Some(TimerRecord { handle, interval });
        trace!(
            id = %self.router.id(),
            interval_ms = interval.as_millis() as u64,
            "Idle timer armed"
        );
    }

    /// Aborts the live timer and invalidates in-flight wakeups.
    fn cancel(state: &mut TimerState) -> bool {
        state.generation += 1;
        match state.timer.take() {
            Some(record) => {
                trace!(
                    interval_ms = record.interval.as_millis() as u64,
                    "Cancelling idle timer"
                );
                record.handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TimeoutController {
    fn drop(&mut self) {
        Self::cancel(&mut self.state.lock());
    }
}

// ============================================================================
// Tests
// ============================================================================
