//! Deferred completion timers
//!
//! A returned rental completes after a settling delay. Each pending
//! completion is a tokio task keyed by rental id, paired with a
//! `CancellationToken` so a cancellation or dispute can stop it before it
//! fires.
//!
//! # Guarantees
//!
//! - At most one timer per rental: scheduling an already scheduled rental is
//!   a no-op.
//! - A timer fires at most once. The task removes its own entry before
//!   running the callback and only runs it if the entry was still there, so
//!   a concurrent `cancel` and the firing task cannot both win.
//! - A hold is only reported when it stopped a timer that had not fired.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::types::RentalId;

/// Outcome of a scheduling request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// A timer task was started
    Started,
    /// A timer for this rental is already pending
    AlreadyPending,
    /// No tokio runtime is available to run the timer
    NoRuntime,
}

/// Outcome of a hold request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    /// The pending timer was stopped
    Held,
    /// An earlier hold already stopped the timer
    AlreadyHeld,
    /// No timer was pending; it has fired or was never started
    NotPending,
}

#[derive(Debug, Default, Clone)]
pub struct CompletionScheduler {
    timers: Arc<DashMap<RentalId, CancellationToken>>,
    held: Arc<DashSet<RentalId>>,
    tasks: TaskTracker,
}

impl CompletionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` for `rental` once `delay` has elapsed
    pub fn schedule<F>(&self, rental: RentalId, delay: Duration, on_fire: F) -> Scheduled
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return Scheduled::NoRuntime,
        };

        let token = match self.timers.entry(rental) {
            Entry::Occupied(_) => return Scheduled::AlreadyPending,
            Entry::Vacant(vacant) => vacant.insert(CancellationToken::new()).value().clone(),
        };

        let timers = Arc::clone(&self.timers);
        handle.spawn(self.tasks.track_future(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(rental = %rental, "completion timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if timers.remove(&rental).is_some() {
                        debug!(rental = %rental, "completion timer fired");
                        on_fire();
                    }
                }
            }
        }));

        debug!(rental = %rental, delay_ms = delay.as_millis() as u64, "completion scheduled");
        Scheduled::Started
    }

    /// Cancel the pending timer for `rental`
    ///
    /// # Returns
    ///
    /// `true` if a timer was pending and will now never fire.
    pub fn cancel(&self, rental: RentalId) -> bool {
        match self.timers.remove(&rental) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop the pending timer for `rental` and remember that it was held
    pub fn hold(&self, rental: RentalId) -> Hold {
        if self.cancel(rental) {
            self.held.insert(rental);
            Hold::Held
        } else if self.held.contains(&rental) {
            Hold::AlreadyHeld
        } else {
            Hold::NotPending
        }
    }

    /// Forget the hold on a rental that has been completed
    pub fn release_hold(&self, rental: RentalId) {
        self.held.remove(&rental);
    }

    pub fn is_pending(&self, rental: RentalId) -> bool {
        self.timers.contains_key(&rental)
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Wait until every timer task, including a callback still running,
    /// has finished
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}
