//! Single-shot, resettable deadline backed by a Tokio task.
//!
//! Each `arm` cancels the previous deadline and bumps a generation
//! counter.  The expiry callback receives the generation it was armed
//! with, so a callback that raced a reset can tell it is stale via
//! `is_current`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    deadline: Option<Instant>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub(crate) struct AutoLockTimer {
    slot: Mutex<TimerSlot>,
}

impl AutoLockTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_expire` to run after `after`, replacing any pending
    /// deadline.  Must be called from within a Tokio runtime.
    pub(crate) fn arm<F>(&self, after: Duration, on_expire: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let mut slot = self.lock();
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }

        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let deadline = Instant::now() + after;
        slot.deadline = Some(deadline);
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expire(generation);
        }));
    }

    /// Cancel the pending deadline, if any.
    pub(crate) fn cancel(&self) {
        let mut slot = self.lock();
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.deadline = None;
    }

    /// `true` if `generation` is still the armed deadline.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let slot = self.lock();
        slot.deadline.is_some() && slot.generation == generation
    }

    /// Time left until the pending deadline.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.lock()
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn lock(&self) -> MutexGuard<'_, TimerSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AutoLockTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
