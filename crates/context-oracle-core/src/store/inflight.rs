//! In-flight computation registry keyed by symbol URI.
//!
//! The first caller for a missing key becomes the leader and runs the
//! computation; later callers for the same key block on the leader's slot and
//! receive a clone of its result, success or failure. The slot is removed once
//! the result is published, so failures are never cached here. A leader that
//! unwinds without publishing releases its waiters with an error.
//!
//! A leader with a timeout stamps its slot with a deadline. Waiters on that
//! slot wait until the deadline plus [`WAITER_GRACE`], so the leader's own
//! outcome reaches them before they give up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Slack past the leader's deadline before a waiter stops waiting.
pub const WAITER_GRACE: Duration = Duration::from_millis(100);

struct Slot<T> {
    result: Mutex<Option<Result<T, String>>>,
    ready: Condvar,
    leader_deadline: Option<Instant>,
}

impl<T: Clone> Slot<T> {
    fn new(leader_timeout: Option<Duration>) -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
            leader_deadline: leader_timeout.map(|t| Instant::now() + t),
        }
    }

    fn publish(&self, result: Result<T, String>) {
        let mut guard = self.result.lock();
        if guard.is_none() {
            *guard = Some(result);
        }
        self.ready.notify_all();
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<T, String> {
        let deadline = match self.leader_deadline {
            Some(leader) => Some(leader + WAITER_GRACE),
            None => timeout.map(|t| Instant::now() + t),
        };
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut guard, deadline).timed_out() {
                        return match guard.as_ref() {
                            Some(result) => result.clone(),
                            None => Err("timed out waiting for in-flight computation".into()),
                        };
                    }
                }
                None => self.ready.wait(&mut guard),
            }
        }
    }
}

/// Registry of computations currently in progress.
pub struct InFlight<T> {
    slots: Mutex<HashMap<String, Arc<Slot<T>>>>,
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

/// Publishes to waiters and frees the slot, even if the leader unwinds.
struct LeaderGuard<'a, T: Clone> {
    registry: &'a InFlight<T>,
    key: &'a str,
    slot: Arc<Slot<T>>,
}

impl<T: Clone> LeaderGuard<'_, T> {
    fn complete(self, result: Result<T, String>) -> Result<T, String> {
        self.slot.publish(result.clone());
        result
    }
}

impl<T: Clone> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        self.slot
            .publish(Err("in-flight computation was abandoned".into()));
        self.registry.slots.lock().remove(self.key);
    }
}

impl<T: Clone> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently being computed.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `cached()` if it hits, otherwise run `compute` at most once per
    /// key across concurrent callers.
    ///
    /// `cached` is consulted while holding the registry lock, which closes the
    /// window between a leader storing its result and leaving the registry.
    /// `compute` must make a successful result visible to `cached` before it
    /// returns. `timeout` is the bound the leader's computation runs under;
    /// waiters on a bounded leader wait past it by [`WAITER_GRACE`], and
    /// waiters on an unbounded leader give up after their own `timeout`.
    pub fn get_or_compute<C, F>(
        &self,
        key: &str,
        cached: C,
        compute: F,
        timeout: Option<Duration>,
    ) -> Result<T, String>
    where
        C: FnOnce() -> Option<T>,
        F: FnOnce() -> Result<T, String>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            if let Some(existing) = slots.get(key) {
                Err(Arc::clone(existing))
            } else {
                if let Some(hit) = cached() {
                    return Ok(hit);
                }
                let slot = Arc::new(Slot::new(timeout));
                slots.insert(key.to_string(), Arc::clone(&slot));
                Ok(slot)
            }
        };

        match slot {
            Ok(slot) => {
                let guard = LeaderGuard {
                    registry: self,
                    key,
                    slot,
                };
                let result = compute();
                guard.complete(result)
            }
            Err(waiting_on) => waiting_on.wait(timeout),
        }
    }
}
