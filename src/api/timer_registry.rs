use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::{ChartError, ChartResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Ownership token for a periodic timer; pass it back to
/// [`TimerRegistry::cancel`] when the owner is torn down.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "a timer keeps firing until its handle is cancelled"]
pub struct TimerHandle {
    id: TimerId,
}

impl TimerHandle {
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }
}

#[derive(Debug, Clone)]
struct TimerEntry<T> {
    interval: TimeDelta,
    next_due: DateTime<Utc>,
    payload: T,
}

/// Periodic timers driven by the host event loop.
///
/// Nothing runs on its own: the host calls [`Self::poll_due`] from its loop and
/// dispatches the returned payloads. Cancelled timers never appear again.
#[derive(Debug, Clone)]
pub struct TimerRegistry<T> {
    timers: IndexMap<TimerId, TimerEntry<T>>,
    next_id: u64,
}

impl<T> Default for TimerRegistry<T> {
    fn default() -> Self {
        Self {
            timers: IndexMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> TimerRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` every `interval`, first due at `now + interval`.
    pub fn every(
        &mut self,
        interval: TimeDelta,
        payload: T,
        now: DateTime<Utc>,
    ) -> ChartResult<TimerHandle> {
        if interval <= TimeDelta::zero() {
            return Err(ChartError::InvalidData(
                "timer interval must be > 0".to_owned(),
            ));
        }
        let next_due = now.checked_add_signed(interval).ok_or_else(|| {
            ChartError::InvalidData("timer due time is out of range".to_owned())
        })?;

        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            TimerEntry {
                interval,
                next_due,
                payload,
            },
        );
        trace!(timer = id.raw(), interval_ms = interval.num_milliseconds(), "timer scheduled");
        Ok(TimerHandle { id })
    }

    /// Stops a timer. Returns `true` when it was still active.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.timers.shift_remove(&handle.id).is_some();
        trace!(timer = handle.id.raw(), removed, "timer cancelled");
        removed
    }

    /// Stops every timer.
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    #[must_use]
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Payloads of timers due at `now`, in scheduling order.
    ///
    /// A timer fires at most once per poll even if several intervals were
    /// missed; its next due time stays on the original cadence.
    pub fn poll_due(&mut self, now: DateTime<Utc>) -> Vec<T> {
        let mut due = Vec::new();
        for entry in self.timers.values_mut() {
            if entry.next_due > now {
                continue;
            }
            due.push(entry.payload.clone());

            let behind = now - entry.next_due;
            let missed = behind.num_milliseconds() / entry.interval.num_milliseconds().max(1);
            entry.next_due = i32::try_from(missed + 1)
                .ok()
                .and_then(|steps| entry.interval.checked_mul(steps))
                .and_then(|skip| entry.next_due.checked_add_signed(skip))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
        due
    }
}
