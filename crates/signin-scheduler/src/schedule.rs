use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::clock::Clock;
use crate::types::NamedEvent;

/// Per-event deadline table.
///
/// Each [`NamedEvent`] is either unset, pending with one absolute deadline,
/// or fired (reported once, now unset again). Not thread-safe on its own:
/// the owner keeps it behind the same lock as the state its handlers touch.
pub struct DelayedEvents {
    clock: Arc<dyn Clock>,
    deadlines: HashMap<NamedEvent, NaiveDateTime>,
}

impl DelayedEvents {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            deadlines: HashMap::new(),
        }
    }

    /// Arm `event` to expire `delay` from now, replacing any pending deadline.
    pub fn set(&mut self, event: NamedEvent, delay: Duration) {
        let deadline = self.clock.now() + delay;
        self.set_at(event, deadline);
    }

    /// Arm `event` at an absolute instant, replacing any pending deadline.
    pub fn set_at(&mut self, event: NamedEvent, deadline: NaiveDateTime) {
        if let Some(previous) = self.deadlines.insert(event, deadline) {
            debug!(%event, %previous, %deadline, "deadline replaced");
        } else {
            debug!(%event, %deadline, "deadline set");
        }
    }

    /// Report whether `event`'s deadline has passed at `now`.
    ///
    /// Returns true at most once per deadline: a reported deadline is
    /// cleared, so later polls return false until the next `set`.
    pub fn has_expired(&mut self, event: NamedEvent, now: NaiveDateTime) -> bool {
        match self.deadlines.get(&event) {
            Some(deadline) if now >= *deadline => {
                self.deadlines.remove(&event);
                true
            }
            _ => false,
        }
    }

    /// Pending deadline for `event`, if any.
    pub fn deadline(&self, event: NamedEvent) -> Option<NaiveDateTime> {
        self.deadlines.get(&event).copied()
    }
}

/// The next local midnight strictly after `from`, plus `offset`.
///
/// Used for the end-of-day sweep: an offset of one hour means 01:00 the
/// following morning.
pub fn next_daily_deadline(from: NaiveDateTime, offset: Duration) -> NaiveDateTime {
    let midnight = match from.date().succ_opt() {
        Some(tomorrow) => tomorrow.and_time(NaiveTime::MIN),
        // Calendar exhausted; fall back to a day from now.
        None => from + Duration::days(1),
    };
    midnight + offset
}
