//! `signin-scheduler`: named one-shot timers polled by a periodic clock.
//!
//! # Overview
//!
//! [`DelayedEvents`] keeps at most one absolute deadline per [`NamedEvent`].
//! Setting an event again replaces its deadline, so repeated requests act as
//! a debounce rather than a queue. Nothing fires by itself: an owner polls
//! [`DelayedEvents::has_expired`] on every tick of a [`Ticker`] and runs
//! whatever handler it associates with the event.
//!
//! | Event                | Typical use                                  |
//! |----------------------|----------------------------------------------|
//! | `ResetLastScan`      | Forget the last accepted badge               |
//! | `UpdateTotalTime`    | Recompute the running attendance total       |
//! | `SignOutRemaining`   | End-of-day sweep of everyone still signed in |
//! | `ClearDisplayStatus` | Blank a status line after it has been read   |

pub mod clock;
pub mod engine;
pub mod schedule;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Ticker;
pub use schedule::{next_daily_deadline, DelayedEvents};
pub use types::NamedEvent;
