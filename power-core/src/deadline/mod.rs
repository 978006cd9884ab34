//! Shared, monotonically-extendable deadlines.
//!
//! The orchestrator reads these while waiting out the power window; external
//! handlers extend them concurrently. Neither field ever decreases: an
//! extension request earlier than the stored value is a no-op, never an
//! error. Both are discarded with the process; nothing persists.

use core::cell::RefCell;

use chrono::{DateTime, Utc};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

/// Which deadline an extension request targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeadlineKind {
    /// Keep the unit powered regardless of the window.
    StayOn,
    /// Hold off shutdown while maintenance work is in flight.
    MaintenancePause,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Deadlines {
    stay_on_until: DateTime<Utc>,
    maintenance_pause_until: DateTime<Utc>,
}

/// Deadline pair shared between the orchestrator and extension handlers.
///
/// The lock is held only for a single field copy or update, so neither side
/// can stall the other.
pub struct DeadlineState<M: RawMutex> {
    inner: Mutex<M, RefCell<Deadlines>>,
}

impl<M: RawMutex> DeadlineState<M> {
    /// Creates the state with both deadlines set to `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deadlines {
                stay_on_until: now,
                maintenance_pause_until: now,
            })),
        }
    }

    /// Ratchets the named deadline forward to `max(current, new_deadline)`.
    pub fn extend(&self, kind: DeadlineKind, new_deadline: DateTime<Utc>) {
        self.inner.lock(|cell| {
            let mut deadlines = cell.borrow_mut();
            let slot = match kind {
                DeadlineKind::StayOn => &mut deadlines.stay_on_until,
                DeadlineKind::MaintenancePause => &mut deadlines.maintenance_pause_until,
            };
            if new_deadline > *slot {
                *slot = new_deadline;
            }
        });
    }

    /// Copies out `(stay_on_until, maintenance_pause_until)`.
    #[must_use]
    pub fn snapshot(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.inner.lock(|cell| {
            let deadlines = cell.borrow();
            (deadlines.stay_on_until, deadlines.maintenance_pause_until)
        })
    }
}
