//! The three tasks that mutate session state: the diff-polling loop, the
//! fenced move-submission protocol (with its interactive staging front end),
//! and the autoplay agent loop.

use std::cell::Cell;

use log::debug;

use crate::api::{ApiError, GameApi};
use crate::session::Shared;

pub(crate) mod agent;
pub(crate) mod poller;
pub(crate) mod staging;
pub mod submit;

pub use submit::SubmitOutcome;

/// RAII ticket for the at-most-one-in-flight rule. A timer tick (or user
/// gesture) that cannot acquire it performs no network call.
pub(crate) struct InFlightGuard<'a> {
    gate: &'a Cell<bool>,
}

impl<'a> InFlightGuard<'a> {
    pub(crate) fn try_acquire(gate: &'a Cell<bool>) -> Option<InFlightGuard<'a>> {
        if gate.get() {
            return None;
        }
        gate.set(true);
        Some(InFlightGuard { gate })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gate.set(false);
    }
}

/// One Resyncing step: fetch a fresh snapshot and adopt version + snapshot as
/// a single pair. This is the only code path that ever mutates the snapshot.
///
/// Callers must hold the in-flight gate.
pub(crate) async fn resync_locked(
    api: &GameApi,
    shared: &Shared,
    generation: u64,
) -> Result<(), ApiError> {
    let game_id = shared.state.borrow().game_id.clone();
    let fresh = api.load_snapshot(&game_id).await?;
    if shared.generation.get() != generation {
        debug!("discarding resync result for game {game_id}; session was torn down");
        return Ok(());
    }
    let mut state = shared.state.borrow_mut();
    state.version = fresh.version;
    state.snapshot = fresh.state;
    Ok(())
}
