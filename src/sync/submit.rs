//! Move submission protocol: the system's only mutating write path. Every
//! state-changing intent, interactive or autonomous, funnels through here.

use log::{debug, info, warn};

use crate::api::{ApiError, GameApi, MoveOutcome};
use crate::models::game_state::MoveCandidate;
use crate::session::Shared;
use crate::sync::resync_locked;

/// How a fenced submission ended, after conflict handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server applied the move under the returned version.
    Applied { version: u64 },
    /// The fence was stale; the candidate was discarded and the local view
    /// resynced. The actor must derive a new candidate from the fresh state.
    Conflict,
    /// The server refused the candidate; the local view is assumed still
    /// valid and no state was mutated.
    Rejected { status: u16 },
}

/// Submit `candidate` fenced on the currently-held version. Callers must hold
/// the in-flight gate.
pub(crate) async fn submit_locked(
    api: &GameApi,
    shared: &Shared,
    generation: u64,
    candidate: MoveCandidate,
) -> Result<SubmitOutcome, ApiError> {
    let (game_id, fence) = {
        let state = shared.state.borrow();
        (state.game_id.clone(), state.version)
    };
    match api.submit_move(&game_id, fence, &candidate).await? {
        MoveOutcome::Applied { version, diff: _ } => {
            // The move response carries a diff, not a full state body, so the
            // snapshot comes from an immediate follow-up read; version and
            // snapshot then land together in one mutation.
            let fresh = api.load_snapshot(&game_id).await;
            if shared.generation.get() != generation {
                debug!("discarding post-move refresh for game {game_id}; session was torn down");
                return Ok(SubmitOutcome::Applied { version });
            }
            let mut state = shared.state.borrow_mut();
            match fresh {
                Ok(snapshot) => {
                    state.version = snapshot.version;
                    state.snapshot = snapshot.state;
                }
                Err(err) => {
                    warn!("post-move snapshot fetch failed: {err}; sync loop will converge");
                }
            }
            state.last_move = Some(candidate);
            debug!("move {candidate} applied at version {version}");
            Ok(SubmitOutcome::Applied { version })
        }
        MoveOutcome::VersionConflict => {
            info!("move {candidate} conflicted at version {fence}; resyncing");
            if let Err(err) = resync_locked(api, shared, generation).await {
                debug!("post-conflict resync failed: {err}; retrying next tick");
            }
            Ok(SubmitOutcome::Conflict)
        }
        MoveOutcome::Rejected { status } => {
            info!("move {candidate} rejected with status {status}");
            Ok(SubmitOutcome::Rejected { status })
        }
    }
}
