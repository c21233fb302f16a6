//! Autoplay agent: on each tick it resyncs, enumerates server-certified legal
//! moves for the side to move, and submits one at random. It never judges
//! legality itself, and it stops on a terminal result or an empty move list.

use std::rc::Rc;
use std::time::Duration;

use actix_rt::task::JoinHandle;
use actix_rt::time;
use log::{debug, info, trace};
use rand::Rng;

use crate::api::GameApi;
use crate::models::game_state::{MoveCandidate, Square};
use crate::session::Shared;
use crate::sync::{resync_locked, submit, InFlightGuard, SubmitOutcome};

pub(crate) fn spawn(api: Rc<GameApi>, shared: Rc<Shared>, period: Duration) -> JoinHandle<()> {
    let generation = shared.generation.get();
    actix_rt::spawn(async move {
        loop {
            time::sleep(period).await;
            if shared.generation.get() != generation || !shared.agent_enabled.get() {
                break;
            }
            let Some(_guard) = InFlightGuard::try_acquire(&shared.busy) else {
                trace!("agent tick skipped; an operation is already in flight");
                continue;
            };
            if !tick(&api, &shared, generation).await {
                shared.agent_enabled.set(false);
                info!("autoplay stopped");
                break;
            }
        }
    })
}

fn cancelled(shared: &Shared, generation: u64) -> bool {
    shared.generation.get() != generation || !shared.agent_enabled.get()
}

/// One agent step. Returns `false` when the agent should disable itself.
async fn tick(api: &GameApi, shared: &Shared, generation: u64) -> bool {
    // act on the freshest state the server will give us
    if let Err(err) = resync_locked(api, shared, generation).await {
        debug!("agent resync failed: {err}; retrying next tick");
        return true;
    }
    if cancelled(shared, generation) {
        return false;
    }

    let (game_id, to_move, origins) = {
        let state = shared.state.borrow();
        if let Some(result) = &state.snapshot.result {
            info!("game over ({result}); autoplay has nothing left to do");
            return false;
        }
        let to_move = state.snapshot.to_move;
        let origins: Vec<Square> = state
            .snapshot
            .pieces_of(to_move)
            .map(|piece| piece.square)
            .collect();
        (state.game_id.clone(), to_move, origins)
    };

    let mut candidates: Vec<MoveCandidate> = Vec::new();
    for from in origins {
        if cancelled(shared, generation) {
            return false;
        }
        match api.query_legal(&game_id, from).await {
            Ok(legal) => candidates.extend(
                legal
                    .destinations
                    .into_iter()
                    .map(|to| MoveCandidate { from, to }),
            ),
            // a single bad origin does not end the turn; skip the piece
            Err(err) => debug!("legal query for {from} failed: {err}; skipping piece"),
        }
    }
    if candidates.is_empty() {
        info!("no legal moves for {to_move}; stopping autoplay");
        return false;
    }

    let choice = {
        let mut rng = rand::rng();
        candidates[rng.random_range(0..candidates.len())]
    };
    if cancelled(shared, generation) {
        return false;
    }
    match submit::submit_locked(api, shared, generation, choice).await {
        Ok(SubmitOutcome::Applied { version }) => {
            debug!("autoplay applied {choice} at version {version}");
        }
        // conflict already resynced inside the submission protocol
        Ok(SubmitOutcome::Conflict) => info!("autoplay candidate went stale; trying again next tick"),
        Ok(SubmitOutcome::Rejected { status }) => {
            info!("autoplay candidate rejected with status {status}");
        }
        Err(err) => debug!("autoplay submit failed: {err}; retrying next tick"),
    }
    true
}
