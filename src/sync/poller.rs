//! Synchronization loop: a cheap "what changed since version V" probe on a
//! fixed period, falling back to a full resync whenever the probe reports a
//! newer version or the diff horizon is gone.

use std::rc::Rc;
use std::time::Duration;

use actix_rt::task::JoinHandle;
use actix_rt::time;
use log::{debug, trace};

use crate::api::{DiffOutcome, GameApi};
use crate::session::Shared;
use crate::sync::{resync_locked, InFlightGuard};

pub(crate) fn spawn(api: Rc<GameApi>, shared: Rc<Shared>, period: Duration) -> JoinHandle<()> {
    let generation = shared.generation.get();
    actix_rt::spawn(async move {
        loop {
            time::sleep(period).await;
            if shared.generation.get() != generation {
                break;
            }
            let Some(_guard) = InFlightGuard::try_acquire(&shared.busy) else {
                trace!("sync tick skipped; an operation is already in flight");
                continue;
            };
            tick(&api, &shared, generation).await;
        }
    })
}

async fn tick(api: &GameApi, shared: &Shared, generation: u64) {
    let (game_id, since) = {
        let state = shared.state.borrow();
        (state.game_id.clone(), state.version)
    };
    match api.query_diff(&game_id, since).await {
        Ok(DiffOutcome::Unchanged) => {}
        Ok(DiffOutcome::Changed { to_version }) => {
            debug!("remote is at version {to_version}, local at {since}; resyncing");
            if let Err(err) = resync_locked(api, shared, generation).await {
                debug!("resync failed: {err}; retrying next tick");
            }
        }
        Ok(DiffOutcome::SnapshotRequired) => {
            debug!("diff horizon exceeded at version {since}; resyncing");
            if let Err(err) = resync_locked(api, shared, generation).await {
                debug!("resync failed: {err}; retrying next tick");
            }
        }
        // transient failure: no state change, the next tick retries naturally
        Err(err) => debug!("diff probe failed: {err}; retrying next tick"),
    }
}
