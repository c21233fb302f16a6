//! Interactive move staging: the transient pick/drop gesture that turns a
//! board interaction into a move submission. A staged origin is single-use
//! and is consumed by the drop whether or not the submission succeeds.

use std::cell::Cell;

use crate::api::{ApiError, GameApi};
use crate::models::game_state::Square;
use crate::session::Shared;

/// The origin recorded by a pick, pending its drop.
pub(crate) struct StagedOrigin {
    origin: Cell<Option<Square>>,
}

impl StagedOrigin {
    pub(crate) fn new() -> StagedOrigin {
        StagedOrigin {
            origin: Cell::new(None),
        }
    }

    pub(crate) fn take(&self) -> Option<Square> {
        self.origin.take()
    }
}

/// Pick phase: query legal destinations for the piece at `at`, adopt the
/// returned version as the new fence, and stage the origin. The destination
/// set is advisory highlight data, not enforced client-side.
pub(crate) async fn pick(
    api: &GameApi,
    shared: &Shared,
    staged: &StagedOrigin,
    at: Square,
) -> Result<Vec<Square>, ApiError> {
    let generation = shared.generation.get();
    let game_id = shared.state.borrow().game_id.clone();
    let legal = api.query_legal(&game_id, at).await?;
    if shared.generation.get() == generation {
        // tighten the fence to the version the destination set was computed
        // under; the snapshot itself is only refreshed by resync
        shared.state.borrow_mut().version = legal.version;
        staged.origin.set(Some(at));
    }
    Ok(legal.destinations)
}
