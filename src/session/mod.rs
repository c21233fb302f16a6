use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use actix_rt::task::JoinHandle;
use log::{debug, info};
use thiserror::Error;

use crate::api::{ApiError, GameApi, VersionedSnapshot};
use crate::models::game_state::{Color, GameSnapshot, MoveCandidate, Square};
use crate::models::messages::{ControlAck, ControlAction, CreateGameRequest};
use crate::sync::staging::StagedOrigin;
use crate::sync::{agent, poller, staging, submit, InFlightGuard, SubmitOutcome};

/// Default period of the diff-polling synchronization loop.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(1000);

/// Default period of the autoplay agent loop.
pub const DEFAULT_AGENT_INTERVAL: Duration = Duration::from_millis(600);

/// Timer periods for the two recurring loops.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub sync_interval: Duration,
    pub agent_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            agent_interval: DEFAULT_AGENT_INTERVAL,
        }
    }
}

/// The single authoritative local copy of a remote game.
///
/// `version` is always the version `snapshot` was computed under; the pair is
/// written in one mutation with no suspension point in between.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub game_id: String,
    pub version: u64,
    pub seat: Option<Color>,
    pub snapshot: GameSnapshot,
    pub last_move: Option<MoveCandidate>,
}

/// State shared between the session handle and its spawned loops.
pub(crate) struct Shared {
    pub(crate) state: RefCell<SessionState>,
    /// At-most-one-in-flight gate for sync/submit operations.
    pub(crate) busy: Cell<bool>,
    /// Bumped on teardown; post-await mutations re-check it before applying.
    pub(crate) generation: Cell<u64>,
    pub(crate) agent_enabled: Cell<bool>,
}

/// Errors surfaced by session-level operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another sync or submit operation is already in flight.
    #[error("another sync or submit operation is in flight")]
    Busy,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Owned context for one loaded game: session state plus the loops that
/// mutate it. Dropping the session cancels both loops; switching games means
/// dropping this and constructing a new one.
pub struct GameSession {
    api: Rc<GameApi>,
    shared: Rc<Shared>,
    config: SessionConfig,
    staged: StagedOrigin,
    sync_task: RefCell<Option<JoinHandle<()>>>,
    agent_task: RefCell<Option<JoinHandle<()>>>,
}

impl GameSession {
    /// Create a fresh game on the server and build a session around it.
    pub async fn create(api: GameApi, request: &CreateGameRequest) -> Result<GameSession, ApiError> {
        GameSession::create_with(api, request, SessionConfig::default()).await
    }

    pub async fn create_with(
        api: GameApi,
        request: &CreateGameRequest,
        config: SessionConfig,
    ) -> Result<GameSession, ApiError> {
        let snapshot = api.create_game(request).await?;
        info!(
            "created game {} at version {}",
            snapshot.game_id, snapshot.version
        );
        Ok(GameSession::from_snapshot(api, snapshot, config))
    }

    /// Load an existing game by id and build a session around it.
    pub async fn load(api: GameApi, game_id: &str) -> Result<GameSession, ApiError> {
        GameSession::load_with(api, game_id, SessionConfig::default()).await
    }

    pub async fn load_with(
        api: GameApi,
        game_id: &str,
        config: SessionConfig,
    ) -> Result<GameSession, ApiError> {
        let snapshot = api.load_snapshot(game_id).await?;
        info!(
            "loaded game {} at version {}",
            snapshot.game_id, snapshot.version
        );
        Ok(GameSession::from_snapshot(api, snapshot, config))
    }

    fn from_snapshot(
        api: GameApi,
        snapshot: VersionedSnapshot,
        config: SessionConfig,
    ) -> GameSession {
        GameSession {
            api: Rc::new(api),
            shared: Rc::new(Shared {
                state: RefCell::new(SessionState {
                    game_id: snapshot.game_id,
                    version: snapshot.version,
                    seat: None,
                    snapshot: snapshot.state,
                    last_move: None,
                }),
                busy: Cell::new(false),
                generation: Cell::new(0),
                agent_enabled: Cell::new(false),
            }),
            config,
            staged: StagedOrigin::new(),
            sync_task: RefCell::new(None),
            agent_task: RefCell::new(None),
        }
    }

    // ---- readers (never block, never suspend) ----

    pub fn game_id(&self) -> String {
        self.shared.state.borrow().game_id.clone()
    }

    pub fn version(&self) -> u64 {
        self.shared.state.borrow().version
    }

    pub fn seat(&self) -> Option<Color> {
        self.shared.state.borrow().seat
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.shared.state.borrow().snapshot.clone()
    }

    pub fn last_move(&self) -> Option<MoveCandidate> {
        self.shared.state.borrow().last_move
    }

    /// Read the whole session state without cloning the snapshot.
    pub fn with_state<R>(&self, read: impl FnOnce(&SessionState) -> R) -> R {
        read(&self.shared.state.borrow())
    }

    pub fn autoplay_enabled(&self) -> bool {
        self.shared.agent_enabled.get()
    }

    // ---- loops ----

    /// Start the periodic diff-polling loop. Idempotent.
    pub fn start_sync(&self) {
        let mut slot = self.sync_task.borrow_mut();
        if slot.is_some() {
            return;
        }
        *slot = Some(poller::spawn(
            Rc::clone(&self.api),
            Rc::clone(&self.shared),
            self.config.sync_interval,
        ));
    }

    /// Toggle the autoplay agent. Disabling aborts its task deterministically;
    /// no further ticks fire.
    pub fn set_autoplay(&self, enabled: bool) {
        if enabled == self.shared.agent_enabled.get() {
            return;
        }
        if enabled {
            self.shared.agent_enabled.set(true);
            info!("autoplay started (random legal moves)");
            *self.agent_task.borrow_mut() = Some(agent::spawn(
                Rc::clone(&self.api),
                Rc::clone(&self.shared),
                self.config.agent_interval,
            ));
        } else {
            self.shared.agent_enabled.set(false);
            if let Some(task) = self.agent_task.borrow_mut().take() {
                task.abort();
            }
            info!("autoplay stopped");
        }
    }

    // ---- operations ----

    /// Claim a seat, then refresh the local view.
    pub async fn join(&self, seat: Color) -> Result<Option<Color>, SessionError> {
        let _guard = InFlightGuard::try_acquire(&self.shared.busy).ok_or(SessionError::Busy)?;
        let generation = self.shared.generation.get();
        let game_id = self.game_id();
        let assigned = self.api.join(&game_id, Some(seat)).await?;
        if self.shared.generation.get() != generation {
            return Ok(assigned);
        }
        let effective = assigned.or(Some(seat));
        self.shared.state.borrow_mut().seat = effective;
        info!(
            "joined game {game_id} as {}",
            effective.map(|s| s.seat_name()).unwrap_or("spectator")
        );
        if let Err(err) = crate::sync::resync_locked(&self.api, &self.shared, generation).await {
            debug!("post-join refresh failed: {err}; sync loop will catch up");
        }
        Ok(assigned)
    }

    /// One explicit Resyncing step: replace version and snapshot from a fresh
    /// server read.
    pub async fn resync(&self) -> Result<(), SessionError> {
        let _guard = InFlightGuard::try_acquire(&self.shared.busy).ok_or(SessionError::Busy)?;
        let generation = self.shared.generation.get();
        crate::sync::resync_locked(&self.api, &self.shared, generation).await?;
        Ok(())
    }

    /// Submit a move under the currently-held fencing version.
    pub async fn submit(&self, candidate: MoveCandidate) -> Result<SubmitOutcome, SessionError> {
        let _guard = InFlightGuard::try_acquire(&self.shared.busy).ok_or(SessionError::Busy)?;
        let generation = self.shared.generation.get();
        let outcome = submit::submit_locked(&self.api, &self.shared, generation, candidate).await?;
        Ok(outcome)
    }

    /// Pick phase of a move gesture: fetch legal destinations for the piece at
    /// `at`, adopt the returned fence, and stage the origin.
    pub async fn pick(&self, at: Square) -> Result<Vec<Square>, SessionError> {
        let destinations = staging::pick(&self.api, &self.shared, &self.staged, at).await?;
        Ok(destinations)
    }

    /// Drop phase of a move gesture. Returns `None` when no pick preceded the
    /// drop; the staged origin is consumed either way.
    pub async fn drop_at(&self, to: Square) -> Result<Option<SubmitOutcome>, SessionError> {
        let Some(from) = self.staged.take() else {
            debug!("drop at {to} ignored; no piece was picked");
            return Ok(None);
        };
        let outcome = self.submit(MoveCandidate { from, to }).await?;
        Ok(Some(outcome))
    }

    /// Apply an out-of-band control action (resign, draw offers), then refresh.
    pub async fn control(&self, action: ControlAction) -> Result<ControlAck, SessionError> {
        let _guard = InFlightGuard::try_acquire(&self.shared.busy).ok_or(SessionError::Busy)?;
        let generation = self.shared.generation.get();
        let game_id = self.game_id();
        let ack = self.api.submit_control(&game_id, action).await?;
        if let Err(err) = crate::sync::resync_locked(&self.api, &self.shared, generation).await {
            debug!("post-control refresh failed: {err}; sync loop will catch up");
        }
        Ok(ack)
    }

    /// Cancel both loops and invalidate any in-flight operation's right to
    /// mutate session state.
    pub fn shutdown(&self) {
        self.teardown();
        info!("session for game {} torn down", self.game_id());
    }

    fn teardown(&self) {
        self.shared.generation.set(self.shared.generation.get() + 1);
        self.shared.agent_enabled.set(false);
        if let Some(task) = self.sync_task.borrow_mut().take() {
            task.abort();
        }
        if let Some(task) = self.agent_task.borrow_mut().take() {
            task.abort();
        }
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
