use awc::error::{JsonPayloadError, SendRequestError};
use awc::http::header::{HeaderMap, ETAG};
use awc::http::StatusCode;
use awc::Client;
use log::{debug, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::models::game_state::{Color, GameSnapshot, MoveCandidate, Square};
use crate::models::messages::{
    ControlAck, ControlAction, ControlRequest, CreateGameRequest, DiffResponse, GameEnvelope,
    JoinRequest, JoinResponse, LegalResponse, MoveApplied, MoveRequest, StateDiff,
};

/// Typed access to the remote game server, one method per endpoint.
///
/// Every call is a single round-trip; retry and backoff policy belongs to the
/// caller. Expected protocol statuses (409 on submit/diff) come back as typed
/// outcomes, not errors.
pub struct GameApi {
    client: Client,
    base_url: String,
}

/// Failures the facade surfaces to its callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect failure, timeout, ...).
    #[error("request failed: {0}")]
    Transport(String),
    /// The response body could not be decoded.
    #[error("bad response body: {0}")]
    Decode(String),
    /// The server answered with a status the operation does not expect.
    #[error("unexpected status {0}")]
    Status(u16),
}

impl From<SendRequestError> for ApiError {
    fn from(err: SendRequestError) -> ApiError {
        ApiError::Transport(err.to_string())
    }
}

impl From<JsonPayloadError> for ApiError {
    fn from(err: JsonPayloadError) -> ApiError {
        ApiError::Decode(err.to_string())
    }
}

/// A full game snapshot paired with the version it was computed under.
#[derive(Debug, Clone)]
pub struct VersionedSnapshot {
    pub game_id: String,
    pub version: u64,
    pub state: GameSnapshot,
}

/// Server-certified destinations for the piece at one origin square.
#[derive(Debug, Clone)]
pub struct LegalMoves {
    pub version: u64,
    pub from: Square,
    pub destinations: Vec<Square>,
}

/// What a diff probe learned about the known version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Nothing happened since the known version.
    Unchanged,
    /// The server moved on; a full resync is required.
    Changed { to_version: u64 },
    /// The server can no longer diff from the known version.
    SnapshotRequired,
}

/// Server verdict on a fenced move submission.
#[derive(Debug, Clone)]
pub enum MoveOutcome {
    Applied { version: u64, diff: StateDiff },
    VersionConflict,
    Rejected { status: u16 },
}

impl GameApi {
    pub fn new(base_url: impl Into<String>) -> GameApi {
        let base_url = base_url.into();
        GameApi {
            client: Client::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/games{}", self.base_url, path)
    }

    pub async fn create_game(
        &self,
        request: &CreateGameRequest,
    ) -> Result<VersionedSnapshot, ApiError> {
        let mut res = self.client.post(self.url("")).send_json(request).await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }
        let body: GameEnvelope = res.json().await?;
        let version = version_from(body.version, res.headers());
        Ok(VersionedSnapshot {
            game_id: body.game_id,
            version,
            state: body.state,
        })
    }

    pub async fn load_snapshot(&self, game_id: &str) -> Result<VersionedSnapshot, ApiError> {
        let mut res = self
            .client
            .get(self.url(&format!("/{game_id}")))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }
        let body: GameEnvelope = res.json().await?;
        let version = version_from(body.version, res.headers());
        Ok(VersionedSnapshot {
            game_id: body.game_id,
            version,
            state: body.state,
        })
    }

    /// Claim a seat, or join as a spectator with `seat: None`.
    pub async fn join(&self, game_id: &str, seat: Option<Color>) -> Result<Option<Color>, ApiError> {
        let request = JoinRequest {
            seat: seat.map(|seat| seat.seat_name().to_string()),
        };
        let mut res = self
            .client
            .post(self.url(&format!("/{game_id}/join")))
            .send_json(&request)
            .await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }
        let body: JoinResponse = res.json().await?;
        Ok(body.seat)
    }

    pub async fn query_legal(&self, game_id: &str, at: Square) -> Result<LegalMoves, ApiError> {
        let mut res = self
            .client
            .get(self.url(&format!("/{game_id}/legal?row={}&col={}", at.row, at.col)))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }
        let body: LegalResponse = res.json().await?;
        let version = version_from(body.version, res.headers());
        Ok(LegalMoves {
            version,
            from: body.from,
            destinations: body.destinations,
        })
    }

    /// Submit a move fenced on `fence`. A 409 means the fence is stale; any
    /// other non-200 status is a rejection of this candidate.
    pub async fn submit_move(
        &self,
        game_id: &str,
        fence: u64,
        candidate: &MoveCandidate,
    ) -> Result<MoveOutcome, ApiError> {
        let request = MoveRequest::from_candidate(candidate);
        let mut res = self
            .client
            .post(self.url(&format!("/{game_id}/moves")))
            .insert_header(("If-Match", fence.to_string()))
            .insert_header(("Idempotency-Key", Uuid::new_v4().to_string()))
            .send_json(&request)
            .await?;
        match res.status() {
            StatusCode::OK => {
                let body: MoveApplied = res.json().await?;
                let version = version_from(body.version, res.headers());
                Ok(MoveOutcome::Applied {
                    version,
                    diff: body.diff,
                })
            }
            StatusCode::CONFLICT => Ok(MoveOutcome::VersionConflict),
            status => Ok(MoveOutcome::Rejected {
                status: status.as_u16(),
            }),
        }
    }

    pub async fn query_diff(&self, game_id: &str, since: u64) -> Result<DiffOutcome, ApiError> {
        let mut res = self
            .client
            .get(self.url(&format!("/{game_id}/diffs?since={since}")))
            .send()
            .await?;
        match res.status() {
            StatusCode::OK => {
                let body: DiffResponse = res.json().await?;
                if body.to_version == since {
                    Ok(DiffOutcome::Unchanged)
                } else {
                    Ok(DiffOutcome::Changed {
                        to_version: body.to_version,
                    })
                }
            }
            StatusCode::NO_CONTENT => Ok(DiffOutcome::Unchanged),
            StatusCode::CONFLICT => Ok(DiffOutcome::SnapshotRequired),
            status => Err(ApiError::Status(status.as_u16())),
        }
    }

    pub async fn submit_control(
        &self,
        game_id: &str,
        action: ControlAction,
    ) -> Result<ControlAck, ApiError> {
        let mut res = self
            .client
            .post(self.url(&format!("/{game_id}/controls")))
            .send_json(&ControlRequest { action })
            .await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }
        let ack: ControlAck = res.json().await?;
        Ok(ack)
    }
}

/// Authoritative version of a response: the body field when present, then the
/// `ETag` fencing header, then `0`. Not every endpoint echoes the version in
/// its body.
fn version_from(body_version: Option<u64>, headers: &HeaderMap) -> u64 {
    if let Some(version) = body_version {
        return version;
    }
    let from_header = headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().trim_matches('"').parse::<u64>().ok());
    match from_header {
        Some(version) => {
            debug!("version {version} taken from ETag header");
            version
        }
        None => {
            warn!("response carried no version in body or ETag header; defaulting to 0");
            0
        }
    }
}
