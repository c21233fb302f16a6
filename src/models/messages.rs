use serde::{Deserialize, Serialize};

use super::game_state::{Color, GameSnapshot, MoveCandidate, Piece, Square};

/// Payload for the create-game endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateGameRequest {
    pub variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<SeatOccupants>,
}

impl CreateGameRequest {
    /// A standard-variant game with server-default time and seats.
    pub fn standard() -> CreateGameRequest {
        CreateGameRequest {
            variant: "standard".to_string(),
            time: None,
            seats: None,
        }
    }
}

impl Default for CreateGameRequest {
    fn default() -> CreateGameRequest {
        CreateGameRequest::standard()
    }
}

/// Clock settings requested at game creation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct TimeControl {
    pub initial_sec: u64,
    pub increment_sec: u64,
}

/// Who is expected to occupy each seat ("human", "bot", ...).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SeatOccupants {
    pub orange: String,
    pub black: String,
}

/// Body shape shared by the create and snapshot endpoints.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameEnvelope {
    pub game_id: String,
    pub version: Option<u64>,
    pub state: GameSnapshot,
}

/// Payload for the join endpoint; `seat: None` joins as a spectator.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JoinRequest {
    pub seat: Option<String>,
}

/// Seat assignment echoed back by the join endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JoinResponse {
    pub seat: Option<Color>,
}

/// Body shape of the legal-destinations endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LegalResponse {
    pub from: Square,
    pub destinations: Vec<Square>,
    pub version: Option<u64>,
}

/// Payload for the move endpoint. The fencing version travels in the
/// `If-Match` header, not the body.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveRequest {
    pub action: String,
    pub from: Square,
    pub to: Square,
}

impl MoveRequest {
    pub fn from_candidate(candidate: &MoveCandidate) -> MoveRequest {
        MoveRequest {
            action: "move".to_string(),
            from: candidate.from,
            to: candidate.to,
        }
    }
}

/// Body of a successful move submission.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveApplied {
    pub applied: bool,
    pub version: Option<u64>,
    #[serde(default)]
    pub diff: StateDiff,
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    pub clocks: Option<Clocks>,
}

/// Structural diff between two consecutive versions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StateDiff {
    pub added: Vec<Piece>,
    pub removed: Vec<String>,
    pub moved: Vec<MovedPiece>,
    pub flags: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MovedPiece {
    pub id: String,
    pub to: Square,
}

/// Seconds remaining per seat, as the server accounts them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Clocks {
    pub orange: u64,
    pub black: u64,
}

/// Body of the diff-query endpoint. `toVersion == since` means nothing
/// changed.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DiffResponse {
    pub from_version: u64,
    pub to_version: u64,
    #[serde(default)]
    pub diffs: Vec<StateDiff>,
}

/// Out-of-band game controls.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
}

/// Payload for the controls endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ControlRequest {
    pub action: ControlAction,
}

/// Acknowledgement of an applied control action.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ControlAck {
    pub result: Option<String>,
    pub winner: Option<Color>,
}
