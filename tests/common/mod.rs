#![allow(dead_code)]

//! In-process double of the remote game server, good enough to exercise the
//! full client protocol: versioned snapshots, `If-Match` fencing with 409 on
//! stale writes, diff probes with a trimmable horizon, and a stub rules
//! engine (one orthogonal step, captures allowed) standing in for the real
//! legality computation the client never performs itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::web::{self, Data, Json, Path, Query};
use actix_web::{App, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use jetan_web_client::models::game_state::{
    Color, GameFlags, GameSnapshot, Piece, PieceKind, Square,
};
use jetan_web_client::models::messages::{
    Clocks, ControlAck, ControlAction, ControlRequest, CreateGameRequest, DiffResponse,
    GameEnvelope, JoinRequest, JoinResponse, LegalResponse, MoveApplied, MoveRequest, MovedPiece,
    StateDiff,
};

/// Knobs the tests use to shape server behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureOptions {
    /// Artificial latency applied to every request while it counts as
    /// in flight.
    pub lag: Option<Duration>,
    /// Omit the `version` field from response bodies, leaving only the
    /// `ETag` header as a version source.
    pub omit_body_version: bool,
    /// Report an empty destination set for every piece.
    pub no_legal_moves: bool,
    /// Declare a draw once the game reaches this version.
    pub draw_at_version: Option<u64>,
}

pub struct GameRecord {
    pub version: u64,
    pub state: GameSnapshot,
    pub seats: HashMap<&'static str, bool>,
    pub diffs: Vec<StateDiff>,
    /// Oldest version diffs can still be served from; probes below it get 409.
    pub diff_floor: u64,
}

pub struct FixtureState {
    pub options: FixtureOptions,
    games: Mutex<HashMap<String, GameRecord>>,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FixtureState {
    fn new(options: FixtureOptions) -> FixtureState {
        FixtureState {
            options,
            games: Mutex::new(HashMap::new()),
            requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Count the request and apply the configured latency while it is
    /// considered in flight.
    async fn observe(&self) -> RequestTicket<'_> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(lag) = self.options.lag {
            actix_rt::time::sleep(lag).await;
        }
        RequestTicket { state: self }
    }

    fn body_version(&self, version: u64) -> Option<u64> {
        if self.options.omit_body_version {
            None
        } else {
            Some(version)
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn server_version(&self, game_id: &str) -> u64 {
        self.games.lock().unwrap()[game_id].version
    }

    /// Pretend the server lost diff history up to its current version.
    pub fn trim_history(&self, game_id: &str) {
        let mut games = self.games.lock().unwrap();
        let record = games.get_mut(game_id).unwrap();
        record.diff_floor = record.version;
    }

    /// Record a terminal result without touching the version, the way the
    /// real server's control path does.
    pub fn force_result(&self, game_id: &str, result: &str) {
        let mut games = self.games.lock().unwrap();
        games.get_mut(game_id).unwrap().state.result = Some(result.to_string());
    }
}

struct RequestTicket<'a> {
    state: &'a FixtureState,
}

impl Drop for RequestTicket<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The standard 40-piece Jetan setup: back rank plus a Thoat/Panthan rank per
/// side, black on rows 0-1, orange on rows 8-9.
fn initial_pieces() -> Vec<Piece> {
    use PieceKind::*;
    let back_rank = [
        Warrior, Padwar, Dwar, Flier, Princess, Chief, Flier, Dwar, Padwar, Warrior,
    ];
    let mut pieces = Vec::with_capacity(40);
    for (color, back_row, front_row) in [(Color::Black, 0u8, 1u8), (Color::Orange, 9u8, 8u8)] {
        let mut index = 0;
        let mut push = |pieces: &mut Vec<Piece>, kind: PieceKind, square: Square| {
            index += 1;
            pieces.push(Piece {
                id: format!("{}-{index}", color.seat_name()),
                kind,
                color,
                square,
            });
        };
        for (col, kind) in back_rank.into_iter().enumerate() {
            push(&mut pieces, kind, Square::new(back_row, col as u8));
        }
        for col in 0..10u8 {
            let kind = if col == 0 || col == 9 { Thoat } else { Panthan };
            push(&mut pieces, kind, Square::new(front_row, col));
        }
    }
    pieces
}

fn new_record() -> GameRecord {
    GameRecord {
        version: 0,
        state: GameSnapshot {
            pieces: initial_pieces(),
            to_move: Color::Orange,
            result: None,
            flags: GameFlags::default(),
        },
        seats: HashMap::from([("orange", false), ("black", false)]),
        diffs: Vec::new(),
        diff_floor: 0,
    }
}

/// Stub legality: one orthogonal step onto any square not held by a friendly
/// piece.
fn stub_destinations(state: &GameSnapshot, origin: Square) -> Vec<Square> {
    let Some(piece) = state.piece_at(origin) else {
        return Vec::new();
    };
    let mut destinations = Vec::new();
    for (dr, dc) in [(-1i16, 0i16), (1, 0), (0, -1), (0, 1)] {
        let row = origin.row as i16 + dr;
        let col = origin.col as i16 + dc;
        if row < 0 || col < 0 {
            continue;
        }
        let to = Square::new(row as u8, col as u8);
        if !to.in_bounds() {
            continue;
        }
        match state.piece_at(to) {
            Some(other) if other.color == piece.color => continue,
            _ => destinations.push(to),
        }
    }
    destinations
}

fn envelope(state: &FixtureState, game_id: &str, record: &GameRecord) -> HttpResponse {
    let body = GameEnvelope {
        game_id: game_id.to_string(),
        version: state.body_version(record.version),
        state: record.state.clone(),
    };
    HttpResponse::Ok()
        .insert_header(("ETag", record.version.to_string()))
        .json(body)
}

async fn create_game(state: Data<FixtureState>, _body: Json<CreateGameRequest>) -> HttpResponse {
    let _ticket = state.observe().await;
    let game_id = format!("g_{}", &Uuid::new_v4().simple().to_string()[..8]);
    let record = new_record();
    let body = GameEnvelope {
        game_id: game_id.clone(),
        version: state.body_version(record.version),
        state: record.state.clone(),
    };
    let response = HttpResponse::Created()
        .insert_header(("ETag", record.version.to_string()))
        .json(body);
    state.games.lock().unwrap().insert(game_id, record);
    response
}

async fn get_snapshot(state: Data<FixtureState>, path: Path<String>) -> HttpResponse {
    let _ticket = state.observe().await;
    let games = state.games.lock().unwrap();
    match games.get(path.as_str()) {
        Some(record) => envelope(&state, path.as_str(), record),
        None => HttpResponse::NotFound().finish(),
    }
}

async fn join_game(
    state: Data<FixtureState>,
    path: Path<String>,
    body: Json<JoinRequest>,
) -> HttpResponse {
    let _ticket = state.observe().await;
    let mut games = state.games.lock().unwrap();
    let Some(record) = games.get_mut(path.as_str()) else {
        return HttpResponse::NotFound().finish();
    };
    let Some(seat) = body.seat.as_deref() else {
        return HttpResponse::Ok().json(JoinResponse { seat: None });
    };
    let Some(taken) = record.seats.get_mut(seat) else {
        return HttpResponse::BadRequest().body("Invalid seat");
    };
    if *taken {
        return HttpResponse::Forbidden().body("seat taken");
    }
    *taken = true;
    let assigned = if seat == "orange" {
        Color::Orange
    } else {
        Color::Black
    };
    HttpResponse::Ok().json(JoinResponse {
        seat: Some(assigned),
    })
}

#[derive(Deserialize)]
struct LegalQuery {
    row: u8,
    col: u8,
}

async fn legal_moves(
    state: Data<FixtureState>,
    path: Path<String>,
    query: Query<LegalQuery>,
) -> HttpResponse {
    let _ticket = state.observe().await;
    let games = state.games.lock().unwrap();
    let Some(record) = games.get(path.as_str()) else {
        return HttpResponse::NotFound().finish();
    };
    let origin = Square::new(query.row, query.col);
    let destinations = if state.options.no_legal_moves {
        Vec::new()
    } else {
        stub_destinations(&record.state, origin)
    };
    HttpResponse::Ok()
        .insert_header(("ETag", record.version.to_string()))
        .json(LegalResponse {
            from: origin,
            destinations,
            version: state.body_version(record.version),
        })
}

async fn apply_move(
    req: HttpRequest,
    state: Data<FixtureState>,
    path: Path<String>,
    body: Json<MoveRequest>,
) -> HttpResponse {
    let _ticket = state.observe().await;
    let Some(raw_fence) = req.headers().get("If-Match") else {
        return HttpResponse::build(StatusCode::PRECONDITION_REQUIRED)
            .body("Missing If-Match header");
    };
    let Ok(fence) = raw_fence.to_str().unwrap_or_default().parse::<u64>() else {
        return HttpResponse::BadRequest().body("Bad If-Match");
    };
    let mut games = state.games.lock().unwrap();
    let Some(record) = games.get_mut(path.as_str()) else {
        return HttpResponse::NotFound().finish();
    };
    if record.version != fence {
        return HttpResponse::Conflict().body("version conflict");
    }
    if body.action != "move" {
        return HttpResponse::BadRequest().body("Unsupported action");
    }
    if !body.from.in_bounds() || !body.to.in_bounds() {
        return HttpResponse::BadRequest().body("invalid square");
    }
    if record.state.piece_at(body.from).is_none() {
        return HttpResponse::BadRequest().body("no piece at source");
    }

    let mut diff = StateDiff::default();
    let captured_id = record.state.piece_at(body.to).map(|piece| piece.id.clone());
    if let Some(captured_id) = captured_id {
        record.state.pieces.retain(|piece| piece.id != captured_id);
        diff.removed.push(captured_id);
    }
    let moved = record
        .state
        .pieces
        .iter_mut()
        .find(|piece| piece.square == body.from)
        .expect("moving piece vanished");
    moved.square = body.to;
    diff.moved.push(MovedPiece {
        id: moved.id.clone(),
        to: body.to,
    });

    record.state.to_move = record.state.to_move.opponent();
    record.version += 1;
    if let Some(at) = state.options.draw_at_version {
        if record.version >= at {
            record.state.result = Some("draw".to_string());
        }
    }
    record.diffs.push(diff.clone());

    HttpResponse::Ok()
        .insert_header(("ETag", record.version.to_string()))
        .json(MoveApplied {
            applied: true,
            version: state.body_version(record.version),
            diff,
            events: Vec::new(),
            clocks: Some(Clocks {
                orange: 600,
                black: 600,
            }),
        })
}

#[derive(Deserialize)]
struct DiffQuery {
    since: u64,
}

async fn get_diffs(
    state: Data<FixtureState>,
    path: Path<String>,
    query: Query<DiffQuery>,
) -> HttpResponse {
    let _ticket = state.observe().await;
    let games = state.games.lock().unwrap();
    let Some(record) = games.get(path.as_str()) else {
        return HttpResponse::NotFound().finish();
    };
    if query.since > record.version || query.since < record.diff_floor {
        return HttpResponse::Conflict().body("bad since version");
    }
    HttpResponse::Ok().json(DiffResponse {
        from_version: query.since,
        to_version: record.version,
        diffs: record.diffs[query.since as usize..].to_vec(),
    })
}

async fn apply_control(
    state: Data<FixtureState>,
    path: Path<String>,
    body: Json<ControlRequest>,
) -> HttpResponse {
    let _ticket = state.observe().await;
    let mut games = state.games.lock().unwrap();
    let Some(record) = games.get_mut(path.as_str()) else {
        return HttpResponse::NotFound().finish();
    };
    if record.state.is_finished() {
        return HttpResponse::Gone().body("game already finished");
    }
    match body.action {
        ControlAction::Resign => {
            let loser = record.state.to_move;
            let result = format!("resign_{}", loser.seat_name());
            record.state.result = Some(result.clone());
            HttpResponse::Ok().json(ControlAck {
                result: Some(result),
                winner: Some(loser.opponent()),
            })
        }
        _ => HttpResponse::BadRequest().body("unsupported control action"),
    }
}

/// Start the fixture server; the returned state handle lets tests inspect and
/// manipulate it out of band.
pub fn spawn_fixture(options: FixtureOptions) -> (actix_test::TestServer, Data<FixtureState>) {
    let state = Data::new(FixtureState::new(options));
    let app_state = state.clone();
    let server = actix_test::start(move || {
        App::new()
            .app_data(app_state.clone())
            .service(web::resource("/api/v1/games").route(web::post().to(create_game)))
            .service(web::resource("/api/v1/games/{id}").route(web::get().to(get_snapshot)))
            .service(web::resource("/api/v1/games/{id}/join").route(web::post().to(join_game)))
            .service(web::resource("/api/v1/games/{id}/legal").route(web::get().to(legal_moves)))
            .service(web::resource("/api/v1/games/{id}/moves").route(web::post().to(apply_move)))
            .service(web::resource("/api/v1/games/{id}/diffs").route(web::get().to(get_diffs)))
            .service(web::resource("/api/v1/games/{id}/controls").route(web::post().to(apply_control)))
    });
    (server, state)
}
