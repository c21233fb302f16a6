use std::env;
use std::error::Error;
use std::time::Duration;

use actix_rt::time;
use log::info;

use jetan_web_client::api::GameApi;
use jetan_web_client::models::game_state::{Color, GameSnapshot, Square, BOARD_SIZE};
use jetan_web_client::models::messages::CreateGameRequest;
use jetan_web_client::session::GameSession;

/// Random self-play client demonstrating how to drive the API from an
/// external system: create a game, join, and let the autoplay agent pick
/// random legal moves until the game ends or no moves remain.
#[actix_rt::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let base_url =
        env::var("JETAN_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
    let variant = env::var("JETAN_VARIANT").unwrap_or_else(|_| "standard".to_string());
    info!("starting self-play client against {base_url}");

    let api = GameApi::new(base_url);
    let request = CreateGameRequest {
        variant,
        ..CreateGameRequest::standard()
    };
    let session = GameSession::create(api, &request).await?;

    session.join(Color::Orange).await?;
    session.start_sync();
    session.set_autoplay(true);

    // watch the game until the agent stops itself
    let mut last_version = session.version();
    while session.autoplay_enabled() {
        time::sleep(Duration::from_millis(500)).await;
        let version = session.version();
        if version != last_version {
            last_version = version;
            let snapshot = session.snapshot();
            info!(
                "version {version}: {} to move, {} pieces on the board",
                snapshot.to_move,
                snapshot.pieces.len()
            );
            print_board(&snapshot);
        }
    }

    let snapshot = session.snapshot();
    match &snapshot.result {
        Some(result) => info!("game finished: {result}"),
        None => info!("autoplay stopped with the game still in progress"),
    }
    session.shutdown();
    Ok(())
}

/// Text rendering of the board, one rank per log line.
fn print_board(snapshot: &GameSnapshot) {
    for row in 0..BOARD_SIZE {
        let mut line = String::with_capacity(BOARD_SIZE as usize * 4);
        for col in 0..BOARD_SIZE {
            match snapshot.piece_at(Square::new(row, col)) {
                Some(piece) => {
                    line.push(match piece.color {
                        Color::Orange => 'o',
                        Color::Black => 'b',
                    });
                    line.push_str(piece.kind.abbrev());
                }
                None => line.push_str(" . "),
            }
            line.push(' ');
        }
        info!("{line}");
    }
}
