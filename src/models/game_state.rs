use std::fmt;

use serde::{Deserialize, Serialize};

/// Jetan is played on a 10x10 board.
pub const BOARD_SIZE: u8 = 10;

/// Side affiliation; doubles as the seat identifier when joining.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    #[serde(alias = "orange")]
    Orange,
    #[serde(alias = "black")]
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::Orange => Color::Black,
            Color::Black => Color::Orange,
        }
    }

    /// Lowercase name used by the join endpoint and result tags.
    pub fn seat_name(self) -> &'static str {
        match self {
            Color::Orange => "orange",
            Color::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.seat_name())
    }
}

/// The eight Jetan piece kinds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    Warrior,
    Padwar,
    Dwar,
    Flier,
    Princess,
    Chief,
    Thoat,
    Panthan,
}

impl PieceKind {
    /// Two-letter abbreviation used when rendering a text board.
    pub fn abbrev(self) -> &'static str {
        match self {
            PieceKind::Warrior => "Wa",
            PieceKind::Padwar => "Pa",
            PieceKind::Dwar => "Dw",
            PieceKind::Flier => "Fl",
            PieceKind::Princess => "Pr",
            PieceKind::Chief => "Ch",
            PieceKind::Thoat => "Th",
            PieceKind::Panthan => "Pn",
        }
    }
}

/// A board coordinate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub fn new(row: u8, col: u8) -> Square {
        Square { row, col }
    }

    pub fn in_bounds(self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// One piece on the board, as the server reports it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Piece {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub color: Color,
    pub square: Square,
}

/// Auxiliary rule flags carried opaquely alongside the piece list.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GameFlags {
    pub princess_escaped_orange: bool,
    pub princess_escaped_black: bool,
}

/// Full game state as served by the snapshot endpoint. Replaced wholesale on
/// every resync, never patched in place.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub pieces: Vec<Piece>,
    pub to_move: Color,
    pub result: Option<String>,
    #[serde(default)]
    pub flags: GameFlags,
}

impl GameSnapshot {
    /// Whether the server has recorded a terminal result.
    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn piece_at(&self, square: Square) -> Option<&Piece> {
        self.pieces.iter().find(|piece| piece.square == square)
    }

    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = &Piece> {
        self.pieces.iter().filter(move |piece| piece.color == color)
    }
}

/// A move the local actor wants to submit. Legality is never interpreted
/// client-side; both squares simply name board coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCandidate {
    pub from: Square,
    pub to: Square,
}

impl fmt::Display for MoveCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
