use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant identity, assigned by the external identity collaborator.
pub type PlayerId = i64;

/// Room identifier, assigned by the external room collaborator.
pub type RoomId = String;

/// A piece's face value. Valid values are 0 through 9.
pub type Digit = u8;

pub const BOARD_ROWS: usize = 3;
pub const BOARD_COLS: usize = 6;

/// Number of pieces each player must deploy.
pub const PIECES_PER_PLAYER: usize = 10;

pub const MIN_PLAYERS: usize = 3;
pub const MAX_PLAYERS: usize = 5;

/// A player's private 3x6 grid. Row 0 is the front row; pieces advance
/// toward row 0 and from there into the contested area.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Board {
    cells: [[Option<Digit>; BOARD_COLS]; BOARD_ROWS],
}

impl Board {
    #[must_use]
    pub const fn from_cells(cells: [[Option<Digit>; BOARD_COLS]; BOARD_ROWS]) -> Self {
        Self { cells }
    }

    #[must_use]
    pub const fn in_bounds(row: usize, col: usize) -> bool {
        row < BOARD_ROWS && col < BOARD_COLS
    }

    /// Digit at a cell, or `None` for an empty or out-of-range cell.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Digit> {
        if Self::in_bounds(row, col) {
            self.cells[row][col]
        } else {
            None
        }
    }

    /// Remove and return the digit at a cell.
    pub fn take(&mut self, row: usize, col: usize) -> Option<Digit> {
        if Self::in_bounds(row, col) {
            self.cells[row][col].take()
        } else {
            None
        }
    }

    pub fn place(&mut self, row: usize, col: usize, digit: Digit) {
        if Self::in_bounds(row, col) {
            self.cells[row][col] = Some(digit);
        }
    }

    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| cell.is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filled_count() == 0
    }

    /// First unoccupied cell in row-major order. Used when a leftover
    /// contested piece is returned to its owner at round end.
    #[must_use]
    pub fn first_empty_cell(&self) -> Option<(usize, usize)> {
        for row in 0..BOARD_ROWS {
            for col in 0..BOARD_COLS {
                if self.cells[row][col].is_none() {
                    return Some((row, col));
                }
            }
        }
        None
    }

    /// Occupancy mask revealed to opponents in place of digit values.
    #[must_use]
    pub fn occupancy(&self) -> [[bool; BOARD_COLS]; BOARD_ROWS] {
        let mut mask = [[false; BOARD_COLS]; BOARD_ROWS];
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                mask[row][col] = cell.is_some();
            }
        }
        mask
    }

    pub fn digits(&self) -> impl Iterator<Item = Digit> + '_ {
        self.cells.iter().flatten().filter_map(|cell| *cell)
    }
}

/// One participant in a match. Players are never removed mid-match; an
/// eliminated player remains as a record for end-state reporting.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub board: Board,
    pub eliminated: bool,
    /// Digits lost to confrontations, in the order they were lost.
    pub lost_digits: Vec<Digit>,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            board: Board::default(),
            eliminated: false,
            lost_digits: Vec::new(),
        }
    }
}

/// A piece exposed to the shared contested area. `seq` is a per-round
/// monotonically increasing counter establishing FIFO pairing order.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ContestedPiece {
    pub owner: PlayerId,
    pub digit: Digit,
    pub seq: u32,
}

/// Match lifecycle phase.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Deployment,
    Action,
    Settlement,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Deployment => "deployment",
            Self::Action => "action",
            Self::Settlement => "settlement",
            Self::Ended => "ended",
        };
        write!(f, "{repr}")
    }
}

/// A player action. `Challenge`, `Recover`, and `Skip` double as bonus
/// responses while a settlement is paused on a lone contested piece.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Advance a piece one row forward, or from the front row into the
    /// contested area.
    Advance { row: usize, col: usize },
    /// Forcibly expose a target player's piece, forcing settlement.
    Challenge {
        target: PlayerId,
        row: usize,
        col: usize,
    },
    /// Return one of the caller's own contested pieces to an empty cell.
    Recover { piece: usize, row: usize, col: usize },
    /// Do nothing and pass the turn.
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advance { row, col } => write!(f, "advance from ({row}, {col})"),
            Self::Challenge { target, row, col } => {
                write!(f, "challenge player {target} at ({row}, {col})")
            }
            Self::Recover { piece, row, col } => {
                write!(f, "recover piece {piece} to ({row}, {col})")
            }
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Per-player slice of a broadcast snapshot. `board` is present only in the
/// owner's own view; everyone else gets the occupancy mask.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub eliminated: bool,
    pub lost_digits: Vec<Digit>,
    pub occupancy: [[bool; BOARD_COLS]; BOARD_ROWS],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
}

/// Snapshot of a match, redacted for one viewer.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchView {
    pub room_id: RoomId,
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<PlayerView>,
    pub turn_order: Vec<PlayerId>,
    pub current_turn: Option<PlayerId>,
    pub bonus_holder: Option<PlayerId>,
    pub contested: Vec<ContestedPiece>,
    pub winner: Option<PlayerId>,
}
