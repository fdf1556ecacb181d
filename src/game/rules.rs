//! Pure, stateless legality and confrontation rules.
//!
//! Everything here is side-effect free; the match state machine owns all
//! mutation and sequencing.

use super::entities::{Board, Digit, PIECES_PER_PLAYER};
use super::state_machine::GameError;

/// Where a legal advance ends up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdvanceTarget {
    /// The piece leaves the board for the shared contested area.
    ContestedArea,
    /// The piece moves one row forward on its own board.
    Cell { row: usize, col: usize },
}

/// Outcome of a pairwise confrontation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfrontationResult {
    /// Both pieces are lost.
    MutualLoss,
    Beats { winner: Digit, loser: Digit },
}

/// Digits 0-9 not yet present on the board.
///
/// Advisory only: deployment validation counts pieces and does not reject
/// duplicates, so this is a hint for clients, not an enforcement mechanism.
#[must_use]
pub fn available_digits(board: &Board) -> Vec<Digit> {
    (0..=9).filter(|d| !board.digits().any(|p| p == *d)).collect()
}

/// A deployment is valid iff exactly ten cells are filled.
#[must_use]
pub fn validate_deployment(board: &Board) -> bool {
    board.filled_count() == PIECES_PER_PLAYER
}

/// Check whether the piece at (`row`, `col`) may advance, and where to.
///
/// From the front row (row 0) the only forward move is into the contested
/// area; from any other row the piece advances one row iff the cell ahead
/// is empty. Indices are range-checked before any cell access.
pub fn can_advance(board: &Board, row: usize, col: usize) -> Result<AdvanceTarget, GameError> {
    if !Board::in_bounds(row, col) {
        return Err(GameError::IllegalMove(format!(
            "cell ({row}, {col}) is out of range"
        )));
    }
    if board.get(row, col).is_none() {
        return Err(GameError::IllegalMove(
            "no piece at the source cell".to_string(),
        ));
    }
    if row == 0 {
        return Ok(AdvanceTarget::ContestedArea);
    }
    let ahead = row - 1;
    if board.get(ahead, col).is_some() {
        return Err(GameError::IllegalMove(
            "the cell ahead is occupied".to_string(),
        ));
    }
    Ok(AdvanceTarget::Cell { row: ahead, col })
}

/// Resolve a confrontation between two exposed digits.
///
/// Order-independent in its two inputs. Equal digits destroy each other, as
/// do 0 against 6 or 9 (the rotated glyphs are indistinguishable). 8 beats 0
/// despite the general rule that the lower digit wins.
#[must_use]
pub fn resolve_confrontation(a: Digit, b: Digit) -> ConfrontationResult {
    if a == b {
        return ConfrontationResult::MutualLoss;
    }
    if (a == 0 && (b == 6 || b == 9)) || (b == 0 && (a == 6 || a == 9)) {
        return ConfrontationResult::MutualLoss;
    }
    if a == 8 && b == 0 {
        return ConfrontationResult::Beats {
            winner: a,
            loser: b,
        };
    }
    if b == 8 && a == 0 {
        return ConfrontationResult::Beats {
            winner: b,
            loser: a,
        };
    }
    if a < b {
        ConfrontationResult::Beats {
            winner: a,
            loser: b,
        }
    } else {
        ConfrontationResult::Beats {
            winner: b,
            loser: a,
        }
    }
}
