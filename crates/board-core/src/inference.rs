//! Recover the legal move played on the physical board from a placement diff.

use shakmaty::{Board, Chess, Move, Position, Square};

use crate::codec::Placement;
use crate::error::InferenceError;
use crate::square::Coord;

/// Find the single legal move from `state` whose resulting placement is `reported`.
///
/// Brute force over the legal moves; the first exact match wins. Different
/// promotion pieces give different placements, so there is never a tie.
pub fn infer_move(state: &Chess, reported: &Board) -> Result<Move, InferenceError> {
    if state.board() == reported {
        return Err(InferenceError::NoMove);
    }

    for mv in state.legal_moves() {
        let mut scratch = state.clone();
        scratch.play_unchecked(mv.clone());
        if scratch.board() == reported {
            return Ok(mv);
        }
    }

    Err(InferenceError::IllegalMove {
        expected: Placement::of(state.board()),
        reported: Placement::of(reported),
    })
}

/// Squares whose occupant differs between two boards, a1 first.
pub fn board_diff(a: &Board, b: &Board) -> Vec<Coord> {
    Square::ALL
        .into_iter()
        .filter(|sq| a.piece_at(*sq) != b.piece_at(*sq))
        .map(Coord::from_square)
        .collect()
}
