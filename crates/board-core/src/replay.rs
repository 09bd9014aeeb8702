//! Replay a remote move list and classify how the game ended, if it did.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::uci::UciMove;
use shakmaty::{Bitboard, CastlingMode, Chess, Color, EnPassantMode, Position, Square};

use crate::error::ReplayError;
use crate::square::BoardMove;

/// Why a game stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FivefoldRepetition,
    SeventyFiveMoves,
    /// Finished status reported by the server (resign, timeout, draw, ...).
    Remote(String),
    /// The server stream closed or sent an unexpected event.
    StreamEnded,
    /// Local failure forced the game to stop, e.g. moves could not be submitted.
    Aborted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Checkmate => f.write_str("checkmate"),
            Termination::Stalemate => f.write_str("stalemate"),
            Termination::InsufficientMaterial => f.write_str("insufficient material"),
            Termination::FivefoldRepetition => f.write_str("fivefold repetition"),
            Termination::SeventyFiveMoves => f.write_str("75-move rule"),
            Termination::Remote(status) => write!(f, "{status}"),
            Termination::StreamEnded => f.write_str("stream ended"),
            Termination::Aborted => f.write_str("aborted"),
        }
    }
}

/// Final result of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnd {
    #[serde(with = "color_name")]
    pub winner: Option<Color>,
    pub reason: Termination,
}

impl GameEnd {
    pub fn decisive(winner: Color, reason: Termination) -> Self {
        Self {
            winner: Some(winner),
            reason,
        }
    }

    pub fn drawn(reason: Termination) -> Self {
        Self {
            winner: None,
            reason,
        }
    }
}

impl fmt::Display for GameEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.winner {
            Some(Color::White) => write!(f, "white wins by {}", self.reason),
            Some(Color::Black) => write!(f, "black wins by {}", self.reason),
            None => write!(f, "no winner ({})", self.reason),
        }
    }
}

mod color_name {
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Color;

    pub fn serialize<S: Serializer>(color: &Option<Color>, s: S) -> Result<S::Ok, S::Error> {
        match color {
            Some(Color::White) => s.serialize_some("white"),
            Some(Color::Black) => s.serialize_some("black"),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Color>, D::Error> {
        let name: Option<String> = Option::deserialize(d)?;
        Ok(match name.as_deref() {
            Some("white") => Some(Color::White),
            Some("black") => Some(Color::Black),
            _ => None,
        })
    }
}

/// Terminal outcome by the rules alone. `repetitions` is how often the
/// current position has occurred, itself included.
pub fn classify(pos: &Chess, repetitions: u32) -> Option<GameEnd> {
    if pos.is_checkmate() {
        Some(GameEnd::decisive(pos.turn().other(), Termination::Checkmate))
    } else if pos.is_stalemate() {
        Some(GameEnd::drawn(Termination::Stalemate))
    } else if pos.is_insufficient_material() {
        Some(GameEnd::drawn(Termination::InsufficientMaterial))
    } else if repetitions >= 5 {
        Some(GameEnd::drawn(Termination::FivefoldRepetition))
    } else if pos.halfmoves() >= 150 {
        Some(GameEnd::drawn(Termination::SeventyFiveMoves))
    } else {
        None
    }
}

/// A move list played out from a starting position.
#[derive(Debug, Clone)]
pub struct Replay {
    pub position: Chess,
    /// Position before the last move, if any move was played.
    pub previous: Option<Chess>,
    pub last_move: Option<BoardMove>,
    pub outcome: Option<GameEnd>,
    pub plies: usize,
}

type RepetitionKey = (String, Color, Bitboard, Option<Square>);

fn repetition_key(pos: &Chess) -> RepetitionKey {
    (
        pos.board().to_string(),
        pos.turn(),
        pos.castles().castling_rights(),
        pos.ep_square(EnPassantMode::Legal),
    )
}

/// Play a space-separated coordinate-notation move list from `start`.
pub fn replay(start: &Chess, moves: &str, mode: CastlingMode) -> Result<Replay, ReplayError> {
    let mut pos = start.clone();
    let mut previous = None;
    let mut last_move = None;
    let mut seen: HashMap<RepetitionKey, u32> = HashMap::new();
    let mut repetitions = 1;
    seen.insert(repetition_key(&pos), 1);

    let mut plies = 0;
    for (ply, token) in moves.split_whitespace().enumerate() {
        let uci: UciMove = token.parse().map_err(|_| ReplayError::Unparseable {
            ply,
            uci: token.to_string(),
        })?;
        let mv = uci.to_move(&pos).map_err(|_| ReplayError::Illegal {
            ply,
            uci: token.to_string(),
        })?;
        let coords = BoardMove::from_move(&mv, mode).map_err(|_| ReplayError::Unparseable {
            ply,
            uci: token.to_string(),
        })?;

        previous = Some(pos.clone());
        pos.play_unchecked(mv);
        last_move = Some(coords);
        plies += 1;

        let count = seen.entry(repetition_key(&pos)).or_insert(0);
        *count += 1;
        repetitions = *count;
    }

    let outcome = classify(&pos, repetitions);
    Ok(Replay {
        position: pos,
        previous,
        last_move,
        outcome,
        plies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_tracks_last_move() {
        let r = replay(&Chess::default(), "e2e4 e7e5 g1f3", CastlingMode::Standard).unwrap();
        assert_eq!(r.plies, 3);
        assert_eq!(r.last_move.unwrap().to_string(), "g1f3");
        assert_eq!(r.position.turn(), Color::Black);
        assert_eq!(
            r.previous.unwrap().board().to_string(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR"
        );
        assert!(r.outcome.is_none());
    }

    #[test]
    fn test_empty_move_list() {
        let r = replay(&Chess::default(), "", CastlingMode::Standard).unwrap();
        assert_eq!(r.plies, 0);
        assert!(r.previous.is_none());
        assert!(r.last_move.is_none());
    }

    #[test]
    fn test_fools_mate_is_black_win() {
        let r = replay(&Chess::default(), "f2f3 e7e5 g2g4 d8h4", CastlingMode::Standard).unwrap();
        assert_eq!(
            r.outcome,
            Some(GameEnd::decisive(Color::Black, Termination::Checkmate))
        );
    }

    #[test]
    fn test_fivefold_repetition() {
        let shuffle = "g1f3 g8f6 f3g1 f6g8 ";
        let r = replay(&Chess::default(), &shuffle.repeat(4), CastlingMode::Standard).unwrap();
        assert_eq!(
            r.outcome,
            Some(GameEnd::drawn(Termination::FivefoldRepetition))
        );

        let r = replay(&Chess::default(), &shuffle.repeat(3), CastlingMode::Standard).unwrap();
        assert!(r.outcome.is_none());
    }

    #[test]
    fn test_illegal_move_in_list() {
        let err = replay(&Chess::default(), "e2e4 e2e4", CastlingMode::Standard).unwrap_err();
        assert_eq!(
            err,
            ReplayError::Illegal {
                ply: 1,
                uci: "e2e4".to_string()
            }
        );
        assert!(matches!(
            replay(&Chess::default(), "zz", CastlingMode::Standard),
            Err(ReplayError::Unparseable { ply: 0, .. })
        ));
    }

    #[test]
    fn test_game_end_display() {
        let end = GameEnd::decisive(Color::White, Termination::Remote("resign".into()));
        assert_eq!(end.to_string(), "white wins by resign");
    }
}
