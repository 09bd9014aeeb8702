//! Error types for the board codec, move inference and move-list replay

use thiserror::Error;

use crate::codec::Placement;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid square: {0:?}")]
    InvalidSquare(String),

    #[error("{0:?} is not a valid file")]
    InvalidFile(char),

    #[error("{0:?} is not a valid rank")]
    InvalidRank(char),

    #[error("snapshot must be 32 bytes or a headed report, got {0} bytes")]
    SnapshotLength(usize),

    #[error("unknown piece code {0:#x} in snapshot")]
    UnknownPiece(u8),

    #[error("invalid placement {0:?}")]
    InvalidPlacement(String),
}

/// Outcome of failing to explain a board change with one legal move.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// The reported placement equals the authoritative one.
    #[error("no change on the board")]
    NoMove,

    /// No legal move from the authoritative position reproduces the report.
    #[error("board shows {reported}, which no legal move from {expected} produces")]
    IllegalMove {
        expected: Placement,
        reported: Placement,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("unparseable move {uci:?} at ply {ply}")]
    Unparseable { ply: usize, uci: String },

    #[error("illegal move {uci:?} at ply {ply}")]
    Illegal { ply: usize, uci: String },
}
