//! Error types for the Lichess client, game sessions and configuration

use std::path::PathBuf;

use thiserror::Error;

use board_core::{BoardMove, ReplayError};
use board_link::SyncError;

#[derive(Error, Debug)]
pub enum LichessError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid JSON from server: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token is not a valid header value")]
    InvalidToken,

    #[error("rate limited by server")]
    RateLimited,

    #[error("not your turn, or game already over: {0}")]
    NotYourTurn(String),

    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// How a failed request should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Retrying cannot help: the turn or the game is over.
    Terminal,
    /// Worth retrying after a pause.
    Transient,
    Unknown,
}

impl LichessError {
    pub fn rejection(&self) -> Rejection {
        match self {
            LichessError::NotYourTurn(_) => Rejection::Terminal,
            LichessError::RateLimited => Rejection::Transient,
            LichessError::Request(e) if e.is_timeout() || e.is_connect() => Rejection::Transient,
            LichessError::Rejected { status, .. } if *status >= 500 => Rejection::Transient,
            _ => Rejection::Unknown,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// The game stream closed or sent something other than game updates.
    #[error("game stream ended")]
    StreamEnded,

    #[error("move {mv} rejected: {reason}")]
    SubmissionRejected { mv: BoardMove, reason: String },

    /// A move could not be submitted after retrying.
    #[error("move {mv} failed twice: {source}")]
    SubmissionFailed {
        mv: BoardMove,
        #[source]
        source: LichessError,
    },

    #[error("move task failed: {0}")]
    Worker(String),

    #[error("bad starting position: {0}")]
    BadPosition(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Lichess(#[from] LichessError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no Lichess token: set LICHESS_TOKEN or create {}", .0.display())]
    MissingToken(PathBuf),

    #[error("cannot read token file {}: {source}", .path.display())]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} expects a value")]
    MissingArgument(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classes() {
        assert_eq!(
            LichessError::NotYourTurn("{}".into()).rejection(),
            Rejection::Terminal
        );
        assert_eq!(LichessError::RateLimited.rejection(), Rejection::Transient);
        assert_eq!(
            LichessError::Rejected {
                status: 503,
                body: String::new()
            }
            .rejection(),
            Rejection::Transient
        );
        assert_eq!(
            LichessError::Rejected {
                status: 400,
                body: "{\"error\":\"bad move\"}".into()
            }
            .rejection(),
            Rejection::Unknown
        );
    }
}
