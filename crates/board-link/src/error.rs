//! Hardware and synchronization error types

use thiserror::Error;

use board_core::CodecError;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("board I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("board is not connected")]
    NotConnected,

    #[error("malformed board report: {0}")]
    Codec(#[from] CodecError),
}

#[derive(Error, Debug)]
pub enum SyncError {
    /// The board could not be reached or returned no position at startup.
    #[error("board connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Process-wide shutdown was requested while waiting on the board.
    #[error("shutdown requested")]
    KillRequested,
}

impl From<CodecError> for SyncError {
    fn from(e: CodecError) -> Self {
        SyncError::Driver(DriverError::Codec(e))
    }
}
