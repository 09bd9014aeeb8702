//! Lichess side of the bridge: Board API client, per-game sessions and the
//! account-level orchestrator.

pub mod clients;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod orchestrator;
pub mod service;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use clients::LichessClient;
pub use clock::{ChessClock, NoClock};
pub use config::{CliArgs, LinkConfig};
pub use error::{ConfigError, LichessError, Rejection, SessionError};
pub use events::{GameEvent, GameState, IncomingEvent};
pub use game::{Dispatch, GameSession, SessionConfig};
pub use orchestrator::{OrchestratorConfig, SessionOrchestrator};
pub use service::{EventStream, GameService};
