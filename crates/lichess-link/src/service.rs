//! The remote game service as seen by sessions and the orchestrator.

use std::future::Future;

use futures::stream::BoxStream;
use serde::Deserialize;

use board_core::BoardMove;

use crate::error::LichessError;
use crate::events::{GameEvent, IncomingEvent};

/// A live NDJSON event stream. Each item is one parsed line.
pub type EventStream<T> = BoxStream<'static, Result<T, LichessError>>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OngoingGame {
    pub game_id: String,
    #[serde(default)]
    pub speed: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub username: String,
}

pub trait GameService: Send + Sync + 'static {
    /// Account-wide events: challenges, game starts and finishes.
    fn stream_incoming_events(
        &self,
    ) -> impl Future<Output = Result<EventStream<IncomingEvent>, LichessError>> + Send;

    /// Events for one game. The first event is the full game state.
    fn stream_game(
        &self,
        game_id: &str,
    ) -> impl Future<Output = Result<EventStream<GameEvent>, LichessError>> + Send;

    fn make_move(
        &self,
        game_id: &str,
        mv: &BoardMove,
    ) -> impl Future<Output = Result<(), LichessError>> + Send;

    fn ongoing_games(&self) -> impl Future<Output = Result<Vec<OngoingGame>, LichessError>> + Send;

    fn account(&self) -> impl Future<Output = Result<Account, LichessError>> + Send;
}
