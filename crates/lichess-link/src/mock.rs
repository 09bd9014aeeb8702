//! Scripted game service for tests. Events are pushed through feeds the test
//! keeps, so it decides exactly when the session sees each one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use board_core::BoardMove;

use crate::error::LichessError;
use crate::events::{GameEvent, IncomingEvent};
use crate::service::{Account, EventStream, GameService, OngoingGame};

/// Sender half of a scripted stream. Dropping it ends the stream.
pub struct Feed<T> {
    tx: mpsc::UnboundedSender<Result<T, LichessError>>,
}

impl<T: serde::de::DeserializeOwned> Feed<T> {
    /// Push one NDJSON line as the server would send it.
    pub fn push_json(&self, line: &str) {
        let event = serde_json::from_str(line).map_err(LichessError::from);
        let _ = self.tx.send(event);
    }

    pub fn push(&self, event: T) {
        let _ = self.tx.send(Ok(event));
    }

    pub fn fail(&self, err: LichessError) {
        let _ = self.tx.send(Err(err));
    }
}

fn channel<T: Send + 'static>() -> (Feed<T>, EventStream<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    (Feed { tx }, stream)
}

#[derive(Default)]
struct MockState {
    incoming: VecDeque<EventStream<IncomingEvent>>,
    incoming_subscriptions: usize,
    games: HashMap<String, EventStream<GameEvent>>,
    move_results: VecDeque<Result<(), LichessError>>,
    moves: Vec<(String, String)>,
    ongoing: Vec<OngoingGame>,
    username: String,
}

#[derive(Default)]
pub struct MockService {
    state: Mutex<MockState>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Script the next subscription to the account event stream.
    pub fn incoming_feed(&self) -> Feed<IncomingEvent> {
        let (feed, stream) = channel();
        self.lock().incoming.push_back(stream);
        feed
    }

    /// Script the stream for one game.
    pub fn game_feed(&self, game_id: &str) -> Feed<GameEvent> {
        let (feed, stream) = channel();
        self.lock().games.insert(game_id.to_string(), stream);
        feed
    }

    /// Result for the next move submission. Unscripted submissions succeed.
    pub fn push_move_result(&self, result: Result<(), LichessError>) {
        self.lock().move_results.push_back(result);
    }

    pub fn set_ongoing(&self, games: Vec<OngoingGame>) {
        self.lock().ongoing = games;
    }

    pub fn set_username(&self, name: &str) {
        self.lock().username = name.to_string();
    }

    /// Every submission attempt as (game id, move).
    pub fn moves(&self) -> Vec<(String, String)> {
        self.lock().moves.clone()
    }

    pub fn incoming_subscriptions(&self) -> usize {
        self.lock().incoming_subscriptions
    }
}

impl GameService for MockService {
    async fn stream_incoming_events(&self) -> Result<EventStream<IncomingEvent>, LichessError> {
        let mut state = self.lock();
        state.incoming_subscriptions += 1;
        // Once the script runs out, stay quiet instead of ending.
        Ok(state
            .incoming
            .pop_front()
            .unwrap_or_else(|| stream::pending().boxed()))
    }

    async fn stream_game(&self, game_id: &str) -> Result<EventStream<GameEvent>, LichessError> {
        self.lock()
            .games
            .remove(game_id)
            .ok_or_else(|| LichessError::Rejected {
                status: 404,
                body: format!("no such game {game_id}"),
            })
    }

    async fn make_move(&self, game_id: &str, mv: &BoardMove) -> Result<(), LichessError> {
        let mut state = self.lock();
        state.moves.push((game_id.to_string(), mv.to_string()));
        state.move_results.pop_front().unwrap_or(Ok(()))
    }

    async fn ongoing_games(&self) -> Result<Vec<OngoingGame>, LichessError> {
        Ok(self.lock().ongoing.clone())
    }

    async fn account(&self) -> Result<Account, LichessError> {
        Ok(Account {
            username: self.lock().username.clone(),
        })
    }
}
