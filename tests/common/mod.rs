//! Shared fixtures for the scenario tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use board_link::mock::{BoardHandle, ScriptedBoard};
use board_link::{BoardSyncManager, GameSignals, SyncConfig};
use lichess_link::{ChessClock, SessionConfig};
use shakmaty::Board;

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";
pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR";

pub fn board(placement: &str) -> Board {
    placement.parse().unwrap()
}

/// Millisecond delays so scenarios finish quickly.
pub fn fast_sync() -> SyncConfig {
    SyncConfig {
        refresh_delay: Duration::from_millis(1),
        no_move_delay: Duration::from_millis(5),
        settle_delay: Duration::from_millis(1),
        light_delay: Duration::from_millis(1),
        end_hold: Duration::from_millis(1),
    }
}

pub fn fast_session(retry_delay: Duration) -> SessionConfig {
    SessionConfig {
        retry_delay,
        join_timeout: Duration::from_millis(20),
    }
}

/// A connected manager over a scripted board in the starting position.
pub async fn connected_board() -> (Arc<BoardSyncManager<ScriptedBoard>>, BoardHandle) {
    let (driver, handle) = ScriptedBoard::new();
    let manager = BoardSyncManager::connect(driver, GameSignals::new(), fast_sync())
        .await
        .unwrap();
    (Arc::new(manager), handle)
}

pub fn game_full(id: &str, moves: &str) -> String {
    format!(
        r#"{{"type":"gameFull","id":"{id}","initialFen":"startpos","variant":{{"key":"standard"}},"state":{{"type":"gameState","moves":"{moves}","wtime":300000,"btime":300000,"status":"started"}}}}"#
    )
}

pub fn game_state(moves: &str, status: &str, winner: Option<&str>) -> String {
    let winner = winner
        .map(|w| format!(r#","winner":"{w}""#))
        .unwrap_or_default();
    format!(
        r#"{{"type":"gameState","moves":"{moves}","wtime":299000,"btime":298000,"status":"{status}"{winner}}}"#
    )
}

/// Clock that records every call.
#[derive(Default)]
pub struct RecordingClock {
    calls: Mutex<Vec<String>>,
}

impl RecordingClock {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

impl ChessClock for RecordingClock {
    fn update(&self, white: chrono::Duration, black: chrono::Duration) {
        self.record(&format!(
            "update {} {}",
            white.num_seconds(),
            black.num_seconds()
        ));
    }

    fn white_won(&self) {
        self.record("white_won");
    }

    fn black_won(&self) {
        self.record("black_won");
    }

    fn game_over(&self) {
        self.record("game_over");
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
