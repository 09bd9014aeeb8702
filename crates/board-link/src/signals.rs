//! Process-wide lifecycle flags shared by the board worker and game sessions.
//!
//! `kill` is monotonic for the process lifetime. `game_over` and `start` are
//! once-set per game and re-armed only by [`GameSignals::rearm`].

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub struct GameSignals {
    inner: Arc<Flags>,
}

struct Flags {
    game_over: watch::Sender<bool>,
    kill: watch::Sender<bool>,
    start: watch::Sender<bool>,
}

impl Default for GameSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSignals {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Flags {
                game_over: watch::channel(false).0,
                kill: watch::channel(false).0,
                start: watch::channel(false).0,
            }),
        }
    }

    pub fn set_game_over(&self) {
        self.inner.game_over.send_replace(true);
    }

    pub fn kill(&self) {
        self.inner.kill.send_replace(true);
    }

    pub fn start_game(&self) {
        self.inner.start.send_replace(true);
    }

    pub fn is_game_over(&self) -> bool {
        *self.inner.game_over.borrow()
    }

    pub fn is_killed(&self) -> bool {
        *self.inner.kill.borrow()
    }

    pub fn is_started(&self) -> bool {
        *self.inner.start.borrow()
    }

    /// Clear `game_over` and `start` for the next game.
    pub fn rearm(&self) {
        self.inner.game_over.send_replace(false);
        self.inner.start.send_replace(false);
    }

    /// Resolves once the game-over flag is set.
    pub async fn game_over(&self) {
        wait_set(&self.inner.game_over).await
    }

    /// Resolves once shutdown is requested.
    pub async fn killed(&self) {
        wait_set(&self.inner.kill).await
    }

    pub async fn started(&self) {
        wait_set(&self.inner.start).await
    }
}

async fn wait_set(flag: &watch::Sender<bool>) {
    let mut rx = flag.subscribe();
    // The sender lives as long as `flag`, so the channel cannot close here.
    let _ = rx.wait_for(|set| *set).await;
}
