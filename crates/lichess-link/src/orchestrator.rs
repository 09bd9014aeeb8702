//! Top-level loop over the account event stream: starts a session per game,
//! retires the previous one, backs off when rate limited.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use board_core::{GameEnd, Termination};
use board_link::{BoardDriver, BoardSyncManager, GameSignals, SyncError};

use crate::clock::ChessClock;
use crate::error::{LichessError, SessionError};
use crate::events::{GameStartInfo, IncomingEvent};
use crate::game::{GameSession, SessionConfig};
use crate::service::GameService;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub play_correspondence: bool,
    /// Pause between event-stream subscriptions.
    pub poll_delay: Duration,
    /// Extra pause after the server answers 429.
    pub rate_limit_delay: Duration,
    /// How long a retired session gets to wind down before it is aborted.
    pub retire_timeout: Duration,
    pub session: SessionConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            play_correspondence: false,
            poll_delay: Duration::from_secs(10),
            rate_limit_delay: Duration::from_secs(10),
            retire_timeout: Duration::from_secs(5),
            session: SessionConfig::default(),
        }
    }
}

struct ActiveGame {
    game_id: String,
    handle: JoinHandle<Result<GameEnd, SessionError>>,
}

pub struct SessionOrchestrator<S, D> {
    service: Arc<S>,
    board: Arc<BoardSyncManager<D>>,
    clock: Arc<dyn ChessClock>,
    config: OrchestratorConfig,
    active: Option<ActiveGame>,
}

impl<S: GameService, D: BoardDriver> SessionOrchestrator<S, D> {
    pub fn new(
        service: Arc<S>,
        board: Arc<BoardSyncManager<D>>,
        clock: Arc<dyn ChessClock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            service,
            board,
            clock,
            config,
            active: None,
        }
    }

    /// Id of the game currently being played, if its session is still running.
    pub fn active_game(&self) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|a| !a.handle.is_finished())
            .map(|a| a.game_id.as_str())
    }

    /// Run until the kill signal is set.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let signals = self.board.signals().clone();

        while !signals.is_killed() {
            info!("Waiting for Lichess events");
            match self.service.stream_incoming_events().await {
                Ok(mut events) => loop {
                    tokio::select! {
                        _ = signals.killed() => break,
                        event = events.next() => match event {
                            Some(Ok(event)) => self.handle_incoming(event).await,
                            Some(Err(LichessError::Json(e))) => {
                                warn!(error = %e, "Skipping malformed account event");
                            }
                            Some(Err(e)) => {
                                self.backoff(&signals, e).await;
                                break;
                            }
                            None => {
                                debug!("Account event stream closed");
                                break;
                            }
                        }
                    }
                },
                Err(e) => self.backoff(&signals, e).await,
            }

            if !pause(&signals, self.config.poll_delay).await {
                break;
            }
        }

        info!("Shutting down session orchestrator");
        self.retire_active().await;
        Ok(())
    }

    async fn backoff(&self, signals: &GameSignals, e: LichessError) {
        if matches!(e, LichessError::RateLimited) {
            warn!(delay = ?self.config.rate_limit_delay, "Rate limited by Lichess");
            pause(signals, self.config.rate_limit_delay).await;
        } else {
            error!(error = %e, "Account event stream failed");
        }
    }

    pub async fn handle_incoming(&mut self, event: IncomingEvent) {
        match event {
            IncomingEvent::Challenge { challenge } => {
                let from = challenge
                    .challenger
                    .and_then(|p| p.name)
                    .unwrap_or_else(|| "anonymous".to_string());
                info!(challenge_id = %challenge.id, from = %from, speed = ?challenge.speed, "Challenge received");
            }
            IncomingEvent::GameStart { game } => self.on_game_start(game).await,
            IncomingEvent::GameFull { id } => {
                info!(game_id = ?id, "gameFull on account stream");
                if self.active_game().is_some() {
                    self.board
                        .signal_game_over(GameEnd::drawn(Termination::Aborted))
                        .await;
                }
            }
            IncomingEvent::GameFinish { game } => {
                info!(game_id = %game.game_id, "Game finished");
            }
            IncomingEvent::Unknown => debug!("Ignoring account event"),
        }
    }

    async fn on_game_start(&mut self, game: GameStartInfo) {
        if self.active_game() == Some(game.game_id.as_str()) {
            debug!(game_id = %game.game_id, "Session already running");
            return;
        }
        if !self.config.play_correspondence && self.is_correspondence(&game).await {
            info!(game_id = %game.game_id, "Skipping correspondence game");
            return;
        }

        self.retire_active().await;

        let color = game.my_color();
        if game.has_moved {
            info!(game_id = %game.game_id, ?color, my_turn = game.is_my_turn, "Joining game in progress");
        } else {
            info!(game_id = %game.game_id, ?color, fen = ?game.fen, "Game start");
        }

        let service = self.service.clone();
        let board = self.board.clone();
        let clock = self.clock.clone();
        let config = self.config.session.clone();
        let game_id = game.game_id.clone();

        let handle = tokio::spawn(async move {
            let result = match GameSession::open(service, board, &game_id, color, clock, config).await
            {
                Ok(session) => session.run().await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(end) => info!(game_id = %game_id, result = %end, "Session ended"),
                Err(SessionError::Sync(SyncError::KillRequested)) => {
                    info!(game_id = %game_id, "Session stopped for shutdown")
                }
                Err(e) => error!(game_id = %game_id, error = %e, "Session ended with error"),
            }
            result
        });

        self.active = Some(ActiveGame {
            game_id: game.game_id,
            handle,
        });
    }

    /// Correspondence per the event's speed, else per the ongoing-games
    /// list. A failed lookup counts as not correspondence.
    async fn is_correspondence(&self, game: &GameStartInfo) -> bool {
        if let Some(answer) = game.is_correspondence() {
            return answer;
        }
        match self.service.ongoing_games().await {
            Ok(games) => games.iter().any(|g| {
                g.game_id == game.game_id && g.speed.as_deref() == Some("correspondence")
            }),
            Err(e) => {
                warn!(game_id = %game.game_id, error = %e, "Cannot determine game speed");
                false
            }
        }
    }

    /// End the running session, if any, and wait for it to wind down.
    async fn retire_active(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if !active.handle.is_finished() {
            info!(game_id = %active.game_id, "Retiring running session");
            self.board
                .signal_game_over(GameEnd::drawn(Termination::Aborted))
                .await;
        }
        if tokio::time::timeout(self.config.retire_timeout, &mut active.handle)
            .await
            .is_err()
        {
            warn!(game_id = %active.game_id, "Session did not stop in time, aborting");
            active.handle.abort();
        }
    }
}

/// Sleep unless shutdown is requested first. Returns `false` on shutdown.
async fn pause(signals: &GameSignals, delay: Duration) -> bool {
    tokio::select! {
        _ = signals.killed() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
