//! One remote game mirrored on the physical board.
//!
//! A [`GameSession`] consumes the per-game event stream. Each state update
//! replays the full move list from the game's start, lights the last move
//! and, when it is our turn, spawns a reconciler task that waits for the
//! move on the board and submits it. Stream consumption never blocks on
//! the player.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use shakmaty::{CastlingMode, Chess, Color, Position};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use board_core::{replay, BoardMove, GameEnd, Termination};
use board_link::{AwaitOutcome, BoardDriver, BoardSyncManager, SyncError};

use crate::clock::ChessClock;
use crate::error::{LichessError, Rejection, SessionError};
use crate::events::{GameEvent, GameState};
use crate::service::{EventStream, GameService};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause before resubmitting a move after a transient rejection.
    pub retry_delay: Duration,
    /// How long to wait on a previous reconciler between game-over checks.
    pub join_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            join_timeout: Duration::from_secs(1),
        }
    }
}

/// What a single event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Finished(GameEnd),
    /// The session had already terminated.
    Ignored,
}

struct SessionCore<S, D> {
    game_id: String,
    color: Color,
    start: Chess,
    castling: CastlingMode,
    service: Arc<S>,
    board: Arc<BoardSyncManager<D>>,
    clock: Arc<dyn ChessClock>,
    config: SessionConfig,
    submit_failed_once: AtomicBool,
    terminated: AtomicBool,
    /// Set while the reconciler is blocked on the board rather than the network.
    awaiting_board: AtomicBool,
    /// Move list we last submitted an answer to.
    answered: Mutex<Option<String>>,
}

struct Reconciler {
    moves: String,
    handle: JoinHandle<Result<(), SessionError>>,
}

pub struct GameSession<S, D> {
    core: Arc<SessionCore<S, D>>,
    events: EventStream<GameEvent>,
    initial: Option<GameState>,
    reconciler: Option<Reconciler>,
}

impl<S: GameService, D: BoardDriver> GameSession<S, D> {
    /// Subscribe to the game and seed the board model from its opening
    /// `gameFull` event.
    pub async fn open(
        service: Arc<S>,
        board: Arc<BoardSyncManager<D>>,
        game_id: &str,
        color: Color,
        clock: Arc<dyn ChessClock>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut events = service.stream_game(game_id).await?;
        let full = match events.next().await {
            Some(Ok(GameEvent::GameFull(full))) => full,
            Some(Ok(other)) => {
                warn!(game_id, event = ?other, "Game stream did not start with gameFull");
                return Err(SessionError::StreamEnded);
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(SessionError::StreamEnded),
        };

        let start = full.start_position()?;
        let castling = full.castling_mode();
        board.reset_to(start.clone(), castling).await?;
        board.signals().start_game();
        info!(game_id, ?color, ?castling, "Game session opened");

        Ok(Self {
            core: Arc::new(SessionCore {
                game_id: game_id.to_string(),
                color,
                start,
                castling,
                service,
                board,
                clock,
                config,
                submit_failed_once: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                awaiting_board: AtomicBool::new(false),
                answered: Mutex::new(None),
            }),
            events,
            initial: Some(full.state),
            reconciler: None,
        })
    }

    pub fn game_id(&self) -> &str {
        &self.core.game_id
    }

    pub fn is_terminated(&self) -> bool {
        self.core.terminated.load(Ordering::SeqCst)
    }

    /// Drive the session until the game ends.
    pub async fn run(mut self) -> Result<GameEnd, SessionError> {
        let result = self.drive().await;
        self.stop_reconciler().await;

        match result {
            Ok(end) => Ok(end),
            Err(SessionError::Sync(SyncError::KillRequested)) => {
                self.core.terminated.store(true, Ordering::SeqCst);
                Err(SessionError::Sync(SyncError::KillRequested))
            }
            Err(e) => {
                error!(game_id = %self.core.game_id, error = %e, "Game session failed");
                if let Err(cleanup) = self.core.finish(GameEnd::drawn(Termination::Aborted)).await {
                    warn!(
                        game_id = %self.core.game_id,
                        error = %cleanup,
                        "Cleanup after failure also failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<GameEnd, SessionError> {
        if let Some(state) = self.initial.take() {
            if let Dispatch::Finished(end) = self.on_state(state).await? {
                return Ok(end);
            }
        }

        let core = self.core.clone();
        let signals = core.board.signals().clone();
        loop {
            tokio::select! {
                _ = signals.killed() => {
                    return Err(SessionError::Sync(SyncError::KillRequested));
                }
                _ = signals.game_over() => {
                    // Ended from outside, e.g. the account stream reported gameFull.
                    let end = core
                        .board
                        .result()
                        .await
                        .unwrap_or_else(|| GameEnd::drawn(Termination::Aborted));
                    core.finish(end.clone()).await?;
                    return Ok(end);
                }
                joined = join_handle(&mut self.reconciler), if self.reconciler.is_some() => {
                    self.reconciler = None;
                    joined?;
                }
                event = self.events.next() => {
                    let dispatch = match event {
                        Some(Ok(event)) => self.handle_event(event).await?,
                        Some(Err(LichessError::Json(e))) => {
                            warn!(game_id = %core.game_id, error = %e, "Skipping malformed game event");
                            Dispatch::Continue
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => self.end_of_stream().await?,
                    };
                    match dispatch {
                        Dispatch::Continue => {}
                        Dispatch::Finished(end) => return Ok(end),
                        Dispatch::Ignored => return core.board.result().await.ok_or(SessionError::StreamEnded),
                    }
                }
            }
        }
    }

    pub async fn handle_event(&mut self, event: GameEvent) -> Result<Dispatch, SessionError> {
        if self.is_terminated() {
            return Ok(Dispatch::Ignored);
        }
        match event {
            GameEvent::GameState(state) => self.on_state(state).await,
            GameEvent::ChatLine(line) => {
                info!(game_id = %self.core.game_id, user = %line.username, room = %line.room, text = %line.text, "Chat");
                self.core.board.beep().await?;
                Ok(Dispatch::Continue)
            }
            GameEvent::GameFull(_) => {
                info!(game_id = %self.core.game_id, "gameFull mid-game, ending session");
                self.end_of_stream().await
            }
            GameEvent::Other => {
                debug!(game_id = %self.core.game_id, "Unexpected game event, ending session");
                self.end_of_stream().await
            }
        }
    }

    async fn end_of_stream(&mut self) -> Result<Dispatch, SessionError> {
        let end = GameEnd::drawn(Termination::StreamEnded);
        self.core.finish(end.clone()).await?;
        Ok(Dispatch::Finished(end))
    }

    async fn on_state(&mut self, state: GameState) -> Result<Dispatch, SessionError> {
        let core = self.core.clone();
        if core.terminated.load(Ordering::SeqCst) {
            return Ok(Dispatch::Ignored);
        }
        debug!(game_id = %core.game_id, moves = %state.moves, status = %state.status, "Game state");
        core.clock.update(state.white_time(), state.black_time());

        let replayed = replay(&core.start, &state.moves, core.castling)?;
        if let Some(mv) = &replayed.last_move {
            core.board.highlight_move(mv).await?;
        }

        if let Some(end) = state.remote_end().or(replayed.outcome) {
            core.finish(end.clone()).await?;
            self.stop_reconciler().await;
            return Ok(Dispatch::Finished(end));
        }

        let our_turn = replayed.position.turn() == core.color;
        if our_turn
            && (self.reconciler.as_ref().is_some_and(|r| r.moves == state.moves)
                || core.already_answered(&state.moves))
        {
            // Same position re-sent (clock or offer update).
            return Ok(Dispatch::Continue);
        }
        self.supersede().await?;

        core.board
            .set_game_position(replayed.position, replayed.previous, replayed.last_move)
            .await;

        if our_turn {
            if replayed.plies == 0 {
                info!(game_id = %core.game_id, "Making the first move");
            }
            let worker = core.clone();
            let moves = state.moves.clone();
            self.reconciler = Some(Reconciler {
                moves: state.moves,
                handle: tokio::spawn(async move { worker.reconcile(moves).await }),
            });
        } else {
            if let Some(mv) = &replayed.last_move {
                debug!(game_id = %core.game_id, mv = %mv, "Waiting for opponent");
            }
            core.submit_failed_once.store(false, Ordering::SeqCst);
        }
        Ok(Dispatch::Continue)
    }

    /// Let a previous reconciler finish, checking for game over between
    /// joins. One still waiting on the board is stale and gets aborted.
    async fn supersede(&mut self) -> Result<(), SessionError> {
        let Some(mut prev) = self.reconciler.take() else {
            return Ok(());
        };
        let signals = self.core.board.signals();
        loop {
            match tokio::time::timeout(self.core.config.join_timeout, &mut prev.handle).await {
                Ok(joined) => return flatten_join(joined),
                Err(_) => {
                    if signals.is_game_over()
                        || signals.is_killed()
                        || self.core.awaiting_board.load(Ordering::SeqCst)
                    {
                        debug!(game_id = %self.core.game_id, "Superseding stale reconciler");
                        prev.handle.abort();
                        self.core.awaiting_board.store(false, Ordering::SeqCst);
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn stop_reconciler(&mut self) {
        if let Some(prev) = self.reconciler.take() {
            prev.handle.abort();
            let _ = prev.handle.await;
        }
    }
}

async fn join_handle(reconciler: &mut Option<Reconciler>) -> Result<(), SessionError> {
    match reconciler.as_mut() {
        Some(r) => flatten_join((&mut r.handle).await),
        None => std::future::pending().await,
    }
}

fn flatten_join(
    joined: Result<Result<(), SessionError>, tokio::task::JoinError>,
) -> Result<(), SessionError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => {
            error!(error = %e, "Reconciler task panicked");
            Err(SessionError::Worker(e.to_string()))
        }
    }
}

impl<S: GameService, D: BoardDriver> SessionCore<S, D> {
    /// Wait for our move on the board, then send it.
    async fn reconcile(&self, moves: String) -> Result<(), SessionError> {
        self.awaiting_board.store(true, Ordering::SeqCst);
        let outcome = self.board.await_move().await;
        self.awaiting_board.store(false, Ordering::SeqCst);

        match outcome? {
            AwaitOutcome::Moved(mv) => {
                self.submit_move(&mv).await?;
                *self.answered.lock().unwrap_or_else(|p| p.into_inner()) = Some(moves);
                Ok(())
            }
            AwaitOutcome::GameOver => Ok(()),
        }
    }

    fn already_answered(&self, moves: &str) -> bool {
        self.answered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_deref()
            == Some(moves)
    }

    /// Submit with one retry. A second consecutive transient failure is
    /// fatal; a turn/game-over rejection ends the session at once.
    async fn submit_move(&self, mv: &BoardMove) -> Result<(), SessionError> {
        loop {
            if self.board.signals().is_game_over() {
                return Ok(());
            }
            match self.service.make_move(&self.game_id, mv).await {
                Ok(()) => {
                    self.submit_failed_once.store(false, Ordering::SeqCst);
                    info!(game_id = %self.game_id, mv = %mv, "Move submitted");
                    return Ok(());
                }
                Err(e) if e.rejection() == Rejection::Terminal => {
                    warn!(game_id = %self.game_id, mv = %mv, error = %e, "Move rejected");
                    return Err(SessionError::SubmissionRejected {
                        mv: *mv,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    if self.submit_failed_once.swap(true, Ordering::SeqCst) {
                        self.submit_failed_once.store(false, Ordering::SeqCst);
                        error!(game_id = %self.game_id, mv = %mv, error = %e, "Move failed twice");
                        return Err(SessionError::SubmissionFailed { mv: *mv, source: e });
                    }
                    warn!(
                        game_id = %self.game_id,
                        mv = %mv,
                        error = %e,
                        retry_in = ?self.config.retry_delay,
                        "Move submission failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Terminate once: notify the clock, raise game over and beep.
    async fn finish(&self, end: GameEnd) -> Result<(), SessionError> {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match end.winner {
            Some(Color::White) => self.clock.white_won(),
            Some(Color::Black) => self.clock.black_won(),
            None => self.clock.game_over(),
        }
        info!(game_id = %self.game_id, result = %end, "Good game");
        self.board.signal_game_over(end).await;
        self.board.beep().await?;
        Ok(())
    }
}
