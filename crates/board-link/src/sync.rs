//! Keeps the physical board, the authoritative game model and the LED array
//! in step.
//!
//! [`BoardSyncManager`] owns the driver and the model, each behind its own
//! lock. Game sessions read and update the model only through its methods.

use std::time::Duration;

use shakmaty::{Board, CastlingMode, Chess, Color, Position};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use board_core::{
    board_diff, decode_position, infer_move, BoardMove, Coord, GameEnd, InferenceError, LedFrame,
    Placement, Signal,
};

use crate::driver::BoardDriver;
use crate::error::SyncError;
use crate::signals::GameSignals;

/// Delays used by the polling and lighting loops.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause after an unchanged or rejected board read.
    pub refresh_delay: Duration,
    /// Pause between polls while waiting for a move.
    pub no_move_delay: Duration,
    /// Wait after opening the device before trusting its reports.
    pub settle_delay: Duration,
    /// How long a signal pattern stays up before the last move is restored.
    pub light_delay: Duration,
    /// How long the final result stays lit after a game ends.
    pub end_hold: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(10),
            no_move_delay: Duration::from_millis(30),
            settle_delay: Duration::from_millis(1000),
            light_delay: Duration::from_millis(200),
            end_hold: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Connected,
    Polling,
    AwaitingLocalMove,
    AwaitingRemoteMove,
    GameOver,
}

/// Result of waiting for a move on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitOutcome {
    Moved(BoardMove),
    /// The game ended while waiting.
    GameOver,
}

struct Hardware<D> {
    driver: D,
    /// Frame currently on the board, to skip redundant writes.
    shown: Option<LedFrame>,
}

struct GameModel {
    position: Chess,
    start: Chess,
    castling: CastlingMode,
    /// Position before the last move, used to ignore a board that has not
    /// caught up with the opponent's move yet.
    previous: Option<Chess>,
    last_move: Option<BoardMove>,
    result: Option<GameEnd>,
    phase: SyncPhase,
    /// Bumped on every reset so stale teardown never wipes a newer game.
    generation: u64,
}

impl GameModel {
    fn new(start: Chess, castling: CastlingMode, phase: SyncPhase, generation: u64) -> Self {
        Self {
            position: start.clone(),
            start,
            castling,
            previous: None,
            last_move: None,
            result: None,
            phase,
            generation,
        }
    }
}

pub struct BoardSyncManager<D> {
    hw: Mutex<Hardware<D>>,
    model: Mutex<GameModel>,
    signals: GameSignals,
    config: SyncConfig,
}

impl<D: BoardDriver> BoardSyncManager<D> {
    /// Open the board and make sure it reports a position.
    pub async fn connect(
        mut driver: D,
        signals: GameSignals,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        driver
            .connect()
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?;

        // The first report after opening is often stale.
        tokio::time::sleep(config.settle_delay).await;
        let _ = driver.read_snapshot().await;
        tokio::time::sleep(config.settle_delay).await;

        let snapshot = driver
            .read_snapshot()
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?
            .ok_or_else(|| {
                SyncError::Connection(
                    "no position from board; is it connected and turned on?".to_string(),
                )
            })?;
        let placement = decode_position(&snapshot)?;
        info!(placement = %placement, "Board initialized");

        Ok(Self {
            hw: Mutex::new(Hardware {
                driver,
                shown: None,
            }),
            model: Mutex::new(GameModel::new(
                Chess::default(),
                CastlingMode::Standard,
                SyncPhase::Connected,
                0,
            )),
            signals,
            config,
        })
    }

    pub fn signals(&self) -> &GameSignals {
        &self.signals
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn disconnect(&self) -> Result<(), SyncError> {
        let mut hw = self.hw.lock().await;
        hw.driver.disconnect().await?;
        hw.shown = None;
        self.model.lock().await.phase = SyncPhase::Idle;
        info!("Board disconnected");
        Ok(())
    }

    // ---- Authoritative model ----

    /// Back to the standard starting position with lights off and the
    /// per-game signals re-armed.
    pub async fn reset(&self) -> Result<(), SyncError> {
        self.reset_model(Chess::default(), CastlingMode::Standard, SyncPhase::Idle, None)
            .await
            .map(|_| ())
    }

    /// Start a new game from `start`, e.g. a Chess960 or custom setup.
    pub async fn reset_to(&self, start: Chess, castling: CastlingMode) -> Result<(), SyncError> {
        self.reset_model(start, castling, SyncPhase::Polling, None)
            .await
            .map(|_| ())
    }

    /// Reset only if no other reset happened since `generation` was read.
    async fn reset_if_current(&self, generation: u64) -> Result<bool, SyncError> {
        self.reset_model(
            Chess::default(),
            CastlingMode::Standard,
            SyncPhase::Idle,
            Some(generation),
        )
        .await
    }

    async fn reset_model(
        &self,
        start: Chess,
        castling: CastlingMode,
        phase: SyncPhase,
        expected: Option<u64>,
    ) -> Result<bool, SyncError> {
        {
            let mut model = self.model.lock().await;
            if expected.is_some_and(|g| g != model.generation) {
                return Ok(false);
            }
            let generation = model.generation + 1;
            *model = GameModel::new(start, castling, phase, generation);
            debug!(placement = %Placement::of(model.position.board()), generation, "Game model reset");
        }
        self.signals.rearm();
        self.all_off().await?;
        Ok(true)
    }

    async fn generation(&self) -> u64 {
        self.model.lock().await.generation
    }

    /// Adopt a position computed elsewhere, e.g. from the remote move list.
    pub async fn set_game_position(
        &self,
        position: Chess,
        previous: Option<Chess>,
        last_move: Option<BoardMove>,
    ) {
        let mut model = self.model.lock().await;
        model.position = position;
        model.previous = previous;
        model.last_move = last_move;
        if model.phase != SyncPhase::GameOver {
            model.phase = SyncPhase::Polling;
        }
    }

    pub async fn position(&self) -> Chess {
        self.model.lock().await.position.clone()
    }

    pub async fn start_position(&self) -> Chess {
        self.model.lock().await.start.clone()
    }

    pub async fn castling_mode(&self) -> CastlingMode {
        self.model.lock().await.castling
    }

    pub async fn turn(&self) -> Color {
        self.model.lock().await.position.turn()
    }

    pub async fn last_move(&self) -> Option<BoardMove> {
        self.model.lock().await.last_move
    }

    pub async fn phase(&self) -> SyncPhase {
        self.model.lock().await.phase
    }

    pub async fn result(&self) -> Option<GameEnd> {
        self.model.lock().await.result.clone()
    }

    /// Placement the board is physically showing.
    pub async fn read_board(&self) -> Result<Board, SyncError> {
        let snapshot = {
            let mut hw = self.hw.lock().await;
            hw.driver.read_snapshot().await?
        }
        .ok_or_else(|| SyncError::Connection("board stopped reporting positions".to_string()))?;
        Ok(decode_position(&snapshot)?.to_board()?)
    }

    // ---- Move detection ----

    /// Poll the board once. Returns the move if the board now shows exactly
    /// one legal move played from the authoritative position.
    ///
    /// An illegal board is reported with a diff on the LEDs and yields
    /// `None` so the player can put the pieces right.
    pub async fn check_for_move(&self) -> Result<Option<BoardMove>, SyncError> {
        let reported = self.read_board().await?;

        let mut model = self.model.lock().await;
        if self.signals.is_game_over() {
            return Ok(None);
        }

        // The opponent's move is known remotely but not yet made on the board.
        if model
            .previous
            .as_ref()
            .is_some_and(|prev| prev.board() == &reported)
        {
            drop(model);
            debug!("Board still shows the position before the last move");
            tokio::time::sleep(self.config.refresh_delay).await;
            return Ok(None);
        }

        match infer_move(&model.position, &reported) {
            Ok(mv) => {
                let coords = BoardMove::from_move(&mv, model.castling)?;
                let before = model.position.clone();
                model.position.play_unchecked(mv);
                model.previous = Some(before);
                model.last_move = Some(coords);
                info!(mv = %coords, "Move made on board");
                Ok(Some(coords))
            }
            Err(InferenceError::NoMove) => Ok(None),
            Err(InferenceError::IllegalMove { expected, reported: seen }) => {
                let turn = model.position.turn();
                let expected_board = model.position.board().clone();
                let last_move = model.last_move;
                drop(model);

                warn!(
                    expected = %expected,
                    reported = %seen,
                    ?turn,
                    "Board position is not reachable by a legal move"
                );
                self.light_diff(&reported, &expected_board, last_move).await?;
                tokio::time::sleep(self.config.refresh_delay).await;
                Ok(None)
            }
        }
    }

    /// Wait until a move is played on the board or the game ends.
    ///
    /// Returns `Err(SyncError::KillRequested)` once shutdown is requested.
    pub async fn await_move(&self) -> Result<AwaitOutcome, SyncError> {
        self.set_phase(SyncPhase::AwaitingLocalMove).await;
        let mut attempts: u32 = 0;
        loop {
            if self.signals.is_killed() {
                return Err(SyncError::KillRequested);
            }
            if self.signals.is_game_over() {
                return Ok(AwaitOutcome::GameOver);
            }

            if let Some(mv) = self.check_for_move().await? {
                info!(mv = %mv, attempts, "Got move from board");
                self.set_phase(SyncPhase::AwaitingRemoteMove).await;
                return Ok(AwaitOutcome::Moved(mv));
            }

            attempts += 1;
            tokio::select! {
                _ = tokio::time::sleep(self.config.no_move_delay) => {}
                _ = self.signals.killed() => {}
                _ = self.signals.game_over() => {}
            }
        }
    }

    async fn set_phase(&self, phase: SyncPhase) {
        let mut model = self.model.lock().await;
        if model.phase != SyncPhase::GameOver {
            model.phase = phase;
        }
    }

    // ---- Game over ----

    /// Record the result and raise the game-over signal. Returns `false` if
    /// the game had already ended.
    pub async fn signal_game_over(&self, end: GameEnd) -> bool {
        let mut model = self.model.lock().await;
        if model.result.is_some() {
            return false;
        }
        info!(result = %end, "Game over");
        model.result = Some(end);
        model.phase = SyncPhase::GameOver;
        drop(model);
        self.signals.set_game_over();
        true
    }

    /// Board worker: between games wait for a start, and after each game
    /// show the result and reset. Turns the lights off and releases the
    /// device once shutdown is requested.
    pub async fn run(&self) -> Result<(), SyncError> {
        loop {
            tokio::select! {
                _ = self.signals.killed() => break,
                _ = self.signals.started() => {}
            }
            info!("Game started");

            tokio::select! {
                _ = self.signals.killed() => break,
                _ = self.signals.game_over() => {}
            }

            let (generation, result) = {
                let model = self.model.lock().await;
                (model.generation, model.result.clone())
            };
            let shown = match result {
                Some(end) => self.game_over_lights(&end, generation).await?,
                None => true,
            };

            // A new game may have started while the result was showing.
            if shown && self.reset_if_current(generation).await? {
                info!("Game over, board reset");
            } else {
                debug!(generation, "New game started, skipping reset");
            }
        }

        info!("Shutting down board worker");
        self.all_off().await?;
        self.disconnect().await
    }

    // ---- LEDs and sound ----

    async fn write_frame(&self, frame: LedFrame) -> Result<(), SyncError> {
        let mut hw = self.hw.lock().await;
        if hw.shown == Some(frame) {
            return Ok(());
        }
        debug!("LEDs:\n{frame}");
        hw.driver.write_leds(frame).await?;
        hw.shown = Some(frame);
        Ok(())
    }

    /// Light the origin and destination of `mv`.
    pub async fn highlight_move(&self, mv: &BoardMove) -> Result<(), SyncError> {
        self.write_frame(LedFrame::for_move(mv)).await
    }

    /// Light every square where `a` and `b` differ, except the last move's
    /// squares. Returns whether anything differed.
    pub async fn show_diff(&self, a: &Board, b: &Board) -> Result<bool, SyncError> {
        let last_move = self.last_move().await;
        self.light_diff(a, b, last_move).await
    }

    async fn light_diff(
        &self,
        a: &Board,
        b: &Board,
        last_move: Option<BoardMove>,
    ) -> Result<bool, SyncError> {
        let squares = board_diff(a, b);
        if squares.is_empty() {
            return Ok(false);
        }
        let names: Vec<String> = squares.iter().map(Coord::name).collect();
        info!(squares = ?names, "Board differs");

        let mut frame = LedFrame::from_squares(squares);
        if let Some(mv) = last_move {
            let remaining = frame.without(&LedFrame::for_move(&mv));
            frame = if remaining.is_empty() {
                LedFrame::for_move(&mv)
            } else {
                remaining
            };
        }
        self.write_frame(frame).await?;
        Ok(true)
    }

    /// Flash a status pattern, then put the last move back up.
    pub async fn signal_pattern(&self, signal: Signal) -> Result<(), SyncError> {
        self.write_frame(signal.frame()).await?;
        tokio::time::sleep(self.config.light_delay).await;
        self.restore_last_move().await
    }

    async fn restore_last_move(&self) -> Result<(), SyncError> {
        match self.last_move().await {
            Some(mv) => self.highlight_move(&mv).await,
            None => self.all_off().await,
        }
    }

    /// Switch one square's LED on the current frame.
    pub async fn set_led(&self, square: Coord, on: bool) -> Result<(), SyncError> {
        let mut frame = self.hw.lock().await.shown.unwrap_or(LedFrame::EMPTY);
        frame.set(square, on);
        self.write_frame(frame).await
    }

    pub async fn all_off(&self) -> Result<(), SyncError> {
        self.write_frame(LedFrame::EMPTY).await
    }

    pub async fn beep(&self) -> Result<(), SyncError> {
        self.hw.lock().await.driver.beep().await?;
        Ok(())
    }

    /// Short light show, then the winner's half (or the ring for a draw)
    /// held for a while before the board goes dark.
    ///
    /// Stops early and returns `false` once a reset moves the model past
    /// `generation`, leaving the new game's lights alone.
    pub async fn game_over_lights(
        &self,
        end: &GameEnd,
        generation: u64,
    ) -> Result<bool, SyncError> {
        let finale = match end.winner {
            Some(Color::White) => Signal::WhiteHalf,
            Some(Color::Black) => Signal::BlackHalf,
            None => Signal::Ring,
        };
        let steps = [
            (Signal::Ring, self.config.light_delay),
            (Signal::CenterLines, self.config.light_delay),
            (Signal::CenterCross, self.config.light_delay),
            (Signal::Scatter, self.config.light_delay),
            (finale, self.config.end_hold),
        ];
        for (signal, hold) in steps {
            if self.generation().await != generation {
                return Ok(false);
            }
            self.write_frame(signal.frame()).await?;
            tokio::time::sleep(hold).await;
        }
        if self.generation().await != generation {
            return Ok(false);
        }
        self.all_off().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBoard;
    use board_core::Termination;
    use std::sync::Arc;

    fn fast() -> SyncConfig {
        SyncConfig {
            refresh_delay: Duration::from_millis(1),
            no_move_delay: Duration::from_millis(5),
            settle_delay: Duration::from_millis(1),
            light_delay: Duration::from_millis(1),
            end_hold: Duration::from_millis(1),
        }
    }

    fn board(placement: &str) -> Board {
        placement.parse().unwrap()
    }

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR";

    #[tokio::test]
    async fn test_connect_requires_a_position() {
        let (driver, handle) = ScriptedBoard::blank();
        let err = BoardSyncManager::connect(driver, GameSignals::new(), fast())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::Connection(_)));
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn test_detects_e2e4_once() {
        let (driver, handle) = ScriptedBoard::new();
        let manager = BoardSyncManager::connect(driver, GameSignals::new(), fast())
            .await
            .unwrap();
        assert_eq!(manager.phase().await, SyncPhase::Connected);

        assert_eq!(manager.check_for_move().await.unwrap(), None);
        handle.set_board(&board(AFTER_E4));
        let mv = manager.check_for_move().await.unwrap().unwrap();
        assert_eq!(mv.to_string(), "e2e4");
        assert_eq!(manager.turn().await, Color::Black);

        // Board unchanged: the model must not move again.
        for _ in 0..3 {
            assert_eq!(manager.check_for_move().await.unwrap(), None);
        }
        assert_eq!(manager.position().await.board(), &board(AFTER_E4));
        assert_eq!(manager.last_move().await, Some(mv));
    }

    #[tokio::test]
    async fn test_board_behind_remote_move_is_ignored() {
        let (driver, handle) = ScriptedBoard::new();
        let manager = BoardSyncManager::connect(driver, GameSignals::new(), fast())
            .await
            .unwrap();

        // Remote played e2e4; the board still shows the start.
        let start = Chess::default();
        let mut after = start.clone();
        let e4 = "e2e4".parse::<shakmaty::uci::UciMove>().unwrap().to_move(&start).unwrap();
        after.play_unchecked(e4);
        manager
            .set_game_position(after, Some(start), Some(BoardMove::parse("e2e4").unwrap()))
            .await;

        handle.set_board(&board(START));
        assert_eq!(manager.check_for_move().await.unwrap(), None);
        assert_eq!(manager.turn().await, Color::Black);
    }

    #[tokio::test]
    async fn test_illegal_board_lights_diff() {
        let (driver, handle) = ScriptedBoard::new();
        let manager = BoardSyncManager::connect(driver, GameSignals::new(), fast())
            .await
            .unwrap();

        // e2-e4 and d7-d5 together.
        handle.set_board(&board("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR"));
        assert_eq!(manager.check_for_move().await.unwrap(), None);
        assert_eq!(manager.position().await.board(), &board(START));

        let frame = handle.last_frame().unwrap();
        assert_eq!(frame.lit_count(), 4);
        for sq in ["e2", "e4", "d7", "d5"] {
            assert!(frame.is_lit(sq.parse().unwrap()), "{sq} should be lit");
        }
    }

    #[tokio::test]
    async fn test_await_move_stops_on_game_over_and_kill() {
        let signals = GameSignals::new();
        let (driver, _handle) = ScriptedBoard::new();
        let manager = Arc::new(
            BoardSyncManager::connect(driver, signals.clone(), fast())
                .await
                .unwrap(),
        );

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.await_move().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        signals.set_game_over();
        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, AwaitOutcome::GameOver);

        signals.rearm();
        signals.kill();
        assert!(matches!(
            manager.await_move().await,
            Err(SyncError::KillRequested)
        ));
    }

    #[tokio::test]
    async fn test_game_over_signalled_once() {
        let signals = GameSignals::new();
        let (driver, _handle) = ScriptedBoard::new();
        let manager = BoardSyncManager::connect(driver, signals.clone(), fast())
            .await
            .unwrap();

        let end = GameEnd::decisive(Color::White, Termination::Checkmate);
        assert!(manager.signal_game_over(end.clone()).await);
        assert!(!manager.signal_game_over(GameEnd::drawn(Termination::Stalemate)).await);
        assert!(signals.is_game_over());
        assert_eq!(manager.result().await, Some(end));
        assert_eq!(manager.phase().await, SyncPhase::GameOver);

        manager.reset().await.unwrap();
        assert!(!signals.is_game_over());
        assert_eq!(manager.result().await, None);
    }

    #[tokio::test]
    async fn test_leds() {
        let (driver, handle) = ScriptedBoard::new();
        let manager = BoardSyncManager::connect(driver, GameSignals::new(), fast())
            .await
            .unwrap();

        let mv = BoardMove::parse("e2e4").unwrap();
        manager.highlight_move(&mv).await.unwrap();
        manager.highlight_move(&mv).await.unwrap();
        assert_eq!(handle.frames().len(), 1);

        manager.set_led("a1".parse().unwrap(), true).await.unwrap();
        assert_eq!(handle.last_frame().unwrap().lit_count(), 3);
        manager.set_led("a1".parse().unwrap(), false).await.unwrap();
        assert_eq!(handle.last_frame(), Some(LedFrame::for_move(&mv)));

        manager.signal_pattern(Signal::Scatter).await.unwrap();
        // No last move recorded in the model, so the pattern is cleared.
        assert_eq!(handle.last_frame(), Some(LedFrame::EMPTY));

        manager.beep().await.unwrap();
        assert_eq!(handle.beeps(), 1);
    }

    #[tokio::test]
    async fn test_run_resets_after_game_and_exits_on_kill() {
        let signals = GameSignals::new();
        let (driver, handle) = ScriptedBoard::new();
        let manager = Arc::new(
            BoardSyncManager::connect(driver, signals.clone(), fast())
                .await
                .unwrap(),
        );
        let worker = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.run().await })
        };

        manager.reset_to(Chess::default(), CastlingMode::Standard).await.unwrap();
        signals.start_game();
        manager
            .signal_game_over(GameEnd::decisive(Color::Black, Termination::Checkmate))
            .await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while manager.result().await.is_some() {
            assert!(tokio::time::Instant::now() < deadline, "board never reset");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(manager.phase().await, SyncPhase::Idle);

        signals.kill();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!handle.is_connected());
        assert_eq!(handle.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_stale_reset_leaves_new_game() {
        let (driver, _handle) = ScriptedBoard::new();
        let manager = BoardSyncManager::connect(driver, GameSignals::new(), fast())
            .await
            .unwrap();
        let stale = manager.generation().await;

        manager.reset_to(Chess::default(), CastlingMode::Chess960).await.unwrap();
        manager.signals().start_game();
        assert!(!manager.reset_if_current(stale).await.unwrap());
        assert_eq!(manager.castling_mode().await, CastlingMode::Chess960);
        assert_eq!(manager.phase().await, SyncPhase::Polling);
        assert!(manager.signals().is_started());

        let current = manager.generation().await;
        assert!(manager.reset_if_current(current).await.unwrap());
        assert_eq!(manager.phase().await, SyncPhase::Idle);
        assert!(!manager.signals().is_started());
    }

    #[tokio::test]
    async fn test_new_game_during_result_lights_is_kept() {
        let signals = GameSignals::new();
        let (driver, handle) = ScriptedBoard::new();
        let config = SyncConfig {
            light_delay: Duration::from_millis(40),
            end_hold: Duration::from_millis(200),
            ..fast()
        };
        let manager = Arc::new(
            BoardSyncManager::connect(driver, signals.clone(), config)
                .await
                .unwrap(),
        );
        let worker = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.run().await })
        };

        manager.reset_to(Chess::default(), CastlingMode::Standard).await.unwrap();
        signals.start_game();
        manager
            .signal_game_over(GameEnd::decisive(Color::White, Termination::Checkmate))
            .await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !handle.frames().contains(&Signal::Ring.frame()) {
            assert!(tokio::time::Instant::now() < deadline, "light show never started");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Next game opens while the first ring is still up.
        manager.reset_to(Chess::default(), CastlingMode::Standard).await.unwrap();
        signals.start_game();
        let e4 = BoardMove::parse("e2e4").unwrap();
        manager.highlight_move(&e4).await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(handle.last_frame(), Some(LedFrame::for_move(&e4)));
        assert!(!handle.frames().contains(&Signal::WhiteHalf.frame()));
        assert_eq!(manager.phase().await, SyncPhase::Polling);
        assert!(signals.is_started());
        assert_eq!(manager.result().await, None);

        signals.kill();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
