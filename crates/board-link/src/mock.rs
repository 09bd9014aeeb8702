//! In-memory board for tests. The test keeps a [`BoardHandle`] to move
//! pieces and inspect what the manager sent to the device.

use std::sync::{Arc, Mutex, MutexGuard};

use shakmaty::Board;

use board_core::{encode_placement, BoardSnapshot, LedFrame};

use crate::driver::BoardDriver;
use crate::error::DriverError;

#[derive(Default)]
struct MockState {
    snapshot: Option<BoardSnapshot>,
    frames: Vec<LedFrame>,
    beeps: usize,
    connected: bool,
    disconnects: usize,
    reads: usize,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ScriptedBoard {
    state: Arc<Mutex<MockState>>,
}

#[derive(Clone)]
pub struct BoardHandle {
    state: Arc<Mutex<MockState>>,
}

impl ScriptedBoard {
    /// A board set up in the standard starting position.
    pub fn new() -> (Self, BoardHandle) {
        let (board, handle) = Self::blank();
        handle.set_board(&Board::default());
        (board, handle)
    }

    /// A board that never reports a position.
    pub fn blank() -> (Self, BoardHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            BoardHandle { state },
        )
    }
}

impl BoardHandle {
    pub fn set_board(&self, board: &Board) {
        lock(&self.state).snapshot = Some(encode_placement(board));
    }

    pub fn frames(&self) -> Vec<LedFrame> {
        lock(&self.state).frames.clone()
    }

    pub fn last_frame(&self) -> Option<LedFrame> {
        lock(&self.state).frames.last().copied()
    }

    pub fn beeps(&self) -> usize {
        lock(&self.state).beeps
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn disconnects(&self) -> usize {
        lock(&self.state).disconnects
    }

    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}

impl BoardDriver for ScriptedBoard {
    async fn connect(&mut self) -> Result<(), DriverError> {
        lock(&self.state).connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    async fn read_snapshot(&mut self) -> Result<Option<BoardSnapshot>, DriverError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(DriverError::NotConnected);
        }
        state.reads += 1;
        Ok(state.snapshot)
    }

    async fn write_leds(&mut self, frame: LedFrame) -> Result<(), DriverError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(DriverError::NotConnected);
        }
        state.frames.push(frame);
        Ok(())
    }

    async fn beep(&mut self) -> Result<(), DriverError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(DriverError::NotConnected);
        }
        state.beeps += 1;
        Ok(())
    }
}
