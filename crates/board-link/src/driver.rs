//! The transport seam between the sync manager and a physical board.

use std::future::Future;

use board_core::{BoardSnapshot, LedFrame};

use crate::error::DriverError;

/// Device commands sent to a Chessnut board.
pub mod command {
    /// Sent once after opening the device to start position reports.
    pub const INIT: [u8; 3] = [0x21, 0x01, 0x00];
    /// 1000 Hz for 200 ms.
    pub const BEEP: [u8; 6] = [0x0B, 0x04, 0x03, 0xE8, 0x00, 0xC8];
}

/// A connected electronic board.
///
/// Implementations are owned by exactly one [`crate::BoardSyncManager`],
/// which serializes every call.
pub trait BoardDriver: Send + 'static {
    fn connect(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    fn disconnect(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Latest placement report, or `None` if the board has not reported one.
    fn read_snapshot(
        &mut self,
    ) -> impl Future<Output = Result<Option<BoardSnapshot>, DriverError>> + Send;

    /// Replace the whole LED array.
    fn write_leds(
        &mut self,
        frame: LedFrame,
    ) -> impl Future<Output = Result<(), DriverError>> + Send;

    fn beep(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;
}
