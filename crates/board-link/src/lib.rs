//! Hardware side of the bridge: the board transport, process-wide signals
//! and the manager that keeps the physical board in sync with the game.

pub mod driver;
pub mod error;
pub mod hidraw;
pub mod signals;
pub mod sync;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use driver::BoardDriver;
pub use error::{DriverError, SyncError};
pub use hidraw::HidrawBoard;
pub use signals::GameSignals;
pub use sync::{AwaitOutcome, BoardSyncManager, SyncConfig, SyncPhase};
