//! Optional external chess clock.

use chrono::Duration;
use tracing::debug;

/// A clock display that mirrors the remote time budgets.
pub trait ChessClock: Send + Sync {
    fn update(&self, white: Duration, black: Duration);

    fn white_won(&self);

    fn black_won(&self);

    /// Drawn or aborted.
    fn game_over(&self);
}

/// Stand-in used when no clock is attached. Logs at debug level.
pub struct NoClock;

impl ChessClock for NoClock {
    fn update(&self, white: Duration, black: Duration) {
        debug!(
            white_secs = white.num_seconds(),
            black_secs = black.num_seconds(),
            "Clock update"
        );
    }

    fn white_won(&self) {}

    fn black_won(&self) {}

    fn game_over(&self) {}
}
