//! USB transport over a Linux hidraw device node (async I/O)

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use board_core::{BoardSnapshot, LedFrame};

use crate::driver::{command, BoardDriver};
use crate::error::DriverError;

/// How long a single read waits for a fresh report before falling back
/// to the last one seen. The board only reports on change.
const READ_WINDOW: Duration = Duration::from_millis(20);

/// Chessnut board attached as `/dev/hidrawN`.
pub struct HidrawBoard {
    path: PathBuf,
    // Separate handles so a pending report read never delays an LED write.
    reader: Option<File>,
    writer: Option<File>,
    last: Option<BoardSnapshot>,
}

impl HidrawBoard {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: None,
            writer: None,
            last: None,
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), DriverError> {
        let writer = self.writer.as_mut().ok_or(DriverError::NotConnected)?;
        debug!(bytes = ?bytes, "board <");
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl BoardDriver for HidrawBoard {
    async fn connect(&mut self) -> Result<(), DriverError> {
        let reader = OpenOptions::new().read(true).open(&self.path).await?;
        let writer = OpenOptions::new().write(true).open(&self.path).await?;
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.send(&command::INIT).await?;
        info!(path = %self.path.display(), "Board device opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.reader = None;
        self.writer = None;
        self.last = None;
        info!(path = %self.path.display(), "Board device closed");
        Ok(())
    }

    async fn read_snapshot(&mut self) -> Result<Option<BoardSnapshot>, DriverError> {
        let reader = self.reader.as_mut().ok_or(DriverError::NotConnected)?;
        let mut buf = [0u8; 64];

        // Drain whatever reports are queued; keep the newest.
        loop {
            match tokio::time::timeout(READ_WINDOW, reader.read(&mut buf)).await {
                Ok(Ok(0)) => return Err(DriverError::NotConnected),
                Ok(Ok(n)) => match BoardSnapshot::from_bytes(&buf[..n]) {
                    Ok(snapshot) => self.last = Some(snapshot),
                    // Not a placement report (e.g. battery status); ignore it.
                    Err(e) => debug!(error = %e, len = n, "Skipping board report"),
                },
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }

        Ok(self.last)
    }

    async fn write_leds(&mut self, frame: LedFrame) -> Result<(), DriverError> {
        self.send(&frame.encode()).await
    }

    async fn beep(&mut self) -> Result<(), DriverError> {
        self.send(&command::BEEP).await
    }
}
