//! NicLink for Lichess
//!
//! Plays Lichess games over the Board API on a USB Chessnut board.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use board_link::{BoardSyncManager, GameSignals, HidrawBoard, SyncError};
use lichess_link::{CliArgs, GameService, LichessClient, LinkConfig, NoClock, SessionOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("=== NicLink Lichess startup ===");
    let config = LinkConfig::load(&args)?;
    info!(?config, "Config loaded");

    let signals = GameSignals::new();
    let board = BoardSyncManager::connect(
        HidrawBoard::new(&config.board_device),
        signals.clone(),
        config.sync(),
    )
    .await
    .with_context(|| format!("connecting to board at {}", config.board_device.display()))?;
    let board = Arc::new(board);

    let client = LichessClient::new(&config.base_url, &config.token)?;
    let account = client
        .account()
        .await
        .context("cannot get Lichess account info")?;
    info!(username = %account.username, base_url = %config.base_url, "Logged in");

    let board_worker = {
        let board = board.clone();
        tokio::spawn(async move { board.run().await })
    };

    {
        let signals = signals.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                signals.kill();
            }
        });
    }

    let orchestrator = SessionOrchestrator::new(
        Arc::new(client),
        board,
        Arc::new(NoClock),
        config.orchestrator(),
    );
    if let Err(e) = orchestrator.run().await {
        error!(error = %e, "Orchestrator stopped");
        signals.kill();
    }

    match board_worker.await? {
        Ok(()) | Err(SyncError::KillRequested) => {}
        Err(e) => return Err(e).context("board worker failed"),
    }
    info!("Have a nice life");
    Ok(())
}
