//! Account-level scenarios: which games get a session, and shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use board_link::mock::ScriptedBoard;
use board_link::BoardSyncManager;
use common::*;
use lichess_link::mock::MockService;
use lichess_link::service::OngoingGame;
use lichess_link::{IncomingEvent, LichessError, OrchestratorConfig, SessionOrchestrator};

fn config(play_correspondence: bool) -> OrchestratorConfig {
    OrchestratorConfig {
        play_correspondence,
        poll_delay: Duration::from_millis(10),
        rate_limit_delay: Duration::from_millis(10),
        retire_timeout: Duration::from_millis(200),
        session: fast_session(Duration::from_millis(10)),
    }
}

fn orchestrator(
    service: &Arc<MockService>,
    manager: &Arc<BoardSyncManager<ScriptedBoard>>,
    play_correspondence: bool,
) -> SessionOrchestrator<MockService, ScriptedBoard> {
    SessionOrchestrator::new(
        service.clone(),
        manager.clone(),
        Arc::new(RecordingClock::default()),
        config(play_correspondence),
    )
}

fn game_start(game_id: &str, speed: Option<&str>) -> IncomingEvent {
    let speed = speed
        .map(|s| format!(r#","speed":"{s}""#))
        .unwrap_or_default();
    serde_json::from_str(&format!(
        r#"{{"type":"gameStart","game":{{"gameId":"{game_id}","color":"white","isMyTurn":true,"hasMoved":false{speed}}}}}"#
    ))
    .unwrap()
}

#[tokio::test]
async fn test_game_start_opens_session() {
    let service = Arc::new(MockService::new());
    let feed = service.game_feed("g1");
    feed.push_json(&game_full("g1", ""));
    let (manager, _handle) = connected_board().await;
    let mut orch = orchestrator(&service, &manager, false);

    orch.handle_incoming(game_start("g1", Some("blitz"))).await;
    assert_eq!(orch.active_game(), Some("g1"));
    eventually("session start", || {
        let manager = manager.clone();
        async move { manager.signals().is_started() }
    })
    .await;

    // Repeated gameStart for the running game is ignored.
    orch.handle_incoming(game_start("g1", Some("blitz"))).await;
    assert_eq!(orch.active_game(), Some("g1"));

    // gameFull on the account stream forces the running game to end.
    orch.handle_incoming(serde_json::from_str(r#"{"type":"gameFull","id":"g1"}"#).unwrap())
        .await;
    assert!(manager.signals().is_game_over());
    eventually("session end", || {
        let done = orch.active_game().is_none();
        async move { done }
    })
    .await;
}

#[tokio::test]
async fn test_correspondence_skipped_unless_enabled() {
    let service = Arc::new(MockService::new());
    let (manager, _handle) = connected_board().await;

    let mut orch = orchestrator(&service, &manager, false);
    orch.handle_incoming(game_start("c1", Some("correspondence"))).await;
    assert_eq!(orch.active_game(), None);

    // Speed missing from the event: fall back to the ongoing-games list.
    service.set_ongoing(vec![OngoingGame {
        game_id: "c2".to_string(),
        speed: Some("correspondence".to_string()),
    }]);
    orch.handle_incoming(game_start("c2", None)).await;
    assert_eq!(orch.active_game(), None);

    let feed = service.game_feed("c3");
    feed.push_json(&game_full("c3", ""));
    let mut orch = orchestrator(&service, &manager, true);
    orch.handle_incoming(game_start("c3", Some("correspondence"))).await;
    assert_eq!(orch.active_game(), Some("c3"));
}

#[tokio::test]
async fn test_unknown_events_are_ignored() {
    let service = Arc::new(MockService::new());
    let (manager, _handle) = connected_board().await;
    let mut orch = orchestrator(&service, &manager, false);

    for line in [
        r#"{"type":"challenge","challenge":{"id":"ch1","challenger":{"name":"someone"},"speed":"rapid"}}"#,
        r#"{"type":"challengeDeclined","challenge":{"id":"ch1"}}"#,
        r#"{"type":"gameFinish","game":{"gameId":"old1","color":"black"}}"#,
    ] {
        orch.handle_incoming(serde_json::from_str(line).unwrap()).await;
    }
    assert_eq!(orch.active_game(), None);
    assert!(!manager.signals().is_game_over());
}

/// Kill stops the orchestrator while it waits on a quiet account stream.
#[tokio::test]
async fn test_kill_stops_orchestrator() {
    let service = Arc::new(MockService::new());
    let (manager, _handle) = connected_board().await;
    let run = tokio::spawn(orchestrator(&service, &manager, false).run());

    eventually("subscription", || {
        let service = service.clone();
        async move { service.incoming_subscriptions() >= 1 }
    })
    .await;
    manager.signals().kill();

    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("orchestrator did not stop")
        .unwrap()
        .unwrap();
}

/// A 429 on the account stream delays the next subscription by the rate-limit
/// pause plus the usual poll pause.
#[tokio::test]
async fn test_rate_limit_delays_resubscription() {
    let service = Arc::new(MockService::new());
    let feed = service.incoming_feed();
    feed.fail(LichessError::RateLimited);
    let (manager, _handle) = connected_board().await;

    let orch = SessionOrchestrator::new(
        service.clone(),
        manager.clone(),
        Arc::new(RecordingClock::default()),
        OrchestratorConfig {
            poll_delay: Duration::from_millis(50),
            rate_limit_delay: Duration::from_millis(150),
            ..config(false)
        },
    );
    let started = tokio::time::Instant::now();
    let run = tokio::spawn(orch.run());

    eventually("first subscription", || {
        let service = service.clone();
        async move { service.incoming_subscriptions() >= 1 }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.incoming_subscriptions(), 1);

    eventually("resubscription", || {
        let service = service.clone();
        async move { service.incoming_subscriptions() >= 2 }
    })
    .await;
    assert!(started.elapsed() >= Duration::from_millis(200));

    manager.signals().kill();
    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("orchestrator did not stop")
        .unwrap()
        .unwrap();
}

/// Kill during the rate-limit pause exits without waiting it out.
#[tokio::test]
async fn test_kill_during_rate_limit_pause() {
    let service = Arc::new(MockService::new());
    let feed = service.incoming_feed();
    feed.fail(LichessError::RateLimited);
    let (manager, _handle) = connected_board().await;

    let orch = SessionOrchestrator::new(
        service.clone(),
        manager.clone(),
        Arc::new(RecordingClock::default()),
        OrchestratorConfig {
            rate_limit_delay: Duration::from_secs(30),
            poll_delay: Duration::from_secs(30),
            ..config(false)
        },
    );
    let run = tokio::spawn(orch.run());

    eventually("first subscription", || {
        let service = service.clone();
        async move { service.incoming_subscriptions() >= 1 }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.signals().kill();

    tokio::time::timeout(Duration::from_millis(200), run)
        .await
        .expect("orchestrator waited out the pause")
        .unwrap()
        .unwrap();
    assert_eq!(service.incoming_subscriptions(), 1);
}
