//! NDJSON events from the Lichess Board API streams.

use chrono::Duration;
use serde::Deserialize;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color};

use board_core::{GameEnd, Termination};

use crate::error::SessionError;

/// Account-wide stream (`/api/stream/event`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncomingEvent {
    Challenge {
        challenge: ChallengeInfo,
    },
    GameStart {
        game: GameStartInfo,
    },
    GameFinish {
        game: GameStartInfo,
    },
    GameFull {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeInfo {
    pub id: String,
    #[serde(default)]
    pub challenger: Option<Player>,
    #[serde(default)]
    pub speed: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartInfo {
    pub game_id: String,
    /// "white" or "black"
    pub color: String,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub is_my_turn: bool,
    #[serde(default)]
    pub has_moved: bool,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub variant: Option<Variant>,
}

impl GameStartInfo {
    pub fn my_color(&self) -> Color {
        if self.color == "black" {
            Color::Black
        } else {
            Color::White
        }
    }

    /// `None` if the event does not say.
    pub fn is_correspondence(&self) -> Option<bool> {
        self.speed.as_deref().map(|s| s == "correspondence")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variant {
    pub key: String,
}

/// Per-game stream (`/api/board/game/stream/{id}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    GameFull(GameFull),
    GameState(GameState),
    ChatLine(ChatLine),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFull {
    pub id: String,
    #[serde(default)]
    pub initial_fen: Option<String>,
    #[serde(default)]
    pub variant: Option<Variant>,
    pub state: GameState,
}

impl GameFull {
    pub fn castling_mode(&self) -> CastlingMode {
        match self.variant.as_ref().map(|v| v.key.as_str()) {
            Some("chess960") => CastlingMode::Chess960,
            _ => CastlingMode::Standard,
        }
    }

    /// Position the move list is played from.
    pub fn start_position(&self) -> Result<Chess, SessionError> {
        match self.initial_fen.as_deref() {
            None | Some("") | Some("startpos") => Ok(Chess::default()),
            Some(fen) => {
                let parsed: Fen = fen
                    .parse()
                    .map_err(|e| SessionError::BadPosition(format!("{fen}: {e}")))?;
                parsed
                    .into_position(self.castling_mode())
                    .map_err(|e| SessionError::BadPosition(format!("{fen}: {e}")))
            }
        }
    }
}

/// Status values for a game that is still being played.
const ONGOING: [&str; 2] = ["created", "started"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub moves: String,
    /// Remaining clock time in milliseconds.
    #[serde(default)]
    pub wtime: u64,
    #[serde(default)]
    pub btime: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub winner: Option<String>,
}

impl GameState {
    pub fn white_time(&self) -> Duration {
        Duration::milliseconds(self.wtime.min(i64::MAX as u64) as i64)
    }

    pub fn black_time(&self) -> Duration {
        Duration::milliseconds(self.btime.min(i64::MAX as u64) as i64)
    }

    /// Result announced by the server, if it reports the game as finished.
    pub fn remote_end(&self) -> Option<GameEnd> {
        let winner = match self.winner.as_deref() {
            Some("white") => Some(Color::White),
            Some("black") => Some(Color::Black),
            _ => None,
        };
        let finished = !self.status.is_empty() && !ONGOING.contains(&self.status.as_str());
        if !finished && winner.is_none() {
            return None;
        }

        let status = if self.status.is_empty() {
            "unknownFinish".to_string()
        } else {
            self.status.clone()
        };
        Some(GameEnd {
            winner,
            reason: Termination::Remote(status),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatLine {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub room: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::Position;

    #[test]
    fn test_parse_game_start() {
        let line = r#"{"type":"gameStart","game":{"gameId":"abcd1234","fullId":"abcd1234wxyz","color":"black","fen":"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1","hasMoved":false,"isMyTurn":false,"speed":"correspondence","variant":{"key":"standard","name":"Standard"},"id":"abcd1234"}}"#;
        let IncomingEvent::GameStart { game } = serde_json::from_str(line).unwrap() else {
            panic!("expected gameStart");
        };
        assert_eq!(game.game_id, "abcd1234");
        assert_eq!(game.my_color(), Color::Black);
        assert_eq!(game.is_correspondence(), Some(true));
    }

    #[test]
    fn test_unknown_incoming_event() {
        let line = r#"{"type":"challengeDeclined","challenge":{"id":"x"}}"#;
        assert!(matches!(
            serde_json::from_str::<IncomingEvent>(line).unwrap(),
            IncomingEvent::Unknown
        ));
    }

    #[test]
    fn test_parse_game_full_chess960() {
        let line = r#"{"type":"gameFull","id":"g1","variant":{"key":"chess960"},"initialFen":"bqnbrkrn/pppppppp/8/8/8/8/PPPPPPPP/BQNBRKRN w KQkq - 0 1","state":{"type":"gameState","moves":"e2e4","wtime":60000,"btime":59000,"status":"started"}}"#;
        let GameEvent::GameFull(full) = serde_json::from_str(line).unwrap() else {
            panic!("expected gameFull");
        };
        assert_eq!(full.castling_mode(), CastlingMode::Chess960);
        assert!(full.start_position().is_ok());
        assert_eq!(full.state.moves, "e2e4");
        assert_eq!(full.state.black_time(), Duration::seconds(59));
        assert_eq!(full.state.remote_end(), None);
    }

    #[test]
    fn test_startpos_and_bad_fen() {
        let mut full: GameFull = serde_json::from_str(
            r#"{"id":"g2","initialFen":"startpos","state":{"moves":"","status":"started"}}"#,
        )
        .unwrap();
        assert_eq!(full.start_position().unwrap().board(), Chess::default().board());

        full.initial_fen = Some("not a fen".into());
        assert!(matches!(
            full.start_position(),
            Err(SessionError::BadPosition(_))
        ));
    }

    #[test]
    fn test_remote_end() {
        let state: GameState = serde_json::from_str(
            r#"{"type":"gameState","moves":"e2e4","wtime":1,"btime":1,"status":"resign","winner":"black"}"#,
        )
        .unwrap();
        assert_eq!(
            state.remote_end(),
            Some(GameEnd::decisive(
                Color::Black,
                Termination::Remote("resign".into())
            ))
        );

        let draw: GameState =
            serde_json::from_str(r#"{"moves":"","status":"draw"}"#).unwrap();
        assert_eq!(draw.remote_end().unwrap().winner, None);
    }

    #[test]
    fn test_chat_and_other_events() {
        let chat = r#"{"type":"chatLine","username":"opponent","text":"gl hf","room":"player"}"#;
        assert!(matches!(
            serde_json::from_str::<GameEvent>(chat).unwrap(),
            GameEvent::ChatLine(_)
        ));
        let gone = r#"{"type":"opponentGone","gone":true}"#;
        assert!(matches!(
            serde_json::from_str::<GameEvent>(gone).unwrap(),
            GameEvent::Other
        ));
    }
}
