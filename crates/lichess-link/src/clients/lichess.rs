use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use board_core::BoardMove;

use crate::error::LichessError;
use crate::events::{GameEvent, IncomingEvent};
use crate::service::{Account, EventStream, GameService, OngoingGame};

/// Body text Lichess returns when a move arrives out of turn or after the end.
const NOT_YOUR_TURN: &str = "Not your turn, or game already over";

/// Board API client authenticated with a personal token.
pub struct LichessClient {
    client: Client,
    base_url: String,
}

impl LichessClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, LichessError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| LichessError::InvalidToken)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        // No overall timeout: event streams stay open for the whole game.
        let client = Client::builder()
            .user_agent("NicLink/1.0")
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn open_stream<T>(&self, path: &str) -> Result<EventStream<T>, LichessError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let resp = self
            .client
            .get(self.url(path))
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await?;
        let resp = check(resp).await?;
        debug!(path, "Stream opened");
        Ok(ndjson_stream(resp.bytes_stream()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LichessError> {
        let resp = self.client.get(self.url(path)).send().await?;
        let text = check(resp).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Map a non-success response to a classified error.
async fn check(resp: Response) -> Result<Response, LichessError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LichessError::RateLimited);
    }

    let body = resp.text().await.unwrap_or_default();
    if body.contains(NOT_YOUR_TURN) {
        Err(LichessError::NotYourTurn(body))
    } else {
        Err(LichessError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

struct LineBuffer<S> {
    inner: S,
    buf: Vec<u8>,
    done: bool,
}

/// Split a byte stream into newline-delimited JSON values. Blank keep-alive
/// lines are skipped. A transport error ends the stream after being yielded.
pub fn ndjson_stream<T, S, B, E>(bytes: S) -> EventStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LichessError> + Send + 'static,
{
    let state = LineBuffer {
        inner: Box::pin(bytes),
        buf: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(pos) = st.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buf.drain(..=pos).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let item: Result<T, LichessError> =
                    serde_json::from_slice(&line).map_err(LichessError::from);
                return Some((item, st));
            }

            if st.done {
                if st.buf.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
                let line = std::mem::take(&mut st.buf);
                let item: Result<T, LichessError> =
                    serde_json::from_slice(&line).map_err(LichessError::from);
                return Some((item, st));
            }

            match st.inner.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    st.buf.clear();
                    return Some((Err(e.into()), st));
                }
                None => st.done = true,
            }
        }
    })
    .boxed()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Playing {
    now_playing: Vec<OngoingGame>,
}

impl GameService for LichessClient {
    async fn stream_incoming_events(&self) -> Result<EventStream<IncomingEvent>, LichessError> {
        self.open_stream("/api/stream/event").await
    }

    async fn stream_game(&self, game_id: &str) -> Result<EventStream<GameEvent>, LichessError> {
        self.open_stream(&format!("/api/board/game/stream/{game_id}"))
            .await
    }

    async fn make_move(&self, game_id: &str, mv: &BoardMove) -> Result<(), LichessError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/board/game/{game_id}/move/{mv}")))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn ongoing_games(&self) -> Result<Vec<OngoingGame>, LichessError> {
        let playing: Playing = self.get_json("/api/account/playing").await?;
        Ok(playing.now_playing)
    }

    async fn account(&self) -> Result<Account, LichessError> {
        self.get_json("/api/account").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<&'static [u8], LichessError>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.as_bytes()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let stream = ndjson_stream::<Value, _, _, _>(chunks(&[
            "{\"type\":\"gam",
            "eState\",\"moves\":\"e2e4\"}\n\n",
            "\n{\"type\":\"chatLine\"}\n{\"a\":1}",
        ]));
        let items: Vec<Value> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["moves"], "e2e4");
        assert_eq!(items[1]["type"], "chatLine");
        assert_eq!(items[2]["a"], 1);
    }

    #[tokio::test]
    async fn test_bad_line_is_an_item_error() {
        let stream = ndjson_stream::<Value, _, _, _>(chunks(&["not json\n{\"ok\":true}\n"]));
        let items: Vec<Result<Value, LichessError>> = stream.collect().await;
        assert!(matches!(items[0], Err(LichessError::Json(_))));
        assert_eq!(items[1].as_ref().unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<&'static [u8], LichessError>> = vec![
            Ok(&b"{\"n\":1}\n{\"n\":"[..]),
            Err(LichessError::RateLimited),
            Ok(&b"2}\n"[..]),
        ];
        let items: Vec<Result<Value, LichessError>> =
            ndjson_stream(stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(LichessError::RateLimited)));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = LichessClient::new("https://lichess.dev/", "lip_token").unwrap();
        assert_eq!(client.url("/api/account"), "https://lichess.dev/api/account");
        assert!(matches!(
            LichessClient::new("https://lichess.org", "bad\ntoken"),
            Err(LichessError::InvalidToken)
        ));
    }
}
