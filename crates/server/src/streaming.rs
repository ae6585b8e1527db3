//! Raw SSE relay (§4.I). Upstream bytes are split on line boundaries and
//! forwarded verbatim — no JSON re-parsing, no event reconstruction, no
//! buffering beyond the minimum needed to find the next `\n`.

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use orp_core::error::ProxyError;
use serde_json::Value;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use crate::AppState;

const DONE_LINE: &[u8] = b"data: [DONE]\n\n";
/// Idle watchdog for the streaming relay (§5): an upstream that goes
/// silent mid-stream must not hang the relay or the client connection
/// forever.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn stream_chat_completions(
    state: AppState,
    api_key: String,
    body: Value,
) -> Result<Response<Body>, ProxyError> {
    let upstream = state.upstream.chat_completions_stream(&api_key, &body).await?;

    if !upstream.status().is_success() {
        let status = upstream.status().as_u16();
        let text = upstream.text().await.unwrap_or_default();
        return Ok(error_sse_response(status, text));
    }

    let byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>> =
        Box::pin(upstream.bytes_stream());

    let relay = RelayState {
        inner: byte_stream,
        buffer: BytesMut::new(),
        pending: VecDeque::new(),
        seen_done: false,
        eof_reached: false,
    };

    let line_stream = futures::stream::unfold(relay, next_chunk);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(line_stream))
        .map_err(|e| ProxyError::Internal(e.to_string()))?;

    Ok(response)
}

struct RelayState {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: BytesMut,
    /// Chunks queued for emission that don't come directly off the wire:
    /// the final partial line at EOF, and the synthetic `[DONE]` sentinel.
    pending: VecDeque<Bytes>,
    seen_done: bool,
    eof_reached: bool,
}

async fn next_chunk(mut st: RelayState) -> Option<(Result<Bytes, io::Error>, RelayState)> {
    loop {
        if let Some(chunk) = st.pending.pop_front() {
            return Some((Ok(chunk), st));
        }
        if st.seen_done || (st.eof_reached && st.buffer.is_empty()) {
            return None;
        }

        if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
            let line = st.buffer.split_to(pos + 1).freeze();
            if is_done_line(&line) {
                st.seen_done = true;
            }
            return Some((Ok(line), st));
        }

        if st.eof_reached {
            let remainder = std::mem::take(&mut st.buffer).freeze();
            if !remainder.is_empty() {
                st.pending.push_back(remainder);
            }
            if !st.seen_done {
                st.pending.push_back(Bytes::from_static(DONE_LINE));
                st.seen_done = true;
            }
            continue;
        }

        match tokio::time::timeout(IDLE_TIMEOUT, st.inner.next()).await {
            Ok(Some(Ok(chunk))) => st.buffer.extend_from_slice(&chunk),
            Ok(Some(Err(e))) => return Some((Err(io::Error::other(e.to_string())), st)),
            Ok(None) => st.eof_reached = true,
            Err(_) => {
                tracing::warn!("streaming relay idle watchdog expired, closing stream");
                st.pending.push_back(idle_timeout_event());
                st.pending.push_back(Bytes::from_static(DONE_LINE));
                st.seen_done = true;
            }
        }
    }
}

fn idle_timeout_event() -> Bytes {
    let event = serde_json::json!({
        "error": {
            "message": "upstream went idle mid-stream",
            "type": "timeout_error",
            "code": "idle_timeout",
        }
    });
    Bytes::from(format!("data: {event}\n\n"))
}

fn is_done_line(line: &[u8]) -> bool {
    let trimmed = line
        .strip_suffix(b"\n")
        .unwrap_or(line)
        .strip_suffix(b"\r")
        .unwrap_or(line);
    trimmed == b"data: [DONE]"
}

fn error_sse_response(status: u16, upstream_body: String) -> Response<Body> {
    let message = serde_json::from_str::<Value>(&upstream_body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.get("message")).cloned())
        .and_then(|m| m.as_str().map(str::to_string))
        .unwrap_or(upstream_body);

    let event = serde_json::json!({
        "error": {
            "message": message,
            "type": "upstream_error",
            "code": status,
        }
    });
    let chunk = format!("data: {event}\n\n");

    let body_stream = futures::stream::iter(vec![
        Ok::<Bytes, io::Error>(Bytes::from(chunk)),
        Ok(Bytes::from_static(DONE_LINE)),
    ]);

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", HeaderValue::from_static("text/event-stream"))
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(body_stream))
        .expect("static headers are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_line_detection_tolerates_crlf() {
        assert!(is_done_line(b"data: [DONE]\n"));
        assert!(is_done_line(b"data: [DONE]\r\n"));
        assert!(!is_done_line(b"data: {\"x\":1}\n"));
    }

    #[tokio::test]
    async fn relay_forwards_lines_and_appends_done_once() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n\n")),
            Ok(Bytes::from_static(b"data: {\"b\":2}\n\n")),
        ];
        let inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>> =
            Box::pin(futures::stream::iter(chunks));

        let state = RelayState {
            inner,
            buffer: BytesMut::new(),
            pending: VecDeque::new(),
            seen_done: false,
            eof_reached: false,
        };

        let out: Vec<Bytes> = futures::stream::unfold(state, next_chunk)
            .map(|r| r.unwrap())
            .collect()
            .await;

        let joined: Vec<u8> = out.iter().flat_map(|b| b.to_vec()).collect();
        let joined = String::from_utf8(joined).unwrap();
        assert!(joined.contains("\"a\":1"));
        assert!(joined.contains("\"b\":2"));
        assert_eq!(joined.matches("[DONE]").count(), 1);
        assert!(joined.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn relay_closes_with_idle_timeout_event_when_upstream_goes_silent() {
        let inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>> =
            Box::pin(futures::stream::pending());

        let state = RelayState {
            inner,
            buffer: BytesMut::new(),
            pending: VecDeque::new(),
            seen_done: false,
            eof_reached: false,
        };

        let mut stream = Box::pin(futures::stream::unfold(state, next_chunk));
        tokio::time::advance(IDLE_TIMEOUT + Duration::from_secs(1)).await;

        let first = stream.next().await.unwrap().unwrap();
        assert!(String::from_utf8(first.to_vec()).unwrap().contains("idle_timeout"));

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.as_ref(), DONE_LINE);

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn relay_stops_at_upstream_done_without_duplicating() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from_static(
            b"data: {\"a\":1}\n\ndata: [DONE]\n\nextra-after-done\n",
        ))];
        let inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>> =
            Box::pin(futures::stream::iter(chunks));

        let state = RelayState {
            inner,
            buffer: BytesMut::new(),
            pending: VecDeque::new(),
            seen_done: false,
            eof_reached: false,
        };

        let out: Vec<Bytes> = futures::stream::unfold(state, next_chunk)
            .map(|r| r.unwrap())
            .collect()
            .await;
        let joined: Vec<u8> = out.iter().flat_map(|b| b.to_vec()).collect();
        let joined = String::from_utf8(joined).unwrap();
        assert_eq!(joined.matches("[DONE]").count(), 1);
        assert!(!joined.contains("extra-after-done"));
    }
}
