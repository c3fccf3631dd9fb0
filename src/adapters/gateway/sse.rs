//! Server-sent-event decoding for the operation stream.
//!
//! Turns a chunked response body into `OperationRecord`s. Lines are
//! reassembled across chunk boundaries; `data:` lines accumulate until
//! a blank line dispatches the event. Control payloads (`"hello"`,
//! `"byebye"`) and comments are skipped.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;

use futures_util::{Stream, StreamExt, stream};
use tracing::warn;

use crate::ports::ledger::{LedgerError, OperationRecord, OperationStream};

struct SseState<S> {
    body: Pin<Box<S>>,
    /// Bytes of an incomplete line.
    line: Vec<u8>,
    /// `data:` payload of the event being assembled.
    data: String,
    ready: VecDeque<Result<OperationRecord, LedgerError>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.line);
                let text = String::from_utf8_lossy(&raw);
                self.handle_line(text.trim_end_matches('\r'));
            } else {
                self.line.push(byte);
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
        } else if let Some(value) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
        // `event:`, `id:`, `retry:` and `:` comments carry nothing we use.
    }

    fn dispatch(&mut self) {
        let data = std::mem::take(&mut self.data);
        if data.is_empty() {
            return;
        }
        match serde_json::from_str::<OperationRecord>(&data) {
            Ok(record) => self.ready.push_back(Ok(record)),
            Err(e) => {
                if serde_json::from_str::<String>(&data).is_err() {
                    warn!(error = %e, payload = %data, "Skipping undecodable stream event");
                }
            }
        }
    }
}

/// Decode an SSE body into a stream of operation records.
///
/// The returned stream yields a transport error and ends when the body
/// fails, and simply ends when the body closes.
pub fn operation_events<S, B, E>(body: S) -> OperationStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        line: Vec::new(),
        data: String::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.feed(chunk.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .ready
                        .push_back(Err(LedgerError::Transport(format!("stream body: {e}"))));
                }
                None => state.finished = true,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILL: &str = r#"{"id":"101","paging_token":"101","type":"manage_buy_offer","transaction_hash":"abc","amount":"0.0000000","offer_id":"77","buying":{"type":"credit","code":"BLND","issuer":"GBLND"},"selling":{"type":"credit","code":"AQUA","issuer":"GAQUA"}}"#;

    fn chunks(parts: Vec<String>) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send {
        stream::iter(parts.into_iter().map(|p| Ok(p.into_bytes())))
    }

    #[tokio::test]
    async fn test_decodes_records_split_across_chunks() {
        let body = format!("retry: 1000\ndata: \"hello\"\n\n: keepalive\nid: 101\ndata: {FILL}\n\n");
        let (left, right) = body.split_at(body.len() / 2);
        let records: Vec<_> = operation_events(chunks(vec![left.to_string(), right.to_string()]))
            .collect()
            .await;

        assert_eq!(records.len(), 1);
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.paging_token, "101");
        assert_eq!(record.kind, "manage_buy_offer");
        assert_eq!(record.offer_id.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let body = format!("data: {FILL}\r\n\r\n");
        let records: Vec<_> = operation_events(chunks(vec![body])).collect().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_ok());
    }

    #[tokio::test]
    async fn test_body_error_ends_stream_with_transport_error() {
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(format!("data: {FILL}\n\n").into_bytes()),
            Err(std::io::Error::other("connection reset")),
            Ok(format!("data: {FILL}\n\n").into_bytes()),
        ];
        let records: Vec<_> = operation_events(stream::iter(parts)).collect().await;

        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(records[1], Err(LedgerError::Transport(_))));
    }
}
