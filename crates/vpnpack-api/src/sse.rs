//! Server-sent event stream with auto-reconnect.
//!
//! [`SseConnector`] opens `GET /vpn-pack/api/events` and feeds the response
//! body through an incremental [`SseDecoder`]. Events are delivered on a
//! [`StreamSubscription`] as [`StreamEvent`]s, mirroring the browser
//! `EventSource` lifecycle: `Open`, then messages, then `Error` with the
//! ready state the transport moved to.
//!
//! Transport failures and clean end-of-stream are recoverable: the
//! connector reports `Error(Connecting)`, waits the server-advertised retry
//! delay and reconnects with `Last-Event-ID`. A non-200 answer or a wrong
//! content type is terminal: `Error(Closed)` and the loop ends.
//!
//! # Example
//!
//! ```rust,ignore
//! use vpnpack_api::sse::{SseConnector, StreamConnector, StreamEvent};
//!
//! let connector = SseConnector::for_client(&api)?;
//! let mut sub = connector.open();
//! while let Some(event) = sub.next().await {
//!     if let StreamEvent::Message(msg) = event {
//!         println!("{}: {}", msg.event, msg.data);
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::ApiClient;
use crate::error::Error;

// ── Constants ────────────────────────────────────────────────────────

/// Reconnect delay used until the server sends a `retry:` field.
pub const DEFAULT_RETRY: Duration = Duration::from_millis(3000);

const EVENTS_PATH: &str = "events";
const EVENT_STREAM_MIME: &str = "text/event-stream";
const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";
const DEFAULT_EVENT_TYPE: &str = "message";
const SUBSCRIPTION_CAPACITY: usize = 64;
const BOM: &[u8] = b"\xEF\xBB\xBF";

// ── Event types ──────────────────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `"message"` unless the server sent an `event:` field.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream at dispatch time.
    pub id: Option<String>,
}

/// Where the transport went after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// The transport will reconnect on its own.
    Connecting,
    /// Terminal. Nothing more will arrive on this subscription.
    Closed,
}

/// Lifecycle notifications delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Open,
    Message(SseEvent),
    Error(ReadyState),
}

// ── Decoder ──────────────────────────────────────────────────────────

/// Incremental `text/event-stream` decoder.
///
/// Accepts arbitrary byte chunks. Partial lines are buffered until their
/// terminator arrives, so multi-byte characters split across chunks decode
/// correctly. A CR at the very end of a chunk is remembered so a following
/// LF is not mistaken for an empty line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    pending_cr: bool,
    bom_checked: bool,
    data: String,
    event_type: String,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if chunk.is_empty() {
            return events;
        }

        let chunk = match chunk.split_first() {
            Some((b'\n', rest)) if self.pending_cr => rest,
            _ => chunk,
        };
        self.pending_cr = false;
        self.buf.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                return events;
            }
            if self.buf.starts_with(BOM) {
                self.buf.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut start = 0;
        let mut i = 0;
        while i < self.buf.len() {
            let next = match self.buf[i] {
                b'\n' => i + 1,
                b'\r' => match self.buf.get(i + 1) {
                    Some(b'\n') => i + 2,
                    Some(_) => i + 1,
                    None => {
                        self.pending_cr = true;
                        i + 1
                    }
                },
                _ => {
                    i += 1;
                    continue;
                }
            };
            let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
            self.process_line(&line, &mut events);
            start = next;
            i = next;
        }
        self.buf.drain(..start);

        events
    }

    /// Last `id:` value seen, sent back as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnect delay advertised by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Drop partial state before reading a new response body. The last
    /// event id and retry delay survive reconnects.
    pub fn reset_stream(&mut self) {
        self.buf.clear();
        self.pending_cr = false;
        self.bom_checked = false;
        self.data.clear();
        self.event_type.clear();
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => value.clone_into(&mut self.event_type),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_owned()),
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        let event = if event_type.is_empty() {
            DEFAULT_EVENT_TYPE.to_owned()
        } else {
            event_type
        };
        events.push(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
        });
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Receiving end of an open event stream.
///
/// Dropping the subscription, or calling [`close`](Self::close), stops the
/// transport behind it.
#[derive(Debug)]
pub struct StreamSubscription {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamSubscription {
    pub fn new(events: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next lifecycle event, or `None` once the transport has stopped.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop the transport. Already-queued events can still be drained.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the transport when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Something that can open a push stream.
///
/// Implemented by [`SseConnector`]; the status store only depends on this
/// trait so it can be driven by scripted streams in tests.
pub trait StreamConnector: Send + Sync {
    /// Open a new stream. Must be called within a Tokio runtime.
    fn open(&self) -> StreamSubscription;
}

// ── SseConnector ─────────────────────────────────────────────────────

/// reqwest-backed [`StreamConnector`] for the manager's event endpoint.
#[derive(Debug, Clone)]
pub struct SseConnector {
    http: reqwest::Client,
    url: Url,
    default_retry: Duration,
}

impl SseConnector {
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self {
            http,
            url,
            default_retry: DEFAULT_RETRY,
        }
    }

    /// Connector sharing the gateway's HTTP client (TLS settings, cookies).
    pub fn for_client(api: &ApiClient) -> Result<Self, Error> {
        Ok(Self::new(api.http().clone(), api.api_url(EVENTS_PATH)?))
    }

    /// Reconnect delay used until the server sends `retry:`.
    pub fn with_default_retry(mut self, retry: Duration) -> Self {
        self.default_retry = retry;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl StreamConnector for SseConnector {
    fn open(&self) -> StreamSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let cancel = CancellationToken::new();
        tokio::spawn(stream_loop(
            self.http.clone(),
            self.url.clone(),
            self.default_retry,
            tx,
            cancel.clone(),
        ));
        StreamSubscription::new(rx, cancel)
    }
}

// ── Background loop ──────────────────────────────────────────────────

async fn stream_loop(
    http: reqwest::Client,
    url: Url,
    default_retry: Duration,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut decoder = SseDecoder::new();

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&http, &url, &mut decoder, &tx) => result,
        };

        match result {
            Ok(()) => info!("event stream ended, reconnecting"),
            Err(e @ (Error::StreamRejected { .. } | Error::StreamContentType(_))) => {
                warn!(error = %e, "event stream refused, giving up");
                let _ = tx.send(StreamEvent::Error(ReadyState::Closed)).await;
                break;
            }
            Err(e) => warn!(error = %e, "event stream error"),
        }

        if tx
            .send(StreamEvent::Error(ReadyState::Connecting))
            .await
            .is_err()
        {
            break;
        }

        let delay = decoder.retry().unwrap_or(default_retry);
        decoder.reset_stream();
        debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Connect once and pump the body through the decoder.
///
/// Returns `Ok(())` when the body ends cleanly or the subscriber went away.
async fn connect_and_read(
    http: &reqwest::Client,
    url: &Url,
    decoder: &mut SseDecoder,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<(), Error> {
    let mut request = http
        .get(url.clone())
        .header(ACCEPT, EVENT_STREAM_MIME)
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = decoder.last_event_id() {
        request = request.header(LAST_EVENT_ID_HEADER, id);
    }

    debug!("GET {}", url);
    let resp = request.send().await?;

    let status = resp.status();
    if status != StatusCode::OK {
        return Err(Error::StreamRejected {
            status: status.as_u16(),
        });
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type
        .to_ascii_lowercase()
        .starts_with(EVENT_STREAM_MIME)
    {
        return Err(Error::StreamContentType(content_type.to_owned()));
    }

    info!("event stream connected");
    if tx.send(StreamEvent::Open).await.is_err() {
        return Ok(());
    }

    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            if tx.send(StreamEvent::Message(event)).await.is_err() {
                return Ok(());
            }
        }
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(data: &str) -> SseEvent {
        SseEvent {
            event: "message".into(),
            data: data.into(),
            id: None,
        }
    }

    #[test]
    fn decodes_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"connected\":true}\n\n");
        assert_eq!(events, vec![message("{\"connected\":true}")]);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: first\ndata:second\ndata\n\n");
        assert_eq!(events, vec![message("first\nsecond\n")]);
    }

    #[test]
    fn handles_crlf_and_cr_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\r\n\r\ndata: b\r\rdata: c\n\n");
        assert_eq!(events, vec![message("a"), message("b"), message("c")]);
    }

    #[test]
    fn cr_split_from_lf_across_chunks_is_one_terminator() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: a\r").is_empty());
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec![message("a")]);
    }

    #[test]
    fn ignores_comments_and_unknown_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\nfoo: bar\ndata: x\n\n: ping\n\n");
        assert_eq!(events, vec![message("x")]);
    }

    #[test]
    fn buffers_partial_lines_and_split_utf8() {
        let mut decoder = SseDecoder::new();
        let payload = "data: héllo\n\n".as_bytes();
        let split = payload
            .iter()
            .position(|&b| b == 0xC3)
            .map_or(1, |p| p + 1);
        assert!(decoder.feed(&payload[..split]).is_empty());
        assert_eq!(decoder.feed(&payload[split..]), vec![message("héllo")]);
    }

    #[test]
    fn named_events_reset_after_dispatch() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"event: update-available\ndata: {\"version\":\"1.2.0\"}\n\ndata: {}\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "update-available");
        assert_eq!(events[1].event, "message");
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: update-available\n\n").is_empty());
        assert_eq!(decoder.feed(b"data: y\n\n"), vec![message("y")]);
    }

    #[test]
    fn tracks_id_and_retry() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"retry: 1500\nid: 42\ndata: z\n\nretry: soon\n");
        assert_eq!(events[0].id.as_deref(), Some("42"));
        assert_eq!(decoder.last_event_id(), Some("42"));
        assert_eq!(decoder.retry(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn strips_leading_bom_once() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\xEF\xBB").is_empty());
        assert_eq!(decoder.feed(b"\xBFdata: a\n\n"), vec![message("a")]);
    }

    #[test]
    fn reset_keeps_last_event_id() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"id: 7\ndata: partial");
        decoder.reset_stream();
        assert_eq!(decoder.last_event_id(), Some("7"));
        let events = decoder.feed(b"data: fresh\n\n");
        assert_eq!(events[0].data, "fresh");
    }

    #[tokio::test]
    async fn dropping_subscription_cancels_transport() {
        let (_tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let sub = StreamSubscription::new(rx, cancel.clone());
        assert!(!cancel.is_cancelled());
        drop(sub);
        assert!(cancel.is_cancelled());
    }
}
