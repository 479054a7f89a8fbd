#![allow(clippy::unwrap_used)]
// Integration tests for `SseConnector` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vpnpack_api::{
    ReadyState, SseConnector, SseEvent, StreamConnector, StreamEvent, StreamSubscription,
};

// ── Helpers ─────────────────────────────────────────────────────────

const EVENTS_PATH: &str = "/vpn-pack/api/events";

async fn setup() -> (MockServer, SseConnector) {
    let server = MockServer::start().await;
    let url = Url::parse(&format!("{}{EVENTS_PATH}", server.uri())).unwrap();
    let connector =
        SseConnector::new(reqwest::Client::new(), url).with_default_retry(Duration::from_millis(20));
    (server, connector)
}

fn event_stream(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

async fn next(sub: &mut StreamSubscription) -> Option<StreamEvent> {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("stream stalled")
}

fn message(event: &str, data: &str, id: Option<&str>) -> StreamEvent {
    StreamEvent::Message(SseEvent {
        event: event.into(),
        data: data.into(),
        id: id.map(String::from),
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_messages_then_reconnecting_on_eof() {
    let (server, connector) = setup().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("accept", "text/event-stream"))
        .respond_with(event_stream(
            ": hello\n\ndata: {\"backendState\":\"Running\"}\n\nevent: update-available\ndata: {\"available\":true}\n\n",
        ))
        .mount(&server)
        .await;

    let mut sub = connector.open();
    assert_eq!(next(&mut sub).await, Some(StreamEvent::Open));
    assert_eq!(
        next(&mut sub).await,
        Some(message("message", "{\"backendState\":\"Running\"}", None))
    );
    assert_eq!(
        next(&mut sub).await,
        Some(message("update-available", "{\"available\":true}", None))
    );
    assert_eq!(
        next(&mut sub).await,
        Some(StreamEvent::Error(ReadyState::Connecting))
    );
    // Transport reconnects on its own after the retry delay.
    assert_eq!(next(&mut sub).await, Some(StreamEvent::Open));
    sub.close();
}

#[tokio::test]
async fn test_reconnect_sends_last_event_id() {
    let (server, connector) = setup().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("Last-Event-ID", "7"))
        .respond_with(event_stream("data: second\n\n"))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(event_stream("retry: 10\nid: 7\ndata: first\n\n"))
        .with_priority(2)
        .mount(&server)
        .await;

    let mut sub = connector.open();
    assert_eq!(next(&mut sub).await, Some(StreamEvent::Open));
    assert_eq!(
        next(&mut sub).await,
        Some(message("message", "first", Some("7")))
    );
    assert_eq!(
        next(&mut sub).await,
        Some(StreamEvent::Error(ReadyState::Connecting))
    );
    assert_eq!(next(&mut sub).await, Some(StreamEvent::Open));
    assert_eq!(
        next(&mut sub).await,
        Some(message("message", "second", Some("7")))
    );
}

#[tokio::test]
async fn test_rejected_status_is_terminal() {
    let (server, connector) = setup().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut sub = connector.open();
    assert_eq!(
        next(&mut sub).await,
        Some(StreamEvent::Error(ReadyState::Closed))
    );
    assert_eq!(next(&mut sub).await, None);
}

#[tokio::test]
async fn test_wrong_content_type_is_terminal() {
    let (server, connector) = setup().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let mut sub = connector.open();
    assert_eq!(
        next(&mut sub).await,
        Some(StreamEvent::Error(ReadyState::Closed))
    );
    assert_eq!(next(&mut sub).await, None);
}

#[tokio::test]
async fn test_connection_refused_keeps_retrying() {
    let url = Url::parse("http://127.0.0.1:1/vpn-pack/api/events").unwrap();
    let connector =
        SseConnector::new(reqwest::Client::new(), url).with_default_retry(Duration::from_millis(5));

    let mut sub = connector.open();
    for _ in 0..2 {
        assert_eq!(
            next(&mut sub).await,
            Some(StreamEvent::Error(ReadyState::Connecting))
        );
    }

    sub.close();
    // Queued events may still drain, but the loop must stop.
    while next(&mut sub).await.is_some() {}
}
