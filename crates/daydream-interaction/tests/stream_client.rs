use daydream_core::{ChatRequest, DaydreamError, ImageRef, Message};
use daydream_interaction::{
    callbacks, ChannelHandler, StreamClient, StreamEvent, StreamOutcome,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

fn client_for(server: &MockServer) -> StreamClient {
    StreamClient::with_client(
        reqwest::Client::new(),
        format!("{}/chat/stream", server.uri()),
        Duration::from_secs(5),
    )
}

fn hello_request() -> ChatRequest {
    ChatRequest::new("user-1", vec![Message::user("hello")])
}

async fn collect(mut rx: UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn streams_deltas_in_order_and_completes_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "user_id": "user-1",
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(sse("data: Hi\n\ndata:  there\n\nevent: done\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let (handler, rx) = ChannelHandler::new();
    let handle = client_for(&server).open(&hello_request(), handler).unwrap();

    let outcome = handle.join().await;
    let events = collect(rx).await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("Hi".to_string()),
            StreamEvent::Delta(" there".to_string()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn image_reference_travels_in_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .and(body_partial_json(serde_json::json!({
            "image_url": "https://img.example/me.png"
        })))
        .respond_with(sse("event: done\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let request = hello_request().with_image(Some(ImageRef::new("https://img.example/me.png")));
    let (handler, rx) = ChannelHandler::new();
    let outcome = client_for(&server).open(&request, handler).unwrap().join().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(collect(rx).await, vec![StreamEvent::Done]);
}

#[tokio::test]
async fn server_error_status_fires_single_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let (handler, rx) = ChannelHandler::new();
    let outcome = client_for(&server)
        .open(&hello_request(), handler)
        .unwrap()
        .join()
        .await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(
        collect(rx).await,
        vec![StreamEvent::Error(DaydreamError::http(500, "model overloaded"))]
    );
}

#[tokio::test]
async fn connection_refused_fires_transport_error() {
    // Bind then drop a listener so nothing accepts on the port
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = StreamClient::with_client(
        reqwest::Client::new(),
        format!("http://127.0.0.1:{}/chat/stream", port),
        Duration::from_secs(5),
    );

    let (handler, rx) = ChannelHandler::new();
    let outcome = client.open(&hello_request(), handler).unwrap().join().await;

    assert_eq!(outcome, StreamOutcome::Failed);
    let events = collect(rx).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error(e) if e.is_transport()));
}

#[tokio::test]
async fn malformed_empty_frame_does_not_break_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse("data: one\n\ndata:\n\n: keep-alive\n\ndata: two\n\nevent: done\n\n"))
        .mount(&server)
        .await;

    let (handler, rx) = ChannelHandler::new();
    client_for(&server)
        .open(&hello_request(), handler)
        .unwrap()
        .join()
        .await;

    assert_eq!(
        collect(rx).await,
        vec![
            StreamEvent::Delta("one".to_string()),
            StreamEvent::Delta("two".to_string()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn cancel_during_slow_response_fires_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse("data: late\n\nevent: done\n\n").set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let terminal = Arc::new(AtomicUsize::new(0));
    let deltas = Arc::new(AtomicUsize::new(0));
    let (t1, t2, d) = (terminal.clone(), terminal.clone(), deltas.clone());
    let handler = callbacks(
        move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        },
        move || {
            t1.fetch_add(1, Ordering::SeqCst);
        },
        move |_| {
            t2.fetch_add(1, Ordering::SeqCst);
        },
    );

    let handle = client_for(&server).open(&hello_request(), handler).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();
    handle.cancel();

    assert_eq!(handle.join().await, StreamOutcome::Cancelled);
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
    assert_eq!(deltas.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn body_without_done_marker_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse("data: partial\n\ndata: cut"))
        .mount(&server)
        .await;

    let (handler, rx) = ChannelHandler::new();
    let outcome = client_for(&server)
        .open(&hello_request(), handler)
        .unwrap()
        .join()
        .await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(
        collect(rx).await,
        vec![StreamEvent::Delta("partial".to_string()), StreamEvent::Done]
    );
}
