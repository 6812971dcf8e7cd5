use daydream_core::{ChatRequest, ClientConfig, DaydreamError, HistoryStore, ImageRef, Message};
use daydream_interaction::{ChatApiClient, HttpHistoryStore, ImageApiClient};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::with_api_url(server.uri())
}

#[tokio::test]
async fn memory_load_returns_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/memory"))
        .and(query_param("user_id", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ]
        })))
        .mount(&server)
        .await;

    let store = HttpHistoryStore::new(&config_for(&server)).unwrap();
    let messages = store.load("alice").await.unwrap();

    assert_eq!(messages, vec![Message::user("hi"), Message::assistant("hello")]);
}

#[tokio::test]
async fn memory_load_without_messages_is_empty_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/memory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let store = HttpHistoryStore::new(&config_for(&server)).unwrap();
    assert!(store.load("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_load_unknown_user_is_empty_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/memory"))
        .and(query_param("user_id", "ghost"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "User not found"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/memory"))
        .and(query_param("user_id", "gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = HttpHistoryStore::new(&config_for(&server)).unwrap();
    assert!(store.load("ghost").await.unwrap().is_empty());
    assert!(store.load("gone").await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_load_server_failure_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = HttpHistoryStore::new(&config_for(&server)).unwrap();
    let err = store.load("alice").await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn memory_save_posts_whole_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/memory"))
        .and(body_json(serde_json::json!({
            "user_id": "alice",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpHistoryStore::new(&config_for(&server)).unwrap();
    store.save("alice", &[Message::user("hi")]).await.unwrap();
}

#[tokio::test]
async fn chat_returns_response_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(serde_json::json!({
            "user_id": "alice",
            "message": "second"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "Sure!"})),
        )
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&config_for(&server)).unwrap();
    let request = ChatRequest::new(
        "alice",
        vec![
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("second"),
        ],
    );

    assert_eq!(client.send(&request).await.unwrap(), "Sure!");
}

#[tokio::test]
async fn chat_error_body_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "quota"})),
        )
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&config_for(&server)).unwrap();
    let err = client
        .send(&ChatRequest::new("alice", vec![Message::user("x")]))
        .await
        .unwrap_err();

    assert_eq!(err, DaydreamError::backend("quota"));
}

#[tokio::test]
async fn image_generation_normalizes_relative_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-image"))
        .and(body_json(serde_json::json!({
            "prompt": "a castle",
            "identity_image_url": "https://img.example/me.png",
            "user_id": "alice"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"imageUrl": "/static/castle.png"})),
        )
        .mount(&server)
        .await;

    let client = ImageApiClient::new(&config_for(&server)).unwrap();
    let identity = ImageRef::new("https://img.example/me.png");
    let image = client
        .generate("alice", "a castle", Some(&identity))
        .await
        .unwrap();

    assert_eq!(image.as_str(), format!("{}/static/castle.png", server.uri()));
}

#[tokio::test]
async fn image_generation_without_url_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = ImageApiClient::new(&config_for(&server)).unwrap();
    let err = client.generate("alice", "x", None).await.unwrap_err();
    assert!(matches!(err, DaydreamError::Protocol(_)));
}
