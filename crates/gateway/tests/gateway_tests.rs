//! Router-level tests: handshake rejections answered over plain HTTP and full
//! WebSocket sessions against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;
use tuber_chats::{
    ChatEvent, ChatRelay, InMemoryBroadcast, InMemoryRoomLog, ParticipantId, RoomLog,
};
use tuber_config::{AppConfig, AuthConfig};
use tuber_gateway::{create_router, Claims, GatewayState};
use uuid::Uuid;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "gateway-test-secret";

struct TestApp {
    router: Router,
    log: Arc<InMemoryRoomLog>,
    broadcast: Arc<InMemoryBroadcast>,
}

fn test_app(allow_anonymous: bool) -> TestApp {
    let mut config = AppConfig::default();
    config.chat.allow_anonymous = allow_anonymous;
    config.auth = AuthConfig {
        jwt_secret: SECRET.to_string(),
        issuer: "tuber".to_string(),
    };

    let log = Arc::new(InMemoryRoomLog::new(Some(100)));
    let broadcast = Arc::new(InMemoryBroadcast::new(64));
    let relay = ChatRelay::new(log.clone(), broadcast.clone())
        .with_shutdown_grace(Duration::from_millis(200));

    TestApp {
        router: create_router(GatewayState::from_config(&config, Arc::new(relay))),
        log,
        broadcast,
    }
}

fn token_for(id: Uuid) -> String {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
        + 3600;
    let claims = Claims {
        sub: id.to_string(),
        exp,
        iss: "tuber".to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn status_of(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, room: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws/chat?room={room}"))
        .await
        .unwrap();
    client
}

async fn wait_for_subscribers(broadcast: &InMemoryBroadcast, room: &str, count: usize) {
    let key = format!("chatroom:{room}");
    tokio::time::timeout(Duration::from_secs(2), async {
        while broadcast.subscriber_count(&key).await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never settled");
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended")
            .unwrap();
        match message {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_missing_room_is_bad_request() {
    let app = test_app(true);

    let (status, body) = status_of(app.router.clone(), "/ws/chat").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "400");

    let (status, _) = status_of(app.router, "/ws/chat?room=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_strict_identity_rejects_before_upgrade() {
    let app = test_app(false);

    let (status, _) = status_of(app.router.clone(), "/ws/chat?room=trip-1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = status_of(app.router, "/ws/chat?room=trip-1&token=not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.log.read_all("chatstream:trip-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plain_http_request_needs_upgrade() {
    let app = test_app(true);

    let (status, body) = status_of(app.router, "/ws/chat?room=trip-1").await;
    assert_eq!(status, StatusCode::UPGRADE_REQUIRED);
    assert!(body["message"].as_str().unwrap().starts_with("Handshake failed"));
}

#[tokio::test]
async fn test_health_reports_identity_mode() {
    let (status, body) = status_of(test_app(true).router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["anonymous_access"], true);

    let (_, body) = status_of(test_app(false).router, "/health").await;
    assert_eq!(body["anonymous_access"], false);
}

#[tokio::test]
async fn test_two_participants_share_a_room() {
    let app = test_app(true);
    let addr = serve(app.router.clone()).await;

    let mut u1 = connect(addr, "trip-1").await;
    let mut u2 = connect(addr, "trip-1").await;
    wait_for_subscribers(&app.broadcast, "trip-1", 2).await;

    u1.send(Message::Text("hello".into())).await.unwrap();
    assert_eq!(next_text(&mut u1).await, "hello");
    assert_eq!(next_text(&mut u2).await, "hello");

    u2.close(None).await.unwrap();
    wait_for_subscribers(&app.broadcast, "trip-1", 1).await;

    u1.send(Message::Text("still here".into())).await.unwrap();
    assert_eq!(next_text(&mut u1).await, "still here");

    let history = app.log.read_all("chatstream:trip-1").await.unwrap();
    let payloads: Vec<_> = history.iter().map(|event| event.payload.clone()).collect();
    assert_eq!(payloads, vec!["hello".as_bytes(), "still here".as_bytes()]);
}

#[tokio::test]
async fn test_late_joiner_receives_history_first() {
    let app = test_app(true);
    for payload in ["one", "two", "three"] {
        app.log
            .append(
                "chatstream:trip-7",
                &ChatEvent::new(ParticipantId::ANONYMOUS, "trip-7", payload),
            )
            .await
            .unwrap();
    }
    let addr = serve(app.router.clone()).await;

    let mut client = connect(addr, "trip-7").await;
    assert_eq!(next_text(&mut client).await, "one");
    assert_eq!(next_text(&mut client).await, "two");
    assert_eq!(next_text(&mut client).await, "three");

    wait_for_subscribers(&app.broadcast, "trip-7", 1).await;
    client.send(Message::Text("four".into())).await.unwrap();
    assert_eq!(next_text(&mut client).await, "four");
}

#[tokio::test]
async fn test_binary_payloads_are_relayed_verbatim() {
    let app = test_app(true);
    let addr = serve(app.router.clone()).await;

    let mut client = connect(addr, "trip-bin").await;
    wait_for_subscribers(&app.broadcast, "trip-bin", 1).await;

    let payload = vec![0xff, 0x00, 0xfe];
    client.send(Message::Binary(payload.clone())).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received, Message::Binary(payload));
}

#[tokio::test]
async fn test_bearer_token_identifies_participant() {
    let app = test_app(false);
    let addr = serve(app.router.clone()).await;
    let id = Uuid::new_v4();

    let mut request = format!("ws://{addr}/ws/chat?room=trip-auth")
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        header::AUTHORIZATION.as_str(),
        HeaderValue::from_str(&format!("Bearer {}", token_for(id))).unwrap(),
    );
    let (mut client, _) = connect_async(request).await.unwrap();
    wait_for_subscribers(&app.broadcast, "trip-auth", 1).await;

    client.send(Message::Text("on my way".into())).await.unwrap();
    assert_eq!(next_text(&mut client).await, "on my way");

    let history = app.log.read_all("chatstream:trip-auth").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].participant, ParticipantId::new(id));
}
