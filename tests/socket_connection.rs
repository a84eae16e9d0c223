//! Менеджер соединения против настоящего Socket.IO-подобного сервера на axum.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use booking_client::config::RealtimeConfig;
use booking_client::realtime::{ConnectionManager, EventKind, PushEvent, WsTransport};

const OPEN: &str =
    r#"0{"sid":"sid-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

#[derive(Clone)]
struct Server {
    sessions: Arc<AtomicUsize>,
    received: mpsc::UnboundedSender<String>,
}

async fn upgrade(ws: WebSocketUpgrade, State(server): State<Server>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, server))
}

// Первая сессия шлёт одно событие и рвёт соединение, вторая живёт дальше
async fn serve(mut socket: WebSocket, server: Server) {
    let session = server.sessions.fetch_add(1, Ordering::SeqCst) + 1;
    if socket.send(Message::Text(OPEN.into())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let text = text.as_str().to_string();
        if text == "40" {
            let _ = socket.send(Message::Text(r#"40{"sid":"socket-1"}"#.into())).await;
            let _ = socket.send(Message::Text("2".into())).await;
            let online = format!(r#"42["users_online",{{"count":{},"users":[]}}]"#, session);
            let _ = socket.send(Message::Text(online.into())).await;
            if session == 1 {
                return;
            }
        } else {
            let _ = server.received.send(text);
        }
    }
}

async fn start_server() -> (String, Arc<AtomicUsize>, mpsc::UnboundedReceiver<String>) {
    let (received, frames) = mpsc::unbounded_channel();
    let sessions = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/socket.io/", get(upgrade))
        .with_state(Server { sessions: sessions.clone(), received });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("ws://{}", addr), sessions, frames)
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

#[tokio::test]
async fn delivers_events_and_repeats_identity_across_reconnects() {
    let (socket_url, sessions, mut frames) = start_server().await;
    let transport = WsTransport::from_config(&RealtimeConfig {
        socket_url,
        reconnect_base_ms: 20,
        reconnect_max_ms: 100,
    })
    .unwrap();
    let manager = ConnectionManager::new(Arc::new(transport));

    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    let _subscription = manager.subscribe(EventKind::UsersOnline, move |event| {
        if let PushEvent::UsersOnline(online) = event {
            let _ = seen_tx.send(online.count);
        }
    });

    // Представились до подключения: сервер узнает имя в каждой новой сессии
    manager.authenticate("ann");
    manager.connect().await.unwrap();
    assert_eq!(recv(&mut seen).await, 1);
    // Разрыв прозрачен: та же подписка получает событие новой сессии
    assert_eq!(recv(&mut seen).await, 2);
    assert_eq!(sessions.load(Ordering::SeqCst), 2);
    assert!(manager.is_connected());

    manager.join_event_room(7);

    let mut announcements = Vec::new();
    while announcements.len() < 2 {
        let frame = recv(&mut frames).await;
        // pong на ping сервера пропускаем
        if frame.starts_with("42") {
            announcements.push(frame);
        }
    }
    assert_eq!(announcements[0], r#"42["authenticate",{"username":"ann"}]"#);
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&announcements[1][2..]).unwrap(),
        json!(["join_event_room", {"event_id": 7}])
    );

    manager.disconnect();
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn refused_connection_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = WsTransport::from_config(&RealtimeConfig {
        socket_url: format!("ws://{}", addr),
        reconnect_base_ms: 20,
        reconnect_max_ms: 100,
    })
    .unwrap();
    let manager = ConnectionManager::new(Arc::new(transport));

    assert!(manager.connect().await.is_err());
    assert!(!manager.is_connected());
}
