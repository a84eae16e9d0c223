//! transport.rs
//!
//! Транспорт push-соединения. `ConnectionManager` знает только трейт
//! `PushTransport`: открыть канал и получить пару очередей (входящие события,
//! исходящие объявления). Всё, что касается сокета, живёт здесь.
//!
//! `WsTransport` держит Socket.IO-сессию поверх WebSocket и сам
//! переподключается с экспоненциальной задержкой. Для менеджера разрыв
//! прозрачен: очереди живут дольше одной сессии.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::codec::{EnginePacket, Handshake, SocketPacket};
use crate::config::RealtimeConfig;
use crate::error::{ClientError, Result};

/// Событие в том виде, в каком оно ходит по проводу: имя + JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub name: String,
    pub data: Value,
}

/// Что транспорт отдаёт менеджеру.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(WireEvent),
    /// Сессия поднята заново после обрыва (новый sid): объявления надо повторить.
    Reestablished,
}

/// Открытый канал. Закрытие `outbound` (drop): сигнал транспорту завершиться.
pub struct PushChannel {
    pub outbound: mpsc::UnboundedSender<WireEvent>,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    pub driver: Option<JoinHandle<()>>,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self) -> Result<PushChannel>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    /// Менеджер закрыл канал: выходим насовсем.
    Shutdown,
    /// Сессия оборвалась: переподключаемся.
    Lost(String),
}

#[derive(Debug, Clone)]
pub struct WsTransport {
    endpoint: String,
    reconnect_base: Duration,
    reconnect_max: Duration,
}

impl WsTransport {
    pub fn from_config(config: &RealtimeConfig) -> Result<Self> {
        let endpoint = format!(
            "{}/socket.io/?EIO=4&transport=websocket",
            config.socket_url.trim_end_matches('/')
        );
        Url::parse(&endpoint).map_err(|e| ClientError::Config(format!("SOCKET_URL: {}", e)))?;
        Ok(Self {
            endpoint,
            reconnect_base: config.reconnect_base_delay(),
            reconnect_max: config.reconnect_max_delay(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn open(&self) -> Result<PushChannel> {
        let (ws, handshake) = establish(&self.endpoint).await?;
        info!("Push connection established (sid={})", handshake.sid);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(
            self.clone(),
            ws,
            handshake,
            outbound_rx,
            inbound_tx,
        ));

        Ok(PushChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
            driver: Some(driver),
        })
    }
}

/// WebSocket-рукопожатие + подключение к namespace по умолчанию.
async fn establish(endpoint: &str) -> Result<(WsStream, Handshake)> {
    let (mut ws, _) = connect_async(endpoint).await?;

    let handshake = match EnginePacket::decode(&next_text(&mut ws).await?)? {
        EnginePacket::Open(handshake) => handshake,
        other => {
            return Err(ClientError::Transport(format!(
                "expected open packet, got {:?}",
                other
            )))
        }
    };

    ws.send(Message::Text(EnginePacket::Message(SocketPacket::connect()).encode()))
        .await?;

    // Сервер может успеть прислать ping до подтверждения namespace
    loop {
        match EnginePacket::decode(&next_text(&mut ws).await?)? {
            EnginePacket::Message(SocketPacket::Connect { .. }) => break,
            EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                return Err(ClientError::Transport(format!("connection refused: {}", data)));
            }
            EnginePacket::Ping(data) => {
                ws.send(Message::Text(EnginePacket::Pong(data).encode())).await?;
            }
            other => trace!("Skipping {:?} during handshake", other),
        }
    }

    Ok((ws, handshake))
}

async fn next_text(ws: &mut WsStream) -> Result<String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::Transport("connection closed during handshake".to_string()))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn drive(
    transport: WsTransport,
    mut ws: WsStream,
    mut handshake: Handshake,
    mut outbound: mpsc::UnboundedReceiver<WireEvent>,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    loop {
        match run_session(&mut ws, &handshake, &mut outbound, &inbound).await {
            SessionEnd::Shutdown => {
                let _ = ws.close(None).await;
                debug!("Push transport shut down");
                return;
            }
            SessionEnd::Lost(reason) => warn!("Push connection lost: {}", reason),
        }

        let mut delay = transport.reconnect_base;
        loop {
            // Пока соединения нет, исходящие объявления выбрасываются
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    message = outbound.recv() => match message {
                        Some(event) => debug!("Not connected, dropping '{}'", event.name),
                        None => return,
                    },
                }
            }
            if inbound.is_closed() {
                return;
            }

            match establish(&transport.endpoint).await {
                Ok((stream, hs)) => {
                    info!("Push connection re-established (sid={})", hs.sid);
                    ws = stream;
                    handshake = hs;
                    if inbound.send(Inbound::Reestablished).is_err() {
                        return;
                    }
                    break;
                }
                Err(e) => {
                    warn!("Reconnect failed, next attempt in {:?}: {}", delay, e);
                    delay = (delay * 2).min(transport.reconnect_max);
                }
            }
        }
    }
}

async fn run_session(
    ws: &mut WsStream,
    handshake: &Handshake,
    outbound: &mut mpsc::UnboundedReceiver<WireEvent>,
    inbound: &mpsc::UnboundedSender<Inbound>,
) -> SessionEnd {
    // Сервер пингует раз в ping_interval; молчание дольше interval + timeout: обрыв
    let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                return SessionEnd::Lost("ping timeout".to_string());
            }
            frame = ws.next() => {
                deadline = Instant::now() + liveness;
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Lost("socket closed".to_string());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                };

                match EnginePacket::decode(&text) {
                    Ok(EnginePacket::Ping(data)) => {
                        let pong = Message::Text(EnginePacket::Pong(data).encode());
                        if let Err(e) = ws.send(pong).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    Ok(EnginePacket::Message(SocketPacket::Event { name, data, .. })) => {
                        if inbound.send(Inbound::Event(WireEvent { name, data })).is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Ok(EnginePacket::Close)
                    | Ok(EnginePacket::Message(SocketPacket::Disconnect { .. })) => {
                        return SessionEnd::Lost("server closed the session".to_string());
                    }
                    Ok(other) => trace!("Ignoring {:?}", other),
                    Err(e) => warn!("Ignoring malformed push frame: {}", e),
                }
            }
            message = outbound.recv() => {
                let Some(event) = message else {
                    return SessionEnd::Shutdown;
                };
                let frame = EnginePacket::Message(SocketPacket::event(event.name, event.data)).encode();
                if let Err(e) = ws.send(Message::Text(frame)).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
        }
    }
}
