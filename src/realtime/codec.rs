//! codec.rs
//!
//! Текстовый кодек Engine.IO v4 / Socket.IO v5, ровно в объёме, который нужен
//! клиенту: рукопожатие, ping/pong, события с JSON-аргументами.
//!
//! Кадр WebSocket = один пакет Engine.IO: `<тип><данные>`. Пакет `4` (message)
//! несёт внутри пакет Socket.IO: `<тип>[/namespace,][ack id][json]`.
//! Бинарные вложения (`5`, `6`) не поддерживаются.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, Result};

pub const DEFAULT_NAMESPACE: &str = "/";

/// Параметры из пакета `0` (open), который сервер шлёт первым.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, data: Option<Value> },
    Disconnect { namespace: String },
    Event { namespace: String, ack: Option<u64>, name: String, data: Value },
    Ack { namespace: String, ack: u64, data: Value },
    ConnectError { namespace: String, data: Value },
}

impl SocketPacket {
    /// Событие в пространстве имён по умолчанию.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack: None,
            name: name.into(),
            data,
        }
    }

    pub fn connect() -> Self {
        SocketPacket::Connect { namespace: DEFAULT_NAMESPACE.to_string(), data: None }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        let (kind, namespace) = match self {
            SocketPacket::Connect { namespace, .. } => ('0', namespace),
            SocketPacket::Disconnect { namespace } => ('1', namespace),
            SocketPacket::Event { namespace, .. } => ('2', namespace),
            SocketPacket::Ack { namespace, .. } => ('3', namespace),
            SocketPacket::ConnectError { namespace, .. } => ('4', namespace),
        };
        out.push(kind);
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        match self {
            SocketPacket::Connect { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            SocketPacket::Disconnect { .. } => {}
            SocketPacket::Event { ack, name, data, .. } => {
                if let Some(id) = ack {
                    out.push_str(&id.to_string());
                }
                let args = if data.is_null() {
                    Value::Array(vec![Value::String(name.clone())])
                } else {
                    Value::Array(vec![Value::String(name.clone()), data.clone()])
                };
                out.push_str(&args.to_string());
            }
            SocketPacket::Ack { ack, data, .. } => {
                out.push_str(&ack.to_string());
                out.push_str(&data.to_string());
            }
            SocketPacket::ConnectError { data, .. } => out.push_str(&data.to_string()),
        }
        out
    }

    pub fn decode(input: &str) -> Result<Self> {
        let mut chars = input.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::Codec("empty socket packet".to_string()))?;
        let rest = chars.as_str();

        if kind == '5' || kind == '6' {
            return Err(ClientError::Codec("binary packets are not supported".to_string()));
        }

        let (namespace, rest) = split_namespace(rest);
        let (ack, payload) = split_ack(rest);

        match kind {
            '0' => Ok(SocketPacket::Connect {
                namespace,
                data: parse_optional(payload)?,
            }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let (name, data) = parse_event_args(payload)?;
                Ok(SocketPacket::Event { namespace, ack, name, data })
            }
            '3' => {
                let ack = ack.ok_or_else(|| ClientError::Codec("ack without id".to_string()))?;
                let data = parse_optional(payload)?.unwrap_or(Value::Null);
                Ok(SocketPacket::Ack { namespace, ack, data })
            }
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: parse_optional(payload)?.unwrap_or(Value::Null),
            }),
            other => Err(ClientError::Codec(format!("unknown socket packet type {:?}", other))),
        }
    }
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    pub fn decode(input: &str) -> Result<Self> {
        let mut chars = input.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::Codec("empty engine packet".to_string()))?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => Ok(EnginePacket::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ClientError::Codec(format!("unknown engine packet type {:?}", other))),
        }
    }
}

fn split_namespace(input: &str) -> (String, &str) {
    if input.starts_with('/') {
        match input.find(',') {
            Some(idx) => (input[..idx].to_string(), &input[idx + 1..]),
            None => (input.to_string(), ""),
        }
    } else {
        (DEFAULT_NAMESPACE.to_string(), input)
    }
}

fn split_ack(input: &str) -> (Option<u64>, &str) {
    let digits = input.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, input);
    }
    (input[..digits].parse().ok(), &input[digits..])
}

fn parse_optional(payload: &str) -> Result<Option<Value>> {
    if payload.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(payload)?))
    }
}

// ["name", data, ...]: лишние аргументы отбрасываются
fn parse_event_args(payload: &str) -> Result<(String, Value)> {
    let args: Vec<Value> = serde_json::from_str(payload)?;
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(ClientError::Codec("event without a name".to_string())),
    };
    Ok((name, args.next().unwrap_or(Value::Null)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        match packet {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(handshake.ping_interval, 25000);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet =
            EnginePacket::decode(r#"42["seats_updated",{"event_id":1,"available_seats":2,"total_seats":10}]"#)
                .unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/".to_string(),
                ack: None,
                name: "seats_updated".to_string(),
                data: json!({"event_id": 1, "available_seats": 2, "total_seats": 10}),
            })
        );
    }

    #[test]
    fn decodes_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/admin,13["hello",1]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/admin".to_string(),
                ack: Some(13),
                name: "hello".to_string(),
                data: json!(1),
            }
        );
    }

    #[test]
    fn encodes_authenticate_announcement() {
        let packet = EnginePacket::Message(SocketPacket::event("authenticate", json!({"username": "ann"})));
        assert_eq!(packet.encode(), r#"42["authenticate",{"username":"ann"}]"#);
    }

    #[test]
    fn connect_and_pong_frames() {
        assert_eq!(EnginePacket::Message(SocketPacket::connect()).encode(), "40");
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
    }

    #[test]
    fn rejects_binary_and_garbage() {
        assert!(matches!(SocketPacket::decode(r#"51-["x",{}]"#), Err(ClientError::Codec(_))));
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("42{not json").is_err());
        assert!(matches!(SocketPacket::decode("2[1,2]"), Err(ClientError::Codec(_))));
    }
}
