//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the default namespace and text packets are supported. Binary attachments and acks are not
//! used by the For4 backend.

use serde::Deserialize;
use serde_json::Value;

use crate::TransportError;

/// Parameters sent by the server in the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    /// Upgrade and noop packets, meaningless on a websocket-only connection.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(String),
    /// Acks and binary packets.
    Unsupported(char),
}

impl Packet {
    pub(crate) fn parse(text: &str) -> Result<Self, TransportError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty packet".to_owned()))?;
        let body = chars.as_str();

        Ok(match kind {
            '0' => Packet::Open(
                serde_json::from_str(body)
                    .map_err(|e| TransportError::Protocol(format!("bad open packet: {e}")))?,
            ),
            '1' => Packet::Close,
            '2' => Packet::Ping,
            '3' => Packet::Pong,
            '4' => Packet::Message(SocketPacket::parse(body)?),
            '5' | '6' => Packet::Ignored,
            other => {
                return Err(TransportError::Protocol(format!(
                    "unknown packet type {other:?}"
                )))
            }
        })
    }

    pub(crate) fn encode(&self) -> String {
        match self {
            Packet::Open(_) | Packet::Ignored => String::from("6"),
            Packet::Close => String::from("1"),
            Packet::Ping => String::from("2"),
            Packet::Pong => String::from("3"),
            Packet::Message(message) => format!("4{}", message.encode()),
        }
    }
}

impl SocketPacket {
    fn parse(text: &str) -> Result<Self, TransportError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty message packet".to_owned()))?;
        let body = skip_namespace(chars.as_str());

        Ok(match kind {
            '0' => SocketPacket::Connect,
            '1' => SocketPacket::Disconnect,
            '2' => {
                let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
                let mut args: Vec<Value> = serde_json::from_str(body)
                    .map_err(|e| TransportError::Protocol(format!("bad event packet: {e}")))?;
                if args.is_empty() {
                    return Err(TransportError::Protocol("event without a name".to_owned()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(TransportError::Protocol(format!(
                            "event name is not a string: {other}"
                        )))
                    }
                };
                SocketPacket::Event { name, args }
            }
            '4' => {
                let message = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
                    .unwrap_or_else(|| body.to_owned());
                SocketPacket::ConnectError(message)
            }
            other => SocketPacket::Unsupported(other),
        })
    }

    fn encode(&self) -> String {
        match self {
            SocketPacket::Connect => String::from("0"),
            SocketPacket::Disconnect => String::from("1"),
            SocketPacket::Event { name, args } => {
                let mut frame = Vec::with_capacity(args.len() + 1);
                frame.push(Value::String(name.clone()));
                frame.extend(args.iter().cloned());
                format!("2{}", Value::Array(frame))
            }
            SocketPacket::ConnectError(message) => {
                format!("4{}", serde_json::json!({ "message": message }))
            }
            SocketPacket::Unsupported(kind) => kind.to_string(),
        }
    }
}

/// Strips a `/namespace,` prefix. The default namespace is implicit.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_open_packet() {
        let packet =
            Packet::parse(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
                .unwrap();

        assert_eq!(
            packet,
            Packet::Open(Handshake {
                sid: "abc".to_owned(),
                ping_interval: 25000,
                ping_timeout: 20000,
            })
        );
    }

    #[test]
    fn parses_events_with_namespace_and_ack_id() {
        let plain = Packet::parse(r#"42["new_sale","payload"]"#).unwrap();
        let namespaced = Packet::parse(r#"42/admin,17["new_sale","payload"]"#).unwrap();

        let expected = Packet::Message(SocketPacket::Event {
            name: "new_sale".to_owned(),
            args: vec![json!("payload")],
        });
        assert_eq!(plain, expected);
        assert_eq!(namespaced, expected);
    }

    #[test]
    fn encodes_events() {
        let packet = Packet::Message(SocketPacket::Event {
            name: "join_user_room".to_owned(),
            args: vec![json!(42)],
        });

        assert_eq!(packet.encode(), r#"42["join_user_room",42]"#);
        assert_eq!(Packet::Message(SocketPacket::Connect).encode(), "40");
        assert_eq!(Packet::Pong.encode(), "3");
    }

    #[test]
    fn connect_error_keeps_server_message() {
        let packet = Packet::parse(r#"44{"message":"Not authorized"}"#).unwrap();

        assert_eq!(
            packet,
            Packet::Message(SocketPacket::ConnectError("Not authorized".to_owned()))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Packet::parse("").is_err());
        assert!(Packet::parse("9").is_err());
        assert!(Packet::parse("42[1]").is_err());
        assert!(Packet::parse("42not json").is_err());
    }
}
