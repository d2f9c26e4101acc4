//! Socket.IO over a websocket, the transport the For4 backend speaks.

use std::time::Duration;

use async_trait::async_trait;
use for4_core::ClientSettings;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    sync::mpsc,
    time::{sleep_until, timeout, Instant},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{IncomingEvent, OutgoingEvent, Transport, TransportError, TransportLink};

mod packet;
use packet::{Handshake, Packet, SocketPacket};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] speaking Socket.IO v5 over a websocket only connection.
#[derive(Debug, Clone)]
pub struct SocketIoTransport {
    url: String,
    connect_timeout: Duration,
}

impl SocketIoTransport {
    /// Build a transport for the server at `base_url`, with Socket.IO mounted on `path`.
    pub fn new(
        base_url: &str,
        path: &str,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            url: websocket_url(base_url, path)?,
            connect_timeout,
        })
    }

    #[allow(missing_docs)]
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, TransportError> {
        Self::new(
            &settings.socket_url,
            &settings.socket_path,
            settings.connect_timeout(),
        )
    }

    /// The websocket url connections are opened against.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn handshake(&self) -> Result<(WsStream, Handshake), TransportError> {
        let (mut ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let handshake = match next_packet(&mut ws).await? {
            Packet::Open(handshake) => handshake,
            other => {
                return Err(TransportError::Protocol(format!(
                    "expected open packet, got {other:?}"
                )))
            }
        };
        debug!(sid = %handshake.sid, "Engine.IO session opened");

        send_packet(&mut ws, &Packet::Message(SocketPacket::Connect)).await?;
        loop {
            match next_packet(&mut ws).await? {
                Packet::Message(SocketPacket::Connect) => break,
                Packet::Message(SocketPacket::ConnectError(message)) => {
                    return Err(TransportError::Rejected(message))
                }
                Packet::Ping => send_packet(&mut ws, &Packet::Pong).await?,
                Packet::Close => {
                    return Err(TransportError::Protocol(
                        "closed during handshake".to_owned(),
                    ))
                }
                _ => {}
            }
        }

        Ok((ws, handshake))
    }
}

#[async_trait]
impl Transport for SocketIoTransport {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        info!("Connecting to {}", self.url);
        let (ws, handshake) = timeout(self.connect_timeout, self.handshake())
            .await
            .map_err(|_| TransportError::Timeout(self.url.clone()))??;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_link(ws, handshake, out_rx, in_tx));

        Ok(TransportLink {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

async fn run_link(
    mut ws: WsStream,
    handshake: Handshake,
    mut outgoing: mpsc::UnboundedReceiver<OutgoingEvent>,
    incoming: mpsc::UnboundedSender<IncomingEvent>,
) {
    // The server pings every ping_interval and expects to hear back within ping_timeout
    let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            frame = ws.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Received close frame: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };
                deadline = Instant::now() + liveness;

                match Packet::parse(text.as_str()) {
                    Ok(Packet::Ping) => {
                        if send_packet(&mut ws, &Packet::Pong).await.is_err() {
                            break;
                        }
                    }
                    Ok(Packet::Message(SocketPacket::Event { name, args })) => {
                        let payload = args.into_iter().next().unwrap_or(Value::Null);
                        if incoming.send(IncomingEvent { name, payload }).is_err() {
                            break;
                        }
                    }
                    Ok(Packet::Close | Packet::Message(SocketPacket::Disconnect)) => {
                        debug!(sid = %handshake.sid, "Server closed the session");
                        break;
                    }
                    Ok(other) => debug!("Ignoring packet {:?}", other),
                    Err(e) => warn!("Dropping malformed packet: {}", e),
                }
            }
            event = outgoing.recv() => {
                let Some(OutgoingEvent { name, payload }) = event else {
                    let _ = send_packet(&mut ws, &Packet::Message(SocketPacket::Disconnect)).await;
                    let _ = ws.close(None).await;
                    break;
                };
                let packet = Packet::Message(SocketPacket::Event { name, args: vec![payload] });
                if let Err(e) = send_packet(&mut ws, &packet).await {
                    warn!("Failed to send event: {}", e);
                    break;
                }
            }
            _ = sleep_until(deadline) => {
                warn!(sid = %handshake.sid, "Ping timeout");
                break;
            }
        }
    }
    debug!(sid = %handshake.sid, "Link closed");
}

async fn next_packet(ws: &mut WsStream) -> Result<Packet, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Packet::parse(text.as_str()),
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::WebSocket("connection closed".to_owned()))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::WebSocket(e.to_string())),
        }
    }
}

async fn send_packet(ws: &mut WsStream, packet: &Packet) -> Result<(), TransportError> {
    ws.send(Message::text(packet.encode()))
        .await
        .map_err(|e| TransportError::WebSocket(e.to_string()))
}

/// Map an http(s) base url and a Socket.IO path to the websocket endpoint.
fn websocket_url(base_url: &str, path: &str) -> Result<String, TransportError> {
    let (scheme, rest) = base_url
        .split_once("://")
        .ok_or_else(|| TransportError::InvalidUrl(base_url.to_owned()))?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(TransportError::InvalidUrl(base_url.to_owned())),
    };
    let host = rest.trim_end_matches('/');
    if host.is_empty() {
        return Err(TransportError::InvalidUrl(base_url.to_owned()));
    }

    let path = path.trim_matches('/');
    let path = if path.is_empty() {
        String::from("/")
    } else {
        format!("/{path}/")
    };
    Ok(format!("{scheme}://{host}{path}?EIO=4&transport=websocket"))
}
