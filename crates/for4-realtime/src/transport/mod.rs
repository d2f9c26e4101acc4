//! The seam between the [`ConnectionManager`](crate::ConnectionManager) and the wire.
//!
//! A [`Transport`] knows how to open one link to the server. The manager decides when to open
//! links and what to do when they close, the transport only moves named events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[cfg(any(test, feature = "test-support"))]
mod testing;
#[cfg(any(test, feature = "test-support"))]
pub use testing::TestTransport;

/// A named event received from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    #[allow(missing_docs)]
    pub name: String,
    /// The first argument of the event, usually envelope text.
    pub payload: Value,
}

/// A named event to send to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEvent {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub payload: Value,
}

/// One open connection to the server.
///
/// The link is alive until `incoming` yields `None`. Dropping `outgoing` asks the transport to
/// close the connection.
#[derive(Debug)]
pub struct TransportLink {
    #[allow(missing_docs)]
    pub outgoing: mpsc::UnboundedSender<OutgoingEvent>,
    #[allow(missing_docs)]
    pub incoming: mpsc::UnboundedReceiver<IncomingEvent>,
}

#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid socket url: {0}")]
    InvalidUrl(String),

    #[error("Timed out connecting to {0}")]
    Timeout(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Socket.IO protocol error: {0}")]
    Protocol(String),

    #[error("Server rejected the connection: {0}")]
    Rejected(String),

    #[error("Transport unavailable")]
    Unavailable,
}

/// Opens links to the realtime server.
///
/// Implementations must be cheap to call repeatedly, the connection manager calls `connect` again
/// for every reconnection attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a new link. Resolves once the server has accepted the connection.
    async fn connect(&self) -> Result<TransportLink, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        (**self).connect().await
    }
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        (**self).connect().await
    }
}
