#![doc = include_str!("../README.md")]

mod connection;
pub use connection::{ConnectionManager, ConnectionOptions, ConnectionState, JOIN_USER_ROOM};
mod correlator;
pub use correlator::{parse_response, CallOptions};
mod error;
pub use error::CallError;
mod exchange;
pub use exchange::{response_event, Exchange, PushEvent, UnknownPushEvent};
mod listeners;
pub use listeners::{Subscription, SubscriptionKind};
mod socketio;
pub use socketio::SocketIoTransport;
mod transport;
#[cfg(any(test, feature = "test-support"))]
pub use transport::TestTransport;
pub use transport::{IncomingEvent, OutgoingEvent, Transport, TransportError, TransportLink};

pub use tokio_util::sync::CancellationToken;
