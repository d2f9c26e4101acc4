use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use for4_crypto::EnvelopeCodec;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use super::{IncomingEvent, OutgoingEvent, Transport, TransportError, TransportLink};

type Responder = Arc<dyn Fn(&Value) -> Vec<IncomingEvent> + Send + Sync>;

/// An in-memory [`Transport`] for tests.
///
/// Records everything the client sends, lets the test push server events into the current link
/// and can answer requests automatically.
#[derive(Clone)]
pub struct TestTransport {
    state: Arc<Mutex<State>>,
    sent: watch::Sender<usize>,
}

#[derive(Default)]
struct State {
    connects: usize,
    fail_next: usize,
    link: Option<mpsc::UnboundedSender<IncomingEvent>>,
    sent: Vec<OutgoingEvent>,
    responders: HashMap<String, Responder>,
}

impl Default for TestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTransport {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            sent: watch::channel(0).0,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.state().fail_next = count;
    }

    /// Number of connection attempts so far, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    /// Whether a link is currently open.
    pub fn is_linked(&self) -> bool {
        self.state().link.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver a server event on the current link. Returns false when no link is open.
    pub fn push(&self, name: &str, payload: Value) -> bool {
        let state = self.state();
        let Some(link) = state.link.as_ref() else {
            return false;
        };
        link.send(IncomingEvent {
            name: name.to_owned(),
            payload,
        })
        .is_ok()
    }

    /// Close the current link from the server side.
    pub fn drop_link(&self) {
        self.state().link = None;
    }

    /// Every event the client has sent, in order.
    pub fn sent(&self) -> Vec<OutgoingEvent> {
        self.state().sent.clone()
    }

    /// Payloads of the sent events with the given name.
    pub fn sent_named(&self, name: &str) -> Vec<Value> {
        self.state()
            .sent
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.payload.clone())
            .collect()
    }

    /// Wait until the client has sent at least `count` events named `name`.
    pub async fn wait_for_sent(&self, name: &str, count: usize) {
        let mut rx = self.sent.subscribe();
        // The sender lives as long as self, so this can't fail
        let _ = rx
            .wait_for(|_| self.state().sent.iter().filter(|e| e.name == name).count() >= count)
            .await;
    }

    /// Answer every `event` the client sends with the events returned by `responder`.
    pub fn respond_to<F>(&self, event: &str, responder: F)
    where
        F: Fn(&Value) -> Vec<IncomingEvent> + Send + Sync + 'static,
    {
        self.state()
            .responders
            .insert(event.to_owned(), Arc::new(responder));
    }

    /// Answer every sealed `event` with a sealed `<event>Response` built from the opened request.
    pub fn respond_with_envelope<F>(&self, event: &str, codec: EnvelopeCodec, handler: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let response_name = format!("{event}Response");
        self.respond_to(event, move |payload| {
            let request = match payload {
                Value::String(text) => codec.decode_unwrapped(text).unwrap_or(Value::Null),
                other => other.clone(),
            };
            match codec.encode(&handler(request)) {
                Ok(sealed) => vec![IncomingEvent {
                    name: response_name.clone(),
                    payload: Value::String(sealed),
                }],
                Err(_) => Vec::new(),
            }
        });
    }

    fn record(&self, event: OutgoingEvent) -> Option<Responder> {
        let mut state = self.state();
        let responder = state.responders.get(&event.name).cloned();
        state.sent.push(event);
        responder
    }
}

#[async_trait]
impl Transport for TestTransport {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutgoingEvent>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state();
            state.connects += 1;
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(TransportError::Unavailable);
            }
            state.link = Some(in_tx.clone());
        }

        let weak_in = in_tx.downgrade();
        drop(in_tx);
        let transport = self.clone();
        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
                let payload = event.payload.clone();
                let responder = transport.record(event);
                transport.sent.send_modify(|count| *count += 1);

                let (Some(responder), Some(in_tx)) = (responder, weak_in.upgrade()) else {
                    continue;
                };
                for response in responder(&payload) {
                    let _ = in_tx.send(response);
                }
            }
        });

        Ok(TransportLink {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
