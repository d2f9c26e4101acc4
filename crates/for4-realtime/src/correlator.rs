use std::time::Duration;

use for4_crypto::CryptoError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{exchange::response_event, CallError, ConnectionManager, Exchange, SubscriptionKind};

/// Per call settings for [`ConnectionManager::call`].
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Deadline for the response. Defaults to the manager's request timeout.
    pub timeout: Option<Duration>,
    /// [`SubscriptionKind::Once`] fails the call on the first unreadable response.
    /// [`SubscriptionKind::Persistent`] logs unreadable responses and keeps waiting until the
    /// deadline.
    pub kind: SubscriptionKind,
    /// Cancels the call when triggered.
    pub cancellation: Option<CancellationToken>,
    /// Serialize the request to a JSON string before sealing it, as the backend expects.
    pub stringify_request: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            kind: SubscriptionKind::Once,
            cancellation: None,
            stringify_request: true,
        }
    }
}

impl CallOptions {
    #[allow(missing_docs)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[allow(missing_docs)]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[allow(missing_docs)]
    pub fn with_kind(mut self, kind: SubscriptionKind) -> Self {
        self.kind = kind;
        self
    }
}

impl ConnectionManager {
    /// Send `payload` sealed on `request_event` and wait for the first `<request_event>Response`.
    ///
    /// The response listener is registered before the request is sent and is always removed
    /// before this returns, whatever the outcome.
    pub async fn call<T: Serialize + ?Sized>(
        &self,
        request_event: &str,
        payload: &T,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        if !self.connected() {
            return Err(CallError::NotConnected);
        }

        let sealed = if options.stringify_request {
            let text = serde_json::to_string(payload).map_err(CryptoError::Encode)?;
            self.codec().encode(&text)?
        } else {
            self.codec().encode(payload)?
        };

        let response_event = response_event(request_event);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.on(&response_event, options.kind, move |payload: &Value| {
            let _ = tx.send(payload.clone());
        });

        if !self.emit(request_event, Value::String(sealed)) {
            return Err(CallError::NotConnected);
        }
        debug!(request_event, "Awaiting response");

        let timeout = options.timeout.unwrap_or_else(|| self.request_timeout());
        let cancellation = options.cancellation.unwrap_or_default();
        let shutdown = self.shared().shutdown.clone();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break Err(CallError::Cancelled),
                _ = shutdown.cancelled() => break Err(CallError::ConnectionClosed),
                payload = rx.recv() => {
                    let Some(payload) = payload else {
                        break Err(CallError::ConnectionClosed);
                    };
                    match self.open_response(&payload) {
                        Ok(body) => break Ok(body),
                        Err(error) if options.kind == SubscriptionKind::Persistent => {
                            warn!(%error, %response_event, "Ignoring unreadable response");
                        }
                        Err(error) => break Err(error),
                    }
                }
                _ = &mut deadline => break Err(CallError::Timeout(timeout)),
            }
        };

        drop(subscription);
        if let Err(error) = &result {
            debug!(%error, request_event, "Call failed");
        }
        result
    }

    /// Run a typed exchange.
    ///
    /// A response body with `success: false` becomes [`CallError::LogicalFailure`], any other
    /// body is deserialized into the exchange's response type.
    pub async fn call_exchange<E: Exchange>(
        &self,
        request: &E::Request,
        options: CallOptions,
    ) -> Result<E::Response, CallError> {
        let body = self.call(E::NAME, request, options).await?;
        parse_response::<E::Response>(body)
    }

    fn open_response(&self, payload: &Value) -> Result<Value, CallError> {
        match payload {
            Value::String(text) => Ok(self.codec().decode_unwrapped(text)?),
            _ => Err(CallError::UnexpectedPayload),
        }
    }
}

/// Check the `success` flag of a response body and deserialize it.
///
/// Only a literal `success: false` is a rejection. `message`, `status` and `code` are read
/// leniently since bodies may carry them with any shape.
pub fn parse_response<R: DeserializeOwned>(body: Value) -> Result<R, CallError> {
    if body.get("success") == Some(&Value::Bool(false)) {
        let unauthorized = ["status", "code"]
            .iter()
            .filter_map(|field| body.get(*field))
            .any(is_unauthorized_code);
        return Err(CallError::LogicalFailure {
            message: rejection_message(body.get("message"))
                .unwrap_or_else(|| "The request was rejected".to_owned()),
            unauthorized,
        });
    }
    serde_json::from_value(body).map_err(CallError::Response)
}

fn is_unauthorized_code(code: &Value) -> bool {
    code.as_u64() == Some(401) || code.as_str() == Some("401")
}

/// A string message, or the first string inside a localized message object.
fn rejection_message(message: Option<&Value>) -> Option<String> {
    match message? {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map.values().find_map(|v| v.as_str().map(str::to_owned)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use for4_crypto::{EnvelopeCodec, EnvelopeKey};
    use serde_json::json;

    use serde::Deserialize;

    use super::*;
    use crate::{ConnectionOptions, IncomingEvent, TestTransport};

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::new(EnvelopeKey::new("test-passphrase", "test-mac-secret"))
    }

    async fn connected() -> (TestTransport, ConnectionManager) {
        let transport = TestTransport::new();
        let manager =
            ConnectionManager::start(transport.clone(), codec(), ConnectionOptions::default());
        assert!(manager.wait_until_connected(Duration::from_secs(5)).await);
        (transport, manager)
    }

    fn sealed(value: Value) -> Value {
        Value::String(codec().encode(&value).unwrap())
    }

    #[tokio::test]
    async fn resolves_with_the_decoded_response() {
        let (transport, manager) = connected().await;
        transport.respond_with_envelope("DadosDashboard", codec(), |request| {
            json!({ "success": true, "data": { "echo": request } })
        });

        let body = manager
            .call("DadosDashboard", &json!({ "token": "T" }), CallOptions::default())
            .await
            .unwrap();

        assert_eq!(body, json!({ "success": true, "data": { "echo": { "token": "T" } } }));
        assert_eq!(manager.listener_count("DadosDashboardResponse"), 0);
    }

    #[tokio::test]
    async fn requests_are_sent_as_stringified_json() {
        let (transport, manager) = connected().await;
        transport.respond_with_envelope("Login", codec(), |_| json!({ "success": true }));

        manager
            .call("Login", &json!({ "email": "a@b.c" }), CallOptions::default())
            .await
            .unwrap();

        let sent = transport.sent_named("Login");
        let opened = codec().decode(sent[0].as_str().unwrap()).unwrap();
        assert_eq!(opened, json!(r#"{"email":"a@b.c"}"#));
    }

    #[tokio::test]
    async fn a_second_response_has_no_effect() {
        let (transport, manager) = connected().await;
        transport.respond_to("Login", |_: &Value| {
            vec![
                IncomingEvent {
                    name: "LoginResponse".to_owned(),
                    payload: sealed(json!({ "n": 1 })),
                },
                IncomingEvent {
                    name: "LoginResponse".to_owned(),
                    payload: sealed(json!({ "n": 2 })),
                },
            ]
        });

        let body = manager
            .call("Login", &json!({}), CallOptions::default())
            .await
            .unwrap();
        tokio::task::yield_now().await;

        assert_eq!(body, json!({ "n": 1 }));
        assert_eq!(manager.listener_count("LoginResponse"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_removes_the_listener() {
        let (_transport, manager) = connected().await;
        let baseline = manager.listener_count("GetNotificationsResponse");

        let result = manager
            .call(
                "GetNotifications",
                &json!({ "limit": 10 }),
                CallOptions::default().with_timeout(Duration::from_millis(100)),
            )
            .await;

        assert!(matches!(result, Err(CallError::Timeout(t)) if t == Duration::from_millis(100)));
        assert_eq!(manager.listener_count("GetNotificationsResponse"), baseline);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_rejects_the_call() {
        let (_transport, manager) = connected().await;
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let result = manager
            .call(
                "StatementDashboard",
                &json!({}),
                CallOptions::default().with_cancellation(token),
            )
            .await;

        assert!(matches!(result, Err(CallError::Cancelled)));
        assert_eq!(manager.listener_count("StatementDashboardResponse"), 0);
    }

    #[tokio::test]
    async fn tampered_response_is_an_integrity_error() {
        let (transport, manager) = connected().await;
        let other = EnvelopeCodec::new(EnvelopeKey::new("test-passphrase", "another-secret"));
        transport.respond_to("Login", move |_: &Value| {
            vec![IncomingEvent {
                name: "LoginResponse".to_owned(),
                payload: Value::String(other.encode(&json!({ "success": true })).unwrap()),
            }]
        });

        let result = manager.call("Login", &json!({}), CallOptions::default()).await;

        assert!(matches!(result, Err(CallError::Integrity(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_calls_skip_unreadable_responses() {
        let (transport, manager) = connected().await;
        transport.respond_to("Login", move |_: &Value| {
            vec![
                IncomingEvent {
                    name: "LoginResponse".to_owned(),
                    payload: json!("garbage"),
                },
                IncomingEvent {
                    name: "LoginResponse".to_owned(),
                    payload: sealed(json!({ "success": true })),
                },
            ]
        });

        let body = manager
            .call(
                "Login",
                &json!({}),
                CallOptions::default().with_kind(SubscriptionKind::Persistent),
            )
            .await
            .unwrap();

        assert_eq!(body, json!({ "success": true }));
        assert_eq!(manager.listener_count("LoginResponse"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn not_connected_fails_fast() {
        let transport = TestTransport::new();
        transport.fail_next_connects(usize::MAX);
        let manager = ConnectionManager::start(transport, codec(), ConnectionOptions::default());

        let result = manager.call("Login", &json!({}), CallOptions::default()).await;

        assert!(matches!(result, Err(CallError::NotConnected)));
        assert_eq!(manager.listener_count("LoginResponse"), 0);
    }

    struct VerificarToken;

    #[derive(Serialize)]
    struct TokenRequest {
        token: String,
    }

    #[derive(Debug, Deserialize)]
    struct VerifyResponse {
        user: Value,
    }

    impl Exchange for VerificarToken {
        const NAME: &'static str = "VerificarToken";
        type Request = TokenRequest;
        type Response = VerifyResponse;
    }

    #[tokio::test]
    async fn typed_exchanges_check_the_success_flag() {
        let (transport, manager) = connected().await;
        transport.respond_with_envelope("VerificarToken", codec(), |request| {
            if request["token"] == "good" {
                json!({ "success": true, "user": { "name": "A" } })
            } else {
                json!({ "success": false, "message": "Invalid token", "status": 401 })
            }
        });

        let ok = manager
            .call_exchange::<VerificarToken>(
                &TokenRequest {
                    token: "good".to_owned(),
                },
                CallOptions::default(),
            )
            .await
            .unwrap();
        let rejected = manager
            .call_exchange::<VerificarToken>(
                &TokenRequest {
                    token: "bad".to_owned(),
                },
                CallOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(ok.user, json!({ "name": "A" }));
        assert!(rejected.is_unauthorized());
        assert_eq!(rejected.user_message(), "Invalid token");
    }

    #[test]
    fn bodies_without_success_flag_are_accepted() {
        let body: Value = parse_response(json!({ "data": [] })).unwrap();

        assert_eq!(body, json!({ "data": [] }));
    }

    #[test]
    fn extra_fields_of_any_shape_are_tolerated() {
        let body: Value =
            parse_response(json!({ "success": true, "status": "pending", "data": {} })).unwrap();

        assert_eq!(body["status"], json!("pending"));
    }

    #[test]
    fn rejections_with_structured_messages_stay_logical_failures() {
        let error = parse_response::<Value>(json!({
            "success": false,
            "message": { "pt": "Token inválido" },
            "code": "401"
        }))
        .unwrap_err();

        assert!(matches!(
            &error,
            CallError::LogicalFailure { message, unauthorized: true } if message == "Token inválido"
        ));
    }

    #[test]
    fn rejections_without_a_readable_message_use_a_default() {
        let error =
            parse_response::<Value>(json!({ "success": false, "message": 42 })).unwrap_err();

        assert_eq!(error.user_message(), "The request was rejected");
        assert!(!error.is_unauthorized());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_pending_call_removes_its_listener() {
        let (_transport, manager) = connected().await;
        let baseline = manager.listener_count("PerformanceDashboardResponse");

        let params = json!({ "period": "7d" });
        let call = manager.call(
            "PerformanceDashboard",
            &params,
            CallOptions::default(),
        );
        let dropped = tokio::time::timeout(Duration::from_millis(50), call).await;

        assert!(dropped.is_err());
        assert_eq!(manager.listener_count("PerformanceDashboardResponse"), baseline);
    }
}
