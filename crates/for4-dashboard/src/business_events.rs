use std::sync::Arc;

use for4_core::{Notification, NotificationLevel, Notifier};
use for4_crypto::{CryptoError, EnvelopeCodec};
use for4_realtime::{ConnectionManager, PushEvent, Subscription, SubscriptionKind};
use serde_json::Value;
use tracing::{debug, error};

/// How a business event is announced: level, message prefix and the payload field shown.
const ANNOUNCEMENTS: [(PushEvent, NotificationLevel, &str, &str); 6] = [
    (PushEvent::PaymentCreated, NotificationLevel::Success, "New payment", "amount"),
    (PushEvent::PaymentPaid, NotificationLevel::Success, "Payment confirmed", "amount"),
    (PushEvent::PaymentFailed, NotificationLevel::Error, "Payment failed", "amount"),
    (PushEvent::WithdrawalProcessed, NotificationLevel::Success, "Withdrawal processed", "amount"),
    (PushEvent::CommissionReceived, NotificationLevel::Success, "New commission", "amount"),
    (PushEvent::NewAffiliateRequest, NotificationLevel::Info, "New affiliate request", "user_name"),
];

/// Forwards payment, withdrawal, commission and affiliate events to a [`Notifier`].
///
/// Listeners stay registered until this value is dropped.
pub struct BusinessEvents {
    _subscriptions: Vec<Subscription>,
}

impl BusinessEvents {
    #[allow(missing_docs)]
    pub fn attach(connection: &ConnectionManager, notifier: Arc<dyn Notifier>) -> Self {
        let subscriptions = ANNOUNCEMENTS
            .into_iter()
            .map(|(event, level, prefix, field)| {
                // The codec, not the connection, so the listener doesn't keep it alive
                let codec = connection.codec().clone();
                let notifier = notifier.clone();
                connection.on(
                    event.as_str(),
                    SubscriptionKind::Persistent,
                    move |payload: &Value| match open(&codec, payload) {
                        Ok(message) => {
                            debug!(%event, "Business event");
                            let detail = display_field(&message, field);
                            notifier
                                .notify(Notification::new(level, format!("{prefix}: {detail}")));
                        }
                        Err(error) => error!(%event, %error, "Failed to open business event"),
                    },
                )
            })
            .collect();

        Self {
            _subscriptions: subscriptions,
        }
    }
}

fn open(codec: &EnvelopeCodec, payload: &Value) -> Result<Value, CryptoError> {
    match payload {
        Value::String(text) => codec.decode_unwrapped(text),
        other => Ok(other.clone()),
    }
}

fn display_field(message: &Value, field: &str) -> String {
    match message.get(field) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{authenticated, sealed};

    #[tokio::test]
    async fn announces_business_events() {
        let fixture = authenticated().await;
        let connection = fixture.session.connection().unwrap();
        let notifier = fixture.session.notifier();
        let _events = BusinessEvents::attach(&connection, notifier);

        fixture
            .transport
            .push("payment_failed", sealed(json!({ "amount": "R$ 99,90" })));
        fixture
            .transport
            .push("new_affiliate_request", json!({ "user_name": "Bia" }));
        fixture
            .transport
            .push("commission_received", sealed(json!({ "amount": 12.5 })));

        let mut delivered = Vec::new();
        while delivered.len() < 3 {
            tokio::task::yield_now().await;
            delivered = fixture.notifications.lock().unwrap().clone();
        }

        assert_eq!(delivered[0].level, NotificationLevel::Error);
        assert_eq!(delivered[0].message, "Payment failed: R$ 99,90");
        assert_eq!(delivered[1].level, NotificationLevel::Info);
        assert_eq!(delivered[1].message, "New affiliate request: Bia");
        assert_eq!(delivered[2].message, "New commission: 12.5");
    }

    #[tokio::test]
    async fn dropping_detaches_the_listeners() {
        let fixture = authenticated().await;
        let connection = fixture.session.connection().unwrap();
        let events = BusinessEvents::attach(&connection, fixture.session.notifier());
        assert_eq!(connection.listener_count("payment_paid"), 1);

        drop(events);

        assert_eq!(connection.listener_count("payment_paid"), 0);
    }
}
