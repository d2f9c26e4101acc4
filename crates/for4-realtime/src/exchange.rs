//! Named request/response exchanges and push events.

use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// A request event paired with its `<NAME>Response` event.
///
/// Implementors are marker types, the request and response bodies are the associated types:
///
/// ```
/// use for4_realtime::Exchange;
/// use serde::{Deserialize, Serialize};
///
/// struct ForgotPassword;
///
/// #[derive(Serialize)]
/// struct ForgotPasswordRequest {
///     email: String,
/// }
///
/// #[derive(Deserialize)]
/// struct ForgotPasswordResponse {
///     message: Option<String>,
/// }
///
/// impl Exchange for ForgotPassword {
///     const NAME: &'static str = "ForgotPassword";
///     type Request = ForgotPasswordRequest;
///     type Response = ForgotPasswordResponse;
/// }
///
/// assert_eq!(ForgotPassword::response_event(), "ForgotPasswordResponse");
/// ```
pub trait Exchange {
    /// Name of the request event.
    const NAME: &'static str;
    #[allow(missing_docs)]
    type Request: Serialize + Send + Sync;
    /// The body of a successful response. Deserialized from the whole response object.
    type Response: DeserializeOwned;

    /// Name of the event the response arrives on.
    fn response_event() -> String {
        response_event(Self::NAME)
    }
}

/// `<request_event>Response`.
pub fn response_event(request_event: &str) -> String {
    format!("{request_event}Response")
}

/// Events the server pushes without a preceding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PushEvent {
    NewNotification,
    NewSale,
    DashboardUpdate,
    PaymentCreated,
    PaymentPaid,
    PaymentFailed,
    WithdrawalProcessed,
    CommissionReceived,
    NewAffiliateRequest,
}

impl PushEvent {
    #[allow(missing_docs)]
    pub const ALL: [PushEvent; 9] = [
        PushEvent::NewNotification,
        PushEvent::NewSale,
        PushEvent::DashboardUpdate,
        PushEvent::PaymentCreated,
        PushEvent::PaymentPaid,
        PushEvent::PaymentFailed,
        PushEvent::WithdrawalProcessed,
        PushEvent::CommissionReceived,
        PushEvent::NewAffiliateRequest,
    ];

    /// The event name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PushEvent::NewNotification => "new_notification",
            PushEvent::NewSale => "new_sale",
            PushEvent::DashboardUpdate => "dashboard_update",
            PushEvent::PaymentCreated => "payment_created",
            PushEvent::PaymentPaid => "payment_paid",
            PushEvent::PaymentFailed => "payment_failed",
            PushEvent::WithdrawalProcessed => "withdrawal_processed",
            PushEvent::CommissionReceived => "commission_received",
            PushEvent::NewAffiliateRequest => "new_affiliate_request",
        }
    }
}

impl fmt::Display for PushEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown push event {0:?}")]
pub struct UnknownPushEvent(pub String);

impl FromStr for PushEvent {
    type Err = UnknownPushEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PushEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownPushEvent(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_event_names_round_trip() {
        for event in PushEvent::ALL {
            assert_eq!(event.as_str().parse::<PushEvent>(), Ok(event));
        }
        assert!("LoginResponse".parse::<PushEvent>().is_err());
    }
}
