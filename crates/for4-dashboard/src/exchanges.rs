//! Dashboard request/response exchanges. Every request carries the session token.

use for4_auth::exchanges::{Acknowledgement, TokenRequest};
use for4_realtime::Exchange;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Notification, NotificationId};

/// Successful responses wrap their payload in `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    #[allow(missing_docs)]
    pub data: T,
}

/// Financial overview.
pub struct DadosDashboard;

impl Exchange for DadosDashboard {
    const NAME: &'static str = "DadosDashboard";
    type Request = TokenRequest;
    type Response = DataResponse<Map<String, Value>>;
}

/// Sales performance over a period such as `7d`.
pub struct PerformanceDashboard;

#[allow(missing_docs)]
#[derive(Clone, Serialize)]
pub struct PerformanceRequest {
    pub period: String,
    pub token: String,
}

impl Exchange for PerformanceDashboard {
    const NAME: &'static str = "PerformanceDashboard";
    type Request = PerformanceRequest;
    type Response = DataResponse<Value>;
}

/// Account statement.
pub struct StatementDashboard;

impl Exchange for StatementDashboard {
    const NAME: &'static str = "StatementDashboard";
    type Request = TokenRequest;
    type Response = DataResponse<Value>;
}

/// A page of the notification inbox.
pub struct GetNotifications;

#[allow(missing_docs)]
#[derive(Clone, Serialize)]
pub struct GetNotificationsRequest {
    pub limit: u32,
    pub unread_only: bool,
    pub token: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationPage {
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Unread notifications on the server, which may exceed the page.
    #[serde(default)]
    pub unread_count: Option<u64>,
}

impl Exchange for GetNotifications {
    const NAME: &'static str = "GetNotifications";
    type Request = GetNotificationsRequest;
    type Response = DataResponse<NotificationPage>;
}

/// Mark one notification as read.
pub struct MarkNotificationRead;

#[allow(missing_docs)]
#[derive(Clone, Serialize)]
pub struct MarkNotificationReadRequest {
    pub notification_id: NotificationId,
    pub token: String,
}

impl Exchange for MarkNotificationRead {
    const NAME: &'static str = "MarkNotificationRead";
    type Request = MarkNotificationReadRequest;
    type Response = Acknowledgement;
}
