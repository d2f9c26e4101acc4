use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::Utc;
use for4_auth::{exchanges::TokenRequest, SessionClient};
use for4_core::{Notification as Notice, Notifier};
use for4_realtime::{
    CallError, CallOptions, ConnectionManager, PushEvent, Subscription, SubscriptionKind,
};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::{
    exchanges::{
        DadosDashboard, GetNotifications, GetNotificationsRequest, MarkNotificationRead,
        MarkNotificationReadRequest, PerformanceDashboard, PerformanceRequest, StatementDashboard,
    },
    DashboardError, Notification, NotificationId,
};

/// Period used when none is given to [`DashboardClient::fetch_performance`].
pub const DEFAULT_PERFORMANCE_PERIOD: &str = "7d";
const DEFAULT_NOTIFICATION_LIMIT: u32 = 10;
const NOTIFICATIONS_TIMEOUT: Duration = Duration::from_secs(10);
const UPDATE_REFETCH_DELAY: Duration = Duration::from_secs(1);
const SALE_REFETCH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Area {
    Overview,
    Performance,
    Statement,
    Notifications,
}

/// Which dashboard areas have a request in flight.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loading {
    pub overview: bool,
    pub performance: bool,
    pub statement: bool,
    pub notifications: bool,
}

impl Loading {
    /// Whether any area is loading.
    pub fn any(&self) -> bool {
        self.overview || self.performance || self.statement || self.notifications
    }

    fn set(&mut self, area: Area, value: bool) {
        match area {
            Area::Overview => self.overview = value,
            Area::Performance => self.performance = value,
            Area::Statement => self.statement = value,
            Area::Notifications => self.notifications = value,
        }
    }
}

/// Everything the dashboard currently knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    #[allow(missing_docs)]
    pub overview: Option<Map<String, Value>>,
    #[allow(missing_docs)]
    pub performance: Option<Value>,
    /// Period of the last performance request.
    pub performance_period: Option<String>,
    #[allow(missing_docs)]
    pub statement: Option<Value>,
    #[allow(missing_docs)]
    pub notifications: Vec<Notification>,
    #[allow(missing_docs)]
    pub loading: Loading,
    /// User-facing message of the last failed request.
    pub error: Option<String>,
}

impl DashboardState {
    #[allow(missing_docs)]
    pub fn is_loading(&self) -> bool {
        self.loading.any()
    }

    /// Number of loaded notifications not yet read.
    pub fn unread_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

/// Loads dashboard data over the session connection and keeps it current from push events.
#[derive(Clone)]
pub struct DashboardClient {
    inner: Arc<Inner>,
}

struct Inner {
    session: SessionClient,
    connection: ConnectionManager,
    state: watch::Sender<DashboardState>,
    live: Mutex<Vec<Subscription>>,
}

impl DashboardClient {
    #[allow(missing_docs)]
    pub fn new(session: SessionClient, connection: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                connection,
                state: watch::channel(DashboardState::default()).0,
                live: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a client on the connection of an authenticated session.
    pub fn from_session(session: &SessionClient) -> Result<Self, DashboardError> {
        let connection = session
            .connection()
            .ok_or(DashboardError::NotAuthenticated)?;
        Ok(Self::new(session.clone(), connection))
    }

    #[allow(missing_docs)]
    pub fn state(&self) -> DashboardState {
        self.inner.state.borrow().clone()
    }

    #[allow(missing_docs)]
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.inner.state.subscribe()
    }

    #[allow(missing_docs)]
    pub fn connected(&self) -> bool {
        self.inner.connection.connected()
    }

    /// Load the financial overview.
    pub async fn fetch_overview(&self) -> Result<Map<String, Value>, DashboardError> {
        let data = self
            .track(Area::Overview, async {
                let token = self.token().await?;
                let response = self
                    .inner
                    .connection
                    .call_exchange::<DadosDashboard>(&TokenRequest { token }, CallOptions::default())
                    .await?;
                Ok(response.data)
            })
            .await?;

        self.update(|state| state.overview = Some(data.clone()));
        Ok(data)
    }

    /// Load sales performance for `period`, [`DEFAULT_PERFORMANCE_PERIOD`] when `None`.
    pub async fn fetch_performance(&self, period: Option<&str>) -> Result<Value, DashboardError> {
        let period = period.unwrap_or(DEFAULT_PERFORMANCE_PERIOD).to_owned();
        let data = self
            .track(Area::Performance, async {
                let request = PerformanceRequest {
                    period: period.clone(),
                    token: self.token().await?,
                };
                let response = self
                    .inner
                    .connection
                    .call_exchange::<PerformanceDashboard>(&request, CallOptions::default())
                    .await?;
                Ok(response.data)
            })
            .await?;

        self.update(|state| {
            state.performance = Some(data.clone());
            state.performance_period = Some(period);
        });
        Ok(data)
    }

    /// Load the account statement.
    pub async fn fetch_statement(&self) -> Result<Value, DashboardError> {
        let data = self
            .track(Area::Statement, async {
                let token = self.token().await?;
                let response = self
                    .inner
                    .connection
                    .call_exchange::<StatementDashboard>(
                        &TokenRequest { token },
                        CallOptions::default(),
                    )
                    .await?;
                Ok(response.data)
            })
            .await?;

        self.update(|state| state.statement = Some(data.clone()));
        Ok(data)
    }

    /// Load the most recent notifications. `limit` defaults to 10.
    pub async fn fetch_notifications(
        &self,
        limit: Option<u32>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, DashboardError> {
        let page = self
            .track(Area::Notifications, async {
                let request = GetNotificationsRequest {
                    limit: limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT),
                    unread_only,
                    token: self.token().await?,
                };
                let response = self
                    .inner
                    .connection
                    .call_exchange::<GetNotifications>(
                        &request,
                        CallOptions::default().with_timeout(NOTIFICATIONS_TIMEOUT),
                    )
                    .await?;
                Ok(response.data)
            })
            .await?;

        self.update(|state| state.notifications = page.notifications.clone());
        Ok(page.notifications)
    }

    /// Mark a notification read on the server and in the loaded list.
    pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), DashboardError> {
        let result = async {
            let request = MarkNotificationReadRequest {
                notification_id: id.clone(),
                token: self.token().await?,
            };
            self.inner
                .connection
                .call_exchange::<MarkNotificationRead>(&request, CallOptions::default())
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                let now = Utc::now();
                self.update(|state| {
                    for notification in state.notifications.iter_mut().filter(|n| &n.id == id) {
                        notification.mark_read(now);
                    }
                });
                Ok(())
            }
            Err(error) => {
                self.report(&error).await;
                Err(error)
            }
        }
    }

    /// Reload every area concurrently. Returns the first failure, after all requests finished.
    pub async fn refresh_all(&self) -> Result<(), DashboardError> {
        let (overview, performance, statement, notifications) = tokio::join!(
            self.fetch_overview(),
            self.fetch_performance(None),
            self.fetch_statement(),
            self.fetch_notifications(None, false),
        );
        overview?;
        performance?;
        statement?;
        notifications?;

        self.notifier().notify(Notice::success("Data refreshed!"));
        Ok(())
    }

    /// Follow `dashboard_update`, `new_sale` and `new_notification`. Calling it again is a no-op.
    pub fn start_live_updates(&self) {
        let mut live = self.lock_live();
        if !live.is_empty() {
            return;
        }

        let connection = &self.inner.connection;
        live.push(connection.on(
            PushEvent::DashboardUpdate.as_str(),
            SubscriptionKind::Persistent,
            self.push_handler(Self::on_dashboard_update),
        ));
        live.push(connection.on(
            PushEvent::NewSale.as_str(),
            SubscriptionKind::Persistent,
            self.push_handler(Self::on_new_sale),
        ));
        live.push(connection.on(
            PushEvent::NewNotification.as_str(),
            SubscriptionKind::Persistent,
            self.push_handler(Self::on_new_notification),
        ));
    }

    /// Stop following push events.
    pub fn stop_live_updates(&self) {
        self.lock_live().clear();
    }

    fn push_handler(&self, on_event: fn(&Self, Value)) -> impl Fn(&Value) + Send + Sync + 'static {
        // Weak, the subscriptions live inside the client
        let inner = Arc::downgrade(&self.inner);
        move |payload: &Value| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let client = DashboardClient { inner };
            match client.inner.connection.decode_push(payload) {
                Ok(message) => on_event(&client, message),
                Err(error) => error!(%error, "Failed to open push event"),
            }
        }
    }

    fn on_dashboard_update(&self, update: Value) {
        if let Some(Value::Object(overview)) = update.get("overview") {
            self.update(|state| {
                state
                    .overview
                    .get_or_insert_with(Map::new)
                    .extend(overview.clone());
            });
        }
        self.notifier()
            .notify(Notice::success("Dashboard updated in real time!"));

        let client = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(UPDATE_REFETCH_DELAY).await;
            let _ = client.fetch_overview().await;
        });
    }

    fn on_new_sale(&self, sale: Value) {
        let amount = sale.get("amount").and_then(Value::as_f64).unwrap_or_default();
        let method = sale
            .get("payment_method")
            .and_then(Value::as_str)
            .unwrap_or("unknown method");
        self.notifier().notify(
            Notice::success(format!("New sale: R$ {amount:.2} via {method}!"))
                .with_duration(Duration::from_secs(6)),
        );

        let client = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SALE_REFETCH_DELAY).await;
            let period = client.state().performance_period;
            let _ = tokio::join!(
                client.fetch_overview(),
                client.fetch_performance(period.as_deref()),
            );
        });
    }

    fn on_new_notification(&self, message: Value) {
        match serde_json::from_value::<Notification>(message) {
            Ok(notification) => {
                self.notifier().notify(notification.notice());
                self.update(|state| state.notifications.insert(0, notification));
            }
            Err(error) => error!(%error, "Malformed notification"),
        }
    }

    async fn track<T>(
        &self,
        area: Area,
        work: impl Future<Output = Result<T, DashboardError>>,
    ) -> Result<T, DashboardError> {
        self.update(|state| {
            state.loading.set(area, true);
            state.error = None;
        });
        let result = work.await;
        self.update(|state| state.loading.set(area, false));

        if let Err(error) = &result {
            self.report(error).await;
        }
        result
    }

    async fn report(&self, error: &DashboardError) {
        let message = error.user_message();
        self.update(|state| state.error = Some(message.clone()));

        if !matches!(error, DashboardError::Call(CallError::LogicalFailure { .. })) {
            warn!(%error, "Dashboard request failed");
        }
        self.notifier().notify(Notice::error(message));

        if error.is_unauthorized() {
            debug!("Credential rejected, ending session");
            if let Err(error) = self.inner.session.invalidate().await {
                warn!(%error, "Failed to end session");
            }
        }
    }

    async fn token(&self) -> Result<String, DashboardError> {
        self.inner
            .session
            .token()
            .await?
            .ok_or(DashboardError::NotAuthenticated)
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        self.inner.session.notifier()
    }

    fn update(&self, modify: impl FnOnce(&mut DashboardState)) {
        self.inner.state.send_modify(modify);
    }

    fn lock_live(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
