use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::Utc;
use for4_auth::SessionClient;
use for4_core::Notification as Notice;
use for4_realtime::{CallOptions, ConnectionManager, PushEvent, Subscription, SubscriptionKind};
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, warn};

use crate::{
    exchanges::{
        GetNotifications, GetNotificationsRequest, MarkNotificationRead,
        MarkNotificationReadRequest,
    },
    DashboardError, Notification, NotificationId,
};

const DEFAULT_LIMIT: u32 = 20;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MARK_TIMEOUT: Duration = Duration::from_secs(5);

/// The notification inbox.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationsState {
    #[allow(missing_docs)]
    pub notifications: Vec<Notification>,
    /// Unread count as reported by the server and adjusted locally.
    pub unread_count: u64,
    #[allow(missing_docs)]
    pub loading: bool,
}

impl NotificationsState {
    /// Loaded notifications not yet read.
    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(|n| !n.read)
    }

    #[allow(missing_docs)]
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// Notification inbox of the authenticated user.
#[derive(Clone)]
pub struct NotificationsClient {
    inner: Arc<Inner>,
}

struct Inner {
    session: SessionClient,
    connection: ConnectionManager,
    state: watch::Sender<NotificationsState>,
    live: Mutex<Option<Subscription>>,
}

impl NotificationsClient {
    #[allow(missing_docs)]
    pub fn new(session: SessionClient, connection: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                connection,
                state: watch::channel(NotificationsState::default()).0,
                live: Mutex::new(None),
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
    pub fn state(&self) -> NotificationsState {
        self.inner.state.borrow().clone()
    }

    #[allow(missing_docs)]
    pub fn subscribe(&self) -> watch::Receiver<NotificationsState> {
        self.inner.state.subscribe()
    }

    #[allow(missing_docs)]
    pub fn connected(&self) -> bool {
        self.inner.connection.connected()
    }

    /// Load the inbox. `limit` defaults to 20.
    pub async fn fetch(
        &self,
        limit: Option<u32>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, DashboardError> {
        self.update(|state| state.loading = true);
        let result = async {
            let request = GetNotificationsRequest {
                limit: limit.unwrap_or(DEFAULT_LIMIT),
                unread_only,
                token: self.token().await?,
            };
            let response = self
                .inner
                .connection
                .call_exchange::<GetNotifications>(
                    &request,
                    CallOptions::default().with_timeout(FETCH_TIMEOUT),
                )
                .await?;
            Ok::<_, DashboardError>(response.data)
        }
        .await;
        self.update(|state| state.loading = false);

        match result {
            Ok(page) => {
                let unread_count = page.unread_count.unwrap_or_else(|| {
                    page.notifications.iter().filter(|n| !n.read).count() as u64
                });
                self.update(|state| {
                    state.notifications = page.notifications.clone();
                    state.unread_count = unread_count;
                });
                Ok(page.notifications)
            }
            Err(error) => {
                self.show(&error);
                Err(error)
            }
        }
    }

    /// Mark one notification read. Decrements the unread count, never below zero.
    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<(), DashboardError> {
        let result = async {
            let request = MarkNotificationReadRequest {
                notification_id: id.clone(),
                token: self.token().await?,
            };
            self.inner
                .connection
                .call_exchange::<MarkNotificationRead>(
                    &request,
                    CallOptions::default().with_timeout(MARK_TIMEOUT),
                )
                .await?;
            Ok::<_, DashboardError>(())
        }
        .await;

        if let Err(error) = result {
            self.show(&error);
            return Err(error);
        }

        let now = Utc::now();
        self.update(|state| {
            for notification in state.notifications.iter_mut().filter(|n| &n.id == id) {
                notification.mark_read(now);
            }
            state.unread_count = state.unread_count.saturating_sub(1);
        });
        Ok(())
    }

    /// Mark every loaded unread notification read, concurrently.
    pub async fn mark_all_as_read(&self) -> Result<(), DashboardError> {
        let unread: Vec<NotificationId> = self
            .inner
            .state
            .borrow()
            .unread()
            .map(|n| n.id.clone())
            .collect();

        let results = join_all(unread.iter().map(|id| self.mark_as_read(id))).await;
        let notifier = self.inner.session.notifier();
        match results.into_iter().find_map(Result::err) {
            None => {
                notifier.notify(Notice::success("All notifications marked as read"));
                Ok(())
            }
            Some(error) => {
                notifier.notify(Notice::error("Failed to mark notifications as read"));
                Err(error)
            }
        }
    }

    /// Put a notification received live at the top of the inbox.
    pub fn add_notification(&self, notification: Notification) {
        self.update(|state| {
            state.notifications.insert(0, notification);
            state.unread_count += 1;
        });
    }

    /// Follow `new_notification` pushes. Calling it again is a no-op.
    pub fn start_live_updates(&self) {
        let mut live = self.lock_live();
        if live.is_some() {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        *live = Some(self.inner.connection.on(
            PushEvent::NewNotification.as_str(),
            SubscriptionKind::Persistent,
            move |payload: &Value| {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                let client = NotificationsClient { inner };
                let notification = match client.inner.connection.decode_push(payload) {
                    Ok(message) => serde_json::from_value::<Notification>(message)
                        .map_err(|e| e.to_string()),
                    Err(error) => Err(error.to_string()),
                };
                match notification {
                    Ok(notification) => {
                        client.inner.session.notifier().notify(notification.notice());
                        client.add_notification(notification);
                    }
                    Err(error) => error!(%error, "Malformed notification"),
                }
            },
        ));
    }

    /// Stop following pushes.
    pub fn stop_live_updates(&self) {
        self.lock_live().take();
    }

    fn show(&self, error: &DashboardError) {
        warn!(%error, "Notification request failed");
        self.inner
            .session
            .notifier()
            .notify(Notice::error(error.user_message()));
    }

    async fn token(&self) -> Result<String, DashboardError> {
        self.inner
            .session
            .token()
            .await?
            .ok_or(DashboardError::NotAuthenticated)
    }

    fn update(&self, modify: impl FnOnce(&mut NotificationsState)) {
        self.inner.state.send_modify(modify);
    }

    fn lock_live(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use for4_core::NotificationLevel;
    use serde_json::json;

    use super::*;
    use crate::test_support::{authenticated, respond, sealed};

    fn inbox() -> Value {
        json!({
            "success": true,
            "data": {
                "notifications": [
                    { "id": 1, "title": "Sale", "read": false },
                    { "id": 2, "title": "Sale", "read": true },
                    { "id": 3, "title": "Goal", "read": false }
                ],
                "unread_count": 2
            }
        })
    }

    #[tokio::test]
    async fn fetch_uses_inbox_defaults() {
        let fixture = authenticated().await;
        respond(&fixture.transport, "GetNotifications", |request| {
            assert_eq!(
                request,
                json!({ "limit": 20, "unread_only": false, "token": "T" })
            );
            inbox()
        });
        let client = NotificationsClient::from_session(&fixture.session).unwrap();

        client.fetch(None, false).await.unwrap();

        let state = client.state();
        assert_eq!(state.notifications.len(), 3);
        assert_eq!(state.unread_count, 2);
        assert!(state.has_unread());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn unread_count_never_goes_negative() {
        let fixture = authenticated().await;
        respond(&fixture.transport, "MarkNotificationRead", |_| {
            json!({ "success": true })
        });
        let client = NotificationsClient::from_session(&fixture.session).unwrap();

        client
            .mark_as_read(&NotificationId::Number(1))
            .await
            .unwrap();

        assert_eq!(client.state().unread_count, 0);
    }

    #[tokio::test]
    async fn marks_everything_read() {
        let fixture = authenticated().await;
        respond(&fixture.transport, "GetNotifications", |_| inbox());
        respond(&fixture.transport, "MarkNotificationRead", |_| {
            json!({ "success": true })
        });
        let client = NotificationsClient::from_session(&fixture.session).unwrap();
        client.fetch(None, false).await.unwrap();

        client.mark_all_as_read().await.unwrap();

        let state = client.state();
        assert_eq!(state.unread().count(), 0);
        assert_eq!(state.unread_count, 0);
        assert_eq!(
            fixture.transport.sent_named("MarkNotificationRead").len(),
            2
        );
        let notifications = fixture.notifications.lock().unwrap();
        assert_eq!(
            notifications.last().unwrap().message,
            "All notifications marked as read"
        );
    }

    #[tokio::test]
    async fn mark_all_reports_failures() {
        let fixture = authenticated().await;
        respond(&fixture.transport, "GetNotifications", |_| inbox());
        respond(&fixture.transport, "MarkNotificationRead", |_| {
            json!({ "success": false, "message": "Not found" })
        });
        let client = NotificationsClient::from_session(&fixture.session).unwrap();
        client.fetch(None, false).await.unwrap();

        let result = client.mark_all_as_read().await;

        assert!(result.is_err());
        assert_eq!(client.state().unread_count, 2);
        let notifications = fixture.notifications.lock().unwrap();
        let last = notifications.last().unwrap();
        assert_eq!(last.level, NotificationLevel::Error);
        assert_eq!(last.message, "Failed to mark notifications as read");
    }

    #[tokio::test]
    async fn live_notifications_increment_the_count() {
        let fixture = authenticated().await;
        let client = NotificationsClient::from_session(&fixture.session).unwrap();
        client.start_live_updates();
        let mut state = client.subscribe();

        fixture.transport.push(
            "new_notification",
            sealed(json!({ "id": "n-1", "title": "Payout", "message": "Sent", "priority": "high" })),
        );
        state.wait_for(|s| s.unread_count == 1).await.unwrap();

        assert_eq!(
            client.state().notifications[0].id,
            NotificationId::Text("n-1".to_owned())
        );
        let notifications = fixture.notifications.lock().unwrap();
        assert_eq!(notifications.last().unwrap().level, NotificationLevel::Success);
    }
}
