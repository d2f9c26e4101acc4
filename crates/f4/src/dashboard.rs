use chrono::Utc;
use clap::Subcommand;
use for4_core::{ChannelNotifier, Notification as Notice, NotificationLevel};
use for4_dashboard::{
    format_notification_time, BusinessEvents, DashboardClient, Notification, NotificationId,
    NotificationsClient, DEFAULT_PERFORMANCE_PERIOD,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{
    app::App,
    render::{CommandOutput, CommandResult},
};

#[derive(Subcommand, Clone)]
pub enum DashboardCommands {
    #[command(long_about = "Show the financial overview.")]
    Overview,

    #[command(long_about = "Show sales performance over a period.")]
    Performance {
        #[arg(long, default_value = DEFAULT_PERFORMANCE_PERIOD, help = "Period such as 7d or 30d.")]
        period: String,
    },

    #[command(long_about = "Show the account statement.")]
    Statement,

    #[command(long_about = "Load every dashboard area at once.")]
    Refresh,
}

impl DashboardCommands {
    pub async fn run(self, app: &App) -> CommandResult {
        let connection = app.connect().await?;
        let dashboard = DashboardClient::new(app.session.clone(), connection);

        match self {
            DashboardCommands::Overview => CommandOutput::object(&dashboard.fetch_overview().await?),
            DashboardCommands::Performance { period } => {
                CommandOutput::object(&dashboard.fetch_performance(Some(&period)).await?)
            }
            DashboardCommands::Statement => {
                CommandOutput::object(&dashboard.fetch_statement().await?)
            }
            DashboardCommands::Refresh => {
                dashboard.refresh_all().await?;
                let state = dashboard.state();
                CommandOutput::object(&serde_json::json!({
                    "overview": state.overview,
                    "performance": state.performance,
                    "statement": state.statement,
                    "unreadNotifications": state.unread_notifications(),
                }))
            }
        }
    }
}

#[derive(Subcommand, Clone)]
pub enum NotificationsCommands {
    #[command(long_about = "List recent notifications.")]
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,

        #[arg(long, help = "Only unread notifications.")]
        unread: bool,
    },

    #[command(long_about = "Mark a notification as read.")]
    Read { id: NotificationId },

    #[command(long_about = "Mark every unread notification as read.")]
    ReadAll,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRow<'a> {
    id: &'a NotificationId,
    icon: &'static str,
    level: NotificationLevel,
    title: &'a str,
    message: &'a str,
    read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<String>,
}

impl<'a> From<&'a Notification> for NotificationRow<'a> {
    fn from(notification: &'a Notification) -> Self {
        NotificationRow {
            id: &notification.id,
            icon: notification.icon(),
            level: notification.priority.level(),
            title: &notification.title,
            message: &notification.message,
            read: notification.read,
            age: notification
                .created_at
                .map(|at| format_notification_time(at, Utc::now())),
        }
    }
}

impl NotificationsCommands {
    pub async fn run(self, app: &App) -> CommandResult {
        let connection = app.connect().await?;
        let notifications = NotificationsClient::new(app.session.clone(), connection);

        match self {
            NotificationsCommands::List { limit, unread } => {
                let list = notifications.fetch(Some(limit), unread).await?;
                let rows: Vec<NotificationRow> = list.iter().map(NotificationRow::from).collect();
                CommandOutput::object(&rows)
            }
            NotificationsCommands::Read { id } => {
                notifications.mark_as_read(&id).await?;
                Ok(().into())
            }
            NotificationsCommands::ReadAll => {
                notifications.fetch(None, true).await?;
                notifications.mark_all_as_read().await?;
                Ok(().into())
            }
        }
    }
}

/// Follow live events until Ctrl-C, printing each notice as it arrives.
pub async fn watch(app: &App, notices: &ChannelNotifier) -> CommandResult {
    let mut notices = notices.subscribe();
    let connection = app.connect().await?;
    let dashboard = DashboardClient::new(app.session.clone(), connection.clone());
    dashboard.start_live_updates();
    let _events = BusinessEvents::attach(&connection, app.session.notifier());

    let mut state = connection.subscribe_state();
    let mut offline = connection.subscribe_offline();
    info!(url = %app.settings.socket_url, "Watching live events, press Ctrl-C to stop");
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", notice_line(&notice)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notices dropped"),
                Err(RecvError::Closed) => break,
            },
            _ = offline.wait_for(|offline| *offline) => {
                warn!("Connection lost and reconnection gave up");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = ?current, "Connection state changed");
            }
        }
    }

    dashboard.stop_live_updates();
    let received = dashboard.state().notifications.len();
    Ok(format!("Stopped. {received} new notification(s) received.").into())
}

fn notice_line(notice: &Notice) -> String {
    let level = match notice.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Success => "success",
        NotificationLevel::Warning => "warning",
        NotificationLevel::Error => "error",
    };
    format!("[{level}] {}", notice.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_are_prefixed_with_their_level() {
        let line = notice_line(&Notice::success("New sale: R$ 10.50 via pix!"));

        assert_eq!(line, "[success] New sale: R$ 10.50 via pix!");
    }

    #[test]
    fn listed_notifications_carry_their_priority_level() {
        let notification: Notification = serde_json::from_value(serde_json::json!({
            "id": 7,
            "title": "Meta",
            "message": "Batida",
            "priority": "high",
        }))
        .unwrap();

        let row = serde_json::to_value(NotificationRow::from(&notification)).unwrap();

        assert_eq!(row["level"], "warning");
        assert_eq!(row["title"], "Meta");
    }
}
