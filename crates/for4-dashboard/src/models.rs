use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use for4_core::NotificationLevel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Notification ids are numeric or strings depending on the backend store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(missing_docs)]
pub enum NotificationId {
    Number(i64),
    Text(String),
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationId::Number(id) => write!(f, "{id}"),
            NotificationId::Text(id) => f.write_str(id),
        }
    }
}

impl std::str::FromStr for NotificationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(NotificationId::Number)
            .unwrap_or_else(|_| NotificationId::Text(s.to_owned())))
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
    #[serde(other)]
    Unspecified,
}

impl Priority {
    /// Severity a listed notification is shown with.
    ///
    /// This is not the level of the arrival notice: [`Notification::notice`] celebrates a
    /// high priority notification as a success, while a list marks it as a warning.
    pub fn level(&self) -> NotificationLevel {
        match self {
            Priority::Urgent => NotificationLevel::Error,
            Priority::High => NotificationLevel::Warning,
            Priority::Normal | Priority::Low | Priority::Unspecified => NotificationLevel::Info,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Sale,
    Refund,
    Withdrawal,
    GoalAchieved,
    Affiliate,
    System,
    #[serde(other)]
    Other,
}

impl NotificationType {
    #[allow(missing_docs)]
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationType::Sale => "💰",
            NotificationType::Refund => "↩️",
            NotificationType::Withdrawal => "💸",
            NotificationType::GoalAchieved => "🎯",
            NotificationType::Affiliate => "🤝",
            NotificationType::System => "⚙️",
            NotificationType::Other => "📢",
        }
    }
}

/// An inbox notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[allow(missing_docs)]
    pub id: NotificationId,
    #[serde(default)]
    #[allow(missing_docs)]
    pub title: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub notification_type: Option<NotificationType>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub priority: Priority,
    #[serde(default)]
    #[allow(missing_docs)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub read_at: Option<DateTime<Utc>>,
    /// Remaining fields sent by the server.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    /// Icon for the notification type.
    pub fn icon(&self) -> &'static str {
        self.notification_type
            .unwrap_or(NotificationType::Other)
            .icon()
    }

    pub(crate) fn mark_read(&mut self, at: DateTime<Utc>) {
        self.read = true;
        self.read_at = Some(at);
    }

    /// The user-facing message raised when this notification arrives live.
    pub fn notice(&self) -> for4_core::Notification {
        let text = format!("{} {}: {}", self.icon(), self.title, self.message);
        match self.priority {
            Priority::Urgent => {
                for4_core::Notification::error(text).with_duration(Duration::from_secs(8))
            }
            Priority::High => {
                for4_core::Notification::success(text).with_duration(Duration::from_secs(6))
            }
            _ => for4_core::Notification::info(format!("{} {}", self.icon(), self.title))
                .with_duration(Duration::from_secs(4)),
        }
    }
}

/// Short relative age of a notification: `now`, `5m`, `3h`, `2d`, then the date as `dd/mm/yyyy`.
pub fn format_notification_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "now".to_owned()
    } else if minutes < 60 {
        format!("{minutes}m")
    } else if hours < 24 {
        format!("{hours}h")
    } else if days < 7 {
        format!("{days}d")
    } else {
        timestamp.format("%d/%m/%Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_server_notifications() {
        let notification: Notification = serde_json::from_value(json!({
            "id": 3,
            "title": "Sale",
            "message": "R$ 10,00",
            "type": "goal_achieved",
            "priority": "urgent",
            "read": false,
            "created_at": "2024-05-01T10:00:00Z",
            "user_id": 7
        }))
        .unwrap();

        assert_eq!(notification.id, NotificationId::Number(3));
        assert_eq!(notification.notification_type, Some(NotificationType::GoalAchieved));
        assert_eq!(notification.priority, Priority::Urgent);
        assert_eq!(notification.extra.get("user_id"), Some(&json!(7)));
        assert_eq!(notification.icon(), "🎯");
    }

    #[test]
    fn unknown_enums_fall_back() {
        let notification: Notification = serde_json::from_value(json!({
            "id": "n-1",
            "type": "marketing",
            "priority": "critical"
        }))
        .unwrap();

        assert_eq!(notification.notification_type, Some(NotificationType::Other));
        assert_eq!(notification.priority, Priority::Unspecified);
        assert_eq!(notification.priority.level(), NotificationLevel::Info);
    }

    #[test]
    fn formats_relative_times() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let ago = |seconds: i64| now - chrono::Duration::seconds(seconds);

        assert_eq!(format_notification_time(ago(30), now), "now");
        assert_eq!(format_notification_time(ago(5 * 60), now), "5m");
        assert_eq!(format_notification_time(ago(3 * 3600), now), "3h");
        assert_eq!(format_notification_time(ago(2 * 86400), now), "2d");
        assert_eq!(format_notification_time(ago(9 * 86400), now), "01/05/2024");
    }

    #[test]
    fn priority_decides_the_notice() {
        let mut notification: Notification =
            serde_json::from_value(json!({ "id": 1, "title": "T", "message": "M" })).unwrap();

        assert_eq!(notification.notice().level, NotificationLevel::Info);
        notification.priority = Priority::Urgent;
        assert_eq!(notification.notice().level, NotificationLevel::Error);
        assert!(notification.notice().message.ends_with("T: M"));
    }

    #[test]
    fn high_priority_is_listed_as_a_warning_but_announced_as_a_success() {
        let mut notification: Notification =
            serde_json::from_value(json!({ "id": 1, "title": "T", "message": "M" })).unwrap();
        notification.priority = Priority::High;

        assert_eq!(notification.priority.level(), NotificationLevel::Warning);
        assert_eq!(notification.notice().level, NotificationLevel::Success);
    }

    #[test]
    fn ids_parse_from_text() {
        assert_eq!("12".parse::<NotificationId>(), Ok(NotificationId::Number(12)));
        assert_eq!(
            "abc".parse::<NotificationId>(),
            Ok(NotificationId::Text("abc".to_owned()))
        );
    }
}
