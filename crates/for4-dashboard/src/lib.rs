#![doc = include_str!("../README.md")]

mod business_events;
pub use business_events::BusinessEvents;
mod dashboard_client;
pub use dashboard_client::{
    DashboardClient, DashboardState, Loading, DEFAULT_PERFORMANCE_PERIOD,
};
mod error;
pub use error::DashboardError;
pub mod exchanges;
mod models;
pub use models::{
    format_notification_time, Notification, NotificationId, NotificationType, Priority,
};
mod notifications_client;
pub use notifications_client::{NotificationsClient, NotificationsState};
#[cfg(test)]
mod test_support;
