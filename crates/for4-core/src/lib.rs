#![doc = include_str!("../README.md")]

mod client_settings;
pub use client_settings::ClientSettings;
mod identity;
pub use identity::{Identity, UserId};
pub mod notifier;
pub use notifier::{ChannelNotifier, LogNotifier, Notification, NotificationLevel, Notifier};
