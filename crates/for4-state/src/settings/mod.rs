//! Type-safe settings stored on top of a [`Repository`](crate::repository::Repository).
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use for4_state::{register_setting_key, MemoryRepository, Setting, SettingItem};
//!
//! register_setting_key!(const TOKEN: String = "token");
//!
//! # async fn example() -> Result<(), for4_state::SettingsError> {
//! let repository = Arc::new(MemoryRepository::<SettingItem>::new());
//! let token = Setting::new(repository, TOKEN);
//!
//! token.update("T".to_owned()).await?;
//! assert_eq!(token.get().await?, Some("T".to_owned()));
//!
//! token.delete().await?;
//! # Ok(())
//! # }
//! ```

mod key;
mod setting;

pub use key::Key;
pub use setting::{Setting, SettingItem, SettingsError};
