#![doc = include_str!("../README.md")]

/// This module provides a generic repository interface for storing and retrieving items.
pub mod repository;

/// Type-safe settings stored in a repository.
pub mod settings;

mod file;
mod memory;

pub use file::JsonFileRepository;
pub use memory::MemoryRepository;
pub use settings::{Key, Setting, SettingItem, SettingsError};
