//! mcserver core - platform-independent server lifecycle management
//!
//! This crate provides the configuration, error types and process traits
//! shared by the platform-specific launchers, together with the lifecycle
//! manager that owns the single game-server process.

pub mod backup;
pub mod cleaner;
mod config;
pub mod control;
mod error;
mod fetcher;
mod manager;
mod process;
mod stdio;
pub mod wrappers;

pub use cleaner::clean_dir;
pub use config::*;
pub use control::ControlChannel;
pub use error::*;
pub use fetcher::*;
pub use manager::*;
pub use process::*;
pub use stdio::*;
pub use wrappers::Lifecycle;
