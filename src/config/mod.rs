//! Configuration loading and per-application settings

pub mod app;
pub mod settings;

pub use app::{AppConfig, Hooks};
pub use settings::Config;

/// Timeout applied to every external pipeline command
pub const STEP_TIMEOUT_SECS: u64 = 3600;
