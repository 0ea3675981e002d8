// Cradiator - build radiator core
//
// This is the library crate containing feed address resolution and the
// rotating view configuration. The binary crate (main.rs) is a headless driver.

pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigManager};
pub use models::{GuiltStrategy, ViewSettings};
pub use services::{CradiatorAddress, FeedAddress, resolve};
pub use state::{ConfigField, ConfigObserver, ConfigSettings};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
