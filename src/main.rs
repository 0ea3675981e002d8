//! Cradiator - headless driver for the build radiator core.
//!
//! # Overview
//!
//! Initializes logging, loads the configuration directory, then walks the
//! configured views once in rotation order and logs the feeds each one
//! would poll. Useful to check a configuration before putting it on a
//! wall screen.
//!
//! # Usage
//!
//! ```text
//! cradiator [CONFIG_DIR]
//! ```
//!
//! `CONFIG_DIR` defaults to `Cradiator Data`. Missing `Settings.yaml` and
//! `Views.yaml` files are created with defaults.

use anyhow::{Context, Result};
use cradiator::logging::{LogOptions, init_logging};
use cradiator::{APP_NAME, ConfigManager, ConfigSettings, VERSION};

const DEFAULT_CONFIG_DIR: &str = "Cradiator Data";

fn main() -> Result<()> {
    let _log_guard = init_logging(&LogOptions::default())?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());

    let config_manager = ConfigManager::new(&config_dir)?;
    config_manager.ensure_defaults()?;

    let mut settings = ConfigSettings::from_manager(&config_manager)?;
    settings.add_observer(|s: &ConfigSettings| {
        tracing::info!("Switched to view '{}' ({})", s.id(), s.skin_name());
    });
    settings
        .load()
        .with_context(|| format!("Failed to load configuration from {}", config_dir))?;

    tracing::info!("{}", settings);

    for _ in 0..settings.view_count().max(1) {
        let address = settings.address();

        if address.is_debug() {
            tracing::info!("View '{}': debug mode, no feeds polled", settings.id());
        } else if !address.is_valid() {
            tracing::warn!("View '{}': invalid address {:?}", settings.id(), settings.url());
        } else {
            for uri in address.uris() {
                tracing::info!(
                    "View '{}': polling {} every {}s",
                    settings.id(),
                    uri,
                    settings.poll_frequency()
                );
            }
        }

        settings.rotate_view();
    }

    tracing::info!("Configuration check complete");
    Ok(())
}
