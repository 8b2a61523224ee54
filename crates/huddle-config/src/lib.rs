//! Huddle configuration system.
//!
//! TOML-based configuration for the call client and the signaling relay.
//! Every section uses serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use huddle_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("relay at {}", config.signaling.url);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    CallConfig, HuddleConfig, LogLevel, LoggingConfig, MediaConfig, RelayConfig,
    SignalingConfig,
};
pub use toml_loader::{load_default, load_from_path};

use huddle_common::ConfigError;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<HuddleConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}
