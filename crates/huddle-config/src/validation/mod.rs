//! Full configuration validation.
//!
//! Validates numeric ranges and URL schemes. Each section has its own
//! function; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod helpers;
mod sections;

#[cfg(test)]
mod tests;

use crate::schema::HuddleConfig;
use huddle_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HuddleConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_signaling(&mut errors, config);
    sections::validate_call(&mut errors, config);
    sections::validate_media(&mut errors, config);
    sections::validate_relay(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
