//! Configuration validation.
//!
//! # Responsibilities
//! - Check value ranges (timeouts > 0)
//! - Check baseline headers are legal header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before the pooled client is built

use hyper::header::HeaderValue;
use thiserror::Error;

use crate::config::schema::ClientConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is not a valid header value: {value:?}")]
    InvalidHeaderValue { field: &'static str, value: String },
}

/// Validate the configuration, collecting every error found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.call.is_zero() {
        errors.push(ValidationError::ZeroDuration { field: "timeouts.call" });
    }
    if config.pool.idle_timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration { field: "pool.idle_timeout" });
    }

    for (field, value) in [
        ("request.user_agent", &config.request.user_agent),
        ("request.accept", &config.request.accept),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::Empty { field });
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
