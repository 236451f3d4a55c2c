//! Configuration schema definitions.
//!
//! This module defines the configuration consumed by the run loop. All
//! values come from `Default`; nothing is read from disk or the environment.

use std::time::Duration;

/// Root configuration for a batch run.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Baseline request headers.
    pub request: RequestDefaults,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Idle connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections kept per host.
    pub max_idle_per_host: usize,

    /// How long an idle connection stays in the pool.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Ceiling for one whole call, from dial to the last body byte.
    pub call: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call: Duration::from_secs(15),
        }
    }
}

/// Baseline header values applied to every request.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    /// `User-Agent` sent with every call.
    pub user_agent: String,

    /// `Accept` value when the request does not override it.
    pub accept: String,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            user_agent: "rcurl/1.0".to_string(),
            accept: "*/*".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "rcurl=warn".to_string(),
        }
    }
}
