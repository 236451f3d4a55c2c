//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ClientConfig::default()
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → borrowed by the run loop, the pooled client and the executor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; one instance per process
//! - All fields have defaults; no config file or environment input
//! - Validation is separate from construction so tests can tweak fields

pub mod schema;
pub mod validation;

pub use schema::ClientConfig;
pub use schema::PoolConfig;
pub use schema::TimeoutConfig;
pub use validation::{validate_config, ValidationError};
