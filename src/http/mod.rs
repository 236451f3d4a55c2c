//! HTTP layer.
//!
//! # Data Flow
//! ```text
//! Request (from cli)
//!     → request.rs (method, URL, baseline + user headers, body)
//!     → executor.rs (installs trace observer, performs the call)
//!     → client.rs (hyper-util pool over net::connector)
//!     → response.rs (status/header echo, body copy)
//! ```
//!
//! # Design Decisions
//! - One pooled client per process, built before the first request
//! - Requests run strictly one after another
//! - One deadline covers dialing, sending and reading the body

pub mod client;
pub mod executor;
pub mod request;
pub mod response;

pub use client::HttpClient;
pub use executor::RequestExecutor;
pub use request::{Flags, Request, Scheme};
