//! rcurl: a curl-style command-line HTTP client.
//!
//! Runs one or more requests, separated on the command line by `--next`,
//! over a single pooled connection client. In verbose mode it prints
//! curl-style trace lines tied to the connection lifecycle: DNS, TCP
//! connect, TLS handshake, request head, and return to the idle pool.
//!
//! ```text
//!  argv ─▶ cli ─▶ app (run loop) ─▶ http::executor ─▶ http::client ─▶ net::connector
//!                                        │                               │
//!                                        ▼                               ▼
//!                               observability::emitter ◀── TraceHub ◀── net::stream
//!                                        │
//!                                        ▼
//!                               net::connection (ids per remote address)
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;

pub use app::Application;
pub use error::{CurlError, CurlResult};
pub use http::request::Request;
