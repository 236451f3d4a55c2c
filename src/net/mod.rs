//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Pool needs a new connection
//!     → connector.rs (tower Service<Uri> used by hyper-util)
//!     → dns.rs (coalesced lookup)
//!     → TCP dial, address by address
//!     → tls.rs (rustls handshake for https, ALPN h2/http1.1)
//!     → stream.rs (TracedStream handed to the pool)
//!
//! Every phase is reported to the observability::trace hub.
//! connection.rs maps remote addresses to display ids for the batch.
//! ```
//!
//! # Design Decisions
//! - Addresses are dialed sequentially; the first success wins
//! - Reuse is reported by the stream itself, never inferred from ids
//! - IP literal hosts skip DNS

pub mod connection;
pub mod connector;
pub mod dns;
pub mod stream;
pub mod tls;

pub use connection::{ConnectionId, ConnectionState};
pub use connector::TracingConnector;
