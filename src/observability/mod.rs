//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Transport workers (net::connector, net::stream) and the executor produce:
//!     → trace.rs (TraceEvent routed through the TraceHub)
//!     → emitter.rs (curl-style lines, connection bookkeeping)
//!     → console.rs (stdout, or a buffer in tests)
//!
//! Internal diagnostics:
//!     → logging.rs (tracing subscriber on stderr)
//! ```
//!
//! # Design Decisions
//! - Verbose trace is user output, not logging; it never goes through `tracing`
//! - One observer per call, installed only in verbose mode
//! - Each handler writes a complete block of lines in one call

pub mod console;
pub mod emitter;
pub mod logging;
pub mod trace;

pub use console::Console;
pub use emitter::TraceEmitter;
pub use trace::{TraceEvent, TraceHub, TraceObserver};
