//! Connection identity tracking.
//!
//! # Responsibilities
//! - Assign a stable small id to every remote address seen in the batch
//! - Remember the most recently recorded connection
//! - Stay consistent when several dials complete at once
//!
//! Reuse is never derived here. The transport reports it on its own
//! (see `net::stream`); this module only supplies display ids.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Identifier of a remote connection endpoint, assigned in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Formats an optional id, using `-1` for "no connection yet".
pub struct DisplayId(pub Option<ConnectionId>);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{}", id),
            None => f.write_str("-1"),
        }
    }
}

/// Key shared by the pool connections able to serve `scheme://host:port`.
///
/// IPv6 hosts compare without their brackets.
pub fn pool_key(scheme: &str, host: &str, port: u16) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    format!("{}://{}:{}", scheme, host, port)
}

#[derive(Debug, Default)]
struct Registry {
    /// Next id to hand out; ids only advance on a new address.
    next: u64,
    by_addr: HashMap<String, ConnectionId>,
    last: Option<(ConnectionId, String)>,
}

/// Batch-wide connection registry.
///
/// Created once by the run loop and shared by reference with the executor
/// and every trace emitter. All reads and writes go through one mutex, held
/// only for the check-and-assign sequence.
#[derive(Debug, Default)]
pub struct ConnectionState {
    inner: Mutex<Registry>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed dial to `address` and return its id.
    ///
    /// First sight of an address advances the counter; later calls return
    /// the id already bound. Either way `address` becomes the last recorded
    /// connection.
    pub fn record_connect(&self, address: &str) -> ConnectionId {
        let mut registry = self.lock();
        let id = match registry.by_addr.get(address) {
            Some(id) => *id,
            None => {
                let id = ConnectionId(registry.next);
                registry.next += 1;
                registry.by_addr.insert(address.to_string(), id);
                id
            }
        };
        registry.last = Some((id, address.to_string()));
        id
    }

    /// Id previously bound to `address`, if any.
    pub fn lookup(&self, address: &str) -> Option<ConnectionId> {
        self.lock().by_addr.get(address).copied()
    }

    /// Id of the most recently recorded connection.
    pub fn last_id(&self) -> Option<ConnectionId> {
        self.lock().last.as_ref().map(|(id, _)| *id)
    }

    /// Address of the most recently recorded connection.
    pub fn last_address(&self) -> Option<String> {
        self.lock().last.as_ref().map(|(_, addr)| addr.clone())
    }

    /// Number of distinct addresses recorded so far.
    pub fn len(&self) -> usize {
        self.lock().by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // The registry stays consistent even if a holder panicked mid-print.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
