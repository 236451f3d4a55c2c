//! Host name resolution with in-flight coalescing.
//!
//! # Responsibilities
//! - Resolve host names through the system resolver
//! - Share one lookup between concurrent callers for the same name
//! - Tell callers whether their result came from a shared lookup

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

type LookupResult = Result<Arc<Vec<IpAddr>>, Arc<io::Error>>;
type SharedLookup = Shared<BoxFuture<'static, LookupResult>>;

/// Outcome of one resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub addrs: Arc<Vec<IpAddr>>,
    /// The caller joined a lookup another caller had already started.
    pub coalesced: bool,
}

/// Failed resolution of `host`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to resolve host {host}: {source}")]
pub struct ResolveError {
    pub host: String,
    #[source]
    pub source: Arc<io::Error>,
    pub coalesced: bool,
}

/// Resolver shared by every dial of the pooled client.
#[derive(Clone, Default)]
pub struct Resolver {
    in_flight: Arc<DashMap<String, SharedLookup>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `host` to its addresses, in resolver order without duplicates.
    pub async fn resolve(&self, host: &str) -> Result<Resolution, ResolveError> {
        let (lookup, coalesced, _guard) = self.join_or_start(host);

        match lookup.await {
            Ok(addrs) if addrs.is_empty() => Err(ResolveError {
                host: host.to_string(),
                source: Arc::new(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no addresses returned",
                )),
                coalesced,
            }),
            Ok(addrs) => Ok(Resolution { addrs, coalesced }),
            Err(source) => Err(ResolveError {
                host: host.to_string(),
                source,
                coalesced,
            }),
        }
    }

    fn join_or_start(&self, host: &str) -> (SharedLookup, bool, Option<InFlightGuard>) {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(host.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(host = %host, "joining in-flight lookup");
                (entry.get().clone(), true, None)
            }
            Entry::Vacant(entry) => {
                let lookup = system_lookup(host.to_string()).boxed().shared();
                entry.insert(lookup.clone());
                let guard = InFlightGuard {
                    map: Arc::clone(&self.in_flight),
                    host: host.to_string(),
                };
                (lookup, false, Some(guard))
            }
        }
    }

    /// Number of lookups currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Removes the originating lookup from the in-flight map, even on cancel.
struct InFlightGuard {
    map: Arc<DashMap<String, SharedLookup>>,
    host: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.host);
    }
}

async fn system_lookup(host: String) -> LookupResult {
    let resolved = tokio::net::lookup_host((host.as_str(), 0))
        .await
        .map_err(Arc::new)?;

    let mut addrs = Vec::new();
    for sock in resolved {
        if !addrs.contains(&sock.ip()) {
            addrs.push(sock.ip());
        }
    }
    tracing::debug!(host = %host, count = addrs.len(), "lookup finished");
    Ok(Arc::new(addrs))
}
