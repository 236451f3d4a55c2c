//! Connection lifecycle events and the hub that routes them.
//!
//! # Responsibilities
//! - Define the closed set of lifecycle phases reported for one call
//! - Route events from transport workers to the observer of the call in flight
//! - Number calls so connections can tell a new call from an old one
//!
//! # Design Decisions
//! - One hub per pooled client; the observer slot is swapped per call
//! - Requests run one after another, so at most one observer is installed
//! - Events are delivered as they happen, with no buffering or reordering

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Leaf certificate details reported after a TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
}

/// Negotiated parameters of a finished TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHandshakeInfo {
    /// Protocol version name, e.g. `TLS 1.3`.
    pub version: String,
    /// Cipher suite name.
    pub cipher_suite: String,
    /// First peer certificate, when one was presented and parsed.
    pub certificate: Option<CertificateSummary>,
    /// Whether the handshake reports itself complete.
    pub complete: bool,
    /// Negotiated ALPN protocol id, if any.
    pub alpn: Option<String>,
}

impl TlsHandshakeInfo {
    /// HTTP version label implied by the negotiated ALPN protocol.
    pub fn http_version(&self) -> &'static str {
        match self.alpn.as_deref() {
            Some("h2") => "HTTP/2",
            _ => "HTTP/1.1",
        }
    }
}

/// One lifecycle phase of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// The call is about to ask the pool for a connection to `host_port`.
    GetConn { host_port: String },
    /// A connection was handed to the call.
    GotConn { remote_addr: SocketAddr, reused: bool },
    DnsStart { host: String },
    /// Resolution finished. `coalesced` is set when the result was shared
    /// with an in-flight lookup of the same name.
    DnsDone {
        addrs: Vec<IpAddr>,
        coalesced: bool,
        error: Option<String>,
    },
    ConnectStart { addr: SocketAddr },
    ConnectDone { addr: SocketAddr, error: Option<String> },
    TlsHandshakeStart,
    TlsHandshakeDone(Result<TlsHandshakeInfo, String>),
    /// The request head went out on the wire.
    WroteHeaders,
    /// The connection went back to the idle pool.
    PutIdleConn,
}

/// Consumer of lifecycle events.
///
/// Handlers may be invoked concurrently from transport workers.
pub trait TraceObserver: Send + Sync {
    fn on_event(&self, event: &TraceEvent);
}

struct Installed {
    observer: Arc<dyn TraceObserver>,
}

/// Routes lifecycle events to the observer of the call in flight.
#[derive(Default)]
pub struct TraceHub {
    epoch: AtomicU64,
    /// Pool key of the call in flight; kept after the call ends.
    target: ArcSwapOption<String>,
    current: ArcSwapOption<Installed>,
}

impl TraceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a call to the connections under `target`, installing `observer`
    /// until the scope is dropped.
    ///
    /// Every call bumps the epoch, traced or not, so connections can count
    /// the calls they serve.
    pub fn begin_call(
        &self,
        target: impl Into<String>,
        observer: Option<Arc<dyn TraceObserver>>,
    ) -> CallScope<'_> {
        self.target.store(Some(Arc::new(target.into())));
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.current
            .store(observer.map(|observer| Arc::new(Installed { observer })));
        CallScope { hub: self, epoch }
    }

    /// Epoch of the most recently started call; 0 before any call.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Whether the latest call may be served by a connection under `key`.
    pub fn targets(&self, key: &str) -> bool {
        self.target
            .load()
            .as_deref()
            .is_some_and(|target| target.as_str() == key)
    }

    /// Deliver `event` to the installed observer, if any.
    pub fn emit(&self, event: TraceEvent) {
        if let Some(installed) = self.current.load_full() {
            installed.observer.on_event(&event);
        }
    }

    /// Whether an observer is installed.
    pub fn is_tracing(&self) -> bool {
        self.current.load().is_some()
    }
}

impl std::fmt::Debug for TraceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceHub")
            .field("epoch", &self.epoch())
            .field("tracing", &self.is_tracing())
            .finish()
    }
}

/// Guard for one call; uninstalls the observer on drop.
pub struct CallScope<'a> {
    hub: &'a TraceHub,
    epoch: u64,
}

impl CallScope<'_> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn emit(&self, event: TraceEvent) {
        self.hub.emit(event);
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        // A later call may already own the slot.
        if self.hub.epoch() == self.epoch {
            self.hub.current.store(None);
        }
    }
}
