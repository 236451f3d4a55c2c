//! Curl-style verbose trace output.
//!
//! # Responsibilities
//! - Format one block of `*`/`>` lines per lifecycle event
//! - Record completed dials in the shared `ConnectionState`
//!
//! Handlers never block or retry. Ordering is whatever the transport
//! delivers; each handler writes its whole block in one call.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::http::request::{split_header, Request};
use crate::net::connection::{ConnectionState, DisplayId};
use crate::observability::console::Console;
use crate::observability::trace::{TlsHandshakeInfo, TraceEvent, TraceObserver};

/// Verbose-mode observer bound to one request.
pub struct TraceEmitter {
    request: Request,
    state: Arc<ConnectionState>,
    console: Console,
}

impl TraceEmitter {
    pub fn new(request: Request, state: Arc<ConnectionState>, console: Console) -> Self {
        Self {
            request,
            state,
            console,
        }
    }

    /// Render `event` to text, updating connection state when it is a dial
    /// completion. Returns an empty string for events that print nothing.
    pub fn render(&self, event: &TraceEvent) -> String {
        let mut out = String::new();
        match event {
            TraceEvent::GetConn { host_port } => {
                let _ = writeln!(out, "* Trying {}...", host_port);
            }
            TraceEvent::GotConn { remote_addr, reused } => {
                if *reused {
                    let addr = remote_addr.to_string();
                    let id = self.state.lookup(&addr);
                    let _ = writeln!(
                        out,
                        "* Reusing existing connection #{} with host {}",
                        DisplayId(id),
                        addr
                    );
                }
            }
            TraceEvent::DnsStart { .. } => {
                out.push_str("* DNS lookup begins...\n");
            }
            TraceEvent::DnsDone { addrs, coalesced, .. } => {
                out.push_str("* DNS lookup table:\n");
                if !coalesced {
                    for ip in addrs {
                        let _ = writeln!(out, "  - ({})", ip);
                    }
                }
            }
            TraceEvent::ConnectStart { .. } => {
                out.push_str("* Starting connection...\n");
            }
            TraceEvent::ConnectDone { addr, error } => {
                let addr = addr.to_string();
                // Lock is released before anything is printed.
                let id = self.state.record_connect(&addr);
                match error {
                    None => {
                        let _ = writeln!(
                            out,
                            "* Connected to {} ({}) #{}",
                            self.request.host, addr, id
                        );
                    }
                    Some(e) => {
                        let _ = writeln!(
                            out,
                            "* Failed to connect to {} ({}) #{}: {}",
                            self.request.host, addr, id, e
                        );
                    }
                }
            }
            TraceEvent::TlsHandshakeStart => {
                out.push_str("* Starting TLS handshake\n");
            }
            TraceEvent::TlsHandshakeDone(Err(e)) => {
                let _ = writeln!(out, "* TLS handshake failed: {}", e);
            }
            TraceEvent::TlsHandshakeDone(Ok(info)) => {
                render_tls(&mut out, info);
            }
            TraceEvent::WroteHeaders => {
                self.render_request_head(&mut out);
            }
            TraceEvent::PutIdleConn => {
                let _ = writeln!(
                    out,
                    "* Connection #{} returned to idle pool",
                    DisplayId(self.state.last_id())
                );
            }
        }
        out
    }

    fn render_request_head(&self, out: &mut String) {
        let req = &self.request;
        let _ = writeln!(
            out,
            "> {} {} {}",
            req.flags.method,
            req.path,
            req.http_version_label()
        );
        let _ = writeln!(out, "> Host: {}", req.host);
        let _ = writeln!(out, "> Accept: {}", req.accept);
        for raw in &req.flags.headers {
            match split_header(raw) {
                Some((key, value)) => {
                    let _ = writeln!(out, "> {}: {}", key, value);
                }
                None => {
                    let _ = writeln!(out, "> {}", raw.trim());
                }
            }
        }
        out.push_str(">\n");
    }
}

fn render_tls(out: &mut String, info: &TlsHandshakeInfo) {
    let _ = writeln!(
        out,
        "* SSL connection using {} / {}",
        info.version, info.cipher_suite
    );
    if let Some(cert) = &info.certificate {
        out.push_str("* Server certificate:\n");
        let _ = writeln!(out, "  - Subject: {}", cert.subject);
        let _ = writeln!(out, "  - Issuer: {}", cert.issuer);
        let _ = writeln!(out, "  - Valid from: {}", cert.not_before);
        let _ = writeln!(out, "  - Valid to: {}", cert.not_after);
    }
    if info.complete {
        out.push_str("* SSL verification succeeded.\n");
        let _ = writeln!(out, "* using {}", info.http_version());
    } else {
        out.push_str("* SSL verification failed.\n");
    }
}

impl TraceObserver for TraceEmitter {
    fn on_event(&self, event: &TraceEvent) {
        let text = self.render(event);
        if !text.is_empty() {
            self.console.emit(&text);
        }
    }
}
