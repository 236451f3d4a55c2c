//! Dialing connector for the pooled client.
//!
//! # Responsibilities
//! - Resolve, dial and (for https) handshake new connections
//! - Report each phase to the `TraceHub`
//! - Hand the pool a `TracedStream` that reports per-call events

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::Uri;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tower::Service;

use crate::net::connection::pool_key;
use crate::net::dns::{ResolveError, Resolver};
use crate::net::stream::{MaybeTls, TracedStream};
use crate::net::tls;
use crate::observability::trace::{TraceEvent, TraceHub};

/// Errors raised while establishing a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("missing host in {0}")]
    MissingHost(Uri),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to connect to {host} ({addr}): {source}")]
    Connect {
        host: String,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// `tower::Service<Uri>` used by the hyper-util pool to open connections.
#[derive(Clone)]
pub struct TracingConnector {
    resolver: Resolver,
    tls: TlsConnector,
    hub: Arc<TraceHub>,
}

impl TracingConnector {
    pub fn new(tls_config: Arc<rustls::ClientConfig>, hub: Arc<TraceHub>) -> Self {
        Self {
            resolver: Resolver::new(),
            tls: TlsConnector::from(tls_config),
            hub,
        }
    }

    async fn connect(self, uri: Uri) -> Result<TracedStream, ConnectError> {
        let https = match uri.scheme_str() {
            Some("https") => true,
            Some("http") | None => false,
            Some(other) => return Err(ConnectError::UnsupportedScheme(other.to_string())),
        };
        let host = uri
            .host()
            .ok_or_else(|| ConnectError::MissingHost(uri.clone()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });
        let key = pool_key(if https { "https" } else { "http" }, &host, port);

        // 1. Resolve
        let ips = self.resolve(&host).await?;

        // 2. Dial each address in order until one answers
        let (tcp, remote_addr) = self.dial(&host, &ips, port).await?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        // 3. Handshake
        if !https {
            return Ok(TracedStream::new(
                MaybeTls::Plain(tcp),
                remote_addr,
                key,
                false,
                Arc::clone(&self.hub),
            ));
        }

        let server_name = ServerName::try_from(host.clone())
            .map_err(|_| ConnectError::InvalidServerName(host.clone()))?;

        self.hub.emit(TraceEvent::TlsHandshakeStart);
        match self.tls.connect(server_name, tcp).await {
            Ok(stream) => {
                let info = tls::handshake_info(stream.get_ref().1);
                let negotiated_h2 = info.alpn.as_deref() == Some("h2");
                tracing::debug!(
                    host = %host,
                    version = %info.version,
                    alpn = ?info.alpn,
                    "TLS handshake complete"
                );
                self.hub.emit(TraceEvent::TlsHandshakeDone(Ok(info)));
                Ok(TracedStream::new(
                    MaybeTls::Tls(Box::new(stream)),
                    remote_addr,
                    key,
                    negotiated_h2,
                    Arc::clone(&self.hub),
                ))
            }
            Err(source) => {
                self.hub
                    .emit(TraceEvent::TlsHandshakeDone(Err(source.to_string())));
                Err(ConnectError::Tls { host, source })
            }
        }
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ConnectError> {
        // Literals need no lookup and report no DNS phase.
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        self.hub.emit(TraceEvent::DnsStart {
            host: host.to_string(),
        });
        match self.resolver.resolve(host).await {
            Ok(resolution) => {
                self.hub.emit(TraceEvent::DnsDone {
                    addrs: resolution.addrs.to_vec(),
                    coalesced: resolution.coalesced,
                    error: None,
                });
                Ok(resolution.addrs.to_vec())
            }
            Err(e) => {
                self.hub.emit(TraceEvent::DnsDone {
                    addrs: Vec::new(),
                    coalesced: e.coalesced,
                    error: Some(e.to_string()),
                });
                tracing::debug!(host = %host, error = %e, "lookup failed");
                Err(e.into())
            }
        }
    }

    async fn dial(
        &self,
        host: &str,
        ips: &[IpAddr],
        port: u16,
    ) -> Result<(TcpStream, SocketAddr), ConnectError> {
        let mut last_err = None;
        for ip in ips {
            let addr = SocketAddr::new(*ip, port);
            self.hub.emit(TraceEvent::ConnectStart { addr });

            match TcpStream::connect(addr).await {
                Ok(tcp) => {
                    let remote_addr = tcp.peer_addr().unwrap_or(addr);
                    self.hub.emit(TraceEvent::ConnectDone {
                        addr: remote_addr,
                        error: None,
                    });
                    tracing::debug!(host = %host, addr = %remote_addr, "connected");
                    return Ok((tcp, remote_addr));
                }
                Err(source) => {
                    self.hub.emit(TraceEvent::ConnectDone {
                        addr,
                        error: Some(source.to_string()),
                    });
                    tracing::debug!(host = %host, addr = %addr, error = %source, "connect failed");
                    last_err = Some(ConnectError::Connect {
                        host: host.to_string(),
                        addr,
                        source,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ConnectError::Resolve(ResolveError {
                host: host.to_string(),
                source: Arc::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses to dial",
                )),
                coalesced: false,
            })
        }))
    }
}

impl Service<Uri> for TracingConnector {
    type Response = TracedStream;
    type Error = ConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.connect(uri).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::trace::TraceObserver;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<TraceEvent>>);

    impl TraceObserver for Recorder {
        fn on_event(&self, event: &TraceEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn connector(hub: Arc<TraceHub>) -> TracingConnector {
        TracingConnector::new(tls::client_config().unwrap(), hub)
    }

    /// Local TLS listener with a self-signed certificate for 127.0.0.1,
    /// offering `alpn`. Returns its address and a connector trusting it.
    async fn tls_listener(alpn: &[&[u8]], hub: Arc<TraceHub>) -> (SocketAddr, TracingConnector) {
        use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

        let certified =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        let cert_der = certified.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let mut server = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key)
        .unwrap();
        server.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    use tokio::io::AsyncReadExt;
                    if let Ok(mut tls) = acceptor.accept(tcp).await {
                        let mut buf = [0u8; 64];
                        let _ = tls.read(&mut buf).await;
                    }
                });
            }
        });

        let mut roots = rustls::RootCertStore::empty();
        roots.add(cert_der).unwrap();
        let connector = TracingConnector::new(tls::client_config_with_roots(roots).unwrap(), hub);
        (addr, connector)
    }

    #[tokio::test]
    async fn dial_reports_connect_phases() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let hub = Arc::new(TraceHub::new());
        let recorder = Arc::new(Recorder::default());
        let _scope = hub.begin_call("test", Some(recorder.clone() as Arc<dyn TraceObserver>));

        let uri: Uri = format!("http://{}/", addr).parse().unwrap();
        let stream = connector(hub.clone()).connect(uri).await.unwrap();
        assert_eq!(stream.remote_addr(), addr);

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                TraceEvent::ConnectStart { addr },
                TraceEvent::ConnectDone { addr, error: None },
            ]
        );
    }

    #[tokio::test]
    async fn refused_dial_reports_error() {
        // Bind then drop to find a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let hub = Arc::new(TraceHub::new());
        let recorder = Arc::new(Recorder::default());
        let _scope = hub.begin_call("test", Some(recorder.clone() as Arc<dyn TraceObserver>));

        let uri: Uri = format!("http://{}/", addr).parse().unwrap();
        let err = connector(hub.clone()).connect(uri).await.err().unwrap();
        assert!(matches!(err, ConnectError::Connect { .. }));

        let events = recorder.0.lock().unwrap().clone();
        assert!(matches!(
            events.last(),
            Some(TraceEvent::ConnectDone { error: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn https_dial_reports_handshake_and_negotiates_h2() {
        use hyper_util::client::legacy::connect::Connection;

        let hub = Arc::new(TraceHub::new());
        let (addr, connector) = tls_listener(&[b"h2", b"http/1.1"], hub.clone()).await;
        let recorder = Arc::new(Recorder::default());
        let _scope = hub.begin_call("test", Some(recorder.clone() as Arc<dyn TraceObserver>));

        let uri: Uri = format!("https://{}/", addr).parse().unwrap();
        let stream = connector.connect(uri).await.unwrap();
        assert!(stream.connected().is_negotiated_h2());

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events[0], TraceEvent::ConnectStart { addr });
        assert_eq!(events[1], TraceEvent::ConnectDone { addr, error: None });
        assert_eq!(events[2], TraceEvent::TlsHandshakeStart);
        match &events[3] {
            TraceEvent::TlsHandshakeDone(Ok(info)) => {
                assert_eq!(info.alpn.as_deref(), Some("h2"));
                assert_eq!(info.http_version(), "HTTP/2");
                assert!(info.version.starts_with("TLS 1."));
                assert!(info.complete);
                let cert = info.certificate.as_ref().expect("leaf certificate");
                assert!(cert.subject.contains("rcgen"), "{}", cert.subject);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn https_dial_without_h2_stays_on_http1() {
        use hyper_util::client::legacy::connect::Connection;

        let hub = Arc::new(TraceHub::new());
        let (addr, connector) = tls_listener(&[b"http/1.1"], hub).await;

        let uri: Uri = format!("https://{}/", addr).parse().unwrap();
        let stream = connector.connect(uri).await.unwrap();
        assert!(!stream.connected().is_negotiated_h2());
    }

    #[tokio::test]
    async fn untrusted_certificate_fails_handshake() {
        let hub = Arc::new(TraceHub::new());
        let (addr, _trusting) = tls_listener(&[b"http/1.1"], hub.clone()).await;
        let recorder = Arc::new(Recorder::default());
        let _scope = hub.begin_call("test", Some(recorder.clone() as Arc<dyn TraceObserver>));

        // webpki roots do not know the self-signed certificate
        let uri: Uri = format!("https://{}/", addr).parse().unwrap();
        let err = connector(hub.clone()).connect(uri).await.err().unwrap();
        assert!(matches!(err, ConnectError::Tls { .. }), "{:?}", err);

        let events = recorder.0.lock().unwrap().clone();
        assert!(matches!(events.last(), Some(TraceEvent::TlsHandshakeDone(Err(_)))));
    }

    #[tokio::test]
    async fn unresolvable_host_reports_dns_phase() {
        let hub = Arc::new(TraceHub::new());
        let recorder = Arc::new(Recorder::default());
        let _scope = hub.begin_call("test", Some(recorder.clone() as Arc<dyn TraceObserver>));

        let uri: Uri = "http://no-such-host.invalid/".parse().unwrap();
        let err = connector(hub.clone()).connect(uri).await.err().unwrap();
        assert!(err.to_string().contains("no-such-host.invalid"));

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events[0],
            TraceEvent::DnsStart {
                host: "no-such-host.invalid".into()
            }
        );
        assert!(matches!(events[1], TraceEvent::DnsDone { error: Some(_), .. }));
    }
}
