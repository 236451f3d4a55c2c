//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use rcurl::config::ClientConfig;
use rcurl::http::{HttpClient, RequestExecutor};
use rcurl::net::ConnectionState;
use rcurl::observability::console::{Captured, Console};
use rcurl::Request;

pub const BODY: &str = "{\"hello\":\"world\"}\n";

/// Handle on a running mock backend.
#[allow(dead_code)]
pub struct MockBackend {
    pub addr: SocketAddr,
    /// Number of TCP connections accepted.
    pub connections: Arc<AtomicUsize>,
    /// Raw request heads received, in order.
    pub requests: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn request_heads(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }
}

/// Start an HTTP/1.1 backend that honours keep-alive and answers every
/// request with `BODY`.
pub async fn start_backend() -> MockBackend {
    spawn_backend(None, Dialect::Http11).await
}

/// Same backend behind TLS, negotiating `http/1.1` over ALPN.
#[allow(dead_code)]
pub async fn start_tls_backend(certificate: &TestCertificate) -> MockBackend {
    spawn_backend(Some(certificate.acceptor()), Dialect::Http11).await
}

/// Backend answering HTTP/1.0 with a body delimited by connection close.
#[allow(dead_code)]
pub async fn start_http10_backend() -> MockBackend {
    spawn_backend(None, Dialect::Http10).await
}

#[derive(Clone, Copy)]
enum Dialect {
    Http11,
    Http10,
}

async fn spawn_backend(tls: Option<TlsAcceptor>, dialect: Dialect) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let (conns, reqs) = (connections.clone(), requests.clone());
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    conns.fetch_add(1, Ordering::SeqCst);
                    let reqs = reqs.clone();
                    let tls = tls.clone();
                    tokio::spawn(async move {
                        match tls {
                            Some(acceptor) => {
                                if let Ok(stream) = acceptor.accept(socket).await {
                                    serve_connection(stream, reqs, dialect).await;
                                }
                            }
                            None => serve_connection(socket, reqs, dialect).await,
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend {
        addr,
        connections,
        requests,
    }
}

/// Start a backend that accepts connections but never answers.
#[allow(dead_code)]
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

async fn serve_connection<S>(mut socket: S, requests: Arc<Mutex<Vec<String>>>, dialect: Dialect)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        // Read one request head
        let head_end = loop {
            if let Some(pos) = find_head_end(&buf) {
                break pos;
            }
            let mut chunk = [0u8; 4096];
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let lower = head.to_ascii_lowercase();
        let content_length = header_value(&lower, "content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        // Drain the request body
        while buf.len() < head_end + 4 + content_length {
            let mut chunk = [0u8; 4096];
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        buf.drain(..head_end + 4 + content_length);
        requests.lock().unwrap().push(head.clone());

        let is_head = head.starts_with("HEAD ");

        if let Dialect::Http10 = dialect {
            let mut response = String::from("HTTP/1.0 200 OK\r\nContent-Type: application/json\r\n\r\n");
            if !is_head {
                response.push_str(BODY);
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
            return;
        }

        let close = header_value(&lower, "connection").as_deref() == Some("close");

        let mut response = format!(
            "HTTP/1.1 200 OK\r\n\
             Date: Mon, 19 Oct 2026 10:00:00 GMT\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Server: mock\r\n\
             X-Extra: 1\r\n",
            BODY.len()
        );
        if close {
            response.push_str("Connection: close\r\n");
        }
        response.push_str("\r\n");
        if !is_head {
            response.push_str(BODY);
        }

        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        if close {
            let _ = socket.shutdown().await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            return;
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn header_value(lower_head: &str, name: &str) -> Option<String> {
    lower_head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

/// Self-signed certificate for `localhost` and `127.0.0.1`.
#[allow(dead_code)]
pub struct TestCertificate {
    cert: CertificateDer<'static>,
    key: PrivatePkcs8KeyDer<'static>,
}

#[allow(dead_code)]
impl TestCertificate {
    pub fn generate() -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        Self {
            cert: certified.cert.der().clone(),
            key: PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
        }
    }

    /// Client TLS configuration trusting only this certificate.
    pub fn client_config(&self) -> Arc<rustls::ClientConfig> {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        rcurl::net::tls::client_config_with_roots(roots).unwrap()
    }

    fn acceptor(&self) -> TlsAcceptor {
        let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![self.cert.clone()],
            PrivateKeyDer::Pkcs8(self.key.clone_key()),
        )
        .unwrap();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        TlsAcceptor::from(Arc::new(config))
    }
}

/// Executor writing into a captured console.
#[allow(dead_code)]
pub fn executor(config: &ClientConfig) -> (RequestExecutor, Captured) {
    executor_with_client(config, HttpClient::new(config).unwrap())
}

/// Executor whose client trusts only `certificate`.
#[allow(dead_code)]
pub fn tls_executor(config: &ClientConfig, certificate: &TestCertificate) -> (RequestExecutor, Captured) {
    let client = HttpClient::with_tls_config(config, certificate.client_config()).unwrap();
    executor_with_client(config, client)
}

fn executor_with_client(config: &ClientConfig, client: HttpClient) -> (RequestExecutor, Captured) {
    let (console, captured) = Console::capture();
    let executor = RequestExecutor::new(
        client,
        Arc::new(ConnectionState::new()),
        console,
        config.request.clone(),
    );
    (executor, captured)
}

/// Parse one argument group the way the command line does.
#[allow(dead_code)]
pub fn request(args: &[&str]) -> Request {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    rcurl::cli::parse_args(&args, "*/*").unwrap()
}
