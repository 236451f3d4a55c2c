//! Pooled HTTP(S) client, built once per process.
//!
//! # Responsibilities
//! - Build the hyper-util pool over the tracing connector
//! - Bound idle connections per host and their idle lifetime
//! - Hold the per-call timeout ceiling

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::time::Instant;

use crate::config::{validate_config, ClientConfig};
use crate::error::{CurlError, CurlResult};
use crate::net::connector::TracingConnector;
use crate::net::tls;
use crate::observability::trace::TraceHub;

type PooledClient = Client<TracingConnector, Full<Bytes>>;

/// Transport handle shared by every request of the batch.
#[derive(Clone)]
pub struct HttpClient {
    inner: PooledClient,
    hub: Arc<TraceHub>,
    call_timeout: Duration,
}

impl HttpClient {
    /// Validate `config` and build the pool.
    pub fn new(config: &ClientConfig) -> CurlResult<Self> {
        let tls_config = tls::client_config()
            .map_err(|e| CurlError::ClientInit(format!("failed to configure TLS: {}", e)))?;
        Self::with_tls_config(config, tls_config)
    }

    /// Build the pool over an explicit TLS client configuration.
    pub fn with_tls_config(
        config: &ClientConfig,
        tls_config: Arc<rustls::ClientConfig>,
    ) -> CurlResult<Self> {
        validate_config(config).map_err(|errors| {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            CurlError::ClientInit(format!("invalid configuration: {}", joined))
        })?;

        let hub = Arc::new(TraceHub::new());
        let connector = TracingConnector::new(tls_config, Arc::clone(&hub));

        let inner = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .pool_idle_timeout(config.pool.idle_timeout)
            .pool_timer(TokioTimer::new())
            .build(connector);

        tracing::debug!(
            max_idle_per_host = config.pool.max_idle_per_host,
            idle_timeout = ?config.pool.idle_timeout,
            call_timeout = ?config.timeouts.call,
            "http client built"
        );

        Ok(Self {
            inner,
            hub,
            call_timeout: config.timeouts.call,
        })
    }

    /// Hub that carries lifecycle events of calls made through this client.
    pub fn hub(&self) -> &TraceHub {
        &self.hub
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Perform `call`, failing with a transport error at `deadline`.
    pub async fn send(
        &self,
        call: hyper::Request<Full<Bytes>>,
        deadline: Instant,
    ) -> CurlResult<hyper::Response<Incoming>> {
        match tokio::time::timeout_at(deadline, self.inner.request(call)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                tracing::debug!(error = ?e, "call failed");
                Err(CurlError::transport(&e))
            }
            Err(_) => Err(CurlError::Transport(format!(
                "timeout after {:?}",
                self.call_timeout
            ))),
        }
    }
}
