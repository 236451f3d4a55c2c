//! Request execution.
//!
//! # Responsibilities
//! - Build the call, attach the verbose trace observer, perform the call
//! - Render the response per the method × verbosity policy
//! - Report the connection left open for keep-alive requests

use std::sync::Arc;

use hyper::header;
use tokio::time::Instant;

use crate::config::schema::RequestDefaults;
use crate::error::{CurlError, CurlResult};
use crate::http::client::HttpClient;
use crate::http::request::{build_call, Request};
use crate::http::response::{render_head, stream_body, ResponseSummary};
use crate::net::connection::{ConnectionState, DisplayId};
use crate::net::stream::ConnectionInfo;
use crate::observability::console::Console;
use crate::observability::emitter::TraceEmitter;
use crate::observability::trace::{TraceEvent, TraceObserver};

/// Executes requests one at a time over a shared pooled client.
pub struct RequestExecutor {
    client: HttpClient,
    state: Arc<ConnectionState>,
    console: Console,
    defaults: RequestDefaults,
}

impl RequestExecutor {
    pub fn new(
        client: HttpClient,
        state: Arc<ConnectionState>,
        console: Console,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            client,
            state,
            console,
            defaults,
        }
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Perform `request` and render its response.
    ///
    /// A `Connection: keep-alive` header flips the request's keep-alive
    /// flag as a side effect.
    pub async fn send(&self, request: &mut Request) -> CurlResult<()> {
        let call = build_call(request, &self.defaults)?;
        let asks_close = call
            .headers()
            .get(header::CONNECTION)
            .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"close"));

        let observer = request.flags.verbose.then(|| {
            Arc::new(TraceEmitter::new(
                request.clone(),
                Arc::clone(&self.state),
                self.console.clone(),
            )) as Arc<dyn TraceObserver>
        });

        let deadline = Instant::now() + self.client.call_timeout();
        let scope = self.client.hub().begin_call(request.pool_key(), observer);

        tracing::debug!(
            method = %request.flags.method,
            url = %request.absolute_url(),
            verbose = request.flags.verbose,
            "sending request"
        );
        scope.emit(TraceEvent::GetConn {
            host_port: request.host_port(),
        });

        let response = self.client.send(call, deadline).await?;
        let summary = ResponseSummary::from_response(&response);
        let served_by = response.extensions().get::<ConnectionInfo>().copied();
        let body = response.into_body();

        // 1. Status and headers
        self.console
            .write_str(&render_head(&summary, request.is_head(), request.flags.verbose))
            .map_err(|e| CurlError::ResponseRead(e.to_string()))?;

        // 2. Body; HEAD responses carry none and are never copied
        if request.is_head() {
            drop(body);
        } else {
            let written = stream_body(body, &self.console, deadline).await?;
            tracing::debug!(bytes = written, status = %summary.status, "response body copied");
        }

        // 3. Pool return
        if !asks_close && summary.keeps_connection(request.is_head()) {
            scope.emit(TraceEvent::PutIdleConn);
        }
        drop(scope);

        if request.flags.keep_alive {
            let id = served_by
                .and_then(|info| self.state.lookup(&info.remote_addr.to_string()))
                .or_else(|| self.state.last_id());
            self.console
                .write_str(&format!(
                    "* Connection #{} to host {} left intact\n",
                    DisplayId(id),
                    request.host
                ))
                .map_err(|e| CurlError::ResponseRead(e.to_string()))?;
        }

        Ok(())
    }
}
