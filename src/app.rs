//! Batch run loop.
//!
//! Parses every argument group up front, builds the pooled client once,
//! then sends the requests strictly in order. The first error ends the run.

use std::sync::Arc;

use crate::cli;
use crate::config::ClientConfig;
use crate::error::CurlResult;
use crate::http::{HttpClient, RequestExecutor};
use crate::net::connection::ConnectionState;
use crate::observability::console::Console;

/// One process worth of state: config, output, and connection registry.
pub struct Application {
    config: ClientConfig,
    console: Console,
    state: Arc<ConnectionState>,
}

impl Application {
    pub fn new(config: ClientConfig, console: Console) -> Self {
        Self {
            config,
            console,
            state: Arc::new(ConnectionState::new()),
        }
    }

    /// Connection registry shared with every request of the batch.
    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Run the batch described by `args` (argv without the program name).
    pub async fn run(&self, args: &[String]) -> CurlResult<()> {
        let mut requests = cli::parse_batch(args, &self.config.request.accept)?;

        let client = HttpClient::new(&self.config)?;
        let executor = RequestExecutor::new(
            client,
            Arc::clone(&self.state),
            self.console.clone(),
            self.config.request.clone(),
        );

        let total = requests.len();
        for (index, request) in requests.iter_mut().enumerate() {
            tracing::debug!(index, total, url = %request.url, "starting request");
            if let Err(e) = executor.send(request).await {
                tracing::debug!(index, error = %e, "request failed, aborting batch");
                return Err(e);
            }
        }

        Ok(())
    }
}
