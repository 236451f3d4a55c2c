//! Error taxonomy for a batch run.
//!
//! Every error is fatal to the run: the first failing request stops the
//! batch. `exit_code` maps each variant onto the process exit status.

use thiserror::Error;

/// Errors surfaced to the user as a single formatted line.
#[derive(Debug, Error)]
pub enum CurlError {
    /// Malformed flags, wrong positional arguments, or an explicit help request.
    #[error("{0}")]
    Usage(String),

    /// The pooled client could not be constructed.
    #[error("failed to create http client: {0}")]
    ClientInit(String),

    /// The outbound call could not be built; nothing was sent.
    #[error("failed to create request: {0}")]
    Build(String),

    /// DNS, connect, TLS, or timeout failure while performing the call.
    #[error("failed to send request: {0}")]
    Transport(String),

    /// Copying the response body to output failed.
    #[error("failed to read response: {0}")]
    ResponseRead(String),
}

impl CurlError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CurlError::Usage(_) => 2,
            _ => 1,
        }
    }

    /// Build a transport error carrying the full `source()` chain of `err`.
    pub fn transport(err: &(dyn std::error::Error + 'static)) -> Self {
        CurlError::Transport(error_chain(err))
    }
}

/// Join an error and its sources into one `a: b: c` line, skipping
/// sources whose text is already contained in the previous message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}

/// Convenience alias used across the crate.
pub type CurlResult<T> = Result<T, CurlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("failed to resolve host nowhere.invalid")]
    struct Root;

    #[derive(Debug, Error)]
    #[error("client error (Connect)")]
    struct Outer(#[source] Root);

    #[test]
    fn chain_includes_root_cause() {
        let err = Outer(Root);
        let msg = CurlError::transport(&err).to_string();
        assert_eq!(
            msg,
            "failed to send request: client error (Connect): failed to resolve host nowhere.invalid"
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(CurlError::Usage("bad".into()).exit_code(), 2);
        assert_eq!(CurlError::Build("bad".into()).exit_code(), 1);
        assert_eq!(CurlError::Transport("bad".into()).exit_code(), 1);
        assert_eq!(CurlError::ResponseRead("bad".into()).exit_code(), 1);
        assert_eq!(CurlError::ClientInit("bad".into()).exit_code(), 1);
    }
}
