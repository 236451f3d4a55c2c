//! Response rendering policy.
//!
//! | Method   | Verbose | Output                                                   |
//! |----------|---------|----------------------------------------------------------|
//! | non-HEAD | on      | `< ` status/header lines, `<`, body                      |
//! | non-HEAD | off     | `<`, body                                                |
//! | HEAD     | on      | `< ` lines, each followed by highlighted matching headers |
//! | HEAD     | off     | `HTTP/<major> <code>`, highlighted allow-listed headers   |
//!
//! HEAD never prints a body.

use std::fmt::Write as _;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::ext::ReasonPhrase;
use hyper::header::{self, HeaderMap};
use hyper::{StatusCode, Version};
use tokio::time::Instant;

use crate::error::{CurlError, CurlResult};
use crate::observability::console::Console;

pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

/// Headers echoed for non-verbose HEAD responses, in print order.
pub const HEAD_ALLOW_LIST: [&str; 6] = [
    "Date",
    "Content-Type",
    "Content-Length",
    "Server",
    "Access-Control-Allow-Origin",
    "Access-Control-Allow-Credentials",
];

/// Response status line and headers, detached from the body.
#[derive(Debug, Clone)]
pub struct ResponseSummary {
    pub version: Version,
    pub status: StatusCode,
    /// Reason phrase sent by the server when it differs from the canonical one.
    pub reason: Option<String>,
    pub headers: HeaderMap,
}

impl ResponseSummary {
    pub fn from_response<B>(response: &hyper::Response<B>) -> Self {
        Self {
            version: response.version(),
            status: response.status(),
            reason: response
                .extensions()
                .get::<ReasonPhrase>()
                .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned()),
            headers: response.headers().clone(),
        }
    }

    /// Major protocol version number.
    pub fn major_version(&self) -> u8 {
        match self.version {
            Version::HTTP_09 => 0,
            Version::HTTP_10 | Version::HTTP_11 => 1,
            Version::HTTP_2 => 2,
            Version::HTTP_3 => 3,
            _ => 1,
        }
    }

    /// Raw status line followed by one `name: value` line per header value.
    pub fn raw_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.headers.len() + 1);
        let status_line = format!("{:?} {} {}", self.version, self.status.as_u16(), self.reason());
        lines.push(status_line.trim_end().to_string());
        for (name, value) in &self.headers {
            lines.push(format!(
                "{}: {}",
                name,
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        lines
    }

    /// Reason phrase as sent, falling back to the canonical one.
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    /// Whether the server asked to close the connection.
    pub fn closes_connection(&self) -> bool {
        self.has_connection_token("close")
    }

    /// Whether the connection can go back to the idle pool once the body
    /// has been read.
    ///
    /// HTTP/1.1 persists unless closed; HTTP/1.0 only with an explicit
    /// keep-alive. The body must also end on its own rather than at EOF.
    /// HTTP/2 connections are shared and never returned.
    pub fn keeps_connection(&self, is_head: bool) -> bool {
        let persistent = match self.version {
            Version::HTTP_11 => !self.closes_connection(),
            Version::HTTP_10 => {
                !self.closes_connection() && self.has_connection_token("keep-alive")
            }
            _ => false,
        };
        persistent && (is_head || self.body_is_delimited())
    }

    fn body_is_delimited(&self) -> bool {
        if self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED
        {
            return true;
        }
        if self.headers.contains_key(header::CONTENT_LENGTH) {
            return true;
        }
        // chunked must be the final transfer coding
        self.headers
            .get_all(header::TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .last()
            .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }

    fn has_connection_token(&self, token: &str) -> bool {
        self.headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    fn first_value(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }
}

/// Everything printed before the body, per the method × verbosity policy.
pub fn render_head(summary: &ResponseSummary, is_head: bool, verbose: bool) -> String {
    let mut out = String::new();

    if verbose {
        for line in summary.raw_lines() {
            let _ = writeln!(out, "< {}", line);
            if is_head {
                highlight_matching(&mut out, summary, &line);
            }
        }
    } else if is_head {
        let _ = writeln!(out, "HTTP/{} {}", summary.major_version(), summary.status.as_u16());
        for name in HEAD_ALLOW_LIST {
            if let Some(value) = summary.first_value(name).filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{}{}{}: {}", BOLD, name, RESET, value);
            }
        }
    }

    if !is_head {
        out.push_str("<\n");
    }
    out
}

/// Echo every response header whose name occurs in `line`.
fn highlight_matching(out: &mut String, summary: &ResponseSummary, line: &str) {
    for name in summary.headers.keys() {
        if line.contains(name.as_str()) {
            if let Some(value) = summary.first_value(name.as_str()) {
                let _ = writeln!(out, "{}{}{}: {}", BOLD, name, RESET, value);
            }
        }
    }
}

/// Copy `body` to the console verbatim as it arrives. Returns bytes written.
pub async fn stream_body<B>(mut body: B, console: &Console, deadline: Instant) -> CurlResult<u64>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let mut written = 0u64;
    loop {
        let frame = match tokio::time::timeout_at(deadline, body.frame()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => return Err(CurlError::ResponseRead(e.to_string())),
            Ok(None) => break,
            Err(_) => {
                return Err(CurlError::ResponseRead(
                    "timed out while reading body".to_string(),
                ))
            }
        };
        if let Ok(data) = frame.into_data() {
            console
                .write_bytes(&data)
                .map_err(|e| CurlError::ResponseRead(e.to_string()))?;
            written += data.len() as u64;
        }
    }
    Ok(written)
}
