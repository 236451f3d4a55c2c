//! Request description and outbound call construction.
//!
//! # Responsibilities
//! - Hold the validated description of one call
//! - Turn it into a `hyper::Request` with baseline and user headers
//! - Flip keep-alive when the user asks for it through a header

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::Method;

use crate::config::schema::RequestDefaults;
use crate::error::{CurlError, CurlResult};
use crate::net::connection::pool_key;

/// URL scheme of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request options taken from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    pub verbose: bool,
    pub method: String,
    /// Raw `Key: Value` strings in the order given.
    pub headers: Vec<String>,
    pub data: String,
    pub keep_alive: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            verbose: false,
            method: "GET".to_string(),
            headers: Vec::new(),
            data: String::new(),
            keep_alive: false,
        }
    }
}

/// Validated description of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// URL as given on the command line.
    pub url: String,
    pub scheme: Scheme,
    /// Host as it appears in a URL (IPv6 literals keep their brackets).
    pub host: String,
    pub port: u16,
    /// Request target: path, defaulted to `/`, plus the query string if any.
    pub path: String,
    pub accept: String,
    pub flags: Flags,
}

impl Request {
    /// Absolute URL rebuilt from scheme, host, port and path.
    pub fn absolute_url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }

    /// `host:port` the pool will be asked for.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Key of the pooled connections that can serve this request.
    ///
    /// Matches the key the connector gives the connections it dials.
    pub fn pool_key(&self) -> String {
        pool_key(self.scheme.as_str(), &self.host, self.port)
    }

    /// Version label shown in the traced request line.
    pub fn http_version_label(&self) -> &'static str {
        if self.scheme.is_encrypted() {
            "HTTP/2"
        } else {
            "HTTP/1.1"
        }
    }

    pub fn is_head(&self) -> bool {
        self.flags.method == "HEAD"
    }

    fn carries_body(&self) -> bool {
        matches!(self.flags.method.as_str(), "POST" | "PUT" | "PATCH") && !self.flags.data.is_empty()
    }
}

/// Split a raw header at its first colon and trim both halves.
///
/// Values may contain further colons (times, URLs); they stay in the value.
pub fn split_header(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Build the outbound call for `request`.
///
/// Applying a `Connection: keep-alive` header sets the request's keep-alive
/// flag, which is why the request is borrowed mutably.
pub fn build_call(
    request: &mut Request,
    defaults: &RequestDefaults,
) -> CurlResult<hyper::Request<Full<Bytes>>> {
    let method = Method::from_bytes(request.flags.method.as_bytes())
        .map_err(|e| CurlError::Build(format!("invalid method {:?}: {}", request.flags.method, e)))?;

    let body = if request.flags.data.is_empty() {
        Full::new(Bytes::new())
    } else {
        Full::new(Bytes::from(request.flags.data.clone()))
    };

    let mut call = hyper::Request::builder()
        .method(method)
        .uri(request.absolute_url())
        .body(body)
        .map_err(|e| CurlError::Build(e.to_string()))?;

    apply_headers(call.headers_mut(), request, defaults)?;
    Ok(call)
}

/// Set baseline headers, then user headers, then `Content-Length`.
pub fn apply_headers(
    headers: &mut HeaderMap,
    request: &mut Request,
    defaults: &RequestDefaults,
) -> CurlResult<()> {
    // 1. Baseline
    headers.insert(header::ACCEPT, header_value(&request.accept)?);
    headers.insert(header::USER_AGENT, header_value(&defaults.user_agent)?);
    let connection = if request.flags.keep_alive { "keep-alive" } else { "close" };
    headers.insert(header::CONNECTION, HeaderValue::from_static(connection));

    // 2. User supplied, last occurrence of a key wins
    let mut keep_alive = false;
    for raw in &request.flags.headers {
        let (key, value) = split_header(raw)
            .ok_or_else(|| CurlError::Build(format!("invalid header {:?}: missing ':'", raw)))?;
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| CurlError::Build(format!("invalid header name {:?}: {}", key, e)))?;
        headers.insert(name, header_value(value)?);

        if key.eq_ignore_ascii_case("connection") && value == "keep-alive" {
            keep_alive = true;
        }
    }
    if keep_alive {
        request.flags.keep_alive = true;
    }

    // 3. Body length
    if request.carries_body() {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(request.flags.data.len()));
    }

    Ok(())
}

fn header_value(value: &str) -> CurlResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| CurlError::Build(format!("invalid header value {:?}: {}", value, e)))
}
