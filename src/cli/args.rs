//! Argument groups and URL decomposition.

use clap::Parser;
use url::Url;

use crate::error::{CurlError, CurlResult};
use crate::http::request::{Flags, Request, Scheme};

/// Token separating argument groups.
pub const NEXT: &str = "--next";

/// Options accepted by one argument group.
#[derive(Debug, Parser)]
#[command(
    name = "rcurl",
    no_binary_name = true,
    disable_version_flag = true,
    override_usage = "rcurl [-options] <url> ...\n       rcurl [-options] <url> --next [-options] <url>...",
    after_help = "      --next  Make next URL use its separate set of options"
)]
struct GroupArgs {
    /// Enable verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Pass request method to server
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Pass custom header(s) to server
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// HTTP POST data
    #[arg(short, long, default_value = "")]
    data: String,

    /// Pass connection keep-alive to server
    #[arg(short = 'k', long = "keepAlive")]
    keep_alive: bool,

    /// Absolute http(s) URL
    url: String,
}

/// Split raw arguments into groups at every `--next`.
///
/// Always returns at least one group; a trailing `--next` yields an empty
/// last group, which then fails parsing for lack of a URL.
pub fn split_args_by_next(args: &[String]) -> Vec<Vec<String>> {
    args.split(|arg| arg == NEXT).map(|group| group.to_vec()).collect()
}

/// Parse one argument group into a validated request.
pub fn parse_args(group: &[String], accept: &str) -> CurlResult<Request> {
    let parsed = GroupArgs::try_parse_from(group).map_err(|e| {
        tracing::debug!(kind = ?e.kind(), "argument parsing failed");
        CurlError::Usage(e.render().to_string())
    })?;

    let (scheme, host, port, path) = process_url(&parsed.url)?;

    Ok(Request {
        url: parsed.url,
        scheme,
        host,
        port,
        path,
        accept: accept.to_string(),
        flags: Flags {
            verbose: parsed.verbose,
            method: parsed.method,
            headers: parsed.headers,
            data: parsed.data,
            keep_alive: parsed.keep_alive,
        },
    })
}

/// Decompose an absolute URL into scheme, host, port and request target.
///
/// The port defaults by scheme; the path defaults to `/` and keeps the
/// query string.
pub fn process_url(raw: &str) -> CurlResult<(Scheme, String, u16, String)> {
    let url = Url::parse(raw).map_err(|e| CurlError::Usage(format!("invalid URL {:?}: {}", raw, e)))?;

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => {
            return Err(CurlError::Usage(format!(
                "invalid URL {:?}: unsupported scheme {:?}",
                raw, other
            )))
        }
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CurlError::Usage(format!("invalid URL {:?}: missing host", raw)))?
        .to_string();
    let port = url.port().unwrap_or_else(|| scheme.default_port());

    let mut path = url.path().to_string();
    if path.is_empty() {
        path.push('/');
    }
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    Ok((scheme, host, port, path))
}
