//! Command-line surface.
//!
//! # Data Flow
//! ```text
//! argv[1..]
//!     → split_args_by_next (groups separated by `--next`)
//!     → parse_args per group (clap flags + url decomposition)
//!     → Vec<Request>, or the first usage error
//! ```

pub mod args;

pub use args::{parse_args, process_url, split_args_by_next};

use crate::error::CurlResult;
use crate::http::request::Request;

/// Parse every argument group; stops at the first usage error.
pub fn parse_batch(args: &[String], accept: &str) -> CurlResult<Vec<Request>> {
    split_args_by_next(args)
        .iter()
        .map(|group| parse_args(group, accept))
        .collect()
}
