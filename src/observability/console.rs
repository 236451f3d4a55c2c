//! User-facing output sink.
//!
//! Trace handlers run on transport worker tasks while the executor streams
//! the body from the calling task, so every writer hands over a complete
//! line (or group of lines) in one `write` call.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Sink {
    Stdout,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Cheap-to-clone handle on the process output.
#[derive(Debug, Clone)]
pub struct Console {
    sink: Sink,
}

impl Console {
    /// Console writing to standard output.
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    /// Console writing into an in-memory buffer, plus a handle to read it.
    pub fn capture() -> (Self, Captured) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sink: Sink::Buffer(Arc::clone(&buf)),
            },
            Captured { buf },
        )
    }

    /// Write a block of already formatted text.
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Write raw bytes, such as a chunk of response body.
    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        match &self.sink {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            Sink::Buffer(buf) => {
                buf.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    /// Write decorative trace text. Failures are logged, never propagated.
    pub fn emit(&self, text: &str) {
        if let Err(e) = self.write_str(text) {
            tracing::debug!(error = %e, "failed to write trace output");
        }
    }
}

/// Read side of a captured console.
#[derive(Debug, Clone)]
pub struct Captured {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Captured {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_writes_in_order() {
        let (console, captured) = Console::capture();
        console.emit("* one\n");
        console.write_bytes(b"body").unwrap();
        assert_eq!(captured.contents(), "* one\nbody");
    }
}
