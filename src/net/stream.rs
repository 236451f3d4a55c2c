//! Pooled connection stream with call-level lifecycle reporting.
//!
//! # Responsibilities
//! - Wrap a plain or TLS TCP stream handed to the pool
//! - Report GotConn and WroteHeaders on the first write of each call
//! - Expose the remote address to the response through `Connected::extra`

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::observability::trace::{TraceEvent, TraceHub};

/// Identity of the connection that served a response.
///
/// Inserted into every response's extensions by the pooled client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote_addr: SocketAddr,
}

pub(crate) enum MaybeTls {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Stream owned by the connection pool.
pub struct TracedStream {
    io: TokioIo<MaybeTls>,
    remote_addr: SocketAddr,
    /// Pool key this connection was dialed for.
    pool_key: String,
    negotiated_h2: bool,
    hub: Arc<TraceHub>,
    /// Epoch of the last call that wrote on this connection; 0 before any.
    last_epoch: u64,
    calls_served: u64,
}

impl TracedStream {
    pub(crate) fn new(
        io: MaybeTls,
        remote_addr: SocketAddr,
        pool_key: String,
        negotiated_h2: bool,
        hub: Arc<TraceHub>,
    ) -> Self {
        Self {
            io: TokioIo::new(io),
            remote_addr,
            pool_key,
            negotiated_h2,
            hub,
            last_epoch: 0,
            calls_served: 0,
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Called after every successful write.
    ///
    /// Only a connection the current call can be served by claims it, so
    /// late control frames on an idle h2 connection stay silent.
    fn observe_write(&mut self) {
        let epoch = self.hub.epoch();
        if epoch == self.last_epoch || !self.hub.targets(&self.pool_key) {
            return;
        }
        let reused = self.calls_served > 0;
        self.last_epoch = epoch;
        self.calls_served += 1;

        tracing::trace!(remote = %self.remote_addr, reused, epoch, "connection serving call");
        self.hub.emit(TraceEvent::GotConn {
            remote_addr: self.remote_addr,
            reused,
        });
        self.hub.emit(TraceEvent::WroteHeaders);
    }
}

impl Connection for TracedStream {
    fn connected(&self) -> Connected {
        let connected = Connected::new().extra(ConnectionInfo {
            remote_addr: self.remote_addr,
        });
        if self.negotiated_h2 {
            connected.negotiated_h2()
        } else {
            connected
        }
    }
}

impl hyper::rt::Read for TracedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_read(cx, buf)
    }
}

impl hyper::rt::Write for TracedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.io).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &res {
            if *n > 0 {
                this.observe_write();
            }
        }
        res
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.io).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(n)) = &res {
            if *n > 0 {
                this.observe_write();
            }
        }
        res
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl AsyncRead for MaybeTls {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTls {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            MaybeTls::Plain(s) => s.is_write_vectored(),
            MaybeTls::Tls(s) => s.is_write_vectored(),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
