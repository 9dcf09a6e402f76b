//! [`MuxConn`]: the connection façade classifiers and consumers see.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::sniff::SniffingReader;

/// Pairs a raw TCP connection's read half (behind a [`SniffingReader`]) with
/// its write half. `Read` always goes through the sniffing reader; `Write`
/// goes straight to the socket, matching spec.md §4.2: "its `Write`, `Close`,
/// address accessors, etc. delegate straight to the raw connection."
///
/// The read and write halves are split up front (via `TcpStream::into_split`)
/// rather than sharing one handle behind the sniffing reader, because
/// handshake-style classifiers (`MatchWriter`) need to read and write the
/// connection at the same time: a single shared handle would force a
/// self-referential borrow that Rust's aliasing rules don't allow.
pub struct MuxConn {
    read: SniffingReader<OwnedReadHalf>,
    write: OwnedWriteHalf,
    remote_addr: SocketAddr,
}

impl MuxConn {
    /// Wraps an accepted [`TcpStream`], splitting it into independent read
    /// and write halves.
    pub fn new(stream: TcpStream, remote_addr: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            read: SniffingReader::new(read_half),
            write: write_half,
            remote_addr,
        }
    }

    /// The connection's remote address, as recorded at accept time.
    #[must_use]
    pub const fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Bounds how many bytes any single sniff round may record, per
    /// `MuxConfig::max_sniff_bytes` (spec.md §6).
    pub fn set_max_sniff_bytes(&mut self, max: Option<usize>) {
        self.read.set_max_sniff_bytes(max);
    }

    /// Rewinds the read side to offset 0 and returns a view classifiers read
    /// through. Called once per registered classifier (spec.md §4.4 step 1).
    pub fn start_sniffing(&mut self) -> &mut SniffingReader<OwnedReadHalf> {
        self.read.reset(true);
        &mut self.read
    }

    /// Ends the sniffing phase: buffered bytes remain queued for replay, but
    /// no further bytes are recorded.
    pub fn done_sniffing(&mut self) {
        self.read.reset(false);
    }

    /// The raw write half, exposed so handshake classifiers (`MatchWriter`)
    /// can write response bytes (e.g. an HTTP/2 SETTINGS frame) while the
    /// read side is still being sniffed.
    pub fn writer(&mut self) -> &mut OwnedWriteHalf {
        &mut self.write
    }

    /// Rewinds the read side and returns disjoint mutable borrows of both
    /// halves, for callers that need to read and write in the same call (a
    /// [`MatchWriter`](crate::matcher::MatchWriter) invocation). A single
    /// `&mut self` method can't hand out two independent `&mut self.field`
    /// borrows, so this exists instead of composing `start_sniffing` and
    /// `writer` at the call site.
    pub fn sniff_handles(&mut self) -> (&mut SniffingReader<OwnedReadHalf>, &mut OwnedWriteHalf) {
        self.read.reset(true);
        (&mut self.read, &mut self.write)
    }

    /// Closes both halves of the connection. Idempotent at the OS level:
    /// shutting down an already-closed socket just errors, which callers in
    /// this crate ignore.
    pub async fn close(mut self) {
        let _ = self.write.shutdown().await;
    }
}

impl AsyncRead for MuxConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().read).poll_read(cx, buf)
    }
}

impl AsyncWrite for MuxConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().write).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().write).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().write).poll_shutdown(cx)
    }
}
