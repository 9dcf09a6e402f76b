//! Shared end-to-end test harness: bind a [`Mux`] on an ephemeral loopback
//! port and drive it with real `TcpStream` clients, mirroring how
//! `mini_cmux_test.go` exercises the dispatcher over `net.Listen("tcp",
//! "127.0.0.1:0")` rather than any in-process fake.

use std::sync::Arc;

use connmux_core::{Matcher, Mux, SniffingReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

/// Binds a fresh [`Mux`] on an ephemeral port and returns it alongside the
/// address clients should dial. Classifiers must be registered on the
/// returned `Mux` before [`serve`] is spawned (spec.md §9: registration is
/// frozen once `serve()` starts).
pub async fn bind() -> (Arc<Mux>, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    (Arc::new(Mux::new(listener)), addr)
}

/// Spawns the mux's accept loop in the background, returning its join
/// handle so tests can bound how long shutdown takes.
pub fn spawn_serve(mux: Arc<Mux>) -> tokio::task::JoinHandle<Result<(), connmux_core::MuxError>> {
    tokio::spawn(async move { mux.serve().await })
}

/// Connects a plain client `TcpStream` to `addr`.
pub async fn connect(addr: std::net::SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect")
}

/// A [`Matcher`] that reads exactly `len` bytes from the connection and then
/// unconditionally rejects it, used to exercise sniff/rewind/replay across
/// classifier boundaries (spec.md §8 scenario 3, "buffer replay").
pub struct ReadNAndReject {
    pub len: usize,
}

#[async_trait::async_trait]
impl Matcher for ReadNAndReject {
    async fn matches(&self, reader: &mut SniffingReader<OwnedReadHalf>) -> bool {
        use tokio::io::AsyncReadExt;
        let mut discard = vec![0u8; self.len];
        let _ = reader.read_exact(&mut discard).await;
        false
    }
}
