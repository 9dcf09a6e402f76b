use async_trait::async_trait;
use connmux_core::{Matcher, SniffingReader};
use tokio::net::tcp::OwnedReadHalf;

/// Matches every connection unconditionally. Register this last so it
/// catches whatever nothing else claimed (spec.md "Any matcher").
#[derive(Debug, Clone, Copy, Default)]
pub struct Any;

#[async_trait]
impl Matcher for Any {
    async fn matches(&self, _reader: &mut SniffingReader<OwnedReadHalf>) -> bool {
        true
    }
}

/// Builds the catch-all matcher.
#[must_use]
pub fn any() -> Any {
    Any
}

#[cfg(test)]
mod tests {
    use super::*;
    use connmux_core::MuxConn;
    use std::net::SocketAddr;
    use tokio::net::{TcpListener, TcpStream};

    async fn loopback_conn() -> MuxConn {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, remote_addr): (TcpStream, SocketAddr) = listener.accept().await.unwrap();
        drop(client);
        MuxConn::new(server, remote_addr)
    }

    #[tokio::test]
    async fn matches_any_connection() {
        let mut conn = loopback_conn().await;
        assert!(any().matches(conn.start_sniffing()).await);
    }
}
