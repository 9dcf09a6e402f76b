//! HTTP/1 request-header matcher, ported from `matchers.go`'s
//! `HTTP1HeaderField`.

use async_trait::async_trait;
use connmux_core::{Matcher, SniffingReader};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, trace};

/// Bound on `httparse`'s fixed-size header array. The byte-volume cap on how
/// much of a request this matcher will buffer before giving up lives in
/// `SniffingReader` instead (`MuxConfig::max_sniff_bytes`, threaded in by
/// `Mux::classify`), so it applies uniformly to every registered classifier
/// rather than each reimplementing its own.
const MAX_HEADERS: usize = 64;

/// Matches an HTTP/1 request whose `name` header equals `value` exactly.
pub struct Http1HeaderField {
    name: String,
    value: String,
}

#[async_trait]
impl Matcher for Http1HeaderField {
    async fn matches(&self, reader: &mut SniffingReader<OwnedReadHalf>) -> bool {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 512];

        loop {
            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut request = httparse::Request::new(&mut headers);
            match request.parse(&buf) {
                Ok(httparse::Status::Complete(_)) => {
                    let found = request.headers.iter().any(|h| {
                        h.name.eq_ignore_ascii_case(&self.name) && h.value == self.value.as_bytes()
                    });
                    debug!(name = %self.name, found, "http1 headers parsed");
                    return found;
                }
                Ok(httparse::Status::Partial) => {}
                Err(err) => {
                    trace!(%err, "not a valid http1 request");
                    return false;
                }
            }

            match reader.read(&mut chunk).await {
                Ok(0) => {
                    trace!("connection closed before headers completed");
                    return false;
                }
                Err(err) => {
                    trace!(%err, "sniff read failed");
                    return false;
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }
}

/// Builds a matcher for an HTTP/1 request whose `name` header is exactly
/// `value` (spec.md §6 `http1_header_field`).
pub fn http1_header_field(name: impl Into<String>, value: impl Into<String>) -> Http1HeaderField {
    Http1HeaderField {
        name: name.into(),
        value: value.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connmux_core::MuxConn;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn connected_pair() -> (MuxConn, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, remote_addr) = listener.accept().await.unwrap();
        (MuxConn::new(server, remote_addr), client)
    }

    #[tokio::test]
    async fn matches_exact_header_value() {
        let (mut conn, mut client) = connected_pair().await;
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\r\n")
            .await
            .unwrap();

        let matcher = http1_header_field("content-type", "application/json");
        assert!(matcher.matches(conn.start_sniffing()).await);
    }

    #[tokio::test]
    async fn rejects_mismatched_header_value() {
        let (mut conn, mut client) = connected_pair().await;
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nContent-Type: text/plain\r\n\r\n")
            .await
            .unwrap();

        let matcher = http1_header_field("content-type", "application/json");
        assert!(!matcher.matches(conn.start_sniffing()).await);
    }

    #[tokio::test]
    async fn rejects_non_http_traffic() {
        let (mut conn, mut client) = connected_pair().await;
        client.write_all(b"not an http request at all").await.unwrap();
        drop(client);

        let matcher = http1_header_field("content-type", "application/json");
        assert!(!matcher.matches(conn.start_sniffing()).await);
    }
}
