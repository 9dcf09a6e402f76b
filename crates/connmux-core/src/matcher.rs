//! Classifier traits. See spec.md §4.3/§9: all registered classifiers are
//! stored uniformly as [`MatchWriter`]s; a plain [`Matcher`] is lifted by
//! ignoring the writer argument.

use async_trait::async_trait;
use tokio::net::tcp::OwnedReadHalf;

use crate::sniff::SniffingReader;

/// A read-only classifier predicate over a connection's initial bytes.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Inspects `reader` (which starts at byte 0 of the connection for
    /// every call) and decides whether the connection belongs here.
    async fn matches(&self, reader: &mut SniffingReader<OwnedReadHalf>) -> bool;
}

/// A classifier allowed to write to the connection while deciding — for
/// protocols whose classification requires participating in a handshake
/// (e.g. HTTP/2's SETTINGS exchange).
#[async_trait]
pub trait MatchWriter: Send + Sync {
    /// Inspects `reader` and may write handshake bytes to `writer`. Bytes
    /// written must remain valid for whichever downstream server ends up
    /// owning the connection (spec.md §6 "Wire semantics").
    async fn matches(
        &self,
        writer: &mut tokio::net::tcp::OwnedWriteHalf,
        reader: &mut SniffingReader<OwnedReadHalf>,
    ) -> bool;
}

/// Lifts a read-only [`Matcher`] into a [`MatchWriter`] that ignores the
/// writer, per spec.md §9 "Unified classifier representation".
pub(crate) struct Lifted<M>(pub M);

#[async_trait]
impl<M: Matcher> MatchWriter for Lifted<M> {
    async fn matches(
        &self,
        _writer: &mut tokio::net::tcp::OwnedWriteHalf,
        reader: &mut SniffingReader<OwnedReadHalf>,
    ) -> bool {
        self.0.matches(reader).await
    }
}
