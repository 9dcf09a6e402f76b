//! [`SubListener`]: the listener handed back to `Mux::r#match`, exposed to
//! whichever protocol server owns that class of connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::conn::MuxConn;
use crate::error::MuxError;

pub(crate) struct SubListenerShared {
    pub(crate) receiver: AsyncMutex<mpsc::Receiver<MuxConn>>,
    pub(crate) close_signal: CancellationToken,
    pub(crate) local_addr: SocketAddr,
}

/// A listener that yields only the connections one classifier accepted.
///
/// State machine (spec.md §4.5):
///
/// | State   | `accept`            | on mux close | dequeue from closed queue |
/// |---------|---------------------|--------------|---------------------------|
/// | Open    | deliver              | → Closing    | —                         |
/// | Closing | `SERVER_CLOSED`      | —            | `LISTENER_CLOSED`         |
pub struct SubListener {
    pub(crate) shared: Arc<SubListenerShared>,
}

impl SubListener {
    /// Dequeues the next connection handed off by the dispatcher.
    ///
    /// Returns [`MuxError::ServerClosed`] once the mux-wide close signal has
    /// fired — even if connections are still sitting in the queue, since the
    /// dispatcher's shutdown sequence drains and closes those itself before
    /// releasing waiting consumers (spec.md §4.4 "Shutdown sequence"). Returns
    /// [`MuxError::ListenerClosed`] if the queue was closed without the mux
    /// signal firing (not reachable through the public API today, but kept
    /// distinct because the queue-closed and mux-closed cases are distinct
    /// states in spec.md's table).
    pub async fn accept(&self) -> Result<MuxConn, MuxError> {
        let mut receiver = self.shared.receiver.lock().await;
        tokio::select! {
            biased;
            () = self.shared.close_signal.cancelled() => Err(MuxError::ServerClosed),
            item = receiver.recv() => item.ok_or(MuxError::ListenerClosed),
        }
    }

    /// The root listener's local address (spec.md §4.5: "address accessors
    /// delegate to the root listener").
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// No-op: closing a sub-listener is driven entirely by the owning
    /// [`crate::Mux`]'s shutdown sequence (spec.md §4.5).
    pub const fn close(&self) {}
}
