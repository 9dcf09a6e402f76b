//! Error taxonomy for the dispatcher and its sub-listeners.
//!
//! The Go original this crate is derived from leans on `net.Error`'s
//! `Temporary()`/`Timeout()` methods to decide whether the accept loop
//! should keep running after a given error. Rust has no structural
//! equivalent, so [`MuxError`] exposes [`MuxError::is_temporary`] and
//! [`MuxError::is_timeout`] directly instead.

use std::io;
use std::net::SocketAddr;

/// Errors produced by the dispatcher, a sub-listener, or a registration call.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// No registered classifier accepted the connection. The connection has
    /// already been closed by the dispatcher by the time this is reported.
    #[error("connection from {remote_addr} not matched by any classifier")]
    Unmatched {
        /// Remote address of the connection that went unmatched.
        remote_addr: SocketAddr,
    },

    /// A sub-listener's queue was closed; no further connections will arrive.
    #[error("sub-listener closed")]
    ListenerClosed,

    /// The mux-wide close signal fired before a connection could be delivered.
    #[error("mux server closed")]
    ServerClosed,

    /// The root listener's `accept` call failed.
    #[error("root listener accept failed: {0}")]
    RootAccept(#[source] io::Error),

    /// A classifier (or sub-listener registration) was attempted after
    /// `serve()` had already started running. See the "Open question" on
    /// registration timing in `spec.md` §9 — this crate resolves it by
    /// freezing the classifier list at `serve()` start.
    #[error("cannot register a classifier after serve() has started")]
    AlreadyServing,
}

impl MuxError {
    /// Mirrors `net.Error.Temporary()` from the Go original: whether the
    /// accept loop should keep going after observing this error. The accept
    /// loop's real decision is `handler(&err) && err.is_temporary()` (see
    /// `Mux::serve`), matching `mini_cmux`'s own `handleErr` helper.
    ///
    /// `Unmatched` is always temporary (one bad connection shouldn't stop
    /// the server). `RootAccept` is temporary only for the same narrow set
    /// of transient conditions the Go original's `net.Error.Temporary()`
    /// covered for a failed `accept` — a dropped or interrupted connection
    /// attempt, or the call blocking when it shouldn't have. Every other
    /// `RootAccept` kind (e.g. the listener's socket itself is broken) is
    /// permanent, and every other variant (`ListenerClosed`, `ServerClosed`,
    /// `AlreadyServing`) is a terminal condition by construction.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Unmatched { .. } => true,
            Self::RootAccept(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionRefused
            ),
            Self::ListenerClosed | Self::ServerClosed | Self::AlreadyServing => false,
        }
    }

    /// Mirrors `net.Error.Timeout()` from the Go original: whether this
    /// error came from a deadline expiring. Only a `RootAccept` wrapping a
    /// `TimedOut` I/O error qualifies; a sniff deadline expiring surfaces as
    /// a failed classifier, not a `MuxError`.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RootAccept(err) if err.kind() == io::ErrorKind::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_is_temporary() {
        let err = MuxError::Unmatched {
            remote_addr: "127.0.0.1:1".parse().unwrap(),
        };
        assert!(err.is_temporary());
        assert!(!err.is_timeout());
    }

    #[test]
    fn closed_errors_are_permanent() {
        assert!(!MuxError::ListenerClosed.is_temporary());
        assert!(!MuxError::ServerClosed.is_temporary());
        assert!(!MuxError::AlreadyServing.is_temporary());
    }

    #[test]
    fn root_accept_temporary_only_for_transient_io_kinds() {
        let transient = MuxError::RootAccept(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(transient.is_temporary());

        let permanent = MuxError::RootAccept(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!permanent.is_temporary());
    }

    #[test]
    fn root_accept_timeout_reflects_io_kind() {
        let timed_out = MuxError::RootAccept(io::Error::from(io::ErrorKind::TimedOut));
        assert!(timed_out.is_timeout());

        let not_timed_out = MuxError::RootAccept(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(!not_timed_out.is_timeout());
    }
}
