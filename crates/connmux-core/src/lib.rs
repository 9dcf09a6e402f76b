//! Sniffing connection wrapper and classifier-based dispatch engine for TCP
//! connection multiplexing: accept once, classify by peeking at the initial
//! bytes, hand the still-unconsumed connection off to whichever protocol
//! server owns that class of traffic.
//!
//! The pieces:
//! - [`Mux`] runs the accept loop and owns classifier registration.
//! - [`SubListener`] is the per-classifier listener handed back to callers.
//! - [`Matcher`]/[`MatchWriter`] are the classifier traits callers implement.
//! - [`MuxConn`] is the connection façade classifiers and consumers see.
//! - [`SniffingReader`] is the buffered, replayable reader underneath it all.

mod config;
mod conn;
mod error;
mod matcher;
mod mux;
mod sniff;
mod sub_listener;

pub use config::{MuxConfig, MuxConfigBuilder, DEFAULT_MAX_SNIFF_BYTES, DEFAULT_QUEUE_CAPACITY};
pub use conn::MuxConn;
pub use error::MuxError;
pub use matcher::{MatchWriter, Matcher};
pub use mux::Mux;
pub use sniff::SniffingReader;
pub use sub_listener::SubListener;
