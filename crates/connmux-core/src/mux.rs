//! The dispatcher: owns the root listener, runs the accept loop, and fans
//! each accepted connection out to the first matching sub-listener.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::MuxConfig;
use crate::conn::MuxConn;
use crate::error::MuxError;
use crate::matcher::{Lifted, MatchWriter, Matcher};
use crate::sub_listener::{SubListener, SubListenerShared};

type ErrorHandlerFn = dyn Fn(&MuxError) -> bool + Send + Sync;

struct ClassifierEntry {
    matcher: Arc<dyn MatchWriter>,
    sender: mpsc::Sender<MuxConn>,
    shared: Arc<SubListenerShared>,
}

enum Registration {
    Open(Vec<ClassifierEntry>),
    Frozen(Arc<Vec<ClassifierEntry>>),
}

/// A connection multiplexer: the dispatch engine described in spec.md §4.4.
pub struct Mux {
    root: TcpListener,
    registration: StdMutex<Registration>,
    close_token: CancellationToken,
    error_handler: StdMutex<Arc<ErrorHandlerFn>>,
    read_timeout: StdMutex<Option<Duration>>,
    config: MuxConfig,
}

impl Mux {
    /// Creates a multiplexer over `root` with default configuration.
    #[must_use]
    pub fn new(root: TcpListener) -> Self {
        Self::with_config(root, MuxConfig::default())
    }

    /// Creates a multiplexer over `root` with the given [`MuxConfig`].
    #[must_use]
    pub fn with_config(root: TcpListener, config: MuxConfig) -> Self {
        let read_timeout = config.read_timeout();
        Self {
            root,
            registration: StdMutex::new(Registration::Open(Vec::new())),
            close_token: CancellationToken::new(),
            error_handler: StdMutex::new(Arc::new(|_: &MuxError| true)),
            read_timeout: StdMutex::new(read_timeout),
            config,
        }
    }

    /// Registers a read-only classifier, returning the sub-listener that
    /// will receive connections it accepts. Registration order is priority
    /// order: earlier registrations are tried first.
    pub fn r#match(&self, matcher: impl Matcher + 'static) -> Result<SubListener, MuxError> {
        self.register(Arc::new(Lifted(matcher)))
    }

    /// Registers a handshake-capable classifier (spec.md §6
    /// `mux.match_with_writer`).
    pub fn match_with_writer(
        &self,
        matcher: impl MatchWriter + 'static,
    ) -> Result<SubListener, MuxError> {
        self.register(Arc::new(matcher))
    }

    fn register(&self, matcher: Arc<dyn MatchWriter>) -> Result<SubListener, MuxError> {
        let mut registration = self.registration.lock().unwrap_or_else(|p| p.into_inner());
        let Registration::Open(entries) = &mut *registration else {
            return Err(MuxError::AlreadyServing);
        };

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity());
        let shared = Arc::new(SubListenerShared {
            receiver: tokio::sync::Mutex::new(receiver),
            close_signal: self.close_token.child_token(),
            local_addr: self.local_addr(),
        });
        entries.push(ClassifierEntry {
            matcher,
            sender,
            shared: Arc::clone(&shared),
        });
        Ok(SubListener { shared })
    }

    /// Installs an error handler invoked on root-listener errors and on
    /// unmatched-connection events. Its return value decides whether the
    /// accept loop continues.
    pub fn handle_error(&self, handler: impl Fn(&MuxError) -> bool + Send + Sync + 'static) {
        *self.error_handler.lock().unwrap_or_else(|p| p.into_inner()) = Arc::new(handler);
    }

    /// Sets (or clears, with `None`) the per-sniff read deadline applied to
    /// the underlying connection while a classifier is examining it.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        *self.read_timeout.lock().unwrap_or_else(|p| p.into_inner()) = timeout;
    }

    /// The root listener's local address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.root
            .local_addr()
            .expect("a bound TcpListener always has a local address")
    }

    /// Idempotently requests shutdown: fires the mux-wide close signal. Any
    /// [`serve`](Self::serve) call in progress will observe it, drain its
    /// sub-listeners, and return.
    pub fn close(&self) {
        self.close_token.cancel();
    }

    /// Runs the accept loop until the root listener fails, `close()` is
    /// called, or the error handler requests termination. Spawns one
    /// classification task per accepted connection.
    pub async fn serve(&self) -> Result<(), MuxError> {
        let entries = self.freeze_classifiers();
        let mut tasks = JoinSet::new();
        let mut outcome = Err(MuxError::ServerClosed);

        loop {
            tokio::select! {
                biased;
                () = self.close_token.cancelled() => {
                    info!("mux close requested, stopping accept loop");
                    outcome = Err(MuxError::ServerClosed);
                    break;
                }
                accepted = self.root.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            trace!(%remote_addr, "accepted connection");
                            let entries = Arc::clone(&entries);
                            let close_token = self.close_token.clone();
                            let read_timeout = *self.read_timeout.lock().unwrap_or_else(|p| p.into_inner());
                            let error_handler = Arc::clone(&self.error_handler.lock().unwrap_or_else(|p| p.into_inner()));
                            let max_sniff_bytes = self.config.max_sniff_bytes();
                            tasks.spawn(async move {
                                classify(stream, remote_addr, entries, close_token, read_timeout, max_sniff_bytes, error_handler).await;
                            });
                        }
                        Err(err) => {
                            let mux_err = MuxError::RootAccept(err);
                            let handler = Arc::clone(&self.error_handler.lock().unwrap_or_else(|p| p.into_inner()));
                            if !(handler(&mux_err) && mux_err.is_temporary()) {
                                warn!(error = %mux_err, "root accept failed permanently, stopping accept loop");
                                outcome = Err(mux_err);
                                break;
                            }
                            warn!(error = %mux_err, "root accept failed, continuing");
                        }
                    }
                }
            }
        }

        // Wait for every in-flight classification task before draining, so
        // that no task is still trying to enqueue onto a channel we're about
        // to close out from under it.
        while tasks.join_next().await.is_some() {}

        // `entries` is an `Arc` also held by `self.registration` for the
        // rest of the `Mux`'s life, so its `Sender`s can't be dropped here —
        // close the `Receiver` side instead, which stops new sends and lets
        // the drain below still observe whatever was already queued.
        for entry in entries.iter() {
            let mut receiver = entry.shared.receiver.lock().await;
            receiver.close();
            while let Some(conn) = receiver.recv().await {
                conn.close().await;
            }
            drop(receiver);
            entry.shared.close_signal.cancel();
        }

        debug!("mux shutdown complete");
        outcome
    }

    fn freeze_classifiers(&self) -> Arc<Vec<ClassifierEntry>> {
        let mut registration = self.registration.lock().unwrap_or_else(|p| p.into_inner());
        match &*registration {
            Registration::Frozen(entries) => Arc::clone(entries),
            Registration::Open(_) => {
                let Registration::Open(entries) =
                    std::mem::replace(&mut *registration, Registration::Open(Vec::new()))
                else {
                    unreachable!()
                };
                let frozen = Arc::new(entries);
                *registration = Registration::Frozen(Arc::clone(&frozen));
                frozen
            }
        }
    }
}

async fn classify(
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    entries: Arc<Vec<ClassifierEntry>>,
    close_token: CancellationToken,
    read_timeout: Option<Duration>,
    max_sniff_bytes: Option<usize>,
    error_handler: Arc<ErrorHandlerFn>,
) {
    let mut conn = MuxConn::new(stream, remote_addr);
    conn.set_max_sniff_bytes(max_sniff_bytes);

    for (index, entry) in entries.iter().enumerate() {
        let (reader, writer) = conn.sniff_handles();
        let matched = if let Some(timeout) = read_timeout {
            match tokio::time::timeout(timeout, entry.matcher.matches(writer, reader)).await {
                Ok(result) => result,
                Err(_) => {
                    trace!(%remote_addr, classifier = index, "sniff read timed out");
                    false
                }
            }
        } else {
            entry.matcher.matches(writer, reader).await
        };

        if matched {
            debug!(%remote_addr, classifier = index, "connection matched");
            conn.done_sniffing();
            tokio::select! {
                biased;
                () = close_token.cancelled() => {
                    conn.close().await;
                }
                send_result = entry.sender.send(conn) => {
                    if send_result.is_err() {
                        // Receiver dropped concurrently with the hand-off race;
                        // nothing to close since `conn` was moved into `send`.
                    }
                }
            }
            return;
        }
    }

    warn!(%remote_addr, "connection not matched by any classifier");
    conn.close().await;
    let err = MuxError::Unmatched { remote_addr };
    if !error_handler(&err) {
        warn!(%remote_addr, "error handler rejected UNMATCHED, closing root listener");
        close_token.cancel();
    }
}
