//! The sniffing buffered reader: lets classifiers peek at a connection's
//! initial bytes non-destructively, replaying them for whichever consumer
//! ultimately owns the connection.
//!
//! See `spec.md` §4.1 for the full state-machine description. This type
//! wraps an inner [`AsyncRead`] source and records bytes read during a
//! "sniff" phase so they can be replayed byte-for-byte afterwards.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Records bytes read from `source` while sniffing, and replays them on
/// subsequent reads.
///
/// Invariants (spec.md §3):
/// - while `sniffing`, every byte delivered to the caller is also appended
///   to `buffer`.
/// - `replay_pos <= buffered_len <= buffer.len()`.
/// - once `sniffing` is false and `replay_pos == buffered_len`, reads go
///   straight to `source` and the buffer is released.
pub struct SniffingReader<S> {
    source: S,
    buffer: Vec<u8>,
    replay_pos: usize,
    buffered_len: usize,
    sniffing: bool,
    last_err: Option<io::Error>,
    max_sniff_bytes: Option<usize>,
    sniff_round_start: usize,
}

impl<S> SniffingReader<S> {
    /// Wraps `source` in a fresh reader, starting in the transparent phase.
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            replay_pos: 0,
            buffered_len: 0,
            sniffing: false,
            last_err: None,
            max_sniff_bytes: None,
            sniff_round_start: 0,
        }
    }

    /// Bounds how many bytes a single sniff round (the span between one
    /// `reset(true)` and the next phase change) may record, so a classifier
    /// can't be stalled indefinitely by a slow or malicious sender
    /// (spec.md §9's second Open Question). `None` disables the cap, which
    /// is the default for a reader not driven through [`crate::Mux`].
    pub fn set_max_sniff_bytes(&mut self, max: Option<usize>) {
        self.max_sniff_bytes = max;
    }

    /// Re-enters a phase. `reset(true)` rewinds the stream to offset 0 for
    /// the next classifier; `reset(false)` ends sniffing and drains the
    /// buffer transparently before passing reads straight through.
    pub fn reset(&mut self, sniffing: bool) {
        self.sniffing = sniffing;
        self.replay_pos = 0;
        self.buffered_len = self.buffer.len();
        self.sniff_round_start = self.buffer.len();
    }

    /// Whether the reader currently has buffered bytes left to replay.
    #[must_use]
    pub fn has_buffered(&self) -> bool {
        self.replay_pos < self.buffered_len
    }

    /// Unwraps the reader, returning the underlying source. Only meaningful
    /// once fully transparent (no callers in this crate do this while a
    /// replay is still pending).
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for SniffingReader<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.replay_pos < this.buffered_len {
            let available = &this.buffer[this.replay_pos..this.buffered_len];
            let n = available.len().min(buf.remaining());
            buf.put_slice(&available[..n]);
            this.replay_pos += n;
            return Poll::Ready(Ok(()));
        }

        if !this.sniffing && !this.buffer.is_empty() {
            this.buffer = Vec::new();
            this.replay_pos = 0;
            this.buffered_len = 0;
        }

        if this.sniffing {
            if let Some(max) = this.max_sniff_bytes {
                if this.buffer.len() - this.sniff_round_start >= max {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "sniff buffer exceeded max_sniff_bytes",
                    )));
                }
            }
        }

        // The buffered tail has just been fully drained (or there never was
        // one): surface a sniff-time error exactly once, the same call a
        // caller would otherwise start reading fresh bytes from `source`.
        //
        // Unlike the Go original this is ported from, which leaves a stale
        // recorded error live across sniff rounds until a later sniffing
        // read overwrites it, this reader clears the error once observed —
        // resurfacing an already-reported error indefinitely isn't a
        // property any of spec.md's invariants rely on, and looks like an
        // artifact of the original's local-variable bookkeeping rather than
        // an intentional contract.
        if let Some(err) = this.last_err.take() {
            return Poll::Ready(Err(err));
        }

        let filled_before = buf.filled().len();
        match Pin::new(&mut this.source).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if this.sniffing {
                    let delivered = &buf.filled()[filled_before..];
                    if !delivered.is_empty() {
                        this.buffer.extend_from_slice(delivered);
                    }
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => {
                if this.sniffing {
                    this.last_err = Some(io::Error::new(err.kind(), err.to_string()));
                }
                Poll::Ready(Err(err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn transparent_replay_matches_source() {
        let source = Cursor::new(b"hello world".to_vec());
        let mut r = SniffingReader::new(source);

        r.reset(true);
        let mut head = [0u8; 5];
        r.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"hello");
        r.reset(false);

        let mut rest = Vec::new();
        r.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"hello world");
    }

    #[tokio::test]
    async fn multi_rewind_yields_full_stream_each_time() {
        let source = Cursor::new(b"bufferReaderbufferReader".to_vec());
        let mut r = SniffingReader::new(source);

        for _ in 0..2 {
            r.reset(true);
            let mut chunk = vec![0u8; "bufferReader".len()];
            r.read_exact(&mut chunk).await.unwrap();
            assert_eq!(chunk, b"bufferReader");
        }
        r.reset(false);

        let mut rest = Vec::new();
        r.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"bufferReaderbufferReader");
    }

    #[tokio::test]
    async fn buffer_replay_scenario_yields_repeated_reads() {
        // spec.md §8 scenario 3: a matcher reads "bufferReader".len() bytes
        // and rejects; the catch-all then must see the same bytes from
        // byte 0, repeated across 5 identical reads.
        let payload = "bufferReader".repeat(5);
        let source = Cursor::new(payload.clone().into_bytes());
        let mut r = SniffingReader::new(source);

        r.reset(true);
        let mut probe = vec![0u8; "bufferReader".len()];
        r.read_exact(&mut probe).await.unwrap();
        r.reset(true); // rewind for the next (catch-all) classifier

        let mut replayed = Vec::new();
        for _ in 0..5 {
            let mut chunk = vec![0u8; "bufferReader".len()];
            r.read_exact(&mut chunk).await.unwrap();
            assert_eq!(chunk, b"bufferReader");
            replayed.extend_from_slice(&chunk);
        }
        assert_eq!(replayed, payload.as_bytes());
    }

    #[tokio::test]
    async fn releases_buffer_once_transparent_and_drained() {
        let source = Cursor::new(b"abc".to_vec());
        let mut r = SniffingReader::new(source);
        r.reset(true);
        let mut buf = [0u8; 3];
        r.read_exact(&mut buf).await.unwrap();
        r.reset(false);

        let mut tail = [0u8; 3];
        r.read_exact(&mut tail).await.unwrap();
        assert_eq!(&tail, b"abc");
        assert!(r.buffer.is_empty());
        assert!(!r.has_buffered());
    }

    #[tokio::test]
    async fn sniff_cap_fails_closed_once_exceeded() {
        let source = Cursor::new(b"abcdefgh".to_vec());
        let mut r = SniffingReader::new(source);
        r.set_max_sniff_bytes(Some(4));

        r.reset(true);
        let mut chunk = [0u8; 4];
        r.read_exact(&mut chunk).await.unwrap();
        assert_eq!(&chunk, b"abcd");

        let mut one = [0u8; 1];
        let err = r.read_exact(&mut one).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn sniff_cap_resets_each_round() {
        let source = Cursor::new(b"abcdefgh".to_vec());
        let mut r = SniffingReader::new(source);
        r.set_max_sniff_bytes(Some(4));

        r.reset(true);
        let mut chunk = [0u8; 4];
        r.read_exact(&mut chunk).await.unwrap();

        r.reset(true); // next classifier's round: cap budget renews
        let mut rewound = [0u8; 4];
        r.read_exact(&mut rewound).await.unwrap();
        assert_eq!(&rewound, b"abcd");
    }
}
