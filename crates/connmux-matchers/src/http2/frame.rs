//! A minimal RFC 7540 §4 frame codec: just enough to read SETTINGS,
//! HEADERS, and CONTINUATION frames and write an empty SETTINGS frame back,
//! mirroring what `matchers.go`'s `matchHTTP2Field` needs from
//! `golang.org/x/net/http2.Framer`. Not a general-purpose HTTP/2 codec: no
//! flow control, no DATA/PING/GOAWAY handling beyond recognizing the type.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub(crate) const FRAME_HEADER_LEN: usize = 9;

pub(crate) const TYPE_HEADERS: u8 = 0x1;
pub(crate) const TYPE_SETTINGS: u8 = 0x4;
pub(crate) const TYPE_CONTINUATION: u8 = 0x9;

pub(crate) const FLAG_END_HEADERS: u8 = 0x4;
pub(crate) const FLAG_ACK: u8 = 0x1;

/// The 24-byte sequence every HTTP/2 connection starts with (RFC 7540 §3.5).
pub(crate) const CLIENT_PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub(crate) struct Frame {
    pub(crate) frame_type: u8,
    pub(crate) flags: u8,
    pub(crate) payload: Vec<u8>,
}

/// Reads one frame header and its payload. Frame length is capped to bound
/// memory use against a connection claiming an implausibly large frame.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Frame> {
    const MAX_FRAME_LEN: usize = 1 << 20;

    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let length = usize::from(header[0]) << 16 | usize::from(header[1]) << 8 | usize::from(header[2]);
    if length > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame length exceeds sniffing bound",
        ));
    }
    let frame_type = header[3];
    let flags = header[4];

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    Ok(Frame {
        frame_type,
        flags,
        payload,
    })
}

/// Writes an empty SETTINGS frame (stream 0, no parameters), matching the
/// original's reply to a client's initial SETTINGS frame.
pub(crate) async fn write_empty_settings<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    let header = [0u8, 0, 0, TYPE_SETTINGS, 0, 0, 0, 0, 0];
    writer.write_all(&header).await?;
    writer.flush().await
}
