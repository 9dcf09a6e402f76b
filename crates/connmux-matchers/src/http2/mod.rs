//! HTTP/2 (gRPC-shaped) request-header matcher, ported from `matchers.go`'s
//! `HTTP2HeaderField` / `matchHTTP2Field`.

mod frame;
mod hpack;

use async_trait::async_trait;
use connmux_core::{MatchWriter, SniffingReader};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace};

use frame::{
    read_frame, write_empty_settings, CLIENT_PREFACE, FLAG_ACK, FLAG_END_HEADERS,
    TYPE_CONTINUATION, TYPE_HEADERS, TYPE_SETTINGS,
};
use hpack::{decode_header_block, DynamicTable};

const DYNAMIC_TABLE_SIZE: usize = 4 << 10;

/// Matches an HTTP/2 request whose `name` header is exactly `value`. Reads
/// the client connection preface, replies to the client's SETTINGS frame,
/// and decodes HEADERS/CONTINUATION frames until `END_HEADERS` or an error.
pub struct Http2HeaderField {
    name: String,
    value: String,
}

#[async_trait]
impl MatchWriter for Http2HeaderField {
    async fn matches(
        &self,
        writer: &mut OwnedWriteHalf,
        reader: &mut SniffingReader<OwnedReadHalf>,
    ) -> bool {
        if !has_http2_preface(reader).await {
            trace!("missing http2 client preface");
            return false;
        }

        let mut dynamic = DynamicTable::new(DYNAMIC_TABLE_SIZE);
        let mut header_block = Vec::new();

        loop {
            let frame = match read_frame(reader).await {
                Ok(frame) => frame,
                Err(err) => {
                    trace!(%err, "failed to read http2 frame");
                    return false;
                }
            };

            match frame.frame_type {
                TYPE_SETTINGS => {
                    // The sender acknowledged our (not-yet-sent) SETTINGS;
                    // nothing to do. Otherwise reply in kind, matching the
                    // original's naive accept-any-settings behavior — this
                    // is a classifier, not a conforming HTTP/2 endpoint.
                    if frame.flags & FLAG_ACK == 0 && write_empty_settings(writer).await.is_err() {
                        return false;
                    }
                }
                TYPE_HEADERS | TYPE_CONTINUATION => {
                    header_block.extend_from_slice(&frame.payload);
                    if frame.flags & FLAG_END_HEADERS != 0 {
                        break;
                    }
                }
                _ => {}
            }
        }

        let mut found = false;
        let decoded = decode_header_block(&header_block, &mut dynamic, |n, v| {
            if n.eq_ignore_ascii_case(&self.name) && v == self.value {
                found = true;
            }
        });
        let matched = decoded.is_some() && found;
        debug!(name = %self.name, matched, "http2 headers decoded");
        matched
    }
}

async fn has_http2_preface(reader: &mut SniffingReader<OwnedReadHalf>) -> bool {
    let mut buf = [0u8; CLIENT_PREFACE.len()];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => return false,
            Err(err) => {
                trace!(%err, "sniff read failed while reading http2 preface");
                return false;
            }
            Ok(n) => {
                filled += n;
                if buf[..filled] != CLIENT_PREFACE[..filled] {
                    return false;
                }
            }
        }
    }
    true
}

/// Builds a matcher for an HTTP/2 request whose `name` header is exactly
/// `value` (spec.md §6 `http2_header_field`).
pub fn http2_header_field(name: impl Into<String>, value: impl Into<String>) -> Http2HeaderField {
    Http2HeaderField {
        name: name.into(),
        value: value.into(),
    }
}
