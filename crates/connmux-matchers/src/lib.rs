//! Built-in classifiers: the catch-all [`any`], the HTTP/1 request-header
//! matcher [`http1_header_field`], and the HTTP/2 (gRPC-shaped)
//! request-header matcher [`http2_header_field`], ported from
//! `mini_cmux`'s `matchers.go`.

mod any;
mod http1;
mod http2;

pub use any::{any, Any};
pub use http1::{http1_header_field, Http1HeaderField};
pub use http2::{http2_header_field, Http2HeaderField};
