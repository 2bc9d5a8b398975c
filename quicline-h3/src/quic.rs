//! Transport-facing data vocabulary.
//!
//! The framing layer never touches a socket. [`StreamData`] is the sole
//! currency exchanged with the QUIC transport: `Connection::send` produces
//! it for the transport to write, and bytes the transport reads come back
//! in through `Connection::recv` in the same shape.

use bytes::Bytes;

/// A run of bytes on one QUIC stream, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamData {
    /// QUIC stream the bytes belong to.
    pub stream_id: u64,
    /// True when these are the last bytes of the stream.
    pub fin: bool,
    pub data: Bytes,
}

impl StreamData {
    pub fn new(stream_id: u64, fin: bool, data: Bytes) -> Self {
        StreamData { stream_id, fin, data }
    }
}
