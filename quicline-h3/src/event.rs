//! Typed events surfaced by stream receivers.

use bytes::Bytes;

use crate::qpack::HeaderField;
use crate::settings::Settings;

/// One application-visible happening, dispatched synchronously to the
/// handler passed into `recv`.
///
/// `fin: true` marks the event that coincides with the end of its stream;
/// a stream that ends with nothing left to report closes with one final
/// empty [`Data`](H3Event::Data) event instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum H3Event {
    /// The peer's SETTINGS arrived on its control stream.
    Settings(Settings),
    /// One decoded header of a response header section.
    Header {
        stream_id: u64,
        header: HeaderField,
        fin: bool,
    },
    /// One chunk of response body.
    Data {
        stream_id: u64,
        chunk: Bytes,
        fin: bool,
    },
    /// The peer will stop accepting requests above `stream_id`.
    GoAway { stream_id: u64 },
}
