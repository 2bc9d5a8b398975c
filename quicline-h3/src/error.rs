//! Error taxonomy shared by every codec and state machine in this crate.

/// Errors surfaced by the framing layer.
///
/// The first three variants are poll outcomes rather than failures:
/// `Incomplete` and `Idle` ask the caller to retry once more bytes or more
/// send capacity exist, `Delegate` tells a compound decoder that the next
/// frame belongs to a sibling codec. Everything else is terminal for the
/// affected stream or encode attempt; the connection keeps serving its
/// other streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum H3Error {
    /// Not enough bytes buffered to decode the next item.
    #[error("incomplete")]
    Incomplete,

    /// Nothing to produce right now.
    #[error("idle")]
    Idle,

    /// The next frame belongs to a different codec.
    #[error("delegate")]
    Delegate,

    /// Wire data violates a length or field invariant.
    #[error("malformed frame")]
    MalformedFrame,

    /// Value does not fit the 62-bit varint range.
    #[error("varint overflow")]
    VarintOverflow,

    /// Setting value exceeds its wire-format maximum.
    #[error("setting overflow")]
    SettingOverflow,

    /// The caller violated a state machine's call contract.
    #[error("state machine misuse")]
    Internal,

    /// The stream is gone, finished, or a critical stream closed early.
    #[error("stream closed")]
    StreamClosed,

    /// Data arrived for a stream id this connection does not know.
    #[error("unknown stream id")]
    UnknownStream,
}
