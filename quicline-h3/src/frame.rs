//! HTTP/3 frame codec.
//!
//! Frames are `varint(type) || varint(length) || payload`. DATA, HEADERS
//! and PUSH_PROMISE declare payload byte-runs that the frame layer never
//! buffers: only the declared length travels in the [`Frame`] value and the
//! bytes themselves are streamed by the body/header codecs on top.
//!
//! Decoding parses through a lookahead and commits consumption only when a
//! whole frame header (and any numeric payload) decoded, so a frame split
//! across network reads costs nothing but a retry.

use quicline_buf::{Lookahead, Sequence};

use crate::error::H3Error;
use crate::settings::Settings;
use crate::varint;

// ── Frame types ─────────────────────────────────────────────────────

pub(crate) const TYPE_DATA: u64 = 0x0;
pub(crate) const TYPE_HEADERS: u64 = 0x1;
pub(crate) const TYPE_PRIORITY: u64 = 0x2;
pub(crate) const TYPE_CANCEL_PUSH: u64 = 0x3;
pub(crate) const TYPE_SETTINGS: u64 = 0x4;
pub(crate) const TYPE_PUSH_PROMISE: u64 = 0x5;
pub(crate) const TYPE_GOAWAY: u64 = 0x7;
pub(crate) const TYPE_MAX_PUSH_ID: u64 = 0xd;
pub(crate) const TYPE_DUPLICATE_PUSH: u64 = 0xe;

/// Element kinds a PRIORITY frame can prioritize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrioritizedElement {
    Request,
    Push,
    Placeholder,
    /// The stream the frame arrived on.
    Current,
}

impl PrioritizedElement {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => PrioritizedElement::Request,
            1 => PrioritizedElement::Push,
            2 => PrioritizedElement::Placeholder,
            _ => PrioritizedElement::Current,
        }
    }

    fn bits(self) -> u8 {
        match self {
            PrioritizedElement::Request => 0,
            PrioritizedElement::Push => 1,
            PrioritizedElement::Placeholder => 2,
            PrioritizedElement::Current => 3,
        }
    }
}

/// Element kinds a PRIORITY frame can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementDependency {
    Request,
    Push,
    Placeholder,
    /// The root of the dependency tree.
    Root,
}

impl ElementDependency {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => ElementDependency::Request,
            1 => ElementDependency::Push,
            2 => ElementDependency::Placeholder,
            _ => ElementDependency::Root,
        }
    }

    fn bits(self) -> u8 {
        match self {
            ElementDependency::Request => 0,
            ElementDependency::Push => 1,
            ElementDependency::Placeholder => 2,
            ElementDependency::Root => 3,
        }
    }
}

/// PRIORITY frame payload. Parsed for wire compatibility; this layer does
/// not schedule anything with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub prioritized: PrioritizedElement,
    pub dependency: ElementDependency,
    pub prioritized_id: u64,
    pub dependency_id: u64,
    pub weight: u8,
}

/// One HTTP/3 frame.
///
/// `size` fields are declared byte-run lengths whose bytes live outside
/// the frame layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Data { size: u64 },
    Headers { size: u64 },
    Priority(Priority),
    CancelPush { push_id: u64 },
    Settings(Settings),
    PushPromise { push_id: u64, size: u64 },
    Goaway { stream_id: u64 },
    MaxPushId { push_id: u64 },
    DuplicatePush { push_id: u64 },
}

impl Frame {
    pub(crate) fn kind(&self) -> u64 {
        match self {
            Frame::Data { .. } => TYPE_DATA,
            Frame::Headers { .. } => TYPE_HEADERS,
            Frame::Priority(_) => TYPE_PRIORITY,
            Frame::CancelPush { .. } => TYPE_CANCEL_PUSH,
            Frame::Settings(_) => TYPE_SETTINGS,
            Frame::PushPromise { .. } => TYPE_PUSH_PROMISE,
            Frame::Goaway { .. } => TYPE_GOAWAY,
            Frame::MaxPushId { .. } => TYPE_MAX_PUSH_ID,
            Frame::DuplicatePush { .. } => TYPE_DUPLICATE_PUSH,
        }
    }

    /// Payload length as it will appear in the frame header.
    fn payload_size(&self) -> Result<u64, H3Error> {
        let size = match *self {
            Frame::Data { size } | Frame::Headers { size } => size,
            Frame::Priority(priority) => {
                // Flags byte + weight byte around the two ids.
                2 + varint::encoded_size(priority.prioritized_id)? as u64
                    + varint::encoded_size(priority.dependency_id)? as u64
            }
            Frame::CancelPush { push_id }
            | Frame::MaxPushId { push_id }
            | Frame::DuplicatePush { push_id } => varint::encoded_size(push_id)? as u64,
            Frame::Settings(settings) => settings.payload_size()?,
            Frame::PushPromise { push_id, size } => {
                if size > varint::MAX {
                    return Err(H3Error::VarintOverflow);
                }
                varint::encoded_size(push_id)? as u64 + size
            }
            Frame::Goaway { stream_id } => varint::encoded_size(stream_id)? as u64,
        };
        if size > varint::MAX {
            return Err(H3Error::VarintOverflow);
        }
        Ok(size)
    }

    /// Bytes `encode` will write: the frame header plus numeric payload
    /// fields. Declared byte-runs are not included.
    pub fn encoded_size(&self) -> Result<usize, H3Error> {
        let payload_size = self.payload_size()?;
        let mut size = varint::encoded_size(self.kind())?;
        size += varint::encoded_size(payload_size)?;
        size += match *self {
            Frame::Data { .. } | Frame::Headers { .. } => 0,
            Frame::PushPromise { push_id, .. } => varint::encoded_size(push_id)?,
            _ => payload_size as usize,
        };
        Ok(size)
    }

    /// Appends the frame header and numeric payload fields to `buf`.
    ///
    /// All validation (setting maxima, varint range) happens before the
    /// first byte is written.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), H3Error> {
        let payload_size = self.payload_size()?;
        varint::encode(buf, self.kind())?;
        varint::encode(buf, payload_size)?;
        match *self {
            Frame::Data { .. } | Frame::Headers { .. } => {}
            Frame::Priority(priority) => {
                buf.push(priority.prioritized.bits() << 6 | priority.dependency.bits() << 4);
                varint::encode(buf, priority.prioritized_id)?;
                varint::encode(buf, priority.dependency_id)?;
                buf.push(priority.weight);
            }
            Frame::CancelPush { push_id }
            | Frame::MaxPushId { push_id }
            | Frame::DuplicatePush { push_id }
            | Frame::PushPromise { push_id, .. } => {
                varint::encode(buf, push_id)?;
            }
            Frame::Settings(settings) => settings.encode_payload(buf)?,
            Frame::Goaway { stream_id } => {
                varint::encode(buf, stream_id)?;
            }
        }
        Ok(())
    }
}

// ── Decoding ────────────────────────────────────────────────────────

/// Reads the type of the next frame without consuming anything.
pub fn peek<S: Sequence>(seq: &S) -> Result<u64, H3Error> {
    let mut look = seq.lookahead();
    varint::decode(&mut look)
}

/// Decodes one frame off the front of `seq`, committing only on success.
///
/// Declared byte-runs (DATA/HEADERS payloads, PUSH_PROMISE header blocks)
/// stay on the sequence for the codec that owns them.
pub fn decode<S: Sequence>(seq: &mut S) -> Result<Frame, H3Error> {
    let mut look = seq.lookahead();
    let frame = decode_inner(&mut look)?;
    let advance = look.consumed();
    seq.consume(advance);
    Ok(frame)
}

fn decode_inner(look: &mut Lookahead<'_>) -> Result<Frame, H3Error> {
    let kind = varint::decode(look)?;
    let payload_size = varint::decode(look)?;
    let mut payload = PayloadReader { look, remaining: payload_size };

    let frame = match kind {
        TYPE_DATA => Frame::Data { size: payload.take_rest() },
        TYPE_HEADERS => Frame::Headers { size: payload.take_rest() },
        TYPE_PRIORITY => {
            let flags = payload.byte()?;
            let prioritized_id = payload.varint()?;
            let dependency_id = payload.varint()?;
            let weight = payload.byte()?;
            Frame::Priority(Priority {
                prioritized: PrioritizedElement::from_bits(flags >> 6),
                dependency: ElementDependency::from_bits(flags >> 4),
                prioritized_id,
                dependency_id,
                weight,
            })
        }
        TYPE_CANCEL_PUSH => Frame::CancelPush { push_id: payload.varint()? },
        TYPE_SETTINGS => {
            let mut settings = Settings::default();
            while payload.remaining > 0 {
                let id = payload.varint()?;
                let value = payload.varint()?;
                settings.apply(id, value)?;
            }
            Frame::Settings(settings)
        }
        TYPE_PUSH_PROMISE => {
            let push_id = payload.varint()?;
            Frame::PushPromise { push_id, size: payload.take_rest() }
        }
        TYPE_GOAWAY => Frame::Goaway { stream_id: payload.varint()? },
        TYPE_MAX_PUSH_ID => Frame::MaxPushId { push_id: payload.varint()? },
        TYPE_DUPLICATE_PUSH => Frame::DuplicatePush { push_id: payload.varint()? },
        _ => return Err(H3Error::MalformedFrame),
    };

    payload.finish()?;
    Ok(frame)
}

/// Charges every decoded field against the declared payload length.
struct PayloadReader<'a, 'b> {
    look: &'a mut Lookahead<'b>,
    remaining: u64,
}

impl PayloadReader<'_, '_> {
    fn varint(&mut self) -> Result<u64, H3Error> {
        let before = self.look.len();
        let value = varint::decode(self.look)?;
        let used = (before - self.look.len()) as u64;
        if used > self.remaining {
            return Err(H3Error::MalformedFrame);
        }
        self.remaining -= used;
        Ok(value)
    }

    fn byte(&mut self) -> Result<u8, H3Error> {
        if self.look.is_empty() {
            return Err(H3Error::Incomplete);
        }
        if self.remaining == 0 {
            return Err(H3Error::MalformedFrame);
        }
        let value = self.look.byte(0);
        self.look.consume(1);
        self.remaining -= 1;
        Ok(value)
    }

    /// Hands the rest of the declared payload to the caller as a byte-run
    /// length, leaving those bytes on the sequence.
    fn take_rest(&mut self) -> u64 {
        std::mem::take(&mut self.remaining)
    }

    fn finish(self) -> Result<(), H3Error> {
        // Payload bytes left over after every field is malformed.
        if self.remaining > 0 {
            return Err(H3Error::MalformedFrame);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use quicline_buf::BufferChain;

    fn chain(bytes: &[u8]) -> BufferChain {
        let mut chain = BufferChain::new();
        chain.push(Bytes::copy_from_slice(bytes));
        chain
    }

    fn round_trip(frame: Frame, expected_size: usize) -> Frame {
        assert_eq!(frame.encoded_size().unwrap(), expected_size);
        let mut buf = Vec::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), expected_size);

        let mut chain = chain(&buf);
        let decoded = decode(&mut chain).unwrap();
        assert_eq!(decoded, frame);
        assert!(chain.is_empty());
        decoded
    }

    #[test]
    fn data() {
        round_trip(Frame::Data { size: 64 }, 3);
    }

    #[test]
    fn headers() {
        round_trip(Frame::Headers { size: 16384 }, 5);
    }

    #[test]
    fn priority() {
        round_trip(
            Frame::Priority(Priority {
                prioritized: PrioritizedElement::Current,
                dependency: ElementDependency::Placeholder,
                prioritized_id: 16482,
                dependency_id: 1073781823,
                weight: 43,
            }),
            16,
        );
    }

    #[test]
    fn cancel_push() {
        round_trip(Frame::CancelPush { push_id: 64 }, 4);
    }

    #[test]
    fn settings() {
        round_trip(Frame::Settings(Settings::default()), 17);
    }

    #[test]
    fn push_promise() {
        // The declared header block rides outside the frame header.
        round_trip(Frame::PushPromise { push_id: 16384, size: 1073741824 }, 13);
    }

    #[test]
    fn goaway() {
        round_trip(Frame::Goaway { stream_id: 1073741823 }, 6);
    }

    #[test]
    fn max_push_id() {
        round_trip(Frame::MaxPushId { push_id: 1073741824 }, 10);
    }

    #[test]
    fn duplicate_push() {
        round_trip(Frame::DuplicatePush { push_id: 4611686018427387903 }, 10);
    }

    #[test]
    fn encode_rejects_varint_overflow() {
        let frame = Frame::Data { size: 4611686018427387904 };
        assert_eq!(frame.encoded_size(), Err(H3Error::VarintOverflow));
        let mut buf = Vec::new();
        assert_eq!(frame.encode(&mut buf), Err(H3Error::VarintOverflow));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_setting_overflow_before_writing() {
        let settings = Settings {
            qpack_max_table_capacity: 1 << 30,
            ..Settings::default()
        };
        let mut buf = Vec::new();
        assert_eq!(
            Frame::Settings(settings).encode(&mut buf),
            Err(H3Error::SettingOverflow)
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn truncated_is_incomplete_and_consumes_nothing() {
        let mut buf = Vec::new();
        Frame::DuplicatePush { push_id: 50 }.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 3);

        for prefix in 0..buf.len() {
            let mut chain = chain(&buf[..prefix]);
            assert_eq!(decode(&mut chain), Err(H3Error::Incomplete));
            assert_eq!(chain.len(), prefix);
        }

        let mut chain = chain(&buf);
        assert_eq!(decode(&mut chain).unwrap(), Frame::DuplicatePush { push_id: 50 });
    }

    #[test]
    fn mangled_length_is_malformed() {
        let mut buf = Vec::new();
        Frame::CancelPush { push_id: 16384 }.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 6);
        // Declare more payload than the single varint field occupies.
        buf[1] = 16;
        buf.resize(20, 0);

        let mut chain = chain(&buf);
        assert_eq!(decode(&mut chain), Err(H3Error::MalformedFrame));
    }

    #[test]
    fn field_crossing_declared_payload_is_malformed() {
        // CANCEL_PUSH declaring a 1-byte payload that holds a 2-byte varint.
        let mut chain = chain(&[0x03, 0x01, 0x40, 0x40]);
        assert_eq!(decode(&mut chain), Err(H3Error::MalformedFrame));
    }

    #[test]
    fn settings_length_mismatch_is_malformed() {
        // One (id, value) pair but a declared length of three bytes.
        let mut chain = chain(&[0x04, 0x03, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(decode(&mut chain), Err(H3Error::MalformedFrame));
    }

    #[test]
    fn settings_unknown_ids_are_discarded() {
        // id 0x21 value 99, then qpack_blocked_streams 7.
        let payload = [0x21, 0x40, 0x63, 0x07, 0x07];
        let mut buf = vec![0x04, payload.len() as u8];
        buf.extend_from_slice(&payload);

        let mut chain = chain(&buf);
        let decoded = decode(&mut chain).unwrap();
        let expected = Settings { qpack_blocked_streams: 7, ..Settings::default() };
        assert_eq!(decoded, Frame::Settings(expected));
    }

    #[test]
    fn settings_value_past_maximum_is_malformed() {
        // qpack_blocked_streams = 2^16, one past its maximum.
        let mut buf = vec![0x04, 0x05, 0x07];
        varint::encode(&mut buf, 1 << 16).unwrap();
        let mut chain = chain(&buf);
        assert_eq!(decode(&mut chain), Err(H3Error::MalformedFrame));
    }

    #[test]
    fn unknown_frame_type_is_malformed() {
        let mut chain = chain(&[0x21, 0x00]);
        assert_eq!(decode(&mut chain), Err(H3Error::MalformedFrame));
    }

    #[test]
    fn priority_flag_byte_layout() {
        let frame = Frame::Priority(Priority {
            prioritized: PrioritizedElement::Push,
            dependency: ElementDependency::Root,
            prioritized_id: 1,
            dependency_id: 2,
            weight: 0,
        });
        let mut buf = Vec::new();
        frame.encode(&mut buf).unwrap();
        // Type, length, then 01 (push) in the top bits and 11 (root) below.
        assert_eq!(buf[2], 0b0111_0000);
    }

    #[test]
    fn peek_reports_type_without_consuming() {
        let mut buf = Vec::new();
        Frame::Goaway { stream_id: 7 }.encode(&mut buf).unwrap();
        let chain = chain(&buf);
        assert_eq!(peek(&chain).unwrap(), TYPE_GOAWAY);
        assert_eq!(chain.len(), buf.len());
    }

    #[test]
    fn decode_across_fragments() {
        let mut buf = Vec::new();
        Frame::Goaway { stream_id: 1073741823 }.encode(&mut buf).unwrap();

        let mut chain = BufferChain::new();
        for byte in buf {
            chain.push(Bytes::copy_from_slice(&[byte]));
        }
        assert_eq!(decode(&mut chain).unwrap(), Frame::Goaway { stream_id: 1073741823 });
        assert!(chain.is_empty());
    }
}
