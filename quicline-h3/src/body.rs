//! DATA frame streaming.
//!
//! Body bytes ride in DATA frames but never pass through frame buffers:
//! the encoder emits a frame header sized to the next queued chunk and then
//! hands the chunk through untouched, and the decoder counts declared
//! payload bytes off the wire and returns them in whatever fragmentation
//! they arrived.

use std::collections::VecDeque;

use bytes::Bytes;
use quicline_buf::Sequence;

use crate::error::H3Error;
use crate::frame::{self, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EncoderState {
    #[default]
    Frame,
    Data,
    Fin,
}

/// Turns queued body chunks into a DATA frame sequence.
///
/// Each queued chunk becomes one frame: a call in between chunks emits the
/// frame header for the head of the queue, the next call emits the chunk
/// itself. Once `fin` is requested the encoder finishes when the queue
/// drains.
#[derive(Debug, Default)]
pub struct Encoder {
    state: EncoderState,
    chunks: VecDeque<Bytes>,
    fin: bool,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder::default()
    }

    /// Queues one body chunk. Rejected after `fin`.
    pub fn add(&mut self, chunk: Bytes) -> Result<(), H3Error> {
        if self.fin {
            return Err(H3Error::Internal);
        }
        self.chunks.push_back(chunk);
        Ok(())
    }

    /// Marks the body complete.
    pub fn fin(&mut self) -> Result<(), H3Error> {
        if self.state == EncoderState::Fin {
            return Err(H3Error::Internal);
        }
        self.fin = true;
        if self.chunks.is_empty() {
            self.state = EncoderState::Fin;
        }
        Ok(())
    }

    pub fn finished(&self) -> bool {
        self.state == EncoderState::Fin
    }

    /// Produces the next buffer to put on the wire.
    ///
    /// `Idle` means nothing is queued right now; retry after `add` or
    /// `fin`.
    pub fn encode(&mut self) -> Result<Bytes, H3Error> {
        match self.state {
            EncoderState::Frame => {
                let Some(chunk) = self.chunks.front() else {
                    return Err(H3Error::Idle);
                };
                let frame = Frame::Data { size: chunk.len() as u64 };
                let mut buf = Vec::with_capacity(frame.encoded_size()?);
                frame.encode(&mut buf)?;

                self.state = EncoderState::Data;

                Ok(Bytes::from(buf))
            }

            EncoderState::Data => {
                let chunk = self.chunks.pop_front().ok_or(H3Error::Internal)?;

                self.state = if self.fin && self.chunks.is_empty() {
                    EncoderState::Fin
                } else {
                    EncoderState::Frame
                };

                Ok(chunk)
            }

            EncoderState::Fin => Err(H3Error::Internal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DecoderState {
    #[default]
    Frame,
    Data,
}

/// Streams DATA frame payloads back out of the wire byte sequence.
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
    remaining: u64,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder::default()
    }

    /// True while a declared payload is only partly delivered. A stream
    /// must not end here.
    pub fn in_progress(&self) -> bool {
        self.state == DecoderState::Data
    }

    /// Returns the next payload chunk.
    ///
    /// A non-DATA frame at the front is `Delegate` with nothing consumed.
    /// One call may consume the frame header and return the first chunk
    /// behind it.
    pub fn decode<S: Sequence>(&mut self, seq: &mut S) -> Result<Bytes, H3Error> {
        if self.state == DecoderState::Frame {
            if frame::peek(seq)? != frame::TYPE_DATA {
                return Err(H3Error::Delegate);
            }

            let Frame::Data { size } = frame::decode(seq)? else {
                return Err(H3Error::Internal);
            };

            self.state = DecoderState::Data;
            self.remaining = size;
        }

        if seq.is_empty() {
            return Err(H3Error::Incomplete);
        }

        let take = (seq.len() as u64).min(self.remaining) as usize;
        let chunk = seq.slice(take);
        self.remaining -= take as u64;

        debug_assert!(seq.is_empty() || self.remaining == 0);

        if self.remaining == 0 {
            self.state = DecoderState::Frame;
        }

        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quicline_buf::BufferChain;

    #[test]
    fn encoder_emits_frame_header_then_chunk() {
        let mut encoder = Encoder::new();
        encoder.add(Bytes::from_static(b"hello")).unwrap();
        encoder.fin().unwrap();

        assert_eq!(&encoder.encode().unwrap()[..], &[0x00, 0x05]);
        assert!(!encoder.finished());
        assert_eq!(&encoder.encode().unwrap()[..], b"hello");
        assert!(encoder.finished());
        assert_eq!(encoder.encode(), Err(H3Error::Internal));
    }

    #[test]
    fn encoder_frames_each_chunk_separately() {
        let mut encoder = Encoder::new();
        encoder.add(Bytes::from_static(b"abc")).unwrap();
        encoder.add(Bytes::from_static(b"defg")).unwrap();

        assert_eq!(&encoder.encode().unwrap()[..], &[0x00, 0x03]);
        assert_eq!(&encoder.encode().unwrap()[..], b"abc");
        assert_eq!(&encoder.encode().unwrap()[..], &[0x00, 0x04]);
        assert_eq!(&encoder.encode().unwrap()[..], b"defg");

        // No fin yet, so the encoder waits for more chunks.
        assert!(!encoder.finished());
        assert_eq!(encoder.encode(), Err(H3Error::Idle));

        encoder.fin().unwrap();
        assert!(encoder.finished());
    }

    #[test]
    fn encoder_without_input_is_idle() {
        assert_eq!(Encoder::new().encode(), Err(H3Error::Idle));
    }

    #[test]
    fn add_after_fin_is_internal() {
        let mut encoder = Encoder::new();
        encoder.add(Bytes::from_static(b"a")).unwrap();
        encoder.fin().unwrap();
        assert_eq!(encoder.add(Bytes::from_static(b"b")), Err(H3Error::Internal));
    }

    #[test]
    fn fin_after_finished_is_internal() {
        let mut encoder = Encoder::new();
        encoder.fin().unwrap();
        assert!(encoder.finished());
        assert_eq!(encoder.fin(), Err(H3Error::Internal));
    }

    #[test]
    fn decoder_delegates_other_frames() {
        let mut buf = Vec::new();
        Frame::Headers { size: 4 }.encode(&mut buf).unwrap();
        let mut chain = BufferChain::new();
        chain.push(Bytes::from(buf));

        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Delegate));
        assert_eq!(chain.len(), 2);
        assert!(!decoder.in_progress());
    }

    #[test]
    fn decoder_reassembles_fragmented_payload() {
        let mut chain = BufferChain::new();
        chain.push(Bytes::from_static(&[0x00, 0x0a]));
        chain.push(Bytes::from_static(b"abc"));

        let mut decoder = Decoder::new();

        // The same call eats the frame header and returns the first chunk.
        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"abc");
        assert!(decoder.in_progress());

        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Incomplete));

        chain.push(Bytes::from_static(b"defg"));
        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"defg");
        assert!(decoder.in_progress());

        chain.push(Bytes::from_static(b"hij"));
        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"hij");
        assert!(!decoder.in_progress());
        assert!(chain.is_empty());
    }

    #[test]
    fn decoder_stops_at_the_frame_boundary() {
        let mut chain = BufferChain::new();
        chain.push(Bytes::from_static(&[0x00, 0x03]));
        chain.push(Bytes::from_static(b"abc"));
        chain.push(Bytes::from_static(&[0x00, 0x02]));
        chain.push(Bytes::from_static(b"de"));

        let mut decoder = Decoder::new();
        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"abc");
        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"de");
        assert!(chain.is_empty());
    }

    #[test]
    fn decoder_empty_input_is_incomplete() {
        let mut chain = BufferChain::new();
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Incomplete));
    }

    #[test]
    fn zero_size_frame_waits_for_the_next_byte() {
        // The frame header commits, but the empty chunk only comes out once
        // any further input arrives.
        let mut chain = BufferChain::new();
        chain.push(Bytes::from_static(&[0x00, 0x00]));

        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Incomplete));
        assert!(decoder.in_progress());

        chain.push(Bytes::from_static(&[0x00, 0x01, b'x']));
        let empty = decoder.decode(&mut chain).unwrap();
        assert!(empty.is_empty());
        assert!(!decoder.in_progress());
        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"x");
    }

    #[test]
    fn zero_size_frame_yields_an_empty_chunk() {
        let mut chain = BufferChain::new();
        chain.push(Bytes::from_static(&[0x00, 0x00, 0x00, 0x03]));
        chain.push(Bytes::from_static(b"abc"));

        let mut decoder = Decoder::new();
        let empty = decoder.decode(&mut chain).unwrap();
        assert!(empty.is_empty());
        assert!(!decoder.in_progress());

        assert_eq!(&decoder.decode(&mut chain).unwrap()[..], b"abc");
    }
}
