//! HEADERS frame streaming through QPACK.
//!
//! The header section compresses as headers are added, so by the time the
//! frame header is wanted the block size is exact. On the way out the
//! declared frame length bounds the block: decoding past it is a wire
//! violation, landing exactly on it finishes the section.

use std::collections::VecDeque;

use bytes::Bytes;
use quicline_buf::Sequence;

use crate::error::H3Error;
use crate::frame::{self, Frame};
use crate::qpack::{self, HeaderField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EncoderState {
    #[default]
    Idle,
    Frame,
    Qpack,
    Fin,
}

/// Compresses a header section and frames it.
///
/// Headers are added one at a time, then `fin` seals the section and
/// `encode` emits the HEADERS frame header followed by one compressed
/// block per call.
#[derive(Debug, Default)]
pub struct Encoder {
    state: EncoderState,
    qpack: qpack::Encoder,
    blocks: VecDeque<Bytes>,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder::default()
    }

    /// Compresses one header into the pending section. Only before `fin`.
    pub fn add(&mut self, header: &HeaderField) -> Result<(), H3Error> {
        if self.state != EncoderState::Idle {
            return Err(H3Error::Internal);
        }
        let block = self.qpack.encode(header);
        self.blocks.push_back(block);
        Ok(())
    }

    /// Seals the header section; `encode` can now produce output.
    pub fn fin(&mut self) -> Result<(), H3Error> {
        if self.state != EncoderState::Idle {
            return Err(H3Error::Internal);
        }
        self.state = EncoderState::Frame;
        Ok(())
    }

    /// True once `fin` sealed the section.
    pub fn sealed(&self) -> bool {
        self.state != EncoderState::Idle
    }

    pub fn finished(&self) -> bool {
        self.state == EncoderState::Fin
    }

    /// Produces the next buffer to put on the wire.
    pub fn encode(&mut self) -> Result<Bytes, H3Error> {
        match self.state {
            EncoderState::Idle => Err(H3Error::Idle),

            EncoderState::Frame => {
                let frame = Frame::Headers { size: self.qpack.count() };
                let mut buf = Vec::with_capacity(frame.encoded_size()?);
                frame.encode(&mut buf)?;

                self.state = EncoderState::Qpack;

                Ok(Bytes::from(buf))
            }

            EncoderState::Qpack => {
                let block = self.blocks.pop_front().ok_or(H3Error::Internal)?;
                if self.blocks.is_empty() {
                    self.state = EncoderState::Fin;
                }
                Ok(block)
            }

            EncoderState::Fin => Err(H3Error::Internal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DecoderState {
    #[default]
    Frame,
    Qpack,
    Fin,
}

/// Decompresses a framed header section, one header per call.
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
    qpack: qpack::Decoder,
    block_size: u64,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder::default()
    }

    /// True once the HEADERS frame header has been consumed.
    pub fn started(&self) -> bool {
        self.state != DecoderState::Frame
    }

    pub fn finished(&self) -> bool {
        self.state == DecoderState::Fin
    }

    /// Returns the next header of the section.
    ///
    /// A non-HEADERS frame at the front is `Delegate` with nothing
    /// consumed. One call may consume the frame header and return the
    /// first header behind it.
    pub fn decode<S: Sequence>(&mut self, seq: &mut S) -> Result<HeaderField, H3Error> {
        match self.state {
            DecoderState::Frame => {
                if frame::peek(seq)? != frame::TYPE_HEADERS {
                    return Err(H3Error::Delegate);
                }

                let Frame::Headers { size } = frame::decode(seq)? else {
                    return Err(H3Error::Internal);
                };

                self.state = DecoderState::Qpack;
                self.block_size = size;

                // An empty header section cannot satisfy a request.
                if size == 0 {
                    return Err(H3Error::MalformedFrame);
                }
            }

            DecoderState::Qpack => {}

            DecoderState::Fin => return Err(H3Error::Internal),
        }

        let header = self.qpack.decode(seq)?;

        if self.qpack.count() > self.block_size {
            return Err(H3Error::MalformedFrame);
        }
        if self.qpack.count() == self.block_size {
            self.state = DecoderState::Fin;
        }

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quicline_buf::BufferChain;

    fn request_headers() -> Vec<HeaderField> {
        vec![
            HeaderField::new(b":method", b"GET"),
            HeaderField::new(b":scheme", b"https"),
            HeaderField::new(b":authority", b"example.com"),
            HeaderField::new(b":path", b"/index.html"),
        ]
    }

    #[test]
    fn encoder_declares_the_compressed_size() {
        let mut encoder = Encoder::new();
        encoder.add(&HeaderField::new(b":method", b"GET")).unwrap();
        encoder.add(&HeaderField::new(b":scheme", b"https")).unwrap();
        encoder.fin().unwrap();

        // Prefix and two indexed field lines compress to four bytes.
        assert_eq!(&encoder.encode().unwrap()[..], &[0x01, 0x04]);
        assert_eq!(&encoder.encode().unwrap()[..], &[0x00, 0x00, 0xd1]);
        assert!(!encoder.finished());
        assert_eq!(&encoder.encode().unwrap()[..], &[0xd7]);
        assert!(encoder.finished());
        assert_eq!(encoder.encode(), Err(H3Error::Internal));
    }

    #[test]
    fn encode_before_fin_is_idle() {
        let mut encoder = Encoder::new();
        encoder.add(&HeaderField::new(b":method", b"GET")).unwrap();
        assert_eq!(encoder.encode(), Err(H3Error::Idle));
    }

    #[test]
    fn add_after_fin_is_internal() {
        let mut encoder = Encoder::new();
        encoder.add(&HeaderField::new(b":method", b"GET")).unwrap();
        encoder.fin().unwrap();
        assert_eq!(
            encoder.add(&HeaderField::new(b":scheme", b"https")),
            Err(H3Error::Internal)
        );
        assert_eq!(encoder.fin(), Err(H3Error::Internal));
    }

    #[test]
    fn round_trip() {
        let headers = request_headers();

        let mut encoder = Encoder::new();
        for header in &headers {
            encoder.add(header).unwrap();
        }
        encoder.fin().unwrap();

        let mut chain = BufferChain::new();
        while !encoder.finished() {
            chain.push(encoder.encode().unwrap());
        }

        let mut decoder = Decoder::new();
        assert!(!decoder.started());
        for header in &headers {
            assert_eq!(decoder.decode(&mut chain).unwrap(), *header);
            assert!(decoder.started());
        }
        assert!(decoder.finished());
        assert!(chain.is_empty());
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Internal));
    }

    #[test]
    fn decoder_delegates_other_frames() {
        let mut buf = Vec::new();
        Frame::Data { size: 3 }.encode(&mut buf).unwrap();
        let mut chain = BufferChain::new();
        chain.push(Bytes::from(buf));

        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Delegate));
        assert_eq!(chain.len(), 2);
        assert!(!decoder.started());
    }

    #[test]
    fn zero_size_section_is_malformed() {
        let mut chain = BufferChain::new();
        chain.push(Bytes::from_static(&[0x01, 0x00]));

        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::MalformedFrame));
        assert!(decoder.started());
    }

    #[test]
    fn section_past_declared_size_is_malformed() {
        // Three compressed bytes behind a two-byte declaration.
        let mut chain = BufferChain::new();
        chain.push(Bytes::from_static(&[0x01, 0x02, 0x00, 0x00, 0xd1]));

        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::MalformedFrame));
    }

    #[test]
    fn fragmented_section_resumes_cleanly() {
        let mut encoder = Encoder::new();
        encoder.add(&HeaderField::new(b":method", b"GET")).unwrap();
        encoder.add(&HeaderField::new(b":scheme", b"https")).unwrap();
        encoder.fin().unwrap();

        let frame_header = encoder.encode().unwrap();
        let first = encoder.encode().unwrap();
        let second = encoder.encode().unwrap();

        let mut chain = BufferChain::new();
        chain.push(frame_header);
        // Only the section prefix arrives at first.
        chain.push(first.slice(..2));

        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&mut chain), Err(H3Error::Incomplete));
        assert!(decoder.started());

        chain.push(first.slice(2..));
        assert_eq!(
            decoder.decode(&mut chain).unwrap(),
            HeaderField::new(b":method", b"GET")
        );
        assert!(!decoder.finished());

        chain.push(second);
        assert_eq!(
            decoder.decode(&mut chain).unwrap(),
            HeaderField::new(b":scheme", b"https")
        );
        assert!(decoder.finished());
    }
}
