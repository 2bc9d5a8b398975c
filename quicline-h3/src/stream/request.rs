//! Request stream sender and receiver.
//!
//! One bidirectional stream carries one HTTP exchange. The sender frames
//! the request out of a header encoder and a body encoder; the receiver
//! buffers response bytes and walks them through the header decoder, the
//! body decoder, and the leftover frame types, in that order, surfacing
//! one event per completed item.

use bytes::Bytes;
use quicline_buf::{BufferChain, Sequence};

use crate::body;
use crate::error::H3Error;
use crate::event::H3Event;
use crate::frame::{self, Frame};
use crate::headers;
use crate::qpack::HeaderField;
use crate::quic::StreamData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SenderState {
    #[default]
    Headers,
    Body,
    Fin,
}

/// Drives the outgoing half of one request stream.
///
/// Headers queue until `start` seals them; body chunks queue until `fin`.
/// `send` then drains the header encoder followed by the body encoder,
/// marking fin on the buffer that completes the request.
#[derive(Debug)]
pub struct Sender {
    state: SenderState,
    headers: headers::Encoder,
    body: body::Encoder,
    id: u64,
}

impl Sender {
    pub fn new(id: u64) -> Self {
        Sender {
            state: SenderState::default(),
            headers: headers::Encoder::new(),
            body: body::Encoder::new(),
            id,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn finished(&self) -> bool {
        self.state == SenderState::Fin
    }

    /// Queues one request header. Only before `start`.
    pub fn header(&mut self, header: &HeaderField) -> Result<(), H3Error> {
        self.headers.add(header)
    }

    /// Queues one body chunk. Only before `fin`.
    pub fn body(&mut self, chunk: Bytes) -> Result<(), H3Error> {
        self.body.add(chunk)
    }

    /// Seals the header section so `send` can emit it.
    pub fn start(&mut self) -> Result<(), H3Error> {
        self.headers.fin()
    }

    /// Ends the request. Seals the header section too if still open.
    pub fn fin(&mut self) -> Result<(), H3Error> {
        if !self.headers.sealed() {
            self.headers.fin()?;
        }
        self.body.fin()
    }

    /// Produces the next outgoing buffer.
    ///
    /// `Idle` means nothing can go out right now: either `start` has not
    /// been called, or every queued chunk has been sent and the request
    /// is still open.
    pub fn send(&mut self) -> Result<StreamData, H3Error> {
        match self.state {
            SenderState::Headers => {
                let buf = self.headers.encode()?;
                if self.headers.finished() {
                    self.state = if self.body.finished() {
                        SenderState::Fin
                    } else {
                        SenderState::Body
                    };
                }
                Ok(StreamData::new(self.id, self.finished(), buf))
            }

            SenderState::Body => {
                // fin can arrive after the last chunk already went out; the
                // close then rides an empty buffer.
                if self.body.finished() {
                    self.state = SenderState::Fin;
                    return Ok(StreamData::new(self.id, true, Bytes::new()));
                }

                let buf = self.body.encode()?;
                if self.body.finished() {
                    self.state = SenderState::Fin;
                }
                Ok(StreamData::new(self.id, self.finished(), buf))
            }

            SenderState::Fin => Err(H3Error::Idle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ReceiverState {
    #[default]
    Closed,
    Headers,
    Body,
    Fin,
}

/// Drives the incoming half of one request stream.
///
/// Arriving bytes accumulate in a chain and are decoded to exhaustion on
/// every `recv`, dispatching one event per decoded item. The receiver
/// starts `closed` and is armed by the connection once the paired sender
/// has put the request on the wire.
#[derive(Debug)]
pub struct Receiver {
    state: ReceiverState,
    chain: BufferChain,
    headers: headers::Decoder,
    body: body::Decoder,
    fin_received: bool,
    fin_delivered: bool,
    id: u64,
}

impl Receiver {
    pub fn new(id: u64) -> Self {
        Receiver {
            state: ReceiverState::default(),
            chain: BufferChain::new(),
            headers: headers::Decoder::new(),
            body: body::Decoder::new(),
            fin_received: false,
            fin_delivered: false,
            id,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn closed(&self) -> bool {
        self.state == ReceiverState::Closed
    }

    pub fn finished(&self) -> bool {
        self.state == ReceiverState::Fin
    }

    /// Arms the receiver. Valid exactly once, before any data arrives.
    pub fn start(&mut self) -> Result<(), H3Error> {
        if self.state != ReceiverState::Closed {
            return Err(H3Error::Internal);
        }
        self.state = ReceiverState::Headers;
        Ok(())
    }

    /// Buffers `data` and dispatches every item that completes.
    ///
    /// A partial item is left buffered for the next call, unless the
    /// stream already ended, which makes it a truncated frame.
    pub fn recv<H>(&mut self, data: StreamData, handler: &mut H) -> Result<(), H3Error>
    where
        H: FnMut(H3Event) -> Result<(), H3Error>,
    {
        if self.state == ReceiverState::Closed || self.state == ReceiverState::Fin {
            return Err(H3Error::StreamClosed);
        }

        if data.fin {
            self.fin_received = true;
        }
        self.chain.push(data.data);

        loop {
            match self.process() {
                Ok(Some(event)) => handler(event)?,
                Ok(None) => {}
                Err(H3Error::Incomplete) if self.fin_received => {
                    // A partial frame with no more bytes ever coming.
                    return Err(H3Error::MalformedFrame);
                }
                Err(H3Error::Incomplete) => return Ok(()),
                Err(error) => return Err(error),
            }
            if self.state == ReceiverState::Fin {
                return Ok(());
            }
        }
    }

    /// Decodes at most one item off the chain.
    fn process(&mut self) -> Result<Option<H3Event>, H3Error> {
        if self.chain.is_empty() {
            if !self.fin_received {
                return Err(H3Error::Incomplete);
            }

            // End of stream: every started frame must have completed.
            if self.headers.started() && !self.headers.finished() {
                return Err(H3Error::MalformedFrame);
            }
            if self.body.in_progress() {
                return Err(H3Error::MalformedFrame);
            }

            self.state = ReceiverState::Fin;

            if self.fin_delivered {
                return Ok(None);
            }
            self.fin_delivered = true;
            return Ok(Some(H3Event::Data {
                stream_id: self.id,
                chunk: Bytes::new(),
                fin: true,
            }));
        }

        match self.state {
            ReceiverState::Headers => match self.headers.decode(&mut self.chain) {
                Ok(header) => {
                    if self.headers.finished() {
                        self.state = ReceiverState::Body;
                    }
                    let fin = self.at_end();
                    if fin {
                        self.fin_delivered = true;
                    }
                    Ok(Some(H3Event::Header { stream_id: self.id, header, fin }))
                }
                Err(H3Error::Delegate) => self.process_body_or_frame(),
                Err(error) => Err(error),
            },

            ReceiverState::Body => self.process_body_or_frame(),

            ReceiverState::Closed | ReceiverState::Fin => Err(H3Error::Internal),
        }
    }

    fn process_body_or_frame(&mut self) -> Result<Option<H3Event>, H3Error> {
        match self.body.decode(&mut self.chain) {
            Ok(chunk) => {
                let fin = self.at_end();
                if fin {
                    self.fin_delivered = true;
                }
                Ok(Some(H3Event::Data { stream_id: self.id, chunk, fin }))
            }
            Err(H3Error::Delegate) => match frame::decode(&mut self.chain)? {
                // Priority scheduling is not modeled.
                Frame::Priority(_) => Ok(None),
                // Push was never armed; everything else belongs on the
                // control stream.
                _ => Err(H3Error::MalformedFrame),
            },
            Err(error) => Err(error),
        }
    }

    /// True when the item just decoded was the last of the stream.
    fn at_end(&self) -> bool {
        self.fin_received
            && self.chain.is_empty()
            && self.headers.finished()
            && !self.body.in_progress()
    }
}
