//! Control stream sender and receiver.
//!
//! Each side of a connection opens one unidirectional control stream and
//! keeps it for the connection's lifetime. The preamble is fixed: the
//! stream type varint, then exactly one SETTINGS frame. After that the
//! peer's control stream carries connection-scoped frames which are
//! dispatched as events; ours carries nothing further.

use bytes::Bytes;
use quicline_buf::{BufferChain, Sequence};

use crate::error::H3Error;
use crate::event::H3Event;
use crate::frame::{self, Frame};
use crate::quic::StreamData;
use crate::settings::Settings;
use crate::varint;

/// Stream type identifier opening every control stream.
pub(crate) const STREAM_TYPE: u64 = 0x0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SenderState {
    #[default]
    Type,
    Settings,
    Idle,
}

/// Emits our control-stream preamble, then idles forever.
#[derive(Debug)]
pub struct Sender {
    state: SenderState,
    settings: Settings,
    id: u64,
}

impl Sender {
    pub fn new(id: u64, settings: Settings) -> Self {
        Sender { state: SenderState::Type, settings, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Produces the next preamble buffer. Control streams never carry fin.
    pub fn send(&mut self) -> Result<StreamData, H3Error> {
        match self.state {
            SenderState::Type => {
                let mut buf = Vec::with_capacity(varint::encoded_size(STREAM_TYPE)?);
                varint::encode(&mut buf, STREAM_TYPE)?;

                self.state = SenderState::Settings;

                Ok(StreamData::new(self.id, false, Bytes::from(buf)))
            }

            SenderState::Settings => {
                let frame = Frame::Settings(self.settings);
                let mut buf = Vec::with_capacity(frame.encoded_size()?);
                frame.encode(&mut buf)?;

                self.state = SenderState::Idle;

                Ok(StreamData::new(self.id, false, Bytes::from(buf)))
            }

            SenderState::Idle => Err(H3Error::Idle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ReceiverState {
    #[default]
    Type,
    Settings,
    Active,
}

/// Consumes the peer's control stream and dispatches its frames.
#[derive(Debug, Default)]
pub struct Receiver {
    state: ReceiverState,
    chain: BufferChain,
    id: u64,
}

impl Receiver {
    pub fn new(id: u64) -> Self {
        Receiver { id, ..Receiver::default() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Buffers `data` and dispatches every item that completes.
    ///
    /// The handler sees `Settings` once, then `GoAway` as they arrive.
    /// A fin is fatal: the control stream must outlive the connection.
    pub fn recv<H>(&mut self, data: StreamData, handler: &mut H) -> Result<(), H3Error>
    where
        H: FnMut(H3Event) -> Result<(), H3Error>,
    {
        if data.fin {
            return Err(H3Error::StreamClosed);
        }
        self.chain.push(data.data);

        loop {
            match self.process() {
                Ok(Some(event)) => handler(event)?,
                Ok(None) => {}
                Err(H3Error::Incomplete) => return Ok(()),
                Err(error) => return Err(error),
            }
        }
    }

    fn process(&mut self) -> Result<Option<H3Event>, H3Error> {
        match self.state {
            ReceiverState::Type => {
                let stream_type = varint::decode(&mut self.chain)?;
                if stream_type != STREAM_TYPE {
                    return Err(H3Error::MalformedFrame);
                }

                self.state = ReceiverState::Settings;

                Ok(None)
            }

            ReceiverState::Settings => {
                // The first frame on a control stream must be SETTINGS.
                if frame::peek(&self.chain)? != frame::TYPE_SETTINGS {
                    return Err(H3Error::MalformedFrame);
                }
                let Frame::Settings(settings) = frame::decode(&mut self.chain)? else {
                    return Err(H3Error::Internal);
                };

                self.state = ReceiverState::Active;

                Ok(Some(H3Event::Settings(settings)))
            }

            ReceiverState::Active => match frame::decode(&mut self.chain)? {
                Frame::Goaway { stream_id } => Ok(Some(H3Event::GoAway { stream_id })),
                // Priority scheduling is not modeled, and this client never
                // arms server push.
                Frame::Priority(_) | Frame::CancelPush { .. } => Ok(None),
                // Request-stream frames, or the preamble again.
                _ => Err(H3Error::MalformedFrame),
            },
        }
    }
}
