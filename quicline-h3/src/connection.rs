//! Client connection fan-out.
//!
//! A [`Connection`] multiplexes one control stream and any number of
//! request streams over a QUIC transport the caller owns. `send` polls the
//! control sender and then every open request sender for the next buffer
//! to write; `recv` routes arriving bytes to the right receiver by stream
//! id and dispatches the decoded events through the caller's handler.
//!
//! Stream ids follow the QUIC client numbering: the local control stream
//! is unidirectional id 2, the peer's is id 3, and request streams take
//! the client-initiated bidirectional ids 0, 4, 8 and so on.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::H3Error;
use crate::event::H3Event;
use crate::qpack::HeaderField;
use crate::quic::StreamData;
use crate::settings::Settings;
use crate::stream::{control, request};

const LOCAL_CONTROL_ID: u64 = 2;
const PEER_CONTROL_ID: u64 = 3;

/// Opaque handle to one request stream on a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// The QUIC stream id the request rides on.
    pub fn stream_id(self) -> u64 {
        self.0
    }
}

/// The client half of one HTTP/3 connection.
#[derive(Debug)]
pub struct Connection {
    control: (control::Sender, control::Receiver),
    requests: HashMap<u64, (request::Sender, request::Receiver)>,
    next_stream_id: u64,
    local_settings: Settings,
    peer_settings: Settings,
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new(Settings::default())
    }
}

impl Connection {
    pub fn new(settings: Settings) -> Self {
        Connection {
            control: (
                control::Sender::new(LOCAL_CONTROL_ID, settings),
                control::Receiver::new(PEER_CONTROL_ID),
            ),
            requests: HashMap::new(),
            next_stream_id: 0,
            local_settings: settings,
            peer_settings: Settings::default(),
        }
    }

    /// The settings this endpoint advertises.
    pub fn local_settings(&self) -> Settings {
        self.local_settings
    }

    /// The settings last received from the peer.
    pub fn peer_settings(&self) -> Settings {
        self.peer_settings
    }

    /// Opens a new request stream and returns its handle.
    pub fn request(&mut self) -> RequestId {
        let id = self.next_stream_id;
        self.next_stream_id += 4;
        self.requests
            .insert(id, (request::Sender::new(id), request::Receiver::new(id)));
        RequestId(id)
    }

    /// Queues a request header. Only before `start`.
    pub fn header(&mut self, id: RequestId, header: &HeaderField) -> Result<(), H3Error> {
        self.sender(id)?.header(header)
    }

    /// Queues a request body chunk. Only before `fin`.
    pub fn body(&mut self, id: RequestId, chunk: Bytes) -> Result<(), H3Error> {
        self.sender(id)?.body(chunk)
    }

    /// Seals the request's header section so `send` can emit it.
    pub fn start(&mut self, id: RequestId) -> Result<(), H3Error> {
        self.sender(id)?.start()
    }

    /// Ends the request.
    pub fn fin(&mut self, id: RequestId) -> Result<(), H3Error> {
        self.sender(id)?.fin()
    }

    /// Produces the next buffer to hand to the transport.
    ///
    /// The control stream drains first, then request streams in map order.
    /// The first buffer a request puts on the wire arms its receiver for
    /// the response. `Idle` means there is nothing to write right now.
    pub fn send(&mut self) -> Result<StreamData, H3Error> {
        match self.control.0.send() {
            Err(H3Error::Idle) => {}
            result => return result,
        }

        for (sender, receiver) in self.requests.values_mut() {
            if sender.finished() {
                continue;
            }
            match sender.send() {
                Ok(data) => {
                    if receiver.closed() {
                        receiver.start()?;
                    }
                    return Ok(data);
                }
                Err(H3Error::Idle) => {}
                Err(error) => return Err(error),
            }
        }

        Err(H3Error::Idle)
    }

    /// Routes one run of transport bytes to its stream.
    ///
    /// Every event the bytes complete is dispatched through `handler`
    /// before this returns. A finished request stream is dropped from the
    /// connection; later bytes for its id are `UnknownStream`.
    pub fn recv<H>(&mut self, data: StreamData, mut handler: H) -> Result<(), H3Error>
    where
        H: FnMut(H3Event) -> Result<(), H3Error>,
    {
        if data.stream_id == PEER_CONTROL_ID {
            let Connection { control, peer_settings, .. } = self;
            return control.1.recv(data, &mut |event| {
                if let H3Event::Settings(settings) = &event {
                    *peer_settings = *settings;
                }
                handler(event)
            });
        }

        let stream_id = data.stream_id;
        let (_, receiver) = self
            .requests
            .get_mut(&stream_id)
            .ok_or(H3Error::UnknownStream)?;

        receiver.recv(data, &mut handler)?;

        if receiver.finished() {
            self.requests.remove(&stream_id);
        }

        Ok(())
    }

    fn sender(&mut self, id: RequestId) -> Result<&mut request::Sender, H3Error> {
        self.requests
            .get_mut(&id.0)
            .map(|(sender, _)| sender)
            .ok_or(H3Error::StreamClosed)
    }
}
