//! HTTP/3 framing layer for a QUIC client.
//!
//! This crate provides a sans-IO, poll-driven HTTP/3 framing layer that
//! sits between an application and a QUIC transport the caller owns. It
//! handles:
//!
//! - HTTP/3 frame encoding/decoding (DATA, HEADERS, SETTINGS, GOAWAY, ...)
//! - QPACK header compression (static table only)
//! - Control stream management (SETTINGS exchange)
//! - Request stream fan-out, mapping stream bytes to typed events
//!
//! # Architecture
//!
//! ```text
//!   QUIC transport (caller-owned)
//!        │
//!        │ StreamData out / StreamData in
//!   ┌────▼────────┐
//!   │ quicline-h3 │  frames + QPACK + stream state machines
//!   │ Connection  │  H3Event: Settings, Header, Data, GoAway
//!   └────┬────────┘
//!        │ H3Event
//!   application handler
//! ```
//!
//! Nothing here blocks or touches a socket. `send` hands back the next
//! buffer to write and reports `Idle` when there is none; `recv` takes
//! whatever bytes the transport produced, in any fragmentation, and
//! dispatches the events they complete.
//!
//! # Example
//!
//! ```rust,ignore
//! use quicline_h3::{Connection, H3Error, H3Event, HeaderField, Settings};
//!
//! let mut h3 = Connection::new(Settings::default());
//!
//! let request = h3.request();
//! h3.header(request, &HeaderField::new(b":method", b"GET"))?;
//! h3.header(request, &HeaderField::new(b":path", b"/"))?;
//! h3.fin(request)?;
//!
//! // Drain outgoing buffers into the transport.
//! loop {
//!     match h3.send() {
//!         Ok(data) => quic.stream_send(data)?,
//!         Err(H3Error::Idle) => break,
//!         Err(error) => return Err(error.into()),
//!     }
//! }
//!
//! // Feed transport bytes back in; decoded events surface synchronously.
//! h3.recv(quic.stream_recv()?, |event| {
//!     match event {
//!         H3Event::Header { header, .. } => println!("{header:?}"),
//!         H3Event::Data { chunk, .. } => body.extend_from_slice(&chunk),
//!         _ => {}
//!     }
//!     Ok(())
//! })?;
//! ```

pub mod body;
pub mod connection;
pub mod error;
pub mod event;
pub mod frame;
pub mod headers;
pub mod qpack;
pub mod quic;
pub mod settings;
pub mod stream;
pub mod varint;

pub use connection::{Connection, RequestId};
pub use error::H3Error;
pub use event::H3Event;
pub use frame::Frame;
pub use qpack::HeaderField;
pub use quic::StreamData;
pub use settings::Settings;
