//! Per-stream drivers.
//!
//! Senders turn queued application data into transport-bound stream bytes;
//! receivers buffer arriving bytes and translate them into typed events.
//! Control streams carry the connection preamble and connection-scoped
//! frames; request streams carry one HTTP exchange each.

pub mod control;
pub mod request;
