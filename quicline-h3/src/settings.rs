//! HTTP/3 SETTINGS parameters and their payload codec.

use crate::error::H3Error;
use crate::varint;

/// Connection-level HTTP/3 settings.
///
/// Doubles as the connection's configuration record: the values handed to
/// `Connection::new` are the ones announced on the local control stream,
/// and the peer's announcement is decoded into the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x06). Default unlimited.
    pub max_header_list_size: u64,
    /// SETTINGS_NUM_PLACEHOLDERS (0x09). Default 0.
    pub num_placeholders: u64,
    /// SETTINGS_QPACK_MAX_TABLE_CAPACITY (0x01). Default 0 (no dynamic
    /// table).
    pub qpack_max_table_capacity: u64,
    /// SETTINGS_QPACK_BLOCKED_STREAMS (0x07). Default 0.
    pub qpack_blocked_streams: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_header_list_size: varint::MAX,
            num_placeholders: 0,
            qpack_max_table_capacity: 0,
            qpack_blocked_streams: 0,
        }
    }
}

// Identifiers from the HTTP/3 settings registry.
const ID_QPACK_MAX_TABLE_CAPACITY: u64 = 0x01;
const ID_MAX_HEADER_LIST_SIZE: u64 = 0x06;
const ID_QPACK_BLOCKED_STREAMS: u64 = 0x07;
const ID_NUM_PLACEHOLDERS: u64 = 0x09;

// Wire-format maximum of each setting value.
const MAX_HEADER_LIST_SIZE_MAX: u64 = varint::MAX;
const NUM_PLACEHOLDERS_MAX: u64 = varint::MAX;
const QPACK_MAX_TABLE_CAPACITY_MAX: u64 = (1 << 30) - 1;
const QPACK_BLOCKED_STREAMS_MAX: u64 = (1 << 16) - 1;

impl Settings {
    /// (identifier, value, maximum) triples in wire order.
    fn entries(&self) -> [(u64, u64, u64); 4] {
        [
            (ID_MAX_HEADER_LIST_SIZE, self.max_header_list_size, MAX_HEADER_LIST_SIZE_MAX),
            (ID_NUM_PLACEHOLDERS, self.num_placeholders, NUM_PLACEHOLDERS_MAX),
            (
                ID_QPACK_MAX_TABLE_CAPACITY,
                self.qpack_max_table_capacity,
                QPACK_MAX_TABLE_CAPACITY_MAX,
            ),
            (ID_QPACK_BLOCKED_STREAMS, self.qpack_blocked_streams, QPACK_BLOCKED_STREAMS_MAX),
        ]
    }

    /// Byte length of the SETTINGS frame payload, validating every value
    /// against its wire maximum first.
    pub(crate) fn payload_size(&self) -> Result<u64, H3Error> {
        let mut size = 0;
        for (id, value, max) in self.entries() {
            if value > max {
                return Err(H3Error::SettingOverflow);
            }
            size += varint::encoded_size(id)? as u64;
            size += varint::encoded_size(value)? as u64;
        }
        Ok(size)
    }

    /// Writes all four (identifier, value) pairs in wire order.
    pub(crate) fn encode_payload(&self, buf: &mut Vec<u8>) -> Result<(), H3Error> {
        for (id, value, max) in self.entries() {
            if value > max {
                return Err(H3Error::SettingOverflow);
            }
            varint::encode(buf, id)?;
            varint::encode(buf, value)?;
        }
        Ok(())
    }

    /// Applies one decoded (identifier, value) pair. Known identifiers are
    /// range-checked; unknown ones are ignored.
    pub(crate) fn apply(&mut self, id: u64, value: u64) -> Result<(), H3Error> {
        match id {
            ID_MAX_HEADER_LIST_SIZE => {
                self.max_header_list_size = checked(value, MAX_HEADER_LIST_SIZE_MAX)?;
            }
            ID_NUM_PLACEHOLDERS => {
                self.num_placeholders = checked(value, NUM_PLACEHOLDERS_MAX)?;
            }
            ID_QPACK_MAX_TABLE_CAPACITY => {
                self.qpack_max_table_capacity = checked(value, QPACK_MAX_TABLE_CAPACITY_MAX)?;
            }
            ID_QPACK_BLOCKED_STREAMS => {
                self.qpack_blocked_streams = checked(value, QPACK_BLOCKED_STREAMS_MAX)?;
            }
            _ => {}
        }
        Ok(())
    }
}

// A peer announcing a value past the wire maximum sent a malformed frame;
// overflow is reserved for local encode attempts.
fn checked(value: u64, max: u64) -> Result<u64, H3Error> {
    if value > max {
        return Err(H3Error::MalformedFrame);
    }
    Ok(value)
}
