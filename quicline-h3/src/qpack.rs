//! QPACK header compression, static table only (RFC 9204).
//!
//! Request streams here never reference the dynamic table: the encoder
//! emits static indexed and literal field lines with raw (non-Huffman)
//! strings, which is always legal, and the decoder rejects any form that
//! would require dynamic table state. Both sides track the compressed byte
//! count so the header codec can size the HEADERS frame it sits inside and
//! detect a block that runs past its declared length.

use bytes::Bytes;
use quicline_buf::{Lookahead, Sequence};

use crate::error::H3Error;

/// A single header name-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ── QPACK prefix integer codec (RFC 9204 Section 4.1.1) ────────────
//
// Different from QUIC varints! Uses a prefix of N bits. If the value fits
// in N bits (< 2^N - 1), encode directly. Otherwise, encode 2^N - 1 in
// the prefix bits and the remainder in subsequent bytes using 7-bit chunks.

fn encode_prefix_int(buf: &mut Vec<u8>, value: u64, prefix_bits: u8, pattern: u8) {
    let max = (1u64 << prefix_bits) - 1;
    if value < max {
        buf.push(pattern | value as u8);
    } else {
        buf.push(pattern | max as u8);
        let mut remaining = value - max;
        while remaining >= 128 {
            buf.push(0x80 | (remaining & 0x7f) as u8);
            remaining >>= 7;
        }
        buf.push(remaining as u8);
    }
}

fn decode_prefix_int<S: Sequence>(seq: &mut S, prefix_bits: u8) -> Result<u64, H3Error> {
    if seq.is_empty() {
        return Err(H3Error::Incomplete);
    }
    let max = (1u64 << prefix_bits) - 1;
    let value = u64::from(seq.byte(0)) & max;
    if value < max {
        seq.consume(1);
        return Ok(value);
    }

    // Multi-byte encoding.
    let mut value = max;
    let mut shift = 0u32;
    let mut index = 1;
    loop {
        if index >= seq.len() {
            return Err(H3Error::Incomplete);
        }
        let byte = seq.byte(index);
        value += u64::from(byte & 0x7f) << shift;
        shift += 7;
        index += 1;
        if byte & 0x80 == 0 {
            seq.consume(index);
            return Ok(value);
        }
        if shift > 56 {
            return Err(H3Error::MalformedFrame);
        }
    }
}

// ── Static table (RFC 9204 Appendix A) ──────────────────────────────

/// QPACK static table entries: (name, value). 99 entries indexed 0..98.
const STATIC_TABLE: &[(&[u8], &[u8])] = &[
    (b":authority", b""),                                    // 0
    (b":path", b"/"),                                        // 1
    (b"age", b"0"),                                          // 2
    (b"content-disposition", b""),                           // 3
    (b"content-length", b"0"),                               // 4
    (b"cookie", b""),                                        // 5
    (b"date", b""),                                          // 6
    (b"etag", b""),                                          // 7
    (b"if-modified-since", b""),                             // 8
    (b"if-none-match", b""),                                 // 9
    (b"last-modified", b""),                                 // 10
    (b"link", b""),                                          // 11
    (b"location", b""),                                      // 12
    (b"referer", b""),                                       // 13
    (b"set-cookie", b""),                                    // 14
    (b":method", b"CONNECT"),                                // 15
    (b":method", b"DELETE"),                                 // 16
    (b":method", b"GET"),                                    // 17
    (b":method", b"HEAD"),                                   // 18
    (b":method", b"OPTIONS"),                                // 19
    (b":method", b"POST"),                                   // 20
    (b":method", b"PUT"),                                    // 21
    (b":scheme", b"http"),                                   // 22
    (b":scheme", b"https"),                                  // 23
    (b":status", b"103"),                                    // 24
    (b":status", b"200"),                                    // 25
    (b":status", b"304"),                                    // 26
    (b":status", b"404"),                                    // 27
    (b":status", b"503"),                                    // 28
    (b"accept", b"*/*"),                                     // 29
    (b"accept", b"application/dns-message"),                 // 30
    (b"accept-encoding", b"gzip, deflate, br"),              // 31
    (b"accept-ranges", b"bytes"),                            // 32
    (b"access-control-allow-headers", b"cache-control"),     // 33
    (b"access-control-allow-headers", b"content-type"),      // 34
    (b"access-control-allow-origin", b"*"),                  // 35
    (b"cache-control", b"max-age=0"),                        // 36
    (b"cache-control", b"max-age=2592000"),                  // 37
    (b"cache-control", b"max-age=604800"),                   // 38
    (b"cache-control", b"no-cache"),                         // 39
    (b"cache-control", b"no-store"),                         // 40
    (b"cache-control", b"public, max-age=31536000"),         // 41
    (b"content-encoding", b"br"),                            // 42
    (b"content-encoding", b"gzip"),                          // 43
    (b"content-type", b"application/dns-message"),           // 44
    (b"content-type", b"application/javascript"),            // 45
    (b"content-type", b"application/json"),                  // 46
    (b"content-type", b"application/x-www-form-urlencoded"), // 47
    (b"content-type", b"image/gif"),                         // 48
    (b"content-type", b"image/jpeg"),                        // 49
    (b"content-type", b"image/png"),                         // 50
    (b"content-type", b"text/css"),                          // 51
    (b"content-type", b"text/html; charset=utf-8"),          // 52
    (b"content-type", b"text/plain"),                        // 53
    (b"content-type", b"text/plain;charset=utf-8"),          // 54
    (b"range", b"bytes=0-"),                                 // 55
    (b"strict-transport-security", b"max-age=31536000"),     // 56
    (
        b"strict-transport-security",
        b"max-age=31536000; includesubdomains",
    ), // 57
    (
        b"strict-transport-security",
        b"max-age=31536000; includesubdomains; preload",
    ), // 58
    (b"vary", b"accept-encoding"),                           // 59
    (b"vary", b"origin"),                                    // 60
    (b"x-content-type-options", b"nosniff"),                 // 61
    (b"x-xss-protection", b"1; mode=block"),                 // 62
    (b":status", b"100"),                                    // 63
    (b":status", b"204"),                                    // 64
    (b":status", b"206"),                                    // 65
    (b":status", b"302"),                                    // 66
    (b":status", b"400"),                                    // 67
    (b":status", b"403"),                                    // 68
    (b":status", b"421"),                                    // 69
    (b":status", b"425"),                                    // 70
    (b":status", b"500"),                                    // 71
    (b"accept-language", b""),                               // 72
    (b"access-control-allow-credentials", b"FALSE"),         // 73
    (b"access-control-allow-credentials", b"TRUE"),          // 74
    (b"access-control-allow-headers", b"*"),                 // 75
    (b"access-control-allow-methods", b"get"),               // 76
    (b"access-control-allow-methods", b"get, post, options"), // 77
    (b"access-control-allow-methods", b"options"),           // 78
    (b"access-control-expose-headers", b"content-length"),   // 79
    (b"access-control-request-headers", b"content-type"),    // 80
    (b"access-control-request-method", b"get"),              // 81
    (b"access-control-request-method", b"post"),             // 82
    (b"alt-svc", b"clear"),                                  // 83
    (b"authorization", b""),                                 // 84
    (
        b"content-security-policy",
        b"script-src 'none'; object-src 'none'; base-uri 'none'",
    ), // 85
    (b"early-data", b"1"),                                   // 86
    (b"expect-ct", b""),                                     // 87
    (b"forwarded", b""),                                     // 88
    (b"if-range", b""),                                      // 89
    (b"origin", b""),                                        // 90
    (b"purpose", b"prefetch"),                               // 91
    (b"server", b""),                                        // 92
    (b"timing-allow-origin", b"*"),                          // 93
    (b"upgrade-insecure-requests", b"1"),                    // 94
    (b"user-agent", b""),                                    // 95
    (b"x-forwarded-for", b""),                               // 96
    (b"x-frame-options", b"deny"),                           // 97
    (b"x-frame-options", b"sameorigin"),                     // 98
];

/// Find a static table entry matching both name and value.
fn find_static_name_value(name: &[u8], value: &[u8]) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|(n, v)| *n == name && *v == value)
}

/// Find the first static table entry matching just the name.
fn find_static_name(name: &[u8]) -> Option<usize> {
    STATIC_TABLE.iter().position(|(n, _)| *n == name)
}

fn static_entry(index: u64) -> Result<(&'static [u8], &'static [u8]), H3Error> {
    usize::try_from(index)
        .ok()
        .and_then(|index| STATIC_TABLE.get(index))
        .copied()
        .ok_or(H3Error::MalformedFrame)
}

// ── Encoder ─────────────────────────────────────────────────────────

/// Compresses one header field per call into a growing header block.
///
/// The first call prepends the two-byte field section prefix (Required
/// Insert Count 0, Base 0). `count` is the total block size so far in
/// bytes, prefix included; the header codec declares it as the HEADERS
/// frame length.
#[derive(Debug, Default)]
pub struct Encoder {
    prefixed: bool,
    count: u64,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder::default()
    }

    /// Total bytes produced so far, section prefix included.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Encodes one header using the most compact static-table form.
    pub fn encode(&mut self, header: &HeaderField) -> Bytes {
        let mut buf = Vec::new();

        if !self.prefixed {
            // Field section prefix (RFC 9204 Section 4.5.1):
            // Required Insert Count = 0, Sign = 0, Delta Base = 0.
            encode_prefix_int(&mut buf, 0, 8, 0x00);
            encode_prefix_int(&mut buf, 0, 7, 0x00);
            self.prefixed = true;
        }

        if let Some(index) = find_static_name_value(&header.name, &header.value) {
            // Indexed field line (Section 4.5.2): pattern 1 1 T=1, 6-bit index.
            encode_prefix_int(&mut buf, index as u64, 6, 0xc0);
        } else if let Some(name_index) = find_static_name(&header.name) {
            // Literal field line with name reference (Section 4.5.4):
            // pattern 0 1 N=0 T=1, 4-bit name index.
            encode_prefix_int(&mut buf, name_index as u64, 4, 0x50);
            encode_string_literal(&mut buf, &header.value);
        } else {
            // Literal field line with literal name (Section 4.5.6):
            // pattern 0 0 1 N=0 H=0, 3-bit name length.
            encode_prefix_int(&mut buf, header.name.len() as u64, 3, 0x20);
            buf.extend_from_slice(&header.name);
            encode_string_literal(&mut buf, &header.value);
        }

        self.count += buf.len() as u64;
        Bytes::from(buf)
    }
}

/// String literal with the H bit clear: 7-bit length prefix, raw bytes.
fn encode_string_literal(buf: &mut Vec<u8>, data: &[u8]) {
    encode_prefix_int(buf, data.len() as u64, 7, 0x00);
    buf.extend_from_slice(data);
}

// ── Decoder ─────────────────────────────────────────────────────────

/// Decompresses one header field per call out of a header block.
///
/// The section prefix is parsed together with the first field line, so a
/// call either consumes a whole field line or, on `Incomplete`, consumes
/// nothing. `count` is the total bytes consumed, prefix included; the
/// header codec compares it against the declared HEADERS frame length.
#[derive(Debug, Default)]
pub struct Decoder {
    prefixed: bool,
    count: u64,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder::default()
    }

    /// Total bytes consumed so far, section prefix included.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Decodes one header field, committing consumption only on success.
    pub fn decode<S: Sequence>(&mut self, seq: &mut S) -> Result<HeaderField, H3Error> {
        let mut look = seq.lookahead();

        if !self.prefixed {
            decode_prefix(&mut look)?;
        }
        let header = decode_field_line(&mut look)?;

        let advance = look.consumed();
        seq.consume(advance);
        self.prefixed = true;
        self.count += advance as u64;

        Ok(header)
    }
}

fn decode_prefix(look: &mut Lookahead<'_>) -> Result<(), H3Error> {
    // Required Insert Count above zero references the dynamic table.
    let insert_count = decode_prefix_int(look, 8)?;
    if insert_count != 0 {
        return Err(H3Error::MalformedFrame);
    }

    // Base is meaningless without dynamic references; read and discard.
    let _ = decode_prefix_int(look, 7)?;

    Ok(())
}

fn decode_field_line(look: &mut Lookahead<'_>) -> Result<HeaderField, H3Error> {
    if look.is_empty() {
        return Err(H3Error::Incomplete);
    }
    let first = look.byte(0);

    if first & 0x80 != 0 {
        // Indexed field line (Section 4.5.2): pattern 1xxxxxxx.
        // Bit 6 (T) selects static (1) vs dynamic (0) table.
        if first & 0x40 == 0 {
            return Err(H3Error::MalformedFrame);
        }
        let index = decode_prefix_int(look, 6)?;
        let (name, value) = static_entry(index)?;
        Ok(HeaderField::new(name, value))
    } else if first & 0x40 != 0 {
        // Literal with name reference (Section 4.5.4): pattern 01xxxxxx.
        // Bit 5 (N) never-index is ignored; bit 4 (T) must be static.
        if first & 0x10 == 0 {
            return Err(H3Error::MalformedFrame);
        }
        let name_index = decode_prefix_int(look, 4)?;
        let (name, _) = static_entry(name_index)?;
        let value = decode_string_literal(look, 7)?;
        Ok(HeaderField {
            name: name.to_vec(),
            value,
        })
    } else if first & 0x20 != 0 {
        // Literal with literal name (Section 4.5.6): pattern 001xxxxx.
        // Bit 4 (N) never-index is ignored.
        let name = decode_string_literal(look, 3)?;
        let value = decode_string_literal(look, 7)?;
        Ok(HeaderField { name, value })
    } else {
        // Post-base forms (Sections 4.5.3, 4.5.5) require the dynamic table.
        Err(H3Error::MalformedFrame)
    }
}

/// Length-prefixed string with the H bit one position above the length
/// prefix. Huffman input is rejected rather than decoded.
fn decode_string_literal<S: Sequence>(seq: &mut S, prefix_bits: u8) -> Result<Vec<u8>, H3Error> {
    if seq.is_empty() {
        return Err(H3Error::Incomplete);
    }
    if seq.byte(0) & (1 << prefix_bits) != 0 {
        return Err(H3Error::MalformedFrame);
    }

    let length = decode_prefix_int(seq, prefix_bits)?;
    if (seq.len() as u64) < length {
        return Err(H3Error::Incomplete);
    }

    Ok(seq.slice(length as usize).to_vec())
}
