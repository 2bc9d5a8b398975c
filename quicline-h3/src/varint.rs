//! QUIC variable-length integers (RFC 9000 Section 16).
//!
//! A varint occupies 1, 2, 4 or 8 bytes. The top two bits of the first
//! byte carry log2 of the length; the remaining bits encode the value in
//! network byte order.

use quicline_buf::Sequence;

use crate::error::H3Error;

/// Largest value a varint can carry (2^62 - 1).
pub const MAX: u64 = (1 << 62) - 1;

/// Returns the encoded byte length for `value` (1, 2, 4 or 8).
///
/// Values 0..2^6 use 1 byte, 2^6..2^14 use 2, 2^14..2^30 use 4,
/// 2^30..2^62 use 8.
pub fn encoded_size(value: u64) -> Result<usize, H3Error> {
    if value < (1 << 6) {
        Ok(1)
    } else if value < (1 << 14) {
        Ok(2)
    } else if value < (1 << 30) {
        Ok(4)
    } else if value <= MAX {
        Ok(8)
    } else {
        Err(H3Error::VarintOverflow)
    }
}

/// Appends the encoding of `value` to `buf`, returning the bytes written.
pub fn encode(buf: &mut Vec<u8>, value: u64) -> Result<usize, H3Error> {
    let size = encoded_size(value)?;
    match size {
        1 => buf.push(value as u8),
        2 => {
            buf.push(0x40 | (value >> 8) as u8);
            buf.push(value as u8);
        }
        4 => {
            buf.push(0x80 | (value >> 24) as u8);
            buf.push((value >> 16) as u8);
            buf.push((value >> 8) as u8);
            buf.push(value as u8);
        }
        _ => {
            buf.push(0xc0 | (value >> 56) as u8);
            buf.push((value >> 48) as u8);
            buf.push((value >> 40) as u8);
            buf.push((value >> 32) as u8);
            buf.push((value >> 24) as u8);
            buf.push((value >> 16) as u8);
            buf.push((value >> 8) as u8);
            buf.push(value as u8);
        }
    }
    Ok(size)
}

/// Decodes one varint off the front of `seq`, consuming exactly its bytes.
///
/// `Incomplete` leaves the sequence untouched, so the same code serves a
/// buffer chain (decode and commit) and a lookahead (peek).
pub fn decode<S: Sequence>(seq: &mut S) -> Result<u64, H3Error> {
    if seq.is_empty() {
        return Err(H3Error::Incomplete);
    }
    let first = seq.byte(0);
    let size = 1usize << (first >> 6);
    if seq.len() < size {
        return Err(H3Error::Incomplete);
    }
    let mut value = u64::from(first & 0x3f);
    for i in 1..size {
        value = (value << 8) | u64::from(seq.byte(i));
    }
    seq.consume(size);
    Ok(value)
}
