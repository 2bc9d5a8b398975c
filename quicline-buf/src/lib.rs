//! quicline-buf — fragmented byte buffers for incremental decoders.
//!
//! Network reads hand the framing layer a sequence of discontiguous chunks.
//! [`BufferChain`] keeps those chunks in arrival order without copying them
//! into one allocation; decoders walk it through the [`Sequence`] trait and
//! use [`Lookahead`] cursors to parse speculatively, committing consumption
//! to the chain only once a whole item decoded:
//!
//! ```
//! use quicline_buf::{BufferChain, Sequence};
//! use bytes::Bytes;
//!
//! let mut chain = BufferChain::new();
//! chain.push(Bytes::from_static(b"he"));
//! chain.push(Bytes::from_static(b"llo"));
//!
//! let mut look = chain.lookahead();
//! assert_eq!(look.byte(4), b'o');
//! look.consume(5);
//!
//! let advance = look.consumed();
//! chain.consume(advance);
//! assert!(chain.is_empty());
//! ```

use std::collections::VecDeque;
use std::ops::Index;

use bytes::{Buf, Bytes, BytesMut};

/// A consumable byte cursor.
///
/// Implemented by [`BufferChain`] (consuming is permanent) and by
/// [`Lookahead`] (consuming only advances the cursor), so a decoder written
/// once against this trait serves both the decode-and-commit and the peek
/// use cases.
pub trait Sequence {
    /// Bytes remaining in front of the cursor.
    fn len(&self) -> usize;

    /// Byte at `index` from the cursor, without consuming. Panics out of
    /// range; check [`len`](Sequence::len) first.
    fn byte(&self, index: usize) -> u8;

    /// Drops `count` bytes off the front. Panics past the end.
    fn consume(&mut self, count: usize);

    /// Removes the first `count` bytes and returns them contiguously.
    /// Panics past the end.
    fn slice(&mut self, count: usize) -> Bytes;

    /// A fresh read-only cursor starting at this cursor's position.
    fn lookahead(&self) -> Lookahead<'_>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered sequence of owned byte fragments.
///
/// `push` appends ownership of a fragment; `consume`/`slice` eat from the
/// front across fragment boundaries, dropping fragments as they empty.
/// Indexing resolves a position to its fragment by linear scan from the
/// front.
#[derive(Debug, Default)]
pub struct BufferChain {
    segments: VecDeque<Bytes>,
    len: usize,
}

impl BufferChain {
    pub fn new() -> Self {
        BufferChain::default()
    }

    /// Total bytes across all fragments.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a fragment to the tail. Empty fragments are dropped.
    pub fn push(&mut self, buffer: Bytes) {
        if buffer.is_empty() {
            return;
        }
        self.len += buffer.len();
        self.segments.push_back(buffer);
    }

    /// Removes and returns the head fragment whole.
    pub fn pop(&mut self) -> Option<Bytes> {
        let buffer = self.segments.pop_front()?;
        self.len -= buffer.len();
        Some(buffer)
    }

    /// Drops `count` bytes off the front, across as many fragments as
    /// needed.
    pub fn consume(&mut self, count: usize) {
        assert!(count <= self.len, "consume({count}) exceeds chain length {}", self.len);
        self.len -= count;
        let mut remaining = count;
        while remaining > 0 && let Some(front) = self.segments.front_mut() {
            if front.len() <= remaining {
                remaining -= front.len();
                self.segments.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }
    }

    /// Removes the first `count` bytes and returns them as one buffer.
    ///
    /// A request satisfied by a single fragment shares that fragment's
    /// storage; only a request spanning fragments copies.
    pub fn slice(&mut self, count: usize) -> Bytes {
        let out = self.copy_range(0, count);
        self.consume(count);
        out
    }

    /// Copies out `count` bytes starting at absolute position `start`,
    /// without consuming. Zero-copy when one fragment covers the range.
    fn copy_range(&self, start: usize, count: usize) -> Bytes {
        assert!(
            start + count <= self.len,
            "range {start}..{} exceeds chain length {}",
            start + count,
            self.len
        );
        if count == 0 {
            return Bytes::new();
        }

        // Locate the fragment holding the first byte. push() guarantees no
        // empty fragments, so this terminates within the assert bound.
        let mut offset = start;
        let mut index = 0;
        while offset >= self.segments[index].len() {
            offset -= self.segments[index].len();
            index += 1;
        }

        let first = &self.segments[index];
        if first.len() - offset >= count {
            return first.slice(offset..offset + count);
        }

        let mut out = BytesMut::with_capacity(count);
        out.extend_from_slice(&first[offset..]);
        let mut remaining = count - (first.len() - offset);
        index += 1;
        while remaining > 0 {
            let segment = &self.segments[index];
            let take = remaining.min(segment.len());
            out.extend_from_slice(&segment[..take]);
            remaining -= take;
            index += 1;
        }
        out.freeze()
    }
}

impl Index<usize> for BufferChain {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        let mut offset = index;
        for segment in &self.segments {
            if offset < segment.len() {
                return &segment[offset];
            }
            offset -= segment.len();
        }
        panic!("index {index} exceeds chain length {}", self.len);
    }
}

impl Sequence for BufferChain {
    fn len(&self) -> usize {
        self.len
    }

    fn byte(&self, index: usize) -> u8 {
        self[index]
    }

    fn consume(&mut self, count: usize) {
        BufferChain::consume(self, count);
    }

    fn slice(&mut self, count: usize) -> Bytes {
        BufferChain::slice(self, count)
    }

    fn lookahead(&self) -> Lookahead<'_> {
        Lookahead { chain: self, base: 0, pos: 0 }
    }
}

/// A read-only cursor over a [`BufferChain`].
///
/// Consuming from a lookahead never touches the chain; the owner reads
/// [`consumed`](Lookahead::consumed) after a successful parse and applies
/// it to the chain itself. Any number of lookaheads may coexist.
#[derive(Debug, Clone)]
pub struct Lookahead<'a> {
    chain: &'a BufferChain,
    base: usize,
    pos: usize,
}

impl Lookahead<'_> {
    /// Bytes consumed through this cursor since it was created.
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

impl Sequence for Lookahead<'_> {
    fn len(&self) -> usize {
        self.chain.len - self.base - self.pos
    }

    fn byte(&self, index: usize) -> u8 {
        self.chain[self.base + self.pos + index]
    }

    fn consume(&mut self, count: usize) {
        assert!(count <= self.len(), "consume({count}) exceeds lookahead length {}", self.len());
        self.pos += count;
    }

    fn slice(&mut self, count: usize) -> Bytes {
        let out = self.chain.copy_range(self.base + self.pos, count);
        self.pos += count;
        out
    }

    fn lookahead(&self) -> Lookahead<'_> {
        Lookahead { chain: self.chain, base: self.base + self.pos, pos: 0 }
    }
}
