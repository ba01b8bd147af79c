//! The timestamped chunk ring (TCB): a fixed-size byte arena holding a FIFO
//! of length-prefixed, timestamped records.
//!
//! Grounded on the mmap'd ring buffer in `anp-perf_events::sample::ring_buffer`
//! (head/tail bookkeeping over a single contiguous arena) and on the
//! circular-addressing idiom in `kalamay-vmap-rs::io::ring`, generalized here
//! to the headered-chunk-with-slack-tail scheme this relay needs instead of
//! either of those crates' double-mapped or lossy-overwrite buffers.

use std::io;

use crate::chunk::{Header, CHUNK_MAX, HEADER_SIZE, PAYLOAD_MAX};
use crate::clock::TimeMs;
use crate::error::{Error, Result};

/// A fixed-capacity FIFO of timestamped byte chunks.
///
/// `capacity` is the declared logical window within which a new chunk's
/// header may start; the backing arena is `capacity + CHUNK_MAX - 1` bytes,
/// reserving enough tail slack that any chunk starting inside `0..capacity`
/// can always be written as one contiguous range — no chunk is ever split
/// across the end of the arena.
#[derive(Debug)]
pub struct Ring {
    data: Box<[u8]>,
    capacity: usize,
    head: usize,
    tail: usize,
}

impl Ring {
    /// Allocates a new ring able to hold `capacity` logical bytes.
    ///
    /// Rejects `capacity < CHUNK_MAX`: the tail-wrap rule is still defined
    /// for it (it resets head too) but the resulting ring could never hold a
    /// single chunk, so it's treated as a configuration error instead of a
    /// silently degenerate ring.
    pub fn init(capacity: usize) -> Result<Self> {
        if capacity < CHUNK_MAX {
            return Err(Error::RingInit {
                inner: format!(
                    "capacity {} is smaller than the minimum chunk size {}",
                    capacity, CHUNK_MAX
                ),
            });
        }
        let real_capacity = capacity + CHUNK_MAX - 1;
        let mut data: Vec<u8> = Vec::new();
        data.try_reserve_exact(real_capacity).map_err(|e| Error::RingInit {
            inner: e.to_string(),
        })?;
        data.resize(real_capacity, 0);
        Ok(Ring {
            data: data.into_boxed_slice(),
            capacity,
            head: 0,
            tail: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn real_capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// The fullness predicate of the data model: true when no fresh
    /// `CHUNK_MAX`-byte window can be placed.
    ///
    /// The `<=` in the second branch is deliberate, not off-by-one slack:
    /// a window of exactly `CHUNK_MAX` bytes ending precisely at `tail`
    /// would, once written, leave `head == tail` while chunks are still
    /// queued — indistinguishable from empty under invariant 1. One
    /// chunk's worth of headroom is reserved to keep that collision from
    /// happening, so callers may need more than one `drain_to` before
    /// `is_full` clears.
    pub fn is_full(&self) -> bool {
        if self.head >= self.capacity {
            // head is waiting to wrap; it can only do so once tail has
            // moved far enough past the origin that a fresh chunk at 0
            // cannot catch up to it.
            self.tail < CHUNK_MAX
        } else if self.head < self.tail {
            self.tail - self.head <= CHUNK_MAX
        } else {
            false
        }
    }

    /// The timestamp of the oldest buffered chunk. Precondition: non-empty.
    pub fn peek_next_timestamp(&self) -> TimeMs {
        debug_assert!(!self.is_empty());
        self.header_at(self.tail).timestamp
    }

    /// Reads up to `PAYLOAD_MAX` bytes from `src` directly into the arena
    /// and appends a new chunk header. Returns the number of bytes read:
    /// `Ok(0)` signals EOF, `Err` an I/O error — in neither case is `head`
    /// or any header mutated. Precondition: `!is_full()`.
    pub fn ingest_from<R: io::Read>(&mut self, src: &mut R, ts: TimeMs) -> io::Result<usize> {
        debug_assert!(!self.is_full());
        let payload_start = self.head + HEADER_SIZE;
        let n = src.read(&mut self.data[payload_start..payload_start + PAYLOAD_MAX])?;
        if n == 0 {
            return Ok(0);
        }
        let header = Header {
            timestamp: ts,
            length: n as u16,
        };
        self.write_header_at(self.head, header);
        self.head = payload_start + n;
        self.apply_head_wrap();
        Ok(n)
    }

    /// Writes the oldest chunk's payload (or a remaining suffix of it, if a
    /// previous call only partially delivered it) to `dst`. Precondition:
    /// `!is_empty()`.
    pub fn drain_to<W: io::Write>(&mut self, dst: &mut W) -> io::Result<usize> {
        debug_assert!(!self.is_empty());
        let header = self.header_at(self.tail);
        let length = header.length as usize;
        let payload_start = self.tail + HEADER_SIZE;
        let w = dst.write(&self.data[payload_start..payload_start + length])?;
        if w == 0 {
            return Ok(0);
        }
        if w == length {
            self.tail = payload_start + w;
            self.apply_tail_wrap();
        } else {
            self.tail += w;
            self.write_header_at(
                self.tail,
                Header {
                    timestamp: header.timestamp,
                    length: (length - w) as u16,
                },
            );
        }
        self.apply_head_wrap();
        Ok(w)
    }

    fn header_at(&self, offset: usize) -> Header {
        Header::decode(&self.data[offset..offset + HEADER_SIZE])
    }

    fn write_header_at(&mut self, offset: usize, header: Header) {
        header.encode(&mut self.data[offset..offset + HEADER_SIZE]);
    }

    /// Post-ingest (and post-drain) head wrap: safe because `tail` sitting
    /// past `CHUNK_MAX` guarantees a fresh chunk at offset 0 cannot catch it.
    fn apply_head_wrap(&mut self) {
        if self.head >= self.capacity && self.tail >= CHUNK_MAX {
            self.head = 0;
        }
    }

    /// Post-drain tail wrap. When `capacity < CHUNK_MAX` could occur this
    /// would also need to reset `head` to re-establish the "same lap"
    /// canonical form on empty; `init` rejects such capacities instead.
    fn apply_tail_wrap(&mut self) {
        if self.tail >= self.capacity {
            self.tail = 0;
            if self.head >= self.capacity {
                self.head = 0;
            }
        }
    }
}
