//! `FrameBuffer`: a growable byte buffer with `[prepend | readable | writable]`
//! regions, sized so a complete frame header can always be prepended to an
//! already-built body without reallocation.

use byteorder::{BigEndian, ByteOrder};
use rpc_proto::HEADER_LEN;

/// Reserved front headroom, large enough to prepend a full frame header.
pub const INITIAL_HEADROOM: usize = HEADER_LEN;

const INITIAL_SIZE: usize = 1024;

/// A three-region byte buffer: bytes already retrieved live in the prepend
/// region's history (discarded), the readable region holds bytes appended
/// but not yet consumed, and the writable region is free space at the tail.
#[derive(Debug)]
pub struct FrameBuffer {
    storage: Vec<u8>,
    reader_idx: usize,
    writer_idx: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Creates a buffer with the default initial capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_SIZE)
    }

    /// Creates a buffer whose initial capacity (beyond headroom) is at least
    /// `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; INITIAL_HEADROOM + capacity],
            reader_idx: INITIAL_HEADROOM,
            writer_idx: INITIAL_HEADROOM,
        }
    }

    /// Bytes available to read.
    #[must_use]
    pub fn readable(&self) -> usize {
        self.writer_idx - self.reader_idx
    }

    /// Bytes available to append without growing.
    #[must_use]
    pub fn writable(&self) -> usize {
        self.storage.len() - self.writer_idx
    }

    /// Bytes available to prepend without growing.
    #[must_use]
    pub fn prependable(&self) -> usize {
        self.reader_idx
    }

    /// View over the readable region.
    #[must_use]
    pub fn readable_view(&self) -> &[u8] {
        &self.storage[self.reader_idx..self.writer_idx]
    }

    /// View over the writable region, for a reader to fill directly.
    pub fn writable_view(&mut self) -> &mut [u8] {
        &mut self.storage[self.writer_idx..]
    }

    /// Advances the writer index after bytes were written directly into
    /// [`Self::writable_view`].
    pub fn commit_written(&mut self, len: usize) {
        assert!(len <= self.writable(), "commit_written beyond writable region");
        self.writer_idx += len;
    }

    /// Appends `bytes`, growing the buffer if needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_writable(bytes.len());
        let start = self.writer_idx;
        self.storage[start..start + bytes.len()].copy_from_slice(bytes);
        self.writer_idx += bytes.len();
    }

    /// Writes `bytes` into the freed headroom immediately before the
    /// readable region.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() > prependable()` — prepending past available
    /// headroom is a programmer error, not a recoverable condition: callers
    /// must build the body first so headroom is always sufficient.
    pub fn prepend(&mut self, bytes: &[u8]) {
        assert!(bytes.len() <= self.prependable(), "prepend exceeds available headroom");
        self.reader_idx -= bytes.len();
        let start = self.reader_idx;
        self.storage[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Advances the reader past `n` bytes, collapsing to [`Self::retrieve_all`]
    /// if that would exhaust the readable region.
    ///
    /// # Panics
    ///
    /// Panics if `n > readable()`.
    pub fn retrieve(&mut self, n: usize) {
        assert!(n <= self.readable(), "retrieve beyond readable region");
        if n < self.readable() {
            self.reader_idx += n;
        } else {
            self.retrieve_all();
        }
    }

    /// Resets both indices to the headroom boundary, discarding all readable
    /// bytes without shrinking the backing store.
    pub fn retrieve_all(&mut self) {
        self.reader_idx = INITIAL_HEADROOM;
        self.writer_idx = INITIAL_HEADROOM;
    }

    /// Reads and consumes `std::mem::size_of::<T>()` bytes as a big-endian
    /// integer.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `WIDTH` bytes are readable.
    pub fn read_int<const WIDTH: usize>(&mut self) -> u64 {
        let v = self.peek_int::<WIDTH>();
        self.retrieve(WIDTH);
        v
    }

    /// Reads `WIDTH` bytes as a big-endian integer without consuming them.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `WIDTH` bytes are readable.
    #[must_use]
    pub fn peek_int<const WIDTH: usize>(&self) -> u64 {
        assert!(self.readable() >= WIDTH, "peek_int beyond readable region");
        let src = &self.storage[self.reader_idx..self.reader_idx + WIDTH];
        match WIDTH {
            1 => u64::from(src[0]),
            2 => u64::from(BigEndian::read_u16(src)),
            4 => u64::from(BigEndian::read_u32(src)),
            8 => BigEndian::read_u64(src),
            _ => unreachable!("append_int/read_int only support widths 1/2/4/8"),
        }
    }

    /// Appends a big-endian integer occupying `WIDTH` bytes.
    pub fn append_int<const WIDTH: usize>(&mut self, value: u64) {
        let mut tmp = [0u8; 8];
        match WIDTH {
            1 => tmp[0] = value as u8,
            2 => BigEndian::write_u16(&mut tmp[..2], value as u16),
            4 => BigEndian::write_u32(&mut tmp[..4], value as u32),
            8 => BigEndian::write_u64(&mut tmp[..8], value),
            _ => unreachable!("append_int/read_int only support widths 1/2/4/8"),
        }
        self.append(&tmp[..WIDTH]);
    }

    fn ensure_writable(&mut self, len: usize) {
        if self.writable() < len {
            self.make_space(len);
        }
        debug_assert!(self.writable() >= len);
    }

    /// Compacts readable bytes toward the headroom boundary, or reallocates
    /// at double the current size when compaction alone would not make `n`
    /// bytes writable. Compaction is tried first so steady-state traffic at
    /// a fixed message size never grows the heap.
    fn make_space(&mut self, n: usize) {
        if self.writable() + self.prependable() < n + INITIAL_HEADROOM {
            let readable = self.readable();
            let new_size = (self.storage.len() * 2).max(INITIAL_HEADROOM + readable + n);
            let mut new_storage = vec![0u8; new_size];
            new_storage[INITIAL_HEADROOM..INITIAL_HEADROOM + readable]
                .copy_from_slice(&self.storage[self.reader_idx..self.writer_idx]);
            self.storage = new_storage;
            self.reader_idx = INITIAL_HEADROOM;
            self.writer_idx = INITIAL_HEADROOM + readable;
        } else {
            let readable = self.readable();
            self.storage.copy_within(self.reader_idx..self.writer_idx, INITIAL_HEADROOM);
            self.reader_idx = INITIAL_HEADROOM;
            self.writer_idx = INITIAL_HEADROOM + readable;
        }
        debug_assert!(self.writable() >= n);
    }
}
