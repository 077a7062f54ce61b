//! Bit-level streams.
//!
//! Bits are stored most-significant first within each byte: the first bit of
//! the stream is bit 7 of byte 0. Both [`BinaryWriterBuilder`] and
//! [`BinaryReader`] follow this convention, which is the one used by the
//! BVGraph files.

use std::sync::Arc;

use crate::utils::encodings::{DeltaCode, GammaCode, UniversalCode, ZetaCode};
use crate::{GraphError, Result};

/// The bytes produced by a [`BinaryWriterBuilder`].
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct BinaryWriter {
    pub os: Box<[u8]>,
    /// Number of meaningful bits in `os`; the rest of the last byte is zero padding.
    pub written_bits: usize,
}

pub struct BinaryWriterBuilder {
    os: Vec<u8>,
    pub written_bits: usize,
    pub current: u64,
    pub free: usize,
    temp_buffer: [u8; 16],
}

impl Default for BinaryWriterBuilder {
    fn default() -> Self {
        BinaryWriterBuilder {
            os: Vec::default(),
            written_bits: 0,
            current: 0,
            free: 8,
            temp_buffer: [0u8; 16],
        }
    }
}

impl BinaryWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flushes the partial byte, if any, and returns the written bytes.
    pub fn build(mut self) -> BinaryWriter {
        if self.free != 8 {
            self.write(self.current);
        }

        BinaryWriter {
            os: self.os.into_boxed_slice(),
            written_bits: self.written_bits,
        }
    }

    /// Appends a whole byte to the output, bypassing the bit buffer.
    #[inline(always)]
    pub fn write(&mut self, b: u64) {
        self.os.push(b as u8);
    }

    /// Writes the lowest `len` bits of `b` into the bit buffer. `len` must not exceed `free`.
    #[inline(always)]
    pub fn write_in_current(&mut self, b: u64, len: u64) -> u64 {
        debug_assert!(len as usize <= self.free);
        self.free -= len as usize;
        self.current |= (b & ((1 << len) - 1)) << self.free;

        if self.free == 0 {
            self.write(self.current);
            self.free = 8;
            self.current = 0;
        }

        self.written_bits += len as usize;
        len
    }

    /// Writes the lowest `len` bits of `x`, most significant first. Returns `len`.
    #[inline(always)]
    pub fn push_bits(&mut self, x: u64, len: u64) -> u64 {
        assert!(len <= 64, "Cannot write {} bits to an integer", len);

        if len <= self.free as u64 {
            return self.write_in_current(x, len);
        }

        let mut x = x;

        let q = (len - self.free as u64) & 7;
        let blocks = (len - self.free as u64) >> 3;

        if q != 0 {
            self.temp_buffer[blocks as usize] = x as u8;
            x >>= q;
        }

        let mut i = blocks;
        while i != 0 {
            i -= 1;
            self.temp_buffer[i as usize] = x as u8;
            x >>= 8;
        }

        self.write_in_current(x, self.free as u64);

        for i in 0..blocks {
            self.write(self.temp_buffer[i as usize] as u64);
        }

        self.written_bits += (blocks << 3) as usize;

        if q != 0 {
            self.write_in_current(self.temp_buffer[blocks as usize] as u64, q);
        }

        len
    }

    /// Writes `x` zeroes followed by a one. Returns the number of written bits.
    #[inline(always)]
    pub fn push_unary(&mut self, x: u64) -> u64 {
        if x < self.free as u64 {
            return self.write_in_current(1, x + 1);
        }

        let shift = self.free;
        let rest = x - shift as u64;

        self.written_bits += shift;
        self.write(self.current);
        self.free = 8;
        self.current = 0;

        let mut i = rest >> 3;

        self.written_bits += rest as usize & !7;

        while i != 0 {
            self.write(0);
            i -= 1;
        }

        self.write_in_current(1, (rest & 7) + 1);

        x + 1
    }
}

/// A cursor over a shared, immutable bitstream.
///
/// Cloning a reader is cheap: the bytes are reference counted, only the
/// position is private to each reader.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BinaryReader {
    is: Arc<[u8]>,
    position: u64,
    len: u64,
}

impl Default for BinaryReader {
    fn default() -> Self {
        Self::new(Arc::from(Vec::new()))
    }
}

impl BinaryReader {
    pub fn new(input_stream: Arc<[u8]>) -> Self {
        let len = input_stream.len() as u64 * 8;
        BinaryReader {
            is: input_stream,
            position: 0,
            len,
        }
    }

    /// The length of the stream in bits.
    #[inline(always)]
    pub fn len_bits(&self) -> u64 {
        self.len
    }

    #[inline(always)]
    pub fn get_position(&self) -> u64 {
        self.position
    }

    #[inline(always)]
    pub fn remaining(&self) -> u64 {
        self.len - self.position
    }

    /// Moves the cursor to the absolute bit offset `pos`.
    ///
    /// Seeking to the very end of the stream is allowed; any read from there fails.
    #[inline(always)]
    pub fn position(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(GraphError::OutOfRange {
                what: "Bit offset",
                value: pos,
                limit: self.len,
            });
        }

        self.position = pos;
        Ok(())
    }

    #[inline(always)]
    fn truncated(&self) -> GraphError {
        GraphError::TruncatedStream {
            position: self.position,
            len: self.len,
        }
    }

    #[inline(always)]
    pub fn read_bit(&mut self) -> Result<u64> {
        if self.position >= self.len {
            return Err(self.truncated());
        }

        let byte = self.is[(self.position >> 3) as usize];
        let bit = (byte >> (7 - (self.position & 7))) & 1;
        self.position += 1;
        Ok(bit as u64)
    }

    /// Reads `len` bits as an unsigned integer, most significant bit first.
    ///
    /// On failure the cursor is left untouched.
    #[inline(always)]
    pub fn read_int(&mut self, len: u64) -> Result<u64> {
        assert!(len <= 64, "Cannot read {} bits into an integer", len);

        if len > self.remaining() {
            return Err(self.truncated());
        }

        let mut x = 0u64;
        let mut left = len;

        while left != 0 {
            let byte = self.is[(self.position >> 3) as usize] as u64;
            let avail = 8 - (self.position & 7);
            let take = avail.min(left);
            let bits = (byte >> (avail - take)) & ((1 << take) - 1);

            // take is at most 8, so the shift never overflows
            x = (x << take) | bits;
            self.position += take;
            left -= take;
        }

        Ok(x)
    }

    /// Reads a unary code: the number of zeroes before the next one.
    #[inline(always)]
    pub fn read_unary(&mut self) -> Result<u64> {
        let start = self.position;
        let mut x = 0u64;

        loop {
            if self.position >= self.len {
                self.position = start;
                return Err(GraphError::TruncatedStream {
                    position: start,
                    len: self.len,
                });
            }

            let offset = self.position & 7;
            let masked = (self.is[(self.position >> 3) as usize] << offset) as u32;

            if masked == 0 {
                let skipped = 8 - offset;
                x += skipped;
                self.position += skipped;
                continue;
            }

            let zeros = (masked as u8).leading_zeros() as u64;
            x += zeros;
            self.position += zeros + 1;
            return Ok(x);
        }
    }

    /// Reads a γ code: the unary length of `x + 1`, then its bits below the leading one.
    #[inline(always)]
    pub fn read_gamma(&mut self) -> Result<u64> {
        GammaCode::read_next(self, None)
    }

    #[inline(always)]
    pub fn read_delta(&mut self) -> Result<u64> {
        DeltaCode::read_next(self, None)
    }

    #[inline(always)]
    pub fn read_zeta(&mut self, k: u64) -> Result<u64> {
        ZetaCode::read_next(self, Some(k))
    }
}
