//! Bit-addressed capture buffer
//!
//! One row of demodulated OOK bits as handed over by the demodulator.
//! Frames are not byte-aligned in the capture, so the search and extract
//! operations work on bit indices; bytes are packed MSB-first.

/// A finite, bit-addressed sequence of demodulated bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitBuffer {
    /// Build a buffer from whole bytes (`8 * bytes.len()` bits).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            bit_len: bytes.len() * 8,
        }
    }

    /// Build a buffer from bytes holding exactly `bit_len` valid bits.
    ///
    /// Trailing bits of the last byte beyond `bit_len` are ignored by all
    /// operations.
    pub fn with_bit_len(bytes: &[u8], bit_len: usize) -> Self {
        debug_assert!(bit_len <= bytes.len() * 8);
        Self {
            bytes: bytes.to_vec(),
            bit_len,
        }
    }

    /// Number of valid bits in the buffer.
    pub fn len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Bit at `idx`, MSB-first within each byte. `idx` must be `< len()`.
    pub fn bit(&self, idx: usize) -> bool {
        debug_assert!(idx < self.bit_len);
        (self.bytes[idx / 8] >> (7 - idx % 8)) & 1 != 0
    }

    /// Complement every bit in place (link polarity correction).
    pub fn invert(&mut self) {
        for b in &mut self.bytes {
            *b = !*b;
        }
    }

    /// Return a polarity-corrected copy, leaving `self` untouched.
    pub fn inverted(&self) -> Self {
        let mut copy = self.clone();
        copy.invert();
        copy
    }

    /// Find the first occurrence of the leading `pattern_bits` bits of
    /// `pattern` at or after bit offset `start`.
    ///
    /// Returns `None` when the pattern does not occur, including when the
    /// remaining capture is shorter than the pattern.
    pub fn search(&self, start: usize, pattern: &[u8], pattern_bits: usize) -> Option<usize> {
        debug_assert!(pattern_bits <= pattern.len() * 8);
        if pattern_bits == 0 || self.bit_len < pattern_bits {
            return None;
        }

        'scan: for pos in start..=(self.bit_len - pattern_bits) {
            for p in 0..pattern_bits {
                let want = (pattern[p / 8] >> (7 - p % 8)) & 1 != 0;
                if self.bit(pos + p) != want {
                    continue 'scan;
                }
            }
            return Some(pos);
        }
        None
    }

    /// Copy `num_bits` bits starting at `bit_offset` into `out`, packed
    /// MSB-first and left-aligned. `out` must hold at least
    /// `(num_bits + 7) / 8` bytes.
    ///
    /// Returns `false` without touching `out` when the capture does not
    /// contain `num_bits` bits past the offset.
    pub fn extract_bytes(&self, bit_offset: usize, num_bits: usize, out: &mut [u8]) -> bool {
        if bit_offset + num_bits > self.bit_len {
            return false;
        }

        let num_bytes = (num_bits + 7) / 8;
        for b in &mut out[..num_bytes] {
            *b = 0;
        }
        for i in 0..num_bits {
            if self.bit(bit_offset + i) {
                out[i / 8] |= 1 << (7 - i % 8);
            }
        }
        true
    }
}
