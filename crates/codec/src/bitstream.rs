//! MSB-first bit packing

/// Appends bit fields to a byte buffer, most significant bit first
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Write the low `nbits` bits of `value` (1..=32)
    pub fn put(&mut self, value: u32, nbits: u8) {
        debug_assert!((1..=32).contains(&nbits));
        for shift in (0..nbits).rev() {
            let bit = ((value >> shift) & 1) as u8;
            self.current |= bit << (7 - self.filled);
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
    }

    /// Number of bits written so far
    #[cfg(test)]
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.filled as usize
    }

    /// Flush the partial byte (zero padded) and return the buffer
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

/// Reads bit fields written by [`BitWriter`]
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Read `nbits` bits (1..=32), or `None` past the end of the data
    pub fn get(&mut self, nbits: u8) -> Option<u32> {
        debug_assert!((1..=32).contains(&nbits));
        if self.bit_pos + nbits as usize > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..nbits {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Some(value)
    }

    #[cfg(test)]
    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }
}
