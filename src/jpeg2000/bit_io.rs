//! Raw bit output for entropy coded segments.
//!
//! Bits are packed MSB first. Marker codes are 0xFF followed by a byte of
//! 0x90 or more, so after every 0xFF only seven bits go into the next byte
//! and its MSB is a stuffed 0.

use crate::constants::PAD_SEQUENCE;

/// Packs bits into bytes with bit-stuffing after 0xFF.
///
/// The output is appended to `sink`. A 0xFF byte is held back until the byte
/// after it is complete, which lets [`BitPacker::flush`] drop a trailing 0xFF.
#[derive(Debug)]
pub struct BitPacker<S> {
    sink: S,
    bit_buffer: u8,
    bit_pos: i8,
    pending_ff: bool,
    bytes_written: usize,
    predictable_termination: bool,
}

impl<S: Extend<u8>> BitPacker<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            bit_buffer: 0,
            bit_pos: 7,
            pending_ff: false,
            bytes_written: 0,
            predictable_termination: false,
        }
    }

    /// With predictable termination a held back 0xFF is terminated with
    /// `0xFF 0x2A` instead of being dropped, so that a decoder can check the
    /// segment end.
    pub fn set_predictable_termination(&mut self, enabled: bool) {
        self.predictable_termination = enabled;
    }

    fn emit(&mut self, byte: u8) {
        self.sink.extend(std::iter::once(byte));
        self.bytes_written += 1;
    }

    fn commit_byte(&mut self) {
        if self.bit_buffer != 0xFF {
            if self.pending_ff {
                self.emit(0xFF);
                self.pending_ff = false;
            }
            self.emit(self.bit_buffer);
            self.bit_pos = 7;
        } else {
            self.pending_ff = true;
            // One less bit in the next byte
            self.bit_pos = 6;
        }
        self.bit_buffer = 0;
    }

    /// Writes the low bit of `bit`.
    pub fn write_bit(&mut self, bit: u8) {
        self.bit_buffer |= (bit & 1) << self.bit_pos;
        self.bit_pos -= 1;
        if self.bit_pos < 0 {
            self.commit_byte();
        }
    }

    /// Writes the low bit of each of the first `count` symbols.
    pub fn write_bits(&mut self, symbols: &[u32], count: usize) {
        debug_assert!(count <= symbols.len());
        for &symbol in symbols.iter().take(count) {
            self.write_bit((symbol & 1) as u8);
        }
    }

    /// Completes the current byte with the pad sequence and writes it out.
    pub fn flush(&mut self) {
        if self.pending_ff {
            if self.bit_pos != 6 {
                self.emit(0xFF);
                self.pending_ff = false;
                self.bit_buffer |= PAD_SEQUENCE >> (6 - self.bit_pos);
                self.emit(self.bit_buffer);
                self.bit_pos = 7;
                self.bit_buffer = 0;
            } else if self.predictable_termination {
                self.emit(0xFF);
                self.emit(PAD_SEQUENCE);
                self.pending_ff = false;
                self.bit_pos = 7;
                self.bit_buffer = 0;
            }
        } else if self.bit_pos != 7 {
            self.bit_buffer |= PAD_SEQUENCE >> (6 - self.bit_pos);
            self.emit(self.bit_buffer);
            self.bit_pos = 7;
            self.bit_buffer = 0;
        }
    }

    /// Flushes, resets the packer for the next segment, and returns the
    /// number of bytes written for the terminated one.
    pub fn terminate(&mut self) -> usize {
        self.flush();
        let written = self.bytes_written;
        self.reset();
        written
    }

    pub fn reset(&mut self) {
        self.pending_ff = false;
        self.bit_pos = 7;
        self.bit_buffer = 0;
        self.bytes_written = 0;
    }

    /// The number of bytes written so far plus what the buffered bits will
    /// need, counting a held back 0xFF and its successor.
    pub fn length(&self) -> usize {
        if self.pending_ff {
            self.bytes_written + 2
        } else {
            self.bytes_written + usize::from(self.bit_pos != 7)
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

/// Reads bits written by [`BitPacker`], skipping the stuffed bit after 0xFF.
///
/// Past the end of the data the reader behaves as if it were fed 0xFF bytes,
/// which restores a 0xFF dropped at termination.
pub struct BitUnpacker<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buffer: u8,
    bits_left: u8,
    previous_ff: bool,
}

impl<'a> BitUnpacker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_buffer: 0,
            bits_left: 0,
            previous_ff: false,
        }
    }

    pub fn read_bit(&mut self) -> u8 {
        if self.bits_left == 0 {
            let b = self.data.get(self.pos).copied().unwrap_or(0xFF);
            self.pos += 1;
            self.bits_left = if self.previous_ff { 7 } else { 8 };
            self.previous_ff = b == 0xFF;
            self.bit_buffer = b;
        }

        let bit = (self.bit_buffer >> (self.bits_left - 1)) & 1;
        self.bits_left -= 1;
        bit
    }

    pub fn read_bits(&mut self, mut count: u8) -> u32 {
        let mut bits = 0u32;
        while count > 0 {
            bits = (bits << 1) | u32::from(self.read_bit());
            count -= 1;
        }
        bits
    }

    pub fn has_data(&self) -> bool {
        self.pos < self.data.len() || self.bits_left > 0
    }

    pub fn position(&self) -> usize {
        self.pos.min(self.data.len())
    }
}
