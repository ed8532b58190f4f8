//! Packet buffer implementation
//!
//! Provides a byte buffer with the read/write operations the entity protocol needs:
//! - Standard big-endian integer and floating point types
//! - VarInt encoding for ids, lengths and type tags
//! - Protocol-specific encodings (angles, fixed-point coordinates, UUIDs)
//! - Length-prefixed UTF-8 strings

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Maximum packet size (2MB, the uncompressed frame limit)
pub const MAX_PACKET_SIZE: usize = 2_097_151;

/// Maximum number of bytes in an encoded VarInt
pub const MAX_VARINT_LEN: usize = 5;

/// Packet buffer for reading and writing protocol data
#[derive(Debug, Clone, Default)]
pub struct PacketBuffer {
    /// Internal byte buffer
    data: BytesMut,
    /// Current read position
    read_pos: usize,
}

impl PacketBuffer {
    /// Create a new empty packet buffer
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            read_pos: 0,
        }
    }

    /// Create a packet buffer with a specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Create a packet buffer from existing bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            read_pos: 0,
        }
    }

    // ============ Properties ============

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Check if there are bytes remaining to read
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Get a reference to the underlying bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the written bytes into an immutable handle
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    /// Reset read position to start
    pub fn reset(&mut self) {
        self.read_pos = 0;
    }

    // ============ Reading Methods ============

    /// Read an unsigned byte
    pub fn read_ubyte(&mut self) -> u8 {
        if self.read_pos >= self.data.len() {
            return 0;
        }
        let value = self.data[self.read_pos];
        self.read_pos += 1;
        value
    }

    /// Read a signed byte
    pub fn read_byte(&mut self) -> i8 {
        self.read_ubyte() as i8
    }

    /// Read a boolean byte
    pub fn read_bool(&mut self) -> bool {
        self.read_ubyte() != 0
    }

    /// Read a signed big-endian short (2 bytes)
    pub fn read_short(&mut self) -> i16 {
        let b1 = self.read_ubyte() as i16;
        let b2 = self.read_ubyte() as i16;
        (b1 << 8) | b2
    }

    /// Read a signed big-endian int (4 bytes)
    pub fn read_int(&mut self) -> i32 {
        let mut value = 0u32;
        for _ in 0..4 {
            value = (value << 8) | self.read_ubyte() as u32;
        }
        value as i32
    }

    /// Read a signed big-endian long (8 bytes)
    pub fn read_long(&mut self) -> i64 {
        let high = self.read_int() as u32 as u64;
        let low = self.read_int() as u32 as u64;
        ((high << 32) | low) as i64
    }

    /// Read a big-endian IEEE 754 float
    pub fn read_float(&mut self) -> f32 {
        f32::from_bits(self.read_int() as u32)
    }

    /// Read a big-endian IEEE 754 double
    pub fn read_double(&mut self) -> f64 {
        f64::from_bits(self.read_long() as u64)
    }

    /// Read a VarInt, stopping after the fifth byte
    pub fn read_varint(&mut self) -> i32 {
        let mut value = 0u32;
        for position in 0..MAX_VARINT_LEN {
            let byte = self.read_ubyte();
            value |= ((byte & 0x7F) as u32) << (7 * position);
            if byte & 0x80 == 0 {
                break;
            }
        }
        value as i32
    }

    /// Read a 128-bit UUID (most significant half first)
    pub fn read_uuid(&mut self) -> Uuid {
        let high = self.read_long() as u64;
        let low = self.read_long() as u64;
        Uuid::from_u64_pair(high, low)
    }

    /// Read a VarInt length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> String {
        let length = self.read_varint().max(0) as usize;
        let bytes = self.read_bytes(length);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Read raw bytes
    pub fn read_bytes(&mut self, length: usize) -> Vec<u8> {
        let len = length.min(self.remaining());
        let bytes = self.data[self.read_pos..self.read_pos + len].to_vec();
        self.read_pos += len;
        bytes
    }

    // ============ Writing Methods ============

    /// Write a signed byte
    pub fn write_byte(&mut self, value: i8) {
        self.data.put_i8(value);
    }

    /// Write an unsigned byte
    pub fn write_ubyte(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write a boolean as a single byte
    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(u8::from(value));
    }

    /// Write a signed big-endian short (2 bytes)
    pub fn write_short(&mut self, value: i16) {
        self.data.put_i16(value);
    }

    /// Write a signed big-endian int (4 bytes)
    pub fn write_int(&mut self, value: i32) {
        self.data.put_i32(value);
    }

    /// Write a signed big-endian long (8 bytes)
    pub fn write_long(&mut self, value: i64) {
        self.data.put_i64(value);
    }

    /// Write a big-endian IEEE 754 float
    pub fn write_float(&mut self, value: f32) {
        self.data.put_f32(value);
    }

    /// Write a big-endian IEEE 754 double
    pub fn write_double(&mut self, value: f64) {
        self.data.put_f64(value);
    }

    /// Write a VarInt (7 bits per byte, continuation bit set on all but the last)
    pub fn write_varint(&mut self, value: i32) {
        let mut remaining = value as u32;
        loop {
            if remaining & !0x7F == 0 {
                self.write_ubyte(remaining as u8);
                return;
            }
            self.write_ubyte(((remaining & 0x7F) | 0x80) as u8);
            remaining >>= 7;
        }
    }

    /// Write a 128-bit UUID (most significant half first)
    pub fn write_uuid(&mut self, value: Uuid) {
        let (high, low) = value.as_u64_pair();
        self.write_long(high as i64);
        self.write_long(low as i64);
    }

    /// Write a rotation in degrees as a 1/256 turn angle byte
    pub fn write_angle(&mut self, degrees: f32) {
        let steps = (degrees * 256.0 / 360.0) as i32;
        self.write_ubyte((steps & 0xFF) as u8);
    }

    /// Write a coordinate as a 27.5 fixed-point int (legacy protocol)
    pub fn write_fixed_point(&mut self, value: f64) {
        self.write_int((value * 32.0).floor() as i32);
    }

    /// Write a VarInt length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) {
        self.write_varint(value.len() as i32);
        self.data.extend_from_slice(value.as_bytes());
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Get the number of bytes a value occupies when VarInt-encoded
    pub fn varint_len(value: i32) -> usize {
        let mut remaining = value as u32;
        let mut len = 1;
        while remaining & !0x7F != 0 {
            remaining >>= 7;
            len += 1;
        }
        len
    }
}
