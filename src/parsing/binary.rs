//! Bounds-checked little-endian reads over one in-memory binary record.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BinaryError {
    #[error("Need {needed} bytes at offset {offset}, only {available} available")]
    Overrun {
        needed: usize,
        offset: usize,
        available: usize,
    },

    #[error("Missing NUL terminator for string starting at offset {offset}")]
    MissingNul { offset: usize },
}

/// A read position inside a byte slice that only moves forward
///
/// Every read checks the remaining length first, so a bad length field surfaces as an
/// error at the field that overran instead of corrupting the fields after it.
#[derive(Debug, Clone)]
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryCursor<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `n` bytes
    ///
    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], BinaryError> {
        if n > self.remaining() {
            return Err(BinaryError::Overrun {
                needed: n,
                offset: self.offset,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    /// Read a NUL-terminated string, consuming the terminator but not returning it
    ///
    /// # Errors
    ///
    /// Returns `BinaryError::MissingNul` if no NUL byte remains.
    pub fn read_cstr(&mut self) -> Result<&'a [u8], BinaryError> {
        let rest = &self.data[self.offset..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(BinaryError::MissingNul {
                offset: self.offset,
            })?;
        self.offset += len + 1;
        Ok(&rest[..len])
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` at end of data.
    pub fn read_u8(&mut self) -> Result<u8, BinaryError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` at end of data.
    pub fn read_i8(&mut self) -> Result<i8, BinaryError> {
        Ok(i8::from_le_bytes([self.read_u8()?]))
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, BinaryError> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than 2 bytes remain.
    pub fn read_i16(&mut self) -> Result<i16, BinaryError> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, BinaryError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32, BinaryError> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than 4 bytes remain.
    pub fn read_f32(&mut self) -> Result<f32, BinaryError> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// # Errors
    ///
    /// Returns `BinaryError::Overrun` if fewer than 8 bytes remain.
    pub fn read_f64(&mut self) -> Result<f64, BinaryError> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }
}
