//! Canonical byte encoding.
//!
//! Every consensus-visible artifact (transactions, headers, blocks, UTXO
//! snapshots) is serialized through this module: little-endian fixed-width
//! integers plus Bitcoin-style variable-length counts. Decoding is strict —
//! truncation, non-minimal varints, and oversized length prefixes are all
//! rejected so that a byte image has exactly one valid parse.

use crate::error::DecodeError;

/// Append a variable-length count: values below 0xFD are one byte; larger
/// values use a marker byte followed by a little-endian u16/u32/u64.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Serialized length of a varint without materializing it.
pub fn varint_len(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// A cursor over a byte slice with strict, bounds-checked reads.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail unless every input byte was consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof { needed: len - self.remaining() });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes(bytes.try_into().expect("slice is 2 bytes")))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("slice is 4 bytes")))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("slice is 8 bytes")))
    }

    pub fn read_hash_bytes(&mut self) -> Result<[u8; 32], DecodeError> {
        let bytes = self.read_bytes(32)?;
        Ok(bytes.try_into().expect("slice is 32 bytes"))
    }

    /// Read a varint, rejecting non-minimal encodings.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let first = self.read_u8()?;
        match first {
            0..=0xFC => Ok(first as u64),
            0xFD => {
                let v = self.read_u16()? as u64;
                if v < 0xFD {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                Ok(v)
            }
            0xFE => {
                let v = self.read_u32()? as u64;
                if v <= 0xFFFF {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                Ok(v)
            }
            0xFF => {
                let v = self.read_u64()?;
                if v <= 0xFFFF_FFFF {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                Ok(v)
            }
        }
    }

    /// Read a varint length prefix, bounded by `max`, then that many bytes.
    pub fn read_sized_bytes(&mut self, max: usize) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_varint()?;
        if len > max as u64 {
            return Err(DecodeError::LengthTooLarge { len, max });
        }
        Ok(self.read_bytes(len as usize)?.to_vec())
    }

    /// Read a varint element count, bounded by `max`.
    pub fn read_count(&mut self, max: usize) -> Result<usize, DecodeError> {
        let count = self.read_varint()?;
        if count > max as u64 {
            return Err(DecodeError::LengthTooLarge { len: count, max });
        }
        Ok(count as usize)
    }
}

/// Append a varint length prefix followed by the bytes themselves.
pub fn write_sized_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}
