//! Bounds-checked little-endian cursor over a package buffer.

use pakscan_core::error::DecodeError;
use pakscan_core::types::Guid;
use pakscan_core::PackageIndex;

/// Longest string (in code units) accepted before the length is
/// considered corrupt.
pub const MAX_STRING_LEN: i32 = 1 << 20;

pub type DecodeResult<T> = Result<T, DecodeError>;

pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Moves to an absolute offset taken from the header.
    pub fn seek(&mut self, offset: i64) -> DecodeResult<()> {
        if offset < 0 || offset as u64 > self.data.len() as u64 {
            return Err(DecodeError::InvalidOffset {
                offset,
                len: self.data.len(),
            });
        }
        self.pos = offset as usize;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed: n,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// 32-bit boolean; anything other than 0 or 1 is corruption.
    pub fn read_bool32(&mut self) -> DecodeResult<bool> {
        let offset = self.pos;
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { offset, value }),
        }
    }

    pub fn read_guid(&mut self) -> DecodeResult<Guid> {
        Ok(Guid(self.read_array()?))
    }

    pub fn read_package_index(&mut self) -> DecodeResult<PackageIndex> {
        Ok(PackageIndex::from_raw(self.read_i32()?))
    }

    /// Non-negative element count.
    pub fn read_count(&mut self) -> DecodeResult<usize> {
        let n = self.read_i32()?;
        if n < 0 {
            return Err(DecodeError::NegativeCount(n));
        }
        Ok(n as usize)
    }

    /// Length-prefixed string: positive length is Latin-1, negative is
    /// UTF-16LE, both counting a trailing NUL.
    pub fn read_fstring(&mut self) -> DecodeResult<String> {
        let start = self.pos;
        let len = self.read_i32()?;
        if len == 0 {
            return Ok(String::new());
        }
        if len == i32::MIN || len.abs() > MAX_STRING_LEN {
            return Err(DecodeError::StringTooLong(len));
        }

        if len > 0 {
            let bytes = self.read_bytes(len as usize)?;
            let (body, nul) = bytes.split_at(bytes.len() - 1);
            if nul[0] != 0 {
                return Err(DecodeError::InvalidString(start));
            }
            Ok(body.iter().map(|&b| char::from(b)).collect())
        } else {
            let units = (-len) as usize;
            let bytes = self.read_bytes(units * 2)?;
            let mut code_units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            if code_units.pop() != Some(0) {
                return Err(DecodeError::InvalidString(start));
            }
            String::from_utf16(&code_units).map_err(|_| DecodeError::InvalidString(start))
        }
    }
}
