//! Bounds-checked reads over an immutable byte buffer.
//!
//! Nothing in this crate indexes the input directly; every access to file
//! bytes goes through [`ByteCursor`], which fails with
//! [`Error::TruncatedInput`] instead of reading past the end.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of a structure inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }

    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(bytes),
            Endian::Big => BigEndian::read_u64(bytes),
        }
    }
}

/// A read position over a window of the input buffer.
///
/// `base` is the absolute position of `data[0]` in the whole input, so
/// errors raised from a slice view still report file offsets.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, base, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Absolute file offset of a window-relative position.
    pub fn absolute(&self, offset: usize) -> usize {
        self.base.saturating_add(offset)
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// True when `[offset, offset + len)` lies inside the window.
    pub fn contains(&self, offset: usize, len: usize) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.data.len())
    }

    /// Borrow `len` bytes at `offset` without moving the cursor.
    pub fn bytes_at(&self, offset: usize, len: usize, context: &'static str) -> Result<&'a [u8]> {
        if !self.contains(offset, len) {
            let available = self.data.len().saturating_sub(offset);
            return Err(Error::truncated(self.absolute(offset), len, available, context));
        }
        Ok(&self.data[offset..offset + len])
    }

    pub fn read_bytes(&mut self, len: usize, context: &'static str) -> Result<&'a [u8]> {
        let bytes = self.bytes_at(self.pos, len, context)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn u32_at(&self, offset: usize, endian: Endian, context: &'static str) -> Result<u32> {
        self.bytes_at(offset, 4, context).map(|b| endian.read_u32(b))
    }

    pub fn u64_at(&self, offset: usize, endian: Endian, context: &'static str) -> Result<u64> {
        self.bytes_at(offset, 8, context).map(|b| endian.read_u64(b))
    }

    pub fn read_u32(&mut self, endian: Endian, context: &'static str) -> Result<u32> {
        self.read_bytes(4, context).map(|b| endian.read_u32(b))
    }

    pub fn read_u64(&mut self, endian: Endian, context: &'static str) -> Result<u64> {
        self.read_bytes(8, context).map(|b| endian.read_u64(b))
    }

    /// Big-endian read. Fat headers and their architecture tables are the
    /// only structures that go through this.
    pub fn read_u32_be(&mut self, context: &'static str) -> Result<u32> {
        self.read_u32(Endian::Big, context)
    }

    pub fn read_u64_be(&mut self, context: &'static str) -> Result<u64> {
        self.read_u64(Endian::Big, context)
    }

    /// A NUL-padded fixed-width name such as `segname`/`sectname`.
    pub fn fixed_name_at(&self, offset: usize, width: usize, context: &'static str) -> Result<String> {
        let raw = self.bytes_at(offset, width, context)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Bytes of the C string starting at `offset`, without the terminator.
    ///
    /// The string ends at the first NUL or at the end of the window,
    /// whichever comes first. `offset` itself must be inside the window.
    pub fn cstr_at(&self, offset: usize, context: &'static str) -> Result<&'a [u8]> {
        if offset >= self.data.len() {
            return Err(Error::malformed(
                self.absolute(offset),
                context,
                format!("string offset is outside the {}-byte image", self.data.len()),
            ));
        }
        let rest = &self.data[offset..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Ok(&rest[..end])
    }

    /// A sub-window of `len` bytes at `offset`, keeping absolute offsets.
    pub fn window(&self, offset: usize, len: usize, context: &'static str) -> Result<ByteCursor<'a>> {
        let data = self.bytes_at(offset, len, context)?;
        Ok(ByteCursor::with_base(data, self.absolute(offset)))
    }
}
