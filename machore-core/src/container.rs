//! Thin/fat container detection and the fat architecture table.
//!
//! Fat headers are stored big-endian whatever the host or slice byte order
//! is, so every field here goes through the cursor's `*_be` reads.

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use goblin::mach::fat::{FAT_CIGAM, FAT_MAGIC};

pub const FAT_MAGIC_64: u32 = 0xCAFE_BABF;
pub const FAT_CIGAM_64: u32 = 0xBFBA_FECA;

/// `magic` + `nfat_arch`.
pub const FAT_HEADER_SIZE: usize = 8;
/// `fat_arch`: cputype, cpusubtype, offset, size, align.
pub const FAT_ARCH_SIZE: usize = 20;
/// `fat_arch_64`: cputype, cpusubtype, offset (u64), size (u64), align, reserved.
pub const FAT_ARCH_64_SIZE: usize = 32;

/// How the buffer is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Single Mach-O image.
    Thin,
    /// Fat container with 32-bit architecture table entries.
    Fat32,
    /// Fat container with 64-bit architecture table entries.
    Fat64,
}

impl ContainerKind {
    /// Classify a buffer from its first four bytes.
    pub fn detect(data: &[u8]) -> Result<Self> {
        let magic = ByteCursor::new(data).read_u32_be("container magic")?;
        Ok(Self::from_magic(magic))
    }

    /// Classify a magic read big-endian. The byte-swapped constants cover
    /// the same bytes read in the other order.
    pub fn from_magic(magic: u32) -> Self {
        match magic {
            FAT_MAGIC | FAT_CIGAM => ContainerKind::Fat32,
            FAT_MAGIC_64 | FAT_CIGAM_64 => ContainerKind::Fat64,
            _ => ContainerKind::Thin,
        }
    }

    pub fn is_fat(self) -> bool {
        !matches!(self, ContainerKind::Thin)
    }

    fn arch_entry_size(self) -> usize {
        match self {
            ContainerKind::Fat64 => FAT_ARCH_64_SIZE,
            _ => FAT_ARCH_SIZE,
        }
    }
}

/// One entry of the fat architecture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatSlice {
    /// Position in the table.
    pub index: usize,
    pub cputype: u32,
    pub cpusubtype: u32,
    /// Absolute offset of the sub-image.
    pub offset: usize,
    /// Length of the sub-image in bytes.
    pub size: usize,
    /// Alignment as a power of two.
    pub align: u32,
}

/// The validated architecture table of a fat container.
///
/// Construction checks that the whole table fits in the buffer; each entry
/// is then decoded on demand and checked against the buffer on its own, so
/// one bad entry does not hide the others.
#[derive(Debug, Clone)]
pub struct FatArchTable<'a> {
    cursor: ByteCursor<'a>,
    kind: ContainerKind,
    count: usize,
}

impl<'a> FatArchTable<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let kind = ContainerKind::detect(data)?;
        if !kind.is_fat() {
            return Err(Error::malformed(0, "fat header", "magic is not a fat magic"));
        }

        let mut cursor = ByteCursor::new(data);
        cursor.read_bytes(4, "fat magic")?;
        let nfat_arch = cursor.read_u32_be("fat header")?;
        let count = nfat_arch as usize;

        let table_end = count
            .checked_mul(kind.arch_entry_size())
            .and_then(|len| len.checked_add(FAT_HEADER_SIZE));
        match table_end {
            Some(end) if end <= data.len() => {}
            _ => {
                return Err(Error::malformed(
                    FAT_HEADER_SIZE,
                    "fat architecture table",
                    format!(
                        "{count} entries of {} bytes extend past the {}-byte buffer",
                        kind.arch_entry_size(),
                        data.len()
                    ),
                ));
            }
        }

        log::debug!("{kind:?} container with {count} architectures");
        Ok(Self {
            cursor,
            kind,
            count,
        })
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Where entry `index` sits in the buffer.
    pub fn entry_offset(&self, index: usize) -> usize {
        FAT_HEADER_SIZE + index * self.kind.arch_entry_size()
    }

    /// Decode entry `index` and check its byte range against the buffer.
    pub fn get(&self, index: usize) -> Result<FatSlice> {
        if index >= self.count {
            return Err(Error::malformed(
                FAT_HEADER_SIZE,
                "fat architecture table",
                format!("entry {index} requested from a table of {}", self.count),
            ));
        }
        let entry_offset = self.entry_offset(index);
        let mut entry = self
            .cursor
            .window(entry_offset, self.kind.arch_entry_size(), "fat_arch")?;

        let cputype = entry.read_u32_be("fat_arch cputype")?;
        let cpusubtype = entry.read_u32_be("fat_arch cpusubtype")?;
        let (offset, size, align) = match self.kind {
            ContainerKind::Fat64 => {
                let offset = entry.read_u64_be("fat_arch_64 offset")?;
                let size = entry.read_u64_be("fat_arch_64 size")?;
                let align = entry.read_u32_be("fat_arch_64 align")?;
                (offset, size, align)
            }
            _ => {
                let offset = entry.read_u32_be("fat_arch offset")?;
                let size = entry.read_u32_be("fat_arch size")?;
                let align = entry.read_u32_be("fat_arch align")?;
                (u64::from(offset), u64::from(size), align)
            }
        };

        let in_bounds = offset
            .checked_add(size)
            .is_some_and(|end| end <= self.cursor.len() as u64);
        if !in_bounds {
            return Err(Error::malformed(
                entry_offset,
                "fat_arch",
                format!(
                    "slice {index} at {offset:#x} with size {size:#x} runs past the {}-byte buffer",
                    self.cursor.len()
                ),
            ));
        }

        // Both values are bounded by the buffer length now.
        Ok(FatSlice {
            index,
            cputype,
            cpusubtype,
            offset: offset as usize,
            size: size as usize,
            align,
        })
    }

    /// Entries in table order. The table can be iterated any number of times.
    pub fn iter(&self) -> FatSlices<'a> {
        FatSlices {
            table: self.clone(),
            next: 0,
        }
    }

    /// The bytes of one slice, as a window that reports absolute offsets.
    pub fn slice_view(&self, slice: &FatSlice) -> Result<ByteCursor<'a>> {
        self.cursor.window(slice.offset, slice.size, "architecture slice")
    }
}

/// Iterator over a [`FatArchTable`].
#[derive(Debug, Clone)]
pub struct FatSlices<'a> {
    table: FatArchTable<'a>,
    next: usize,
}

impl Iterator for FatSlices<'_> {
    type Item = Result<FatSlice>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.table.len() {
            return None;
        }
        let item = self.table.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.table.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for FatSlices<'_> {}
