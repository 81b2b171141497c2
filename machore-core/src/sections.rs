//! Section headers from `LC_SEGMENT` and `LC_SEGMENT_64`.

use crate::cursor::Endian;
use crate::error::{Error, Result};
use crate::load_command::LoadCommand;
use goblin::mach::constants::{
    SECTION_TYPE, S_CSTRING_LITERALS, S_GB_ZEROFILL, S_THREAD_LOCAL_ZEROFILL, S_ZEROFILL,
};
use goblin::mach::load_command::{LC_SEGMENT, LC_SEGMENT_64};

const SEGMENT_COMMAND_SIZE: usize = 56;
const SEGMENT_COMMAND_64_SIZE: usize = 72;
const SECTION_SIZE: usize = 68;
const SECTION_64_SIZE: usize = 80;
const NAME_WIDTH: usize = 16;

/// One section header from an `LC_SEGMENT`/`LC_SEGMENT_64` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Owning segment, e.g. `__TEXT`.
    pub segment: String,
    /// Section name, e.g. `__cstring`.
    pub name: String,
    pub vma: u64,
    pub size: u64,
    /// File offset relative to the start of the architecture slice.
    pub file_offset: u64,
    pub flags: u32,
}

impl Section {
    pub fn section_type(&self) -> u32 {
        self.flags & SECTION_TYPE
    }

    /// Section holds only literal C strings.
    pub fn is_cstring_literals(&self) -> bool {
        self.section_type() == S_CSTRING_LITERALS
    }

    /// Zero-fill sections occupy no bytes in the file.
    pub fn is_zerofill(&self) -> bool {
        matches!(
            self.section_type(),
            S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
        )
    }

    /// Decode the sections of a segment command. Returns `None` for any
    /// other command.
    pub fn from_segment_command(command: &LoadCommand<'_>, endian: Endian) -> Result<Option<Vec<Self>>> {
        let (header_size, section_size, wide) = match command.cmd {
            LC_SEGMENT => (SEGMENT_COMMAND_SIZE, SECTION_SIZE, false),
            LC_SEGMENT_64 => (SEGMENT_COMMAND_64_SIZE, SECTION_64_SIZE, true),
            _ => return Ok(None),
        };

        let data = &command.data;
        if data.len() < header_size {
            return Err(Error::malformed(
                command.file_offset(),
                "segment command",
                format!(
                    "{} of {} bytes is shorter than its {header_size}-byte header",
                    command.name(),
                    data.len()
                ),
            ));
        }

        let nsects_at = if wide { 64 } else { 48 };
        let nsects = data.u32_at(nsects_at, endian, "segment nsects")? as usize;
        let fits = nsects
            .checked_mul(section_size)
            .and_then(|len| len.checked_add(header_size))
            .is_some_and(|end| end <= data.len());
        if !fits {
            return Err(Error::malformed(
                command.file_offset(),
                "segment command",
                format!(
                    "{nsects} sections do not fit in cmdsize {}",
                    data.len()
                ),
            ));
        }

        let mut sections = Vec::with_capacity(nsects);
        for i in 0..nsects {
            let at = header_size + i * section_size;
            let name = data.fixed_name_at(at, NAME_WIDTH, "sectname")?;
            let segment = data.fixed_name_at(at + NAME_WIDTH, NAME_WIDTH, "section segname")?;
            let (vma, size, file_offset, flags) = if wide {
                (
                    data.u64_at(at + 32, endian, "section addr")?,
                    data.u64_at(at + 40, endian, "section size")?,
                    data.u32_at(at + 48, endian, "section offset")?,
                    data.u32_at(at + 64, endian, "section flags")?,
                )
            } else {
                (
                    u64::from(data.u32_at(at + 32, endian, "section addr")?),
                    u64::from(data.u32_at(at + 36, endian, "section size")?),
                    data.u32_at(at + 40, endian, "section offset")?,
                    data.u32_at(at + 56, endian, "section flags")?,
                )
            };
            sections.push(Section {
                segment,
                name,
                vma,
                size,
                file_offset: u64::from(file_offset),
                flags,
            });
        }
        Ok(Some(sections))
    }
}
