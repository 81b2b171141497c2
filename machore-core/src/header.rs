//! Mach-O image header.

use crate::cursor::{ByteCursor, Endian};
use crate::error::{Error, Result};
use goblin::mach::constants::cputype::{CPU_TYPE_ARM, CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64};
use goblin::mach::header::{
    MH_BUNDLE, MH_CIGAM, MH_CIGAM_64, MH_DYLIB, MH_EXECUTE, MH_MAGIC, MH_MAGIC_64, MH_OBJECT,
};
use std::fmt;

/// Size of `mach_header`.
pub const MACH_HEADER_SIZE: usize = 28;
/// Size of `mach_header_64` (adds a reserved word).
pub const MACH_HEADER_64_SIZE: usize = 32;

/// Target instruction set of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86,
    X86_64,
    Arm,
    Arm64,
    /// A CPU type this crate does not name; the raw `cputype` is kept.
    Unknown(u32),
}

impl Architecture {
    /// Map a `cputype`, falling back to [`Architecture::Unknown`].
    pub fn from_cputype(cputype: u32) -> Self {
        Self::try_from(cputype).unwrap_or(Architecture::Unknown(cputype))
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Architecture::Unknown(_))
    }
}

impl TryFrom<u32> for Architecture {
    type Error = Error;

    fn try_from(cputype: u32) -> Result<Self> {
        match cputype {
            CPU_TYPE_X86 => Ok(Architecture::X86),
            CPU_TYPE_X86_64 => Ok(Architecture::X86_64),
            CPU_TYPE_ARM => Ok(Architecture::Arm),
            CPU_TYPE_ARM64 => Ok(Architecture::Arm64),
            other => Err(Error::UnsupportedVariant {
                what: "cpu type",
                value: u64::from(other),
            }),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Architecture::X86 => "x86",
            Architecture::X86_64 => "x86_64",
            Architecture::Arm => "ARM",
            Architecture::Arm64 => "ARM64",
            Architecture::Unknown(_) => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Functional type of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Dylib,
    Executable,
    Bundle,
    RelocatableObject,
    /// Any other `filetype` (dylinker, kext, dSYM, core, ...); raw value kept.
    Unsupported(u32),
}

impl FileType {
    pub fn from_filetype(filetype: u32) -> Self {
        Self::try_from(filetype).unwrap_or(FileType::Unsupported(filetype))
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, FileType::Unsupported(_))
    }
}

impl TryFrom<u32> for FileType {
    type Error = Error;

    fn try_from(filetype: u32) -> Result<Self> {
        match filetype {
            MH_DYLIB => Ok(FileType::Dylib),
            MH_EXECUTE => Ok(FileType::Executable),
            MH_BUNDLE => Ok(FileType::Bundle),
            MH_OBJECT => Ok(FileType::RelocatableObject),
            other => Err(Error::UnsupportedVariant {
                what: "file type",
                value: u64::from(other),
            }),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Dylib => "dylib",
            FileType::Executable => "executable",
            FileType::Bundle => "bundle",
            FileType::RelocatableObject => "object",
            FileType::Unsupported(_) => "unsupported",
        };
        write!(f, "{}", name)
    }
}

/// Parsed `mach_header` / `mach_header_64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader {
    pub magic: u32,
    /// Byte order the image's structures are stored in.
    pub endian: Endian,
    pub is_64: bool,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    /// Number of load commands.
    pub ncmds: u32,
    /// Total size of the load command table in bytes.
    pub sizeofcmds: u32,
    pub flags: u32,
}

impl MachHeader {
    /// Parse the header at the start of `image`.
    pub fn parse(image: &ByteCursor<'_>) -> Result<Self> {
        if !image.contains(0, 4) {
            return Err(Error::malformed(
                image.absolute(0),
                "mach header",
                format!("{}-byte image has no room for a magic", image.len()),
            ));
        }
        let magic = image.u32_at(0, Endian::Little, "mach header magic")?;
        let (is_64, endian) = match magic {
            MH_MAGIC => (false, Endian::Little),
            MH_MAGIC_64 => (true, Endian::Little),
            MH_CIGAM => (false, Endian::Big),
            MH_CIGAM_64 => (true, Endian::Big),
            other => {
                return Err(Error::malformed(
                    image.absolute(0),
                    "mach header",
                    format!("unrecognised magic {other:#010x}"),
                ));
            }
        };

        let size = if is_64 {
            MACH_HEADER_64_SIZE
        } else {
            MACH_HEADER_SIZE
        };
        if !image.contains(0, size) {
            return Err(Error::malformed(
                image.absolute(0),
                "mach header",
                format!("{size}-byte header does not fit in {}-byte image", image.len()),
            ));
        }

        let header = MachHeader {
            magic,
            endian,
            is_64,
            cputype: image.u32_at(4, endian, "cputype")?,
            cpusubtype: image.u32_at(8, endian, "cpusubtype")?,
            filetype: image.u32_at(12, endian, "filetype")?,
            ncmds: image.u32_at(16, endian, "ncmds")?,
            sizeofcmds: image.u32_at(20, endian, "sizeofcmds")?,
            flags: image.u32_at(24, endian, "flags")?,
        };
        log::debug!(
            "mach header at {:#x}: cputype {:#x}, filetype {:#x}, {} load commands",
            image.absolute(0),
            header.cputype,
            header.filetype,
            header.ncmds
        );
        Ok(header)
    }

    /// Size of the fixed header; the load command table starts here.
    pub fn size(&self) -> usize {
        if self.is_64 {
            MACH_HEADER_64_SIZE
        } else {
            MACH_HEADER_SIZE
        }
    }

    pub fn architecture(&self) -> Architecture {
        Architecture::from_cputype(self.cputype)
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_filetype(self.filetype)
    }
}
