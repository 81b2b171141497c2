//! Shared library dependency records (`dylib_command`).

use crate::cursor::{ByteCursor, Endian};
use crate::error::{Error, Result};
use crate::load_command::LoadCommand;
use goblin::mach::load_command::{
    LC_ID_DYLIB, LC_LAZY_LOAD_DYLIB, LC_LOAD_DYLIB, LC_LOAD_UPWARD_DYLIB, LC_LOAD_WEAK_DYLIB,
    LC_REEXPORT_DYLIB,
};
use std::fmt;

/// `dylib_command`: cmd, cmdsize, name offset, timestamp, current and
/// compatibility version.
pub const DYLIB_COMMAND_SIZE: usize = 24;

const NAME_OFFSET_FIELD: usize = 8;
const CURRENT_VERSION_FIELD: usize = 16;
const COMPATIBILITY_VERSION_FIELD: usize = 20;

/// Which load command declared a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DylibKind {
    Load,
    WeakLoad,
    /// The image's own install name.
    Id,
    Reexport,
    UpwardLoad,
    LazyLoad,
}

impl DylibKind {
    pub fn from_cmd(cmd: u32) -> Option<Self> {
        match cmd {
            LC_LOAD_DYLIB => Some(DylibKind::Load),
            LC_LOAD_WEAK_DYLIB => Some(DylibKind::WeakLoad),
            LC_ID_DYLIB => Some(DylibKind::Id),
            LC_REEXPORT_DYLIB => Some(DylibKind::Reexport),
            LC_LOAD_UPWARD_DYLIB => Some(DylibKind::UpwardLoad),
            LC_LAZY_LOAD_DYLIB => Some(DylibKind::LazyLoad),
            _ => None,
        }
    }

    pub fn cmd(self) -> u32 {
        match self {
            DylibKind::Load => LC_LOAD_DYLIB,
            DylibKind::WeakLoad => LC_LOAD_WEAK_DYLIB,
            DylibKind::Id => LC_ID_DYLIB,
            DylibKind::Reexport => LC_REEXPORT_DYLIB,
            DylibKind::UpwardLoad => LC_LOAD_UPWARD_DYLIB,
            DylibKind::LazyLoad => LC_LAZY_LOAD_DYLIB,
        }
    }
}

impl fmt::Display for DylibKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DylibKind::Load => "load",
            DylibKind::WeakLoad => "weak",
            DylibKind::Id => "id",
            DylibKind::Reexport => "reexport",
            DylibKind::UpwardLoad => "upward",
            DylibKind::LazyLoad => "lazy",
        };
        write!(f, "{}", name)
    }
}

/// A `X.Y.Z` version packed as `xxxx.yy.zz` into 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackedVersion(pub u32);

impl PackedVersion {
    pub fn major(self) -> u32 {
        self.0 >> 16
    }

    pub fn minor(self) -> u32 {
        (self.0 >> 8) & 0xFF
    }

    pub fn patch(self) -> u32 {
        self.0 & 0xFF
    }
}

impl fmt::Display for PackedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// Render a packed version as `MAJOR.MINOR.PATCH`.
pub fn decode_version(raw: u32) -> String {
    PackedVersion(raw).to_string()
}

/// Copy a C string into at most `capacity` bytes including the terminator.
///
/// Returns the kept text and whether anything was cut off. A source of
/// exactly `capacity` bytes counts as truncated since its terminator would
/// not fit.
pub fn clip_to_capacity(source: &[u8], capacity: usize) -> (String, bool) {
    let truncated = source.len() >= capacity;
    let keep = if truncated {
        capacity.saturating_sub(1)
    } else {
        source.len()
    };
    (String::from_utf8_lossy(&source[..keep]).into_owned(), truncated)
}

/// One linked (or self-identifying) shared library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DylibDependency {
    pub kind: DylibKind,
    pub path: String,
    pub path_was_truncated: bool,
    /// Current version, `MAJOR.MINOR.PATCH`.
    pub version: String,
    pub compatibility_version: String,
}

impl DylibDependency {
    /// Decode a dependency from a load command, or `None` if the command is
    /// not one of the six dylib commands.
    ///
    /// `image` is the whole sub-image the command belongs to; the name may
    /// point anywhere inside it.
    pub fn decode(
        command: &LoadCommand<'_>,
        image: &ByteCursor<'_>,
        endian: Endian,
        path_capacity: usize,
    ) -> Result<Option<Self>> {
        let Some(kind) = DylibKind::from_cmd(command.cmd) else {
            return Ok(None);
        };

        if command.cmdsize() < DYLIB_COMMAND_SIZE {
            return Err(Error::malformed(
                command.file_offset(),
                "dylib command",
                format!(
                    "cmdsize {} is below the {DYLIB_COMMAND_SIZE}-byte minimum",
                    command.cmdsize()
                ),
            ));
        }

        let data = &command.data;
        let name_offset = data.u32_at(NAME_OFFSET_FIELD, endian, "dylib name offset")? as usize;
        let current = data.u32_at(CURRENT_VERSION_FIELD, endian, "dylib current version")?;
        let compatibility =
            data.u32_at(COMPATIBILITY_VERSION_FIELD, endian, "dylib compatibility version")?;

        let name_start = command.offset.checked_add(name_offset).ok_or_else(|| {
            Error::malformed(
                command.file_offset(),
                "dylib command",
                format!("name offset {name_offset:#x} overflows"),
            )
        })?;
        let raw_name = image.cstr_at(name_start, "dylib name")?;
        let (path, path_was_truncated) = clip_to_capacity(raw_name, path_capacity);
        if path_was_truncated {
            log::warn!(
                "dylib path at {:#x} is {} bytes, truncated to fit {path_capacity}",
                image.absolute(name_start),
                raw_name.len()
            );
        }

        Ok(Some(DylibDependency {
            kind,
            path,
            path_was_truncated,
            version: decode_version(current),
            compatibility_version: decode_version(compatibility),
        }))
    }
}
