//! Synthetic Mach-O images for integration tests.

#![allow(dead_code)]

use goblin::mach::constants::S_CSTRING_LITERALS;
use goblin::mach::fat::FAT_MAGIC;
use goblin::mach::header::MH_MAGIC;
use goblin::mach::load_command::{LC_SEGMENT, LC_SEGMENT_64};

pub use goblin::mach::constants::cputype::{
    CPU_TYPE_ARM64, CPU_TYPE_POWERPC, CPU_TYPE_X86, CPU_TYPE_X86_64,
};
pub use goblin::mach::header::{MH_DYLIB, MH_EXECUTE, MH_MAGIC_64, MH_OBJECT};
pub use goblin::mach::load_command::{LC_ID_DYLIB, LC_LOAD_DYLIB, LC_LOAD_WEAK_DYLIB, LC_UUID};

pub const LIBSYSTEM: &str = "/usr/lib/libSystem.B.dylib";
pub const FAT_ALIGN: usize = 0x1000;
pub const FAT_MAGIC_64: u32 = 0xCAFE_BABF;

const TEXT_BYTES: [u8; 16] = [0x55, 0x48, 0x89, 0xE5, 0x31, 0xC0, 0x5D, 0xC3, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC];

fn align(value: usize, to: usize) -> usize {
    (value + to - 1) & !(to - 1)
}

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

/// Builds one Mach-O image (little-endian unless asked otherwise) with a
/// `__TEXT` segment holding `__text` and `__cstring`, followed by dylib and
/// arbitrary commands.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    pub cputype: u32,
    pub filetype: u32,
    pub is_64: bool,
    pub big_endian: bool,
    pub dylibs: Vec<(u32, String, u32)>,
    pub cstrings: Vec<u8>,
    pub extra: Vec<(u32, Vec<u8>)>,
}

/// Where the builder put things, relative to the image start.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub header_size: usize,
    pub sizeofcmds: usize,
    pub ncmds: usize,
    pub text_offset: usize,
    pub cstring_offset: usize,
    pub total: usize,
}

impl ImageBuilder {
    pub fn new(cputype: u32, filetype: u32) -> Self {
        Self {
            cputype,
            filetype,
            is_64: true,
            big_endian: false,
            dylibs: Vec::new(),
            cstrings: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn bits32(mut self) -> Self {
        self.is_64 = false;
        self
    }

    /// Write every header and command field big-endian, as PowerPC did.
    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    fn word(&self, buf: &mut Vec<u8>, value: u32) {
        if self.big_endian {
            buf.extend_from_slice(&value.to_be_bytes());
        } else {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn quad(&self, buf: &mut Vec<u8>, value: u64) {
        if self.big_endian {
            buf.extend_from_slice(&value.to_be_bytes());
        } else {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    pub fn dylib(mut self, cmd: u32, path: &str, version: u32) -> Self {
        self.dylibs.push((cmd, path.to_string(), version));
        self
    }

    pub fn cstrings(mut self, strings: &[&str]) -> Self {
        for s in strings {
            self.cstrings.extend_from_slice(s.as_bytes());
            self.cstrings.push(0);
        }
        self
    }

    pub fn raw_cstrings(mut self, bytes: &[u8]) -> Self {
        self.cstrings.extend_from_slice(bytes);
        self
    }

    pub fn command(mut self, cmd: u32, payload: &[u8]) -> Self {
        self.extra.push((cmd, payload.to_vec()));
        self
    }

    fn segment_size(&self) -> usize {
        if self.is_64 {
            72 + 2 * 80
        } else {
            56 + 2 * 68
        }
    }

    fn dylib_size(path: &str) -> usize {
        align(24 + path.len() + 1, 8)
    }

    pub fn layout(&self) -> Layout {
        let header_size = if self.is_64 { 32 } else { 28 };
        let sizeofcmds = self.segment_size()
            + self.dylibs.iter().map(|(_, p, _)| Self::dylib_size(p)).sum::<usize>()
            + self.extra.iter().map(|(_, p)| align(8 + p.len(), 8)).sum::<usize>();
        let text_offset = align(header_size + sizeofcmds, 16);
        let cstring_offset = text_offset + TEXT_BYTES.len();
        Layout {
            header_size,
            sizeofcmds,
            ncmds: 1 + self.dylibs.len() + self.extra.len(),
            text_offset,
            cstring_offset,
            total: align(cstring_offset + self.cstrings.len(), 16),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let layout = self.layout();
        let mut buf = Vec::with_capacity(layout.total);

        let magic = if self.is_64 { MH_MAGIC_64 } else { MH_MAGIC };
        for value in [
            magic,
            self.cputype,
            3,
            self.filetype,
            layout.ncmds as u32,
            layout.sizeofcmds as u32,
            0x0020_0085,
        ] {
            self.word(&mut buf, value);
        }
        if self.is_64 {
            self.word(&mut buf, 0);
        }

        // __TEXT segment
        let sections = [
            ("__text", layout.text_offset, TEXT_BYTES.len(), 0x8000_0400u32),
            ("__cstring", layout.cstring_offset, self.cstrings.len(), S_CSTRING_LITERALS),
        ];
        if self.is_64 {
            self.word(&mut buf, LC_SEGMENT_64);
            self.word(&mut buf, self.segment_size() as u32);
            buf.extend_from_slice(&name16("__TEXT"));
            self.quad(&mut buf, 0x1_0000_0000);
            self.quad(&mut buf, layout.total as u64);
            self.quad(&mut buf, 0);
            self.quad(&mut buf, layout.total as u64);
            for value in [5, 5, 2, 0] {
                self.word(&mut buf, value);
            }
            for (name, offset, size, flags) in sections {
                buf.extend_from_slice(&name16(name));
                buf.extend_from_slice(&name16("__TEXT"));
                self.quad(&mut buf, 0x1_0000_0000u64 + offset as u64);
                self.quad(&mut buf, size as u64);
                for value in [offset as u32, 0, 0, 0, flags, 0, 0, 0] {
                    self.word(&mut buf, value);
                }
            }
        } else {
            self.word(&mut buf, LC_SEGMENT);
            self.word(&mut buf, self.segment_size() as u32);
            buf.extend_from_slice(&name16("__TEXT"));
            for value in [0x1000, layout.total as u32, 0, layout.total as u32, 5, 5, 2, 0] {
                self.word(&mut buf, value);
            }
            for (name, offset, size, flags) in sections {
                buf.extend_from_slice(&name16(name));
                buf.extend_from_slice(&name16("__TEXT"));
                for value in [0x1000 + offset as u32, size as u32, offset as u32, 0, 0, 0, flags, 0, 0] {
                    self.word(&mut buf, value);
                }
            }
        }

        for (cmd, path, version) in &self.dylibs {
            let start = buf.len();
            let size = Self::dylib_size(path);
            for value in [*cmd, size as u32, 24, 2, *version, 0x0001_0000] {
                self.word(&mut buf, value);
            }
            buf.extend_from_slice(path.as_bytes());
            buf.resize(start + size, 0);
        }

        for (cmd, payload) in &self.extra {
            let start = buf.len();
            let size = align(8 + payload.len(), 8);
            self.word(&mut buf, *cmd);
            self.word(&mut buf, size as u32);
            buf.extend_from_slice(payload);
            buf.resize(start + size, 0);
        }

        assert_eq!(buf.len(), layout.header_size + layout.sizeofcmds);
        buf.resize(layout.text_offset, 0);
        buf.extend_from_slice(&TEXT_BYTES);
        buf.extend_from_slice(&self.cstrings);
        buf.resize(layout.total, 0);
        buf
    }
}

/// Absolute offset of each slice `fat` places.
pub fn fat_offsets(slices: &[Vec<u8>]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(slices.len());
    let mut next = FAT_ALIGN;
    for slice in slices {
        offsets.push(next);
        next = align(next + slice.len(), FAT_ALIGN);
    }
    offsets
}

/// Wrap images in a 32-bit fat container, each slice page aligned.
pub fn fat(slices: &[(u32, Vec<u8>)]) -> Vec<u8> {
    wrap_fat(slices, false)
}

/// Same layout as [`fat`] with a `fat_arch_64` table.
pub fn fat64(slices: &[(u32, Vec<u8>)]) -> Vec<u8> {
    wrap_fat(slices, true)
}

fn wrap_fat(slices: &[(u32, Vec<u8>)], wide: bool) -> Vec<u8> {
    let images: Vec<Vec<u8>> = slices.iter().map(|(_, image)| image.clone()).collect();
    let offsets = fat_offsets(&images);

    let mut buf = Vec::new();
    let magic = if wide { FAT_MAGIC_64 } else { FAT_MAGIC };
    buf.extend_from_slice(&magic.to_be_bytes());
    buf.extend_from_slice(&(slices.len() as u32).to_be_bytes());
    for ((cputype, image), offset) in slices.iter().zip(&offsets) {
        buf.extend_from_slice(&cputype.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        if wide {
            buf.extend_from_slice(&(*offset as u64).to_be_bytes());
            buf.extend_from_slice(&(image.len() as u64).to_be_bytes());
            buf.extend_from_slice(&12u32.to_be_bytes());
            buf.extend_from_slice(&0u32.to_be_bytes());
        } else {
            for value in [*offset as u32, image.len() as u32, 12] {
                buf.extend_from_slice(&value.to_be_bytes());
            }
        }
    }
    for (image, offset) in images.iter().zip(&offsets) {
        buf.resize(*offset, 0);
        buf.extend_from_slice(image);
    }
    buf
}

/// The `ls`-like test subject: an executable linking three libraries with
/// `bin/ls` first in its C string section.
pub fn ls_like(cputype: u32) -> ImageBuilder {
    ImageBuilder::new(cputype, MH_EXECUTE)
        .dylib(LC_LOAD_DYLIB, "/usr/lib/libutil.dylib", 0x0001_0000)
        .dylib(LC_LOAD_DYLIB, "/usr/lib/libncurses.5.4.dylib", 0x0005_0400)
        .dylib(LC_LOAD_DYLIB, LIBSYSTEM, 0x0527_0000)
        .cstrings(&["bin/ls", "Unix2003", "usage: ls [-@ABCFGHILOPRSTUWabcdefghiklmnopqrstuvwxy1%,] [--color=when] [-D format] [file ...]\n"])
}
