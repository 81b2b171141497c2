//! Load command table walking.
//!
//! A Mach-O header is followed by `ncmds` variable-length records, each
//! starting with `(cmd, cmdsize)`. The sizes come from the file, so the
//! walker checks every one of them before moving on.

use crate::cursor::{ByteCursor, Endian};
use crate::error::{Error, Result};
use crate::header::MachHeader;
use goblin::mach::load_command::cmd_to_str;

/// `struct load_command`: cmd + cmdsize.
pub const LOAD_COMMAND_SIZE: usize = 8;

/// One load command as a bounded view of its bytes.
#[derive(Debug, Clone)]
pub struct LoadCommand<'a> {
    /// Position in the command table.
    pub index: usize,
    pub cmd: u32,
    /// Offset of the command from the start of the image.
    pub offset: usize,
    /// Exactly `cmdsize` bytes, starting at the `cmd` field.
    pub data: ByteCursor<'a>,
}

impl LoadCommand<'_> {
    pub fn cmdsize(&self) -> usize {
        self.data.len()
    }

    pub fn name(&self) -> &'static str {
        cmd_to_str(self.cmd)
    }

    /// Absolute file offset of the command.
    pub fn file_offset(&self) -> usize {
        self.data.base()
    }
}

/// Walks the load command table of one image.
///
/// The walk is lazy and stops for good after the first error. Create a
/// new walker to go over the table again.
#[derive(Debug, Clone)]
pub struct LoadCommands<'a> {
    image: ByteCursor<'a>,
    endian: Endian,
    next_offset: usize,
    table_start: usize,
    table_end: usize,
    total: usize,
    index: usize,
    done: bool,
}

impl<'a> LoadCommands<'a> {
    pub fn new(image: &ByteCursor<'a>, header: &MachHeader) -> Result<Self> {
        let table_start = header.size();
        let table_end = table_start
            .checked_add(header.sizeofcmds as usize)
            .filter(|&end| end <= image.len())
            .ok_or_else(|| {
                Error::malformed(
                    image.absolute(table_start),
                    "load command table",
                    format!(
                        "sizeofcmds {:#x} runs past the {}-byte image",
                        header.sizeofcmds,
                        image.len()
                    ),
                )
            })?;

        Ok(Self {
            image: image.clone(),
            endian: header.endian,
            next_offset: table_start,
            table_start,
            table_end,
            total: header.ncmds as usize,
            index: 0,
            done: false,
        })
    }

    /// Upper bound on the commands still to come, from the declared count
    /// and the room left in the table.
    pub fn remaining_bound(&self) -> usize {
        if self.done {
            return 0;
        }
        let by_count = self.total - self.index;
        let by_size = (self.table_end - self.next_offset) / LOAD_COMMAND_SIZE;
        by_count.min(by_size)
    }

    fn fail(&mut self, err: Error) -> Option<Result<LoadCommand<'a>>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for LoadCommands<'a> {
    type Item = Result<LoadCommand<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.index == self.total {
            self.done = true;
            let consumed = self.next_offset - self.table_start;
            let declared = self.table_end - self.table_start;
            if consumed != declared {
                log::warn!(
                    "load commands at {:#x} use {consumed:#x} of {declared:#x} declared bytes",
                    self.image.absolute(self.table_start)
                );
            }
            return None;
        }

        let offset = self.next_offset;
        if offset + LOAD_COMMAND_SIZE > self.table_end {
            let err = Error::malformed(
                self.image.absolute(offset),
                "load command",
                format!(
                    "command {} of {} starts past the end of the command table",
                    self.index, self.total
                ),
            );
            return self.fail(err);
        }

        let header = (
            self.image.u32_at(offset, self.endian, "load command cmd"),
            self.image.u32_at(offset + 4, self.endian, "load command cmdsize"),
        );
        let (cmd, cmdsize) = match header {
            (Ok(cmd), Ok(cmdsize)) => (cmd, cmdsize as usize),
            (Err(err), _) | (_, Err(err)) => return self.fail(err),
        };

        if cmdsize < LOAD_COMMAND_SIZE {
            let err = Error::malformed(
                self.image.absolute(offset),
                "load command",
                format!("cmdsize {cmdsize} of {} is below the {LOAD_COMMAND_SIZE}-byte minimum", cmd_to_str(cmd)),
            );
            return self.fail(err);
        }
        if cmdsize > self.table_end - offset {
            let err = Error::malformed(
                self.image.absolute(offset),
                "load command",
                format!(
                    "cmdsize {cmdsize:#x} of {} runs past the end of the command table",
                    cmd_to_str(cmd)
                ),
            );
            return self.fail(err);
        }

        let data = match self.image.window(offset, cmdsize, "load command") {
            Ok(data) => data,
            Err(err) => return self.fail(err),
        };
        let command = LoadCommand {
            index: self.index,
            cmd,
            offset,
            data,
        };
        log::trace!(
            "{} #{} at {:#x}, {} bytes",
            command.name(),
            command.index,
            command.file_offset(),
            cmdsize
        );

        self.index += 1;
        self.next_offset = offset + cmdsize;
        Some(Ok(command))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        // at most one trailing error on top of what fits in the table
        let by_count = self.total - self.index;
        (0, Some(by_count.min(self.remaining_bound() + 1)))
    }
}

impl std::iter::FusedIterator for LoadCommands<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use goblin::mach::header::{MH_EXECUTE, MH_MAGIC_64};

    fn image(commands: &[(u32, u32)], sizeofcmds: Option<u32>, pad: usize) -> Vec<u8> {
        let body: u32 = commands.iter().map(|(_, size)| size).sum();
        let mut buf = Vec::new();
        for word in [
            MH_MAGIC_64,
            0x0100_0007,
            3,
            MH_EXECUTE,
            commands.len() as u32,
            sizeofcmds.unwrap_or(body),
            0,
            0,
        ] {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        for (cmd, size) in commands {
            let start = buf.len();
            buf.extend_from_slice(&cmd.to_le_bytes());
            buf.extend_from_slice(&size.to_le_bytes());
            buf.resize(start + (*size as usize).max(8), 0);
        }
        buf.resize(buf.len() + pad, 0);
        buf
    }

    fn walk(data: &[u8]) -> Vec<Result<LoadCommand<'_>>> {
        let cursor = ByteCursor::new(data);
        let header = MachHeader::parse(&cursor).unwrap();
        LoadCommands::new(&cursor, &header).unwrap().collect()
    }

    #[test]
    fn visits_every_command_in_order() {
        let data = image(&[(0x19, 72), (0xC, 56), (0x2, 24)], None, 0);
        let commands: Vec<_> = walk(&data).into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].cmd, 0x19);
        assert_eq!(commands[1].offset, 32 + 72);
        assert_eq!(commands[2].name(), "LC_SYMTAB");
        let total: usize = commands.iter().map(|c| c.cmdsize()).sum();
        assert_eq!(total, 72 + 56 + 24);
    }

    #[test]
    fn undersized_command_stops_the_walk() {
        let data = image(&[(0xC, 4), (0x2, 24)], Some(32), 0);
        let results = walk(&data);
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap_err().is_malformed());
    }

    #[test]
    fn oversized_command_is_malformed() {
        let mut data = image(&[(0xC, 24)], None, 64);
        // claim a cmdsize far past the table
        data[36..40].copy_from_slice(&0x1000u32.to_le_bytes());
        let results = walk(&data);
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap_err().is_malformed());
    }

    #[test]
    fn count_larger_than_table_is_malformed() {
        let mut data = image(&[(0x2, 24)], None, 0);
        data[16..20].copy_from_slice(&9u32.to_le_bytes());
        let results = walk(&data);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_malformed());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn sizeofcmds_past_image_is_rejected() {
        let data = image(&[(0x2, 24)], Some(0x10000), 0);
        let cursor = ByteCursor::new(&data);
        let header = MachHeader::parse(&cursor).unwrap();
        assert!(LoadCommands::new(&cursor, &header).unwrap_err().is_malformed());
    }

    #[test]
    fn walk_is_repeatable() {
        let data = image(&[(0x2, 24), (0x1B, 24)], None, 0);
        let cursor = ByteCursor::new(&data);
        let header = MachHeader::parse(&cursor).unwrap();
        let walker = LoadCommands::new(&cursor, &header).unwrap();
        let first: Vec<u32> = walker.clone().map(|c| c.unwrap().cmd).collect();
        let second: Vec<u32> = walker.map(|c| c.unwrap().cmd).collect();
        assert_eq!(first, vec![0x2, 0x1B]);
        assert_eq!(first, second);
    }
}
