//! Whole-buffer analysis: thin or fat, one [`ArchSlice`] per architecture.

use crate::config::AnalysisConfig;
use crate::container::{ContainerKind, FatArchTable};
use crate::cursor::ByteCursor;
use crate::dylib::{DylibDependency, DYLIB_COMMAND_SIZE};
use crate::error::{Error, Result};
use crate::header::{Architecture, FileType, MachHeader};
use crate::load_command::LoadCommands;
use crate::sections::Section;
use crate::strings::{scan_strings, ExtractedString};

/// One parsed architecture slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchSlice {
    pub architecture: Architecture,
    pub file_type: FileType,
    pub is_64_bit: bool,
    /// Absolute offset of the slice in the input (0 for a thin file).
    pub offset: usize,
    pub size: usize,
    pub load_command_count: u32,
    /// In load command order.
    pub dependencies: Vec<DylibDependency>,
    /// Every section of every segment, in load command order.
    pub sections: Vec<Section>,
    /// In section order, then byte order.
    pub strings: Vec<ExtractedString>,
}

impl ArchSlice {
    /// Parse the Mach-O image that fills `image`.
    pub fn parse(image: &ByteCursor<'_>, config: &AnalysisConfig) -> Result<Self> {
        let header = MachHeader::parse(image)?;
        let architecture = header.architecture();
        let file_type = header.file_type();
        if !architecture.is_known() {
            log::warn!("unknown cpu type {:#x} at {:#x}", header.cputype, image.base());
        }
        if !file_type.is_supported() {
            log::warn!("unsupported file type {:#x} at {:#x}", header.filetype, image.base());
        }

        // sizeofcmds is only trusted once the walker has checked it against the image
        let walker = LoadCommands::new(image, &header)?;
        let dylib_bound = walker
            .remaining_bound()
            .min(header.sizeofcmds as usize / DYLIB_COMMAND_SIZE);
        let mut dependencies = Vec::with_capacity(dylib_bound);
        let mut sections = Vec::new();

        for command in walker {
            let command = command?;
            if let Some(dependency) =
                DylibDependency::decode(&command, image, header.endian, config.path_capacity)?
            {
                log::debug!(
                    "{} {} ({})",
                    command.name(),
                    dependency.path,
                    dependency.version
                );
                dependencies.push(dependency);
            } else if let Some(found) = Section::from_segment_command(&command, header.endian)? {
                sections.extend(found);
            }
        }

        let strings = scan_strings(image, &sections, config)?;

        log::info!(
            "{architecture} {file_type} at {:#x}: {} dependencies, {} sections, {} strings",
            image.base(),
            dependencies.len(),
            sections.len(),
            strings.len()
        );

        Ok(ArchSlice {
            architecture,
            file_type,
            is_64_bit: header.is_64,
            offset: image.base(),
            size: image.len(),
            load_command_count: header.ncmds,
            dependencies,
            sections,
            strings,
        })
    }
}

/// A fat slice that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceFailure {
    /// Position in the fat architecture table.
    pub index: usize,
    /// Absolute offset of the slice's `fat_arch` entry.
    pub entry_offset: usize,
    pub error: Error,
}

/// Result of inspecting one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub container: ContainerKind,
    pub is_multi_architecture: bool,
    /// Successfully parsed slices, in architecture table order.
    pub slices: Vec<ArchSlice>,
    /// Fat slices that failed; the others are still in `slices`.
    pub failures: Vec<SliceFailure>,
}

impl Analysis {
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, &AnalysisConfig::default())
    }

    /// Parse a thin or fat buffer.
    ///
    /// A thin image that fails to parse fails the whole call, as does a bad
    /// fat header or table. Inside a fat container each slice stands alone:
    /// its error lands in [`Analysis::failures`].
    pub fn parse_with(data: &[u8], config: &AnalysisConfig) -> Result<Self> {
        let container = ContainerKind::detect(data)?;
        if !container.is_fat() {
            let slice = ArchSlice::parse(&ByteCursor::new(data), config)?;
            return Ok(Analysis {
                container,
                is_multi_architecture: false,
                slices: vec![slice],
                failures: Vec::new(),
            });
        }

        let table = FatArchTable::parse(data)?;
        let mut slices = Vec::with_capacity(table.len());
        let mut failures = Vec::new();
        for (index, entry) in table.iter().enumerate() {
            let parsed = entry.and_then(|fat| {
                let slice = ArchSlice::parse(&table.slice_view(&fat)?, config)?;
                if Architecture::from_cputype(fat.cputype) != slice.architecture {
                    log::warn!(
                        "fat entry {index} says cputype {:#x}, image says {}",
                        fat.cputype,
                        slice.architecture
                    );
                }
                Ok(slice)
            });
            match parsed {
                Ok(slice) => slices.push(slice),
                Err(error) => {
                    log::warn!("skipping architecture {index}: {error}");
                    failures.push(SliceFailure {
                        index,
                        entry_offset: table.entry_offset(index),
                        error,
                    });
                }
            }
        }

        Ok(Analysis {
            container,
            is_multi_architecture: true,
            slices,
            failures,
        })
    }

    /// True when every slice parsed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn slice(&self, architecture: Architecture) -> Option<&ArchSlice> {
        self.slices.iter().find(|s| s.architecture == architecture)
    }
}
