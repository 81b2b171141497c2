//! Printable C strings from literal sections.

use crate::config::AnalysisConfig;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::sections::Section;

/// One NUL-terminated printable run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedString {
    pub content: String,
    /// `content.len() + 1`, counting the terminator.
    pub byte_length: usize,
    pub source_segment: String,
    pub source_section: String,
    /// Offset of the first byte from the start of the section.
    pub section_offset: usize,
    /// Offset of the first byte within the whole input buffer.
    pub file_absolute_offset: u64,
}

/// ASCII graphic characters plus space, tab, newline and carriage return.
pub fn is_printable(byte: u8) -> bool {
    byte.is_ascii_graphic() || matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Scan one section. `image` is the architecture slice the section's file
/// offset is relative to.
pub fn scan_section(image: &ByteCursor<'_>, section: &Section) -> Result<Vec<ExtractedString>> {
    if section.is_zerofill() || section.size == 0 {
        return Ok(Vec::new());
    }

    let range = usize::try_from(section.file_offset)
        .ok()
        .zip(usize::try_from(section.size).ok())
        .filter(|&(offset, size)| image.contains(offset, size));
    let Some((offset, size)) = range else {
        return Err(Error::malformed(
            image.absolute(0),
            "section",
            format!(
                "{},{} at {:#x} with size {:#x} lies outside the {}-byte image",
                section.segment,
                section.name,
                section.file_offset,
                section.size,
                image.len()
            ),
        ));
    };
    let window = image.window(offset, size, "section contents")?;

    let mut strings = Vec::new();
    let mut start = 0;
    for (i, &byte) in window.data().iter().enumerate() {
        if byte == 0 {
            if i > start {
                strings.push(make_string(&window, section, start, i));
            }
            start = i + 1;
        } else if !is_printable(byte) {
            start = i + 1;
        }
    }
    if start < window.len() {
        log::debug!(
            "{},{}: dropping unterminated run at section offset {start:#x}",
            section.segment,
            section.name
        );
    }
    Ok(strings)
}

fn make_string(window: &ByteCursor<'_>, section: &Section, start: usize, end: usize) -> ExtractedString {
    // every byte in the run passed is_printable, so it is ASCII
    let content = String::from_utf8_lossy(&window.data()[start..end]).into_owned();
    ExtractedString {
        byte_length: content.len() + 1,
        content,
        source_segment: section.segment.clone(),
        source_section: section.name.clone(),
        section_offset: start,
        file_absolute_offset: window.absolute(start) as u64,
    }
}

/// Scan every qualifying section in section-table order, honouring the
/// configured sample limit.
pub fn scan_strings(
    image: &ByteCursor<'_>,
    sections: &[Section],
    config: &AnalysisConfig,
) -> Result<Vec<ExtractedString>> {
    let mut strings = Vec::new();
    for section in sections.iter().filter(|s| config.qualifies(s)) {
        let found = scan_section(image, section)?;
        log::debug!(
            "{},{}: {} strings",
            section.segment,
            section.name,
            found.len()
        );
        strings.extend(found);
        if let Some(max) = config.max_strings {
            if strings.len() >= max {
                strings.truncate(max);
                break;
            }
        }
    }
    Ok(strings)
}
