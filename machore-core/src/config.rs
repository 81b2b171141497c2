//! Analysis settings.

use crate::sections::Section;
use std::fmt;
use std::str::FromStr;

/// Default room for a dependency path, terminator included.
pub const DEFAULT_PATH_CAPACITY: usize = 256;

/// Names one section by segment and section name, e.g. `__TEXT,__cstring`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionSelector {
    pub segment: String,
    pub section: String,
}

impl SectionSelector {
    pub fn new(segment: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            section: section.into(),
        }
    }

    pub fn matches(&self, section: &Section) -> bool {
        self.segment == section.segment && self.section == section.name
    }
}

impl FromStr for SectionSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(',') {
            Some((segment, section)) if !segment.is_empty() && !section.is_empty() => {
                Ok(SectionSelector::new(segment.trim(), section.trim()))
            }
            _ => Err(format!("expected SEGMENT,SECTION, got {:?}", s)),
        }
    }
}

impl fmt::Display for SectionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.segment, self.section)
    }
}

/// What [`crate::Analysis::parse_with`] extracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Sections scanned for strings, in addition to the flag-based rule below.
    pub string_sections: Vec<SectionSelector>,
    /// Also scan every section typed `S_CSTRING_LITERALS`.
    pub include_cstring_literals: bool,
    /// Capacity of a dependency path, terminator included.
    pub path_capacity: usize,
    /// Keep at most this many strings per slice.
    pub max_strings: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            string_sections: vec![SectionSelector::new("__TEXT", "__cstring")],
            include_cstring_literals: false,
            path_capacity: DEFAULT_PATH_CAPACITY,
            max_strings: None,
        }
    }
}

impl AnalysisConfig {
    pub fn with_string_sections(mut self, sections: Vec<SectionSelector>) -> Self {
        self.string_sections = sections;
        self
    }

    pub fn with_cstring_literals(mut self, include: bool) -> Self {
        self.include_cstring_literals = include;
        self
    }

    pub fn with_path_capacity(mut self, capacity: usize) -> Self {
        self.path_capacity = capacity;
        self
    }

    pub fn with_max_strings(mut self, max: Option<usize>) -> Self {
        self.max_strings = max;
        self
    }

    /// Whether `section` is scanned for strings.
    pub fn qualifies(&self, section: &Section) -> bool {
        (self.include_cstring_literals && section.is_cstring_literals())
            || self.string_sections.iter().any(|sel| sel.matches(section))
    }
}
