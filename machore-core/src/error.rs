//! Error types for Mach-O container parsing.

use thiserror::Error;

/// Errors produced while interpreting a Mach-O buffer.
///
/// Every offset carried by an error is absolute within the buffer handed to
/// [`crate::Analysis::parse`], not relative to an architecture slice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The buffer ends before the structure being read does.
    #[error(
        "truncated input: {context} at offset {offset:#x} needs {needed} bytes, only {available} available"
    )]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
        context: &'static str,
    },

    /// A declared offset, size or count points outside the buffer, or a
    /// format marker matches no known variant.
    #[error("malformed {structure} at offset {offset:#x}: {reason}")]
    MalformedContainer {
        offset: usize,
        structure: &'static str,
        reason: String,
    },

    /// A recognised structure uses a variant this crate does not decode.
    ///
    /// Architecture and file-type codes never produce this; they surface as
    /// `Unknown`/`Unsupported` values instead.
    #[error("unsupported {what}: {value:#x}")]
    UnsupportedVariant { what: &'static str, value: u64 },
}

impl Error {
    pub fn truncated(offset: usize, needed: usize, available: usize, context: &'static str) -> Self {
        Self::TruncatedInput {
            offset,
            needed,
            available,
            context,
        }
    }

    pub fn malformed(offset: usize, structure: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedContainer {
            offset,
            structure,
            reason: reason.into(),
        }
    }

    /// Returns true for [`Error::MalformedContainer`].
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedContainer { .. })
    }

    /// Returns true for [`Error::TruncatedInput`].
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
