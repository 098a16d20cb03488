//! Error types for the page reordering engine.
//!
//! Every stage of the pipeline fails fast with one of these variants. The
//! coarse classification used by callers is available through [`Error::kind`].

/// Result type alias for reordering operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reordering a PDF.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input bytes do not parse as a PDF (header, cross-reference data, trailer or object)
    #[error("Malformed document at byte {offset}: {reason}")]
    MalformedDocument {
        /// Byte offset where the problem was detected
        offset: usize,
        /// What went wrong
        reason: String,
    },

    /// Page tree is cyclic or structurally inconsistent
    #[error("Corrupt page tree: {0}")]
    CorruptPageTree(String),

    /// Descending or otherwise malformed range in the page specification
    #[error("Invalid page range '{range}': {reason}")]
    InvalidRange {
        /// The offending range as written by the caller
        range: String,
        /// Why it was rejected
        reason: String,
    },

    /// A referenced page lies outside [1, page_count]
    #[error("Page {page} is out of bounds (document has {page_count} pages)")]
    PageOutOfBounds {
        /// Offending 1-based page number
        page: u64,
        /// Number of pages in the source document
        page_count: usize,
    },

    /// The page specification references no pages at all
    #[error("Page specification is empty")]
    EmptySpecification,

    /// Internal invariant violated while writing the output
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classification reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input is not a readable PDF
    MalformedDocument,
    /// The page tree cannot be traversed
    CorruptPageTree,
    /// A range in the specification is malformed
    InvalidRange,
    /// A page number is outside the document
    PageOutOfBounds,
    /// The specification is empty
    EmptySpecification,
    /// The output could not be written consistently
    Serialization,
    /// File access failed
    Io,
}

impl Error {
    /// Shorthand for a [`Error::MalformedDocument`] error.
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedDocument {
            offset,
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`Error::InvalidRange`] error.
    pub fn invalid_range(range: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidRange {
            range: range.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedDocument { .. } | Error::Decode(_) | Error::UnsupportedFilter(_) => {
                ErrorKind::MalformedDocument
            },
            Error::CorruptPageTree(_) => ErrorKind::CorruptPageTree,
            Error::InvalidRange { .. } => ErrorKind::InvalidRange,
            Error::PageOutOfBounds { .. } => ErrorKind::PageOutOfBounds,
            Error::EmptySpecification => ErrorKind::EmptySpecification,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedDocument => "MalformedDocumentError",
            ErrorKind::CorruptPageTree => "CorruptPageTreeError",
            ErrorKind::InvalidRange => "InvalidRangeError",
            ErrorKind::PageOutOfBounds => "PageOutOfBoundsError",
            ErrorKind::EmptySpecification => "EmptySpecificationError",
            ErrorKind::Serialization => "SerializationError",
            ErrorKind::Io => "IoError",
        };
        f.write_str(name)
    }
}
