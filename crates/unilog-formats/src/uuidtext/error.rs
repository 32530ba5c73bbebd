//! uuidtext error types

use thiserror::Error;

/// uuidtext-specific error type
#[derive(Debug, Error)]
pub enum UuidTextError {
    /// Data too short for the structure being read
    #[error("data too short: got {actual} bytes, minimum is {minimum}")]
    DataTooShort {
        /// Actual data length
        actual: usize,
        /// Minimum required length
        minimum: usize,
    },

    /// File does not start with the uuidtext signature
    #[error("invalid uuidtext signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature {
        /// Expected signature value
        expected: u32,
        /// Signature found in the file
        actual: u32,
    },

    /// Major format version other than 2
    #[error("unsupported uuidtext format version: {major}.{minor}")]
    UnsupportedVersion {
        /// Major format version
        major: u32,
        /// Minor format version
        minor: u32,
    },

    /// Declared entry count differs from the descriptor table
    #[error("entry count mismatch: header declares {declared}, table has {actual}")]
    EntryCountMismatch {
        /// Count stored in the header
        declared: u32,
        /// Number of descriptors present
        actual: usize,
    },

    /// Entry blob length differs from its descriptor
    #[error("entry {index}: descriptor declares {declared} bytes, blob has {actual}")]
    EntrySizeMismatch {
        /// Descriptor index
        index: usize,
        /// Size stored in the descriptor
        declared: u32,
        /// Blob length
        actual: usize,
    },

    /// Entry data declared by the descriptors does not fit the file
    #[error("entry {index}: data overflows file (needs {needed} bytes, {available} available)")]
    EntryDataOverflow {
        /// Descriptor index
        index: usize,
        /// Bytes needed up to the end of this entry
        needed: u64,
        /// Actual data length
        available: usize,
    },

    /// Library path footer is missing its NUL terminator
    #[error("library path footer is not NUL-terminated")]
    UnterminatedFooter,

    /// Format string runs to the end of its entry without a NUL terminator
    #[error("format string at offset {offset:#x} is not NUL-terminated")]
    UnterminatedString {
        /// Virtual offset of the string
        offset: u32,
    },

    /// String data is not valid UTF-8
    #[error("invalid UTF-8 in {context}: {source}")]
    InvalidUtf8 {
        /// Which string failed to decode
        context: &'static str,
        /// Underlying decode error
        source: std::str::Utf8Error,
    },

    /// No entry range covers the requested virtual offset
    #[error("no entry covers format string offset {0:#x}")]
    OffsetNotFound(u32),

    /// Entry ranges overlap, making offset lookups ambiguous
    #[error("entry ranges overlap at offset {0:#x}")]
    OverlappingRanges(u32),

    /// Range runs past the end of the 32-bit offset space
    #[error("range at offset {0:#x} extends past the 32-bit offset space")]
    RangeTooLarge(u32),

    /// uuidtext path does not encode a UUID
    #[error("path does not name a uuidtext file: {0}")]
    InvalidPath(String),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error during parsing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for uuidtext operations
pub type UuidTextResult<T> = Result<T, UuidTextError>;
