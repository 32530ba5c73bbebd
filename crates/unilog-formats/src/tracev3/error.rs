//! tracev3 error types

use thiserror::Error;

/// tracev3-specific error type
#[derive(Debug, Error)]
pub enum TraceV3Error {
    /// Data too short for the structure being read
    #[error("{structure}: data too short, got {actual} bytes, minimum is {minimum}")]
    DataTooShort {
        /// Structure being read
        structure: &'static str,
        /// Actual data length
        actual: usize,
        /// Minimum required length
        minimum: usize,
    },

    /// Chunk data extends past the end of the buffer
    #[error("chunk {tag:#06x} at offset {offset:#x}: data size {data_size} overflows buffer of {available} bytes")]
    ChunkOverflow {
        /// Chunk tag
        tag: u32,
        /// Offset of the chunk header
        offset: usize,
        /// Declared chunk data size
        data_size: u32,
        /// Buffer length
        available: usize,
    },

    /// A chunk appeared where it is not allowed
    #[error("unexpected chunk {tag:#06x} at offset {offset:#x}: {reason}")]
    UnexpectedChunk {
        /// Chunk tag
        tag: u32,
        /// Offset of the chunk header
        offset: usize,
        /// Why the chunk is not allowed here
        reason: &'static str,
    },

    /// Unknown LZ4 block signature
    #[error("invalid LZ4 block signature {0:02x?} at offset {1:#x}")]
    InvalidBlockSignature([u8; 4], usize),

    /// Chunkset block stream ended without the `bv4$` marker
    #[error("chunkset is missing its end-of-stream marker")]
    MissingEndMarker,

    /// Sub-structure tag or size in the header chunk is wrong
    #[error("header chunk {field}: expected {expected:#x}, got {actual:#x}")]
    InvalidHeaderField {
        /// Which sub-structure field
        field: &'static str,
        /// Expected value
        expected: u32,
        /// Value found
        actual: u32,
    },

    /// Declared offset lies outside the containing structure
    #[error("{field} offset {offset} exceeds {limit} available bytes")]
    OffsetOutOfBounds {
        /// Offset field name
        field: &'static str,
        /// Declared offset
        offset: usize,
        /// Size of the containing region
        limit: usize,
    },

    /// Region bounded by two offsets would have negative length
    #[error("{region} region inverted: starts at {start}, ends at {end}")]
    InvertedRegion {
        /// Region name
        region: &'static str,
        /// Start offset
        start: usize,
        /// End offset
        end: usize,
    },

    /// UUID table length is not a whole number of UUIDs
    #[error("UUID table size {0} is not a multiple of 16")]
    MisalignedUuidTable(u16),

    /// String is missing its NUL terminator
    #[error("string at offset {0} is not NUL-terminated")]
    UnterminatedString(usize),

    /// Index into a catalog table is out of range
    #[error("{table} index {index} out of range ({len} entries)")]
    IndexOutOfRange {
        /// Table name
        table: &'static str,
        /// Requested index
        index: usize,
        /// Table length
        len: usize,
    },

    /// Structure too large to encode in its 16- or 32-bit fields
    #[error("{field} value {value} does not fit its on-disk field")]
    FieldOverflow {
        /// Field name
        field: &'static str,
        /// Value that does not fit
        value: usize,
    },

    /// LZ4 decompression or compression failure
    #[error("LZ4 error: {0}")]
    Compression(String),

    /// Decoded size differs from the declared size
    #[error("{context}: declared {declared} bytes, got {actual}")]
    SizeMismatch {
        /// What was being decoded
        context: &'static str,
        /// Declared size
        declared: usize,
        /// Actual size
        actual: usize,
    },

    /// Decompressed output exceeds the configured limit
    #[error("decompressed chunkset exceeds limit of {0} bytes")]
    SizeLimitExceeded(usize),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error during parsing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tracev3 operations
pub type TraceV3Result<T> = Result<T, TraceV3Error>;
