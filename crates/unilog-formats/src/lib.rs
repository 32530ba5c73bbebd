//! File format parsers and builders for Apple Unified Logging
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many log-system terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate provides symmetric (parser and builder) implementations for the
//! on-disk formats written by Apple's Unified Logging and Activity Tracing
//! subsystem (`logd`).
//!
//! # Supported Formats
//!
//! - **uuidtext**: Per-image format string resources stored under
//!   `/private/var/db/uuidtext/XX/...`, keyed by the image UUID
//! - **tracev3**: Chunked trace files stored under
//!   `/private/var/db/diagnostics/`, made of a header chunk followed by
//!   catalog chunks and LZ4-compressed chunksets
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: Both parsing and building supported
//! - **Bounds Checked**: Every declared offset and size is validated against
//!   the containing buffer before it is used
//! - **Type Safety**: Use Rust's type system to enforce invariants
//! - **Round-Trip Guarantee**: parse(build(data)) == data

#![warn(missing_docs)]

/// tracev3 trace file format
///
/// This module provides parsing and building support for tracev3 files,
/// the chunked containers `logd` writes log and activity data into.
///
/// Key features:
/// - **Chunk Walking**: 16-byte chunk envelopes with 8-byte alignment
/// - **Catalog Resolution**: UUID, process and subsystem lookups by index
/// - **LZ4 Chunksets**: `bv41` block decompression and compression
/// - **Header Chunk**: Timebase, boot UUID, build and timezone information
///
/// See the [`tracev3`] module for the layout of each structure.
pub mod tracev3;
/// uuidtext format string resource files
///
/// This module provides parsing and building support for uuidtext files,
/// which map virtual string offsets of an image to the format strings it
/// logs with, plus the path of the image itself.
///
/// See the [`uuidtext`] module for detailed usage examples.
pub mod uuidtext;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

/// Common format trait that all top-level file formats implement
pub trait UnifiedLogFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
