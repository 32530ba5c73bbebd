//! tracev3 format implementation
//!
//! `logd` writes log and activity data into tracev3 files under
//! `/private/var/db/diagnostics/{Persist,Special,Signpost,HighVolume}`. A file
//! is a flat sequence of chunks sharing one 16-byte envelope.
//!
//! # Format Structure
//!
//! ```text
//! tracev3:
//! ├── Header chunk (0x1000, 208 bytes)
//! │   ├── mach timebase, continuous and wall time, timezone bias
//! │   └── sub-structures 0x6100 0x6101 0x6102 0x6103
//! ├── Catalog chunk (0x600b)
//! │   └── UUIDs, subsystem strings, processes, sub-chunk descriptors
//! ├── Chunkset chunk (0x600d)
//! │   └── LZ4 block stream ("bv41" / "bv4-" ... "bv4$")
//! │       └── Decompressed: firehose 0x6001, oversize 0x6002,
//! │           statedump 0x6003, simpledump 0x6004 chunks
//! ├── Chunkset chunk ...
//! ├── Catalog chunk ...
//! └── ...
//! ```
//!
//! Chunk envelope, little-endian:
//!
//! ```text
//! chunk_tag (u32) | chunk_sub_tag (u32) | chunk_data_size (u32) | unknown1 (u32)
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use unilog_formats::tracev3::TraceV3File;
//!
//! let data = std::fs::read("0000000000000001.tracev3")?;
//! let file = TraceV3File::parse(&data)?;
//!
//! println!("boot {}", file.header.boot_uuid());
//! for group in &file.catalogs {
//!     for process in &group.catalog.process_entries {
//!         println!("pid {} main {}", process.pid, process.main_uuid(&group.catalog)?);
//!     }
//! }
//! for (tag, count) in file.chunk_counts()? {
//!     println!("{tag}: {count}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod catalog;
mod chunk;
/// tracev3 error types
pub mod error;
mod file;
mod header;
mod lz4;

pub use catalog::{
    CATALOG_HEADER_SIZE, COMPRESSION_ALGORITHM_LZ4, Catalog, CatalogHeader, CatalogSubChunk,
    ProcessInfoEntry, SubsystemEntry, SubsystemInfo, UUID_SIZE, UuidInfoEntry,
};
pub use chunk::{
    CHUNK_ALIGNMENT, CHUNK_HEADER_SIZE, ChunkHeader, ChunkIter, ChunkTag, DEFAULT_SUB_TAG,
    RawChunk, align_chunk, write_chunk,
};
pub use error::{TraceV3Error, TraceV3Result};
pub use file::{CatalogGroup, Chunkset, TraceV3Builder, TraceV3File, UnknownChunk};
pub use header::{
    CONTINUOUS_TIME_TAG, ContinuousTimeInfo, GENERATION_TAG, GenerationInfo, HEADER_CHUNK_SIZE,
    HeaderChunk, SYSTEM_INFO_TAG, SystemInfo, TIMEZONE_TAG, TimezoneInfo,
};
pub use lz4::{
    LZ4_BLOCK_HEADER_SIZE, LZ4_COMPRESSED_SIGNATURE, LZ4_END_OF_STREAM_SIGNATURE,
    LZ4_UNCOMPRESSED_SIGNATURE, Lz4BlockHeader, MAX_DECOMPRESSED_SIZE, compress_chunkset,
    decompress_chunkset, store_chunkset,
};
