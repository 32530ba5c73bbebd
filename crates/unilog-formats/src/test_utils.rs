//! Test utilities for format round-trip testing
//!
//! This module provides shared test utilities and sample structures used
//! across the uuidtext and tracev3 test modules.

use crate::UnifiedLogFormat;
use crate::tracev3::{
    Catalog, CatalogSubChunk, ChunkTag, Chunkset, HeaderChunk, ProcessInfoEntry, SubsystemEntry,
    TraceV3Builder, TraceV3File, UuidInfoEntry,
};
use std::fmt::Debug;
use uuid::Uuid;

/// Test round-trip serialization for a format instance
///
/// Verifies that a format can be serialized and deserialized back
/// to an equivalent value.
pub fn test_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: UnifiedLogFormat + PartialEq + Debug,
{
    let data = original.build()?;
    let parsed = T::parse(&data)?;

    if original != &parsed {
        return Err(format!(
            "Round-trip verification failed:\nOriginal: {:?}\nParsed: {:?}",
            original, parsed
        )
        .into());
    }

    Ok(())
}

/// Test round-trip with existing binary data
///
/// Verifies that binary data can be parsed, rebuilt, and reparsed
/// to produce equivalent results.
pub fn test_round_trip_with_data<T>(data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: UnifiedLogFormat + PartialEq + Debug,
{
    let parsed = T::parse(data)?;
    let rebuilt = parsed.build()?;
    let reparsed = T::parse(&rebuilt)?;

    if parsed != reparsed {
        return Err(format!(
            "Round-trip with data failed:\nParsed: {:?}\nReparsed: {:?}",
            parsed, reparsed
        )
        .into());
    }

    Ok(())
}

/// Test that parsing invalid data fails appropriately
pub fn test_invalid_data_rejected<T>(invalid_data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: UnifiedLogFormat,
{
    match T::parse(invalid_data) {
        Ok(_) => Err("Expected parsing to fail for invalid data, but it succeeded".into()),
        Err(_) => Ok(()),
    }
}

/// UUID used as the main image of the sample process
pub const MAIN_UUID: Uuid = Uuid::from_bytes([
    0x3B, 0x8C, 0x2E, 0x5A, 0x1F, 0x6D, 0x4C, 0x2B, 0x9A, 0x0E, 0x7D, 0x51, 0xC4, 0x62, 0x88, 0x10,
]);

/// UUID used as the shared cache of the sample process
pub const DSC_UUID: Uuid = Uuid::from_bytes([
    0xA0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x46, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
]);

/// Catalog with two UUIDs, two strings, one process and one sub-chunk
pub fn sample_catalog() -> Catalog {
    Catalog {
        unknown1: [0; 6],
        earliest_firehose_timestamp: 0x0000_0012_3456_7890,
        uuids: vec![MAIN_UUID, DSC_UUID],
        sub_system_strings: b"com.example.net\0connection\0".to_vec(),
        process_entries: vec![ProcessInfoEntry {
            index: 1,
            unknown1: 0,
            main_uuid_index: 0,
            dsc_uuid_index: 1,
            proc_id_upper: 0x1_0000,
            proc_id_lower: 412,
            pid: 412,
            effective_uid: 501,
            unknown2: 0,
            unknown3: 0,
            uuid_entries: vec![UuidInfoEntry {
                data_size: 0x4000,
                unknown: 0,
                uuid_index: 0,
                load_address: 0x0001_0000_4000,
            }],
            unknown4: 0,
            subsystems: vec![SubsystemEntry {
                identifier: 0x0101,
                subsystem_offset: 0,
                category_offset: 16,
            }],
        }],
        sub_chunks: vec![CatalogSubChunk {
            start_time: 1_000,
            end_time: 9_000,
            uncompressed_size: 4096,
            compression_algorithm: crate::tracev3::COMPRESSION_ALGORITHM_LZ4,
            indexes: vec![0],
            string_offsets: vec![0, 16],
        }],
    }
}

/// Chunkset with two firehose chunks and one oversize chunk
pub fn sample_chunkset() -> Chunkset {
    Chunkset::from_chunks([
        (ChunkTag::Firehose, 0, &b"firehose one"[..]),
        (ChunkTag::Firehose, 0, &b"firehose two"[..]),
        (ChunkTag::Oversize, 0, &[7u8; 40][..]),
    ])
    .unwrap()
}

/// tracev3 file with `chunksets` copies of [`sample_chunkset`] per catalog
///
/// Every group uses [`sample_catalog`]. The header boots from [`MAIN_UUID`].
pub fn sample_tracev3_file(catalogs: usize, chunksets: usize) -> TraceV3File {
    let mut builder = TraceV3Builder::new(HeaderChunk::new(MAIN_UUID));
    for _ in 0..catalogs {
        builder.add_catalog(sample_catalog()).unwrap();
        for _ in 0..chunksets {
            builder.add_chunkset(sample_chunkset()).unwrap();
        }
    }
    builder.build()
}
