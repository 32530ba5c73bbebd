//! tracev3 catalog chunk
//!
//! A catalog chunk (tag 0x600b) precedes the chunksets it describes and
//! indexes everything their firehose records refer to by number: image UUIDs,
//! subsystem and category strings, and the processes that logged.
//!
//! ```text
//! Catalog chunk data:
//! ├── Fixed part (24 bytes, little-endian)
//! │   ├── sub_system_strings_offset (u16)
//! │   ├── process_information_entries_offset (u16)
//! │   ├── number_of_process_information_entries (u16)
//! │   ├── sub_chunks_offset (u16)
//! │   ├── number_of_sub_chunks (u16)
//! │   ├── unknown1 ([u8; 6])
//! │   └── earliest_firehose_timestamp (u64)
//! └── Data area (offsets above are relative to its start)
//!     ├── [0, sub_system_strings_offset)          UUIDs, 16 bytes each, big-endian
//!     ├── [sub_system_strings_offset,
//!     │    process_information_entries_offset)    NUL-terminated ASCII strings
//!     ├── process_information_entries_offset      process information entries
//!     └── sub_chunks_offset                       sub-chunk descriptors
//! ```

use super::error::{TraceV3Error, TraceV3Result};
use binrw::{BinRead, BinWrite};
use std::borrow::Cow;
use std::io::Cursor;
use uuid::Uuid;

/// Size of the fixed catalog part
pub const CATALOG_HEADER_SIZE: usize = 24;

/// Size of one UUID in the UUID table
pub const UUID_SIZE: usize = 16;

/// Sub-chunk compression algorithm value for LZ4
pub const COMPRESSION_ALGORITHM_LZ4: u32 = 0x100;

const PROCESS_ENTRY_FIXED_SIZE: usize = 40;
const UUID_INFO_ENTRY_SIZE: usize = 16;
const SUBSYSTEM_ENTRY_SIZE: usize = 6;
const SUB_CHUNK_FIXED_SIZE: usize = 28;
const ENTRY_ALIGNMENT: usize = 8;

/// Fixed part of a catalog chunk (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct CatalogHeader {
    /// Offset of the subsystem string table, also the UUID table size
    pub sub_system_strings_offset: u16,

    /// Offset of the first process information entry
    pub process_information_entries_offset: u16,

    /// Number of process information entries
    pub number_of_process_information_entries: u16,

    /// Offset of the first sub-chunk descriptor
    pub sub_chunks_offset: u16,

    /// Number of sub-chunk descriptors
    pub number_of_sub_chunks: u16,

    /// Unknown, preserved verbatim
    pub unknown1: [u8; 6],

    /// Continuous time of the earliest firehose record covered
    pub earliest_firehose_timestamp: u64,
}

impl CatalogHeader {
    /// Parse the fixed part from the start of catalog chunk data
    pub fn parse(data: &[u8]) -> TraceV3Result<Self> {
        if data.len() < CATALOG_HEADER_SIZE {
            return Err(TraceV3Error::DataTooShort {
                structure: "catalog",
                actual: data.len(),
                minimum: CATALOG_HEADER_SIZE,
            });
        }
        Ok(Self::read(&mut Cursor::new(&data[..CATALOG_HEADER_SIZE]))?)
    }

    /// Build the fixed part to bytes
    pub fn build(&self) -> TraceV3Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(CATALOG_HEADER_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Number of UUIDs in the UUID table
    pub fn number_of_uuids(&self) -> usize {
        self.sub_system_strings_offset as usize / UUID_SIZE
    }

    /// Length of the subsystem string region
    ///
    /// Negative when the offsets are inverted; [`Self::validate`] rejects that.
    pub fn sub_system_strings_size(&self) -> i32 {
        i32::from(self.process_information_entries_offset) - i32::from(self.sub_system_strings_offset)
    }

    /// Check the offsets against a data area of `area_size` bytes
    pub fn validate(&self, area_size: usize) -> TraceV3Result<()> {
        for (field, offset) in [
            ("sub_system_strings", self.sub_system_strings_offset),
            ("process_information_entries", self.process_information_entries_offset),
            ("sub_chunks", self.sub_chunks_offset),
        ] {
            if offset as usize > area_size {
                return Err(TraceV3Error::OffsetOutOfBounds {
                    field,
                    offset: offset as usize,
                    limit: area_size,
                });
            }
        }

        if self.sub_system_strings_offset as usize % UUID_SIZE != 0 {
            return Err(TraceV3Error::MisalignedUuidTable(self.sub_system_strings_offset));
        }

        if self.sub_system_strings_size() < 0 {
            return Err(TraceV3Error::InvertedRegion {
                region: "sub_system_strings",
                start: self.sub_system_strings_offset as usize,
                end: self.process_information_entries_offset as usize,
            });
        }

        if self.sub_chunks_offset < self.process_information_entries_offset {
            return Err(TraceV3Error::InvertedRegion {
                region: "process_information_entries",
                start: self.process_information_entries_offset as usize,
                end: self.sub_chunks_offset as usize,
            });
        }

        Ok(())
    }
}

/// Image loaded by a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UuidInfoEntry {
    /// Size of the image's text range
    pub data_size: u32,

    /// Unknown, preserved verbatim
    pub unknown: u32,

    /// Index into the catalog UUID table
    pub uuid_index: u16,

    /// Load address (48 bits on disk)
    pub load_address: u64,
}

/// Subsystem/category pair used by a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemEntry {
    /// Identifier firehose records use to reference this pair
    pub identifier: u16,

    /// Offset of the subsystem name in the string region
    pub subsystem_offset: u16,

    /// Offset of the category name in the string region
    pub category_offset: u16,
}

/// Process information entry
///
/// ```text
/// u16 index, u16 unknown1, u16 main_uuid_index, u16 dsc_uuid_index
/// u64 proc_id_upper, u32 proc_id_lower, u32 pid, u32 effective_uid, u32 unknown2
/// u32 number_of_uuid_entries, u32 unknown3, [UuidInfoEntry; n] (16 bytes each)
/// u32 number_of_subsystems, u32 unknown4, [SubsystemEntry; n] (6 bytes each)
/// padding to a multiple of 8 bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfoEntry {
    /// Entry index
    pub index: u16,
    /// Unknown, preserved verbatim
    pub unknown1: u16,
    /// UUID table index of the main executable
    pub main_uuid_index: u16,
    /// UUID table index of the shared cache
    pub dsc_uuid_index: u16,
    /// Upper half of the process identifier pair firehose records carry
    pub proc_id_upper: u64,
    /// Lower half of the process identifier pair
    pub proc_id_lower: u32,
    /// Process ID
    pub pid: u32,
    /// Effective user ID
    pub effective_uid: u32,
    /// Unknown, preserved verbatim
    pub unknown2: u32,
    /// Unknown, preserved verbatim
    pub unknown3: u32,
    /// Images loaded by the process
    pub uuid_entries: Vec<UuidInfoEntry>,
    /// Unknown, preserved verbatim
    pub unknown4: u32,
    /// Subsystems the process logs with
    pub subsystems: Vec<SubsystemEntry>,
}

impl ProcessInfoEntry {
    /// Encoded size including padding
    pub fn encoded_size(&self) -> usize {
        let raw = PROCESS_ENTRY_FIXED_SIZE
            + self.uuid_entries.len() * UUID_INFO_ENTRY_SIZE
            + 8
            + self.subsystems.len() * SUBSYSTEM_ENTRY_SIZE;
        raw.next_multiple_of(ENTRY_ALIGNMENT)
    }

    /// UUID of the main executable
    pub fn main_uuid(&self, catalog: &Catalog) -> TraceV3Result<Uuid> {
        catalog.uuid(self.main_uuid_index)
    }

    /// UUID of the shared cache
    pub fn dsc_uuid(&self, catalog: &Catalog) -> TraceV3Result<Uuid> {
        catalog.uuid(self.dsc_uuid_index)
    }

    fn read(reader: &mut ByteReader<'_>) -> TraceV3Result<Self> {
        let start = reader.pos;
        let index = reader.u16()?;
        let unknown1 = reader.u16()?;
        let main_uuid_index = reader.u16()?;
        let dsc_uuid_index = reader.u16()?;
        let proc_id_upper = reader.u64()?;
        let proc_id_lower = reader.u32()?;
        let pid = reader.u32()?;
        let effective_uid = reader.u32()?;
        let unknown2 = reader.u32()?;
        let number_of_uuid_entries = reader.u32()? as usize;
        let unknown3 = reader.u32()?;

        reader.ensure(number_of_uuid_entries.saturating_mul(UUID_INFO_ENTRY_SIZE))?;
        let mut uuid_entries = Vec::with_capacity(number_of_uuid_entries);
        for _ in 0..number_of_uuid_entries {
            let data_size = reader.u32()?;
            let unknown = reader.u32()?;
            let uuid_index = reader.u16()?;
            let load_address = reader.u48()?;
            uuid_entries.push(UuidInfoEntry {
                data_size,
                unknown,
                uuid_index,
                load_address,
            });
        }

        let number_of_subsystems = reader.u32()? as usize;
        let unknown4 = reader.u32()?;

        reader.ensure(number_of_subsystems.saturating_mul(SUBSYSTEM_ENTRY_SIZE))?;
        let mut subsystems = Vec::with_capacity(number_of_subsystems);
        for _ in 0..number_of_subsystems {
            subsystems.push(SubsystemEntry {
                identifier: reader.u16()?,
                subsystem_offset: reader.u16()?,
                category_offset: reader.u16()?,
            });
        }

        reader.align_from(start);

        Ok(Self {
            index,
            unknown1,
            main_uuid_index,
            dsc_uuid_index,
            proc_id_upper,
            proc_id_lower,
            pid,
            effective_uid,
            unknown2,
            unknown3,
            uuid_entries,
            unknown4,
            subsystems,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> TraceV3Result<()> {
        let start = out.len();
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.unknown1.to_le_bytes());
        out.extend_from_slice(&self.main_uuid_index.to_le_bytes());
        out.extend_from_slice(&self.dsc_uuid_index.to_le_bytes());
        out.extend_from_slice(&self.proc_id_upper.to_le_bytes());
        out.extend_from_slice(&self.proc_id_lower.to_le_bytes());
        out.extend_from_slice(&self.pid.to_le_bytes());
        out.extend_from_slice(&self.effective_uid.to_le_bytes());
        out.extend_from_slice(&self.unknown2.to_le_bytes());
        out.extend_from_slice(&count_u32("number_of_uuid_entries", self.uuid_entries.len())?.to_le_bytes());
        out.extend_from_slice(&self.unknown3.to_le_bytes());

        for entry in &self.uuid_entries {
            if entry.load_address >> 48 != 0 {
                return Err(TraceV3Error::FieldOverflow {
                    field: "load_address",
                    value: entry.load_address as usize,
                });
            }
            out.extend_from_slice(&entry.data_size.to_le_bytes());
            out.extend_from_slice(&entry.unknown.to_le_bytes());
            out.extend_from_slice(&entry.uuid_index.to_le_bytes());
            out.extend_from_slice(&entry.load_address.to_le_bytes()[..6]);
        }

        out.extend_from_slice(&count_u32("number_of_subsystems", self.subsystems.len())?.to_le_bytes());
        out.extend_from_slice(&self.unknown4.to_le_bytes());
        for subsystem in &self.subsystems {
            out.extend_from_slice(&subsystem.identifier.to_le_bytes());
            out.extend_from_slice(&subsystem.subsystem_offset.to_le_bytes());
            out.extend_from_slice(&subsystem.category_offset.to_le_bytes());
        }

        out.resize(start + (out.len() - start).next_multiple_of(ENTRY_ALIGNMENT), 0);
        Ok(())
    }
}

/// Sub-chunk descriptor, one per chunkset following the catalog
///
/// ```text
/// u64 start_time, u64 end_time, u32 uncompressed_size, u32 compression_algorithm
/// u32 number_of_indexes, [u16; n] indexes
/// u32 number_of_string_offsets, [u16; n] string_offsets
/// padding to a multiple of 8 bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSubChunk {
    /// Continuous time of the first record in the chunkset
    pub start_time: u64,
    /// Continuous time of the last record in the chunkset
    pub end_time: u64,
    /// Decompressed chunkset size
    pub uncompressed_size: u32,
    /// Compression algorithm, [`COMPRESSION_ALGORITHM_LZ4`] in practice
    pub compression_algorithm: u32,
    /// Process information entries referenced by the chunkset
    pub indexes: Vec<u16>,
    /// Subsystem string offsets referenced by the chunkset
    pub string_offsets: Vec<u16>,
}

impl CatalogSubChunk {
    /// Encoded size including padding
    pub fn encoded_size(&self) -> usize {
        (SUB_CHUNK_FIXED_SIZE + self.indexes.len() * 2 + 4 + self.string_offsets.len() * 2)
            .next_multiple_of(ENTRY_ALIGNMENT)
    }

    fn read(reader: &mut ByteReader<'_>) -> TraceV3Result<Self> {
        let start = reader.pos;
        let start_time = reader.u64()?;
        let end_time = reader.u64()?;
        let uncompressed_size = reader.u32()?;
        let compression_algorithm = reader.u32()?;

        let number_of_indexes = reader.u32()? as usize;
        reader.ensure(number_of_indexes.saturating_mul(2))?;
        let indexes = (0..number_of_indexes)
            .map(|_| reader.u16())
            .collect::<TraceV3Result<Vec<_>>>()?;

        let number_of_string_offsets = reader.u32()? as usize;
        reader.ensure(number_of_string_offsets.saturating_mul(2))?;
        let string_offsets = (0..number_of_string_offsets)
            .map(|_| reader.u16())
            .collect::<TraceV3Result<Vec<_>>>()?;

        reader.align_from(start);

        Ok(Self {
            start_time,
            end_time,
            uncompressed_size,
            compression_algorithm,
            indexes,
            string_offsets,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> TraceV3Result<()> {
        let start = out.len();
        out.extend_from_slice(&self.start_time.to_le_bytes());
        out.extend_from_slice(&self.end_time.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.compression_algorithm.to_le_bytes());
        out.extend_from_slice(&count_u32("number_of_indexes", self.indexes.len())?.to_le_bytes());
        for index in &self.indexes {
            out.extend_from_slice(&index.to_le_bytes());
        }
        out.extend_from_slice(&count_u32("number_of_string_offsets", self.string_offsets.len())?.to_le_bytes());
        for offset in &self.string_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.resize(start + (out.len() - start).next_multiple_of(ENTRY_ALIGNMENT), 0);
        Ok(())
    }
}

/// Resolved subsystem and category names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemInfo<'a> {
    /// Subsystem name, e.g. `com.apple.network`
    pub subsystem: Cow<'a, str>,
    /// Category name, e.g. `connection`
    pub category: Cow<'a, str>,
}

/// Decoded catalog chunk
///
/// Offsets and counts are not stored; [`Catalog::header`] derives them from
/// the contents when the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Unknown bytes of the fixed part
    pub unknown1: [u8; 6],
    /// Continuous time of the earliest firehose record covered
    pub earliest_firehose_timestamp: u64,
    /// UUID table
    pub uuids: Vec<Uuid>,
    /// Raw subsystem string region (NUL-terminated strings)
    pub sub_system_strings: Vec<u8>,
    /// Process information entries
    pub process_entries: Vec<ProcessInfoEntry>,
    /// Sub-chunk descriptors
    pub sub_chunks: Vec<CatalogSubChunk>,
}

impl Catalog {
    /// Parse catalog chunk data (without the chunk envelope)
    pub fn parse(data: &[u8]) -> TraceV3Result<Self> {
        Ok(Self::parse_with_header(data)?.1)
    }

    /// Parse catalog chunk data, also returning the fixed part as stored
    pub fn parse_with_header(data: &[u8]) -> TraceV3Result<(CatalogHeader, Self)> {
        let header = CatalogHeader::parse(data)?;
        let area = &data[CATALOG_HEADER_SIZE..];
        header.validate(area.len())?;

        let strings_start = header.sub_system_strings_offset as usize;
        let processes_start = header.process_information_entries_offset as usize;
        let sub_chunks_start = header.sub_chunks_offset as usize;

        let uuids = area[..strings_start]
            .chunks_exact(UUID_SIZE)
            .map(|raw| {
                let mut bytes = [0u8; UUID_SIZE];
                bytes.copy_from_slice(raw);
                Uuid::from_bytes(bytes)
            })
            .collect();

        let sub_system_strings = area[strings_start..processes_start].to_vec();

        let mut reader = ByteReader::new(&area[processes_start..sub_chunks_start], "process information entry");
        let process_entries = (0..header.number_of_process_information_entries)
            .map(|_| ProcessInfoEntry::read(&mut reader))
            .collect::<TraceV3Result<Vec<_>>>()?;

        let mut reader = ByteReader::new(&area[sub_chunks_start..], "catalog sub-chunk");
        let sub_chunks = (0..header.number_of_sub_chunks)
            .map(|_| CatalogSubChunk::read(&mut reader))
            .collect::<TraceV3Result<Vec<_>>>()?;

        tracing::debug!(
            uuids = header.number_of_uuids(),
            processes = process_entries.len(),
            sub_chunks = sub_chunks.len(),
            "parsed catalog"
        );

        let catalog = Self {
            unknown1: header.unknown1,
            earliest_firehose_timestamp: header.earliest_firehose_timestamp,
            uuids,
            sub_system_strings,
            process_entries,
            sub_chunks,
        };
        Ok((header, catalog))
    }

    /// Derive the fixed part from the contents
    pub fn header(&self) -> TraceV3Result<CatalogHeader> {
        let strings_start = self.uuids.len() * UUID_SIZE;
        let processes_start = strings_start + self.sub_system_strings.len();
        let sub_chunks_start = processes_start
            + self
                .process_entries
                .iter()
                .map(ProcessInfoEntry::encoded_size)
                .sum::<usize>();

        Ok(CatalogHeader {
            sub_system_strings_offset: offset_u16("sub_system_strings", strings_start)?,
            process_information_entries_offset: offset_u16("process_information_entries", processes_start)?,
            number_of_process_information_entries: offset_u16(
                "number_of_process_information_entries",
                self.process_entries.len(),
            )?,
            sub_chunks_offset: offset_u16("sub_chunks", sub_chunks_start)?,
            number_of_sub_chunks: offset_u16("number_of_sub_chunks", self.sub_chunks.len())?,
            unknown1: self.unknown1,
            earliest_firehose_timestamp: self.earliest_firehose_timestamp,
        })
    }

    /// Build catalog chunk data (without the chunk envelope)
    pub fn build(&self) -> TraceV3Result<Vec<u8>> {
        let header = self.header()?;
        let mut out = header.build()?;

        for uuid in &self.uuids {
            out.extend_from_slice(uuid.as_bytes());
        }
        out.extend_from_slice(&self.sub_system_strings);
        for entry in &self.process_entries {
            entry.write(&mut out)?;
        }
        for sub_chunk in &self.sub_chunks {
            sub_chunk.write(&mut out)?;
        }
        Ok(out)
    }

    /// UUID at a table index
    pub fn uuid(&self, index: u16) -> TraceV3Result<Uuid> {
        self.uuids
            .get(index as usize)
            .copied()
            .ok_or(TraceV3Error::IndexOutOfRange {
                table: "uuids",
                index: index as usize,
                len: self.uuids.len(),
            })
    }

    /// NUL-terminated string starting at an offset of the string region
    pub fn string_at(&self, offset: u16) -> TraceV3Result<Cow<'_, str>> {
        let rest = self
            .sub_system_strings
            .get(offset as usize..)
            .filter(|rest| !rest.is_empty())
            .ok_or(TraceV3Error::OffsetOutOfBounds {
                field: "sub_system_string",
                offset: offset as usize,
                limit: self.sub_system_strings.len(),
            })?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(TraceV3Error::UnterminatedString(offset as usize))?;
        Ok(String::from_utf8_lossy(&rest[..end]))
    }

    /// All strings in the string region with their offsets
    pub fn strings(&self) -> Vec<(u16, Cow<'_, str>)> {
        let mut strings = Vec::new();
        let mut pos = 0usize;
        for piece in self.sub_system_strings.split(|&b| b == 0) {
            let end = pos + piece.len();
            if end >= self.sub_system_strings.len() {
                break;
            }
            if !piece.is_empty() {
                strings.push((pos as u16, String::from_utf8_lossy(piece)));
            }
            pos = end + 1;
        }
        strings
    }

    /// First process entry with the given PID
    pub fn process_by_pid(&self, pid: u32) -> Option<&ProcessInfoEntry> {
        self.process_entries.iter().find(|p| p.pid == pid)
    }

    /// Process entry matching the identifier pair a firehose chunk carries
    pub fn process_by_proc_id(&self, upper: u64, lower: u32) -> Option<&ProcessInfoEntry> {
        self.process_entries
            .iter()
            .find(|p| p.proc_id_upper == upper && p.proc_id_lower == lower)
    }

    /// Resolve a subsystem identifier used by a process
    ///
    /// Returns `Ok(None)` when the process has no subsystem with that
    /// identifier.
    pub fn subsystem(
        &self,
        process: &ProcessInfoEntry,
        identifier: u16,
    ) -> TraceV3Result<Option<SubsystemInfo<'_>>> {
        let Some(entry) = process.subsystems.iter().find(|s| s.identifier == identifier) else {
            return Ok(None);
        };
        Ok(Some(SubsystemInfo {
            subsystem: self.string_at(entry.subsystem_offset)?,
            category: self.string_at(entry.category_offset)?,
        }))
    }
}

fn offset_u16(field: &'static str, value: usize) -> TraceV3Result<u16> {
    u16::try_from(value).map_err(|_| TraceV3Error::FieldOverflow { field, value })
}

fn count_u32(field: &'static str, value: usize) -> TraceV3Result<u32> {
    u32::try_from(value).map_err(|_| TraceV3Error::FieldOverflow { field, value })
}

/// Bounds-checked little-endian reader over a catalog region
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    structure: &'static str,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], structure: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            structure,
        }
    }

    fn ensure(&self, len: usize) -> TraceV3Result<()> {
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(TraceV3Error::DataTooShort {
                structure: self.structure,
                actual: available,
                minimum: len,
            });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> TraceV3Result<[u8; N]> {
        self.ensure(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(bytes)
    }

    fn u16(&mut self) -> TraceV3Result<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> TraceV3Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn u48(&mut self) -> TraceV3Result<u64> {
        let raw: [u8; 6] = self.take()?;
        let mut bytes = [0u8; 8];
        bytes[..6].copy_from_slice(&raw);
        Ok(u64::from_le_bytes(bytes))
    }

    fn u64(&mut self) -> TraceV3Result<u64> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    /// Skip padding so the distance from `start` is a multiple of 8
    ///
    /// Padding missing at the very end of a region is tolerated.
    fn align_from(&mut self, start: usize) {
        let aligned = start + (self.pos - start).next_multiple_of(ENTRY_ALIGNMENT);
        self.pos = aligned.min(self.data.len());
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{DSC_UUID, MAIN_UUID, sample_catalog};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_size() {
        let header = sample_catalog().header().unwrap();
        assert_eq!(header.build().unwrap().len(), CATALOG_HEADER_SIZE);
    }

    #[test]
    fn test_derived_offsets() {
        let catalog = sample_catalog();
        let header = catalog.header().unwrap();

        assert_eq!(header.sub_system_strings_offset, 32);
        assert_eq!(header.number_of_uuids(), 2);
        assert_eq!(header.process_information_entries_offset, 32 + 27);
        assert_eq!(header.sub_system_strings_size(), 27);
        assert_eq!(header.number_of_process_information_entries, 1);
        // 40 fixed + 16 per image + 8 subsystem header + 6 per subsystem = 70, padded to 72
        assert_eq!(catalog.process_entries[0].encoded_size(), 72);
        assert_eq!(header.sub_chunks_offset, 32 + 27 + 72);
        assert_eq!(header.number_of_sub_chunks, 1);
        // 32 fixed + 2 per index/offset = 38, padded to 40
        assert_eq!(catalog.sub_chunks[0].encoded_size(), 40);
    }

    #[test]
    fn test_catalog_round_trip() {
        let catalog = sample_catalog();
        let data = catalog.build().unwrap();
        assert_eq!(data.len(), CATALOG_HEADER_SIZE + 32 + 27 + 72 + 40);

        let (header, parsed) = Catalog::parse_with_header(&data).unwrap();
        assert_eq!(header, catalog.header().unwrap());
        assert_eq!(parsed, catalog);
        assert_eq!(parsed.build().unwrap(), data);
    }

    #[test]
    fn test_uuids_are_big_endian() {
        let data = sample_catalog().build().unwrap();
        assert_eq!(&data[24..40], MAIN_UUID.as_bytes());
        assert_eq!(
            Catalog::parse(&data).unwrap().uuids[0].to_string(),
            "3b8c2e5a-1f6d-4c2b-9a0e-7d51c4628810"
        );
    }

    #[test]
    fn test_load_address_is_48_bits() {
        let data = sample_catalog().build().unwrap();
        let entry_start = CATALOG_HEADER_SIZE + 32 + 27;
        let load_address = &data[entry_start + 40 + 10..entry_start + 40 + 16];
        assert_eq!(load_address, &[0x00, 0x40, 0x00, 0x00, 0x01, 0x00]);

        let mut catalog = sample_catalog();
        catalog.process_entries[0].uuid_entries[0].load_address = 1 << 48;
        assert!(matches!(
            catalog.build(),
            Err(TraceV3Error::FieldOverflow {
                field: "load_address",
                ..
            })
        ));
    }

    #[test]
    fn test_lookups() {
        let catalog = sample_catalog();
        let process = catalog.process_by_pid(412).unwrap();
        assert_eq!(process.main_uuid(&catalog).unwrap(), MAIN_UUID);
        assert_eq!(process.dsc_uuid(&catalog).unwrap(), DSC_UUID);
        assert!(catalog.process_by_pid(1).is_none());
        assert_eq!(catalog.process_by_proc_id(0x1_0000, 412).unwrap().pid, 412);

        let info = catalog.subsystem(process, 0x0101).unwrap().unwrap();
        assert_eq!(info.subsystem, "com.example.net");
        assert_eq!(info.category, "connection");
        assert!(catalog.subsystem(process, 0x0202).unwrap().is_none());

        assert_eq!(catalog.string_at(4).unwrap(), "example.net");
        assert!(matches!(
            catalog.uuid(2),
            Err(TraceV3Error::IndexOutOfRange { index: 2, len: 2, .. })
        ));
        assert!(matches!(
            catalog.string_at(27),
            Err(TraceV3Error::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_strings_listing() {
        let catalog = sample_catalog();
        let strings: Vec<(u16, String)> = catalog
            .strings()
            .into_iter()
            .map(|(offset, s)| (offset, s.into_owned()))
            .collect();
        assert_eq!(
            strings,
            vec![(0, "com.example.net".to_string()), (16, "connection".to_string())]
        );
    }

    fn with_header(data: &[u8], edit: impl FnOnce(&mut CatalogHeader)) -> Vec<u8> {
        let mut header = CatalogHeader::parse(data).unwrap();
        edit(&mut header);
        let mut out = header.build().unwrap();
        out.extend_from_slice(&data[CATALOG_HEADER_SIZE..]);
        out
    }

    #[test]
    fn test_offset_beyond_area_rejected() {
        let data = sample_catalog().build().unwrap();
        let bad = with_header(&data, |h| h.sub_chunks_offset = 4000);
        assert!(matches!(
            Catalog::parse(&bad),
            Err(TraceV3Error::OffsetOutOfBounds {
                field: "sub_chunks",
                ..
            })
        ));
    }

    #[test]
    fn test_inverted_strings_region_rejected() {
        let data = sample_catalog().build().unwrap();
        let bad = with_header(&data, |h| h.process_information_entries_offset = 16);
        assert!(matches!(
            Catalog::parse(&bad),
            Err(TraceV3Error::InvertedRegion {
                region: "sub_system_strings",
                start: 32,
                end: 16,
            })
        ));
    }

    #[test]
    fn test_misaligned_uuid_table_rejected() {
        let data = sample_catalog().build().unwrap();
        let bad = with_header(&data, |h| h.sub_system_strings_offset = 20);
        assert!(matches!(
            Catalog::parse(&bad),
            Err(TraceV3Error::MisalignedUuidTable(20))
        ));
    }

    #[test]
    fn test_truncated_process_entries() {
        let data = sample_catalog().build().unwrap();
        let bad = with_header(&data, |h| h.number_of_process_information_entries = 2);
        assert!(matches!(
            Catalog::parse(&bad),
            Err(TraceV3Error::DataTooShort {
                structure: "process information entry",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog {
            unknown1: [0; 6],
            earliest_firehose_timestamp: 0,
            uuids: Vec::new(),
            sub_system_strings: Vec::new(),
            process_entries: Vec::new(),
            sub_chunks: Vec::new(),
        };
        let data = catalog.build().unwrap();
        assert_eq!(data.len(), CATALOG_HEADER_SIZE);
        assert_eq!(Catalog::parse(&data).unwrap(), catalog);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        fn uuid_entry() -> impl Strategy<Value = UuidInfoEntry> {
            (any::<u32>(), any::<u32>(), any::<u16>(), 0u64..(1 << 48)).prop_map(
                |(data_size, unknown, uuid_index, load_address)| UuidInfoEntry {
                    data_size,
                    unknown,
                    uuid_index,
                    load_address,
                },
            )
        }

        fn process_entry() -> impl Strategy<Value = ProcessInfoEntry> {
            (
                any::<u16>(),
                any::<u64>(),
                any::<u32>(),
                any::<u32>(),
                prop::collection::vec(uuid_entry(), 0..4),
                prop::collection::vec(any::<(u16, u16, u16)>(), 0..6),
            )
                .prop_map(|(index, proc_id_upper, pid, effective_uid, uuid_entries, subsystems)| {
                    ProcessInfoEntry {
                        index,
                        unknown1: 0,
                        main_uuid_index: 0,
                        dsc_uuid_index: 0,
                        proc_id_upper,
                        proc_id_lower: pid,
                        pid,
                        effective_uid,
                        unknown2: 0,
                        unknown3: 0,
                        uuid_entries,
                        unknown4: 0,
                        subsystems: subsystems
                            .into_iter()
                            .map(|(identifier, subsystem_offset, category_offset)| SubsystemEntry {
                                identifier,
                                subsystem_offset,
                                category_offset,
                            })
                            .collect(),
                    }
                })
        }

        fn sub_chunk() -> impl Strategy<Value = CatalogSubChunk> {
            (
                any::<u64>(),
                any::<u64>(),
                any::<u32>(),
                prop::collection::vec(any::<u16>(), 0..8),
                prop::collection::vec(any::<u16>(), 0..8),
            )
                .prop_map(|(start_time, end_time, uncompressed_size, indexes, string_offsets)| {
                    CatalogSubChunk {
                        start_time,
                        end_time,
                        uncompressed_size,
                        compression_algorithm: COMPRESSION_ALGORITHM_LZ4,
                        indexes,
                        string_offsets,
                    }
                })
        }

        fn catalog() -> impl Strategy<Value = Catalog> {
            (
                any::<[u8; 6]>(),
                any::<u64>(),
                prop::collection::vec(any::<[u8; 16]>(), 0..16),
                prop::collection::vec(any::<u8>(), 0..200),
                prop::collection::vec(process_entry(), 0..6),
                prop::collection::vec(sub_chunk(), 0..6),
            )
                .prop_map(|(unknown1, earliest, uuids, strings, processes, sub_chunks)| Catalog {
                    unknown1,
                    earliest_firehose_timestamp: earliest,
                    uuids: uuids.into_iter().map(Uuid::from_bytes).collect(),
                    sub_system_strings: strings,
                    process_entries: processes,
                    sub_chunks,
                })
        }

        proptest! {
            /// Built catalogs parse back to the same value
            #[test]
            fn catalog_round_trip(catalog in catalog()) {
                let data = catalog.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
                let parsed = Catalog::parse(&data).map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(parsed, catalog);
            }

            /// The UUID table and string region sizes follow from the offsets
            #[test]
            fn catalog_region_sizes(catalog in catalog()) {
                let data = catalog.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
                let (header, parsed) = Catalog::parse_with_header(&data)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;

                prop_assert_eq!(parsed.uuids.len(), header.sub_system_strings_offset as usize / UUID_SIZE);
                prop_assert!(header.sub_system_strings_size() >= 0);
                prop_assert_eq!(
                    parsed.sub_system_strings.len(),
                    (header.process_information_entries_offset - header.sub_system_strings_offset) as usize
                );
                prop_assert_eq!(
                    parsed.process_entries.len(),
                    header.number_of_process_information_entries as usize
                );
                prop_assert_eq!(parsed.sub_chunks.len(), header.number_of_sub_chunks as usize);
            }

            /// Truncated catalogs are rejected, never mis-sliced
            #[test]
            fn truncated_catalog_rejected(catalog in catalog(), cut in 7usize..64) {
                // Cutting at most 6 bytes may only remove tolerated trailing padding
                prop_assume!(!catalog.sub_chunks.is_empty() || !catalog.process_entries.is_empty());
                let data = catalog.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assume!(cut <= data.len());
                prop_assert!(Catalog::parse(&data[..data.len() - cut]).is_err());
            }
        }
    }
}
