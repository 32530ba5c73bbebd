//! tracev3 chunk envelope and chunk walking
//!
//! Every structure in a tracev3 file, and every record inside a decompressed
//! chunkset, is wrapped in the same 16-byte envelope. Chunks start on 8-byte
//! boundaries relative to the start of the containing buffer; the bytes
//! between the end of one chunk's data and the next boundary are zero.

use super::error::{TraceV3Error, TraceV3Result};
use binrw::{BinRead, BinWrite};
use std::fmt;
use std::io::Cursor;

/// Size of the chunk envelope
pub const CHUNK_HEADER_SIZE: usize = 16;

/// Chunk alignment within a buffer
pub const CHUNK_ALIGNMENT: usize = 8;

/// Sub-tag written on header, catalog and chunkset chunks
pub const DEFAULT_SUB_TAG: u32 = 0x11;

/// Round `offset` up to the next chunk boundary
pub fn align_chunk(offset: usize) -> usize {
    offset.next_multiple_of(CHUNK_ALIGNMENT)
}

/// Known chunk tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkTag {
    /// File header chunk (0x1000)
    Header,
    /// Catalog chunk (0x600b)
    Catalog,
    /// LZ4-compressed chunkset (0x600d)
    Chunkset,
    /// Firehose tracepoints (0x6001)
    Firehose,
    /// Oversize payload (0x6002)
    Oversize,
    /// Statedump (0x6003)
    Statedump,
    /// Simpledump (0x6004)
    Simpledump,
    /// Any other tag value
    Unknown(u32),
}

impl ChunkTag {
    /// Convert from raw u32 value
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x1000 => Self::Header,
            0x600b => Self::Catalog,
            0x600d => Self::Chunkset,
            0x6001 => Self::Firehose,
            0x6002 => Self::Oversize,
            0x6003 => Self::Statedump,
            0x6004 => Self::Simpledump,
            other => Self::Unknown(other),
        }
    }

    /// Get the raw u32 value
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Header => 0x1000,
            Self::Catalog => 0x600b,
            Self::Chunkset => 0x600d,
            Self::Firehose => 0x6001,
            Self::Oversize => 0x6002,
            Self::Statedump => 0x6003,
            Self::Simpledump => 0x6004,
            Self::Unknown(value) => value,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Catalog => "catalog",
            Self::Chunkset => "chunkset",
            Self::Firehose => "firehose",
            Self::Oversize => "oversize",
            Self::Statedump => "statedump",
            Self::Simpledump => "simpledump",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.name(), self.as_u32())
    }
}

/// Chunk envelope (16 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct ChunkHeader {
    /// Chunk tag, see [`ChunkTag`]
    pub chunk_tag: u32,

    /// Chunk sub-tag
    pub chunk_sub_tag: u32,

    /// Number of data bytes following the envelope
    pub chunk_data_size: u32,

    /// Reserved, zero in files written by `logd`
    pub unknown1: u32,
}

impl ChunkHeader {
    /// Create an envelope for `data_size` bytes of chunk data
    pub fn new(tag: ChunkTag, sub_tag: u32, data_size: u32) -> Self {
        Self {
            chunk_tag: tag.as_u32(),
            chunk_sub_tag: sub_tag,
            chunk_data_size: data_size,
            unknown1: 0,
        }
    }

    /// Parse an envelope from the start of `data`
    pub fn parse(data: &[u8]) -> TraceV3Result<Self> {
        if data.len() < CHUNK_HEADER_SIZE {
            return Err(TraceV3Error::DataTooShort {
                structure: "chunk header",
                actual: data.len(),
                minimum: CHUNK_HEADER_SIZE,
            });
        }
        Ok(Self::read(&mut Cursor::new(&data[..CHUNK_HEADER_SIZE]))?)
    }

    /// Build the envelope to bytes
    pub fn build(&self) -> TraceV3Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(CHUNK_HEADER_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Decoded chunk tag
    pub fn tag(&self) -> ChunkTag {
        ChunkTag::from_u32(self.chunk_tag)
    }
}

/// A chunk borrowed from a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'a> {
    /// Offset of the envelope within the buffer
    pub offset: usize,

    /// Chunk envelope
    pub header: ChunkHeader,

    /// Chunk data (exactly `chunk_data_size` bytes)
    pub data: &'a [u8],
}

impl RawChunk<'_> {
    /// Decoded chunk tag
    pub fn tag(&self) -> ChunkTag {
        self.header.tag()
    }
}

/// Iterator over the chunks of a buffer
///
/// Stops at the end of the buffer or at trailing zero padding shorter than an
/// envelope. After yielding an error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkIter<'a> {
    /// Walk the chunks of `data` from the start
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn fail(&mut self, error: TraceV3Error) -> Option<TraceV3Result<RawChunk<'a>>> {
        self.pos = self.data.len();
        Some(Err(error))
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = TraceV3Result<RawChunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.get(self.pos..).unwrap_or_default();
        if remaining.is_empty() {
            return None;
        }

        if remaining.len() < CHUNK_HEADER_SIZE {
            if remaining.iter().all(|&b| b == 0) {
                self.pos = self.data.len();
                return None;
            }
            return self.fail(TraceV3Error::DataTooShort {
                structure: "chunk header",
                actual: remaining.len(),
                minimum: CHUNK_HEADER_SIZE,
            });
        }

        let header = match ChunkHeader::parse(remaining) {
            Ok(header) => header,
            Err(e) => return self.fail(e),
        };

        let data_start = self.pos + CHUNK_HEADER_SIZE;
        let data_end = data_start as u64 + u64::from(header.chunk_data_size);
        if data_end > self.data.len() as u64 {
            return self.fail(TraceV3Error::ChunkOverflow {
                tag: header.chunk_tag,
                offset: self.pos,
                data_size: header.chunk_data_size,
                available: self.data.len(),
            });
        }
        let data_end = data_end as usize;

        let chunk = RawChunk {
            offset: self.pos,
            header,
            data: &self.data[data_start..data_end],
        };
        self.pos = align_chunk(data_end);
        Some(Ok(chunk))
    }
}

/// Append a chunk to `out`, padding `out` to the next chunk boundary first
pub fn write_chunk(out: &mut Vec<u8>, tag: ChunkTag, sub_tag: u32, data: &[u8]) -> TraceV3Result<()> {
    let data_size = u32::try_from(data.len()).map_err(|_| TraceV3Error::FieldOverflow {
        field: "chunk_data_size",
        value: data.len(),
    })?;

    out.resize(align_chunk(out.len()), 0);
    out.extend_from_slice(&ChunkHeader::new(tag, sub_tag, data_size).build()?);
    out.extend_from_slice(data);
    Ok(())
}
