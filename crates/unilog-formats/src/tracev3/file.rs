//! Whole-file view of a tracev3 file

use super::catalog::{Catalog, CatalogHeader};
use super::chunk::{ChunkHeader, ChunkIter, ChunkTag, DEFAULT_SUB_TAG, write_chunk};
use super::error::{TraceV3Error, TraceV3Result};
use super::header::HeaderChunk;
use super::lz4::{compress_chunkset, decompress_chunkset};
use std::collections::BTreeMap;

/// Decompressed chunkset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunkset {
    /// Decompressed payload, a run of 8-byte aligned chunks
    pub data: Vec<u8>,
}

impl Chunkset {
    /// Wrap an already assembled payload
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Assemble a payload from `(tag, sub_tag, data)` chunks
    pub fn from_chunks<'a, I>(chunks: I) -> TraceV3Result<Self>
    where
        I: IntoIterator<Item = (ChunkTag, u32, &'a [u8])>,
    {
        let mut data = Vec::new();
        for (tag, sub_tag, chunk_data) in chunks {
            write_chunk(&mut data, tag, sub_tag, chunk_data)?;
        }
        Ok(Self { data })
    }

    /// Iterate the chunks of the payload
    pub fn chunks(&self) -> ChunkIter<'_> {
        ChunkIter::new(&self.data)
    }
}

/// A catalog and the chunksets that follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogGroup {
    /// Fixed catalog part as stored in the file
    ///
    /// Informational only. [`TraceV3File::build`] derives the written header
    /// from `catalog`, so this copy goes stale once the catalog is edited.
    pub header: CatalogHeader,
    /// Decoded catalog
    pub catalog: Catalog,
    /// Chunksets described by the catalog
    pub chunksets: Vec<Chunkset>,
}

/// Top-level chunk with a tag this crate does not decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChunk {
    /// Chunk envelope
    pub header: ChunkHeader,
    /// Chunk data
    pub data: Vec<u8>,
}

/// Complete parsed tracev3 file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceV3File {
    /// Header chunk
    pub header: HeaderChunk,
    /// Catalog groups in file order
    pub catalogs: Vec<CatalogGroup>,
    /// Top-level chunks with unknown tags, in file order
    pub unknown_chunks: Vec<UnknownChunk>,
}

impl TraceV3File {
    /// Parse a complete tracev3 file
    pub fn parse(data: &[u8]) -> TraceV3Result<Self> {
        let mut chunks = ChunkIter::new(data);

        let first = chunks.next().ok_or(TraceV3Error::DataTooShort {
            structure: "tracev3 file",
            actual: data.len(),
            minimum: super::chunk::CHUNK_HEADER_SIZE,
        })??;
        if first.tag() != ChunkTag::Header {
            return Err(TraceV3Error::UnexpectedChunk {
                tag: first.header.chunk_tag,
                offset: first.offset,
                reason: "file must start with a header chunk",
            });
        }
        let header = HeaderChunk::parse(first.data)?;

        let mut catalogs: Vec<CatalogGroup> = Vec::new();
        let mut unknown_chunks = Vec::new();

        for chunk in chunks {
            let chunk = chunk?;
            match chunk.tag() {
                ChunkTag::Catalog => {
                    let (catalog_header, catalog) = Catalog::parse_with_header(chunk.data)?;
                    catalogs.push(CatalogGroup {
                        header: catalog_header,
                        catalog,
                        chunksets: Vec::new(),
                    });
                }
                ChunkTag::Chunkset => {
                    let group = catalogs.last_mut().ok_or(TraceV3Error::UnexpectedChunk {
                        tag: chunk.header.chunk_tag,
                        offset: chunk.offset,
                        reason: "chunkset before any catalog",
                    })?;
                    let data = decompress_chunkset(chunk.data)?;
                    tracing::trace!(
                        offset = chunk.offset,
                        compressed = chunk.data.len(),
                        decompressed = data.len(),
                        "decompressed chunkset"
                    );
                    group.chunksets.push(Chunkset { data });
                }
                ChunkTag::Header => {
                    return Err(TraceV3Error::UnexpectedChunk {
                        tag: chunk.header.chunk_tag,
                        offset: chunk.offset,
                        reason: "duplicate header chunk",
                    });
                }
                other => {
                    tracing::debug!(offset = chunk.offset, tag = %other, "keeping undecoded top-level chunk");
                    unknown_chunks.push(UnknownChunk {
                        header: chunk.header,
                        data: chunk.data.to_vec(),
                    });
                }
            }
        }

        for (index, group) in catalogs.iter().enumerate() {
            if group.chunksets.len() != group.catalog.sub_chunks.len() {
                tracing::warn!(
                    catalog = index,
                    declared = group.catalog.sub_chunks.len(),
                    found = group.chunksets.len(),
                    "catalog sub-chunk count does not match chunksets"
                );
            }
        }

        tracing::debug!(
            catalogs = catalogs.len(),
            unknown = unknown_chunks.len(),
            "parsed tracev3 file"
        );

        Ok(Self {
            header,
            catalogs,
            unknown_chunks,
        })
    }

    /// Build the file to bytes
    ///
    /// Chunksets are recompressed, so the output matches the input byte for
    /// byte only for files this crate wrote. Unknown chunks are written last.
    pub fn build(&self) -> TraceV3Result<Vec<u8>> {
        let mut out = Vec::new();
        write_chunk(&mut out, ChunkTag::Header, DEFAULT_SUB_TAG, &self.header.build()?)?;

        for group in &self.catalogs {
            write_chunk(&mut out, ChunkTag::Catalog, DEFAULT_SUB_TAG, &group.catalog.build()?)?;
            for chunkset in &group.chunksets {
                write_chunk(
                    &mut out,
                    ChunkTag::Chunkset,
                    DEFAULT_SUB_TAG,
                    &compress_chunkset(&chunkset.data)?,
                )?;
            }
        }

        for chunk in &self.unknown_chunks {
            write_chunk(&mut out, chunk.header.tag(), chunk.header.chunk_sub_tag, &chunk.data)?;
        }

        Ok(out)
    }

    /// Count the chunks inside all chunksets by tag
    pub fn chunk_counts(&self) -> TraceV3Result<BTreeMap<ChunkTag, usize>> {
        let mut counts = BTreeMap::new();
        for chunkset in self.catalogs.iter().flat_map(|g| &g.chunksets) {
            for chunk in chunkset.chunks() {
                *counts.entry(chunk?.tag()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

impl crate::UnifiedLogFormat for TraceV3File {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        self.build()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }
}

/// Builder for tracev3 files
#[derive(Debug, Clone)]
pub struct TraceV3Builder {
    header: HeaderChunk,
    catalogs: Vec<CatalogGroup>,
}

impl TraceV3Builder {
    /// Create a builder with the given header chunk
    pub fn new(header: HeaderChunk) -> Self {
        Self {
            header,
            catalogs: Vec::new(),
        }
    }

    /// Start a new catalog group
    pub fn add_catalog(&mut self, catalog: Catalog) -> TraceV3Result<&mut Self> {
        self.catalogs.push(CatalogGroup {
            header: catalog.header()?,
            catalog,
            chunksets: Vec::new(),
        });
        Ok(self)
    }

    /// Add a chunkset to the most recent catalog group
    pub fn add_chunkset(&mut self, chunkset: Chunkset) -> TraceV3Result<&mut Self> {
        let group = self.catalogs.last_mut().ok_or(TraceV3Error::UnexpectedChunk {
            tag: ChunkTag::Chunkset.as_u32(),
            offset: 0,
            reason: "chunkset before any catalog",
        })?;
        group.chunksets.push(chunkset);
        Ok(self)
    }

    /// Build the file structure
    pub fn build(&self) -> TraceV3File {
        TraceV3File {
            header: self.header,
            catalogs: self.catalogs.clone(),
            unknown_chunks: Vec::new(),
        }
    }

    /// Build the file bytes
    pub fn build_bytes(&self) -> TraceV3Result<Vec<u8>> {
        self.build().build()
    }
}
