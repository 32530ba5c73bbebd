//! `unilog tracev3`

use crate::OutputFormat;
use crate::output::{Report, emit, hex_preview, key_value};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use unilog_formats::tracev3::{Catalog, CatalogGroup, HeaderChunk, ProcessInfoEntry, TraceV3File};

const UNKNOWN_PREVIEW_BYTES: usize = 32;

/// Header chunk summary
#[derive(Debug, Serialize)]
pub struct HeaderReport {
    /// Boot session UUID
    pub boot_uuid: String,
    /// OS build version
    pub build_version: String,
    /// Hardware model
    pub hardware_model: String,
    /// Timezone name
    pub timezone: String,
    /// Mach timebase as `numerator/denominator`
    pub timebase: String,
    /// Continuous time at file start
    pub continuous_time: u64,
    /// Wall clock seconds at file start
    pub wall_time_seconds: u64,
    /// Timezone bias in minutes
    pub bias_minutes: i32,
    /// Daylight saving time flag
    pub daylight_savings: bool,
    /// PID of logd
    pub logd_pid: u32,
}

impl From<&HeaderChunk> for HeaderReport {
    fn from(header: &HeaderChunk) -> Self {
        Self {
            boot_uuid: header.boot_uuid().to_string(),
            build_version: header.build_version().into_owned(),
            hardware_model: header.hardware_model().into_owned(),
            timezone: header.timezone_name(),
            timebase: format!("{}/{}", header.mach_time_numerator, header.mach_time_denominator),
            continuous_time: header.continuous_time,
            wall_time_seconds: header.wall_time_seconds,
            // Stored unsigned, negative west of UTC
            bias_minutes: header.bias_minutes as i32,
            daylight_savings: header.daylight_savings != 0,
            logd_pid: header.generation.logd_pid,
        }
    }
}

/// Resolved subsystem of a process
#[derive(Debug, Serialize)]
pub struct SubsystemReport {
    /// Identifier used by firehose records
    pub identifier: u16,
    /// Subsystem name
    pub subsystem: String,
    /// Category name
    pub category: String,
}

/// Process information entry summary
#[derive(Debug, Serialize)]
pub struct ProcessReport {
    /// Process ID
    pub pid: u32,
    /// Effective user ID
    pub euid: u32,
    /// Process identifier pair as `upper:lower`
    pub proc_id: String,
    /// Main executable UUID
    pub main_uuid: Option<String>,
    /// Shared cache UUID
    pub dsc_uuid: Option<String>,
    /// Number of loaded images
    pub images: usize,
    /// Subsystems the process logs with
    pub subsystems: Vec<SubsystemReport>,
}

impl ProcessReport {
    fn new(catalog: &Catalog, process: &ProcessInfoEntry) -> Self {
        let subsystems = process
            .subsystems
            .iter()
            .filter_map(|entry| match catalog.subsystem(process, entry.identifier) {
                Ok(info) => info.map(|info| SubsystemReport {
                    identifier: entry.identifier,
                    subsystem: info.subsystem.into_owned(),
                    category: info.category.into_owned(),
                }),
                Err(e) => {
                    tracing::warn!(pid = process.pid, identifier = entry.identifier, error = %e, "unresolvable subsystem");
                    None
                }
            })
            .collect();

        Self {
            pid: process.pid,
            euid: process.effective_uid,
            proc_id: format!("{}:{}", process.proc_id_upper, process.proc_id_lower),
            main_uuid: process.main_uuid(catalog).ok().map(|u| u.to_string()),
            dsc_uuid: process.dsc_uuid(catalog).ok().map(|u| u.to_string()),
            images: process.uuid_entries.len(),
            subsystems,
        }
    }
}

/// Chunk inside a chunkset
#[derive(Debug, Serialize)]
pub struct ChunkReport {
    /// Offset within the decompressed chunkset
    pub offset: usize,
    /// Tag name
    pub tag: String,
    /// Sub-tag
    pub sub_tag: u32,
    /// Data size
    pub size: u32,
}

/// Chunkset summary
#[derive(Debug, Serialize)]
pub struct ChunksetReport {
    /// Decompressed size
    pub decompressed_size: usize,
    /// Number of chunks
    pub chunk_count: usize,
    /// Chunk listing, with `--chunks`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<ChunkReport>>,
}

/// Catalog group summary
#[derive(Debug, Serialize)]
pub struct CatalogReport {
    /// UUID table
    pub uuids: Vec<String>,
    /// Subsystem string table
    pub strings: Vec<String>,
    /// Process information entries
    pub processes: Vec<ProcessReport>,
    /// Sub-chunks declared by the catalog
    pub sub_chunks: usize,
    /// Earliest firehose continuous time
    pub earliest_firehose_timestamp: u64,
    /// Chunksets following the catalog
    pub chunksets: Vec<ChunksetReport>,
}

impl CatalogReport {
    fn new(group: &CatalogGroup, list_chunks: bool) -> anyhow::Result<Self> {
        let catalog = &group.catalog;
        let chunksets = group
            .chunksets
            .iter()
            .map(|chunkset| -> anyhow::Result<ChunksetReport> {
                let chunks = chunkset
                    .chunks()
                    .map(|chunk| {
                        chunk.map(|chunk| ChunkReport {
                            offset: chunk.offset,
                            tag: chunk.tag().to_string(),
                            sub_tag: chunk.header.chunk_sub_tag,
                            size: chunk.header.chunk_data_size,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .context("failed to walk chunkset")?;
                Ok(ChunksetReport {
                    decompressed_size: chunkset.data.len(),
                    chunk_count: chunks.len(),
                    chunks: list_chunks.then_some(chunks),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            uuids: catalog.uuids.iter().map(ToString::to_string).collect(),
            strings: catalog.strings().into_iter().map(|(_, s)| s.into_owned()).collect(),
            processes: catalog
                .process_entries
                .iter()
                .map(|p| ProcessReport::new(catalog, p))
                .collect(),
            sub_chunks: catalog.sub_chunks.len(),
            earliest_firehose_timestamp: catalog.earliest_firehose_timestamp,
            chunksets,
        })
    }
}

/// Top-level chunk the library does not decode
#[derive(Debug, Serialize)]
pub struct UnknownChunkReport {
    /// Tag value
    pub tag: u32,
    /// Data size
    pub size: usize,
    /// Leading data bytes in hex
    pub preview: String,
}

/// Report for a tracev3 file
#[derive(Debug, Serialize)]
pub struct TraceV3Report {
    /// Input path
    pub path: String,
    /// Header chunk
    pub header: HeaderReport,
    /// Catalog groups
    pub catalogs: Vec<CatalogReport>,
    /// Chunk counts across all chunksets, keyed by tag name
    pub chunk_counts: BTreeMap<String, usize>,
    /// Undecoded top-level chunks
    pub unknown_chunks: Vec<UnknownChunkReport>,
}

impl TraceV3Report {
    /// Build the report for a parsed file
    pub fn new(path: &Path, file: &TraceV3File, list_chunks: bool) -> anyhow::Result<Self> {
        let catalogs = file
            .catalogs
            .iter()
            .map(|group| CatalogReport::new(group, list_chunks))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let chunk_counts = file
            .chunk_counts()?
            .into_iter()
            .map(|(tag, count)| (tag.to_string(), count))
            .collect();

        Ok(Self {
            path: path.display().to_string(),
            header: HeaderReport::from(&file.header),
            catalogs,
            chunk_counts,
            unknown_chunks: file
                .unknown_chunks
                .iter()
                .map(|chunk| UnknownChunkReport {
                    tag: chunk.header.chunk_tag,
                    size: chunk.data.len(),
                    preview: hex_preview(&chunk.data, UNKNOWN_PREVIEW_BYTES),
                })
                .collect(),
        })
    }
}

impl Report for TraceV3Report {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        let header = &self.header;
        key_value(out, 0, "File", &self.path)?;
        key_value(out, 0, "Boot UUID", &header.boot_uuid)?;
        key_value(out, 0, "Build", &header.build_version)?;
        key_value(out, 0, "Hardware", &header.hardware_model)?;
        key_value(out, 0, "Timezone", &header.timezone)?;
        key_value(out, 0, "Timebase", &header.timebase)?;
        key_value(out, 0, "Continuous time", header.continuous_time)?;
        key_value(out, 0, "Wall time", header.wall_time_seconds)?;
        key_value(out, 0, "logd PID", header.logd_pid)?;

        for (index, catalog) in self.catalogs.iter().enumerate() {
            writeln!(out)?;
            writeln!(out, "Catalog {index}")?;
            key_value(out, 2, "UUIDs", catalog.uuids.len())?;
            key_value(out, 2, "Strings", catalog.strings.join(", "))?;
            key_value(out, 2, "Sub-chunks", catalog.sub_chunks)?;
            for process in &catalog.processes {
                writeln!(
                    out,
                    "  pid {:<7} euid {:<5} main {}",
                    process.pid,
                    process.euid,
                    process.main_uuid.as_deref().unwrap_or("?")
                )?;
                for s in &process.subsystems {
                    writeln!(out, "    {:#06x} {} / {}", s.identifier, s.subsystem, s.category)?;
                }
            }
            for (n, chunkset) in catalog.chunksets.iter().enumerate() {
                writeln!(
                    out,
                    "  chunkset {n}: {} bytes, {} chunks",
                    chunkset.decompressed_size, chunkset.chunk_count
                )?;
                for chunk in chunkset.chunks.iter().flatten() {
                    writeln!(out, "    {:#08x}  {:<22} {:>6} bytes", chunk.offset, chunk.tag, chunk.size)?;
                }
            }
        }

        writeln!(out)?;
        writeln!(out, "Chunk counts")?;
        for (tag, count) in &self.chunk_counts {
            key_value(out, 2, tag, count)?;
        }
        for chunk in &self.unknown_chunks {
            writeln!(out, "Unknown chunk {:#06x}: {} bytes {}", chunk.tag, chunk.size, chunk.preview)?;
        }
        Ok(())
    }
}

/// Dump a tracev3 file
pub fn handle(file: &Path, list_chunks: bool, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let data = super::read_input(file)?;
    let parsed = TraceV3File::parse(&data).with_context(|| format!("failed to parse tracev3 file {}", file.display()))?;
    let report = TraceV3Report::new(file, &parsed, list_chunks)?;
    emit(&report, format, out)
}
