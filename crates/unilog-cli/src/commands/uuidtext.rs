//! `unilog uuidtext`

use crate::OutputFormat;
use crate::output::{Report, emit, key_value};
use anyhow::Context;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use unilog_formats::uuidtext::{UuidText, uuid_from_path};

/// Entry descriptor summary
#[derive(Debug, Serialize)]
pub struct EntryReport {
    /// Virtual start offset
    pub offset: u32,
    /// Stored byte count
    pub data_size: u32,
    /// Number of NUL-terminated strings in the range
    pub strings: usize,
}

/// A resolved format string
#[derive(Debug, Serialize)]
pub struct StringReport {
    /// Virtual offset
    pub offset: u32,
    /// Format string
    pub text: String,
}

/// Report for a uuidtext file
#[derive(Debug, Serialize)]
pub struct UuidTextReport {
    /// Input path
    pub path: String,
    /// Image UUID, when the path follows the uuidtext layout
    pub uuid: Option<String>,
    /// Format version as `major.minor`
    pub version: String,
    /// Entry descriptors
    pub entries: Vec<EntryReport>,
    /// Image path from the footer
    pub library_path: String,
    /// Every format string, with `--strings`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_strings: Option<Vec<StringReport>>,
    /// String at `--offset`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<StringReport>,
}

impl UuidTextReport {
    /// Build the report for a parsed file
    pub fn new(path: &Path, uuidtext: &UuidText, offset: Option<u32>, strings: bool) -> anyhow::Result<Self> {
        let entries = uuidtext
            .header
            .entry_descriptors
            .iter()
            .enumerate()
            .map(|(index, d)| EntryReport {
                offset: d.offset,
                data_size: d.data_size,
                strings: uuidtext.entry_format_strings(index).len(),
            })
            .collect();

        let resolved = offset
            .map(|offset| {
                uuidtext
                    .format_string(offset)
                    .map(|text| StringReport {
                        offset,
                        text: text.to_string(),
                    })
                    .with_context(|| format!("failed to resolve offset {offset:#x}"))
            })
            .transpose()?;

        let format_strings = strings.then(|| {
            uuidtext
                .format_strings()
                .iter()
                .map(|s| StringReport {
                    offset: s.offset,
                    text: s.text.to_string(),
                })
                .collect()
        });

        Ok(Self {
            path: path.display().to_string(),
            uuid: uuid_from_path(path).ok().map(|u| u.to_string()),
            version: format!(
                "{}.{}",
                uuidtext.header.major_format_version, uuidtext.header.minor_format_version
            ),
            entries,
            library_path: uuidtext.library_path.clone(),
            format_strings,
            resolved,
        })
    }
}

impl Report for UuidTextReport {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        key_value(out, 0, "File", &self.path)?;
        if let Some(uuid) = &self.uuid {
            key_value(out, 0, "UUID", uuid)?;
        }
        key_value(out, 0, "Version", &self.version)?;
        key_value(out, 0, "Library", &self.library_path)?;
        key_value(out, 0, "Entries", self.entries.len())?;
        for entry in &self.entries {
            writeln!(
                out,
                "  {:#010x}..{:#010x}  {:>8} bytes  {:>5} strings",
                entry.offset,
                u64::from(entry.offset) + u64::from(entry.data_size),
                entry.data_size,
                entry.strings
            )?;
        }
        if let Some(strings) = &self.format_strings {
            writeln!(out, "Format strings:")?;
            for s in strings {
                writeln!(out, "  {:#010x}  {:?}", s.offset, s.text)?;
            }
        }
        if let Some(resolved) = &self.resolved {
            writeln!(out, "{:#x}: {}", resolved.offset, resolved.text)?;
        }
        Ok(())
    }
}

/// Dump a uuidtext file
pub fn handle(
    file: &Path,
    offset: Option<u32>,
    strings: bool,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let data = super::read_input(file)?;
    let uuidtext = UuidText::parse(&data).with_context(|| format!("failed to parse uuidtext file {}", file.display()))?;
    let report = UuidTextReport::new(file, &uuidtext, offset, strings)?;
    emit(&report, format, out)
}
