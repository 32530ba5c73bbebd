//! `unilog resolve`

use crate::OutputFormat;
use crate::output::{Report, emit, key_value};
use anyhow::Context;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use unilog_formats::uuidtext::{UuidText, uuidtext_relative_path};
use uuid::Uuid;

/// Report for a resolved format string
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    /// Image UUID
    pub uuid: String,
    /// uuidtext file that was read
    pub path: String,
    /// Image path from the footer
    pub library_path: String,
    /// Virtual offset
    pub offset: u32,
    /// Format string
    pub text: String,
}

impl Report for ResolveReport {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        key_value(out, 0, "UUID", &self.uuid)?;
        key_value(out, 0, "Library", &self.library_path)?;
        key_value(out, 0, "Offset", format!("{:#x}", self.offset))?;
        key_value(out, 0, "Format", &self.text)
    }
}

/// Resolve a format string through a uuidtext directory
pub fn handle(dir: &Path, uuid: &Uuid, offset: u32, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let path = dir.join(uuidtext_relative_path(uuid));
    let data = super::read_input(&path).with_context(|| format!("no uuidtext file for image {uuid}"))?;
    let uuidtext = UuidText::parse(&data).with_context(|| format!("failed to parse uuidtext file {}", path.display()))?;

    let text = uuidtext
        .format_string(offset)
        .with_context(|| format!("failed to resolve offset {offset:#x} in {}", uuidtext.library_path))?;

    let report = ResolveReport {
        uuid: uuid.to_string(),
        path: path.display().to_string(),
        library_path: uuidtext.library_path.clone(),
        offset,
        text: text.to_string(),
    };
    emit(&report, format, out)
}
