//! Output formatting for command reports
//!
//! Every command builds a serializable report. JSON output is the report as
//! serialized by serde; text output is written by the report itself.

use crate::OutputFormat;
use serde::Serialize;
use std::io::{self, Write};

/// A command result that can be rendered as text or JSON
pub trait Report: Serialize {
    /// Write the human-readable form
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Render a report in the requested format
pub fn emit<R: Report>(report: &R, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => report.write_text(out)?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::JsonPretty => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Write an aligned `key: value` line
pub fn key_value(out: &mut dyn Write, indent: usize, key: &str, value: impl std::fmt::Display) -> io::Result<()> {
    writeln!(out, "{:indent$}{:<22} {}", "", format!("{key}:"), value)
}

/// Hex preview of at most `limit` bytes, with a trailing ellipsis when cut
pub fn hex_preview(data: &[u8], limit: usize) -> String {
    if data.len() > limit {
        format!("{}...", hex::encode(&data[..limit]))
    } else {
        hex::encode(data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        size: u32,
    }

    impl Report for Sample {
        fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
            key_value(out, 0, "name", self.name)?;
            key_value(out, 2, "size", self.size)
        }
    }

    fn render(format: OutputFormat) -> String {
        let mut out = Vec::new();
        emit(&Sample { name: "logd", size: 8 }, format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_output() {
        assert_eq!(
            render(OutputFormat::Text),
            "name:                  logd\n  size:                  8\n"
        );
    }

    #[test]
    fn test_json_output() {
        assert_eq!(render(OutputFormat::Json), "{\"name\":\"logd\",\"size\":8}\n");
        assert_eq!(
            render(OutputFormat::JsonPretty),
            "{\n  \"name\": \"logd\",\n  \"size\": 8\n}\n"
        );
    }

    #[test]
    fn test_hex_preview() {
        assert_eq!(hex_preview(&[0xde, 0xad], 4), "dead");
        assert_eq!(hex_preview(&[1, 2, 3, 4, 5], 2), "0102...");
    }
}
