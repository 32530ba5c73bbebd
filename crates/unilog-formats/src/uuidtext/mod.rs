//! uuidtext format implementation
//!
//! A uuidtext file holds the format strings of one Mach-O image (binary or
//! library). `logd` copies the strings the image logs with into
//! `/private/var/db/uuidtext/XX/YYYYYYYYYYYYYYYYYYYYYYYYYYYYYY`, where the
//! directory and file name together spell the image UUID in uppercase hex.
//! Log entries then reference a format string by the virtual offset it had in
//! the image's string section.
//!
//! # Format Structure
//!
//! ```text
//! uuidtext:
//! ├── Header (16 bytes, little-endian)
//! │   ├── signature (u32, 0x66778899)
//! │   ├── major_format_version (u32, 2)
//! │   ├── minor_format_version (u32, 1)
//! │   └── number_of_entries (u32)
//! ├── Entry Descriptors (number_of_entries × 8 bytes)
//! │   ├── offset (u32, virtual start of the range)
//! │   └── data_size (u32)
//! ├── Entry Data (sum of data_size bytes, descriptor order)
//! │   └── NUL-terminated UTF-8 format strings
//! └── Footer
//!     └── library_path (NUL-terminated UTF-8)
//! ```
//!
//! # Usage
//!
//! ## Parsing
//!
//! ```rust,no_run
//! use unilog_formats::uuidtext::UuidText;
//! use unilog_formats::UnifiedLogFormat;
//!
//! let data = std::fs::read("3B/8C2E5A1F6D4C2B9A0E7D51C4628810")?;
//! let uuidtext = UuidText::parse(&data)?;
//!
//! println!("{} ({} ranges)", uuidtext.library_path, uuidtext.entries.len());
//! println!("{}", uuidtext.format_string(0x1f3a)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Building
//!
//! ```rust
//! use unilog_formats::uuidtext::UuidTextBuilder;
//!
//! let mut builder = UuidTextBuilder::new("/usr/lib/libnetwork.dylib");
//! builder.add_strings(0x1000, &["connection %d ready", "closed"])?;
//!
//! let uuidtext = builder.build()?;
//! assert_eq!(uuidtext.format_string(0x1000)?, "connection %d ready");
//! assert_eq!(uuidtext.format_string(0x1014)?, "closed");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
/// uuidtext error types
pub mod error;
mod header;
mod path;

pub use builder::UuidTextBuilder;
pub use error::{UuidTextError, UuidTextResult};
pub use header::{
    ENTRY_DESCRIPTOR_SIZE, EntryDescriptor, HEADER_SIZE, UUIDTEXT_MAJOR_VERSION,
    UUIDTEXT_MINOR_VERSION, UUIDTEXT_SIGNATURE, UuidTextHeader,
};
pub use path::{uuid_from_path, uuidtext_relative_path};

use std::borrow::Cow;

/// Complete parsed uuidtext file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidText {
    /// File header including entry descriptors
    pub header: UuidTextHeader,

    /// Entry data blobs, one per descriptor and in the same order
    pub entries: Vec<Vec<u8>>,

    /// Path of the image the strings belong to (footer)
    pub library_path: String,
}

/// A format string found while scanning entry data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatString<'a> {
    /// Virtual offset of the first byte of the string
    pub offset: u32,

    /// String contents, lossily decoded
    pub text: Cow<'a, str>,
}

impl UuidText {
    /// Parse a complete uuidtext file
    pub fn parse(data: &[u8]) -> UuidTextResult<Self> {
        let header = UuidTextHeader::parse(data)?;

        let mut pos = header.size();
        let mut entries = Vec::with_capacity(header.entry_descriptors.len());
        for (index, descriptor) in header.entry_descriptors.iter().enumerate() {
            let end = pos as u64 + u64::from(descriptor.data_size);
            if end > data.len() as u64 {
                return Err(UuidTextError::EntryDataOverflow {
                    index,
                    needed: end,
                    available: data.len(),
                });
            }
            let end = end as usize;
            entries.push(data[pos..end].to_vec());
            pos = end;
        }

        let footer = &data[pos..];
        let nul = footer
            .iter()
            .position(|&b| b == 0)
            .ok_or(UuidTextError::UnterminatedFooter)?;
        let library_path = std::str::from_utf8(&footer[..nul])
            .map_err(|source| UuidTextError::InvalidUtf8 {
                context: "library path",
                source,
            })?
            .to_string();

        if nul + 1 < footer.len() {
            tracing::debug!(
                trailing = footer.len() - nul - 1,
                "ignoring bytes after uuidtext footer"
            );
        }

        Ok(Self {
            header,
            entries,
            library_path,
        })
    }

    /// Build the file to bytes
    pub fn build(&self) -> UuidTextResult<Vec<u8>> {
        if self.entries.len() != self.header.entry_descriptors.len() {
            return Err(UuidTextError::EntryCountMismatch {
                declared: self.header.number_of_entries,
                actual: self.entries.len(),
            });
        }

        let mut out = self.header.build()?;
        out.reserve(self.header.total_data_size() as usize + self.library_path.len() + 1);

        for (index, (descriptor, blob)) in self
            .header
            .entry_descriptors
            .iter()
            .zip(&self.entries)
            .enumerate()
        {
            if blob.len() != descriptor.data_size as usize {
                return Err(UuidTextError::EntrySizeMismatch {
                    index,
                    declared: descriptor.data_size,
                    actual: blob.len(),
                });
            }
            out.extend_from_slice(blob);
        }

        out.extend_from_slice(self.library_path.as_bytes());
        out.push(0);
        Ok(out)
    }

    /// Resolve the format string stored at a virtual offset
    ///
    /// The offset may point anywhere inside a string; the result runs from
    /// that byte to the next NUL.
    pub fn format_string(&self, offset: u32) -> UuidTextResult<&str> {
        let (index, descriptor) = self
            .header
            .entry_descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.contains(offset))
            .ok_or(UuidTextError::OffsetNotFound(offset))?;

        let start = (offset - descriptor.offset) as usize;
        let rest = self
            .entries
            .get(index)
            .and_then(|blob| blob.get(start..))
            .ok_or(UuidTextError::OffsetNotFound(offset))?;

        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(UuidTextError::UnterminatedString { offset })?;

        std::str::from_utf8(&rest[..end]).map_err(|source| UuidTextError::InvalidUtf8 {
            context: "format string",
            source,
        })
    }

    /// List every NUL-terminated string in the entry data with its offset
    pub fn format_strings(&self) -> Vec<FormatString<'_>> {
        (0..self.entries.len())
            .flat_map(|index| self.entry_format_strings(index))
            .collect()
    }

    /// List the NUL-terminated strings stored in one entry
    ///
    /// Returns an empty list for an index without a descriptor or blob.
    pub fn entry_format_strings(&self, index: usize) -> Vec<FormatString<'_>> {
        let (Some(descriptor), Some(blob)) = (
            self.header.entry_descriptors.get(index),
            self.entries.get(index),
        ) else {
            return Vec::new();
        };

        let mut strings = Vec::new();
        let mut pos = 0usize;
        for piece in blob.split(|&b| b == 0) {
            let piece_end = pos + piece.len();
            // The final piece has no terminator and is not a string
            if piece_end >= blob.len() {
                break;
            }
            // Descriptors built by hand may skip validation
            let Some(offset) = u32::try_from(pos)
                .ok()
                .and_then(|pos| descriptor.offset.checked_add(pos))
            else {
                break;
            };
            if !piece.is_empty() {
                strings.push(FormatString {
                    offset,
                    text: String::from_utf8_lossy(piece),
                });
            }
            pos = piece_end + 1;
        }
        strings
    }

    /// File name component of the library path
    pub fn library_name(&self) -> &str {
        self.library_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.library_path)
    }
}

impl crate::UnifiedLogFormat for UuidText {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        self.build()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }
}
