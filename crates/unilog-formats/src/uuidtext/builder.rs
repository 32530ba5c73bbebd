//! uuidtext builder
//!
//! Assembles a uuidtext file from ranges of format strings. Ranges are sorted
//! by virtual offset when the file is built and must not overlap.

use super::error::{UuidTextError, UuidTextResult};
use super::header::{EntryDescriptor, MAX_RANGE_END, UuidTextHeader};
use super::UuidText;

/// Builder for uuidtext files
#[derive(Debug, Clone)]
pub struct UuidTextBuilder {
    library_path: String,
    ranges: Vec<(u32, Vec<u8>)>,
}

impl UuidTextBuilder {
    /// Create a new builder for the image at `library_path`
    pub fn new(library_path: impl Into<String>) -> Self {
        Self {
            library_path: library_path.into(),
            ranges: Vec::new(),
        }
    }

    /// Add a raw range of entry data starting at a virtual offset
    pub fn add_range(&mut self, offset: u32, data: Vec<u8>) -> UuidTextResult<&mut Self> {
        if u64::from(offset) + data.len() as u64 > MAX_RANGE_END {
            return Err(UuidTextError::RangeTooLarge(offset));
        }
        self.ranges.push((offset, data));
        Ok(self)
    }

    /// Add consecutive NUL-terminated strings starting at a virtual offset
    pub fn add_strings(&mut self, offset: u32, strings: &[&str]) -> UuidTextResult<&mut Self> {
        let mut data = Vec::with_capacity(strings.iter().map(|s| s.len() + 1).sum());
        for s in strings {
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        self.add_range(offset, data)
    }

    /// Build the uuidtext structure
    pub fn build(&self) -> UuidTextResult<UuidText> {
        let mut ranges = self.ranges.clone();
        ranges.sort_by_key(|(offset, _)| *offset);

        for pair in ranges.windows(2) {
            let (offset, data) = &pair[0];
            let next = pair[1].0;
            if u64::from(*offset) + data.len() as u64 > u64::from(next) {
                return Err(UuidTextError::OverlappingRanges(next));
            }
        }

        let descriptors = ranges
            .iter()
            .map(|(offset, data)| EntryDescriptor {
                offset: *offset,
                data_size: data.len() as u32,
            })
            .collect();

        Ok(UuidText {
            header: UuidTextHeader::new(descriptors),
            entries: ranges.into_iter().map(|(_, data)| data).collect(),
            library_path: self.library_path.clone(),
        })
    }

    /// Build the uuidtext file bytes
    pub fn build_bytes(&self) -> UuidTextResult<Vec<u8>> {
        self.build()?.build()
    }
}
