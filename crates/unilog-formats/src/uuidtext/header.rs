//! uuidtext file header and entry descriptor types

use super::error::{UuidTextError, UuidTextResult};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// uuidtext signature (`99 88 77 66` on disk)
pub const UUIDTEXT_SIGNATURE: u32 = 0x6677_8899;

/// Major format version written by every known `logd`
pub const UUIDTEXT_MAJOR_VERSION: u32 = 2;

/// Minor format version written by every known `logd`
pub const UUIDTEXT_MINOR_VERSION: u32 = 1;

/// Size of the fixed header part before the descriptor table
pub const HEADER_SIZE: usize = 16;

/// Size of one entry descriptor
pub const ENTRY_DESCRIPTOR_SIZE: usize = 8;

/// Exclusive upper bound of any virtual range
pub(crate) const MAX_RANGE_END: u64 = 1 << 32;

/// Entry descriptor
///
/// Each descriptor covers the virtual range `[offset, offset + data_size)` of
/// the image's string section. The bytes of that range are stored in the
/// file in descriptor order, directly after the descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct EntryDescriptor {
    /// Virtual start offset of the range
    pub offset: u32,

    /// Number of bytes stored for the range
    pub data_size: u32,
}

impl EntryDescriptor {
    /// Exclusive end of the virtual range
    pub fn range_end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.data_size)
    }

    /// Check the range ends within the 32-bit offset space
    pub fn validate(&self) -> UuidTextResult<()> {
        if self.range_end() > MAX_RANGE_END {
            return Err(UuidTextError::RangeTooLarge(self.offset));
        }
        Ok(())
    }

    /// Check whether a virtual offset falls inside this range
    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.offset && u64::from(offset) < self.range_end()
    }
}

/// uuidtext file header
///
/// Layout (little-endian):
/// ```text
/// offset 0x00: u32 signature             (0x66778899)
/// offset 0x04: u32 major_format_version  (2)
/// offset 0x08: u32 minor_format_version  (1)
/// offset 0x0C: u32 number_of_entries
/// offset 0x10: [EntryDescriptor; number_of_entries]  (8 bytes each)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct UuidTextHeader {
    /// File signature, must be [`UUIDTEXT_SIGNATURE`]
    pub signature: u32,

    /// Major format version
    pub major_format_version: u32,

    /// Minor format version
    pub minor_format_version: u32,

    /// Number of entry descriptors that follow
    pub number_of_entries: u32,

    /// Entry descriptors
    #[br(count = number_of_entries)]
    pub entry_descriptors: Vec<EntryDescriptor>,
}

impl UuidTextHeader {
    /// Create a header for the given descriptors
    pub fn new(entry_descriptors: Vec<EntryDescriptor>) -> Self {
        Self {
            signature: UUIDTEXT_SIGNATURE,
            major_format_version: UUIDTEXT_MAJOR_VERSION,
            minor_format_version: UUIDTEXT_MINOR_VERSION,
            number_of_entries: entry_descriptors.len() as u32,
            entry_descriptors,
        }
    }

    /// Parse the header and descriptor table from the start of a file
    pub fn parse(data: &[u8]) -> UuidTextResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(UuidTextError::DataTooShort {
                actual: data.len(),
                minimum: HEADER_SIZE,
            });
        }

        let signature = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if signature != UUIDTEXT_SIGNATURE {
            return Err(UuidTextError::InvalidSignature {
                expected: UUIDTEXT_SIGNATURE,
                actual: signature,
            });
        }

        // Check the descriptor table fits before letting binrw allocate it
        let number_of_entries = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
        let table_end = HEADER_SIZE as u64 + u64::from(number_of_entries) * ENTRY_DESCRIPTOR_SIZE as u64;
        if (data.len() as u64) < table_end {
            return Err(UuidTextError::DataTooShort {
                actual: data.len(),
                minimum: table_end as usize,
            });
        }

        let header = Self::read(&mut Cursor::new(data))?;
        header.validate()?;
        Ok(header)
    }

    /// Validate version, descriptor count and descriptor ranges
    pub fn validate(&self) -> UuidTextResult<()> {
        if self.signature != UUIDTEXT_SIGNATURE {
            return Err(UuidTextError::InvalidSignature {
                expected: UUIDTEXT_SIGNATURE,
                actual: self.signature,
            });
        }

        if self.major_format_version != UUIDTEXT_MAJOR_VERSION {
            return Err(UuidTextError::UnsupportedVersion {
                major: self.major_format_version,
                minor: self.minor_format_version,
            });
        }

        if self.number_of_entries as usize != self.entry_descriptors.len() {
            return Err(UuidTextError::EntryCountMismatch {
                declared: self.number_of_entries,
                actual: self.entry_descriptors.len(),
            });
        }

        for descriptor in &self.entry_descriptors {
            descriptor.validate()?;
        }

        Ok(())
    }

    /// Build the header to bytes
    pub fn build(&self) -> UuidTextResult<Vec<u8>> {
        self.validate()?;
        let mut cursor = Cursor::new(Vec::with_capacity(self.size()));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Serialized size including the descriptor table
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.entry_descriptors.len() * ENTRY_DESCRIPTOR_SIZE
    }

    /// Total number of entry data bytes declared by the descriptors
    pub fn total_data_size(&self) -> u64 {
        self.entry_descriptors
            .iter()
            .map(|d| u64::from(d.data_size))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn header_bytes(signature: u32, major: u32, descriptors: &[(u32, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&signature.to_le_bytes());
        data.extend_from_slice(&major.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
        for (offset, size) in descriptors {
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&size.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_header() {
        let data = header_bytes(UUIDTEXT_SIGNATURE, 2, &[(0x1000, 32), (0x2000, 8)]);
        assert_eq!(&data[0..4], &[0x99, 0x88, 0x77, 0x66]);

        let header = UuidTextHeader::parse(&data).unwrap();
        assert_eq!(header.major_format_version, 2);
        assert_eq!(header.minor_format_version, 1);
        assert_eq!(header.number_of_entries, 2);
        assert_eq!(header.entry_descriptors.len(), 2);
        assert_eq!(
            header.entry_descriptors[1],
            EntryDescriptor {
                offset: 0x2000,
                data_size: 8
            }
        );
        assert_eq!(header.size(), 32);
        assert_eq!(header.total_data_size(), 40);
    }

    #[test]
    fn test_header_build_matches_layout() {
        let header = UuidTextHeader::new(vec![EntryDescriptor {
            offset: 0x10,
            data_size: 0x20,
        }]);
        let built = header.build().unwrap();
        assert_eq!(built, header_bytes(UUIDTEXT_SIGNATURE, 2, &[(0x10, 0x20)]));
        assert_eq!(built.len(), HEADER_SIZE + ENTRY_DESCRIPTOR_SIZE);
    }

    #[test]
    fn test_reject_bad_signature() {
        let data = header_bytes(0x1122_3344, 2, &[]);
        assert!(matches!(
            UuidTextHeader::parse(&data),
            Err(UuidTextError::InvalidSignature {
                actual: 0x1122_3344,
                ..
            })
        ));
    }

    #[test]
    fn test_reject_unsupported_version() {
        let data = header_bytes(UUIDTEXT_SIGNATURE, 3, &[]);
        assert!(matches!(
            UuidTextHeader::parse(&data),
            Err(UuidTextError::UnsupportedVersion { major: 3, .. })
        ));
    }

    #[test]
    fn test_reject_truncated_descriptor_table() {
        let mut data = header_bytes(UUIDTEXT_SIGNATURE, 2, &[(0, 4)]);
        // Claim a second descriptor that is not present
        data[12..16].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            UuidTextHeader::parse(&data),
            Err(UuidTextError::DataTooShort { minimum: 32, .. })
        ));
    }

    #[test]
    fn test_build_rejects_count_mismatch() {
        let mut header = UuidTextHeader::new(vec![]);
        header.number_of_entries = 1;
        assert!(matches!(
            header.build(),
            Err(UuidTextError::EntryCountMismatch { declared: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_reject_range_past_offset_space() {
        let data = header_bytes(UUIDTEXT_SIGNATURE, 2, &[(0xFFFF_FFF0, 0x20)]);
        assert!(matches!(
            UuidTextHeader::parse(&data),
            Err(UuidTextError::RangeTooLarge(0xFFFF_FFF0))
        ));

        // A range ending exactly at the top of the offset space is valid
        let data = header_bytes(UUIDTEXT_SIGNATURE, 2, &[(0xFFFF_FFF0, 0x10)]);
        assert!(UuidTextHeader::parse(&data).is_ok());
    }

    #[test]
    fn test_descriptor_contains() {
        let d = EntryDescriptor {
            offset: 100,
            data_size: 10,
        };
        assert!(!d.contains(99));
        assert!(d.contains(100));
        assert!(d.contains(109));
        assert!(!d.contains(110));
        assert_eq!(d.range_end(), 110);
    }
}
