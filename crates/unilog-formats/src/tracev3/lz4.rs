//! Chunkset LZ4 block stream
//!
//! Chunkset data is a stream of blocks in Apple's `compression_lz4` framing:
//!
//! ```text
//! "bv41" u32 uncompressed_size u32 compressed_size [compressed_size bytes]
//! "bv4-" u32 uncompressed_size [uncompressed_size bytes]
//! "bv4$"                                            end of stream
//! ```
//!
//! A compressed block may copy from up to 64 KiB of output produced by the
//! blocks before it.

use super::error::{TraceV3Error, TraceV3Result};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Signature of an LZ4-compressed block
pub const LZ4_COMPRESSED_SIGNATURE: [u8; 4] = *b"bv41";

/// Signature of a stored (uncompressed) block
pub const LZ4_UNCOMPRESSED_SIGNATURE: [u8; 4] = *b"bv4-";

/// End-of-stream marker
pub const LZ4_END_OF_STREAM_SIGNATURE: [u8; 4] = *b"bv4$";

/// Size of a compressed block header
pub const LZ4_BLOCK_HEADER_SIZE: usize = 12;

/// Maximum allowed decompressed chunkset size (64 MiB)
///
/// `logd` writes chunksets of at most 64 KiB of payload, so this bounds
/// compression bombs without rejecting real data.
pub const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Window a block may reference in previously decoded output
const DICTIONARY_WINDOW: usize = 64 * 1024;

/// Compressed block header (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct Lz4BlockHeader {
    /// Block signature, raw bytes `bv41`
    pub signature: [u8; 4],

    /// Size of the block after decompression
    pub uncompressed_data_size: u32,

    /// Size of the compressed block that follows
    pub compressed_data_size: u32,
}

impl Lz4BlockHeader {
    /// Parse a compressed block header from the start of `data`
    pub fn parse(data: &[u8]) -> TraceV3Result<Self> {
        if data.len() < LZ4_BLOCK_HEADER_SIZE {
            return Err(TraceV3Error::DataTooShort {
                structure: "LZ4 block header",
                actual: data.len(),
                minimum: LZ4_BLOCK_HEADER_SIZE,
            });
        }
        let header = Self::read(&mut Cursor::new(&data[..LZ4_BLOCK_HEADER_SIZE]))?;
        if header.signature != LZ4_COMPRESSED_SIGNATURE {
            return Err(TraceV3Error::InvalidBlockSignature(header.signature, 0));
        }
        Ok(header)
    }

    /// Build the header to bytes
    pub fn build(&self) -> TraceV3Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(LZ4_BLOCK_HEADER_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

fn read_u32(data: &[u8], pos: usize, structure: &'static str) -> TraceV3Result<u32> {
    data.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(TraceV3Error::DataTooShort {
            structure,
            actual: data.len().saturating_sub(pos),
            minimum: 4,
        })
}

fn take<'a>(data: &'a [u8], pos: usize, len: usize, structure: &'static str) -> TraceV3Result<&'a [u8]> {
    data.get(pos..pos.saturating_add(len))
        .ok_or(TraceV3Error::DataTooShort {
            structure,
            actual: data.len().saturating_sub(pos),
            minimum: len,
        })
}

/// Decompress a chunkset block stream
pub fn decompress_chunkset(data: &[u8]) -> TraceV3Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    let mut pos = 0usize;

    loop {
        let signature: [u8; 4] = data
            .get(pos..pos + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(TraceV3Error::MissingEndMarker)?;

        match signature {
            LZ4_END_OF_STREAM_SIGNATURE => {
                pos += 4;
                if data[pos..].iter().any(|&b| b != 0) {
                    tracing::debug!(
                        trailing = data.len() - pos,
                        "ignoring data after chunkset end marker"
                    );
                }
                return Ok(out);
            }
            LZ4_COMPRESSED_SIGNATURE => {
                let header = Lz4BlockHeader::parse(&data[pos..])?;
                pos += LZ4_BLOCK_HEADER_SIZE;

                let size = header.uncompressed_data_size as usize;
                check_limit(out.len(), size)?;

                let block = take(data, pos, header.compressed_data_size as usize, "LZ4 block")?;
                pos += block.len();

                let decoded = if out.is_empty() {
                    lz4_flex::block::decompress(block, size)
                } else {
                    let window = &out[out.len().saturating_sub(DICTIONARY_WINDOW)..];
                    lz4_flex::block::decompress_with_dict(block, size, window)
                }
                .map_err(|e| TraceV3Error::Compression(format!("block decompression failed: {e}")))?;

                if decoded.len() != size {
                    return Err(TraceV3Error::SizeMismatch {
                        context: "LZ4 block",
                        declared: size,
                        actual: decoded.len(),
                    });
                }
                out.extend_from_slice(&decoded);
            }
            LZ4_UNCOMPRESSED_SIGNATURE => {
                let size = read_u32(data, pos + 4, "stored block header")? as usize;
                pos += 8;
                check_limit(out.len(), size)?;

                let block = take(data, pos, size, "stored block")?;
                pos += size;
                out.extend_from_slice(block);
            }
            other => return Err(TraceV3Error::InvalidBlockSignature(other, pos)),
        }

        tracing::trace!(offset = pos, decoded = out.len(), "chunkset block decoded");
    }
}

fn check_limit(current: usize, additional: usize) -> TraceV3Result<()> {
    if current.saturating_add(additional) > MAX_DECOMPRESSED_SIZE {
        return Err(TraceV3Error::SizeLimitExceeded(MAX_DECOMPRESSED_SIZE));
    }
    Ok(())
}

/// Compress a chunkset payload into a single `bv41` block plus end marker
pub fn compress_chunkset(data: &[u8]) -> TraceV3Result<Vec<u8>> {
    let uncompressed_data_size = u32::try_from(data.len()).map_err(|_| TraceV3Error::FieldOverflow {
        field: "uncompressed_data_size",
        value: data.len(),
    })?;

    let compressed = lz4_flex::block::compress(data);
    let header = Lz4BlockHeader {
        signature: LZ4_COMPRESSED_SIGNATURE,
        uncompressed_data_size,
        compressed_data_size: compressed.len() as u32,
    };

    let mut out = header.build()?;
    out.reserve(compressed.len() + LZ4_END_OF_STREAM_SIGNATURE.len());
    out.extend_from_slice(&compressed);
    out.extend_from_slice(&LZ4_END_OF_STREAM_SIGNATURE);
    Ok(out)
}

/// Wrap a payload in a single stored `bv4-` block plus end marker
pub fn store_chunkset(data: &[u8]) -> TraceV3Result<Vec<u8>> {
    let size = u32::try_from(data.len()).map_err(|_| TraceV3Error::FieldOverflow {
        field: "uncompressed_data_size",
        value: data.len(),
    })?;

    let mut out = Vec::with_capacity(data.len() + 12);
    out.extend_from_slice(&LZ4_UNCOMPRESSED_SIGNATURE);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&LZ4_END_OF_STREAM_SIGNATURE);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..200u32 {
            data.extend_from_slice(b"firehose tracepoint ");
            data.extend_from_slice(&i.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_block_header_layout() {
        let header = Lz4BlockHeader {
            signature: LZ4_COMPRESSED_SIGNATURE,
            uncompressed_data_size: 0x1000,
            compressed_data_size: 0x200,
        };
        let bytes = header.build().unwrap();
        assert_eq!(bytes.len(), LZ4_BLOCK_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"bv41");
        assert_eq!(&bytes[4..8], &0x1000u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0x200u32.to_le_bytes());
        assert_eq!(Lz4BlockHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_compress_round_trip() {
        let data = payload();
        let compressed = compress_chunkset(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert!(compressed.ends_with(b"bv4$"));
        assert_eq!(decompress_chunkset(&compressed).unwrap(), data);
    }

    #[test]
    fn test_stored_block() {
        let data = b"raw chunk bytes".to_vec();
        let stored = store_chunkset(&data).unwrap();
        assert_eq!(&stored[0..4], b"bv4-");
        assert_eq!(decompress_chunkset(&stored).unwrap(), data);
    }

    #[test]
    fn test_multiple_blocks() {
        let first = payload();
        let second = b"second block".to_vec();

        let mut stream = compress_chunkset(&first).unwrap();
        stream.truncate(stream.len() - 4);
        let stored = store_chunkset(&second).unwrap();
        stream.extend_from_slice(&stored);

        let mut expected = first;
        expected.extend_from_slice(&second);
        assert_eq!(decompress_chunkset(&stream).unwrap(), expected);
    }

    /// `bv41` block holding `compressed`, which decodes to `size` bytes
    fn compressed_block(size: usize, compressed: &[u8]) -> Vec<u8> {
        let mut block = Lz4BlockHeader {
            signature: LZ4_COMPRESSED_SIGNATURE,
            uncompressed_data_size: size as u32,
            compressed_data_size: compressed.len() as u32,
        }
        .build()
        .unwrap();
        block.extend_from_slice(compressed);
        block
    }

    /// Bytes that do not repeat within a chunkset
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn test_block_references_previous_output() {
        let first = payload();
        let mut second = first[100..400].to_vec();
        second.extend_from_slice(b"tail");

        let mut stream = compressed_block(first.len(), &lz4_flex::block::compress(&first));
        stream.extend(compressed_block(
            second.len(),
            &lz4_flex::block::compress_with_dict(&second, &first),
        ));
        stream.extend_from_slice(&LZ4_END_OF_STREAM_SIGNATURE);

        let mut expected = first;
        expected.extend_from_slice(&second);
        assert_eq!(decompress_chunkset(&stream).unwrap(), expected);
    }

    #[test]
    fn test_dictionary_limited_to_window() {
        let first = noise(DICTIONARY_WINDOW + 16 * 1024);
        let window = &first[first.len() - DICTIONARY_WINDOW..];
        let second = first[first.len() - 2048..first.len() - 512].to_vec();

        let mut stream = store_chunkset(&first).unwrap();
        stream.truncate(stream.len() - 4);
        stream.extend(compressed_block(
            second.len(),
            &lz4_flex::block::compress_with_dict(&second, window),
        ));
        stream.extend_from_slice(&LZ4_END_OF_STREAM_SIGNATURE);

        let decoded = decompress_chunkset(&stream).unwrap();
        assert_eq!(decoded.len(), first.len() + second.len());
        assert_eq!(&decoded[..first.len()], first.as_slice());
        assert_eq!(&decoded[first.len()..], second.as_slice());
    }

    #[test]
    fn test_empty_stream() {
        assert!(decompress_chunkset(b"bv4$").unwrap().is_empty());
    }

    #[test]
    fn test_missing_end_marker() {
        let mut stream = compress_chunkset(&payload()).unwrap();
        stream.truncate(stream.len() - 4);
        assert!(matches!(
            decompress_chunkset(&stream),
            Err(TraceV3Error::MissingEndMarker)
        ));
    }

    #[test]
    fn test_invalid_signature() {
        assert!(matches!(
            decompress_chunkset(b"bv42\0\0\0\0"),
            Err(TraceV3Error::InvalidBlockSignature(sig, 0)) if &sig == b"bv42"
        ));
    }

    #[test]
    fn test_truncated_block() {
        let mut stream = compress_chunkset(&payload()).unwrap();
        stream.truncate(LZ4_BLOCK_HEADER_SIZE + 5);
        assert!(matches!(
            decompress_chunkset(&stream),
            Err(TraceV3Error::DataTooShort { .. })
        ));
    }

    #[test]
    fn test_declared_size_mismatch() {
        let mut stream = compress_chunkset(&payload()).unwrap();
        let declared = u32::from_le_bytes(stream[4..8].try_into().unwrap());
        stream[4..8].copy_from_slice(&(declared + 100).to_le_bytes());
        assert!(matches!(
            decompress_chunkset(&stream),
            Err(TraceV3Error::SizeMismatch { .. } | TraceV3Error::Compression(_))
        ));
    }

    #[test]
    fn test_size_limit() {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"bv41");
        stream.extend_from_slice(&u32::MAX.to_le_bytes());
        stream.extend_from_slice(&4u32.to_le_bytes());
        stream.extend_from_slice(&[0; 4]);
        assert!(matches!(
            decompress_chunkset(&stream),
            Err(TraceV3Error::SizeLimitExceeded(_))
        ));
    }
}
