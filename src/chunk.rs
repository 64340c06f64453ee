//! Chunk navigation.
//!
//! A container is a fixed sequence of tagged chunks:
//!
//! ```text
//! MMMD
//! ├── CNTI
//! ├── OPDA
//! └── MTR*
//!     ├── score header (20 bytes)
//!     ├── MspI (optional)
//!     ├── Mtsu (optional)
//!     └── Mtsq (sequence data)
//! CRC (2 bytes, last bytes of MMMD)
//! ```
//!
//! [`Layout::locate`] walks this structure once
//! and records every offset the editing operations need.

use crate::data_types::{read_fixed_size, Ascii};
use crate::header::ScoreHeader;
use crate::ma3::ParseError;

/// A 4-byte chunk identifier.
///
/// A `*` in the identifier matches any byte,
/// as used by score tracks (`MTR` followed by the track number).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl core::fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&Ascii(self.0), f)
    }
}

impl core::fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&Ascii(self.0), f)
    }
}

impl ChunkTag {
    /// File chunk
    pub const MMMD: ChunkTag = ChunkTag(*b"MMMD");
    /// Contents info chunk
    pub const CNTI: ChunkTag = ChunkTag(*b"CNTI");
    /// Optional data chunk
    pub const OPDA: ChunkTag = ChunkTag(*b"OPDA");
    /// Score track chunk
    pub const MTR: ChunkTag = ChunkTag(*b"MTR*");
    /// Seek and phrase info chunk
    pub const MSPI: ChunkTag = ChunkTag(*b"MspI");
    /// Setup data chunk
    pub const MTSU: ChunkTag = ChunkTag(*b"Mtsu");
    /// Sequence data chunk
    pub const MTSQ: ChunkTag = ChunkTag(*b"Mtsq");

    /// Whether `bytes` holds this tag
    pub fn matches(&self, bytes: &[u8; 4]) -> bool {
        self.0
            .iter()
            .zip(bytes)
            .all(|(&expected, &actual)| expected == b'*' || expected == actual)
    }
}

/// Size of a chunk identifier
pub const CHUNK_TAG_SIZE: usize = 4;
/// Size of a chunk length field
pub const CHUNK_SIZE_SIZE: usize = 4;
/// Size of a complete chunk header
pub const CHUNK_HEADER_SIZE: usize = CHUNK_TAG_SIZE + CHUNK_SIZE_SIZE;
/// Size of the trailing CRC
pub const CRC_SIZE: usize = 2;

/// Check whether the chunk identifier at `offset` is `tag`.
///
/// Returns `false` if there are not enough bytes at `offset`.
pub fn expect_tag(bytes: &[u8], offset: usize, tag: ChunkTag) -> bool {
    bytes
        .get(offset..)
        .and_then(|b| b.get(..CHUNK_TAG_SIZE))
        .and_then(|b| <&[u8; 4]>::try_from(b).ok())
        .is_some_and(|b| tag.matches(b))
}

/// Read the big-endian length field at `offset`.
pub fn read_length(bytes: &[u8], offset: usize) -> Result<u32, ParseError> {
    bytes
        .get(offset..)
        .and_then(read_fixed_size)
        .ok_or(ParseError::InsufficientBytes {
            context: "chunk length",
        })
}

/// A 4-byte length field and its current value
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SizeField {
    /// Offset of the field in the container
    pub position: usize,
    /// Declared payload length
    pub value: u32,
}

/// Offsets of interest in a container,
/// as found by walking its chunks
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Length field of the `MMMD` chunk
    pub file_size: SizeField,
    /// Length field of the `MTR*` chunk
    pub score_size: SizeField,
    /// Length field of the `Mtsq` chunk
    pub sequence_size: SizeField,
    /// Offset of the score header (first byte of the `MTR*` payload)
    pub score_header: usize,
    /// Offset of the first byte of sequence data
    pub sequence_start: usize,
    /// Offset one past the last byte of sequence data
    pub sequence_end: usize,
    /// Offset one past the last byte of the container (CRC included)
    pub container_end: usize,
}

/// Cursor over the chunks of one container
struct Walker<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Walker<'a> {
    /// Check the tag at the cursor and step over the chunk header,
    /// returning the length field.
    fn enter(&mut self, tag: ChunkTag) -> Result<SizeField, ParseError> {
        if !expect_tag(self.bytes, self.offset, tag) {
            return Err(ParseError::UnexpectedChunk {
                expected: tag,
                offset: self.offset,
            });
        }
        let position = self.offset + CHUNK_TAG_SIZE;
        let value = read_length(self.bytes, position)?;
        self.offset = position + CHUNK_SIZE_SIZE;
        Ok(SizeField { position, value })
    }

    /// Step over a whole chunk, payload included.
    fn skip(&mut self, tag: ChunkTag, limit: usize) -> Result<(), ParseError> {
        let field = self.enter(tag)?;
        self.offset = self.payload_end(tag, field, limit)?;
        Ok(())
    }

    /// Step over the chunk at the cursor only if it is `tag`.
    fn skip_optional(&mut self, tag: ChunkTag, limit: usize) -> Result<bool, ParseError> {
        if expect_tag(self.bytes, self.offset, tag) {
            self.skip(tag, limit)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// End offset of the payload that starts at the cursor,
    /// which must not go past `limit`.
    fn payload_end(
        &self,
        tag: ChunkTag,
        field: SizeField,
        limit: usize,
    ) -> Result<usize, ParseError> {
        let end = self.offset + field.value as usize;
        if end > limit {
            return Err(ParseError::ChunkOutOfBounds {
                tag,
                offset: field.position - CHUNK_TAG_SIZE,
                length: field.value,
            });
        }
        Ok(end)
    }
}

impl Layout {
    /// Walk `MMMD → CNTI → OPDA → MTR* → [MspI] → [Mtsu] → Mtsq`.
    ///
    /// Every chunk must fit in its parent
    /// and the whole container must fit in `bytes`.
    pub fn locate(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut walker = Walker { bytes, offset: 0 };

        let file_size = walker.enter(ChunkTag::MMMD)?;
        let container_end = CHUNK_HEADER_SIZE + file_size.value as usize;
        if container_end > bytes.len() {
            return Err(ParseError::ContainerTruncated {
                expected: container_end,
                actual: bytes.len(),
            });
        }
        // the CRC closes the file chunk
        let contents_end = container_end
            .checked_sub(CRC_SIZE)
            .filter(|&end| end >= CHUNK_HEADER_SIZE)
            .ok_or(ParseError::InsufficientBytes { context: "CRC" })?;

        walker.skip(ChunkTag::CNTI, contents_end)?;
        walker.skip(ChunkTag::OPDA, contents_end)?;

        let score_size = walker.enter(ChunkTag::MTR)?;
        let score_header = walker.offset;
        let score_end = walker.payload_end(ChunkTag::MTR, score_size, contents_end)?;
        if score_header + ScoreHeader::SIZE > score_end {
            return Err(ParseError::InsufficientBytes {
                context: "ScoreHeader",
            });
        }
        walker.offset += ScoreHeader::SIZE;

        walker.skip_optional(ChunkTag::MSPI, score_end)?;
        walker.skip_optional(ChunkTag::MTSU, score_end)?;

        let sequence_size = walker.enter(ChunkTag::MTSQ)?;
        let sequence_start = walker.offset;
        let sequence_end = walker.payload_end(ChunkTag::MTSQ, sequence_size, score_end)?;

        Ok(Layout {
            file_size,
            score_size,
            sequence_size,
            score_header,
            sequence_start,
            sequence_end,
            container_end,
        })
    }

    /// Offset of the CRC
    pub fn crc_position(&self) -> usize {
        self.container_end - CRC_SIZE
    }

    /// The three length fields that enclose the sequence data,
    /// outermost first
    pub fn size_fields(&self) -> [SizeField; 3] {
        [self.file_size, self.score_size, self.sequence_size]
    }
}

#[cfg(test)]
mod tests {
    use super::{expect_tag, read_length, ChunkTag, Layout};
    use crate::ma3::ParseError;

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend((payload.len() as u32).to_be_bytes());
        out.extend(payload);
        out
    }

    fn container(score_chunks: &[Vec<u8>], sequence: &[u8]) -> Vec<u8> {
        let mut score = vec![0x02, 0x00, 0x02, 0x02];
        score.extend([0u8; 16]);
        for c in score_chunks {
            score.extend(c);
        }
        score.extend(chunk(b"Mtsq", sequence));

        let mut contents = chunk(b"CNTI", &[0x00, 0x01, 0x02, 0x03, 0x00]);
        contents.extend(chunk(b"OPDA", &[]));
        contents.extend(chunk(b"MTR\x05", &score));
        contents.extend([0x00, 0x00]);
        chunk(b"MMMD", &contents)
    }

    #[test]
    fn tags_match_literally_or_by_wildcard() {
        assert!(ChunkTag::MMMD.matches(b"MMMD"));
        assert!(!ChunkTag::MMMD.matches(b"MMMd"));
        assert!(ChunkTag::MTR.matches(b"MTR\x05"));
        assert!(ChunkTag::MTR.matches(b"MTR*"));
        assert!(!ChunkTag::MTR.matches(b"ATR\x05"));
    }

    #[test]
    fn expect_tag_is_bounds_checked() {
        let bytes = b"xxMMMD";
        assert!(expect_tag(bytes, 2, ChunkTag::MMMD));
        assert!(!expect_tag(bytes, 3, ChunkTag::MMMD));
        assert!(!expect_tag(bytes, 100, ChunkTag::MMMD));
    }

    #[test]
    fn read_length_is_big_endian() {
        let bytes = [0xAA, 0x00, 0x00, 0x01, 0x02];
        assert_eq!(read_length(&bytes, 1), Ok(0x102));
        assert!(read_length(&bytes, 2).is_err());
        assert!(read_length(&bytes, 10).is_err());
    }

    #[test]
    fn locate_without_optional_chunks() {
        let bytes = container(&[], &[0x00, 0xFF, 0x2F, 0x00]);
        let layout = Layout::locate(&bytes).unwrap();

        assert_eq!(layout.file_size.position, 4);
        assert_eq!(layout.file_size.value as usize, bytes.len() - 8);
        assert_eq!(layout.container_end, bytes.len());
        assert_eq!(&bytes[layout.score_size.position - 4..][..3], b"MTR");
        assert_eq!(layout.score_header, layout.score_size.position + 4);
        assert_eq!(layout.sequence_size.value, 4);
        assert_eq!(
            &bytes[layout.sequence_start..layout.sequence_end],
            &[0x00, 0xFF, 0x2F, 0x00]
        );
        assert_eq!(layout.sequence_end, layout.crc_position());
    }

    #[test]
    fn locate_skips_optional_chunks() {
        let mspi = chunk(b"MspI", &[1, 2, 3]);
        let mtsu = chunk(b"Mtsu", &[0xFF, 0xF0, 0x00]);
        let bytes = container(&[mspi, mtsu], &[0x00, 0xFF, 0x00]);
        let layout = Layout::locate(&bytes).unwrap();

        assert_eq!(&bytes[layout.sequence_size.position - 4..][..4], b"Mtsq");
        assert_eq!(&bytes[layout.sequence_start..layout.sequence_end], &[0x00, 0xFF, 0x00]);

        let only_mtsu = chunk(b"Mtsu", &[0xFF, 0xF0, 0x00]);
        let bytes = container(&[only_mtsu], &[0x00, 0xFF, 0x00]);
        assert!(Layout::locate(&bytes).is_ok());
    }

    #[test]
    fn locate_accepts_padded_buffers() {
        let mut bytes = container(&[], &[0x00, 0xFF, 0x2F, 0x00]);
        let len = bytes.len();
        bytes.extend([0u8; 7]);
        let layout = Layout::locate(&bytes).unwrap();
        assert_eq!(layout.container_end, len);
    }

    #[test]
    fn locate_rejects_missing_chunks() {
        let mut bytes = container(&[], &[0x00, 0xFF, 0x2F, 0x00]);
        bytes[8..12].copy_from_slice(b"CNTX");
        assert_eq!(
            Layout::locate(&bytes),
            Err(ParseError::UnexpectedChunk {
                expected: ChunkTag::CNTI,
                offset: 8,
            })
        );

        let bytes = container(&[chunk(b"Mxxx", &[])], &[0x00]);
        assert!(matches!(
            Layout::locate(&bytes),
            Err(ParseError::UnexpectedChunk {
                expected: ChunkTag::MTSQ,
                ..
            })
        ));
    }

    #[test]
    fn locate_rejects_truncated_containers() {
        let bytes = container(&[], &[0x00, 0xFF, 0x2F, 0x00]);
        assert!(matches!(
            Layout::locate(&bytes[..bytes.len() - 1]),
            Err(ParseError::ContainerTruncated { .. })
        ));
        assert!(Layout::locate(&bytes[..6]).is_err());
        assert!(Layout::locate(&[]).is_err());
    }

    #[test]
    fn locate_rejects_chunks_overflowing_their_parent() {
        let mut bytes = container(&[], &[0x00, 0xFF, 0x2F, 0x00]);
        let layout = Layout::locate(&bytes).unwrap();
        let pos = layout.sequence_size.position;
        bytes[pos..pos + 4].copy_from_slice(&100u32.to_be_bytes());
        assert!(matches!(
            Layout::locate(&bytes),
            Err(ParseError::ChunkOutOfBounds {
                tag: ChunkTag::MTSQ,
                length: 100,
                ..
            })
        ));
    }
}
