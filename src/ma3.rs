//! In-memory SMAF MA-3 container.

use snafu::{ensure, ResultExt, Snafu};
#[cfg(feature = "std")]
use std::path::Path;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::chunk::{ChunkTag, Layout, CRC_SIZE};
use crate::crc::Crc16;
use crate::data_types::{write_fixed_size, SizeOverflowError};
use crate::header::{ChannelStatus, Format, ScoreHeader, Timebase};

/// An error reading or editing an MA-3 container
#[cfg(feature = "std")]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// Failed to read the file
    ReadFile { source: std::io::Error },
    /// Failed to write the file
    WriteFile { source: std::io::Error },
    /// Failed to parse MA-3 data
    ParseMa3 { source: ParseError },
    /// The container is empty
    EmptyContainer,
    /// Unsupported format {format:?}
    UnsupportedFormat { format: Format },
    /// Invalid timebase {timebase:?}
    InvalidTimebase { timebase: Timebase },
    /// Invalid tempo ratio {ratio} (must be finite and positive)
    InvalidRatio { ratio: f64 },
    /// Channel {channel} out of range (16 channels)
    InvalidChannel { channel: usize },
    /// Sequence data has no note with velocity to start from
    MissingNote,
    /// Sequence data has no note to take a gatetime from
    MissingGatetime,
    /// Updated length of chunk {tag} does not fit
    SizeOverflow {
        tag: ChunkTag,
        source: SizeOverflowError,
    },
    /// Time value {value} does not fit in a variable-length quantity
    TimeOverflow { value: f64 },
}

/// An error reading or editing an MA-3 container
#[cfg(not(feature = "std"))]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// Failed to parse MA-3 data
    ParseMa3 { source: ParseError },
    /// The container is empty
    EmptyContainer,
    /// Unsupported format {format:?}
    UnsupportedFormat { format: Format },
    /// Invalid timebase {timebase:?}
    InvalidTimebase { timebase: Timebase },
    /// Invalid tempo ratio {ratio} (must be finite and positive)
    InvalidRatio { ratio: f64 },
    /// Channel {channel} out of range (16 channels)
    InvalidChannel { channel: usize },
    /// Sequence data has no note with velocity to start from
    MissingNote,
    /// Sequence data has no note to take a gatetime from
    MissingGatetime,
    /// Updated length of chunk {tag} does not fit
    SizeOverflow {
        tag: ChunkTag,
        source: SizeOverflowError,
    },
    /// Time value {value} does not fit in a variable-length quantity
    TimeOverflow { value: f64 },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error parsing the structure of an MA-3 container
#[derive(Debug, PartialEq, Snafu)]
pub enum ParseError {
    /// Insufficient bytes to parse {context}
    InsufficientBytes { context: &'static str },
    /// Expected chunk {expected} at offset {offset}
    UnexpectedChunk { expected: ChunkTag, offset: usize },
    /// Chunk {tag} at offset {offset} declares {length} bytes, beyond its parent chunk
    ChunkOutOfBounds {
        tag: ChunkTag,
        offset: usize,
        length: u32,
    },
    /// Container declares {expected} bytes but only {actual} are available
    ContainerTruncated { expected: usize, actual: usize },
    /// Invalid variable-length quantity at offset {offset}
    InvalidVarint {
        offset: usize,
        source: crate::data_types::ParseError,
    },
    /// Unsupported event status {status:#04x} at offset {offset}
    UnsupportedStatus { status: u8, offset: usize },
    /// Event at offset {offset} runs past the end of the sequence data
    TruncatedEvent { offset: usize },
}

/// A complete SMAF MA-3 file held in memory.
///
/// The buffer may hold extra bytes past the end of the container
/// (see [`Ma3::shrink_to_fit`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ma3 {
    data: Vec<u8>,
}

impl From<Vec<u8>> for Ma3 {
    fn from(data: Vec<u8>) -> Self {
        Ma3 { data }
    }
}

impl AsRef<[u8]> for Ma3 {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Ma3 {
    /// Take the bytes of a container without checking them
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Ma3 { data: bytes.into() }
    }

    #[cfg(feature = "std")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path).context(ReadFileSnafu)?;
        Ok(Ma3 { data })
    }

    #[cfg(feature = "std")]
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        use std::io::BufWriter;
        ensure!(!self.is_empty(), EmptyContainerSnafu);
        let writer = BufWriter::new(std::fs::File::create(path).context(WriteFileSnafu)?);
        self.write_to(writer)
    }

    #[cfg(feature = "std")]
    pub fn write_to(&self, mut writer: impl std::io::Write) -> Result<()> {
        ensure!(!self.is_empty(), EmptyContainerSnafu);
        writer.write_all(&self.data).context(WriteFileSnafu)?;
        writer.flush().context(WriteFileSnafu)?;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Walk the chunks of the container.
    pub fn layout(&self) -> Result<Layout> {
        ensure!(!self.is_empty(), EmptyContainerSnafu);
        Layout::locate(&self.data).context(ParseMa3Snafu)
    }

    /// Parse the score track header.
    pub fn score_header(&self) -> Result<ScoreHeader> {
        let layout = self.layout()?;
        self.score_header_at(&layout)
    }

    pub(crate) fn score_header_at(&self, layout: &Layout) -> Result<ScoreHeader> {
        ScoreHeader::parse(&self.data[layout.score_header..])
            .map(|(header, _)| header)
            .context(ParseMa3Snafu)
    }

    pub fn format(&self) -> Result<Format> {
        Ok(self.score_header()?.format)
    }

    pub fn timebase(&self) -> Result<Timebase> {
        Ok(self.score_header()?.timebase)
    }

    pub fn channel_status(&self, channel: usize) -> Result<ChannelStatus> {
        ensure!(
            channel < ScoreHeader::CHANNELS,
            InvalidChannelSnafu { channel }
        );
        Ok(self.score_header()?.channels[channel])
    }

    pub fn channel_statuses(&self) -> Result<[ChannelStatus; ScoreHeader::CHANNELS]> {
        Ok(self.score_header()?.channels)
    }

    /// Drop any bytes past the size declared by the file chunk.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        let layout = self.layout()?;
        self.data.truncate(layout.container_end);
        self.data.shrink_to_fit();
        Ok(())
    }

    /// Compute and store the CRC,
    /// which occupies the last two bytes of the container.
    pub fn fix_crc16(&mut self) -> Result<()> {
        let layout = self.layout()?;
        store_crc16(&mut self.data, layout.container_end);
        Ok(())
    }

    /// Whether the stored CRC matches the contents of the container.
    pub fn verify_crc16(&self) -> Result<bool> {
        let layout = self.layout()?;
        let (contents, rest) = self.data.split_at(layout.crc_position());
        Ok(Crc16::SMAF.make(contents).to_be_bytes() == rest[..CRC_SIZE])
    }

    /// Check that the container is in one of the given formats.
    pub(crate) fn require_format(
        &self,
        layout: &Layout,
        accept: fn(Format) -> bool,
    ) -> Result<()> {
        let format = self.score_header_at(layout)?.format;
        ensure!(accept(format), UnsupportedFormatSnafu { format });
        Ok(())
    }
}

/// Compute the CRC of the container ending at `container_end`
/// and store it in its last two bytes.
///
/// `container_end` must be at least the CRC size and within `data`.
pub(crate) fn store_crc16(data: &mut [u8], container_end: usize) {
    let crc_position = container_end - CRC_SIZE;
    let crc = Crc16::SMAF.make(&data[..crc_position]);
    data[crc_position..container_end].copy_from_slice(&crc.to_be_bytes());
}

/// Shift the three length fields of `layout` by `delta` bytes in `data`.
///
/// The fields must lie before any bytes that were inserted or removed.
pub(crate) fn patch_sizes(data: &mut [u8], layout: &Layout, delta: i64) -> Result<()> {
    let tags = [ChunkTag::MMMD, ChunkTag::MTR, ChunkTag::MTSQ];
    for (field, tag) in layout.size_fields().into_iter().zip(tags) {
        let out: &mut [u8; 4] = data
            .get_mut(field.position..field.position + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or(ParseError::InsufficientBytes {
                context: "chunk length",
            })
            .context(ParseMa3Snafu)?;
        write_fixed_size(i64::from(field.value) + delta, out).context(SizeOverflowSnafu { tag })?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{patch_sizes, Error, Ma3, ParseError};
    use crate::header::{ChannelStatus, Format, Timebase, TimebaseCode};

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend((payload.len() as u32).to_be_bytes());
        out.extend(payload);
        out
    }

    /// Build a container with a valid CRC
    pub(crate) fn build(format: u8, timebase: u8, sequence: &[u8]) -> Ma3 {
        let mut score = vec![format, 0x00, timebase, timebase];
        score.extend((0..16).map(|ch| ch as u8));
        score.extend(chunk(b"Mtsu", &[0x00, 0xFF, 0xF0, 0x00]));
        score.extend(chunk(b"Mtsq", sequence));

        let mut contents = chunk(b"CNTI", &[0x00, 0x01, 0x02, 0x03, 0x00]);
        contents.extend(chunk(b"OPDA", b"Dch\x00\x00\x00\x00"));
        contents.extend(chunk(b"MTR\x05", &score));
        contents.extend([0x00, 0x00]);

        let mut ma3 = Ma3::from_bytes(chunk(b"MMMD", &contents));
        ma3.fix_crc16().unwrap();
        ma3
    }

    const SEQUENCE: [u8; 9] = [0x00, 0x90, 0x45, 0x7F, 0x10, 0x00, 0xFF, 0x2F, 0x00];

    #[test]
    fn reads_header_fields() {
        let ma3 = build(0x02, 0x02, &SEQUENCE);
        assert_eq!(ma3.format().unwrap(), Format::MobileNoCompress);
        assert_eq!(
            ma3.timebase().unwrap(),
            Timebase::uniform(TimebaseCode::Ms4)
        );
        assert_eq!(ma3.channel_status(3).unwrap(), ChannelStatus::from(3));
        assert_eq!(ma3.channel_statuses().unwrap()[15], ChannelStatus::from(15));
        assert!(matches!(
            ma3.channel_status(16),
            Err(Error::InvalidChannel { channel: 16 })
        ));
    }

    #[test]
    fn reserved_format_is_reported() {
        let ma3 = build(0x07, 0x02, &SEQUENCE);
        assert_eq!(ma3.format().unwrap(), Format::Reserved(0x07));
    }

    #[test]
    fn empty_container_fails() {
        let ma3 = Ma3::default();
        assert!(matches!(ma3.format(), Err(Error::EmptyContainer)));
        assert!(matches!(ma3.verify_crc16(), Err(Error::EmptyContainer)));
        let mut ma3 = Ma3::default();
        assert!(matches!(ma3.fix_crc16(), Err(Error::EmptyContainer)));
        let mut ma3 = Ma3::from_bytes(vec![0x01]);
        assert!(matches!(ma3.fix_crc16(), Err(Error::ParseMa3 { .. })));
    }

    #[test]
    fn not_a_container() {
        let ma3 = Ma3::from_bytes(b"RIFF\x00\x00\x00\x00".to_vec());
        assert!(matches!(
            ma3.format(),
            Err(Error::ParseMa3 {
                source: ParseError::UnexpectedChunk { offset: 0, .. }
            })
        ));
    }

    #[test]
    fn crc_is_verified() {
        let mut ma3 = build(0x02, 0x02, &SEQUENCE);
        assert!(ma3.verify_crc16().unwrap());

        let mut bytes = ma3.clone().into_bytes();
        bytes[20] ^= 0x01;
        let corrupted = Ma3::from_bytes(bytes);
        assert!(!corrupted.verify_crc16().unwrap());

        ma3.fix_crc16().unwrap();
        assert!(ma3.verify_crc16().unwrap());
    }

    #[test]
    fn shrink_to_fit_drops_trailing_bytes() {
        let ma3 = build(0x02, 0x02, &SEQUENCE);
        let mut padded = ma3.clone().into_bytes();
        padded.extend([0xAA; 5]);
        let mut padded = Ma3::from_bytes(padded);
        padded.shrink_to_fit().unwrap();
        assert_eq!(padded, ma3);

        let mut truncated = Ma3::from_bytes(ma3.as_bytes()[..ma3.len() - 1].to_vec());
        assert!(truncated.shrink_to_fit().is_err());
        assert_eq!(truncated.len(), ma3.len() - 1);
    }

    #[test]
    fn patch_sizes_shifts_all_three_fields() {
        let ma3 = build(0x02, 0x02, &SEQUENCE);
        let layout = ma3.layout().unwrap();
        let mut bytes = ma3.into_bytes();
        patch_sizes(&mut bytes, &layout, -3).unwrap();
        for field in layout.size_fields() {
            let value = u32::from_be_bytes(bytes[field.position..][..4].try_into().unwrap());
            assert_eq!(value, field.value - 3);
        }

        assert!(matches!(
            patch_sizes(&mut bytes, &layout, -100),
            Err(Error::SizeOverflow { .. })
        ));
    }

    #[cfg(feature = "std")]
    #[test]
    fn write_to_copies_the_buffer() {
        let ma3 = build(0x02, 0x02, &SEQUENCE);
        let mut out = Vec::new();
        ma3.write_to(&mut out).unwrap();
        assert_eq!(out, ma3.as_bytes());

        assert!(matches!(
            Ma3::default().write_to(&mut out),
            Err(Error::EmptyContainer)
        ));
    }
}
