//! Score track header definitions:
//! format type, timebase and channel status.

use crate::ma3::ParseError;

/// Format type of a score track
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    /// Handy Phone Standard
    HandyPhone,
    /// Mobile Standard, compressed sequence data
    MobileCompress,
    /// Mobile Standard, uncompressed sequence data
    MobileNoCompress,
    /// Any other value (invalid)
    Reserved(u8),
}

impl From<u8> for Format {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Format::HandyPhone,
            0x01 => Format::MobileCompress,
            0x02 => Format::MobileNoCompress,
            v => Format::Reserved(v),
        }
    }
}

impl From<Format> for u8 {
    fn from(value: Format) -> Self {
        match value {
            Format::HandyPhone => 0x00,
            Format::MobileCompress => 0x01,
            Format::MobileNoCompress => 0x02,
            Format::Reserved(v) => v,
        }
    }
}

impl Format {
    /// Whether this is one of the two Mobile Standard formats,
    /// which carry channel status bytes in their header
    pub fn is_mobile(self) -> bool {
        matches!(self, Format::MobileCompress | Format::MobileNoCompress)
    }
}

/// A timebase code, converting duration or gatetime units to milliseconds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimebaseCode {
    Ms1,
    Ms2,
    Ms4,
    Ms5,
    Ms10,
    Ms20,
    Ms40,
    Ms50,
    /// Any other value (invalid)
    Reserved(u8),
}

impl From<u8> for TimebaseCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => TimebaseCode::Ms1,
            0x01 => TimebaseCode::Ms2,
            0x02 => TimebaseCode::Ms4,
            0x03 => TimebaseCode::Ms5,
            0x10 => TimebaseCode::Ms10,
            0x11 => TimebaseCode::Ms20,
            0x12 => TimebaseCode::Ms40,
            0x13 => TimebaseCode::Ms50,
            v => TimebaseCode::Reserved(v),
        }
    }
}

impl From<TimebaseCode> for u8 {
    fn from(value: TimebaseCode) -> Self {
        match value {
            TimebaseCode::Ms1 => 0x00,
            TimebaseCode::Ms2 => 0x01,
            TimebaseCode::Ms4 => 0x02,
            TimebaseCode::Ms5 => 0x03,
            TimebaseCode::Ms10 => 0x10,
            TimebaseCode::Ms20 => 0x11,
            TimebaseCode::Ms40 => 0x12,
            TimebaseCode::Ms50 => 0x13,
            TimebaseCode::Reserved(v) => v,
        }
    }
}

impl TimebaseCode {
    /// The resolution in milliseconds, or `None` if reserved
    pub fn millis(self) -> Option<u32> {
        match self {
            TimebaseCode::Ms1 => Some(1),
            TimebaseCode::Ms2 => Some(2),
            TimebaseCode::Ms4 => Some(4),
            TimebaseCode::Ms5 => Some(5),
            TimebaseCode::Ms10 => Some(10),
            TimebaseCode::Ms20 => Some(20),
            TimebaseCode::Ms40 => Some(40),
            TimebaseCode::Ms50 => Some(50),
            TimebaseCode::Reserved(_) => None,
        }
    }

    /// The code for a resolution in milliseconds
    pub fn from_millis(ms: u32) -> Option<Self> {
        match ms {
            1 => Some(TimebaseCode::Ms1),
            2 => Some(TimebaseCode::Ms2),
            4 => Some(TimebaseCode::Ms4),
            5 => Some(TimebaseCode::Ms5),
            10 => Some(TimebaseCode::Ms10),
            20 => Some(TimebaseCode::Ms20),
            40 => Some(TimebaseCode::Ms40),
            50 => Some(TimebaseCode::Ms50),
            _ => None,
        }
    }
}

/// The timebase pair of a score track
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timebase {
    /// Timebase of durations
    pub duration: TimebaseCode,
    /// Timebase of gatetimes
    pub gatetime: TimebaseCode,
}

impl Timebase {
    pub fn new(duration: TimebaseCode, gatetime: TimebaseCode) -> Self {
        Timebase { duration, gatetime }
    }

    /// A timebase with the same code for durations and gatetimes
    pub fn uniform(code: TimebaseCode) -> Self {
        Timebase::new(code, code)
    }

    /// Both codes are known and equal
    pub fn is_valid(&self) -> bool {
        self.duration.millis().is_some() && self.duration == self.gatetime
    }

    pub fn duration_ms(&self) -> Option<u32> {
        self.duration.millis()
    }

    pub fn gatetime_ms(&self) -> Option<u32> {
        self.gatetime.millis()
    }
}

/// Key control status of a channel
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyControl {
    NoCare,
    Off,
    On,
    Reserved,
}

/// Channel type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelType {
    NoCare,
    Melody,
    NoMelody,
    Rhythm,
}

/// The status byte of one channel (Mobile Standard formats only).
///
/// Layout: `KK V L -- TT`,
/// key control status in bits 7-6, vibration in bit 5, LED in bit 4
/// and the channel type in bits 1-0.
/// The byte is stored as is; the fields are read from it on demand.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChannelStatus(u8);

impl core::fmt::Debug for ChannelStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelStatus")
            .field("raw", &format_args!("0x{:02X}", self.0))
            .field("key_control", &self.key_control())
            .field("vibration", &self.vibration())
            .field("led", &self.led())
            .field("channel_type", &self.channel_type())
            .finish()
    }
}

impl From<u8> for ChannelStatus {
    fn from(value: u8) -> Self {
        ChannelStatus(value)
    }
}

impl From<ChannelStatus> for u8 {
    fn from(value: ChannelStatus) -> Self {
        value.0
    }
}

impl ChannelStatus {
    /// The neutral status: no key control, vibration and LED off, no channel type
    pub const NEUTRAL: ChannelStatus = ChannelStatus(0);

    pub fn new(
        key_control: KeyControl,
        vibration: bool,
        led: bool,
        channel_type: ChannelType,
    ) -> Self {
        let kcs = match key_control {
            KeyControl::NoCare => 0,
            KeyControl::Off => 1,
            KeyControl::On => 2,
            KeyControl::Reserved => 3,
        };
        let ty = match channel_type {
            ChannelType::NoCare => 0,
            ChannelType::Melody => 1,
            ChannelType::NoMelody => 2,
            ChannelType::Rhythm => 3,
        };
        ChannelStatus(kcs << 6 | (vibration as u8) << 5 | (led as u8) << 4 | ty)
    }

    pub fn to_u8(self) -> u8 {
        self.0
    }

    pub fn key_control(self) -> KeyControl {
        match self.0 >> 6 {
            0 => KeyControl::NoCare,
            1 => KeyControl::Off,
            2 => KeyControl::On,
            _ => KeyControl::Reserved,
        }
    }

    pub fn vibration(self) -> bool {
        self.0 & 0b0010_0000 != 0
    }

    pub fn led(self) -> bool {
        self.0 & 0b0001_0000 != 0
    }

    pub fn channel_type(self) -> ChannelType {
        match self.0 & 0b11 {
            0 => ChannelType::NoCare,
            1 => ChannelType::Melody,
            2 => ChannelType::NoMelody,
            _ => ChannelType::Rhythm,
        }
    }
}

/// The fixed header at the start of a score track chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreHeader {
    pub format: Format,
    pub sequence_type: u8,
    pub timebase: Timebase,
    pub channels: [ChannelStatus; ScoreHeader::CHANNELS],
}

impl ScoreHeader {
    /// Number of channel status bytes
    pub const CHANNELS: usize = 16;
    /// Size of the header in bytes
    pub const SIZE: usize = 4 + Self::CHANNELS;

    /// Offset of the format byte
    pub(crate) const FORMAT_OFFSET: usize = 0;
    /// Offset of the duration timebase byte (the gatetime byte follows)
    pub(crate) const TIMEBASE_OFFSET: usize = 2;
    /// Offset of the first channel status byte
    pub(crate) const CHANNELS_OFFSET: usize = 4;

    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if bytes.len() < Self::SIZE {
            return Err(ParseError::InsufficientBytes {
                context: "ScoreHeader",
            });
        }
        let (bytes, rest) = bytes.split_at(Self::SIZE);

        let mut channels = [ChannelStatus::NEUTRAL; Self::CHANNELS];
        for (status, &byte) in channels.iter_mut().zip(&bytes[Self::CHANNELS_OFFSET..]) {
            *status = ChannelStatus(byte);
        }

        let header = ScoreHeader {
            format: bytes[Self::FORMAT_OFFSET].into(),
            sequence_type: bytes[1],
            timebase: Timebase::new(
                bytes[Self::TIMEBASE_OFFSET].into(),
                bytes[Self::TIMEBASE_OFFSET + 1].into(),
            ),
            channels,
        };

        Ok((header, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChannelStatus, ChannelType, Format, KeyControl, ScoreHeader, Timebase, TimebaseCode,
    };

    #[test]
    fn format_codes() {
        assert_eq!(Format::from(0x00), Format::HandyPhone);
        assert_eq!(Format::from(0x01), Format::MobileCompress);
        assert_eq!(Format::from(0x02), Format::MobileNoCompress);
        assert_eq!(Format::from(0x03), Format::Reserved(0x03));
        assert_eq!(u8::from(Format::MobileNoCompress), 0x02);
        assert!(!Format::HandyPhone.is_mobile());
        assert!(Format::MobileCompress.is_mobile());
    }

    #[test]
    fn timebase_codes_map_to_millis() {
        let expected = [
            (0x00, 1),
            (0x01, 2),
            (0x02, 4),
            (0x03, 5),
            (0x10, 10),
            (0x11, 20),
            (0x12, 40),
            (0x13, 50),
        ];
        for (code, ms) in expected {
            let tb = TimebaseCode::from(code);
            assert_eq!(tb.millis(), Some(ms));
            assert_eq!(TimebaseCode::from_millis(ms), Some(tb));
            assert_eq!(u8::from(tb), code);
        }
        assert_eq!(TimebaseCode::from(0x04).millis(), None);
        assert_eq!(TimebaseCode::from(0xFF), TimebaseCode::Reserved(0xFF));
        assert_eq!(TimebaseCode::from_millis(3), None);
    }

    #[test]
    fn timebase_validity() {
        assert!(Timebase::uniform(TimebaseCode::Ms4).is_valid());
        assert!(!Timebase::new(TimebaseCode::Ms4, TimebaseCode::Ms5).is_valid());
        assert!(!Timebase::uniform(TimebaseCode::Reserved(0xFF)).is_valid());
        assert!(!Timebase::new(TimebaseCode::Reserved(0x20), TimebaseCode::Ms1).is_valid());
    }

    #[test]
    fn channel_status_fields_agree_with_byte() {
        let status = ChannelStatus::new(KeyControl::On, true, false, ChannelType::Rhythm);
        assert_eq!(status.to_u8(), 0b1010_0011);
        assert_eq!(status.key_control(), KeyControl::On);
        assert!(status.vibration());
        assert!(!status.led());
        assert_eq!(status.channel_type(), ChannelType::Rhythm);

        let status = ChannelStatus::from(0b0101_1101);
        assert_eq!(status.key_control(), KeyControl::Off);
        assert!(!status.vibration());
        assert!(status.led());
        assert_eq!(status.channel_type(), ChannelType::Melody);
        // unused bits are kept
        assert_eq!(u8::from(status), 0b0101_1101);
    }

    #[test]
    fn neutral_status_is_zero() {
        let status = ChannelStatus::new(KeyControl::NoCare, false, false, ChannelType::NoCare);
        assert_eq!(status, ChannelStatus::NEUTRAL);
        assert_eq!(status.to_u8(), 0);
    }

    #[test]
    fn parse_score_header() {
        let mut bytes = vec![0x02, 0x00, 0x02, 0x02];
        bytes.extend((0..16).map(|ch| ch as u8));
        bytes.push(0xAA);

        let (header, rest) = ScoreHeader::parse(&bytes).unwrap();
        assert_eq!(header.format, Format::MobileNoCompress);
        assert_eq!(header.sequence_type, 0);
        assert_eq!(header.timebase, Timebase::uniform(TimebaseCode::Ms4));
        assert_eq!(header.channels[15], ChannelStatus::from(15));
        assert_eq!(rest, &[0xAA]);

        assert!(ScoreHeader::parse(&bytes[..19]).is_err());
    }
}
