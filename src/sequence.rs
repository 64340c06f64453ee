//! Sequence data (`Mtsq`) event codec.
//!
//! The sequence data is a flat list of events:
//!
//! ```text
//! duration, status [, data...] [, gatetime]
//! ```
//!
//! Durations and gatetimes are [`Varint`]s.
//! Only note events carry a gatetime,
//! so the meaning of each byte depends on what came before it.
//! [`SequenceReader`] tracks this with a three-state machine
//! and yields one [`Step`] per duration, event or gatetime,
//! without interpreting the musical meaning of the events.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use snafu::{OptionExt, ResultExt};

use crate::data_types::Varint;
use crate::ma3::{ParseError, ParseMa3Snafu, Result as Ma3Result, TimeOverflowSnafu};

/// Size of a NOP record (`FF 00`)
pub const NOP_SIZE: usize = 2;
/// Size of an end-of-sequence record (`FF 2F 00`)
pub const EOS_SIZE: usize = 3;
/// Size of the duration that precedes a trailing NOP or EOS record
pub const PADDING_DURATION_SIZE: usize = 1;

/// What the next bytes of sequence data hold
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SequenceState {
    Duration,
    Status,
    Gatetime,
}

/// Classification of one event by its status byte
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `0x8n`: note without velocity
    NoteNoVelocity,
    /// `0x9n`: note with velocity
    NoteVelocity,
    /// `0xAn`: reserved, 3 bytes
    Reserved3,
    /// `0xBn`: control change
    ControlChange,
    /// `0xCn`: program change
    ProgramChange,
    /// `0xDn`: reserved, 2 bytes
    Reserved2,
    /// `0xEn`: pitch bend
    PitchBend,
    /// `0xF0`: system exclusive message with `length` bytes of payload
    Exclusive { length: u32 },
    /// `0xFF 0x2F`: end of sequence
    EndOfSequence,
    /// `0xFF` followed by anything else: no operation
    Nop,
    /// Any other `0xFn` status byte
    System,
}

impl EventKind {
    /// Classify the event starting at `bytes[0]`,
    /// returning it along with its total size in bytes.
    ///
    /// The size is not checked against the length of `bytes`,
    /// except where needed to classify the event.
    fn classify(bytes: &[u8]) -> Result<(Self, usize), Option<u8>> {
        let status = *bytes.first().ok_or(None)?;
        let classified = match status & 0xF0 {
            0x80 => (EventKind::NoteNoVelocity, 2),
            0x90 => (EventKind::NoteVelocity, 3),
            0xA0 => (EventKind::Reserved3, 3),
            0xB0 => (EventKind::ControlChange, 3),
            0xC0 => (EventKind::ProgramChange, 2),
            0xD0 => (EventKind::Reserved2, 2),
            0xE0 => (EventKind::PitchBend, 3),
            0xF0 => match status {
                0xF0 => {
                    let (length, rest) = Varint::parse(&bytes[1..]).map_err(|_| None)?;
                    let header = bytes.len() - rest.len();
                    (
                        EventKind::Exclusive {
                            length: length.to_u32(),
                        },
                        header + length.to_u32() as usize,
                    )
                }
                0xFF => match bytes.get(1) {
                    Some(0x2F) => (EventKind::EndOfSequence, EOS_SIZE),
                    Some(_) => (EventKind::Nop, NOP_SIZE),
                    None => return Err(None),
                },
                _ => (EventKind::System, 1),
            },
            _ => return Err(Some(status)),
        };
        Ok(classified)
    }

    /// The state that follows this event
    pub fn next_state(self) -> SequenceState {
        match self {
            EventKind::NoteNoVelocity | EventKind::NoteVelocity => SequenceState::Gatetime,
            _ => SequenceState::Duration,
        }
    }
}

/// What a step of the sequence data holds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepKind {
    Duration(Varint),
    Event(EventKind),
    Gatetime(Varint),
}

/// One item of sequence data
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Step {
    /// Offset of the first byte, relative to the start of the sequence data
    pub offset: usize,
    /// Number of bytes
    pub len: usize,
    pub kind: StepKind,
}

/// Iterator over the steps of a block of sequence data.
///
/// Iteration stops at the end of the data
/// or after the first error.
#[derive(Debug, Clone)]
pub struct SequenceReader<'a> {
    data: &'a [u8],
    /// Offset of `data` in the container, for error reporting
    base: usize,
    offset: usize,
    state: SequenceState,
}

impl<'a> SequenceReader<'a> {
    /// Read the sequence data `data`,
    /// located at offset `base` of its container.
    pub fn new(data: &'a [u8], base: usize) -> Self {
        SequenceReader {
            data,
            base,
            offset: 0,
            state: SequenceState::Duration,
        }
    }

    /// The state the machine is in
    pub fn state(&self) -> SequenceState {
        self.state
    }

    fn read_varint(&self) -> Result<(Varint, usize), ParseError> {
        let bytes = &self.data[self.offset..];
        let (value, rest) = Varint::parse(bytes).map_err(|source| ParseError::InvalidVarint {
            offset: self.base + self.offset,
            source,
        })?;
        Ok((value, bytes.len() - rest.len()))
    }

    fn read_step(&mut self) -> Result<Step, ParseError> {
        let offset = self.offset;
        let (kind, len, next) = match self.state {
            SequenceState::Duration => {
                let (value, len) = self.read_varint()?;
                (StepKind::Duration(value), len, SequenceState::Status)
            }
            SequenceState::Status => {
                let (event, len) =
                    EventKind::classify(&self.data[offset..]).map_err(|status| match status {
                        Some(status) => ParseError::UnsupportedStatus {
                            status,
                            offset: self.base + offset,
                        },
                        None => ParseError::TruncatedEvent {
                            offset: self.base + offset,
                        },
                    })?;
                if offset + len > self.data.len() {
                    return Err(ParseError::TruncatedEvent {
                        offset: self.base + offset,
                    });
                }
                (StepKind::Event(event), len, event.next_state())
            }
            SequenceState::Gatetime => {
                let (value, len) = self.read_varint()?;
                (StepKind::Gatetime(value), len, SequenceState::Duration)
            }
        };
        self.offset += len;
        self.state = next;
        Ok(Step { offset, len, kind })
    }
}

impl Iterator for SequenceReader<'_> {
    type Item = Result<Step, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let step = self.read_step();
        if step.is_err() {
            self.offset = self.data.len();
        }
        Some(step)
    }
}

/// Trailing padding of a sequence,
/// as measured by a full pass over its events.
///
/// The padding is the run of NOP and end-of-sequence records
/// (with their durations) that closes the sequence data.
/// Any other event ends the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PaddingScan {
    /// NOP records in the trailing run
    pub nop_count: u32,
    /// Whether the trailing run holds an end-of-sequence record
    pub end_of_sequence: bool,
    /// Gatetime of the last note
    pub last_gatetime: Option<Varint>,
    /// Offset of the duration before the first trailing record,
    /// relative to the start of the sequence data
    pub padding_start: Option<usize>,
    /// Number of bytes from `padding_start` to the end of the sequence data
    pub padding_size: usize,
}

impl PaddingScan {
    /// Run the measuring pass over the whole sequence.
    pub fn measure(reader: SequenceReader<'_>) -> Result<Self, ParseError> {
        let end = reader.data.len();
        let mut scan = PaddingScan::default();
        let mut duration = 0;
        for step in reader {
            let step = step?;
            match step.kind {
                StepKind::Duration(_) => duration = step.offset,
                StepKind::Event(EventKind::Nop) => {
                    scan.padding_start.get_or_insert(duration);
                    scan.nop_count += 1;
                }
                StepKind::Event(EventKind::EndOfSequence) => {
                    scan.padding_start.get_or_insert(duration);
                    scan.end_of_sequence = true;
                }
                StepKind::Gatetime(value) => {
                    scan.last_gatetime = Some(value);
                    scan.clear_padding();
                }
                StepKind::Event(_) => scan.clear_padding(),
            }
        }
        scan.padding_size = scan.padding_start.map_or(0, |start| end - start);
        Ok(scan)
    }

    fn clear_padding(&mut self) {
        self.nop_count = 0;
        self.end_of_sequence = false;
        self.padding_start = None;
    }

    /// Number of bytes taken by the trailing padding.
    ///
    /// With one-byte durations this is
    /// 3 bytes per NOP plus 4 for the end of sequence.
    pub fn reduce_size(&self) -> usize {
        self.padding_size
    }
}

/// Find the status byte of the first note with velocity,
/// relative to the start of the sequence data.
pub fn first_note_with_velocity(reader: SequenceReader<'_>) -> Result<Option<usize>, ParseError> {
    for step in reader {
        let step = step?;
        if step.kind == StepKind::Event(EventKind::NoteVelocity) {
            return Ok(Some(step.offset));
        }
    }
    Ok(None)
}

/// Scale one duration or gatetime, rounding to the nearest unit.
///
/// Zero stays zero.
pub fn scale_time(value: Varint, scale: f64) -> Ma3Result<Varint> {
    if value == Varint::ZERO {
        return Ok(value);
    }
    let scaled = f64::from(value.to_u32()) * scale + 0.5;
    Varint::try_from(scaled as u64)
        .ok()
        .context(TimeOverflowSnafu { value: scaled })
}

/// Copy the sequence data read by `reader` into `out`,
/// scaling every duration and gatetime by `scale`.
///
/// Events are copied as they are.
/// Times are re-encoded with the fewest bytes possible.
pub fn transcribe(reader: SequenceReader<'_>, scale: f64, out: &mut Vec<u8>) -> Ma3Result<()> {
    let data = reader.data;
    for step in reader {
        let step = step.context(ParseMa3Snafu)?;
        match step.kind {
            StepKind::Duration(value) | StepKind::Gatetime(value) => {
                scale_time(value, scale)?.push_to(out);
            }
            StepKind::Event(_) => out.extend_from_slice(&data[step.offset..step.offset + step.len]),
        }
    }
    Ok(())
}
