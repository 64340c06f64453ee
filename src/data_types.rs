//! Data types used in the container format.

use core::fmt::Write as _;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use snafu::Snafu;

/// Error parsing a variable-length integer
#[derive(Debug, PartialEq, Snafu)]
pub enum ParseError {
    /// Insufficient bytes to parse variable-length integer (byte #{byte})
    InsufficientBytes { byte: u8 },
    /// Variable-length integer is not terminated within 4 bytes
    Unterminated,
}

/// A MIDI-style variable-length quantity, as used for durations and
/// gatetimes in the sequence data.
///
/// In its encoded form each byte carries 7 bits of the value,
/// most significant group first,
/// and the high bit of each byte indicates whether another byte follows it.
/// The format allows at most 4 bytes, so the type holds up to 28 bits.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Varint(u32);

impl core::fmt::Display for Varint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Integer too large for a variable-length quantity (28 bits maximum)
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq, Snafu)]
pub struct InvalidVarintError;

impl From<u16> for Varint {
    fn from(value: u16) -> Self {
        Self(value as u32)
    }
}

impl From<u8> for Varint {
    fn from(value: u8) -> Self {
        Self(value as u32)
    }
}

impl TryFrom<u32> for Varint {
    type Error = InvalidVarintError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > Self::MAX.0 {
            Err(InvalidVarintError)
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<u64> for Varint {
    type Error = InvalidVarintError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map_err(|_| InvalidVarintError)
            .and_then(<Self as TryFrom<u32>>::try_from)
    }
}

impl Varint {
    pub const MAX: Self = Self(0x0FFF_FFFF);
    pub const ZERO: Self = Self(0);
    /// The maximum number of bytes in an encoded quantity
    pub const MAX_BYTES: usize = 4;

    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// Parse a variable-length quantity from a byte slice,
    /// returning the parsed value and the remaining bytes
    pub fn parse(from: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        let mut value = 0u32;
        for i in 0..Self::MAX_BYTES {
            let byte = from
                .get(i)
                .copied()
                .ok_or(ParseError::InsufficientBytes { byte: i as u8 })?;

            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok((Self(value), &from[i + 1..]));
            }
        }
        Err(ParseError::Unterminated)
    }

    /// Write the integer to a mutable slice,
    /// returning the number of bytes written.
    ///
    /// If the slice is too short to contain the integer,
    /// the result may be trimmed.
    pub fn write_to_slice(self, to: &mut [u8]) -> u8 {
        let len = self.byte_length();
        let mut k = 0;
        for (i, byte) in to.iter_mut().take(len as usize).enumerate() {
            let shift = 7 * (len as usize - 1 - i);
            *byte = ((self.0 >> shift) & 0x7F) as u8;
            if i + 1 < len as usize {
                *byte |= 0x80;
            }
            k += 1;
        }
        k
    }

    /// Append the minimal encoding of this integer to a byte vector.
    pub fn push_to(self, out: &mut Vec<u8>) {
        let mut buf = [0u8; Self::MAX_BYTES];
        let k = self.write_to_slice(&mut buf);
        out.extend_from_slice(&buf[..k as usize]);
    }

    /// Get the number of bytes needed to encode this integer.
    pub fn byte_length(self) -> u8 {
        if self.0 < (1 << 7) {
            1
        } else if self.0 < (1 << 14) {
            2
        } else if self.0 < (1 << 21) {
            3
        } else {
            4
        }
    }
}

/// Size does not fit in a 32-bit length field: {value}
#[derive(Debug, Copy, Clone, Eq, PartialEq, Snafu)]
pub struct SizeOverflowError {
    pub value: i64,
}

/// Read a 4-byte big-endian length field from the start of `bytes`.
pub fn read_fixed_size(bytes: &[u8]) -> Option<u32> {
    let field: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(field))
}

/// Write a 4-byte big-endian length field.
///
/// Values outside of the `u32` range are rejected
/// instead of being truncated.
pub fn write_fixed_size(value: i64, out: &mut [u8; 4]) -> Result<(), SizeOverflowError> {
    let value = u32::try_from(value).map_err(|_| SizeOverflowError { value })?;
    *out = value.to_be_bytes();
    Ok(())
}

/// Display an array of bytes as ASCII text
pub(crate) struct Ascii<T>(pub T);

impl<T> core::fmt::Debug for Ascii<T>
where
    T: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_char('"')?;
        core::fmt::Display::fmt(self, f)?;
        f.write_char('"')?;
        Ok(())
    }
}

impl<T> core::fmt::Display for Ascii<T>
where
    T: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for &byte in self.0.as_ref() {
            if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02X}", byte)?;
            }
        }
        Ok(())
    }
}
