//! CRC16 engine for the trailing integrity field of a container.

/// A table-driven 16-bit CRC.
///
/// The lookup table is built once on construction
/// (either at compile time through [`Crc16::SMAF`] or with [`Crc16::new`])
/// and reused for every checksum computed with it.
#[derive(Clone)]
pub struct Crc16 {
    table: [u16; 256],
}

impl core::fmt::Debug for Crc16 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Crc16")
            .field("poly", &format_args!("0x{:04X}", self.table[1]))
            .finish()
    }
}

impl Crc16 {
    /// Polynomial used by SMAF containers (CCITT)
    pub const POLY: u16 = 0x1021;

    /// Engine for the SMAF polynomial, with the table built at compile time
    pub const SMAF: Crc16 = Crc16::new(Self::POLY);

    /// Build the lookup table for the given polynomial.
    pub const fn new(poly: u16) -> Self {
        let mut table = [0u16; 256];
        let mut i = 0;
        while i < 256 {
            let mut r = (i as u16) << 8;
            let mut j = 0;
            while j < 8 {
                if r & 0x8000 != 0 {
                    r = (r << 1) ^ poly;
                } else {
                    r <<= 1;
                }
                j += 1;
            }
            table[i] = r;
            i += 1;
        }
        Crc16 { table }
    }

    /// Compute the checksum of `bytes`.
    ///
    /// The register starts at `0xFFFF`
    /// and the complement of its final value is returned.
    /// Any input is accepted, so an empty slice yields `0x0000`:
    /// checks on the container itself happen in [`Ma3`](crate::Ma3).
    pub fn make(&self, bytes: &[u8]) -> u16 {
        let r = bytes.iter().fold(0xFFFFu16, |r, &byte| {
            (r << 8) ^ self.table[usize::from((r >> 8) as u8 ^ byte)]
        });
        !r
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::SMAF
    }
}
