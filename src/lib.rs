//! Implementation of SMAF MA-3 container editing.
//!
//! This crate reads the chunk structure of a [SMAF][smaf] MA-3 file
//! (the format of Yamaha mobile phone ringtones)
//! and applies byte-level edits to it,
//! always producing a consistent container:
//! length fields and the trailing CRC are updated after every edit.
//! A quick overview of the modules:
//!
//! - `ma3`: the in-memory container and its accessors
//! - `edit`: edits (padding removal, channel status, timebase, tempo, concatenation)
//! - `chunk`: chunk tags and the offsets of a container
//! - `header`: score track header definitions
//! - `sequence`: sequence data event codec
//! - `crc`: the CRC16 of the container
//!
//! [smaf]: https://en.wikipedia.org/wiki/Synthetic_music_mobile_application_format
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod chunk;
pub mod crc;
pub mod data_types;
mod edit;
pub mod header;
pub mod ma3;
pub mod sequence;

pub use crate::chunk::{ChunkTag, Layout};
pub use crate::crc::Crc16;
pub use crate::data_types::Varint;
pub use crate::header::{ChannelStatus, ChannelType, Format, KeyControl, Timebase, TimebaseCode};
pub use crate::ma3::{Error as Ma3Error, Ma3};
