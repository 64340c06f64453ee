//! Edits on a whole container.
//!
//! Header rewrites change bytes in place.
//! Edits that change the size of the sequence data build a new buffer,
//! patch the three enclosing length fields and recompute the CRC,
//! so a failed edit never leaves a container half written.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use snafu::{ensure, OptionExt, ResultExt};

use crate::chunk::{Layout, CRC_SIZE};
use crate::data_types::Varint;
use crate::header::{ChannelStatus, ChannelType, Format, KeyControl, ScoreHeader, Timebase};
use crate::ma3::{
    patch_sizes, store_crc16, InvalidChannelSnafu, InvalidRatioSnafu, InvalidTimebaseSnafu, Ma3,
    MissingGatetimeSnafu, MissingNoteSnafu, ParseMa3Snafu, Result, TimeOverflowSnafu,
};
use crate::sequence::{first_note_with_velocity, transcribe, PaddingScan, SequenceReader};

fn uncompressed(format: Format) -> bool {
    format == Format::MobileNoCompress
}

impl Ma3 {
    fn sequence(&self, layout: &Layout) -> SequenceReader<'_> {
        SequenceReader::new(
            &self.as_bytes()[layout.sequence_start..layout.sequence_end],
            layout.sequence_start,
        )
    }

    /// Offset where the trailing padding of the sequence data begins
    fn padding_start(layout: &Layout, scan: &PaddingScan) -> usize {
        layout.sequence_end - scan.reduce_size()
    }

    /// Remove the NOP and end-of-sequence records
    /// that follow the last note of the sequence data.
    ///
    /// The container is left as is if there is no such padding.
    pub fn remove_nop(&mut self) -> Result<()> {
        let layout = self.layout()?;
        self.require_format(&layout, uncompressed)?;

        let scan = PaddingScan::measure(self.sequence(&layout)).context(ParseMa3Snafu)?;
        let reduce = scan.reduce_size();
        if reduce == 0 {
            return Ok(());
        }
        let cut = Self::padding_start(&layout, &scan);

        let src = self.as_bytes();
        let mut data = Vec::with_capacity(layout.container_end - reduce);
        data.extend_from_slice(&src[..cut]);
        data.extend_from_slice(&src[layout.sequence_end..layout.container_end]);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            nop_count = scan.nop_count,
            end_of_sequence = scan.end_of_sequence,
            "removing {reduce} bytes of padding"
        );

        patch_sizes(&mut data, &layout, -(reduce as i64))?;
        let end = data.len();
        store_crc16(&mut data, end);
        *self = Ma3::from(data);
        Ok(())
    }

    /// Reset the status of every channel to [`ChannelStatus::NEUTRAL`].
    pub fn clear_channel_status(&mut self) -> Result<()> {
        let layout = self.layout()?;
        self.require_format(&layout, Format::is_mobile)?;

        let neutral = ChannelStatus::new(KeyControl::NoCare, false, false, ChannelType::NoCare);
        let start = layout.score_header + ScoreHeader::CHANNELS_OFFSET;
        let data = self.bytes_mut();
        data[start..start + ScoreHeader::CHANNELS].fill(neutral.to_u8());
        store_crc16(data, layout.container_end);
        Ok(())
    }

    /// Set the status of one channel.
    pub fn change_channel_status(&mut self, channel: usize, status: ChannelStatus) -> Result<()> {
        ensure!(
            channel < ScoreHeader::CHANNELS,
            InvalidChannelSnafu { channel }
        );
        let layout = self.layout()?;
        self.require_format(&layout, Format::is_mobile)?;

        let data = self.bytes_mut();
        data[layout.score_header + ScoreHeader::CHANNELS_OFFSET + channel] = status.to_u8();
        store_crc16(data, layout.container_end);
        Ok(())
    }

    /// Write a new timebase to the score header.
    ///
    /// Only the header changes, not the times in the sequence data
    /// (see [`Ma3::change_tempo`]).
    pub fn change_timebase(&mut self, timebase: Timebase) -> Result<()> {
        ensure!(timebase.is_valid(), InvalidTimebaseSnafu { timebase });
        let layout = self.layout()?;
        self.require_format(&layout, Format::is_mobile)?;

        let offset = layout.score_header + ScoreHeader::TIMEBASE_OFFSET;
        let data = self.bytes_mut();
        data[offset] = timebase.duration.into();
        data[offset + 1] = timebase.gatetime.into();
        store_crc16(data, layout.container_end);
        Ok(())
    }

    /// Create a copy of this container played at a different tempo.
    ///
    /// Every duration and gatetime is rescaled
    /// from the current timebase to `timebase`,
    /// and then divided by `ratio`:
    /// a ratio of 2 plays twice as fast.
    pub fn change_tempo(&self, timebase: Timebase, ratio: f64) -> Result<Ma3> {
        let layout = self.layout()?;
        self.require_format(&layout, uncompressed)?;

        ensure!(timebase.is_valid(), InvalidTimebaseSnafu { timebase });
        ensure!(ratio.is_finite() && ratio > 0., InvalidRatioSnafu { ratio });
        let current = self.score_header_at(&layout)?.timebase;
        ensure!(current.is_valid(), InvalidTimebaseSnafu { timebase: current });
        let (Some(current_ms), Some(target_ms)) = (current.duration_ms(), timebase.duration_ms())
        else {
            return InvalidTimebaseSnafu { timebase }.fail();
        };
        let scale = f64::from(current_ms) / (f64::from(target_ms) * ratio);

        let src = self.as_bytes();
        let mut data = Vec::with_capacity(layout.container_end);
        data.extend_from_slice(&src[..layout.sequence_start]);
        transcribe(self.sequence(&layout), scale, &mut data)?;
        data.extend_from_slice(&src[layout.sequence_end..layout.crc_position()]);
        data.extend_from_slice(&[0; CRC_SIZE]);

        let delta = data.len() as i64 - layout.container_end as i64;

        #[cfg(feature = "tracing")]
        tracing::debug!(scale, delta, "rescaled sequence data");

        patch_sizes(&mut data, &layout, delta)?;
        let mut out = Ma3::from(data);
        out.change_timebase(timebase)?;
        Ok(out)
    }

    /// Append the notes of `second` to those of `first`.
    ///
    /// The trailing padding of `first` is dropped
    /// and `second` is played from its first note with velocity,
    /// `gap` units after the last gatetime of `first`.
    /// Everything else comes from `first`.
    pub fn combine(first: &Ma3, second: &Ma3, gap: u32) -> Result<Ma3> {
        let layout = first.layout()?;
        first.require_format(&layout, uncompressed)?;
        let second_layout = second.layout()?;
        second.require_format(&second_layout, uncompressed)?;

        let scan = PaddingScan::measure(first.sequence(&layout)).context(ParseMa3Snafu)?;
        let last_gatetime = scan.last_gatetime.context(MissingGatetimeSnafu)?;
        let note = first_note_with_velocity(second.sequence(&second_layout))
            .context(ParseMa3Snafu)?
            .context(MissingNoteSnafu)?;

        let gap_time = u64::from(last_gatetime.to_u32()) + u64::from(gap);
        let gap_time = Varint::try_from(gap_time).ok().context(TimeOverflowSnafu {
            value: gap_time as f64,
        })?;
        let cut = Self::padding_start(&layout, &scan);

        let src = first.as_bytes();
        let mut data = Vec::with_capacity(layout.container_end + second_layout.sequence_end);
        data.extend_from_slice(&src[..cut]);
        gap_time.push_to(&mut data);
        data.extend_from_slice(
            &second.as_bytes()[second_layout.sequence_start + note..second_layout.sequence_end],
        );
        data.extend_from_slice(&src[layout.sequence_end..layout.crc_position()]);
        data.extend_from_slice(&[0; CRC_SIZE]);

        let delta = data.len() as i64 - layout.container_end as i64;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            removed = scan.reduce_size(),
            gap = gap_time.to_u32(),
            delta,
            "combined sequence data"
        );

        patch_sizes(&mut data, &layout, delta)?;
        let end = data.len();
        store_crc16(&mut data, end);
        Ok(Ma3::from(data))
    }
}
