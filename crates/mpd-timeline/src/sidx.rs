//! Segment index (`sidx`) box decoding, ISO/IEC 14496-12 8.16.3.
//!
//! ```text
//! aligned(8) class SegmentIndexBox extends FullBox('sidx', version, 0) {
//!     unsigned int(32) reference_ID;
//!     unsigned int(32) timescale;
//!     if (version==0) {
//!         unsigned int(32) earliest_presentation_time;
//!         unsigned int(32) first_offset;
//!     } else {
//!         unsigned int(64) earliest_presentation_time;
//!         unsigned int(64) first_offset;
//!     }
//!     unsigned int(16) reserved = 0;
//!     unsigned int(16) reference_count;
//!     for(i=1; i <= reference_count; i++) {
//!         bit (1) reference_type;
//!         unsigned int(31) referenced_size;
//!         unsigned int(32) subsegment_duration;
//!         bit(1) starts_with_SAP;
//!         unsigned int(3) SAP_type;
//!         unsigned int(28) SAP_delta_time;
//!     }
//! }
//! ```

use std::{
    io::{Cursor, Read},
    time::Duration,
};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{
    util::time::{scaled, scaled_span},
    ByteRange, TimeRange, TimelineError, TimelineResult,
};

const SIDX_SIGNATURE: &[u8; 4] = b"sidx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidxEntry {
    pub byte_range: ByteRange,
    pub time_range: TimeRange,
}

/// Decoded media references of a single `sidx` box.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentIndex {
    pub reference_id: u32,
    pub timescale: u32,
    pub entries: Vec<SidxEntry>,
    /// End of the last indexed subsegment.
    pub max_index_time: Duration,
    pub average_segment_duration: Duration,
}

impl SegmentIndex {
    /// Decodes a `sidx` box from the start of `data`.
    ///
    /// `anchor` is the absolute file offset of the first byte following the index box;
    /// `first_offset` is counted from there.
    pub fn decode(data: &[u8], anchor: u64) -> TimelineResult<Self> {
        let mut reader = Cursor::new(data);

        let size = reader.read_u32::<BigEndian>()?;
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        if &signature != SIDX_SIGNATURE {
            return Err(TimelineError::IndexSignature(signature));
        }

        let declared = if size == 1 {
            reader.read_u64::<BigEndian>()?
        } else {
            u64::from(size)
        };
        if declared > data.len() as u64 {
            return Err(TimelineError::IndexTooShort {
                declared,
                available: data.len(),
            });
        }

        let version = reader.read_u8()?;
        // flags, not a 24-bit integer on the wire
        let mut flags = [0u8; 3];
        for flag in flags.iter_mut() {
            *flag = reader.read_u8()?;
        }

        let reference_id = reader.read_u32::<BigEndian>()?;
        let timescale = reader.read_u32::<BigEndian>()?;
        let (earliest_presentation_time, first_offset) = if version == 0 {
            (
                u64::from(reader.read_u32::<BigEndian>()?),
                u64::from(reader.read_u32::<BigEndian>()?),
            )
        } else {
            (
                reader.read_u64::<BigEndian>()?,
                reader.read_u64::<BigEndian>()?,
            )
        };
        let _reserved = reader.read_u16::<BigEndian>()?;
        let reference_count = reader.read_u16::<BigEndian>()?;

        let ticks_per_second = u64::from(timescale);
        let mut entries = Vec::with_capacity(reference_count as usize);
        let mut time = earliest_presentation_time;
        let mut offset = anchor + first_offset;
        let mut average = 0f64;

        for _ in 0..reference_count {
            // 1 bit for reference_type, 31 bits for referenced_size
            let chunk = reader.read_u32::<BigEndian>()?;
            let subsegment_duration = reader.read_u32::<BigEndian>()?;
            let _sap = reader.read_u32::<BigEndian>()?;

            if chunk >> 31 == 1 {
                return Err(TimelineError::NestedIndexUnsupported);
            }
            let referenced_size = u64::from(chunk & 0x7FFF_FFFF);
            let duration = u64::from(subsegment_duration);

            if referenced_size == 0 {
                tracing::debug!(offset, time, "Skipping empty subsegment reference");
            } else {
                entries.push(SidxEntry {
                    byte_range: ByteRange::new(offset, offset + referenced_size - 1),
                    time_range: TimeRange::new(
                        scaled(time, ticks_per_second),
                        scaled_span(time, duration, ticks_per_second),
                    ),
                });
                average += (duration as f64 - average) / entries.len() as f64;
            }

            time += duration;
            offset += referenced_size;
        }

        Ok(Self {
            reference_id,
            timescale,
            entries,
            max_index_time: scaled(time, ticks_per_second),
            average_segment_duration: Duration::from_secs_f64(
                average / ticks_per_second.max(1) as f64,
            ),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
