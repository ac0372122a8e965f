//! Value snapshots of the volatile document and period fields.
//!
//! Streams only ever read wall-clock context from the snapshot they were last bound to, so a
//! manifest reload never changes the answers of an already bound stream.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::node::DocumentNode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeriodType {
    #[default]
    Unknown,
    Regular,
    EarlyAvailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentParameters {
    pub is_dynamic: bool,
    pub media_presentation_duration: Option<Duration>,
    pub min_buffer_time: Option<Duration>,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub availability_end_time: Option<DateTime<Utc>>,
    pub publish_time: Option<DateTime<Utc>>,
    pub time_shift_buffer_depth: Option<Duration>,
    pub suggested_presentation_delay: Option<Duration>,
    pub download_request_time: DateTime<Utc>,
    pub download_complete_time: DateTime<Utc>,
    pub parse_complete_time: DateTime<Utc>,
    /// Time spent parsing a dynamic manifest, zero for static ones.
    pub time_offset: TimeDelta,
}

impl DocumentParameters {
    pub fn new(document: &DocumentNode) -> Self {
        let is_dynamic = document.is_dynamic();
        let time_offset = if is_dynamic {
            document.parse_complete_time - document.download_complete_time
        } else {
            TimeDelta::zero()
        };

        Self {
            is_dynamic,
            media_presentation_duration: document.media_presentation_duration,
            min_buffer_time: document.min_buffer_time,
            availability_start_time: document.availability_start_time,
            availability_end_time: document.availability_end_time,
            publish_time: document.publish_time,
            time_shift_buffer_depth: document.time_shift_buffer_depth,
            suggested_presentation_delay: document.suggested_presentation_delay,
            download_request_time: document.download_request_time,
            download_complete_time: document.download_complete_time,
            parse_complete_time: document.parse_complete_time,
            time_offset,
        }
    }

    /// Elapsed time since `availabilityStartTime` at the moment the manifest became usable.
    ///
    /// `None` when there is no availability start or the manifest predates it.
    pub fn live_time(&self) -> Option<Duration> {
        let availability_start_time = self.availability_start_time?;
        (self.download_complete_time - availability_start_time + self.time_offset)
            .to_std()
            .ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodParameters {
    pub start: Option<Duration>,
    pub duration: Option<Duration>,
    pub kind: PeriodType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestParameters {
    pub document: DocumentParameters,
    pub period: PeriodParameters,
    /// Playback position used for dynamic start segment lookups of single-file streams.
    pub play_clock: Duration,
}

impl ManifestParameters {
    pub fn new(document: DocumentParameters, period: PeriodParameters) -> Self {
        Self {
            document,
            period,
            play_clock: Duration::ZERO,
        }
    }

    pub fn with_play_clock(mut self, play_clock: Duration) -> Self {
        self.play_clock = play_clock;
        self
    }
}
