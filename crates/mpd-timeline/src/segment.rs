use std::{fmt, str::FromStr, time::Duration};

use url::Url;

use crate::{TimelineError, TimelineResult};

/// Identifier handed out by a representation stream.
///
/// Template streams use the segment number, base and list streams use a zero-based position.
pub type SegmentId = u64;

/// An inclusive byte range, `start..=end`.
///
/// The byte range shall be expressed and formatted as a byte-range-spec as defined in
/// IETF RFC 7233:2014, subclause 2.1. It is restricted to a single expression identifying
/// a contiguous range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn to_http_range(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl FromStr for ByteRange {
    type Err = TimelineError;

    fn from_str(s: &str) -> TimelineResult<Self> {
        let invalid = || TimelineError::InvalidByteRange(s.to_string());

        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
        let end = end.trim().parse::<u64>().map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }

        Ok(Self { start, end })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Where one thing sits on the presentation timeline relative to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRelation {
    Unknown,
    Overlap,
    Earlier,
    SpotOn,
    Later,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeRange {
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    /// Places `other` relative to this range.
    ///
    /// `Later` means this range lies after `other`, `Earlier` means it lies before it,
    /// `SpotOn` means `other` is fully contained.
    pub fn relation(&self, other: &TimeRange) -> TimeRelation {
        if other.end() <= self.start {
            TimeRelation::Later
        } else if other.start >= self.end() {
            TimeRelation::Earlier
        } else if other.start >= self.start && other.end() <= self.end() {
            TimeRelation::SpotOn
        } else {
            TimeRelation::Overlap
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub url: Url,
    pub byte_range: Option<ByteRange>,
    pub time_range: Option<TimeRange>,
}

impl Segment {
    pub fn new(url: Url, byte_range: Option<ByteRange>, time_range: Option<TimeRange>) -> Self {
        Self {
            url,
            byte_range,
            time_range,
        }
    }

    /// Places a point in time relative to this segment.
    pub fn relation(&self, time: Duration) -> TimeRelation {
        let Some(range) = &self.time_range else {
            return TimeRelation::Unknown;
        };

        if time < range.start {
            TimeRelation::Later
        } else if time - range.start <= range.duration {
            TimeRelation::SpotOn
        } else {
            TimeRelation::Earlier
        }
    }
}
