use std::time::Duration;

use crate::{
    node::SegmentTimelineEntry,
    util::time::{scaled, scaled_span, ticks_ceil},
    TimelineError, TimelineResult,
};

/// A run of `repeats + 1` equally long segments, in timescale units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineItem {
    pub number: u64,
    pub time: u64,
    pub duration: u64,
    pub repeats: u32,
}

impl TimelineItem {
    pub fn count(&self) -> u64 {
        u64::from(self.repeats) + 1
    }

    pub fn end(&self) -> u64 {
        self.time + self.duration * self.count()
    }
}

/// A single segment of an unwound timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub number: u64,
    pub time: u64,
    pub duration: u64,
    pub scaled_time: Duration,
    pub scaled_duration: Duration,
}

impl TimelineEntry {
    pub fn scaled_end(&self) -> Duration {
        self.scaled_time + self.scaled_duration
    }
}

/// Expands `SegmentTemplate@duration` or a `SegmentTimeline` into [`TimelineItem`]s.
#[derive(Debug, Clone, Copy)]
pub struct TimelineBuilder {
    pub start_number: u64,
    pub timescale: u64,
}

impl TimelineBuilder {
    pub fn new(start_number: u64, timescale: u64) -> Self {
        Self {
            start_number,
            timescale: timescale.max(1),
        }
    }

    /// Covers `span` starting at `start` with segments of `segment_duration` ticks.
    ///
    /// The last item holds the remainder when the span is not a whole number of segments.
    pub fn from_duration(
        &self,
        segment_duration: u64,
        start: Duration,
        span: Duration,
    ) -> Vec<TimelineItem> {
        if segment_duration == 0 {
            return Vec::new();
        }

        let start = ticks_ceil(start, self.timescale);
        let total = ticks_ceil(span, self.timescale);
        let count = total / segment_duration;
        let remainder = total % segment_duration;

        let mut items = Vec::with_capacity(2);
        if count > 0 {
            items.push(TimelineItem {
                number: self.start_number,
                time: start,
                duration: segment_duration,
                repeats: u32::try_from(count - 1).unwrap_or(u32::MAX),
            });
        }
        if remainder > 0 {
            items.push(TimelineItem {
                number: self.start_number + count,
                time: start + count * segment_duration,
                duration: remainder,
                repeats: 0,
            });
        }
        items
    }

    /// Converts `SegmentTimeline` `S` elements.
    ///
    /// Item times are shifted by the period start so they sit on the presentation timeline.
    /// A missing or negative `@r` repeats up to the next `S@t`, or up to the period end for
    /// the last element. Repeats never run past a known period end.
    pub fn from_entries(
        &self,
        entries: &[SegmentTimelineEntry],
        period_start: Duration,
        period_end: Option<Duration>,
    ) -> TimelineResult<Vec<TimelineItem>> {
        let offset = ticks_ceil(period_start, self.timescale);
        let period_end = period_end.map(|end| ticks_ceil(end, self.timescale).saturating_sub(offset));

        let mut items = Vec::with_capacity(entries.len());
        let mut start = 0u64;
        let mut number = self.start_number;

        for (i, entry) in entries.iter().enumerate() {
            if entry.d == 0 {
                return Err(TimelineError::InvalidTimeline(format!(
                    "S[{i}] has a zero duration"
                )));
            }
            if let Some(t) = entry.t {
                start = t;
            }

            let mut repeats = match entry.r.filter(|r| *r >= 0) {
                Some(r) => r as u64,
                None => {
                    let end = match entries.get(i + 1) {
                        Some(next) => next.t.unwrap_or(start.saturating_add(entry.d)),
                        None => period_end.unwrap_or(start.saturating_add(entry.d)),
                    };
                    end.saturating_sub(start)
                        .div_ceil(entry.d)
                        .saturating_sub(1)
                }
            };
            if let Some(end) = period_end.filter(|end| *end > start) {
                let limit = (end - start).div_ceil(entry.d) - 1;
                if repeats > limit {
                    tracing::warn!(index = i, repeats, limit, "S@r runs past the period end");
                    repeats = limit;
                }
            }
            let repeats = u32::try_from(repeats).map_err(|_| {
                TimelineError::InvalidTimeline(format!("S[{i}] repeats {repeats} times"))
            })?;

            let count = u64::from(repeats) + 1;
            let bounds = start.checked_add(offset).zip(
                entry
                    .d
                    .checked_mul(count)
                    .and_then(|span| start.checked_add(span))
                    .filter(|end| end.checked_add(offset).is_some()),
            );
            let Some((time, end)) = bounds else {
                return Err(TimelineError::InvalidTimeline(format!(
                    "S[{i}] overflows the timeline"
                )));
            };

            let item = TimelineItem {
                number,
                time,
                duration: entry.d,
                repeats,
            };
            start = end;
            number += item.count();
            items.push(item);
        }

        Ok(items)
    }

    /// Flattens every repeat into its own entry.
    pub fn unwind(&self, items: &[TimelineItem]) -> Vec<TimelineEntry> {
        let total = items.iter().map(|item| item.count() as usize).sum();
        let mut entries = Vec::with_capacity(total);

        for item in items {
            for repeat in 0..item.count() {
                let time = item.time + item.duration * repeat;
                entries.push(TimelineEntry {
                    number: item.number + repeat,
                    time,
                    duration: item.duration,
                    scaled_time: scaled(time, self.timescale),
                    scaled_duration: scaled_span(time, item.duration, self.timescale),
                });
            }
        }

        entries
    }
}
