//! Lookups over an unwound, time-ordered timeline.

use std::{cmp::Ordering, ops::Range, time::Duration};

use crate::timeline::TimelineEntry;

/// Entry starting exactly at `time`.
pub fn find_by_start_time(entries: &[TimelineEntry], time: Duration) -> Option<usize> {
    entries
        .binary_search_by(|entry| entry.scaled_time.cmp(&time))
        .ok()
}

/// Entry with `start <= time < start + duration`.
pub fn find_containing(entries: &[TimelineEntry], time: Duration) -> Option<usize> {
    entries
        .binary_search_by(|entry| {
            if entry.scaled_end() <= time {
                Ordering::Less
            } else if entry.scaled_time > time {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .ok()
}

pub fn find_by_number(entries: &[TimelineEntry], number: u64) -> Option<usize> {
    entries
        .binary_search_by_key(&number, |entry| entry.number)
        .ok()
}

/// Segment availability test for dynamic presentations.
///
/// A segment becomes available once it is fully produced, at
/// `start + duration - presentation_time_offset`, and stays available for the time shift
/// buffer depth plus its own duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    /// Elapsed time since `MPD@availabilityStartTime`.
    pub now: Duration,
    pub presentation_time_offset: Duration,
    pub time_shift_buffer_depth: Duration,
}

impl AvailabilityWindow {
    pub fn contains(&self, entry: &TimelineEntry) -> bool {
        let available_from = entry
            .scaled_end()
            .saturating_sub(self.presentation_time_offset);
        let available_until = available_from + self.time_shift_buffer_depth + entry.scaled_duration;

        available_from <= self.now && self.now < available_until
    }

    /// Contiguous range from the first to the last available entry, or an empty range.
    pub fn visible_range(&self, entries: &[TimelineEntry]) -> Range<usize> {
        let first = entries.iter().position(|entry| self.contains(entry));
        let last = entries.iter().rposition(|entry| self.contains(entry));

        match (first, last) {
            (Some(first), Some(last)) => first..last + 1,
            _ => 0..0,
        }
    }
}
