//! Period start, end and duration fixup, ISO/IEC 23009-1 5.3.2.1.
//!
//! Runs in two passes around stream construction. The first pass only looks at the manifest,
//! the second one falls back to the longest representation of a period.

use std::time::Duration;

use crate::{
    node::{DocumentNode, PeriodNode},
    params::{PeriodParameters, PeriodType},
    TimelineError, TimelineResult,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodBounds {
    pub start: Option<Duration>,
    pub duration: Option<Duration>,
    pub end: Option<Duration>,
    pub kind: PeriodType,
}

impl PeriodBounds {
    /// Explicit duration, else the distance to the resolved end.
    pub fn span(&self) -> Option<Duration> {
        self.duration
            .or_else(|| self.end?.checked_sub(self.start?))
    }

    pub fn parameters(&self) -> PeriodParameters {
        PeriodParameters {
            start: self.start,
            duration: self.duration,
            kind: self.kind,
        }
    }
}

/// Dynamic documents cannot be placed on the wall clock without these.
pub fn validate(document: &DocumentNode) -> TimelineResult<()> {
    if !document.is_dynamic() {
        return Ok(());
    }
    if document.availability_start_time.is_none() {
        return Err(TimelineError::MissingDynamicTimestamp("availabilityStartTime"));
    }
    if document.publish_time.is_none() {
        return Err(TimelineError::MissingDynamicTimestamp("publishTime"));
    }
    Ok(())
}

/// First pass: starts, types and ends from the manifest alone.
pub fn resolve_bounds(periods: &[PeriodNode], document: &DocumentNode) -> Vec<PeriodBounds> {
    let is_dynamic = document.is_dynamic();
    let mut bounds: Vec<PeriodBounds> = Vec::with_capacity(periods.len());

    for (i, period) in periods.iter().enumerate() {
        let previous = i.checked_sub(1).map(|i| bounds[i]);

        let start = period.start.or_else(|| match previous {
            None if !is_dynamic => Some(Duration::ZERO),
            None => None,
            Some(previous) => Some(previous.start? + previous.duration?),
        });
        let kind = if start.is_some() {
            PeriodType::Regular
        } else if is_dynamic && previous.is_none_or(|p| p.duration.is_none()) {
            PeriodType::EarlyAvailable
        } else {
            PeriodType::Unknown
        };

        bounds.push(PeriodBounds {
            start,
            duration: period.duration,
            end: None,
            kind,
        });
    }

    let count = bounds.len();
    for i in 0..count {
        let current = bounds[i];
        bounds[i].end = match (current.start, current.duration) {
            (Some(start), Some(duration)) => Some(start + duration),
            _ if i + 1 < count => bounds[i + 1].start,
            _ => document.media_presentation_duration,
        };
    }

    bounds
}

/// Second pass: durations from resolved ends, else from `longest(period_index)`.
pub fn resolve_durations(
    bounds: &mut [PeriodBounds],
    longest: impl Fn(usize) -> Option<Duration>,
) {
    for (i, period) in bounds.iter_mut().enumerate() {
        if period.duration.is_none() {
            period.duration = match (period.start, period.end) {
                (Some(start), Some(end)) => end.checked_sub(start),
                _ => None,
            };
        }
        if period.duration.is_none() {
            period.duration = longest(i);
        }
        if period.end.is_none() {
            period.end = period.start.zip(period.duration).map(|(s, d)| s + d);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::node::PresentationType;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn period(start: Option<u64>, duration: Option<u64>) -> PeriodNode {
        PeriodNode {
            start: start.map(secs),
            duration: duration.map(secs),
            ..Default::default()
        }
    }

    fn dynamic_document() -> DocumentNode {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        DocumentNode {
            presentation_type: PresentationType::Dynamic,
            availability_start_time: Some(now),
            publish_time: Some(now),
            ..Default::default()
        }
    }

    #[test]
    fn test_static_chain() {
        let document = DocumentNode {
            media_presentation_duration: Some(secs(100)),
            ..Default::default()
        };
        let periods = [period(None, Some(30)), period(None, None), period(Some(70), None)];
        let mut bounds = resolve_bounds(&periods, &document);

        assert_eq!(bounds[0].start, Some(secs(0)));
        assert_eq!(bounds[0].end, Some(secs(30)));
        assert_eq!(bounds[1].start, Some(secs(30)));
        assert_eq!(bounds[1].end, Some(secs(70)));
        assert_eq!(bounds[2].end, Some(secs(100)));
        assert!(bounds.iter().all(|b| b.kind == PeriodType::Regular));

        resolve_durations(&mut bounds, |_| None);
        assert_eq!(bounds[1].duration, Some(secs(40)));
        assert_eq!(bounds[2].duration, Some(secs(30)));
    }

    #[test]
    fn test_dynamic_early_available() {
        let document = dynamic_document();
        let periods = [period(None, None), period(None, None)];
        let bounds = resolve_bounds(&periods, &document);

        assert_eq!(bounds[0].start, None);
        assert_eq!(bounds[0].kind, PeriodType::EarlyAvailable);
        assert_eq!(bounds[1].kind, PeriodType::EarlyAvailable);
        assert_eq!(bounds[1].end, None);
    }

    #[test]
    fn test_duration_falls_back_to_streams() {
        let document = DocumentNode::default();
        let periods = [period(Some(0), None), period(Some(50), None)];
        let mut bounds = resolve_bounds(&periods, &document);
        assert_eq!(bounds[1].end, None);

        resolve_durations(&mut bounds, |i| Some(secs(10 * (i as u64 + 1))));
        // the first period ends where the second one starts
        assert_eq!(bounds[0].duration, Some(secs(50)));
        assert_eq!(bounds[1].duration, Some(secs(20)));
        assert_eq!(bounds[1].end, Some(secs(70)));
        assert_eq!(bounds[1].parameters().duration, Some(secs(20)));
    }

    #[test]
    fn test_dynamic_timestamps_required() {
        assert!(validate(&DocumentNode::default()).is_ok());
        assert!(validate(&dynamic_document()).is_ok());

        let mut document = dynamic_document();
        document.publish_time = None;
        assert!(matches!(
            validate(&document),
            Err(TimelineError::MissingDynamicTimestamp("publishTime"))
        ));

        document.availability_start_time = None;
        assert!(matches!(
            validate(&document),
            Err(TimelineError::MissingDynamicTimestamp("availabilityStartTime"))
        ));
    }
}
