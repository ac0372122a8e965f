use std::{ops::Range, sync::Arc, time::Duration};

use tracing::Span;
use url::Url;

use super::{RepresentationStream, StreamAttributes, StreamContext};
use crate::{
    config::LiveEdgePolicy,
    inherit::Inherited,
    node::SegmentTemplateNode,
    params::ManifestParameters,
    search::{find_by_number, find_by_start_time, find_containing, AvailabilityWindow},
    template::SegmentTemplate,
    timeline::{TimelineBuilder, TimelineEntry, TimelineItem},
    util::{
        time::{scaled, ticks_ceil},
        url::merge_baseurls,
    },
    Segment, SegmentId, TimeRange, TimelineResult,
};

/// Timeline a template stream is built from.
#[derive(Debug, Clone)]
pub struct TemplateTimeline {
    pub items: Vec<TimelineItem>,
    pub timescale: u64,
    pub start_number: u64,
    pub period_start: Duration,
    /// `SegmentTemplate@duration` when the items were generated from it rather than from a
    /// `SegmentTimeline`.
    pub fixed_duration: Option<u64>,
    /// Neither the period nor the presentation has a known end. Fixed duration timelines of
    /// dynamic presentations then grow up to the live edge on every bind.
    pub open_ended: bool,
}

impl TemplateTimeline {
    fn from_chain(
        chain: &Inherited<'_, SegmentTemplateNode>,
        context: &StreamContext<'_>,
    ) -> TimelineResult<Self> {
        let timescale = chain.timescale();
        let start_number = chain.get(|t| t.start_number).unwrap_or(1);
        let period_start = context.period_start.unwrap_or_default();
        let builder = TimelineBuilder::new(start_number, timescale);

        let mut timeline = Self {
            items: Vec::new(),
            timescale,
            start_number,
            period_start,
            fixed_duration: None,
            open_ended: false,
        };

        if let Some(segment_timeline) = chain.get(|t| t.segment_timeline.as_ref()) {
            timeline.items =
                builder.from_entries(&segment_timeline.entries, period_start, context.period_end())?;
        } else if let Some(duration) = chain.get(|t| t.duration).filter(|d| *d > 0) {
            timeline.fixed_duration = Some(duration);
            match context.period_span() {
                Some(span) => timeline.items = builder.from_duration(duration, period_start, span),
                None => timeline.open_ended = true,
            }
        } else {
            tracing::warn!(parent: &context.span, "SegmentTemplate without SegmentTimeline or duration");
        }

        Ok(timeline)
    }

    /// Period start in timescale units.
    pub fn offset(&self) -> u64 {
        ticks_ceil(self.period_start, self.timescale)
    }

    /// Whole segments of a fixed duration timeline produced until `now` that can still be
    /// inside a time shift buffer of `time_shift_buffer_depth`.
    fn items_until(&self, now: Duration, time_shift_buffer_depth: Duration) -> Vec<TimelineItem> {
        let Some(duration) = self.fixed_duration else {
            return self.items.clone();
        };
        let elapsed = ticks_ceil(now.saturating_sub(self.period_start), self.timescale);
        let count = elapsed / duration;
        // segment k leaves the buffer once (k + 2) * duration + depth <= elapsed
        let depth = ticks_ceil(time_shift_buffer_depth, self.timescale);
        let skipped = elapsed.saturating_sub(depth.saturating_add(duration)) / duration;
        if count <= skipped {
            return Vec::new();
        }

        vec![TimelineItem {
            number: self.start_number + skipped,
            time: self.offset() + skipped * duration,
            duration,
            repeats: u32::try_from(count - skipped - 1).unwrap_or(u32::MAX),
        }]
    }
}

/// Segments addressed through a `SegmentTemplate`, by number or by time.
///
/// Segment ids are segment numbers. Once a dynamic document is bound only the segments inside
/// the availability window are visible to queries.
#[derive(Debug)]
pub struct TemplateStream {
    template: SegmentTemplate,
    base_url: Url,
    init: Option<Segment>,
    timeline: TemplateTimeline,
    entries: Vec<TimelineEntry>,
    visible: Range<usize>,
    average_segment_duration: Option<Duration>,
    attributes: StreamAttributes,
    live_edge: LiveEdgePolicy,
    parameters: Option<Arc<ManifestParameters>>,
    span: Span,
}

impl TemplateStream {
    pub fn new(
        template: SegmentTemplate,
        base_url: Url,
        init: Option<Segment>,
        timeline: TemplateTimeline,
        attributes: StreamAttributes,
        live_edge: LiveEdgePolicy,
        span: Span,
    ) -> Self {
        let mut stream = Self {
            template,
            base_url,
            init,
            timeline,
            entries: Vec::new(),
            visible: 0..0,
            average_segment_duration: None,
            attributes,
            live_edge,
            parameters: None,
            span,
        };
        let items = stream.timeline.items.clone();
        stream.unwind(&items);
        stream
    }

    pub(crate) fn from_chain(
        chain: &Inherited<'_, SegmentTemplateNode>,
        context: StreamContext<'_>,
    ) -> TimelineResult<Self> {
        let template = SegmentTemplate::new(
            context.representation_id.map(str::to_string),
            context.bandwidth,
            chain.get(|t| t.media.clone()),
            chain.get(|t| t.initialization.clone()),
        );

        let init = match template.initialization() {
            Some(path) => Some(Segment::new(
                merge_baseurls(&context.base_url, &path)?,
                None,
                None,
            )),
            None => chain
                .initialization()
                .map(|node| context.url_segment(node))
                .transpose()?,
        };
        let timeline = TemplateTimeline::from_chain(chain, &context)?;

        Ok(Self::new(
            template,
            context.base_url,
            init,
            timeline,
            StreamAttributes::inherit(chain),
            context.live_edge,
            context.span,
        ))
    }

    pub fn attributes(&self) -> &StreamAttributes {
        &self.attributes
    }

    pub fn timeline(&self) -> &TemplateTimeline {
        &self.timeline
    }

    pub fn average_segment_duration(&self) -> Option<Duration> {
        self.average_segment_duration
    }

    /// Visible segment starting exactly at `time`.
    pub fn segment_id_starting_at(&self, time: Duration) -> Option<SegmentId> {
        let visible = self.visible_entries();
        find_by_start_time(visible, time).map(|i| visible[i].number)
    }

    fn unwind(&mut self, items: &[TimelineItem]) {
        self.entries = TimelineBuilder::new(self.timeline.start_number, self.timeline.timescale)
            .unwind(items);
        self.visible = 0..self.entries.len();
        self.average_segment_duration = self
            .entries
            .first()
            .zip(self.entries.last())
            .map(|(first, last)| last.scaled_end() - first.scaled_time)
            .zip(u32::try_from(self.entries.len()).ok())
            .map(|(duration, count)| duration / count);
    }

    /// Open-ended timelines only keep their newest segments but still span from the period start.
    fn full_duration(&self) -> Option<Duration> {
        let first = self.entries.first()?;
        let last = self.entries.last()?;
        let start = if self.timeline.open_ended {
            self.timeline.period_start
        } else {
            first.scaled_time
        };
        Some(last.scaled_end().saturating_sub(start))
    }

    fn visible_entries(&self) -> &[TimelineEntry] {
        &self.entries[self.visible.clone()]
    }

    fn visible_index(&self, id: SegmentId) -> Option<usize> {
        find_by_number(self.visible_entries(), id)
    }

    fn make_segment(&self, entry: &TimelineEntry) -> Option<Segment> {
        let path = self
            .template
            .media(entry.number, entry.time.saturating_sub(self.timeline.offset()))?;
        let url = match merge_baseurls(&self.base_url, &path) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(parent: &self.span, %error, %path, "Invalid media segment URL");
                return None;
            }
        };

        Some(Segment::new(
            url,
            None,
            Some(TimeRange::new(entry.scaled_time, entry.scaled_duration)),
        ))
    }

    /// Restricts the visible range to the segments available at the bound live time.
    fn purge(&mut self, parameters: &ManifestParameters) {
        let Some(now) = parameters.document.live_time() else {
            tracing::warn!(parent: &self.span, "Dynamic document without usable live time");
            self.visible = 0..0;
            return;
        };

        let time_shift_buffer_depth = self
            .attributes
            .time_shift_buffer_depth
            .or(parameters.document.time_shift_buffer_depth)
            .unwrap_or_default();
        if self.timeline.open_ended {
            let items = self.timeline.items_until(now, time_shift_buffer_depth);
            self.unwind(&items);
        }

        let window = AvailabilityWindow {
            now,
            presentation_time_offset: scaled(
                self.attributes.presentation_time_offset,
                self.timeline.timescale,
            ),
            time_shift_buffer_depth,
        };
        self.visible = window.visible_range(&self.entries);

        tracing::debug!(
            parent: &self.span,
            now = ?now,
            total = self.entries.len(),
            first = ?self.visible_entries().first().map(|e| e.number),
            last = ?self.visible_entries().last().map(|e| e.number),
            "Purged unavailable segments"
        );
    }

    /// Start number for `SegmentTimeline` streams: backs off from the newest visible segment.
    ///
    /// The backoff is a fraction of the visible window, at least the requested buffer depth
    /// times the configured multiplier, and at most the whole window.
    fn start_from_timeline(&self, buffer_depth: Duration) -> Option<SegmentId> {
        let visible = self.visible_entries();
        let first = visible.first()?;
        let last = visible.last()?;

        let policy = &self.live_edge;
        let window = last.scaled_end() - first.scaled_time;
        let multiplier = u32::try_from(policy.buffer_depth_multiplier).unwrap_or(u32::MAX);
        let backoff = fraction(
            window,
            policy.window_backoff_numerator,
            policy.window_backoff_denominator,
        )
        .max(buffer_depth.saturating_mul(multiplier))
        .min(window);

        let target = last.scaled_end().saturating_sub(backoff);
        // a target inside a timeline gap starts at the next segment
        let index = find_containing(visible, target)
            .or_else(|| visible.iter().position(|entry| entry.scaled_time >= target))
            .unwrap_or(0);
        Some(visible[index].number)
    }

    /// Start number for fixed duration streams, derived from the elapsed live time.
    fn start_from_template(
        &self,
        parameters: &ManifestParameters,
        now: Duration,
        buffer_depth: Duration,
        duration: u64,
    ) -> Option<SegmentId> {
        let visible = self.visible_entries();
        let first = visible.first()?;
        let last = visible.last()?;

        let timescale = self.timeline.timescale;
        let start_number = self.timeline.start_number;
        let Some(elapsed) = now.checked_sub(self.timeline.period_start) else {
            tracing::warn!(parent: &self.span, now = ?now, "Live time precedes the period start");
            return None;
        };
        let current = start_number + ticks_ceil(elapsed, timescale) / duration;

        let document = &parameters.document;
        let time_shift_buffer_depth = document.time_shift_buffer_depth.unwrap_or_default();
        let delay = match document.suggested_presentation_delay {
            Some(delay) if !delay.is_zero() && delay <= time_shift_buffer_depth => delay,
            _ => time_shift_buffer_depth,
        }
        .max(buffer_depth);

        let delay_count = ticks_ceil(delay, timescale) / duration;
        let start = if start_number + delay_count < current {
            current - delay_count
        } else {
            start_number
        };

        let min_buffer_time = document.min_buffer_time.unwrap_or_default();
        let buffered = (ticks_ceil(min_buffer_time, timescale)
            + self.live_edge.template_offset_from_end)
            / duration;
        let number = if current - start > buffered {
            current - buffered
        } else {
            start
        };

        Some(number.clamp(first.number, last.number))
    }
}

fn fraction(duration: Duration, numerator: u64, denominator: u64) -> Duration {
    let nanos = duration.as_nanos() * u128::from(numerator) / u128::from(denominator.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

impl RepresentationStream for TemplateStream {
    fn duration(&self) -> Option<Duration> {
        self.full_duration()
    }

    fn init_segment(&self) -> Option<Segment> {
        self.init.clone()
    }

    fn count(&self) -> usize {
        self.visible.len()
    }

    fn segments(&self) -> Vec<Segment> {
        self.visible_entries()
            .iter()
            .filter_map(|entry| self.make_segment(entry))
            .collect()
    }

    fn media_segment(&self, id: SegmentId) -> Option<Segment> {
        let index = self.visible_index(id)?;
        self.make_segment(&self.visible_entries()[index])
    }

    fn segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        let visible = self.visible_entries();
        find_containing(visible, time).map(|i| visible[i].number)
    }

    fn next_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        let index = self.visible_index(id)?;
        self.visible_entries().get(index + 1).map(|e| e.number)
    }

    fn next_segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        let visible = self.visible_entries();
        let index = find_containing(visible, time)?;
        visible[index..]
            .iter()
            .find(|entry| entry.scaled_time > time)
            .map(|entry| entry.number)
    }

    fn previous_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        let index = self.visible_index(id)?.checked_sub(1)?;
        Some(self.visible_entries()[index].number)
    }

    fn segment_time_range(&self, id: SegmentId) -> Option<TimeRange> {
        let entry = &self.visible_entries()[self.visible_index(id)?];
        Some(TimeRange::new(entry.scaled_time, entry.scaled_duration))
    }

    fn start_segment_id(&self, now: Duration, buffer_depth: Duration) -> Option<SegmentId> {
        let parameters = self.parameters.as_deref()?;
        if !parameters.document.is_dynamic {
            return self.visible_entries().first().map(|e| e.number);
        }

        let start = match self.timeline.fixed_duration {
            Some(duration) => self.start_from_template(parameters, now, buffer_depth, duration),
            None => self.start_from_timeline(buffer_depth),
        };
        if start.is_none() {
            tracing::warn!(parent: &self.span, available = self.count(), "No live start segment");
        }
        start
    }

    fn bind_parameters(&mut self, parameters: Arc<ManifestParameters>) {
        if parameters.document.is_dynamic {
            self.purge(&parameters);
        } else {
            self.visible = 0..self.entries.len();
        }
        self.parameters = Some(parameters);
    }

    fn parameters(&self) -> Option<&ManifestParameters> {
        self.parameters.as_deref()
    }
}
