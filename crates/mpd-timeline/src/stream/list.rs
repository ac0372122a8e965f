use std::{sync::Arc, time::Duration};

use tracing::Span;
use url::Url;

use super::{RepresentationStream, StreamAttributes, StreamContext};
use crate::{
    inherit::Inherited,
    node::{SegmentListNode, SegmentUrlNode},
    params::ManifestParameters,
    util::{
        time::{scaled, scaled_span, ticks_ceil},
        url::merge_baseurls,
    },
    ByteRange, Segment, SegmentId, TimeRange, TimelineResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ListEntry {
    media: Url,
    media_range: Option<ByteRange>,
    index_range: Option<ByteRange>,
    time_range: Option<TimeRange>,
}

/// Segments enumerated one by one with `SegmentURL` elements.
///
/// Position lookups of dynamic presentations are not supported: `segment_id_at`,
/// `next_segment_id_at` and `start_segment_id` answer `None` once a dynamic document is bound.
#[derive(Debug)]
pub struct ListStream {
    entries: Vec<ListEntry>,
    init: Option<Segment>,
    duration: Option<Duration>,
    attributes: StreamAttributes,
    parameters: Option<Arc<ManifestParameters>>,
    span: Span,
}

impl ListStream {
    /// `segment_duration` is `SegmentList@duration` in timescale units.
    pub fn new(
        base_url: &Url,
        segment_urls: &[SegmentUrlNode],
        segment_duration: Option<u64>,
        period_start: Duration,
        init: Option<Segment>,
        attributes: StreamAttributes,
        span: Span,
    ) -> TimelineResult<Self> {
        let timescale = attributes.timescale;
        let mut time = ticks_ceil(period_start, timescale);
        let mut entries = Vec::with_capacity(segment_urls.len());

        for node in segment_urls {
            let media = node.media.as_deref().map(str::trim).unwrap_or_default();
            let media_range = node.media_range.as_deref().map(str::trim).unwrap_or_default();
            // An entry needs a URL or a range within the base URL
            if media.is_empty() && media_range.is_empty() {
                tracing::warn!(parent: &span, "Dropping SegmentURL without media and mediaRange");
                continue;
            }

            let media = if media.is_empty() {
                base_url.clone()
            } else {
                merge_baseurls(base_url, media)?
            };
            let media_range = (!media_range.is_empty())
                .then(|| media_range.parse::<ByteRange>())
                .transpose()?;
            let index_range = node
                .index_range
                .as_deref()
                .map(str::parse::<ByteRange>)
                .transpose()?;

            let time_range = segment_duration.filter(|d| *d > 0).map(|duration| {
                let range = TimeRange::new(
                    scaled(time, timescale),
                    scaled_span(time, duration, timescale),
                );
                time += duration;
                range
            });

            entries.push(ListEntry {
                media,
                media_range,
                index_range,
                time_range,
            });
        }

        let duration = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => first
                .time_range
                .zip(last.time_range)
                .map(|(first, last)| last.end() - first.start),
            _ => None,
        };

        Ok(Self {
            entries,
            init,
            duration,
            attributes,
            parameters: None,
            span,
        })
    }

    pub(crate) fn from_chain(
        chain: &Inherited<'_, SegmentListNode>,
        context: StreamContext<'_>,
    ) -> TimelineResult<Self> {
        let segment_urls = chain
            .get(|list| (!list.segment_urls.is_empty()).then_some(list.segment_urls.as_slice()))
            .unwrap_or_default();
        let init = chain
            .initialization()
            .map(|node| context.url_segment(node))
            .transpose()?;

        Self::new(
            &context.base_url,
            segment_urls,
            chain.get(|list| list.duration),
            context.period_start.unwrap_or_default(),
            init,
            StreamAttributes::inherit(chain),
            context.span,
        )
    }

    pub fn attributes(&self) -> &StreamAttributes {
        &self.attributes
    }

    /// Index range of a listed segment, as given by `SegmentURL@indexRange`.
    pub fn index_range(&self, id: SegmentId) -> Option<ByteRange> {
        self.entry(id)?.index_range
    }

    fn entry(&self, id: SegmentId) -> Option<&ListEntry> {
        self.entries.get(usize::try_from(id).ok()?)
    }

    fn make_segment(entry: &ListEntry) -> Segment {
        Segment::new(entry.media.clone(), entry.media_range, entry.time_range)
    }

    fn unsupported_dynamic(&self, query: &'static str) -> bool {
        if self.is_dynamic() {
            tracing::error!(parent: &self.span, query, "Live position lookups are not supported for SegmentList");
            return true;
        }
        false
    }
}

impl RepresentationStream for ListStream {
    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn init_segment(&self) -> Option<Segment> {
        self.init.clone()
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn segments(&self) -> Vec<Segment> {
        self.entries.iter().map(Self::make_segment).collect()
    }

    fn media_segment(&self, id: SegmentId) -> Option<Segment> {
        self.entry(id).map(Self::make_segment)
    }

    fn segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        if self.unsupported_dynamic("segment_id_at") {
            return None;
        }
        self.entries
            .iter()
            .position(|entry| {
                entry
                    .time_range
                    .is_some_and(|range| range.start <= time && time < range.end())
            })
            .map(|i| i as SegmentId)
    }

    fn next_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        let next = id.checked_add(1)?;
        (next < self.count() as SegmentId).then_some(next)
    }

    fn next_segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        if self.unsupported_dynamic("next_segment_id_at") {
            return None;
        }
        self.next_segment_id(self.segment_id_at(time)?)
    }

    fn previous_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        if id >= self.count() as SegmentId {
            return None;
        }
        id.checked_sub(1)
    }

    fn segment_time_range(&self, id: SegmentId) -> Option<TimeRange> {
        self.entry(id)?.time_range
    }

    fn start_segment_id(&self, _now: Duration, _buffer_depth: Duration) -> Option<SegmentId> {
        if self.unsupported_dynamic("start_segment_id") {
            return None;
        }
        (!self.entries.is_empty()).then_some(0)
    }

    fn bind_parameters(&mut self, parameters: Arc<ManifestParameters>) {
        self.parameters = Some(parameters);
    }

    fn parameters(&self) -> Option<&ManifestParameters> {
        self.parameters.as_deref()
    }
}
