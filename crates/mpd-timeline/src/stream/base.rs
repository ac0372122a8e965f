use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::Span;
use url::Url;

use super::{RepresentationStream, StreamAttributes, StreamContext};
use crate::{
    config::RetryPolicy,
    fetch::{fetch_index, IndexFetcher, IndexRequest},
    inherit::Inherited,
    node::SegmentBaseNode,
    params::ManifestParameters,
    sidx::SegmentIndex,
    ByteRange, Segment, SegmentId, TimeRange, TimeRelation, TimelineResult,
};

/// A single media resource, optionally split into subsegments by a `sidx` box.
#[derive(Debug)]
pub struct BaseStream {
    media: Segment,
    init: Option<Segment>,
    /// Where the `sidx` box lives, when the representation declares one.
    index_location: Option<(Url, ByteRange)>,
    index: Option<SegmentIndex>,
    attributes: StreamAttributes,
    parameters: Option<Arc<ManifestParameters>>,
    span: Span,
}

impl BaseStream {
    pub fn new(
        media: Segment,
        init: Option<Segment>,
        index_range: Option<ByteRange>,
        attributes: StreamAttributes,
        span: Span,
    ) -> Self {
        let index_location = index_range.map(|range| (media.url.clone(), range));
        Self {
            media,
            init,
            index_location,
            index: None,
            attributes,
            parameters: None,
            span,
        }
    }

    pub(crate) fn from_chain(
        chain: &Inherited<'_, SegmentBaseNode>,
        context: StreamContext<'_>,
    ) -> TimelineResult<Self> {
        let time_range = match (context.period_start, context.period_duration) {
            (Some(start), Some(duration)) => Some(TimeRange::new(start, duration)),
            _ => None,
        };
        let media = Segment::new(context.base_url.clone(), None, time_range);
        let init = chain
            .initialization()
            .map(|node| context.url_segment(node))
            .transpose()?;

        let mut stream = Self::new(
            media,
            init,
            None,
            StreamAttributes::inherit(chain),
            context.span.clone(),
        );

        let index_range = chain.index_range().map(str::parse::<ByteRange>).transpose()?;
        let representation_index = chain
            .representation_index()
            .map(|node| context.url_segment(node))
            .transpose()?;
        stream.index_location = match (index_range, representation_index) {
            // @indexRange counts within the RepresentationIndex resource when one is named
            (Some(range), Some(index)) => Some((index.url, range)),
            (Some(range), None) => Some((stream.media.url.clone(), range)),
            (None, Some(Segment {
                url,
                byte_range: Some(range),
                ..
            })) => Some((url, range)),
            (None, _) => None,
        };

        Ok(stream)
    }

    pub fn is_indexed(&self) -> bool {
        self.index_location.is_some()
    }

    /// Request for the `sidx` box, while it has not been loaded yet.
    pub fn index_request(&self) -> Option<IndexRequest> {
        if self.index.is_some() {
            return None;
        }
        let (url, range) = self.index_location.as_ref()?;
        Some(IndexRequest::new(url.clone(), *range))
    }

    /// Decodes an already downloaded `sidx` box.
    pub fn apply_index(&mut self, data: &[u8]) -> TimelineResult<()> {
        let anchor = self
            .index_location
            .as_ref()
            .map_or(0, |(_, range)| range.end + 1);
        let index = SegmentIndex::decode(data, anchor)?;

        tracing::debug!(
            parent: &self.span,
            subsegments = index.len(),
            duration = ?index.max_index_time,
            "Segment index loaded"
        );
        self.index = Some(index);
        Ok(())
    }

    /// Fetches and decodes the `sidx` box. Returns `false` when cancelled.
    pub async fn load_index<F>(
        &mut self,
        fetcher: &F,
        policy: &RetryPolicy,
        token: &CancellationToken,
    ) -> TimelineResult<bool>
    where
        F: IndexFetcher,
    {
        let Some(request) = self.index_request() else {
            return Ok(true);
        };

        match fetch_index(fetcher, &request, policy, token).await? {
            Some(data) => {
                self.apply_index(&data)?;
                Ok(true)
            }
            None => {
                tracing::debug!(parent: &self.span, url = %request.url, "Segment index fetch cancelled");
                Ok(false)
            }
        }
    }

    pub fn attributes(&self) -> &StreamAttributes {
        &self.attributes
    }

    fn indexed_segment(&self, id: SegmentId) -> Option<Segment> {
        let index = self.index.as_ref()?;
        let entry = index.entries.get(usize::try_from(id).ok()?)?;
        Some(Segment::new(
            self.media.url.clone(),
            Some(entry.byte_range),
            Some(entry.time_range),
        ))
    }

    fn indexed_position(&self, time: Duration) -> Option<usize> {
        let index = self.index.as_ref()?;
        let position = index
            .entries
            .iter()
            .position(|entry| entry.time_range.start <= time && time < entry.time_range.end())
            .or_else(|| {
                // the very end of the index maps to the last subsegment
                if time == index.max_index_time {
                    index.len().checked_sub(1)
                } else {
                    None
                }
            });

        if position.is_none() {
            tracing::warn!(
                parent: &self.span,
                time = ?time,
                duration = ?index.max_index_time,
                "No indexed subsegment at requested time"
            );
        }
        position
    }
}

impl RepresentationStream for BaseStream {
    fn duration(&self) -> Option<Duration> {
        if self.is_indexed() {
            return self.index.as_ref().map(|index| index.max_index_time);
        }
        self.media.time_range.map(|range| range.duration)
    }

    fn init_segment(&self) -> Option<Segment> {
        self.init.clone()
    }

    fn count(&self) -> usize {
        match (&self.index_location, &self.index) {
            (None, _) => 1,
            (Some(_), Some(index)) => index.len(),
            (Some(_), None) => 0,
        }
    }

    fn segments(&self) -> Vec<Segment> {
        if !self.is_indexed() {
            return vec![self.media.clone()];
        }
        (0..self.count() as SegmentId)
            .filter_map(|id| self.indexed_segment(id))
            .collect()
    }

    fn media_segment(&self, id: SegmentId) -> Option<Segment> {
        if self.is_indexed() {
            self.indexed_segment(id)
        } else {
            (id == 0).then(|| self.media.clone())
        }
    }

    fn segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        if self.is_indexed() {
            return self.indexed_position(time).map(|i| i as SegmentId);
        }
        match self.media.relation(time) {
            TimeRelation::SpotOn | TimeRelation::Later => Some(0),
            _ => None,
        }
    }

    fn next_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        if !self.is_indexed() {
            return None;
        }
        let next = id.checked_add(1)?;
        (next < self.count() as SegmentId).then_some(next)
    }

    fn next_segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        self.next_segment_id(self.segment_id_at(time)?)
    }

    fn previous_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        if !self.is_indexed() || id >= self.count() as SegmentId {
            return None;
        }
        id.checked_sub(1)
    }

    fn segment_time_range(&self, id: SegmentId) -> Option<TimeRange> {
        self.media_segment(id)?.time_range
    }

    fn start_segment_id(&self, _now: Duration, _buffer_depth: Duration) -> Option<SegmentId> {
        if self.is_dynamic() {
            let play_clock = self.parameters()?.play_clock;
            return self.segment_id_at(play_clock);
        }
        (self.count() > 0).then_some(0)
    }

    fn bind_parameters(&mut self, parameters: Arc<ManifestParameters>) {
        self.parameters = Some(parameters);
    }

    fn parameters(&self) -> Option<&ManifestParameters> {
        self.parameters.as_deref()
    }

    fn is_ready(&self) -> bool {
        !self.is_indexed() || self.index.is_some()
    }
}
