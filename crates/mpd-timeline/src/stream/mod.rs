mod base;
mod list;
mod template;

pub use base::BaseStream;
pub use list::ListStream;
pub use template::{TemplateStream, TemplateTimeline};

use std::{sync::Arc, time::Duration};

use tracing::Span;
use url::Url;

use crate::{
    config::LiveEdgePolicy,
    inherit::{Addressing, Inherited},
    node::{SegmentBaseNode, UrlNode},
    params::{DocumentParameters, ManifestParameters, PeriodParameters},
    util::url::merge_baseurls,
    ByteRange, Segment, SegmentId, TimeRange, TimelineResult,
};

/// Query contract shared by every addressing scheme.
///
/// Misses are reported as `None`: a time or id outside of the currently visible window is a
/// normal answer, not an error.
pub trait RepresentationStream {
    /// Total span of the representation.
    fn duration(&self) -> Option<Duration>;

    fn init_segment(&self) -> Option<Segment>;

    /// Number of segments currently visible.
    fn count(&self) -> usize;

    /// Every currently visible media segment, in presentation order.
    fn segments(&self) -> Vec<Segment>;

    fn media_segment(&self, id: SegmentId) -> Option<Segment>;

    fn segment_id_at(&self, time: Duration) -> Option<SegmentId>;

    fn next_segment_id(&self, id: SegmentId) -> Option<SegmentId>;

    /// First segment starting after `time`.
    fn next_segment_id_at(&self, time: Duration) -> Option<SegmentId>;

    fn previous_segment_id(&self, id: SegmentId) -> Option<SegmentId>;

    fn segment_time_range(&self, id: SegmentId) -> Option<TimeRange>;

    /// Segment playback should start from.
    ///
    /// `now` is the elapsed time since `MPD@availabilityStartTime` for dynamic presentations,
    /// see [`DocumentParameters::live_time`]. `buffer_depth` is the amount of media the caller
    /// wants to keep buffered.
    fn start_segment_id(&self, now: Duration, buffer_depth: Duration) -> Option<SegmentId>;

    /// Replaces the wall-clock context of this stream.
    fn bind_parameters(&mut self, parameters: Arc<ManifestParameters>);

    fn parameters(&self) -> Option<&ManifestParameters>;

    fn bind(&mut self, document: DocumentParameters, period: PeriodParameters) {
        self.bind_parameters(Arc::new(ManifestParameters::new(document, period)));
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn is_dynamic(&self) -> bool {
        self.parameters()
            .is_some_and(|parameters| parameters.document.is_dynamic)
    }
}

/// Addressing-specific attributes carried along with every stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamAttributes {
    pub timescale: u64,
    pub presentation_time_offset: u64,
    pub time_shift_buffer_depth: Option<Duration>,
    pub availability_time_offset: Duration,
    pub availability_time_complete: Option<bool>,
}

impl StreamAttributes {
    pub fn inherit<N: AsRef<SegmentBaseNode>>(chain: &Inherited<'_, N>) -> Self {
        Self {
            timescale: chain.timescale(),
            presentation_time_offset: chain.presentation_time_offset(),
            time_shift_buffer_depth: chain.time_shift_buffer_depth(),
            availability_time_offset: chain.availability_time_offset(),
            availability_time_complete: chain.availability_time_complete(),
        }
    }
}

/// Everything a stream needs to know about its surroundings at construction time.
#[derive(Debug, Clone)]
pub struct StreamContext<'a> {
    /// Fully resolved `BaseURL` of the representation.
    pub base_url: Url,
    pub representation_id: Option<&'a str>,
    pub bandwidth: Option<u64>,
    pub period_start: Option<Duration>,
    pub period_duration: Option<Duration>,
    pub presentation_duration: Option<Duration>,
    pub live_edge: LiveEdgePolicy,
    pub span: Span,
}

impl StreamContext<'_> {
    /// Span of the period, falling back to the rest of the presentation.
    pub fn period_span(&self) -> Option<Duration> {
        self.period_duration.or_else(|| {
            self.presentation_duration?
                .checked_sub(self.period_start.unwrap_or_default())
        })
    }

    pub fn period_end(&self) -> Option<Duration> {
        Some(self.period_start.unwrap_or_default() + self.period_span()?)
    }

    pub(crate) fn url_segment(&self, node: &UrlNode) -> TimelineResult<Segment> {
        let url = match node.source_url.as_deref().map(str::trim) {
            Some(source_url) if !source_url.is_empty() => {
                merge_baseurls(&self.base_url, source_url)?
            }
            _ => self.base_url.clone(),
        };
        let range = node
            .range
            .as_deref()
            .map(str::parse::<ByteRange>)
            .transpose()?;

        Ok(Segment::new(url, range, None))
    }
}

#[derive(Debug)]
pub enum SegmentStream {
    None,
    Base(BaseStream),
    List(ListStream),
    Template(TemplateStream),
}

impl SegmentStream {
    pub fn build(addressing: Addressing<'_>, context: StreamContext<'_>) -> TimelineResult<Self> {
        Ok(match addressing {
            Addressing::None => SegmentStream::None,
            Addressing::Base(chain) => SegmentStream::Base(BaseStream::from_chain(&chain, context)?),
            Addressing::List(chain) => SegmentStream::List(ListStream::from_chain(&chain, context)?),
            Addressing::Template(chain) => {
                SegmentStream::Template(TemplateStream::from_chain(&chain, context)?)
            }
        })
    }

    pub fn as_base_mut(&mut self) -> Option<&mut BaseStream> {
        match self {
            SegmentStream::Base(stream) => Some(stream),
            _ => None,
        }
    }

    fn inner(&self) -> Option<&dyn RepresentationStream> {
        match self {
            SegmentStream::None => None,
            SegmentStream::Base(stream) => Some(stream),
            SegmentStream::List(stream) => Some(stream),
            SegmentStream::Template(stream) => Some(stream),
        }
    }

    fn inner_mut(&mut self) -> Option<&mut dyn RepresentationStream> {
        match self {
            SegmentStream::None => None,
            SegmentStream::Base(stream) => Some(stream),
            SegmentStream::List(stream) => Some(stream),
            SegmentStream::Template(stream) => Some(stream),
        }
    }
}

impl RepresentationStream for SegmentStream {
    fn duration(&self) -> Option<Duration> {
        self.inner()?.duration()
    }

    fn init_segment(&self) -> Option<Segment> {
        self.inner()?.init_segment()
    }

    fn count(&self) -> usize {
        self.inner().map_or(0, |stream| stream.count())
    }

    fn segments(&self) -> Vec<Segment> {
        self.inner()
            .map(|stream| stream.segments())
            .unwrap_or_default()
    }

    fn media_segment(&self, id: SegmentId) -> Option<Segment> {
        self.inner()?.media_segment(id)
    }

    fn segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        self.inner()?.segment_id_at(time)
    }

    fn next_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        self.inner()?.next_segment_id(id)
    }

    fn next_segment_id_at(&self, time: Duration) -> Option<SegmentId> {
        self.inner()?.next_segment_id_at(time)
    }

    fn previous_segment_id(&self, id: SegmentId) -> Option<SegmentId> {
        self.inner()?.previous_segment_id(id)
    }

    fn segment_time_range(&self, id: SegmentId) -> Option<TimeRange> {
        self.inner()?.segment_time_range(id)
    }

    fn start_segment_id(&self, now: Duration, buffer_depth: Duration) -> Option<SegmentId> {
        self.inner()?.start_segment_id(now, buffer_depth)
    }

    fn bind_parameters(&mut self, parameters: Arc<ManifestParameters>) {
        if let Some(stream) = self.inner_mut() {
            stream.bind_parameters(parameters);
        }
    }

    fn parameters(&self) -> Option<&ManifestParameters> {
        self.inner()?.parameters()
    }

    fn is_ready(&self) -> bool {
        self.inner().map_or(true, |stream| stream.is_ready())
    }
}
