use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::{
    config::{BuildConfig, IndexFetchMode, RetryPolicy},
    fetch::IndexFetcher,
    inherit::{first_present, Addressing},
    node::{AdaptationSetNode, DocumentNode, PeriodNode, RepresentationNode},
    params::{DocumentParameters, ManifestParameters, PeriodType},
    period::{self, PeriodBounds},
    stream::{RepresentationStream, SegmentStream, StreamContext},
    util::url::resolve_base_url,
    TimelineResult,
};

#[derive(Debug)]
pub struct Representation {
    pub id: Option<String>,
    pub bandwidth: Option<u64>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub stream: SegmentStream,
}

#[derive(Debug)]
pub struct AdaptationSet {
    pub id: Option<u64>,
    pub content_type: Option<String>,
    pub lang: Option<String>,
    pub representations: Vec<Representation>,
}

#[derive(Debug)]
pub struct Period {
    pub id: Option<String>,
    pub start: Option<Duration>,
    pub duration: Option<Duration>,
    pub end: Option<Duration>,
    pub kind: PeriodType,
    pub adaptation_sets: Vec<AdaptationSet>,
}

impl Period {
    fn bounds(&self) -> PeriodBounds {
        PeriodBounds {
            start: self.start,
            duration: self.duration,
            end: self.end,
            kind: self.kind,
        }
    }

    fn set_bounds(&mut self, bounds: PeriodBounds) {
        self.start = bounds.start;
        self.duration = bounds.duration;
        self.end = bounds.end;
        self.kind = bounds.kind;
    }

    pub fn representations(&self) -> impl Iterator<Item = &Representation> {
        self.adaptation_sets
            .iter()
            .flat_map(|set| set.representations.iter())
    }

    fn representations_mut(&mut self) -> impl Iterator<Item = &mut Representation> {
        self.adaptation_sets
            .iter_mut()
            .flat_map(|set| set.representations.iter_mut())
    }

    /// Longest duration among the streams of this period.
    pub fn longest_stream_duration(&self) -> Option<Duration> {
        self.representations()
            .filter_map(|representation| representation.stream.duration())
            .max()
    }

    pub fn contains(&self, time: Duration) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        match self.duration {
            Some(duration) => start <= time && time < start + duration,
            None => start <= time,
        }
    }
}

/// Every representation of a manifest resolved into a segment stream.
#[derive(Debug)]
pub struct Manifest {
    document: DocumentParameters,
    periods: Vec<Period>,
    play_clock: Duration,
    config: BuildConfig,
    span: Span,
}

impl Manifest {
    /// Builds every stream and binds a fresh parameter snapshot to it.
    ///
    /// Indexed `SegmentBase` streams stay pending, see [`Manifest::load_indices`].
    pub fn build(document: &DocumentNode, config: &BuildConfig, span: Span) -> TimelineResult<Self> {
        period::validate(document)?;
        let bounds = period::resolve_bounds(&document.periods, document);

        let periods = document
            .periods
            .iter()
            .zip(bounds)
            .map(|(node, bounds)| Self::build_period(document, node, bounds, config, &span))
            .collect::<TimelineResult<Vec<_>>>()?;

        let mut manifest = Self {
            document: DocumentParameters::new(document),
            periods,
            play_clock: Duration::ZERO,
            config: config.clone(),
            span,
        };
        manifest.resolve_durations();
        manifest.bind();

        tracing::debug!(
            parent: &manifest.span,
            periods = manifest.periods.len(),
            dynamic = manifest.document.is_dynamic,
            "Manifest built"
        );
        Ok(manifest)
    }

    /// [`Manifest::build`], then fetches segment indexes according to the configured mode.
    ///
    /// `Eager` makes one attempt per index. `Deferred` leaves them to [`Manifest::load_indices`].
    pub async fn build_with_indices<F>(
        document: &DocumentNode,
        config: &BuildConfig,
        fetcher: &F,
        token: &CancellationToken,
        span: Span,
    ) -> TimelineResult<Self>
    where
        F: IndexFetcher,
    {
        let mut manifest = Self::build(document, config, span)?;
        if manifest.config.index_fetch == IndexFetchMode::Eager {
            let policy = manifest.config.retry.single_attempt();
            manifest.fetch_indices(fetcher, &policy, token).await?;
        }
        Ok(manifest)
    }

    /// Fetches every pending segment index with retries.
    ///
    /// Returns `false` when cancelled. Streams loaded before cancellation keep their index.
    pub async fn load_indices<F>(
        &mut self,
        fetcher: &F,
        token: &CancellationToken,
    ) -> TimelineResult<bool>
    where
        F: IndexFetcher,
    {
        let policy = self.config.retry.clone();
        self.fetch_indices(fetcher, &policy, token).await
    }

    async fn fetch_indices<F>(
        &mut self,
        fetcher: &F,
        policy: &RetryPolicy,
        token: &CancellationToken,
    ) -> TimelineResult<bool>
    where
        F: IndexFetcher,
    {
        let mut completed = true;
        for period in &mut self.periods {
            for representation in period.representations_mut() {
                let Some(stream) = representation.stream.as_base_mut() else {
                    continue;
                };
                if !stream.load_index(fetcher, policy, token).await? {
                    completed = false;
                    break;
                }
            }
            if !completed {
                break;
            }
        }

        self.resolve_durations();
        self.bind();
        Ok(completed)
    }

    fn build_period(
        document: &DocumentNode,
        node: &PeriodNode,
        bounds: PeriodBounds,
        config: &BuildConfig,
        span: &Span,
    ) -> TimelineResult<Period> {
        let adaptation_sets = node
            .adaptation_sets
            .iter()
            .map(|set| {
                let representations = set
                    .representations
                    .iter()
                    .map(|representation| {
                        Self::build_representation(
                            document,
                            node,
                            set,
                            representation,
                            bounds,
                            config,
                            span,
                        )
                    })
                    .collect::<TimelineResult<Vec<_>>>()?;

                Ok(AdaptationSet {
                    id: set.id,
                    content_type: set.content_type.clone(),
                    lang: set.lang.clone(),
                    representations,
                })
            })
            .collect::<TimelineResult<Vec<_>>>()?;

        Ok(Period {
            id: node.id.clone(),
            start: bounds.start,
            duration: bounds.duration,
            end: bounds.end,
            kind: bounds.kind,
            adaptation_sets,
        })
    }

    fn build_representation(
        document: &DocumentNode,
        period: &PeriodNode,
        adaptation_set: &AdaptationSetNode,
        representation: &RepresentationNode,
        bounds: PeriodBounds,
        config: &BuildConfig,
        span: &Span,
    ) -> TimelineResult<Representation> {
        let representation_span = tracing::debug_span!(
            parent: span,
            "representation",
            id = representation.id.as_deref().unwrap_or_default(),
            bandwidth = representation.bandwidth.unwrap_or_default(),
        );

        let stream = match Addressing::resolve(period, adaptation_set, representation) {
            Addressing::None => {
                tracing::warn!(parent: &representation_span, "No segment addressing found");
                SegmentStream::None
            }
            addressing => {
                let base_url = resolve_base_url(
                    document.manifest_url.as_ref(),
                    [
                        document.base_urls.as_slice(),
                        period.base_urls.as_slice(),
                        adaptation_set.base_urls.as_slice(),
                        representation.base_urls.as_slice(),
                    ],
                )?;
                let context = StreamContext {
                    base_url,
                    representation_id: representation.id.as_deref(),
                    bandwidth: representation.bandwidth,
                    period_start: bounds.start,
                    period_duration: bounds.span(),
                    presentation_duration: document.media_presentation_duration,
                    live_edge: config.live_edge.clone(),
                    span: representation_span,
                };
                SegmentStream::build(addressing, context)?
            }
        };

        Ok(Representation {
            id: representation.id.clone(),
            bandwidth: representation.bandwidth,
            mime_type: first_present(
                representation.mime_type.clone(),
                adaptation_set.mime_type.clone(),
                None,
            ),
            codecs: first_present(
                representation.codecs.clone(),
                adaptation_set.codecs.clone(),
                None,
            ),
            width: representation.width,
            height: representation.height,
            stream,
        })
    }

    fn resolve_durations(&mut self) {
        let mut bounds: Vec<_> = self.periods.iter().map(Period::bounds).collect();
        period::resolve_durations(&mut bounds, |i| self.periods[i].longest_stream_duration());
        for (period, bounds) in self.periods.iter_mut().zip(bounds) {
            period.set_bounds(bounds);
        }
    }

    fn bind(&mut self) {
        for i in 0..self.periods.len() {
            let Some(parameters) = self.parameters(i) else {
                continue;
            };
            let parameters = Arc::new(parameters);
            for representation in self.periods[i].representations_mut() {
                representation.stream.bind_parameters(parameters.clone());
            }
        }
    }

    /// Replaces the snapshot of every stream, after a manifest reload.
    pub fn rebind(&mut self, document: DocumentParameters) {
        self.document = document;
        self.bind();
    }

    /// Moves the playback position used by single-file streams of dynamic presentations.
    pub fn set_play_clock(&mut self, play_clock: Duration) {
        self.play_clock = play_clock;
        self.bind();
    }

    /// Fresh snapshot for the period at `index`.
    pub fn parameters(&self, index: usize) -> Option<ManifestParameters> {
        let period = self.periods.get(index)?;
        Some(
            ManifestParameters::new(self.document.clone(), period.bounds().parameters())
                .with_play_clock(self.play_clock),
        )
    }

    /// Period playing at `time`.
    pub fn find_period(&self, time: Duration) -> Option<&Period> {
        self.periods.iter().find(|period| period.contains(time))
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn document(&self) -> &DocumentParameters {
        &self.document
    }

    pub fn is_dynamic(&self) -> bool {
        self.document.is_dynamic
    }

    /// Whether every stream can answer queries, segment indexes included.
    pub fn is_ready(&self) -> bool {
        self.periods
            .iter()
            .flat_map(|period| period.representations())
            .all(|representation| representation.stream.is_ready())
    }
}
