use std::time::Duration;

use crate::node::{
    AdaptationSetNode, PeriodNode, RepresentationNode, SegmentBaseNode, SegmentListNode,
    SegmentTemplateNode, UrlNode,
};

/// Representation value, else adaptation set value, else period value.
pub fn first_present<T>(
    representation: Option<T>,
    adaptation_set: Option<T>,
    period: Option<T>,
) -> Option<T> {
    representation.or(adaptation_set).or(period)
}

/// One addressing element as declared on each of the three inheritance levels.
#[derive(Debug)]
pub struct Inherited<'a, N> {
    pub representation: Option<&'a N>,
    pub adaptation_set: Option<&'a N>,
    pub period: Option<&'a N>,
}

impl<N> Clone for Inherited<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for Inherited<'_, N> {}

impl<'a, N> Inherited<'a, N> {
    pub fn new(
        representation: Option<&'a N>,
        adaptation_set: Option<&'a N>,
        period: Option<&'a N>,
    ) -> Self {
        Self {
            representation,
            adaptation_set,
            period,
        }
    }

    pub fn empty() -> Self {
        Self::new(None, None, None)
    }

    pub fn is_empty(&self) -> bool {
        self.representation.is_none() && self.adaptation_set.is_none() && self.period.is_none()
    }

    pub fn get<T>(&self, attribute: impl Fn(&'a N) -> Option<T>) -> Option<T> {
        first_present(
            self.representation.and_then(&attribute),
            self.adaptation_set.and_then(&attribute),
            self.period.and_then(&attribute),
        )
    }
}

impl<'a, N: AsRef<SegmentBaseNode>> Inherited<'a, N> {
    fn base<T>(&self, attribute: impl Fn(&'a SegmentBaseNode) -> Option<T>) -> Option<T> {
        self.get(|node| attribute(node.as_ref()))
    }

    pub fn timescale(&self) -> u64 {
        self.base(|b| b.timescale).filter(|t| *t > 0).unwrap_or(1)
    }

    pub fn presentation_time_offset(&self) -> u64 {
        self.base(|b| b.presentation_time_offset).unwrap_or(0)
    }

    pub fn index_range(&self) -> Option<&'a str> {
        self.base(|b| b.index_range.as_deref())
    }

    pub fn index_range_exact(&self) -> bool {
        self.base(|b| b.index_range_exact).unwrap_or(false)
    }

    pub fn availability_time_offset(&self) -> Duration {
        self.base(|b| b.availability_time_offset)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default()
    }

    pub fn availability_time_complete(&self) -> Option<bool> {
        self.base(|b| b.availability_time_complete)
    }

    pub fn time_shift_buffer_depth(&self) -> Option<Duration> {
        self.base(|b| b.time_shift_buffer_depth)
    }

    pub fn initialization(&self) -> Option<&'a UrlNode> {
        self.base(|b| b.initialization.as_ref())
    }

    pub fn representation_index(&self) -> Option<&'a UrlNode> {
        self.base(|b| b.representation_index.as_ref())
    }
}

/// Addressing scheme a representation resolved to.
#[derive(Debug, Clone, Copy)]
pub enum Addressing<'a> {
    None,
    /// An empty chain means the representation only declares a `BaseURL`.
    Base(Inherited<'a, SegmentBaseNode>),
    List(Inherited<'a, SegmentListNode>),
    Template(Inherited<'a, SegmentTemplateNode>),
}

impl<'a> Addressing<'a> {
    /// Picks the most specific declaration: template, then list, then base on the
    /// representation, then the same order on the adaptation set and on the period.
    pub fn resolve(
        period: &'a PeriodNode,
        adaptation_set: &'a AdaptationSetNode,
        representation: &'a RepresentationNode,
    ) -> Self {
        let templates = Inherited::new(
            representation.segment_template.as_ref(),
            adaptation_set.segment_template.as_ref(),
            period.segment_template.as_ref(),
        );
        let lists = Inherited::new(
            representation.segment_list.as_ref(),
            adaptation_set.segment_list.as_ref(),
            period.segment_list.as_ref(),
        );
        let bases = Inherited::new(
            representation.segment_base.as_ref(),
            adaptation_set.segment_base.as_ref(),
            period.segment_base.as_ref(),
        );

        let levels = [
            (
                templates.representation.is_some(),
                lists.representation.is_some(),
                bases.representation.is_some(),
            ),
            (
                templates.adaptation_set.is_some(),
                lists.adaptation_set.is_some(),
                bases.adaptation_set.is_some(),
            ),
            (
                templates.period.is_some(),
                lists.period.is_some(),
                bases.period.is_some(),
            ),
        ];
        for (template, list, base) in levels {
            if template {
                return Addressing::Template(templates);
            }
            if list {
                return Addressing::List(lists);
            }
            if base {
                return Addressing::Base(bases);
            }
        }

        if !representation.base_urls.is_empty() {
            return Addressing::Base(Inherited::empty());
        }
        Addressing::None
    }
}
