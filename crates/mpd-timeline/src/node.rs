//! Typed manifest tree handed over by the MPD deserializer.
//!
//! Attribute values are typed but not yet resolved across the
//! `Period` / `AdaptationSet` / `Representation` inheritance chain. Element children use the
//! element name as key (`Period`, `SegmentTemplate`, `S`, ...), attributes use their camelCase
//! attribute name. Durations are given in seconds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::util::time::seconds;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationType {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentNode {
    #[serde(rename = "type")]
    pub presentation_type: PresentationType,
    /// Location the manifest was fetched from, after redirects.
    pub manifest_url: Option<Url>,
    #[serde(rename = "BaseURL")]
    pub base_urls: Vec<String>,

    #[serde(deserialize_with = "seconds::option")]
    pub media_presentation_duration: Option<Duration>,
    #[serde(deserialize_with = "seconds::option")]
    pub min_buffer_time: Option<Duration>,
    #[serde(deserialize_with = "seconds::option")]
    pub time_shift_buffer_depth: Option<Duration>,
    #[serde(deserialize_with = "seconds::option")]
    pub suggested_presentation_delay: Option<Duration>,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub availability_end_time: Option<DateTime<Utc>>,
    pub publish_time: Option<DateTime<Utc>>,

    // Filled in by the loader, not part of the MPD itself.
    pub download_request_time: DateTime<Utc>,
    pub download_complete_time: DateTime<Utc>,
    pub parse_complete_time: DateTime<Utc>,

    #[serde(rename = "Period")]
    pub periods: Vec<PeriodNode>,
}

impl DocumentNode {
    pub fn is_dynamic(&self) -> bool {
        self.presentation_type == PresentationType::Dynamic
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeriodNode {
    pub id: Option<String>,
    #[serde(deserialize_with = "seconds::option")]
    pub start: Option<Duration>,
    #[serde(deserialize_with = "seconds::option")]
    pub duration: Option<Duration>,
    #[serde(rename = "BaseURL")]
    pub base_urls: Vec<String>,
    #[serde(rename = "SegmentBase")]
    pub segment_base: Option<SegmentBaseNode>,
    #[serde(rename = "SegmentList")]
    pub segment_list: Option<SegmentListNode>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplateNode>,
    #[serde(rename = "AdaptationSet")]
    pub adaptation_sets: Vec<AdaptationSetNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdaptationSetNode {
    pub id: Option<u64>,
    pub content_type: Option<String>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub lang: Option<String>,
    #[serde(rename = "BaseURL")]
    pub base_urls: Vec<String>,
    #[serde(rename = "SegmentBase")]
    pub segment_base: Option<SegmentBaseNode>,
    #[serde(rename = "SegmentList")]
    pub segment_list: Option<SegmentListNode>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplateNode>,
    #[serde(rename = "Representation")]
    pub representations: Vec<RepresentationNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepresentationNode {
    pub id: Option<String>,
    pub bandwidth: Option<u64>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    #[serde(rename = "BaseURL")]
    pub base_urls: Vec<String>,
    #[serde(rename = "SegmentBase")]
    pub segment_base: Option<SegmentBaseNode>,
    #[serde(rename = "SegmentList")]
    pub segment_list: Option<SegmentListNode>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplateNode>,
}

/// `Initialization` / `RepresentationIndex` elements.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UrlNode {
    #[serde(rename = "sourceURL")]
    pub source_url: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentBaseNode {
    pub timescale: Option<u64>,
    pub presentation_time_offset: Option<u64>,
    pub index_range: Option<String>,
    pub index_range_exact: Option<bool>,
    pub availability_time_offset: Option<f64>,
    pub availability_time_complete: Option<bool>,
    #[serde(deserialize_with = "seconds::option")]
    pub time_shift_buffer_depth: Option<Duration>,
    #[serde(rename = "Initialization")]
    pub initialization: Option<UrlNode>,
    #[serde(rename = "RepresentationIndex")]
    pub representation_index: Option<UrlNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentUrlNode {
    pub media: Option<String>,
    pub media_range: Option<String>,
    pub index: Option<String>,
    pub index_range: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentListNode {
    #[serde(flatten)]
    pub base: SegmentBaseNode,
    pub duration: Option<u64>,
    pub start_number: Option<u64>,
    #[serde(rename = "SegmentURL")]
    pub segment_urls: Vec<SegmentUrlNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentTemplateNode {
    #[serde(flatten)]
    pub base: SegmentBaseNode,
    pub duration: Option<u64>,
    pub start_number: Option<u64>,
    pub media: Option<String>,
    pub index: Option<String>,
    pub initialization: Option<String>,
    #[serde(rename = "SegmentTimeline")]
    pub segment_timeline: Option<SegmentTimelineNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SegmentTimelineNode {
    #[serde(rename = "S")]
    pub entries: Vec<SegmentTimelineEntry>,
}

/// `S` element: `@t` start, `@d` duration, `@r` repeat count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SegmentTimelineEntry {
    pub t: Option<u64>,
    pub d: u64,
    pub r: Option<i64>,
}

impl AsRef<SegmentBaseNode> for SegmentBaseNode {
    fn as_ref(&self) -> &SegmentBaseNode {
        self
    }
}

impl AsRef<SegmentBaseNode> for SegmentListNode {
    fn as_ref(&self) -> &SegmentBaseNode {
        &self.base
    }
}

impl AsRef<SegmentBaseNode> for SegmentTemplateNode {
    fn as_ref(&self) -> &SegmentBaseNode {
        &self.base
    }
}
