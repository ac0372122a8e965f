use url::Url;

use crate::{TimelineError, TimelineResult};

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> TimelineResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // The query of the current URL is carried over unless the new URL brings its own.
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=old, /video42.mp4?auth=new) =>
        //   https://example.com/video42.mp4?auth=new
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}

/// Walks the `BaseURL` chain from the manifest location down to a representation.
///
/// Only the first `BaseURL` of every level is used.
pub(crate) fn resolve_base_url<'a>(
    manifest_url: Option<&Url>,
    levels: impl IntoIterator<Item = &'a [String]>,
) -> TimelineResult<Url> {
    let mut current = manifest_url.cloned();

    for base_urls in levels {
        let Some(base_url) = base_urls.first().map(|s| s.trim()) else {
            continue;
        };
        current = Some(match &current {
            Some(current) => merge_baseurls(current, base_url)?,
            None if is_absolute_url(base_url) => Url::parse(base_url)?,
            None => return Err(TimelineError::InvalidBaseUrl),
        });
    }

    current.ok_or(TimelineError::InvalidBaseUrl)
}
