use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Converts `ticks` in `timescale` units per second to a [`Duration`], truncating below a nanosecond.
pub(crate) fn scaled(ticks: u64, timescale: u64) -> Duration {
    let timescale = timescale.max(1);
    let nanos = (ticks % timescale) as u128 * NANOS_PER_SEC / timescale as u128;
    Duration::new(ticks / timescale, nanos as u32)
}

/// Converts a [`Duration`] to `timescale` ticks, rounding up.
pub(crate) fn ticks_ceil(duration: Duration, timescale: u64) -> u64 {
    let ticks = (duration.as_nanos() * timescale as u128).div_ceil(NANOS_PER_SEC);
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

/// Serde helpers reading durations written as (fractional) seconds.
pub(crate) mod seconds {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer};

    pub(crate) fn required<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }

    pub(crate) fn option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

/// Scaled length of `[time, time + duration)`.
///
/// Computed as a difference of scaled endpoints so that consecutive ranges stay contiguous.
pub(crate) fn scaled_span(time: u64, duration: u64, timescale: u64) -> Duration {
    scaled(time.saturating_add(duration), timescale) - scaled(time, timescale)
}
