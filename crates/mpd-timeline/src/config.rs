use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::util::time::seconds;

/// How segment indexes of `SegmentBase` representations are fetched while building a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFetchMode {
    /// One attempt per representation during construction.
    #[default]
    Eager,
    /// Streams stay pending until [`crate::Manifest::load_indices`] runs with retries.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(deserialize_with = "seconds::required")]
    pub attempt_timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    #[serde(deserialize_with = "seconds::required")]
    pub min_retry_delay: Duration,
    #[serde(deserialize_with = "seconds::required")]
    pub max_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(3),
            max_retries: 3,
            min_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Same timeout, no retries.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_retries: 0,
            ..self.clone()
        }
    }

    /// Random delay between two attempts.
    pub fn retry_delay(&self) -> Duration {
        if self.max_retry_delay <= self.min_retry_delay {
            return self.min_retry_delay;
        }
        rand::thread_rng().gen_range(self.min_retry_delay..=self.max_retry_delay)
    }
}

/// Empirical constants biasing live playback start away from the live edge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LiveEdgePolicy {
    /// Backoff from the newest timeline segment, as a fraction of the visible window.
    pub window_backoff_numerator: u64,
    pub window_backoff_denominator: u64,
    /// The backoff is at least the requested buffer depth times this.
    pub buffer_depth_multiplier: u64,
    /// Extra ticks added to the minimum buffer time of number based templates.
    pub template_offset_from_end: u64,
}

impl Default for LiveEdgePolicy {
    fn default() -> Self {
        Self {
            window_backoff_numerator: 3,
            window_backoff_denominator: 4,
            buffer_depth_multiplier: 4,
            template_offset_from_end: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub index_fetch: IndexFetchMode,
    pub retry: RetryPolicy,
    pub live_edge: LiveEdgePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: BuildConfig = serde_json::from_value(serde_json::json!({
            "index_fetch": "deferred",
            "retry": { "attempt_timeout": 1.5, "max_retries": 5 },
            "live_edge": { "buffer_depth_multiplier": 2 }
        }))
        .unwrap();

        assert_eq!(config.index_fetch, IndexFetchMode::Deferred);
        assert_eq!(config.retry.attempt_timeout, Duration::from_millis(1500));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.min_retry_delay, Duration::from_millis(100));
        assert_eq!(config.live_edge.buffer_depth_multiplier, 2);
        assert_eq!(config.live_edge.window_backoff_denominator, 4);
    }

    #[test]
    fn test_retry_delay_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.retry_delay();
            assert!(delay >= policy.min_retry_delay && delay <= policy.max_retry_delay);
        }

        let fixed = RetryPolicy {
            min_retry_delay: Duration::from_millis(300),
            max_retry_delay: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(fixed.retry_delay(), Duration::from_millis(300));
        assert_eq!(fixed.single_attempt().max_retries, 0);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: BuildConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BuildConfig::default());
    }
}
