//! Spike/Cluster Detector
//!
//! Buckets events per tag into fixed, non-overlapping windows ending at the
//! most recent event and compares the latest bucket with the mean of the
//! `lookback` buckets before it.
//!
//! ```text
//!            bucket k        ...   bucket 1            bucket 0
//! ... (latest-(k+1)w, latest-kw] ... (latest-2w, latest-w] (latest-w, latest]
//!                                                          ^ current window
//! ```
//!
//! A tag is flagged when
//! `count >= minimum_count && count > baseline_rate * threshold_factor`,
//! and only once it has at least `lookback` prior buckets of history.
//!
//! Each stat also carries `pct_vs_baseline` (999 when a zero baseline meets
//! a positive count) and `spike_score = 10 z + 3 count + 0.05 pct`, used by
//! [`rank_by_spike_score`] for triage ordering.

use crate::config::ConfigError;
use crate::model::EnrichedEvent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Reported change when the baseline is zero and the window is not
pub const PCT_FROM_ZERO_BASELINE: f64 = 999.0;

const SPIKE_SCORE_Z_WEIGHT: f64 = 10.0;
const SPIKE_SCORE_COUNT_WEIGHT: f64 = 3.0;
const SPIKE_SCORE_PCT_WEIGHT: f64 = 0.05;

/// Flagging thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeRule {
    /// Count must exceed `baseline_rate * threshold_factor`
    pub threshold_factor: f64,
    /// Absolute floor on the current count
    pub minimum_count: usize,
}

/// Validated detector configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeConfig {
    window: Duration,
    lookback: usize,
    rule: SpikeRule,
}

impl SpikeConfig {
    pub fn new(window: Duration, lookback: usize, rule: SpikeRule) -> Result<Self, ConfigError> {
        if window <= Duration::zero() {
            return Err(ConfigError::Validation {
                field: "spike.window_secs".to_string(),
                message: "window must be positive".to_string(),
            });
        }
        if lookback == 0 {
            return Err(ConfigError::Validation {
                field: "spike.lookback_buckets".to_string(),
                message: "lookback must be at least 1 bucket".to_string(),
            });
        }
        if !rule.threshold_factor.is_finite() || rule.threshold_factor < 1.0 {
            return Err(ConfigError::Validation {
                field: "spike.threshold_factor".to_string(),
                message: format!("must be a finite number >= 1.0, got {}", rule.threshold_factor),
            });
        }
        if rule.minimum_count == 0 {
            return Err(ConfigError::Validation {
                field: "spike.minimum_count".to_string(),
                message: "minimum count must be at least 1".to_string(),
            });
        }

        Ok(Self {
            window,
            lookback,
            rule,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn rule(&self) -> SpikeRule {
        self.rule
    }

    /// Run a detection pass over `events`
    pub fn detect(&self, events: &[EnrichedEvent]) -> Vec<TagWindowStat> {
        detect_with(events, self)
    }
}

/// Per-tag statistics for the latest window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWindowStat {
    pub tag: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Events carrying the tag in the latest window
    pub count: usize,
    /// Mean count over the prior buckets available (up to `lookback`)
    pub baseline_rate: f64,
    pub is_spike: bool,
    /// Prior buckets since the tag was first seen
    pub history_buckets: usize,
    /// Standard score of `count` against the prior buckets (0 when flat)
    pub z_score: f64,
    /// Percent change of `count` over `baseline_rate`
    pub pct_vs_baseline: f64,
    pub spike_score: f64,
}

fn pct_vs_baseline(count: usize, baseline_rate: f64) -> f64 {
    if baseline_rate > 0.0 {
        (count as f64 - baseline_rate) / baseline_rate * 100.0
    } else if count > 0 {
        PCT_FROM_ZERO_BASELINE
    } else {
        0.0
    }
}

/// Order stats by descending spike score, then by tag
pub fn rank_by_spike_score(stats: &mut [TagWindowStat]) {
    stats.sort_by(|a, b| {
        b.spike_score
            .total_cmp(&a.spike_score)
            .then_with(|| a.tag.cmp(&b.tag))
    });
}

/// Counts kept for one tag
#[derive(Debug)]
struct TagSlot {
    current: usize,
    /// prior[k - 1] = count in bucket k, for k in 1..=lookback
    prior: Vec<usize>,
    /// Oldest bucket index the tag appears in
    oldest_bucket: usize,
}

impl TagSlot {
    fn new(lookback: usize) -> Self {
        Self {
            current: 0,
            prior: vec![0; lookback],
            oldest_bucket: 0,
        }
    }

    fn record(&mut self, bucket: usize) {
        self.oldest_bucket = self.oldest_bucket.max(bucket);
        match bucket {
            0 => self.current += 1,
            k if k <= self.prior.len() => self.prior[k - 1] += 1,
            _ => {}
        }
    }

    /// Mean and population standard deviation of the usable prior buckets
    fn baseline(&self) -> (f64, f64) {
        let n = self.oldest_bucket.min(self.prior.len());
        if n == 0 {
            return (0.0, 0.0);
        }
        let window = &self.prior[..n];
        let mean = window.iter().sum::<usize>() as f64 / n as f64;
        let variance = window
            .iter()
            .map(|&c| {
                let d = c as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n as f64;
        (mean, variance.sqrt())
    }
}

/// Detect spikes with explicit window and lookback.
///
/// Fails only on an invalid window/lookback/rule.
pub fn detect(
    events: &[EnrichedEvent],
    window: Duration,
    lookback: usize,
    rule: SpikeRule,
) -> Result<Vec<TagWindowStat>, ConfigError> {
    let config = SpikeConfig::new(window, lookback, rule)?;
    Ok(detect_with(events, &config))
}

/// Detect spikes with a validated configuration; output sorted by tag
pub fn detect_with(events: &[EnrichedEvent], config: &SpikeConfig) -> Vec<TagWindowStat> {
    let Some(latest) = events.iter().map(|e| e.timestamp()).max() else {
        return Vec::new();
    };
    let window_ms = config.window.num_milliseconds().max(1);

    let mut arena: Vec<TagSlot> = Vec::new();
    let mut slots: BTreeMap<&str, usize> = BTreeMap::new();

    for event in events {
        let age_ms = (latest - event.timestamp()).num_milliseconds();
        let bucket = (age_ms / window_ms) as usize;

        for tag in &event.record.tags {
            let idx = *slots.entry(tag.as_str()).or_insert_with(|| {
                arena.push(TagSlot::new(config.lookback));
                arena.len() - 1
            });
            arena[idx].record(bucket);
        }
    }

    let window_start = latest - config.window;
    let rule = config.rule;

    let stats: Vec<TagWindowStat> = slots
        .into_iter()
        .map(|(tag, idx)| {
            let slot = &arena[idx];
            let (baseline_rate, stddev) = slot.baseline();
            let sufficient = slot.oldest_bucket >= config.lookback;
            let count = slot.current;

            let is_spike = sufficient
                && count >= rule.minimum_count
                && count as f64 > baseline_rate * rule.threshold_factor;

            let z_score = if stddev > 0.0 {
                (count as f64 - baseline_rate) / stddev
            } else {
                0.0
            };

            let pct_vs_baseline = pct_vs_baseline(count, baseline_rate);
            let spike_score = SPIKE_SCORE_Z_WEIGHT * z_score
                + SPIKE_SCORE_COUNT_WEIGHT * count as f64
                + SPIKE_SCORE_PCT_WEIGHT * pct_vs_baseline;

            if is_spike {
                debug!(
                    "Spike on '{}': {} events vs baseline {:.2} (x{:.1})",
                    tag, count, baseline_rate, rule.threshold_factor
                );
            }

            TagWindowStat {
                tag: tag.to_string(),
                window_start,
                window_end: latest,
                count,
                baseline_rate,
                is_spike,
                history_buckets: slot.oldest_bucket,
                z_score,
                pct_vs_baseline,
                spike_score,
            }
        })
        .collect();

    info!(
        "Spike pass over {} events: {} tags, {} spiking",
        events.len(),
        stats.len(),
        stats.iter().filter(|s| s.is_spike).count()
    );

    stats
}
