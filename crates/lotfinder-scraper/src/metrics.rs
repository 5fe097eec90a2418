//! Rolling per-platform fetch metrics.
//!
//! One [`MetricsCollector`] is built at startup and shared by reference with
//! every [`crate::Harvester`]. Readers only ever receive [`MetricsSnapshot`]
//! copies.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lotfinder_core::Platform;
use serde::Serialize;

/// Number of most recent durations kept per platform.
pub const METRICS_WINDOW: usize = 50;

/// What one orchestrated fetch reports when it finishes.
#[derive(Debug, Clone, Copy)]
pub struct FetchOutcome {
    pub duration: Duration,
    /// The headless driver's output replaced the static result.
    pub headless_adopted: bool,
    /// The static result was below the sparsity threshold.
    pub sparse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub platform: Platform,
    pub last_ms: u64,
    pub avg_ms: u64,
    pub p95_ms: u64,
    pub samples: usize,
    pub total_calls: u64,
    pub headless_promotions: u64,
    pub sparse_results: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Window {
    durations_ms: VecDeque<u64>,
    total_calls: u64,
    headless_promotions: u64,
    sparse_results: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl Window {
    fn push(&mut self, outcome: FetchOutcome) {
        let ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX);
        if self.durations_ms.len() == METRICS_WINDOW {
            self.durations_ms.pop_front();
        }
        self.durations_ms.push_back(ms);
        self.total_calls += 1;
        if outcome.headless_adopted {
            self.headless_promotions += 1;
        }
        if outcome.sparse {
            self.sparse_results += 1;
        }
        self.updated_at = Some(Utc::now());
    }

    fn snapshot(&self, platform: Platform) -> MetricsSnapshot {
        let samples = self.durations_ms.len();
        let avg_ms = if samples == 0 {
            0
        } else {
            self.durations_ms.iter().sum::<u64>() / samples as u64
        };
        MetricsSnapshot {
            platform,
            last_ms: self.durations_ms.back().copied().unwrap_or(0),
            avg_ms,
            p95_ms: nearest_rank_p95(&self.durations_ms),
            samples,
            total_calls: self.total_calls,
            headless_promotions: self.headless_promotions,
            sparse_results: self.sparse_results,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

/// 95th percentile by nearest rank: the `ceil(0.95 * n)`-th smallest sample.
fn nearest_rank_p95(samples: &VecDeque<u64>) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted: Vec<u64> = samples.iter().copied().collect();
    sorted.sort_unstable();
    let rank = (sorted.len() * 95).div_ceil(100);
    sorted[rank.saturating_sub(1)]
}

/// Thread-safe metrics store keyed by platform.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    windows: Mutex<HashMap<Platform, Window>>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, platform: Platform, outcome: FetchOutcome) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.entry(platform).or_default().push(outcome);
    }

    /// Current figures for `platform`, or `None` before its first fetch.
    #[must_use]
    pub fn snapshot(&self, platform: Platform) -> Option<MetricsSnapshot> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.get(&platform).map(|w| w.snapshot(platform))
    }

    /// Snapshots for every platform fetched so far, in platform order.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<MetricsSnapshot> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<MetricsSnapshot> = windows
            .iter()
            .map(|(platform, w)| w.snapshot(*platform))
            .collect();
        all.sort_by_key(|s| s.platform);
        all
    }
}
