// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Point-in-time performance metrics and the provider contracts that supply them.
//!
//! "Snapshots" are distinct from tracked events in that they are actively
//! polled once per controller cycle, whereas outcome events are pushed in as
//! requests complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::RwLock;
use std::time::Duration;

/// Resource and latency readings supplied by an external snapshot provider.
///
/// Resource usages are percentages in the `0.0..=100.0` range. The optional
/// application gauges are `None` when the host has never reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Mean response time.
    pub average_response_time: Duration,
    /// 95th percentile response time.
    pub p95_response_time: Duration,
    /// 99th percentile response time.
    pub p99_response_time: Duration,
    /// Request throughput.
    pub requests_per_second: f64,
    /// CPU usage (percent).
    pub cpu_usage: f64,
    /// Memory usage (percent).
    pub memory_usage: f64,
    /// Disk usage (percent).
    pub disk_usage: f64,
    /// Network usage relative to configured capacity (percent).
    pub network_usage: f64,
    /// Application-reported gauges.
    pub gauges: GaugeValues,
    /// When the readings were taken.
    pub captured_at: DateTime<Utc>,
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self {
            average_response_time: Duration::ZERO,
            p95_response_time: Duration::ZERO,
            p99_response_time: Duration::ZERO,
            requests_per_second: 0.0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            disk_usage: 0.0,
            network_usage: 0.0,
            gauges: GaugeValues::default(),
            captured_at: Utc::now(),
        }
    }
}

/// Application-level gauges that only the host application can measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GaugeValues {
    /// Cache hit ratio (`0.0..=1.0`).
    pub cache_hit_rate: Option<f64>,
    /// Mean database query time.
    pub db_query_time: Option<Duration>,
    /// Fraction of the connection pool in use (`0.0..=1.0`).
    pub connection_pool_utilization: Option<f64>,
    /// Relative load spread between the busiest and idlest backend (`0.0..=1.0`).
    pub load_imbalance: Option<f64>,
}

/// A thread-safe board the host application writes its gauges into.
///
/// Snapshot providers read it on every poll, so strategies always act on the
/// latest reported values rather than fixed stand-ins.
#[derive(Debug, Default)]
pub struct ApplicationGauges {
    values: RwLock<GaugeValues>,
}

impl ApplicationGauges {
    /// Creates a board with no gauges reported.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current gauges.
    pub fn read(&self) -> GaugeValues {
        self.values.read().map(|v| *v).unwrap_or_default()
    }

    /// Applies `update` to the gauges under the write lock.
    pub fn update(&self, update: impl FnOnce(&mut GaugeValues)) {
        if let Ok(mut values) = self.values.write() {
            update(&mut values);
        }
    }

    /// Reports the cache hit ratio.
    pub fn set_cache_hit_rate(&self, rate: f64) {
        self.update(|v| v.cache_hit_rate = Some(rate.clamp(0.0, 1.0)));
    }

    /// Reports the mean database query time.
    pub fn set_db_query_time(&self, time: Duration) {
        self.update(|v| v.db_query_time = Some(time));
    }

    /// Reports the connection pool utilisation.
    pub fn set_connection_pool_utilization(&self, utilization: f64) {
        self.update(|v| v.connection_pool_utilization = Some(utilization.clamp(0.0, 1.0)));
    }

    /// Reports the load imbalance between backends.
    pub fn set_load_imbalance(&self, imbalance: f64) {
        self.update(|v| v.load_imbalance = Some(imbalance.clamp(0.0, 1.0)));
    }
}

/// Overall and recent success rates, as exposed by a success-rate provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuccessRates {
    /// Lifetime success rate.
    pub overall: f64,
    /// Success rate over the most recent outcomes.
    pub recent: f64,
}

impl Default for SuccessRates {
    fn default() -> Self {
        Self {
            overall: 1.0,
            recent: 1.0,
        }
    }
}

/// The merged view the controller evaluates each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean response time.
    pub average_response_time: Duration,
    /// 95th percentile response time.
    pub p95_response_time: Duration,
    /// 99th percentile response time.
    pub p99_response_time: Duration,
    /// Request throughput.
    pub requests_per_second: f64,
    /// Lifetime success rate (`0.0..=1.0`).
    pub success_rate: f64,
    /// Recent success rate (`0.0..=1.0`).
    pub recent_success_rate: f64,
    /// `1.0 - success_rate`.
    pub error_rate: f64,
    /// CPU usage (percent).
    pub cpu_usage: f64,
    /// Memory usage (percent).
    pub memory_usage: f64,
    /// Disk usage (percent).
    pub disk_usage: f64,
    /// Network usage (percent).
    pub network_usage: f64,
    /// Application-reported gauges.
    pub gauges: GaugeValues,
    /// When the underlying snapshot was captured.
    pub captured_at: DateTime<Utc>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::merge(ResourceSnapshot::default(), SuccessRates::default())
    }
}

impl PerformanceMetrics {
    /// Merges a resource snapshot with success rates.
    pub fn merge(snapshot: ResourceSnapshot, rates: SuccessRates) -> Self {
        Self {
            average_response_time: snapshot.average_response_time,
            p95_response_time: snapshot.p95_response_time,
            p99_response_time: snapshot.p99_response_time,
            requests_per_second: snapshot.requests_per_second,
            success_rate: rates.overall,
            recent_success_rate: rates.recent,
            error_rate: (1.0 - rates.overall).clamp(0.0, 1.0),
            cpu_usage: snapshot.cpu_usage,
            memory_usage: snapshot.memory_usage,
            disk_usage: snapshot.disk_usage,
            network_usage: snapshot.network_usage,
            gauges: snapshot.gauges,
            captured_at: snapshot.captured_at,
        }
    }

    /// Mean response time in milliseconds.
    pub fn response_time_ms(&self) -> f64 {
        self.average_response_time.as_secs_f64() * 1000.0
    }

    /// Percentage improvement of `self` over `baseline`.
    ///
    /// Averages the oriented relative change of response time, throughput and
    /// success rate; a positive number always means "better". Dimensions whose
    /// baseline is zero carry no information and are skipped.
    pub fn improvement_over(&self, baseline: &PerformanceMetrics) -> f64 {
        let mut components = Vec::with_capacity(3);

        let before_rt = baseline.response_time_ms();
        if before_rt > 0.0 {
            components.push((before_rt - self.response_time_ms()) / before_rt);
        }
        if baseline.requests_per_second > 0.0 {
            components.push(
                (self.requests_per_second - baseline.requests_per_second)
                    / baseline.requests_per_second,
            );
        }
        if baseline.success_rate > 0.0 {
            components.push((self.success_rate - baseline.success_rate) / baseline.success_rate);
        }

        if components.is_empty() {
            return 0.0;
        }
        components.iter().sum::<f64>() / components.len() as f64 * 100.0
    }
}

/// Metrics captured at one cycle, with the strategies active at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// The merged metrics.
    pub metrics: PerformanceMetrics,
    /// Names of the strategies with an active optimization at capture time.
    pub active_strategies: Vec<String>,
    /// When the snapshot was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// An error raised by a snapshot provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The underlying source could not be read.
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies point-in-time resource and latency readings.
pub trait SnapshotProvider: Send + Sync + Debug {
    /// Takes a fresh snapshot.
    fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError>;
}

/// Supplies overall and recent success rates.
pub trait SuccessRateProvider: Send + Sync {
    /// Returns the current success rates.
    fn success_rates(&self) -> SuccessRates;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(rt_ms: u64, rps: f64, success: f64) -> PerformanceMetrics {
        PerformanceMetrics::merge(
            ResourceSnapshot {
                average_response_time: Duration::from_millis(rt_ms),
                requests_per_second: rps,
                ..Default::default()
            },
            SuccessRates {
                overall: success,
                recent: success,
            },
        )
    }

    #[test]
    fn test_merge_derives_error_rate() {
        let m = metrics(100, 10.0, 0.9);
        assert!((m.error_rate - 0.1).abs() < 1e-9);
        assert_eq!(m.response_time_ms(), 100.0);
    }

    #[test]
    fn test_improvement_is_positive_when_better() {
        let before = metrics(500, 100.0, 0.90);
        let after = metrics(400, 110.0, 0.99);
        // rt: +20%, throughput: +10%, success: +10% -> mean 13.33%
        let improvement = after.improvement_over(&before);
        assert!((improvement - 13.333).abs() < 0.01);
    }

    #[test]
    fn test_improvement_is_negative_when_worse() {
        let before = metrics(400, 100.0, 0.99);
        let after = metrics(800, 50.0, 0.50);
        assert!(after.improvement_over(&before) < 0.0);
    }

    #[test]
    fn test_improvement_skips_zero_baselines() {
        let before = metrics(0, 0.0, 0.0);
        let after = metrics(100, 10.0, 1.0);
        assert_eq!(after.improvement_over(&before), 0.0);
    }

    #[test]
    fn test_application_gauges_clamp() {
        let gauges = ApplicationGauges::new();
        gauges.set_cache_hit_rate(1.5);
        gauges.set_db_query_time(Duration::from_millis(250));
        let values = gauges.read();
        assert_eq!(values.cache_hit_rate, Some(1.0));
        assert_eq!(values.db_query_time, Some(Duration::from_millis(250)));
        assert_eq!(values.load_imbalance, None);
    }
}
