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

//! Configuration for the tracker, the optimization controller and the tuning engine.
//!
//! There is no "invalid configuration" error path: every zero-valued duration,
//! threshold or limit is replaced with its documented default by
//! `normalized()`, which constructors call before using a configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Replaces a zero value with the given default.
pub fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

/// Configuration for the aggregation tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Width of a time-window bucket, in seconds.
    pub tracking_window_secs: u64,
    /// Maximum history points kept per endpoint.
    pub max_history_points: usize,
    /// Maximum number of time-window buckets kept; the oldest is evicted first.
    pub max_time_windows: usize,
    /// Number of most recent outcomes used for the recent success rate.
    pub recent_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking_window_secs: 60,
            max_history_points: 1000,
            max_time_windows: 1440,
            recent_window: 100,
        }
    }
}

impl TrackerConfig {
    /// Returns a copy with zero values replaced by defaults.
    pub fn normalized(&self) -> Self {
        let d = Self::default();
        Self {
            tracking_window_secs: or_default(self.tracking_window_secs, d.tracking_window_secs),
            max_history_points: or_default(self.max_history_points, d.max_history_points),
            max_time_windows: or_default(self.max_time_windows, d.max_time_windows),
            recent_window: or_default(self.recent_window, d.recent_window),
        }
    }

    /// Width of a time-window bucket.
    pub fn tracking_window(&self) -> Duration {
        Duration::from_secs(self.tracking_window_secs)
    }
}

/// Thresholds that decide whether an automatic optimization is warranted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationThresholds {
    /// Mean response time above which optimization triggers, in milliseconds.
    pub max_response_time_ms: u64,
    /// Success rate below which optimization triggers.
    pub min_success_rate: f64,
    /// CPU usage (percent) above which optimization triggers.
    pub max_cpu_usage: f64,
    /// Throughput below which optimization triggers.
    pub min_requests_per_second: f64,
}

impl Default for OptimizationThresholds {
    fn default() -> Self {
        Self {
            max_response_time_ms: 1000,
            min_success_rate: 0.95,
            max_cpu_usage: 80.0,
            min_requests_per_second: 1.0,
        }
    }
}

impl OptimizationThresholds {
    /// Returns a copy with zero values replaced by defaults.
    pub fn normalized(&self) -> Self {
        let d = Self::default();
        Self {
            max_response_time_ms: or_default(self.max_response_time_ms, d.max_response_time_ms),
            min_success_rate: or_default(self.min_success_rate, d.min_success_rate),
            max_cpu_usage: or_default(self.max_cpu_usage, d.max_cpu_usage),
            min_requests_per_second: or_default(
                self.min_requests_per_second,
                d.min_requests_per_second,
            ),
        }
    }

    /// Mean response time threshold.
    pub fn max_response_time(&self) -> Duration {
        Duration::from_millis(self.max_response_time_ms)
    }
}

/// Configuration for the optimization controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Interval between evaluation cycles, in milliseconds.
    pub evaluation_interval_ms: u64,
    /// Trigger thresholds.
    pub thresholds: OptimizationThresholds,
    /// Maximum automatic optimizations applied within any trailing hour.
    pub max_optimizations_per_hour: u32,
    /// Minimum time between two automatic optimizations, in seconds.
    pub cooldown_secs: u64,
    /// Capacity of the bounded action queue.
    pub action_queue_size: usize,
    /// Maximum performance snapshots kept in history.
    pub max_history_size: usize,
    /// Improvement (percent) below whose negative an active optimization is reverted.
    pub rollback_threshold: f64,
    /// Time an optimization stays under monitoring before it is completed, in seconds.
    pub monitoring_period_secs: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_ms: 30_000,
            thresholds: OptimizationThresholds::default(),
            max_optimizations_per_hour: 5,
            cooldown_secs: 300,
            action_queue_size: 100,
            max_history_size: 1000,
            rollback_threshold: 10.0,
            monitoring_period_secs: 600,
        }
    }
}

impl OptimizationConfig {
    /// Returns a copy with zero values replaced by defaults.
    pub fn normalized(&self) -> Self {
        let d = Self::default();
        Self {
            evaluation_interval_ms: or_default(self.evaluation_interval_ms, d.evaluation_interval_ms),
            thresholds: self.thresholds.normalized(),
            max_optimizations_per_hour: or_default(
                self.max_optimizations_per_hour,
                d.max_optimizations_per_hour,
            ),
            cooldown_secs: or_default(self.cooldown_secs, d.cooldown_secs),
            action_queue_size: or_default(self.action_queue_size, d.action_queue_size),
            max_history_size: or_default(self.max_history_size, d.max_history_size),
            rollback_threshold: or_default(self.rollback_threshold, d.rollback_threshold),
            monitoring_period_secs: or_default(self.monitoring_period_secs, d.monitoring_period_secs),
        }
    }

    /// Interval between evaluation cycles.
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }

    /// Minimum time between two automatic optimizations.
    pub fn cooldown_period(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Time an optimization stays under monitoring before completion.
    pub fn monitoring_period(&self) -> Duration {
        Duration::from_secs(self.monitoring_period_secs)
    }
}

/// Configuration for the tuning policy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Response time the system is expected to deliver, in milliseconds.
    pub expected_response_time_ms: u64,
    /// Throughput the system is expected to deliver.
    pub expected_throughput: f64,
    /// Fraction above the expected response time tolerated before tuning.
    pub safety_margin: f64,
    /// Maximum tuning sessions retained; the oldest finished session is dropped first.
    pub max_sessions: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            expected_response_time_ms: 500,
            expected_throughput: 100.0,
            safety_margin: 0.1,
            max_sessions: 100,
        }
    }
}

impl TuningConfig {
    /// Returns a copy with zero values replaced by defaults.
    pub fn normalized(&self) -> Self {
        let d = Self::default();
        Self {
            expected_response_time_ms: or_default(
                self.expected_response_time_ms,
                d.expected_response_time_ms,
            ),
            expected_throughput: or_default(self.expected_throughput, d.expected_throughput),
            safety_margin: or_default(self.safety_margin, d.safety_margin),
            max_sessions: or_default(self.max_sessions, d.max_sessions),
        }
    }

    /// Response time the system is expected to deliver.
    pub fn expected_response_time(&self) -> Duration {
        Duration::from_millis(self.expected_response_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values_take_defaults() {
        let config = OptimizationConfig {
            evaluation_interval_ms: 0,
            cooldown_secs: 0,
            action_queue_size: 0,
            rollback_threshold: 0.0,
            thresholds: OptimizationThresholds {
                min_success_rate: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
        .normalized();

        assert_eq!(config.evaluation_interval(), Duration::from_secs(30));
        assert_eq!(config.cooldown_period(), Duration::from_secs(300));
        assert_eq!(config.action_queue_size, 100);
        assert_eq!(config.rollback_threshold, 10.0);
        assert_eq!(config.thresholds.min_success_rate, 0.95);
    }

    #[test]
    fn test_non_zero_values_are_kept() {
        let config = TrackerConfig {
            tracking_window_secs: 5,
            max_history_points: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.tracking_window(), Duration::from_secs(5));
        assert_eq!(config.max_history_points, 1000);
    }

    #[test]
    fn test_tuning_defaults() {
        let config = TuningConfig::default().normalized();
        assert_eq!(config.expected_response_time(), Duration::from_millis(500));
        assert_eq!(config.safety_margin, 0.1);
    }
}
