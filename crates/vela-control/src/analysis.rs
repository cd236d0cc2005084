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

//! Threshold analysis for the optimization controller.
//!
//! The `TriggerAnalyzer` decides whether the current metrics warrant an
//! automatic optimization. Each breached threshold adds an alert; any alert
//! is enough to trigger.

use serde::{Deserialize, Serialize};
use vela_core::telemetry::PerformanceMetrics;
use vela_core::OptimizationThresholds;

/// Findings of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerReport {
    /// `true` if at least one threshold was breached.
    pub should_optimize: bool,
    /// Human-readable summary of each breach.
    pub alerts: Vec<String>,
}

/// Compares merged metrics against the configured thresholds.
#[derive(Debug, Clone)]
pub struct TriggerAnalyzer {
    thresholds: OptimizationThresholds,
}

impl TriggerAnalyzer {
    /// Creates an analyzer over the given thresholds.
    pub fn new(thresholds: OptimizationThresholds) -> Self {
        Self { thresholds }
    }

    /// The thresholds in use.
    pub fn thresholds(&self) -> &OptimizationThresholds {
        &self.thresholds
    }

    /// Evaluates the metrics.
    ///
    /// 1. **Latency**: mean response time above the ceiling.
    /// 2. **Reliability**: success rate under the floor.
    /// 3. **CPU pressure**: usage above the ceiling.
    /// 4. **Throughput**: requests per second under the floor.
    pub fn analyze(&self, metrics: &PerformanceMetrics) -> TriggerReport {
        let mut report = TriggerReport::default();
        let t = &self.thresholds;

        if metrics.average_response_time > t.max_response_time() {
            report.alerts.push(format!(
                "Latency: average {:.1}ms above {}ms.",
                metrics.response_time_ms(),
                t.max_response_time_ms
            ));
        }

        if metrics.success_rate < t.min_success_rate {
            report.alerts.push(format!(
                "Reliability: success rate {:.1}% under {:.1}%.",
                metrics.success_rate * 100.0,
                t.min_success_rate * 100.0
            ));
        }

        if metrics.cpu_usage > t.max_cpu_usage {
            report.alerts.push(format!(
                "CPU: {:.1}% above {:.1}%.",
                metrics.cpu_usage, t.max_cpu_usage
            ));
        }

        if metrics.requests_per_second < t.min_requests_per_second {
            report.alerts.push(format!(
                "Throughput: {:.2} req/s under {:.2}.",
                metrics.requests_per_second, t.min_requests_per_second
            ));
        }

        report.should_optimize = !report.alerts.is_empty();
        if report.should_optimize {
            log::debug!("Analyzer: {} threshold(s) breached.", report.alerts.len());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn healthy() -> PerformanceMetrics {
        PerformanceMetrics {
            average_response_time: Duration::from_millis(200),
            requests_per_second: 50.0,
            success_rate: 0.99,
            cpu_usage: 40.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_healthy_metrics_do_not_trigger() {
        let report = TriggerAnalyzer::new(OptimizationThresholds::default()).analyze(&healthy());
        assert!(!report.should_optimize);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn test_each_threshold_triggers() {
        let analyzer = TriggerAnalyzer::new(OptimizationThresholds::default());
        let cases = [
            PerformanceMetrics {
                average_response_time: Duration::from_millis(1500),
                ..healthy()
            },
            PerformanceMetrics {
                success_rate: 0.9,
                ..healthy()
            },
            PerformanceMetrics {
                cpu_usage: 95.0,
                ..healthy()
            },
            PerformanceMetrics {
                requests_per_second: 0.5,
                ..healthy()
            },
        ];
        for metrics in cases {
            let report = analyzer.analyze(&metrics);
            assert!(report.should_optimize);
            assert_eq!(report.alerts.len(), 1);
        }
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let analyzer = TriggerAnalyzer::new(OptimizationThresholds::default());
        let metrics = PerformanceMetrics {
            average_response_time: Duration::from_millis(1000),
            success_rate: 0.95,
            cpu_usage: 80.0,
            requests_per_second: 1.0,
            ..healthy()
        };
        assert!(!analyzer.analyze(&metrics).should_optimize);
    }
}
