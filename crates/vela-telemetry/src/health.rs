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

//! Health and trend evaluation.
//!
//! The scoring functions are pure and cheap; the tracker calls them on every
//! update. [`HealthReport::evaluate`] is the heavier read-side pass that turns
//! an [`OverallStats`] snapshot into human-readable alerts.

use serde::{Deserialize, Serialize};
use vela_core::or_default;
use vela_core::telemetry::{OverallStats, Trend};

/// Weight of the failure ratio in the health score penalty.
const FAILURE_PENALTY: f64 = 20.0;
/// Dead-band around the overall rate within which the trend is `Stable`.
const TREND_DEAD_BAND: f64 = 0.01;

/// Computes the 0–100 health score.
///
/// `success_rate * 100` penalised by the failure ratio. An idle system
/// (`total == 0`) is fully healthy.
pub fn health_score(success_rate: f64, failed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let failure_ratio = failed as f64 / total as f64;
    (success_rate * 100.0 - failure_ratio * FAILURE_PENALTY).clamp(0.0, 100.0)
}

/// Compares the recent success rate to the overall one.
pub fn classify_trend(recent: f64, overall: f64) -> Trend {
    if recent > overall + TREND_DEAD_BAND {
        Trend::Improving
    } else if recent < overall - TREND_DEAD_BAND {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}

/// Limits below which [`HealthReport::evaluate`] raises alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    /// Health score under which the system is reported unhealthy.
    pub min_health_score: f64,
    /// Overall success rate under which an alert is raised.
    pub min_success_rate: f64,
    /// Gap between trending and overall rate that counts as a sharp drop.
    pub max_trending_drop: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_health_score: 80.0,
            min_success_rate: 0.95,
            max_trending_drop: 0.05,
        }
    }
}

impl HealthThresholds {
    /// Returns a copy with zero values replaced by defaults.
    pub fn normalized(&self) -> Self {
        let d = Self::default();
        Self {
            min_health_score: or_default(self.min_health_score, d.min_health_score),
            min_success_rate: or_default(self.min_success_rate, d.min_success_rate),
            max_trending_drop: or_default(self.max_trending_drop, d.max_trending_drop),
        }
    }
}

/// The evaluated health of the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// The 0–100 health score.
    pub score: f64,
    /// Direction of the success rate.
    pub trend: Trend,
    /// `true` when no alert was raised.
    pub healthy: bool,
    /// Human-readable findings.
    pub alerts: Vec<String>,
}

impl HealthReport {
    /// Evaluates overall statistics against the thresholds.
    pub fn evaluate(stats: &OverallStats, thresholds: &HealthThresholds) -> Self {
        let score = health_score(
            stats.overall_success_rate,
            stats.failed_requests,
            stats.total_requests,
        );
        let trend = classify_trend(stats.recent_success_rate, stats.overall_success_rate);
        let mut alerts = Vec::new();

        if stats.total_requests == 0 {
            return Self {
                score,
                trend,
                healthy: true,
                alerts,
            };
        }

        if score < thresholds.min_health_score {
            log::warn!(
                "Health: score {:.1} below {:.1}.",
                score,
                thresholds.min_health_score
            );
            alerts.push(format!(
                "Health: score {:.1} below minimum {:.1}.",
                score, thresholds.min_health_score
            ));
        }

        if stats.overall_success_rate < thresholds.min_success_rate {
            alerts.push(format!(
                "SuccessRate: {:.1}% below {:.1}% floor.",
                stats.overall_success_rate * 100.0,
                thresholds.min_success_rate * 100.0
            ));
        }

        if trend == Trend::Degrading {
            log::info!(
                "Health: success rate degrading (recent {:.3} vs overall {:.3}).",
                stats.recent_success_rate,
                stats.overall_success_rate
            );
            alerts.push(format!(
                "Trend: recent {:.1}% trails overall {:.1}%.",
                stats.recent_success_rate * 100.0,
                stats.overall_success_rate * 100.0
            ));
        }

        let drop = stats.overall_success_rate - stats.trending_success_rate;
        if drop > thresholds.max_trending_drop {
            alerts.push(format!(
                "Trending: smoothed rate {:.1}% fell {:.1} points under overall.",
                stats.trending_success_rate * 100.0,
                drop * 100.0
            ));
        }

        Self {
            score,
            trend,
            healthy: alerts.is_empty(),
            alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_health_score_idle_is_full() {
        assert_eq!(health_score(0.0, 0, 0), 100.0);
    }

    #[test]
    fn test_health_score_penalises_failures() {
        // 90% success, 10% failures -> 90 - 2
        assert_relative_eq!(health_score(0.9, 10, 100), 88.0, epsilon = 1e-9);
        assert_eq!(health_score(0.0, 100, 100), 0.0);
        assert_eq!(health_score(1.0, 0, 50), 100.0);
    }

    #[test]
    fn test_trend_dead_band() {
        assert_eq!(classify_trend(0.95, 0.90), Trend::Improving);
        assert_eq!(classify_trend(0.85, 0.90), Trend::Degrading);
        assert_eq!(classify_trend(0.905, 0.90), Trend::Stable);
        assert_eq!(classify_trend(0.895, 0.90), Trend::Stable);
    }

    #[test]
    fn test_report_on_idle_system_is_healthy() {
        let report = HealthReport::evaluate(&OverallStats::default(), &HealthThresholds::default());
        assert!(report.healthy);
        assert_eq!(report.score, 100.0);
        assert_eq!(report.trend, Trend::Stable);
    }

    #[test]
    fn test_report_raises_alerts_on_degradation() {
        let stats = OverallStats {
            total_requests: 100,
            successful_requests: 70,
            failed_requests: 30,
            overall_success_rate: 0.7,
            recent_success_rate: 0.5,
            trending_success_rate: 0.55,
            ..Default::default()
        };
        let report = HealthReport::evaluate(&stats, &HealthThresholds::default());
        assert!(!report.healthy);
        assert_eq!(report.trend, Trend::Degrading);
        assert_eq!(report.alerts.len(), 4);
        assert!(report.alerts.iter().any(|a| a.starts_with("Trend:")));
    }
}
