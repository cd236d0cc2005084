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

//! The built-in policy catalog.

use std::time::Duration;
use vela_core::control::{PolicyKind, SafetyLimits, TuningParameters, TuningPolicy};

/// Response-time ratio (current / expected) from which the aggressive policy is chosen.
pub const AGGRESSIVE_RATIO: f64 = 2.0;
/// Response-time ratio from which the balanced policy is chosen.
pub const BALANCED_RATIO: f64 = 1.6;

/// Picks the policy for a response-time ratio.
pub fn kind_for_ratio(ratio: f64) -> PolicyKind {
    if ratio >= AGGRESSIVE_RATIO {
        PolicyKind::Aggressive
    } else if ratio >= BALANCED_RATIO {
        PolicyKind::Balanced
    } else {
        PolicyKind::Conservative
    }
}

/// Returns the built-in policy of the given kind.
pub fn builtin(kind: PolicyKind) -> TuningPolicy {
    match kind {
        PolicyKind::Conservative => TuningPolicy {
            kind,
            description: "Small steps with a tight degradation budget".to_string(),
            response_time: TuningParameters::new(0.10, 0.05, 0.05),
            throughput: TuningParameters::new(0.05, 0.05, 0.05),
            resource: TuningParameters::new(0.10, 0.05, 0.05),
            frequency: TuningParameters::new(0.05, 0.02, 0.05),
            safety: SafetyLimits {
                max_cpu_usage: 70.0,
                max_memory_usage: 75.0,
                max_disk_usage: 80.0,
                max_network_usage: 70.0,
                min_response_time: Duration::from_millis(50),
                max_response_time: Duration::from_secs(2),
                min_success_rate: 0.99,
                max_error_rate: 0.01,
            },
            priority: 1,
        },
        PolicyKind::Balanced => TuningPolicy {
            kind,
            description: "Moderate steps for noticeable slowdowns".to_string(),
            response_time: TuningParameters::new(0.20, 0.10, 0.10),
            throughput: TuningParameters::new(0.15, 0.10, 0.10),
            resource: TuningParameters::new(0.15, 0.10, 0.10),
            frequency: TuningParameters::new(0.10, 0.05, 0.10),
            safety: SafetyLimits {
                max_cpu_usage: 80.0,
                max_memory_usage: 85.0,
                max_disk_usage: 90.0,
                max_network_usage: 80.0,
                min_response_time: Duration::from_millis(20),
                max_response_time: Duration::from_secs(5),
                min_success_rate: 0.95,
                max_error_rate: 0.05,
            },
            priority: 2,
        },
        PolicyKind::Aggressive => TuningPolicy {
            kind,
            description: "Large steps for severe slowdowns".to_string(),
            response_time: TuningParameters::new(0.40, 0.20, 0.25),
            throughput: TuningParameters::new(0.30, 0.20, 0.25),
            resource: TuningParameters::new(0.25, 0.15, 0.20),
            frequency: TuningParameters::new(0.20, 0.10, 0.20),
            safety: SafetyLimits {
                max_cpu_usage: 90.0,
                max_memory_usage: 90.0,
                max_disk_usage: 95.0,
                max_network_usage: 90.0,
                min_response_time: Duration::from_millis(10),
                max_response_time: Duration::from_secs(10),
                min_success_rate: 0.90,
                max_error_rate: 0.10,
            },
            priority: 3,
        },
    }
}

/// All built-in policies, from conservative to aggressive.
pub fn catalog() -> Vec<TuningPolicy> {
    [
        PolicyKind::Conservative,
        PolicyKind::Balanced,
        PolicyKind::Aggressive,
    ]
    .into_iter()
    .map(builtin)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_bands() {
        assert_eq!(kind_for_ratio(2.4), PolicyKind::Aggressive);
        assert_eq!(kind_for_ratio(2.0), PolicyKind::Aggressive);
        assert_eq!(kind_for_ratio(1.6), PolicyKind::Balanced);
        assert_eq!(kind_for_ratio(1.2), PolicyKind::Conservative);
        assert_eq!(kind_for_ratio(0.5), PolicyKind::Conservative);
    }

    #[test]
    fn test_catalog_grows_stricter_toward_conservative() {
        let policies = catalog();
        assert_eq!(policies.len(), 3);
        for pair in policies.windows(2) {
            assert!(pair[0].priority < pair[1].priority);
            assert!(pair[0].safety.max_cpu_usage < pair[1].safety.max_cpu_usage);
            assert!(pair[0].response_time.adjustment_step < pair[1].response_time.adjustment_step);
        }
    }
}
