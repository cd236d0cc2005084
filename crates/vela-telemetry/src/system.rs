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

//! sysinfo-based implementation of the `SnapshotProvider` trait.

use crate::tracker::PerformanceTracker;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Disks, Networks, System};
use vela_core::telemetry::{ApplicationGauges, ProviderError, ResourceSnapshot, SnapshotProvider};

/// Default network capacity used to express traffic as a percentage (bytes per second).
pub const DEFAULT_NETWORK_CAPACITY: u64 = 125_000_000;

struct Probes {
    system: System,
    networks: Networks,
    last_refresh: std::time::Instant,
}

/// Combines host readings from `sysinfo` with latency derived from the tracker
/// and gauges reported by the application.
pub struct SystemSnapshotProvider {
    probes: Mutex<Probes>,
    tracker: Arc<PerformanceTracker>,
    gauges: Arc<ApplicationGauges>,
    latency_window: Duration,
    network_capacity: u64,
}

impl std::fmt::Debug for SystemSnapshotProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSnapshotProvider")
            .field("latency_window", &self.latency_window)
            .field("network_capacity", &self.network_capacity)
            .finish_non_exhaustive()
    }
}

impl SystemSnapshotProvider {
    /// Creates a provider reading latency over the trailing `latency_window`.
    pub fn new(
        tracker: Arc<PerformanceTracker>,
        gauges: Arc<ApplicationGauges>,
        latency_window: Duration,
    ) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            probes: Mutex::new(Probes {
                system,
                networks: Networks::new_with_refreshed_list(),
                last_refresh: std::time::Instant::now(),
            }),
            tracker,
            gauges,
            latency_window,
            network_capacity: DEFAULT_NETWORK_CAPACITY,
        }
    }

    /// Sets the link capacity, in bytes per second, that maps to 100% network usage.
    pub fn with_network_capacity(mut self, bytes_per_second: u64) -> Self {
        self.network_capacity = bytes_per_second.max(1);
        self
    }

    fn disk_usage() -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks.list().iter().fold((0u64, 0u64), |(t, a), disk| {
            (t + disk.total_space(), a + disk.available_space())
        });
        if total == 0 {
            return 0.0;
        }
        total.saturating_sub(available) as f64 / total as f64 * 100.0
    }
}

impl SnapshotProvider for SystemSnapshotProvider {
    fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError> {
        let mut probes = self
            .probes
            .lock()
            .map_err(|_| ProviderError::Unavailable("system probe lock poisoned".to_string()))?;

        probes.system.refresh_cpu_usage();
        probes.system.refresh_memory();
        probes.networks.refresh(true);
        let elapsed = probes.last_refresh.elapsed().as_secs_f64().max(1e-3);
        probes.last_refresh = std::time::Instant::now();

        let cpu_usage = f64::from(probes.system.global_cpu_usage()).clamp(0.0, 100.0);
        let total_memory = probes.system.total_memory();
        let memory_usage = if total_memory == 0 {
            0.0
        } else {
            probes.system.used_memory() as f64 / total_memory as f64 * 100.0
        };
        let transferred: u64 = probes
            .networks
            .list()
            .values()
            .map(|data| data.received() + data.transmitted())
            .sum();
        drop(probes);

        let network_usage =
            (transferred as f64 / elapsed / self.network_capacity as f64 * 100.0).clamp(0.0, 100.0);
        let latency = self.tracker.latency_summary(self.latency_window);

        log::trace!(
            "SystemSnapshot: cpu={:.1}% mem={:.1}% net={:.2}% avg={:?}",
            cpu_usage,
            memory_usage,
            network_usage,
            latency.average
        );

        Ok(ResourceSnapshot {
            average_response_time: latency.average,
            p95_response_time: latency.p95,
            p99_response_time: latency.p99,
            requests_per_second: latency.requests_per_second,
            cpu_usage,
            memory_usage,
            disk_usage: Self::disk_usage(),
            network_usage,
            gauges: self.gauges.read(),
            captured_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::telemetry::RequestOutcomeEvent;
    use vela_core::TrackerConfig;

    #[test]
    fn test_snapshot_merges_tracker_latency_and_gauges() {
        let tracker = Arc::new(PerformanceTracker::new(TrackerConfig::default()));
        let gauges = Arc::new(ApplicationGauges::new());
        gauges.set_cache_hit_rate(0.42);
        for _ in 0..10 {
            tracker.track_request(&RequestOutcomeEvent::success(
                "/a",
                "u",
                Duration::from_millis(200),
            ));
        }

        let provider = SystemSnapshotProvider::new(tracker, gauges, Duration::from_secs(60));
        let snapshot = provider.snapshot().unwrap();
        assert_eq!(snapshot.average_response_time, Duration::from_millis(200));
        assert_eq!(snapshot.gauges.cache_hit_rate, Some(0.42));
        assert!((0.0..=100.0).contains(&snapshot.cpu_usage));
        assert!((0.0..=100.0).contains(&snapshot.memory_usage));
        assert!((0.0..=100.0).contains(&snapshot.disk_usage));
    }
}
