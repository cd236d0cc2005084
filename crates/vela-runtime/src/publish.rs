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

//! The engine read-model and the publishers it is handed to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use vela_core::control::{OptimizationState, TuningSession};
use vela_core::telemetry::OverallStats;
use vela_telemetry::HealthReport;

/// Everything a dashboard or exporter needs, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// System-wide request statistics.
    pub overall: OverallStats,
    /// Evaluated health with alerts.
    pub health: HealthReport,
    /// Controller read-model.
    pub optimization: OptimizationState,
    /// Tuning sessions still running.
    pub active_tuning_sessions: Vec<TuningSession>,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl EngineSnapshot {
    /// Serializes the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Receives engine snapshots.
///
/// Rendering, storage and transport belong to the implementor.
pub trait StatePublisher: Send + Sync {
    /// Handles one snapshot.
    fn publish(&self, snapshot: &EngineSnapshot);
}

/// Logs a one-line summary of each snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatePublisher;

impl StatePublisher for LogStatePublisher {
    fn publish(&self, snapshot: &EngineSnapshot) {
        log::info!(
            "Engine: {} requests, success {:.1}%, health {:.1} ({:?}), {} active optimization(s), {} tuning session(s).",
            snapshot.overall.total_requests,
            snapshot.overall.overall_success_rate * 100.0,
            snapshot.health.score,
            snapshot.health.trend,
            snapshot.optimization.active.len(),
            snapshot.active_tuning_sessions.len()
        );
        for alert in &snapshot.health.alerts {
            log::warn!("Engine: {}", alert);
        }
    }
}

/// Keeps every published snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStatePublisher {
    snapshots: Mutex<Vec<EngineSnapshot>>,
}

impl MemoryStatePublisher {
    /// Creates an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of the published snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<EngineSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Option<EngineSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl StatePublisher for MemoryStatePublisher {
    fn publish(&self, snapshot: &EngineSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }
}
