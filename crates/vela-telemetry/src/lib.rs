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

//! # Vela Telemetry
//!
//! Folds request outcome events into rolling aggregates, evaluates system
//! health, and supplies resource snapshots to the optimization controller.

#![warn(missing_docs)]

pub mod health;
pub mod system;
pub mod tracker;

pub use health::{classify_trend, health_score, HealthReport, HealthThresholds};
pub use system::{SystemSnapshotProvider, DEFAULT_NETWORK_CAPACITY};
pub use tracker::{LatencySummary, PerformanceTracker, TrackerError};
