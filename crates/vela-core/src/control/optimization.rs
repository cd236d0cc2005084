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

//! Actions, active optimizations and their append-only records.

use super::strategy::StrategyParameters;
use crate::telemetry::PerformanceMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Why an action was queued. The kind fixes the action's priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Queued by the monitor loop after a threshold breach.
    Automatic,
    /// Requested by an operator, bypassing rate limit and cooldown.
    Forced,
    /// Reverting a previously applied optimization.
    Rollback,
}

impl ActionKind {
    /// Returns the queue priority of this kind of action.
    pub fn priority(&self) -> u32 {
        match self {
            ActionKind::Automatic => 50,
            ActionKind::Forced => 100,
            ActionKind::Rollback => 200,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Automatic => "automatic",
            ActionKind::Forced => "forced",
            ActionKind::Rollback => "rollback",
        };
        f.write_str(label)
    }
}

/// A unit of work handed from the monitor loop (or an operator) to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationAction {
    /// Unique action id; becomes the id of the resulting optimization.
    pub id: Uuid,
    /// Name of the strategy to apply.
    pub strategy: String,
    /// Why the action exists.
    pub kind: ActionKind,
    /// Typed parameters passed to the strategy.
    pub parameters: StrategyParameters,
    /// Free-form annotations, never read by strategies.
    pub tags: BTreeMap<String, String>,
    /// Expected impact computed when the action was created.
    pub expected_impact: f64,
    /// Queue priority derived from `kind`.
    pub priority: u32,
    /// When the action was created.
    pub timestamp: DateTime<Utc>,
}

impl OptimizationAction {
    /// Creates an action with a fresh id and the priority of its kind.
    pub fn new(
        strategy: impl Into<String>,
        kind: ActionKind,
        parameters: StrategyParameters,
        expected_impact: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            kind,
            parameters,
            tags: BTreeMap::new(),
            expected_impact,
            priority: kind.priority(),
            timestamp: Utc::now(),
        }
    }

    /// Adds an annotation, returning the modified action.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle of an applied optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    /// Just applied, not yet evaluated.
    Active,
    /// Evaluated at least once, still inside the monitoring period.
    Monitoring,
    /// Kept after the monitoring period.
    Completed,
    /// Reverted, manually or after degrading performance.
    RolledBack,
}

/// An optimization currently in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveOptimization {
    /// Id of the action that produced this optimization.
    pub id: Uuid,
    /// How the optimization was triggered.
    pub kind: ActionKind,
    /// The applied strategy.
    pub strategy: String,
    /// The parameters that were applied.
    pub parameters: StrategyParameters,
    /// When the strategy was applied.
    pub applied_at: DateTime<Utc>,
    /// Expected impact at application time.
    pub expected_impact: f64,
    /// Current lifecycle status.
    pub status: OptimizationStatus,
    /// Degradation (percent) beyond which the optimization is reverted.
    pub rollback_threshold: f64,
    /// Metrics captured just before the strategy was applied.
    pub baseline: PerformanceMetrics,
}

impl ActiveOptimization {
    /// Creates an active optimization from the action that applied it.
    pub fn from_action(
        action: &OptimizationAction,
        baseline: PerformanceMetrics,
        rollback_threshold: f64,
    ) -> Self {
        Self {
            id: action.id,
            kind: action.kind,
            strategy: action.strategy.clone(),
            parameters: action.parameters.clone(),
            applied_at: Utc::now(),
            expected_impact: action.expected_impact,
            status: OptimizationStatus::Active,
            rollback_threshold,
            baseline,
        }
    }

    /// Time elapsed since the optimization was applied.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.applied_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Closes the optimization into its permanent record.
    pub fn into_record(
        self,
        optimized: PerformanceMetrics,
        success: bool,
        rollback_reason: Option<String>,
    ) -> OptimizationRecord {
        let removed_at = Utc::now();
        let improvement = optimized.improvement_over(&self.baseline);
        OptimizationRecord {
            id: self.id,
            strategy: self.strategy,
            applied_at: self.applied_at,
            removed_at,
            duration: (removed_at - self.applied_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
            baseline: self.baseline,
            optimized,
            improvement,
            success,
            rollback_reason,
        }
    }
}

/// The permanent, append-only record of a finished optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    /// Id of the optimization.
    pub id: Uuid,
    /// The applied strategy.
    pub strategy: String,
    /// When the strategy was applied.
    pub applied_at: DateTime<Utc>,
    /// When the optimization left the active list.
    pub removed_at: DateTime<Utc>,
    /// Metrics before the change.
    pub baseline: PerformanceMetrics,
    /// Metrics when the optimization was closed.
    pub optimized: PerformanceMetrics,
    /// Percentage improvement of `optimized` over `baseline`.
    pub improvement: f64,
    /// `true` if the optimization was kept.
    pub success: bool,
    /// Set for reverted optimizations.
    pub rollback_reason: Option<String>,
    /// Time the optimization was in effect.
    pub duration: Duration,
}

/// Whether the controller's background loops are running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerStatus {
    /// No background loops are running.
    #[default]
    Stopped,
    /// Monitor and executor loops are running.
    Running,
}

/// Read-model of the controller handed to state publishers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationState {
    /// Whether the background loops are running.
    pub status: ControllerStatus,
    /// Optimizations currently in effect.
    pub active: Vec<ActiveOptimization>,
    /// Optimizations ever applied.
    pub total_optimizations: u64,
    /// Optimizations that completed their monitoring period.
    pub successful_optimizations: u64,
    /// Optimizations that were reverted.
    pub rolled_back_optimizations: u64,
    /// Actions whose strategy failed to apply.
    pub failed_actions: u64,
    /// Optimizations applied since midnight UTC.
    pub optimizations_today: u32,
    /// Optimizations applied in the trailing hour.
    pub optimizations_last_hour: u32,
    /// When the last optimization was applied.
    pub last_optimization: Option<DateTime<Utc>>,
    /// Metrics from the latest evaluation cycle.
    pub latest_metrics: Option<PerformanceMetrics>,
}
