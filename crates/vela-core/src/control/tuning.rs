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

//! Tuning policies, sessions and reversible tuning actions.

use crate::telemetry::PerformanceMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Marker appended to the description of a reversed action.
const ROLLED_BACK_MARKER: &str = " (Rolled back)";

/// The three built-in policies, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Small steps, tight degradation tolerance.
    Conservative,
    /// Moderate steps.
    Balanced,
    /// Large steps for severe slowdowns.
    Aggressive,
}

impl PolicyKind {
    /// Returns the catalog name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Conservative => "conservative",
            PolicyKind::Balanced => "balanced",
            PolicyKind::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The metric category a tuning action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningCategory {
    /// Mean response time.
    ResponseTime,
    /// Request throughput.
    Throughput,
    /// CPU usage.
    CpuOptimization,
    /// Memory usage.
    MemoryOptimization,
    /// Sampling or evaluation frequency. Declared by policies, never executable.
    Frequency,
}

impl TuningCategory {
    /// Returns the category label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TuningCategory::ResponseTime => "response_time",
            TuningCategory::Throughput => "throughput",
            TuningCategory::CpuOptimization => "cpu_optimization",
            TuningCategory::MemoryOptimization => "memory_optimization",
            TuningCategory::Frequency => "frequency",
        }
    }

    /// Parses a category label.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "response_time" => Some(TuningCategory::ResponseTime),
            "throughput" => Some(TuningCategory::Throughput),
            "cpu_optimization" => Some(TuningCategory::CpuOptimization),
            "memory_optimization" => Some(TuningCategory::MemoryOptimization),
            "frequency" => Some(TuningCategory::Frequency),
            _ => None,
        }
    }

    /// Returns `true` for the categories the engine knows how to execute.
    pub fn is_executable(&self) -> bool {
        !matches!(self, TuningCategory::Frequency)
    }
}

impl fmt::Display for TuningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category targets of a policy. All values are fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParameters {
    /// Improvement the policy aims for.
    pub target_improvement: f64,
    /// Degradation tolerated before an action is reverted.
    pub max_degradation: f64,
    /// Relative change applied by one action.
    pub adjustment_step: f64,
}

impl TuningParameters {
    /// Creates a parameter set.
    pub const fn new(target_improvement: f64, max_degradation: f64, adjustment_step: f64) -> Self {
        Self {
            target_improvement,
            max_degradation,
            adjustment_step,
        }
    }
}

/// Absolute bounds that no generated action may cross.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// CPU usage ceiling (percent).
    pub max_cpu_usage: f64,
    /// Memory usage ceiling (percent).
    pub max_memory_usage: f64,
    /// Disk usage ceiling (percent).
    pub max_disk_usage: f64,
    /// Network usage ceiling (percent).
    pub max_network_usage: f64,
    /// Lowest response time an action may target.
    pub min_response_time: Duration,
    /// Highest response time an action may target.
    pub max_response_time: Duration,
    /// Success rate floor.
    pub min_success_rate: f64,
    /// Error rate ceiling.
    pub max_error_rate: f64,
}

/// A named tuning policy from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningPolicy {
    /// Which built-in policy this is.
    pub kind: PolicyKind,
    /// Human-readable summary.
    pub description: String,
    /// Targets for response time actions.
    pub response_time: TuningParameters,
    /// Targets for throughput actions.
    pub throughput: TuningParameters,
    /// Targets for CPU and memory actions.
    pub resource: TuningParameters,
    /// Targets for frequency actions.
    pub frequency: TuningParameters,
    /// Absolute bounds.
    pub safety: SafetyLimits,
    /// Priority copied into sessions created from this policy.
    pub priority: u32,
}

impl TuningPolicy {
    /// Catalog name of the policy.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Returns the targets governing a category.
    pub fn parameters_for(&self, category: TuningCategory) -> &TuningParameters {
        match category {
            TuningCategory::ResponseTime => &self.response_time,
            TuningCategory::Throughput => &self.throughput,
            TuningCategory::CpuOptimization | TuningCategory::MemoryOptimization => &self.resource,
            TuningCategory::Frequency => &self.frequency,
        }
    }
}

/// A typed tuning value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum TuningValue {
    /// A response time.
    Latency(Duration),
    /// A usage percentage.
    Percent(f64),
    /// A rate per second.
    PerSecond(f64),
}

impl fmt::Display for TuningValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuningValue::Latency(d) => write!(f, "{}ms", d.as_millis()),
            TuningValue::Percent(p) => write!(f, "{p:.1}%"),
            TuningValue::PerSecond(r) => write!(f, "{r:.1}/s"),
        }
    }
}

/// Execution state of a tuning action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Not yet executed.
    Pending,
    /// Executed successfully.
    Executed,
    /// Execution was refused.
    Failed,
    /// Executed, then reversed.
    RolledBack,
}

/// A reversible change carrying both its forward and inverse value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningAction {
    /// Unique action id.
    pub id: Uuid,
    /// Targeted category.
    pub category: TuningCategory,
    /// What the action does (e.g. "optimize_response_time").
    pub action_type: String,
    /// Human-readable description.
    pub description: String,
    /// Value before the action.
    pub old_value: TuningValue,
    /// Value the action sets.
    pub new_value: TuningValue,
    /// Execution state.
    pub status: ActionStatus,
    /// Set when the action's values are currently reversed.
    pub rolled_back: bool,
    /// When the action was generated.
    pub created_at: DateTime<Utc>,
    /// When the action was last executed.
    pub executed_at: Option<DateTime<Utc>>,
}

impl TuningAction {
    /// Creates a pending action.
    pub fn new(
        category: TuningCategory,
        action_type: impl Into<String>,
        description: impl Into<String>,
        old_value: TuningValue,
        new_value: TuningValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            action_type: action_type.into(),
            description: description.into(),
            old_value,
            new_value,
            status: ActionStatus::Pending,
            rolled_back: false,
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    /// Swaps the old and new values and toggles the rolled-back marker.
    ///
    /// The operation is its own inverse: two calls restore the original action.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.old_value, &mut self.new_value);
        self.rolled_back = !self.rolled_back;
        if self.rolled_back {
            self.description.push_str(ROLLED_BACK_MARKER);
        } else if let Some(stripped) = self.description.strip_suffix(ROLLED_BACK_MARKER) {
            self.description = stripped.to_string();
        }
    }
}

/// Lifecycle of a tuning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Actions remain to be executed.
    Active,
    /// Every action was executed.
    Completed,
    /// Stopped by an operator.
    Cancelled,
    /// Every executed action was reversed.
    RolledBack,
}

/// A bounded sequence of actions generated from one policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSession {
    /// Unique session id.
    pub id: Uuid,
    /// The policy the session was created from.
    pub policy: PolicyKind,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// What is being tuned.
    pub target: String,
    /// Why it is being tuned.
    pub objective: String,
    /// Priority copied from the policy.
    pub priority: u32,
    /// Metrics when the session was created.
    pub initial_metrics: PerformanceMetrics,
    /// Generated actions, in rollout order.
    pub actions: Vec<TuningAction>,
    /// Index of the first pending action, if any.
    pub next_action: Option<usize>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

impl TuningSession {
    /// Creates an active session over the given actions.
    pub fn new(
        policy: &TuningPolicy,
        initial_metrics: PerformanceMetrics,
        actions: Vec<TuningAction>,
    ) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: Uuid::new_v4(),
            policy: policy.kind,
            status: SessionStatus::Active,
            target: "system_performance".to_string(),
            objective: "optimize_performance".to_string(),
            priority: policy.priority,
            initial_metrics,
            actions,
            next_action: None,
            created_at: now,
            updated_at: now,
        };
        session.refresh_next_action();
        session
    }

    /// Points `next_action` at the first pending action.
    pub fn refresh_next_action(&mut self) {
        self.next_action = self
            .actions
            .iter()
            .position(|a| a.status == ActionStatus::Pending);
    }

    /// Number of actions not yet executed.
    pub fn pending_actions(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .count()
    }

    /// Looks up an action by id.
    pub fn action_mut(&mut self, action_id: Uuid) -> Option<&mut TuningAction> {
        self.actions.iter_mut().find(|a| a.id == action_id)
    }
}
