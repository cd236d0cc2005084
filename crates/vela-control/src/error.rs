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

//! Error types for the optimization controller and the tuning engine.

use uuid::Uuid;
use vela_core::control::{StrategyError, TuningCategory};
use vela_core::telemetry::ProviderError;

/// Errors returned by the optimization controller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    /// No strategy is registered under the name.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    /// The action queue is at capacity.
    #[error("action queue full, dropped action for '{0}'")]
    QueueFull(String),
    /// No active optimization has the id.
    #[error("optimization not found: {0}")]
    OptimizationNotFound(Uuid),
    /// A strategy failed to apply or roll back.
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    /// Metrics could not be collected.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors returned by the tuning engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TuningError {
    /// No session has the id.
    #[error("tuning session not found: {0}")]
    SessionNotFound(Uuid),
    /// The session holds no action with the id.
    #[error("tuning action not found: {0}")]
    ActionNotFound(Uuid),
    /// The engine cannot execute actions of this category.
    #[error("unsupported tuning category: {0}")]
    UnsupportedCategory(TuningCategory),
    /// The action's new value crosses a policy safety limit.
    #[error("{category} value {value} violates safety limit {limit}")]
    SafetyLimitViolation {
        /// The action's category.
        category: TuningCategory,
        /// The offending value.
        value: String,
        /// The limit it crosses.
        limit: String,
    },
    /// The session is cancelled, completed or rolled back.
    #[error("tuning session {0} is not active")]
    SessionNotActive(Uuid),
}
