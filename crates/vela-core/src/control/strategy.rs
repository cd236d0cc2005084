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

//! The optimization strategy contract and its typed parameters.

use crate::telemetry::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cache tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheParameters {
    /// Time-to-live for cached entries.
    pub ttl: Duration,
    /// Maximum number of cached entries.
    pub max_entries: u64,
    /// Whether hot keys are prefetched before expiry.
    pub prefetch: bool,
}

/// Database access tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseParameters {
    /// Per-query timeout.
    pub query_timeout: Duration,
    /// Maximum number of queries run in parallel.
    pub max_parallel_queries: u32,
    /// Whether index hints are attached to generated queries.
    pub use_index_hints: bool,
}

/// Connection pool sizing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPoolParameters {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_idle: u32,
    /// Time a caller waits for a free connection.
    pub acquire_timeout: Duration,
}

/// Backend selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingAlgorithm {
    /// Rotate over backends in order.
    RoundRobin,
    /// Pick the backend with the fewest open requests.
    LeastConnections,
    /// Weight backends by their observed response time.
    WeightedResponseTime,
}

/// Load balancing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancingParameters {
    /// The selection algorithm.
    pub algorithm: BalancingAlgorithm,
    /// Interval between backend health checks.
    pub health_check_interval: Duration,
}

/// Horizontal scaling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoScalingParameters {
    /// Desired number of instances.
    pub target_instances: u32,
    /// Instances added or removed per scaling step.
    pub scale_step: u32,
    /// CPU usage (percent) the scaler aims for.
    pub cpu_target: f64,
}

impl Default for CacheParameters {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 10_000,
            prefetch: false,
        }
    }
}

impl Default for DatabaseParameters {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            max_parallel_queries: 8,
            use_index_hints: false,
        }
    }
}

impl Default for ConnectionPoolParameters {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_idle: 5,
            acquire_timeout: Duration::from_secs(2),
        }
    }
}

impl Default for LoadBalancingParameters {
    fn default() -> Self {
        Self {
            algorithm: BalancingAlgorithm::RoundRobin,
            health_check_interval: Duration::from_secs(30),
        }
    }
}

impl Default for AutoScalingParameters {
    fn default() -> Self {
        Self {
            target_instances: 2,
            scale_step: 1,
            cpu_target: 70.0,
        }
    }
}

/// Typed parameters for each built-in strategy.
///
/// Free-form annotations live in `tags` on the action and never drive behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyParameters {
    /// Parameters for the cache strategy.
    Cache(CacheParameters),
    /// Parameters for the database strategy.
    Database(DatabaseParameters),
    /// Parameters for the connection pool strategy.
    ConnectionPool(ConnectionPoolParameters),
    /// Parameters for the load balancing strategy.
    LoadBalancing(LoadBalancingParameters),
    /// Parameters for the auto-scaling strategy.
    AutoScaling(AutoScalingParameters),
    /// Parameters for a host-defined strategy.
    Custom(BTreeMap<String, String>),
}

impl StrategyParameters {
    /// Short label of the parameter family, used in logs.
    pub fn family(&self) -> &'static str {
        match self {
            StrategyParameters::Cache(_) => "cache",
            StrategyParameters::Database(_) => "database",
            StrategyParameters::ConnectionPool(_) => "connection_pool",
            StrategyParameters::LoadBalancing(_) => "load_balancing",
            StrategyParameters::AutoScaling(_) => "auto_scaling",
            StrategyParameters::Custom(_) => "custom",
        }
    }
}

/// Errors raised by strategies when applying or reverting a change.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    /// The strategy refused the parameters.
    #[error("strategy '{strategy}' rejected parameters: {reason}")]
    Rejected {
        /// The strategy name.
        strategy: String,
        /// Why the parameters were refused.
        reason: String,
    },
    /// The underlying actuator failed.
    #[error("actuator failure in '{strategy}': {reason}")]
    Actuator {
        /// The strategy name.
        strategy: String,
        /// The actuator's error description.
        reason: String,
    },
}

/// A named, reversible corrective action driven by performance metrics.
///
/// Implementations must be safe to share across the monitor and executor
/// threads; any state they keep for rollback sits behind interior mutability.
pub trait OptimizationStrategy: Send + Sync {
    /// Returns the unique name of the strategy.
    fn name(&self) -> &str;

    /// Returns `true` if the metrics show the condition this strategy corrects.
    fn can_apply(&self, metrics: &PerformanceMetrics) -> bool;

    /// Estimates the benefit of applying the strategy now. Higher is better.
    fn expected_impact(&self, metrics: &PerformanceMetrics) -> f64;

    /// Derives the parameters the strategy would apply for these metrics.
    fn plan(&self, metrics: &PerformanceMetrics) -> StrategyParameters;

    /// Applies the parameters.
    fn apply(&self, parameters: &StrategyParameters) -> Result<(), StrategyError>;

    /// Reverts a previously applied change.
    fn rollback(&self, applied: &StrategyParameters) -> Result<(), StrategyError>;
}
