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

//! The five built-in strategies.
//!
//! Each one reads a genuine metric from the snapshot and stays inapplicable
//! while that metric has never been reported.

use super::{KnobController, Reversible, StrategyRegistry};
use std::sync::Arc;
use std::time::Duration;
use vela_core::control::{
    AutoScalingParameters, BalancingAlgorithm, CacheParameters, ConnectionPoolParameters,
    DatabaseParameters, LoadBalancingParameters, OptimizationStrategy, StrategyError,
    StrategyParameters,
};
use vela_core::telemetry::PerformanceMetrics;

/// Cache hit ratio under which the cache strategy applies.
const CACHE_HIT_RATE_THRESHOLD: f64 = 0.8;
/// Longest TTL the cache strategy will set.
const MAX_CACHE_TTL: Duration = Duration::from_secs(3600);
/// Mean query time (ms) above which the database strategy applies.
const DB_QUERY_TIME_THRESHOLD_MS: f64 = 100.0;
/// Upper bound on parallel queries.
const MAX_PARALLEL_QUERIES: u32 = 64;
/// Pool utilisation above which the pool strategy applies.
const POOL_UTILIZATION_THRESHOLD: f64 = 0.85;
/// Upper bound on pool size.
const MAX_POOL_CONNECTIONS: u32 = 1000;
/// Load imbalance above which the balancing strategy applies.
const LOAD_IMBALANCE_THRESHOLD: f64 = 0.2;
/// Imbalance beyond which response-time weighting is preferred.
const SEVERE_IMBALANCE: f64 = 0.4;
/// Shortest backend health check interval.
const MIN_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// CPU usage (percent) above which the scaling strategy applies.
const CPU_SCALE_THRESHOLD: f64 = 80.0;
/// Upper bound on instances.
const MAX_INSTANCES: u32 = 100;

/// Registers all built-in strategies against one knob board.
pub fn register_builtin(registry: &mut StrategyRegistry, knobs: &KnobController) {
    registry.register(Arc::new(CacheStrategy::new(Arc::clone(knobs))));
    registry.register(Arc::new(DatabaseStrategy::new(Arc::clone(knobs))));
    registry.register(Arc::new(ConnectionPoolStrategy::new(Arc::clone(knobs))));
    registry.register(Arc::new(LoadBalancingStrategy::new(Arc::clone(knobs))));
    registry.register(Arc::new(AutoScalingStrategy::new(Arc::clone(knobs))));
}

/// Grows the cache when the hit ratio is low.
pub struct CacheStrategy {
    inner: Reversible,
}

impl CacheStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "cache";

    /// Creates the strategy over a knob board.
    pub fn new(knobs: KnobController) -> Self {
        Self {
            inner: Reversible::new(Self::NAME, knobs),
        }
    }

    fn current(&self) -> CacheParameters {
        match self.inner.current(Self::NAME) {
            Some(StrategyParameters::Cache(p)) => p,
            _ => CacheParameters::default(),
        }
    }
}

impl OptimizationStrategy for CacheStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_apply(&self, metrics: &PerformanceMetrics) -> bool {
        metrics
            .gauges
            .cache_hit_rate
            .is_some_and(|h| h < CACHE_HIT_RATE_THRESHOLD)
    }

    fn expected_impact(&self, metrics: &PerformanceMetrics) -> f64 {
        metrics
            .gauges
            .cache_hit_rate
            .map_or(0.0, |h| ((CACHE_HIT_RATE_THRESHOLD - h) * 100.0).max(0.0))
    }

    fn plan(&self, _metrics: &PerformanceMetrics) -> StrategyParameters {
        let current = self.current();
        StrategyParameters::Cache(CacheParameters {
            ttl: (current.ttl * 2).min(MAX_CACHE_TTL),
            max_entries: current.max_entries.saturating_mul(3) / 2,
            prefetch: true,
        })
    }

    fn apply(&self, parameters: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.apply(Self::NAME, parameters)
    }

    fn rollback(&self, _applied: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.rollback()
    }
}

/// Widens query parallelism and enables index hints when queries are slow.
pub struct DatabaseStrategy {
    inner: Reversible,
}

impl DatabaseStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "database";

    /// Creates the strategy over a knob board.
    pub fn new(knobs: KnobController) -> Self {
        Self {
            inner: Reversible::new(Self::NAME, knobs),
        }
    }

    fn query_time_ms(metrics: &PerformanceMetrics) -> Option<f64> {
        metrics
            .gauges
            .db_query_time
            .map(|d| d.as_secs_f64() * 1000.0)
    }
}

impl OptimizationStrategy for DatabaseStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_apply(&self, metrics: &PerformanceMetrics) -> bool {
        Self::query_time_ms(metrics).is_some_and(|q| q > DB_QUERY_TIME_THRESHOLD_MS)
    }

    fn expected_impact(&self, metrics: &PerformanceMetrics) -> f64 {
        Self::query_time_ms(metrics)
            .map_or(0.0, |q| ((q - DB_QUERY_TIME_THRESHOLD_MS) / 10.0).max(0.0))
    }

    fn plan(&self, metrics: &PerformanceMetrics) -> StrategyParameters {
        let current = match self.inner.current(Self::NAME) {
            Some(StrategyParameters::Database(p)) => p,
            _ => DatabaseParameters::default(),
        };
        // Keep the timeout comfortably above the observed query time.
        let floor = metrics.gauges.db_query_time.unwrap_or_default() * 4;
        StrategyParameters::Database(DatabaseParameters {
            query_timeout: current.query_timeout.max(floor),
            max_parallel_queries: (current.max_parallel_queries + 2).min(MAX_PARALLEL_QUERIES),
            use_index_hints: true,
        })
    }

    fn apply(&self, parameters: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.apply(Self::NAME, parameters)
    }

    fn rollback(&self, _applied: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.rollback()
    }
}

/// Grows the connection pool when it runs close to saturation.
pub struct ConnectionPoolStrategy {
    inner: Reversible,
}

impl ConnectionPoolStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "connection_pool";

    /// Creates the strategy over a knob board.
    pub fn new(knobs: KnobController) -> Self {
        Self {
            inner: Reversible::new(Self::NAME, knobs),
        }
    }
}

impl OptimizationStrategy for ConnectionPoolStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_apply(&self, metrics: &PerformanceMetrics) -> bool {
        metrics
            .gauges
            .connection_pool_utilization
            .is_some_and(|u| u > POOL_UTILIZATION_THRESHOLD)
    }

    fn expected_impact(&self, metrics: &PerformanceMetrics) -> f64 {
        metrics
            .gauges
            .connection_pool_utilization
            .map_or(0.0, |u| ((u - POOL_UTILIZATION_THRESHOLD) * 200.0).max(0.0))
    }

    fn plan(&self, _metrics: &PerformanceMetrics) -> StrategyParameters {
        let current = match self.inner.current(Self::NAME) {
            Some(StrategyParameters::ConnectionPool(p)) => p,
            _ => ConnectionPoolParameters::default(),
        };
        let max_connections = (current.max_connections.saturating_mul(5) / 4)
            .max(current.max_connections + 1)
            .min(MAX_POOL_CONNECTIONS);
        StrategyParameters::ConnectionPool(ConnectionPoolParameters {
            max_connections,
            min_idle: (max_connections / 4).max(current.min_idle),
            acquire_timeout: current.acquire_timeout,
        })
    }

    fn apply(&self, parameters: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.apply(Self::NAME, parameters)
    }

    fn rollback(&self, _applied: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.rollback()
    }
}

/// Switches to a load-aware balancing algorithm when backends are uneven.
pub struct LoadBalancingStrategy {
    inner: Reversible,
}

impl LoadBalancingStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "load_balancing";

    /// Creates the strategy over a knob board.
    pub fn new(knobs: KnobController) -> Self {
        Self {
            inner: Reversible::new(Self::NAME, knobs),
        }
    }
}

impl OptimizationStrategy for LoadBalancingStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_apply(&self, metrics: &PerformanceMetrics) -> bool {
        metrics
            .gauges
            .load_imbalance
            .is_some_and(|i| i > LOAD_IMBALANCE_THRESHOLD)
    }

    fn expected_impact(&self, metrics: &PerformanceMetrics) -> f64 {
        metrics.gauges.load_imbalance.map_or(0.0, |i| i * 50.0)
    }

    fn plan(&self, metrics: &PerformanceMetrics) -> StrategyParameters {
        let current = match self.inner.current(Self::NAME) {
            Some(StrategyParameters::LoadBalancing(p)) => p,
            _ => LoadBalancingParameters::default(),
        };
        let algorithm = if metrics.gauges.load_imbalance.unwrap_or(0.0) > SEVERE_IMBALANCE {
            BalancingAlgorithm::WeightedResponseTime
        } else {
            BalancingAlgorithm::LeastConnections
        };
        StrategyParameters::LoadBalancing(LoadBalancingParameters {
            algorithm,
            health_check_interval: (current.health_check_interval / 2)
                .max(MIN_HEALTH_CHECK_INTERVAL),
        })
    }

    fn apply(&self, parameters: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.apply(Self::NAME, parameters)
    }

    fn rollback(&self, _applied: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.rollback()
    }
}

/// Adds instances when CPU usage stays high.
pub struct AutoScalingStrategy {
    inner: Reversible,
}

impl AutoScalingStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "auto_scaling";

    /// Creates the strategy over a knob board.
    pub fn new(knobs: KnobController) -> Self {
        Self {
            inner: Reversible::new(Self::NAME, knobs),
        }
    }
}

impl OptimizationStrategy for AutoScalingStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_apply(&self, metrics: &PerformanceMetrics) -> bool {
        metrics.cpu_usage > CPU_SCALE_THRESHOLD
    }

    fn expected_impact(&self, metrics: &PerformanceMetrics) -> f64 {
        ((metrics.cpu_usage - CPU_SCALE_THRESHOLD) * 1.5).max(0.0)
    }

    fn plan(&self, metrics: &PerformanceMetrics) -> StrategyParameters {
        let current = match self.inner.current(Self::NAME) {
            Some(StrategyParameters::AutoScaling(p)) => p,
            _ => AutoScalingParameters::default(),
        };
        let target = current.cpu_target.max(1.0);
        let overload = ((metrics.cpu_usage - target) / target).max(0.0);
        let needed = (f64::from(current.target_instances) * overload).ceil() as u32;
        StrategyParameters::AutoScaling(AutoScalingParameters {
            target_instances: (current.target_instances + needed.max(current.scale_step))
                .min(MAX_INSTANCES),
            scale_step: current.scale_step,
            cpu_target: current.cpu_target,
        })
    }

    fn apply(&self, parameters: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.apply(Self::NAME, parameters)
    }

    fn rollback(&self, _applied: &StrategyParameters) -> Result<(), StrategyError> {
        self.inner.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{InMemoryKnobs, RuntimeKnobs};
    use approx::assert_relative_eq;
    use vela_core::telemetry::GaugeValues;

    fn knobs() -> (Arc<InMemoryKnobs>, KnobController) {
        let board = Arc::new(InMemoryKnobs::new());
        let controller: KnobController = board.clone();
        (board, controller)
    }

    fn with_gauges(gauges: GaugeValues) -> PerformanceMetrics {
        PerformanceMetrics {
            gauges,
            ..Default::default()
        }
    }

    #[test]
    fn test_strategies_need_their_metric() {
        let (_, knobs) = knobs();
        let metrics = PerformanceMetrics::default();
        assert!(!CacheStrategy::new(knobs.clone()).can_apply(&metrics));
        assert!(!DatabaseStrategy::new(knobs.clone()).can_apply(&metrics));
        assert!(!ConnectionPoolStrategy::new(knobs.clone()).can_apply(&metrics));
        assert!(!LoadBalancingStrategy::new(knobs.clone()).can_apply(&metrics));
        assert!(!AutoScalingStrategy::new(knobs).can_apply(&metrics));
    }

    #[test]
    fn test_impacts_follow_metric_distance() {
        let (_, knobs) = knobs();
        let metrics = PerformanceMetrics {
            cpu_usage: 90.0,
            gauges: GaugeValues {
                cache_hit_rate: Some(0.5),
                db_query_time: Some(Duration::from_millis(300)),
                connection_pool_utilization: Some(0.95),
                load_imbalance: Some(0.3),
            },
            ..Default::default()
        };
        assert_relative_eq!(CacheStrategy::new(knobs.clone()).expected_impact(&metrics), 30.0, epsilon = 1e-9);
        assert_relative_eq!(DatabaseStrategy::new(knobs.clone()).expected_impact(&metrics), 20.0, epsilon = 1e-9);
        assert_relative_eq!(ConnectionPoolStrategy::new(knobs.clone()).expected_impact(&metrics), 20.0, epsilon = 1e-9);
        assert_relative_eq!(LoadBalancingStrategy::new(knobs.clone()).expected_impact(&metrics), 15.0, epsilon = 1e-9);
        assert_relative_eq!(AutoScalingStrategy::new(knobs).expected_impact(&metrics), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_then_rollback_restores_knob() {
        let (board, knobs) = knobs();
        let strategy = CacheStrategy::new(knobs);
        let metrics = with_gauges(GaugeValues {
            cache_hit_rate: Some(0.4),
            ..Default::default()
        });
        let plan = strategy.plan(&metrics);
        strategy.apply(&plan).unwrap();
        assert_eq!(board.read("cache"), Some(plan.clone()));

        strategy.rollback(&plan).unwrap();
        assert_eq!(
            board.read("cache"),
            Some(StrategyParameters::Cache(CacheParameters::default()))
        );
        // A second rollback has nothing left to restore.
        assert!(strategy.rollback(&plan).is_err());
    }

    #[test]
    fn test_apply_rejects_foreign_parameters() {
        let (_, knobs) = knobs();
        let strategy = DatabaseStrategy::new(knobs);
        let err = strategy
            .apply(&StrategyParameters::Cache(CacheParameters::default()))
            .unwrap_err();
        assert!(matches!(err, StrategyError::Rejected { .. }));
    }

    #[test]
    fn test_scaling_plan_adds_instances() {
        let (_, knobs) = knobs();
        let strategy = AutoScalingStrategy::new(knobs);
        let metrics = PerformanceMetrics {
            cpu_usage: 98.0,
            ..Default::default()
        };
        match strategy.plan(&metrics) {
            StrategyParameters::AutoScaling(p) => assert_eq!(p.target_instances, 3),
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_register_builtin_registers_five() {
        let (_, knobs) = knobs();
        let mut registry = StrategyRegistry::new();
        register_builtin(&mut registry, &knobs);
        assert_eq!(
            registry.names(),
            vec!["auto_scaling", "cache", "connection_pool", "database", "load_balancing"]
        );
    }
}
