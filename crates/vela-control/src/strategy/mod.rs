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

//! Strategy registry, selection, and the runtime knobs strategies act on.

pub mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use vela_core::control::{
    AutoScalingParameters, CacheParameters, ConnectionPoolParameters, DatabaseParameters,
    LoadBalancingParameters, OptimizationStrategy, StrategyError,
    StrategyParameters,
};
use vela_core::telemetry::PerformanceMetrics;

pub use builtin::{
    register_builtin, AutoScalingStrategy, CacheStrategy, ConnectionPoolStrategy,
    DatabaseStrategy, LoadBalancingStrategy,
};

/// The actuator strategies write their parameters to.
///
/// Parameters are keyed by their family (see [`StrategyParameters::family`]).
pub trait RuntimeKnobs: Send + Sync {
    /// Returns the current parameters of a family, if any were ever set.
    fn read(&self, family: &str) -> Option<StrategyParameters>;

    /// Replaces the parameters of their family, returning the previous value.
    fn write(&self, parameters: StrategyParameters) -> Result<Option<StrategyParameters>, String>;
}

/// Shared handle to the runtime knobs.
pub type KnobController = Arc<dyn RuntimeKnobs>;

/// An in-process knob board seeded with conservative defaults.
#[derive(Debug)]
pub struct InMemoryKnobs {
    values: Mutex<HashMap<&'static str, StrategyParameters>>,
    writes: Mutex<u64>,
}

impl InMemoryKnobs {
    /// Creates a board holding the default parameters of every built-in family.
    pub fn new() -> Self {
        let defaults = [
            StrategyParameters::Cache(CacheParameters::default()),
            StrategyParameters::Database(DatabaseParameters::default()),
            StrategyParameters::ConnectionPool(ConnectionPoolParameters::default()),
            StrategyParameters::LoadBalancing(LoadBalancingParameters::default()),
            StrategyParameters::AutoScaling(AutoScalingParameters::default()),
        ];
        Self {
            values: Mutex::new(defaults.into_iter().map(|p| (p.family(), p)).collect()),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> u64 {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryKnobs {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeKnobs for InMemoryKnobs {
    fn read(&self, family: &str) -> Option<StrategyParameters> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family)
            .cloned()
    }

    fn write(&self, parameters: StrategyParameters) -> Result<Option<StrategyParameters>, String> {
        let mut values = self.values.lock().map_err(|_| "knob board poisoned".to_string())?;
        let previous = values.insert(parameters.family(), parameters);
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(previous)
    }
}

/// Saves the value a strategy replaced so it can be restored on rollback.
///
/// Only one optimization per strategy is active at a time, so one slot suffices.
pub(crate) struct Reversible {
    strategy: &'static str,
    knobs: KnobController,
    saved: Mutex<Option<StrategyParameters>>,
}

impl Reversible {
    pub(crate) fn new(strategy: &'static str, knobs: KnobController) -> Self {
        Self {
            strategy,
            knobs,
            saved: Mutex::new(None),
        }
    }

    pub(crate) fn current(&self, family: &str) -> Option<StrategyParameters> {
        self.knobs.read(family)
    }

    pub(crate) fn apply(
        &self,
        family: &str,
        parameters: &StrategyParameters,
    ) -> Result<(), StrategyError> {
        if parameters.family() != family {
            return Err(StrategyError::Rejected {
                strategy: self.strategy.to_string(),
                reason: format!("expected {family} parameters, got {}", parameters.family()),
            });
        }
        let previous = self
            .knobs
            .write(parameters.clone())
            .map_err(|reason| StrategyError::Actuator {
                strategy: self.strategy.to_string(),
                reason,
            })?;
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = previous;
        Ok(())
    }

    pub(crate) fn rollback(&self) -> Result<(), StrategyError> {
        let previous = self
            .saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| StrategyError::Rejected {
                strategy: self.strategy.to_string(),
                reason: "nothing to roll back".to_string(),
            })?;
        self.knobs
            .write(previous)
            .map(|_| ())
            .map_err(|reason| StrategyError::Actuator {
                strategy: self.strategy.to_string(),
                reason,
            })
    }
}

/// Registry of optimization strategies, keyed and ordered by name.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn OptimizationStrategy>>,
}

impl StrategyRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy, replacing any previous one with the same name.
    pub fn register(&mut self, strategy: Arc<dyn OptimizationStrategy>) {
        let name = strategy.name().to_string();
        log::info!("StrategyRegistry: Registered '{}'.", name);
        if self.strategies.insert(name.clone(), strategy).is_some() {
            log::warn!("StrategyRegistry: '{}' replaced an existing strategy.", name);
        }
    }

    /// Looks up a strategy by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn OptimizationStrategy>> {
        self.strategies.get(name).cloned()
    }

    /// Names of all registered strategies, sorted.
    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    /// Returns the number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if no strategies are registered.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategies whose condition holds for the metrics, sorted by name.
    pub fn applicable(&self, metrics: &PerformanceMetrics) -> Vec<Arc<dyn OptimizationStrategy>> {
        self.strategies
            .values()
            .filter(|s| s.can_apply(metrics))
            .cloned()
            .collect()
    }

    /// Picks the applicable strategy with the highest expected impact.
    ///
    /// Equal impacts resolve to the lexicographically smallest name.
    pub fn select_best(&self, metrics: &PerformanceMetrics) -> Option<Arc<dyn OptimizationStrategy>> {
        self.select_best_excluding(metrics, &[])
    }

    /// Like [`select_best`](Self::select_best), skipping the named strategies.
    pub fn select_best_excluding(
        &self,
        metrics: &PerformanceMetrics,
        excluded: &[String],
    ) -> Option<Arc<dyn OptimizationStrategy>> {
        let mut best: Option<(f64, Arc<dyn OptimizationStrategy>)> = None;
        // BTreeMap iterates in name order, so a strict `>` keeps the first name on ties.
        for strategy in self.strategies.values() {
            if excluded.iter().any(|e| e == strategy.name()) || !strategy.can_apply(metrics) {
                continue;
            }
            let impact = strategy.expected_impact(metrics);
            if best.as_ref().map_or(true, |(b, _)| impact > *b) {
                best = Some((impact, Arc::clone(strategy)));
            }
        }
        best.map(|(_, s)| s)
    }
}
