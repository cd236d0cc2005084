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

//! The optimization controller.
//!
//! One controller owns the strategy registry, the bounded action queue, the
//! list of active optimizations and the append-only optimization history.
//! It runs synchronously: [`OptimizationController::run_cycle`] is one pass
//! of the monitor loop and [`OptimizationController::process_pending`] is one
//! pass of the executor loop. [`crate::OptimizationService`] drives both from
//! background threads.
//!
//! Locks are taken in the order state, then registry. The performance
//! history has its own lock and is never held together with the state.

use crate::analysis::TriggerAnalyzer;
use crate::error::ControlError;
use crate::strategy::StrategyRegistry;
use chrono::{DateTime, NaiveDate, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use uuid::Uuid;
use vela_core::control::{
    ActionKind, ActiveOptimization, ControllerStatus, OptimizationAction, OptimizationRecord,
    OptimizationState, OptimizationStatus, OptimizationStrategy, StrategyError,
    StrategyParameters,
};
use vela_core::telemetry::{
    PerformanceMetrics, PerformanceSnapshot, SnapshotProvider, SuccessRateProvider,
};
use vela_core::{AuditEvent, AuditSink, LogAuditSink, OptimizationConfig, RingBuffer};

const AUDIT_COMPONENT: &str = "controller";
/// Window of the per-hour rate limit.
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(3600);
/// Tag carrying the target optimization of a rollback action.
const ROLLBACK_TARGET_TAG: &str = "target";

/// Rollback reason recorded when an optimization degrades performance.
pub const REASON_DEGRADATION: &str = "performance_degradation";
/// Rollback reason recorded for operator-requested rollbacks.
pub const REASON_MANUAL: &str = "manual_rollback";

#[derive(Debug, Default)]
struct ControllerState {
    status: ControllerStatus,
    active: Vec<ActiveOptimization>,
    // Ids whose strategy rollback is in flight; the sweep leaves them alone.
    reverting: HashSet<Uuid>,
    records: Vec<OptimizationRecord>,
    applied_last_hour: VecDeque<DateTime<Utc>>,
    last_optimization: Option<DateTime<Utc>>,
    total_optimizations: u64,
    successful_optimizations: u64,
    rolled_back_optimizations: u64,
    failed_actions: u64,
    today: Option<NaiveDate>,
    optimizations_today: u32,
    latest_metrics: Option<PerformanceMetrics>,
}

impl ControllerState {
    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(&oldest) = self.applied_last_hour.front() {
            if elapsed(oldest, now) >= RATE_LIMIT_WINDOW {
                self.applied_last_hour.pop_front();
            } else {
                break;
            }
        }
        let date = now.date_naive();
        if self.today != Some(date) {
            self.today = Some(date);
            self.optimizations_today = 0;
        }
    }

    fn record_applied(&mut self, now: DateTime<Utc>) {
        self.prune(now);
        self.applied_last_hour.push_back(now);
        self.last_optimization = Some(now);
        self.total_optimizations += 1;
        self.optimizations_today += 1;
    }

    fn active_strategies(&self) -> Vec<String> {
        self.active.iter().map(|a| a.strategy.clone()).collect()
    }

    fn claim(&mut self, id: Uuid) -> Option<ActiveOptimization> {
        if self.reverting.contains(&id) {
            return None;
        }
        let active = self.active.iter().find(|a| a.id == id).cloned()?;
        self.reverting.insert(id);
        Some(active)
    }

    fn take_active(&mut self, id: Uuid) -> Option<ActiveOptimization> {
        let index = self.active.iter().position(|a| a.id == id)?;
        Some(self.active.remove(index))
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

/// What one monitor cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// The merged metrics the cycle evaluated.
    pub metrics: PerformanceMetrics,
    /// Threshold breaches found by the analyzer.
    pub alerts: Vec<String>,
    /// The automatic action queued this cycle, if any.
    pub queued: Option<OptimizationAction>,
    /// Optimizations closed after their monitoring period.
    pub completed: Vec<OptimizationRecord>,
    /// Optimizations reverted for degrading performance.
    pub rolled_back: Vec<OptimizationRecord>,
}

/// Selects, applies, monitors and reverts optimizations.
pub struct OptimizationController {
    config: OptimizationConfig,
    analyzer: TriggerAnalyzer,
    registry: RwLock<StrategyRegistry>,
    snapshots: Arc<dyn SnapshotProvider>,
    rates: Arc<dyn SuccessRateProvider>,
    audit: Arc<dyn AuditSink>,
    state: Mutex<ControllerState>,
    history: Mutex<RingBuffer<PerformanceSnapshot>>,
    queue_tx: Sender<OptimizationAction>,
    queue_rx: Receiver<OptimizationAction>,
}

impl std::fmt::Debug for OptimizationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationController")
            .field("config", &self.config)
            .field("snapshots", &self.snapshots)
            .field("queued", &self.queue_rx.len())
            .finish_non_exhaustive()
    }
}

impl OptimizationController {
    /// Creates a controller auditing through the log.
    pub fn new(
        config: OptimizationConfig,
        snapshots: Arc<dyn SnapshotProvider>,
        rates: Arc<dyn SuccessRateProvider>,
    ) -> Self {
        Self::with_audit(config, snapshots, rates, Arc::new(LogAuditSink))
    }

    /// Creates a controller emitting audit events to `audit`.
    pub fn with_audit(
        config: OptimizationConfig,
        snapshots: Arc<dyn SnapshotProvider>,
        rates: Arc<dyn SuccessRateProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let config = config.normalized();
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(config.action_queue_size);
        log::info!(
            "Controller: Created (interval {:?}, queue {}, {} per hour, cooldown {:?}).",
            config.evaluation_interval(),
            config.action_queue_size,
            config.max_optimizations_per_hour,
            config.cooldown_period()
        );
        Self {
            analyzer: TriggerAnalyzer::new(config.thresholds.clone()),
            registry: RwLock::new(StrategyRegistry::new()),
            history: Mutex::new(RingBuffer::new(config.max_history_size)),
            state: Mutex::new(ControllerState::default()),
            config,
            snapshots,
            rates,
            audit,
            queue_tx,
            queue_rx,
        }
    }

    /// The normalized configuration.
    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Registers a strategy, replacing any previous one with the same name.
    pub fn register_strategy(&self, strategy: Arc<dyn OptimizationStrategy>) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(strategy);
    }

    /// Runs `f` with mutable access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut StrategyRegistry) -> R) -> R {
        f(&mut self.registry.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Names of the registered strategies, sorted.
    pub fn strategy_names(&self) -> Vec<String> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    fn strategy(&self, name: &str) -> Result<Arc<dyn OptimizationStrategy>, ControlError> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .ok_or_else(|| ControlError::UnknownStrategy(name.to_string()))
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.emit(event);
    }

    /// Pulls a fresh snapshot and the current success rates.
    pub fn collect_metrics(&self) -> Result<PerformanceMetrics, ControlError> {
        let snapshot = self.snapshots.snapshot()?;
        Ok(PerformanceMetrics::merge(snapshot, self.rates.success_rates()))
    }

    /// Returns `true` if the metrics breach at least one trigger threshold.
    pub fn should_optimize(&self, metrics: &PerformanceMetrics) -> bool {
        self.analyzer.analyze(metrics).should_optimize
    }

    /// Returns `false` while the hourly rate limit or the cooldown is in force.
    pub fn can_optimize(&self) -> bool {
        self.can_optimize_at(Utc::now())
    }

    fn can_optimize_at(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.lock_state();
        state.prune(now);
        if state.applied_last_hour.len() >= self.config.max_optimizations_per_hour as usize {
            log::debug!("Controller: Hourly limit reached.");
            return false;
        }
        match state.last_optimization {
            Some(last) if elapsed(last, now) < self.config.cooldown_period() => {
                log::debug!("Controller: In cooldown.");
                false
            }
            _ => true,
        }
    }

    /// Runs one monitor cycle.
    ///
    /// Collects metrics, records them in the history, queues the best
    /// applicable strategy when thresholds are breached and the gates allow
    /// it, then re-evaluates every active optimization.
    pub fn run_cycle(&self) -> Result<CycleOutcome, ControlError> {
        let metrics = self.collect_metrics()?;
        let active_strategies = {
            let mut state = self.lock_state();
            state.latest_metrics = Some(metrics.clone());
            state.active_strategies()
        };
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PerformanceSnapshot {
                metrics: metrics.clone(),
                active_strategies: active_strategies.clone(),
                recorded_at: Utc::now(),
            });

        let report = self.analyzer.analyze(&metrics);
        let mut queued = None;
        if report.should_optimize {
            for alert in &report.alerts {
                log::info!("Controller: {}", alert);
            }
            if self.can_optimize() {
                queued = self.queue_best(&metrics, &active_strategies);
            }
        }

        let (completed, rolled_back) = self.evaluate_active_at(&metrics, Utc::now());
        Ok(CycleOutcome {
            metrics,
            alerts: report.alerts,
            queued,
            completed,
            rolled_back,
        })
    }

    fn queue_best(
        &self,
        metrics: &PerformanceMetrics,
        active_strategies: &[String],
    ) -> Option<OptimizationAction> {
        let strategy = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .select_best_excluding(metrics, active_strategies);
        let Some(strategy) = strategy else {
            log::debug!("Controller: No applicable strategy.");
            return None;
        };
        let action = OptimizationAction::new(
            strategy.name(),
            ActionKind::Automatic,
            strategy.plan(metrics),
            strategy.expected_impact(metrics),
        );
        match self.enqueue(action.clone()) {
            Ok(()) => {
                log::info!(
                    "Controller: Queued '{}' (impact {:.1}).",
                    action.strategy,
                    action.expected_impact
                );
                Some(action)
            }
            Err(_) => None,
        }
    }

    /// Offers an action to the bounded queue without blocking.
    pub fn enqueue(&self, action: OptimizationAction) -> Result<(), ControlError> {
        match self.queue_tx.try_send(action) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(action)) | Err(TrySendError::Disconnected(action)) => {
                log::warn!(
                    "Controller: Action queue full, dropping '{}' ({}).",
                    action.strategy,
                    action.kind
                );
                self.emit(
                    AuditEvent::new(AUDIT_COMPONENT, "queue_full")
                        .with("strategy", action.strategy.as_str())
                        .with("kind", action.kind.to_string()),
                );
                Err(ControlError::QueueFull(action.strategy))
            }
        }
    }

    /// Queues a forced optimization, bypassing the rate limit and cooldown.
    ///
    /// Without explicit parameters the strategy plans them from fresh metrics.
    /// Explicit parameters never touch the snapshot provider: the expected
    /// impact comes from the last cycle's metrics, or 0 before the first one.
    pub fn force_optimization(
        &self,
        name: &str,
        parameters: Option<StrategyParameters>,
    ) -> Result<Uuid, ControlError> {
        let strategy = self.strategy(name)?;
        let (parameters, expected_impact) = match parameters {
            Some(parameters) => {
                let latest = self.lock_state().latest_metrics.clone();
                let impact = latest.map_or(0.0, |m| strategy.expected_impact(&m));
                (parameters, impact)
            }
            None => {
                let metrics = self.collect_metrics()?;
                (strategy.plan(&metrics), strategy.expected_impact(&metrics))
            }
        };
        let action =
            OptimizationAction::new(name, ActionKind::Forced, parameters, expected_impact);
        let id = action.id;
        self.enqueue(action)?;
        log::info!("Controller: Forced optimization '{}' queued.", name);
        Ok(id)
    }

    /// Receiving end of the action queue.
    pub fn queue_receiver(&self) -> Receiver<OptimizationAction> {
        self.queue_rx.clone()
    }

    /// Number of actions waiting in the queue.
    pub fn queued_actions(&self) -> usize {
        self.queue_rx.len()
    }

    /// Drains the queue and executes every action, highest priority first.
    ///
    /// Returns the number of actions that succeeded.
    pub fn process_pending(&self) -> usize {
        let batch: Vec<_> = self.queue_rx.try_iter().collect();
        self.execute_batch(batch)
    }

    /// Executes `first` together with whatever else is already queued.
    pub fn process_batch(&self, first: OptimizationAction) -> usize {
        let mut batch = vec![first];
        batch.extend(self.queue_rx.try_iter());
        self.execute_batch(batch)
    }

    fn execute_batch(&self, mut batch: Vec<OptimizationAction>) -> usize {
        batch.sort_by(|a, b| b.priority.cmp(&a.priority));
        let mut succeeded = 0;
        for action in batch {
            match self.execute(&action) {
                Ok(()) => succeeded += 1,
                Err(e) => log::error!(
                    "Controller: Action '{}' ({}) failed: {}",
                    action.strategy,
                    action.kind,
                    e
                ),
            }
        }
        succeeded
    }

    /// Executes one action.
    ///
    /// Apply actions capture a fresh baseline, apply the strategy and record
    /// the active optimization. Rollback actions revert the optimization
    /// named by their target tag.
    pub fn execute(&self, action: &OptimizationAction) -> Result<(), ControlError> {
        if action.kind == ActionKind::Rollback {
            let target = action
                .tags
                .get(ROLLBACK_TARGET_TAG)
                .and_then(|t| Uuid::parse_str(t).ok())
                .unwrap_or(action.id);
            return self.revert(target, REASON_MANUAL).map(|_| ());
        }

        let strategy = self.strategy(&action.strategy)?;
        if self
            .lock_state()
            .active
            .iter()
            .any(|a| a.strategy == action.strategy)
        {
            return Err(StrategyError::Rejected {
                strategy: action.strategy.clone(),
                reason: "an optimization is already active".to_string(),
            }
            .into());
        }

        let baseline = self.collect_metrics()?;
        if let Err(e) = strategy.apply(&action.parameters) {
            self.lock_state().failed_actions += 1;
            self.emit(
                AuditEvent::new(AUDIT_COMPONENT, "optimization_failed")
                    .with("id", action.id.to_string())
                    .with("strategy", action.strategy.as_str())
                    .with("error", e.to_string()),
            );
            return Err(e.into());
        }

        let active =
            ActiveOptimization::from_action(action, baseline, self.config.rollback_threshold);
        let applied_at = active.applied_at;
        self.lock_state().active.push(active);
        // Counters are updated under a second acquisition; a concurrent
        // reader may briefly see the optimization before it is counted.
        self.lock_state().record_applied(applied_at);

        log::info!(
            "Controller: Applied '{}' ({}, {}).",
            action.strategy,
            action.kind,
            action.parameters.family()
        );
        self.emit(
            AuditEvent::new(AUDIT_COMPONENT, "optimization_applied")
                .with("id", action.id.to_string())
                .with("strategy", action.strategy.as_str())
                .with("kind", action.kind.to_string())
                .with("expected_impact", action.expected_impact),
        );
        Ok(())
    }

    /// Reverts an active optimization on operator request.
    pub fn rollback_optimization(&self, id: Uuid) -> Result<OptimizationRecord, ControlError> {
        self.revert(id, REASON_MANUAL)
    }

    /// Claims the optimization, runs the strategy rollback, then records it.
    ///
    /// While claimed, the optimization stays listed as active but neither the
    /// sweep nor a second revert can close it.
    fn revert(&self, id: Uuid, reason: &str) -> Result<OptimizationRecord, ControlError> {
        let active = self
            .lock_state()
            .claim(id)
            .ok_or(ControlError::OptimizationNotFound(id))?;

        let action = OptimizationAction::new(
            active.strategy.as_str(),
            ActionKind::Rollback,
            active.parameters.clone(),
            0.0,
        )
        .with_tag(ROLLBACK_TARGET_TAG, id.to_string())
        .with_tag("reason", reason);
        let reverted = self
            .strategy(&action.strategy)
            .and_then(|strategy| {
                strategy
                    .rollback(&action.parameters)
                    .map_err(ControlError::from)
            });
        if let Err(e) = reverted {
            self.lock_state().reverting.remove(&id);
            return Err(e);
        }

        let optimized = self
            .collect_metrics()
            .unwrap_or_else(|_| active.baseline.clone());
        self.close(id, optimized, false, Some(reason.to_string()))
            .ok_or(ControlError::OptimizationNotFound(id))
    }

    fn close(
        &self,
        id: Uuid,
        optimized: PerformanceMetrics,
        success: bool,
        rollback_reason: Option<String>,
    ) -> Option<OptimizationRecord> {
        let record = {
            let mut state = self.lock_state();
            let rolled_back = rollback_reason.is_some();
            if rolled_back {
                state.reverting.remove(&id);
            } else if state.reverting.contains(&id) {
                return None;
            }
            let mut active = state.take_active(id)?;
            active.status = if rolled_back {
                OptimizationStatus::RolledBack
            } else {
                OptimizationStatus::Completed
            };
            let record = active.into_record(optimized, success, rollback_reason);
            if rolled_back {
                state.rolled_back_optimizations += 1;
            } else if success {
                state.successful_optimizations += 1;
            }
            state.records.push(record.clone());
            record
        };

        let event_type = if record.rollback_reason.is_some() {
            log::warn!(
                "Controller: Rolled back '{}' ({}), improvement {:.1}%.",
                record.strategy,
                record.rollback_reason.as_deref().unwrap_or_default(),
                record.improvement
            );
            "rollback"
        } else {
            log::info!(
                "Controller: Completed '{}', improvement {:.1}%.",
                record.strategy,
                record.improvement
            );
            "completed"
        };
        self.emit(
            AuditEvent::new(AUDIT_COMPONENT, event_type)
                .with("id", record.id.to_string())
                .with("strategy", record.strategy.as_str())
                .with("improvement", record.improvement)
                .with("success", record.success),
        );
        Some(record)
    }

    fn evaluate_active_at(
        &self,
        metrics: &PerformanceMetrics,
        now: DateTime<Utc>,
    ) -> (Vec<OptimizationRecord>, Vec<OptimizationRecord>) {
        let active: Vec<_> = {
            let state = self.lock_state();
            state
                .active
                .iter()
                .filter(|a| !state.reverting.contains(&a.id))
                .cloned()
                .collect()
        };
        let mut completed = Vec::new();
        let mut rolled_back = Vec::new();

        for optimization in active {
            let improvement = metrics.improvement_over(&optimization.baseline);
            if improvement < -optimization.rollback_threshold {
                log::warn!(
                    "Controller: '{}' degraded performance by {:.1}%.",
                    optimization.strategy,
                    -improvement
                );
                match self.revert(optimization.id, REASON_DEGRADATION) {
                    Ok(record) => rolled_back.push(record),
                    Err(e) => log::error!(
                        "Controller: Rollback of '{}' failed: {}",
                        optimization.strategy,
                        e
                    ),
                }
                continue;
            }

            match optimization.status {
                OptimizationStatus::Active => {
                    let mut state = self.lock_state();
                    if let Some(a) = state.active.iter_mut().find(|a| a.id == optimization.id) {
                        a.status = OptimizationStatus::Monitoring;
                    }
                }
                OptimizationStatus::Monitoring
                    if optimization.age(now) >= self.config.monitoring_period() =>
                {
                    let success = improvement >= 0.0;
                    if let Some(record) = self.close(optimization.id, metrics.clone(), success, None)
                    {
                        completed.push(record);
                    }
                }
                _ => {}
            }
        }
        (completed, rolled_back)
    }

    /// Optimizations currently in effect.
    pub fn active_optimizations(&self) -> Vec<ActiveOptimization> {
        self.lock_state().active.clone()
    }

    /// Every finished optimization, oldest first.
    pub fn optimization_history(&self) -> Vec<OptimizationRecord> {
        self.lock_state().records.clone()
    }

    /// The recorded performance snapshots, oldest first.
    pub fn performance_history(&self) -> Vec<PerformanceSnapshot> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    /// Builds the read-model handed to state publishers.
    pub fn state(&self) -> OptimizationState {
        let mut state = self.lock_state();
        state.prune(Utc::now());
        OptimizationState {
            status: state.status,
            active: state.active.clone(),
            total_optimizations: state.total_optimizations,
            successful_optimizations: state.successful_optimizations,
            rolled_back_optimizations: state.rolled_back_optimizations,
            failed_actions: state.failed_actions,
            optimizations_today: state.optimizations_today,
            optimizations_last_hour: state.applied_last_hour.len() as u32,
            last_optimization: state.last_optimization,
            latest_metrics: state.latest_metrics.clone(),
        }
    }

    pub(crate) fn set_status(&self, status: ControllerStatus) {
        self.lock_state().status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vela_core::control::CacheParameters;
    use vela_core::telemetry::{ProviderError, ResourceSnapshot, SuccessRates};
    use vela_core::RecordingAuditSink;

    #[derive(Debug)]
    struct FixedSnapshots(Mutex<ResourceSnapshot>);

    impl FixedSnapshots {
        fn new(rt_ms: u64) -> Arc<Self> {
            Arc::new(Self(Mutex::new(ResourceSnapshot {
                average_response_time: Duration::from_millis(rt_ms),
                requests_per_second: 50.0,
                cpu_usage: 40.0,
                ..Default::default()
            })))
        }

        fn set_response_time(&self, rt_ms: u64) {
            self.0.lock().unwrap().average_response_time = Duration::from_millis(rt_ms);
        }
    }

    impl SnapshotProvider for FixedSnapshots {
        fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct PerfectRates;

    impl SuccessRateProvider for PerfectRates {
        fn success_rates(&self) -> SuccessRates {
            SuccessRates::default()
        }
    }

    #[derive(Default)]
    struct CountingStrategy {
        applied: AtomicUsize,
        reverted: AtomicUsize,
        fail_apply: bool,
    }

    impl OptimizationStrategy for CountingStrategy {
        fn name(&self) -> &str {
            "cache"
        }
        fn can_apply(&self, metrics: &PerformanceMetrics) -> bool {
            metrics.response_time_ms() > 1000.0
        }
        fn expected_impact(&self, _: &PerformanceMetrics) -> f64 {
            10.0
        }
        fn plan(&self, _: &PerformanceMetrics) -> StrategyParameters {
            StrategyParameters::Cache(CacheParameters::default())
        }
        fn apply(&self, _: &StrategyParameters) -> Result<(), StrategyError> {
            if self.fail_apply {
                return Err(StrategyError::Actuator {
                    strategy: "cache".into(),
                    reason: "offline".into(),
                });
            }
            self.applied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn rollback(&self, _: &StrategyParameters) -> Result<(), StrategyError> {
            self.reverted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn controller(
        config: OptimizationConfig,
        snapshots: Arc<FixedSnapshots>,
    ) -> (OptimizationController, Arc<CountingStrategy>, Arc<RecordingAuditSink>) {
        let audit = Arc::new(RecordingAuditSink::new());
        let controller =
            OptimizationController::with_audit(config, snapshots, Arc::new(PerfectRates), audit.clone());
        let strategy = Arc::new(CountingStrategy::default());
        controller.register_strategy(strategy.clone());
        (controller, strategy, audit)
    }

    #[test]
    fn test_cycle_queues_and_executes() {
        let (controller, strategy, audit) =
            controller(OptimizationConfig::default(), FixedSnapshots::new(1500));
        let outcome = controller.run_cycle().unwrap();
        assert_eq!(outcome.alerts.len(), 1);
        let queued = outcome.queued.unwrap();
        assert_eq!(queued.priority, 50);

        assert_eq!(controller.process_pending(), 1);
        assert_eq!(strategy.applied.load(Ordering::SeqCst), 1);
        let state = controller.state();
        assert_eq!(state.active.len(), 1);
        assert_eq!(state.total_optimizations, 1);
        assert_eq!(state.optimizations_last_hour, 1);
        assert_eq!(audit.count("optimization_applied"), 1);
        assert_eq!(controller.performance_history().len(), 1);
    }

    #[test]
    fn test_cooldown_blocks_second_automatic_action() {
        let (controller, _, _) =
            controller(OptimizationConfig::default(), FixedSnapshots::new(1500));
        controller.run_cycle().unwrap();
        controller.process_pending();
        assert!(!controller.can_optimize());
        assert!(controller.run_cycle().unwrap().queued.is_none());
    }

    #[test]
    fn test_rate_limit_outlasts_cooldown() {
        let config = OptimizationConfig {
            max_optimizations_per_hour: 1,
            cooldown_secs: 1,
            ..Default::default()
        };
        let (controller, _, _) = controller(config, FixedSnapshots::new(1500));
        controller.force_optimization("cache", None).unwrap();
        controller.process_pending();

        let now = Utc::now();
        assert!(!controller.can_optimize_at(now + chrono::Duration::seconds(5)));
        assert!(controller.can_optimize_at(now + chrono::Duration::minutes(61)));
    }

    #[test]
    fn test_force_unknown_strategy() {
        let (controller, _, _) =
            controller(OptimizationConfig::default(), FixedSnapshots::new(100));
        assert_eq!(
            controller.force_optimization("nope", None),
            Err(ControlError::UnknownStrategy("nope".into()))
        );
    }

    #[test]
    fn test_full_queue_rejects_forced_action() {
        let config = OptimizationConfig {
            action_queue_size: 1,
            ..Default::default()
        };
        let (controller, _, audit) = controller(config, FixedSnapshots::new(100));
        controller.force_optimization("cache", None).unwrap();
        assert_eq!(
            controller.force_optimization("cache", None),
            Err(ControlError::QueueFull("cache".into()))
        );
        assert_eq!(audit.count("queue_full"), 1);
        assert_eq!(controller.queued_actions(), 1);
    }

    #[test]
    fn test_manual_rollback_records_once() {
        let (controller, strategy, _) =
            controller(OptimizationConfig::default(), FixedSnapshots::new(100));
        let id = controller.force_optimization("cache", None).unwrap();
        controller.process_pending();

        let record = controller.rollback_optimization(id).unwrap();
        assert!(!record.success);
        assert_eq!(record.rollback_reason.as_deref(), Some(REASON_MANUAL));
        assert_eq!(strategy.reverted.load(Ordering::SeqCst), 1);
        assert!(controller.active_optimizations().is_empty());
        assert_eq!(controller.optimization_history().len(), 1);
        assert_eq!(
            controller.rollback_optimization(id),
            Err(ControlError::OptimizationNotFound(id))
        );
        assert_eq!(controller.state().rolled_back_optimizations, 1);
    }

    #[test]
    fn test_degradation_triggers_automatic_rollback() {
        let snapshots = FixedSnapshots::new(200);
        let (controller, strategy, _) =
            controller(OptimizationConfig::default(), snapshots.clone());
        controller.force_optimization("cache", None).unwrap();
        controller.process_pending();

        // Response time doubles: -100% on that dimension, mean -33%.
        snapshots.set_response_time(400);
        let outcome = controller.run_cycle().unwrap();
        assert_eq!(outcome.rolled_back.len(), 1);
        assert_eq!(
            outcome.rolled_back[0].rollback_reason.as_deref(),
            Some(REASON_DEGRADATION)
        );
        assert_eq!(strategy.reverted.load(Ordering::SeqCst), 1);
        assert!(controller.active_optimizations().is_empty());
    }

    #[test]
    fn test_monitoring_then_completion() {
        let snapshots = FixedSnapshots::new(200);
        let (controller, _, audit) = controller(OptimizationConfig::default(), snapshots.clone());
        controller.force_optimization("cache", None).unwrap();
        controller.process_pending();

        snapshots.set_response_time(150);
        controller.run_cycle().unwrap();
        assert_eq!(
            controller.active_optimizations()[0].status,
            OptimizationStatus::Monitoring
        );

        let metrics = controller.collect_metrics().unwrap();
        let later = Utc::now() + chrono::Duration::minutes(11);
        let (completed, rolled_back) = controller.evaluate_active_at(&metrics, later);
        assert!(rolled_back.is_empty());
        assert_eq!(completed.len(), 1);
        assert!(completed[0].success);
        assert!(completed[0].improvement > 0.0);
        assert_eq!(controller.state().successful_optimizations, 1);
        assert_eq!(audit.count("completed"), 1);
    }

    #[test]
    fn test_failed_apply_is_counted() {
        let audit = Arc::new(RecordingAuditSink::new());
        let controller = OptimizationController::with_audit(
            OptimizationConfig::default(),
            FixedSnapshots::new(100),
            Arc::new(PerfectRates),
            audit.clone(),
        );
        controller.register_strategy(Arc::new(CountingStrategy {
            fail_apply: true,
            ..Default::default()
        }));
        controller.force_optimization("cache", None).unwrap();
        assert_eq!(controller.process_pending(), 0);
        assert_eq!(controller.state().failed_actions, 1);
        assert_eq!(audit.count("optimization_failed"), 1);
    }

    #[test]
    fn test_second_apply_of_active_strategy_is_rejected() {
        let (controller, strategy, _) =
            controller(OptimizationConfig::default(), FixedSnapshots::new(100));
        controller.force_optimization("cache", None).unwrap();
        controller.force_optimization("cache", None).unwrap();
        assert_eq!(controller.process_pending(), 1);
        assert_eq!(strategy.applied.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct OfflineSnapshots;

    impl SnapshotProvider for OfflineSnapshots {
        fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError> {
            Err(ProviderError::Unavailable("monitor offline".into()))
        }
    }

    #[test]
    fn test_force_with_parameters_skips_provider() {
        let controller = OptimizationController::new(
            OptimizationConfig::default(),
            Arc::new(OfflineSnapshots),
            Arc::new(PerfectRates),
        );
        controller.register_strategy(Arc::new(CountingStrategy::default()));

        let params = StrategyParameters::Cache(CacheParameters::default());
        controller.force_optimization("cache", Some(params.clone())).unwrap();
        let queued: Vec<_> = controller.queue_receiver().try_iter().collect();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].parameters, params);
        assert_eq!(queued[0].expected_impact, 0.0);

        assert!(matches!(
            controller.force_optimization("cache", None),
            Err(ControlError::Provider(_))
        ));
    }

    struct GatedRollback {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl OptimizationStrategy for GatedRollback {
        fn name(&self) -> &str {
            "cache"
        }
        fn can_apply(&self, _: &PerformanceMetrics) -> bool {
            false
        }
        fn expected_impact(&self, _: &PerformanceMetrics) -> f64 {
            10.0
        }
        fn plan(&self, _: &PerformanceMetrics) -> StrategyParameters {
            StrategyParameters::Cache(CacheParameters::default())
        }
        fn apply(&self, _: &StrategyParameters) -> Result<(), StrategyError> {
            Ok(())
        }
        fn rollback(&self, _: &StrategyParameters) -> Result<(), StrategyError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Ok(())
        }
    }

    #[test]
    fn test_sweep_skips_optimization_being_rolled_back() {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let snapshots = FixedSnapshots::new(200);
        let controller = OptimizationController::new(
            OptimizationConfig::default(),
            snapshots.clone(),
            Arc::new(PerfectRates),
        );
        controller.register_strategy(Arc::new(GatedRollback {
            entered: entered_tx,
            release: release_rx,
        }));
        let id = controller.force_optimization("cache", None).unwrap();
        controller.process_pending();
        snapshots.set_response_time(150);
        controller.run_cycle().unwrap();
        assert_eq!(
            controller.active_optimizations()[0].status,
            OptimizationStatus::Monitoring
        );

        let metrics = controller.collect_metrics().unwrap();
        let later = Utc::now() + chrono::Duration::minutes(11);
        let manual = std::thread::scope(|scope| {
            let rollback = scope.spawn(|| controller.rollback_optimization(id));
            entered_rx.recv().unwrap();

            // The monitoring period is over, but the rollback owns the entry.
            let (completed, rolled_back) = controller.evaluate_active_at(&metrics, later);
            assert!(completed.is_empty());
            assert!(rolled_back.is_empty());
            assert_eq!(
                controller.rollback_optimization(id),
                Err(ControlError::OptimizationNotFound(id))
            );

            release_tx.send(()).unwrap();
            rollback.join().unwrap()
        });

        let record = manual.unwrap();
        assert_eq!(record.rollback_reason.as_deref(), Some(REASON_MANUAL));
        let history = controller.optimization_history();
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        assert!(controller.active_optimizations().is_empty());
        assert_eq!(controller.state().successful_optimizations, 0);
    }
}
