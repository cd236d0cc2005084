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

//! The engine facade.

use crate::config::EngineConfig;
use crate::publish::{EngineSnapshot, StatePublisher};
use chrono::Utc;
use std::io;
use std::sync::Arc;
use vela_control::strategy::register_builtin;
use vela_control::{
    ControlError, InMemoryKnobs, KnobController, OptimizationController, OptimizationService,
    TuningEngine,
};
use vela_core::control::{OptimizationStrategy, SessionStatus, TuningSession};
use vela_core::telemetry::{ApplicationGauges, RequestOutcomeEvent, SnapshotProvider};
use vela_core::{AuditSink, LogAuditSink};
use vela_telemetry::{HealthReport, PerformanceTracker, SystemSnapshotProvider};

/// Wires the tracker, the optimization controller and the tuning engine
/// from one configuration.
pub struct PerformanceEngine {
    config: EngineConfig,
    tracker: Arc<PerformanceTracker>,
    gauges: Arc<ApplicationGauges>,
    knobs: Arc<InMemoryKnobs>,
    service: OptimizationService,
    tuning: TuningEngine,
    publishers: Vec<Arc<dyn StatePublisher>>,
}

impl PerformanceEngine {
    /// Builds an engine reading host metrics through `sysinfo`.
    pub fn new(config: EngineConfig) -> Self {
        Self::build(config, None, Arc::new(LogAuditSink))
    }

    /// Builds an engine over a caller-supplied snapshot provider.
    pub fn with_provider(
        config: EngineConfig,
        provider: Arc<dyn SnapshotProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::build(config, Some(provider), audit)
    }

    fn build(
        config: EngineConfig,
        provider: Option<Arc<dyn SnapshotProvider>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let config = config.normalized();
        let tracker = Arc::new(PerformanceTracker::with_audit(
            config.tracker.clone(),
            Arc::clone(&audit),
        ));
        let gauges = Arc::new(ApplicationGauges::new());
        let provider: Arc<dyn SnapshotProvider> = match provider {
            Some(provider) => provider,
            None => Arc::new(
                SystemSnapshotProvider::new(
                    Arc::clone(&tracker),
                    Arc::clone(&gauges),
                    config.latency_window(),
                )
                .with_network_capacity(config.network_capacity),
            ),
        };

        let controller = Arc::new(OptimizationController::with_audit(
            config.optimization.clone(),
            provider,
            tracker.clone(),
            Arc::clone(&audit),
        ));
        let knobs = Arc::new(InMemoryKnobs::new());
        let board: KnobController = knobs.clone();
        controller.with_registry(|registry| register_builtin(registry, &board));

        let tuning = TuningEngine::with_hooks(
            config.tuning.clone(),
            Arc::new(vela_control::NoopLearning),
            audit,
        );

        log::info!(
            "Engine: Built with {} strategies.",
            controller.strategy_names().len()
        );
        Self {
            service: OptimizationService::new(controller),
            config,
            tracker,
            gauges,
            knobs,
            tuning,
            publishers: Vec::new(),
        }
    }

    /// Starts the monitor and executor threads.
    pub fn start(&mut self) -> io::Result<()> {
        self.service.start()
    }

    /// Stops the background threads.
    pub fn stop(&mut self) {
        self.service.stop();
    }

    /// Returns `true` while the background threads run.
    pub fn is_running(&self) -> bool {
        self.service.is_running()
    }

    /// Records one request outcome.
    pub fn track(&self, event: &RequestOutcomeEvent) {
        self.tracker.track_request(event);
    }

    /// The normalized configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The aggregation tracker.
    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    /// The board the host writes its application gauges into.
    pub fn gauges(&self) -> &Arc<ApplicationGauges> {
        &self.gauges
    }

    /// The runtime knobs strategies act on.
    pub fn knobs(&self) -> &Arc<InMemoryKnobs> {
        &self.knobs
    }

    /// The optimization controller.
    pub fn controller(&self) -> &Arc<OptimizationController> {
        self.service.controller()
    }

    /// The tuning engine.
    pub fn tuning(&self) -> &TuningEngine {
        &self.tuning
    }

    /// Registers an additional strategy.
    pub fn register_strategy(&self, strategy: Arc<dyn OptimizationStrategy>) {
        self.controller().register_strategy(strategy);
    }

    /// Starts a tuning session when current metrics warrant one.
    pub fn tune(&self) -> Result<Option<TuningSession>, ControlError> {
        let metrics = self.controller().collect_metrics()?;
        Ok(self.tuning.tune(&metrics))
    }

    /// Adds a publisher that receives every [`publish`](Self::publish) call.
    pub fn add_publisher(&mut self, publisher: Arc<dyn StatePublisher>) {
        self.publishers.push(publisher);
    }

    /// Captures the current read-model.
    pub fn snapshot(&self) -> EngineSnapshot {
        let overall = self.tracker.overall_stats();
        let health = HealthReport::evaluate(&overall, &self.config.health);
        EngineSnapshot {
            overall,
            health,
            optimization: self.controller().state(),
            active_tuning_sessions: self
                .tuning
                .sessions()
                .into_iter()
                .filter(|s| s.status == SessionStatus::Active)
                .collect(),
            captured_at: Utc::now(),
        }
    }

    /// Captures the read-model and hands it to every publisher.
    pub fn publish(&self) -> EngineSnapshot {
        let snapshot = self.snapshot();
        for publisher in &self.publishers {
            publisher.publish(&snapshot);
        }
        snapshot
    }
}
