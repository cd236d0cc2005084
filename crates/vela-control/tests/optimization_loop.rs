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

//! End-to-end behaviour of the optimization loop over a real tracker.

use std::sync::Arc;
use std::time::Duration;
use vela_control::strategy::CacheStrategy;
use vela_control::{
    register_builtin, ControlError, InMemoryKnobs, KnobController, OptimizationController,
    RuntimeKnobs, TuningEngine, REASON_MANUAL,
};
use vela_core::control::{CacheParameters, PolicyKind, SessionStatus, StrategyParameters};
use vela_core::telemetry::{
    ApplicationGauges, ProviderError, RequestOutcomeEvent, ResourceSnapshot, SnapshotProvider,
};
use vela_core::{OptimizationConfig, RecordingAuditSink, TrackerConfig, TuningConfig};
use vela_telemetry::PerformanceTracker;

/// Tracker latency and application gauges with a fixed, quiet host.
#[derive(Debug)]
struct QuietHost {
    tracker: Arc<PerformanceTracker>,
    gauges: Arc<ApplicationGauges>,
}

impl SnapshotProvider for QuietHost {
    fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError> {
        let latency = self.tracker.latency_summary(Duration::from_secs(60));
        Ok(ResourceSnapshot {
            average_response_time: latency.average,
            p95_response_time: latency.p95,
            p99_response_time: latency.p99,
            requests_per_second: latency.requests_per_second,
            cpu_usage: 35.0,
            memory_usage: 40.0,
            gauges: self.gauges.read(),
            ..Default::default()
        })
    }
}

struct Harness {
    tracker: Arc<PerformanceTracker>,
    knobs: Arc<InMemoryKnobs>,
    controller: OptimizationController,
    audit: Arc<RecordingAuditSink>,
}

fn harness(config: OptimizationConfig, rt_ms: u64) -> Harness {
    let tracker = Arc::new(PerformanceTracker::new(TrackerConfig::default()));
    for i in 0..100 {
        tracker.track_request(&RequestOutcomeEvent::success(
            format!("/api/{}", i % 4),
            "user",
            Duration::from_millis(rt_ms),
        ));
    }
    let gauges = Arc::new(ApplicationGauges::new());
    gauges.set_cache_hit_rate(0.5);

    let audit = Arc::new(RecordingAuditSink::new());
    let controller = OptimizationController::with_audit(
        config,
        Arc::new(QuietHost {
            tracker: Arc::clone(&tracker),
            gauges,
        }),
        tracker.clone(),
        audit.clone(),
    );
    let knobs = Arc::new(InMemoryKnobs::new());
    let board: KnobController = knobs.clone();
    controller.with_registry(|registry| register_builtin(registry, &board));

    Harness {
        tracker,
        knobs,
        controller,
        audit,
    }
}

#[test]
fn test_slow_system_gets_cache_optimization() {
    let h = harness(OptimizationConfig::default(), 1500);
    let outcome = h.controller.run_cycle().unwrap();
    assert!(!outcome.alerts.is_empty());
    let queued = outcome.queued.expect("an action should be queued");
    assert_eq!(queued.strategy, CacheStrategy::NAME);

    assert_eq!(h.controller.process_pending(), 1);
    match h.knobs.read("cache") {
        Some(StrategyParameters::Cache(p)) => {
            assert_eq!(p.ttl, Duration::from_secs(600));
            assert!(p.prefetch);
        }
        other => panic!("unexpected knob value {other:?}"),
    }
    assert_eq!(h.audit.count("optimization_applied"), 1);
    assert_eq!(h.tracker.overall_stats().total_requests, 100);
}

#[test]
fn test_healthy_system_is_left_alone() {
    let h = harness(OptimizationConfig::default(), 100);
    let outcome = h.controller.run_cycle().unwrap();
    assert!(outcome.alerts.is_empty());
    assert!(outcome.queued.is_none());
    assert_eq!(h.controller.process_pending(), 0);
}

#[test]
fn test_manual_rollback_restores_knobs() {
    let h = harness(OptimizationConfig::default(), 100);
    let custom = StrategyParameters::Cache(CacheParameters {
        ttl: Duration::from_secs(900),
        max_entries: 50_000,
        prefetch: true,
    });
    let id = h
        .controller
        .force_optimization(CacheStrategy::NAME, Some(custom.clone()))
        .unwrap();
    h.controller.process_pending();
    assert_eq!(h.knobs.read("cache"), Some(custom));

    let record = h.controller.rollback_optimization(id).unwrap();
    assert_eq!(record.rollback_reason.as_deref(), Some(REASON_MANUAL));
    assert_eq!(
        h.knobs.read("cache"),
        Some(StrategyParameters::Cache(CacheParameters::default()))
    );
    assert_eq!(h.controller.optimization_history().len(), 1);
    assert_eq!(h.audit.count("rollback"), 1);
}

#[test]
fn test_queue_full_is_reported() {
    let config = OptimizationConfig {
        action_queue_size: 2,
        ..Default::default()
    };
    let h = harness(config, 100);
    h.controller.force_optimization("cache", None).unwrap();
    h.controller.force_optimization("database", None).unwrap();
    assert_eq!(
        h.controller.force_optimization("auto_scaling", None),
        Err(ControlError::QueueFull("auto_scaling".into()))
    );
    assert_eq!(h.controller.process_pending(), 2);
    assert_eq!(h.controller.state().total_optimizations, 2);
}

#[test]
fn test_tuning_session_from_tracker_metrics() {
    let h = harness(OptimizationConfig::default(), 1200);
    let metrics = h.controller.collect_metrics().unwrap();
    let engine = TuningEngine::new(TuningConfig::default());

    assert!(engine.should_tune(&metrics));
    let session = engine.tune(&metrics).expect("tuning should start");
    assert_eq!(session.policy, PolicyKind::Aggressive);

    assert_eq!(session.actions.len(), 2);
    for _ in 0..session.actions.len() {
        assert!(engine.execute_next_action(session.id).unwrap().is_some());
    }
    assert_eq!(
        engine.session(session.id).unwrap().status,
        SessionStatus::Completed
    );
}
