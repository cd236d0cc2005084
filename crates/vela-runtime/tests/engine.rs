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

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use vela_core::telemetry::{ProviderError, RequestOutcomeEvent, ResourceSnapshot, SnapshotProvider};
use vela_core::RecordingAuditSink;
use vela_runtime::{ConfigError, EngineConfig, MemoryStatePublisher, PerformanceEngine};

#[derive(Debug)]
struct SlowHost;

impl SnapshotProvider for SlowHost {
    fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError> {
        Ok(ResourceSnapshot {
            average_response_time: Duration::from_millis(1200),
            requests_per_second: 20.0,
            cpu_usage: 30.0,
            memory_usage: 30.0,
            ..Default::default()
        })
    }
}

fn engine(config: EngineConfig) -> (PerformanceEngine, Arc<RecordingAuditSink>) {
    let audit = Arc::new(RecordingAuditSink::new());
    let engine = PerformanceEngine::with_provider(config, Arc::new(SlowHost), audit.clone());
    (engine, audit)
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[optimization]\nevaluation_interval_ms = 20\n\n[tuning]\nexpected_response_time_ms = 400"
    )
    .unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.optimization.evaluation_interval_ms, 20);
    assert_eq!(config.tuning.expected_response_time_ms, 400);
}

#[test]
fn test_missing_file_is_io_error_or_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vela.toml");
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::Io { .. })
    ));
    assert_eq!(
        EngineConfig::load_or_default(&path).unwrap(),
        EngineConfig::default()
    );
}

#[test]
fn test_snapshot_reflects_tracked_requests() {
    let (engine, _) = engine(EngineConfig::default());
    for i in 0..20 {
        let mut event = RequestOutcomeEvent::success("/orders", "u1", Duration::from_millis(50));
        if i % 10 == 0 {
            event.success = false;
            event.error_type = Some("timeout".to_string());
        }
        engine.track(&event);
    }

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.overall.total_requests, 20);
    assert_eq!(snapshot.overall.failed_requests, 2);
    assert!(!snapshot.health.healthy);

    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"total_requests\": 20"));
}

#[test]
fn test_tune_creates_session_for_slow_host() {
    let (engine, audit) = engine(EngineConfig::default());
    let session = engine.tune().unwrap().expect("slow host should be tuned");
    assert_eq!(session.actions[0].action_type, "optimize_response_time");
    assert_eq!(engine.snapshot().active_tuning_sessions.len(), 1);
    assert_eq!(audit.count("session_created"), 1);
}

#[test]
fn test_background_loop_publishes_state() {
    let mut config = EngineConfig::default();
    config.optimization.evaluation_interval_ms = 10;
    let (mut engine, _) = engine(config);
    let publisher = Arc::new(MemoryStatePublisher::new());
    engine.add_publisher(publisher.clone());

    engine.start().unwrap();
    assert!(engine.is_running());
    let controller = Arc::clone(engine.controller());
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while controller.performance_history().is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    engine.stop();

    let published = engine.publish();
    assert!(published.optimization.latest_metrics.is_some());
    assert_eq!(publisher.snapshots().len(), 1);
    assert!(!engine.is_running());
}
