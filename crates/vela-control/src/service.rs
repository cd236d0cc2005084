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

//! Background threads driving the optimization controller.

use crate::controller::OptimizationController;
use crossbeam_channel::{select, Receiver, Sender};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use vela_core::control::ControllerStatus;

/// Runs the monitor loop and the executor loop on their own threads.
///
/// The monitor thread calls [`OptimizationController::run_cycle`] every
/// evaluation interval. The executor thread blocks on the action queue and
/// executes whatever arrives. Both exit when the shutdown channel closes.
pub struct OptimizationService {
    controller: Arc<OptimizationController>,
    running: Arc<AtomicBool>,
    shutdown: Option<Sender<()>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl OptimizationService {
    /// Creates a stopped service around a controller.
    pub fn new(controller: Arc<OptimizationController>) -> Self {
        Self {
            controller,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            handles: Vec::new(),
        }
    }

    /// The controller driven by this service.
    pub fn controller(&self) -> &Arc<OptimizationController> {
        &self.controller
    }

    /// Returns `true` while the background threads run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the monitor and executor threads. Does nothing if already running.
    pub fn start(&mut self) -> io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        self.shutdown = Some(shutdown_tx);

        let spawned = self
            .spawn_monitor(shutdown_rx.clone())
            .and_then(|monitor| {
                self.handles.push(monitor);
                self.spawn_executor(shutdown_rx)
            });
        match spawned {
            Ok(executor) => {
                self.handles.push(executor);
                self.controller.set_status(ControllerStatus::Running);
                log::info!("OptimizationService: Started.");
                Ok(())
            }
            Err(e) => {
                log::error!("OptimizationService: Failed to spawn thread: {}", e);
                self.stop();
                Err(e)
            }
        }
    }

    fn spawn_monitor(&self, shutdown: Receiver<()>) -> io::Result<thread::JoinHandle<()>> {
        let controller = Arc::clone(&self.controller);
        let interval = controller.config().evaluation_interval();
        thread::Builder::new()
            .name("vela-monitor".into())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                log::debug!("OptimizationService: Monitor thread started ({:?}).", interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if let Err(e) = controller.run_cycle() {
                                log::error!("OptimizationService: Cycle failed: {}", e);
                            }
                        }
                        recv(shutdown) -> _ => break,
                    }
                }
                log::debug!("OptimizationService: Monitor thread stopped.");
            })
    }

    fn spawn_executor(&self, shutdown: Receiver<()>) -> io::Result<thread::JoinHandle<()>> {
        let controller = Arc::clone(&self.controller);
        let queue = controller.queue_receiver();
        thread::Builder::new()
            .name("vela-executor".into())
            .spawn(move || {
                log::debug!("OptimizationService: Executor thread started.");
                loop {
                    select! {
                        recv(queue) -> action => match action {
                            Ok(action) => {
                                controller.process_batch(action);
                            }
                            Err(_) => break,
                        },
                        recv(shutdown) -> _ => break,
                    }
                }
                log::debug!("OptimizationService: Executor thread stopped.");
            })
    }

    /// Signals both threads and waits for them. Queued actions stay in the queue.
    pub fn stop(&mut self) {
        // Dropping the only sender disconnects the shutdown channel.
        self.shutdown.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("OptimizationService: A worker thread panicked.");
            }
        }
        if self.running.swap(false, Ordering::SeqCst) {
            self.controller.set_status(ControllerStatus::Stopped);
            log::info!("OptimizationService: Stopped.");
        }
    }
}

impl Drop for OptimizationService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use vela_core::control::{
        CacheParameters, OptimizationStrategy, StrategyError, StrategyParameters,
    };
    use vela_core::telemetry::{
        PerformanceMetrics, ProviderError, ResourceSnapshot, SnapshotProvider,
        SuccessRateProvider, SuccessRates,
    };
    use vela_core::OptimizationConfig;

    #[derive(Debug)]
    struct Idle;

    impl SnapshotProvider for Idle {
        fn snapshot(&self) -> Result<ResourceSnapshot, ProviderError> {
            Ok(ResourceSnapshot {
                requests_per_second: 10.0,
                ..Default::default()
            })
        }
    }

    impl SuccessRateProvider for Idle {
        fn success_rates(&self) -> SuccessRates {
            SuccessRates::default()
        }
    }

    struct Noop;

    impl OptimizationStrategy for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        fn can_apply(&self, _: &PerformanceMetrics) -> bool {
            false
        }
        fn expected_impact(&self, _: &PerformanceMetrics) -> f64 {
            0.0
        }
        fn plan(&self, _: &PerformanceMetrics) -> StrategyParameters {
            StrategyParameters::Cache(CacheParameters::default())
        }
        fn apply(&self, _: &StrategyParameters) -> Result<(), StrategyError> {
            Ok(())
        }
        fn rollback(&self, _: &StrategyParameters) -> Result<(), StrategyError> {
            Ok(())
        }
    }

    fn service() -> OptimizationService {
        let config = OptimizationConfig {
            evaluation_interval_ms: 10,
            ..Default::default()
        };
        let controller = Arc::new(OptimizationController::new(
            config,
            Arc::new(Idle),
            Arc::new(Idle),
        ));
        controller.register_strategy(Arc::new(Noop));
        OptimizationService::new(controller)
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_service_lifecycle() {
        let mut service = service();
        assert!(!service.is_running());
        service.start().unwrap();
        service.start().unwrap();
        assert!(service.is_running());
        assert_eq!(service.controller().state().status, ControllerStatus::Running);

        let controller = Arc::clone(service.controller());
        assert!(wait_until(Duration::from_secs(5), || {
            !controller.performance_history().is_empty()
        }));

        service.stop();
        assert!(!service.is_running());
        assert_eq!(controller.state().status, ControllerStatus::Stopped);
    }

    #[test]
    fn test_executor_applies_forced_action() {
        let mut service = service();
        service.start().unwrap();
        let controller = Arc::clone(service.controller());
        controller.force_optimization("noop", None).unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            controller.state().total_optimizations == 1
        }));
        drop(service);
        assert_eq!(controller.state().status, ControllerStatus::Stopped);
    }
}
