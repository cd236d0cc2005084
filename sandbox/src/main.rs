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

//! Drives synthetic request traffic through a `PerformanceEngine` and prints
//! the resulting read-model as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use vela_core::telemetry::RequestOutcomeEvent;
use vela_runtime::{EngineConfig, LogStatePublisher, PerformanceEngine};

const ENDPOINTS: [&str; 4] = ["/api/orders", "/api/users", "/api/search", "/api/cart"];
const ERROR_TYPES: [&str; 3] = ["timeout", "database", "validation"];

#[derive(Parser)]
#[command(name = "sandbox")]
#[command(about = "Synthetic traffic for the Vela performance engine", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML). Defaults are used when absent.
    #[arg(long, default_value = "vela.toml")]
    config: PathBuf,

    /// Number of synthetic requests to generate.
    #[arg(long, default_value_t = 2000)]
    requests: u32,

    /// One request in `failure_every` fails.
    #[arg(long, default_value_t = 12)]
    failure_every: u32,

    /// Base response time in milliseconds.
    #[arg(long, default_value_t = 180)]
    latency_ms: u64,

    /// Reported cache hit ratio.
    #[arg(long, default_value_t = 0.55)]
    cache_hit_rate: f64,

    /// Seconds to let the background loops run before the final report.
    #[arg(long, default_value_t = 2)]
    run_secs: u64,

    /// Start a tuning session after the traffic if metrics warrant one.
    #[arg(long)]
    tune: bool,
}

fn synthetic_event(i: u32, cli: &Cli) -> RequestOutcomeEvent {
    let endpoint = ENDPOINTS[i as usize % ENDPOINTS.len()];
    let user = format!("user-{}", i % 37);
    // Later requests slow down so the trend and the controller have something to react to.
    let drift = u64::from(i) * cli.latency_ms / u64::from(cli.requests.max(1));
    let jitter = u64::from(i.wrapping_mul(7919) % 50);
    let mut event = RequestOutcomeEvent::success(
        endpoint,
        user,
        Duration::from_millis(cli.latency_ms + drift + jitter),
    );
    event.data_size = 512 + u64::from(i % 8) * 128;
    if cli.failure_every > 0 && i % cli.failure_every == 0 {
        event.success = false;
        let kind = (i / cli.failure_every) as usize % ERROR_TYPES.len();
        event.error_type = Some(ERROR_TYPES[kind].to_string());
    }
    event
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = EngineConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load '{}'", cli.config.display()))?;
    // Evaluate often enough to see the loop act within a short demo run.
    config.optimization.evaluation_interval_ms =
        config.optimization.evaluation_interval_ms.min(500);

    let mut engine = PerformanceEngine::new(config);
    engine.add_publisher(std::sync::Arc::new(LogStatePublisher));
    engine.gauges().set_cache_hit_rate(cli.cache_hit_rate);
    engine
        .start()
        .context("Failed to start the optimization threads")?;

    for i in 0..cli.requests {
        engine.track(&synthetic_event(i, &cli));
    }
    log::info!("Sandbox: Sent {} synthetic requests.", cli.requests);

    thread::sleep(Duration::from_secs(cli.run_secs));

    if cli.tune {
        match engine.tune().context("Failed to collect metrics for tuning")? {
            Some(session) => {
                log::info!(
                    "Sandbox: Tuning session {} ({} policy).",
                    session.id,
                    session.policy
                );
                for _ in 0..session.actions.len() {
                    match engine.tuning().execute_next_action(session.id) {
                        Ok(Some(action)) => log::info!("Sandbox: {}", action.description),
                        Ok(None) => break,
                        Err(e) => log::warn!("Sandbox: Tuning action refused: {}", e),
                    }
                }
            }
            None => log::info!("Sandbox: Metrics within expectations, no tuning needed."),
        }
    }

    engine.stop();
    let snapshot = engine.publish();
    println!("{}", snapshot.to_json()?);

    for endpoint in engine.tracker().worst_performing_endpoints(3) {
        log::info!(
            "Sandbox: {} at {:.1}% success.",
            endpoint.endpoint,
            endpoint.success_rate * 100.0
        );
    }
    Ok(())
}
