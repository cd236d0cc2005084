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

//! The aggregation tracker.
//!
//! Per-endpoint and per-user aggregates are sharded into lock stripes keyed
//! by a hash of the endpoint or user id. The system-wide views (overall
//! counters, time windows and the error taxonomy) depend on global counts and
//! share a single lock, so their updates stay serialized.
//!
//! A `track_request` call never holds two locks at once. Readers that combine
//! several stripes see each stripe at a slightly different instant.

use crate::health::{classify_trend, health_score};
use chrono::{DateTime, Utc};
use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use vela_core::telemetry::{
    DataPoint, EndpointStats, ErrorTypeStats, OverallStats, RequestOutcomeEvent,
    SuccessRateProvider, SuccessRateReport, SuccessRates, TimeWindowStats, Trend, UserStats,
};
use vela_core::{AuditEvent, AuditSink, LogAuditSink, RingBuffer, TrackerConfig};

/// Number of lock stripes for endpoint and user aggregates.
const STRIPES: usize = 16;
/// Smoothing factor of the trending success rate.
const TRENDING_ALPHA: f64 = 0.1;
/// Default size of top/worst endpoint lists.
const DEFAULT_RANKING_SIZE: usize = 10;
/// Error category used for failures that carry none.
const UNKNOWN_ERROR: &str = "unknown";
/// Weight of occurrence frequency in the error impact score.
const IMPACT_FREQUENCY_WEIGHT: f64 = 0.7;
/// Weight of endpoint breadth in the error impact score.
const IMPACT_BREADTH_WEIGHT: f64 = 0.3;

/// Errors returned by tracker queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// No event was ever tracked for the endpoint.
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),
    /// No event was ever tracked for the user.
    #[error("user not found: {0}")]
    UserNotFound(String),
}

/// Latency and throughput derived from recent history.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencySummary {
    /// Mean response time.
    pub average: Duration,
    /// 95th percentile response time.
    pub p95: Duration,
    /// 99th percentile response time.
    pub p99: Duration,
    /// Requests per second over the window.
    pub requests_per_second: f64,
}

struct EndpointEntry {
    stats: EndpointStats,
    recent: RingBuffer<bool>,
}

struct GlobalState {
    overall: OverallStats,
    recent: RingBuffer<bool>,
    windows: BTreeMap<DateTime<Utc>, TimeWindowStats>,
    errors: HashMap<String, ErrorTypeStats>,
    known_endpoints: usize,
}

impl GlobalState {
    fn new(config: &TrackerConfig) -> Self {
        Self {
            overall: OverallStats::default(),
            recent: RingBuffer::new(config.recent_window),
            windows: BTreeMap::new(),
            errors: HashMap::new(),
            known_endpoints: 0,
        }
    }
}

type Stripe<T> = RwLock<HashMap<String, T>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn success_ratio(successful: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64
    }
}

fn ring_success_rate(ring: &RingBuffer<bool>) -> f64 {
    if ring.is_empty() {
        return 1.0;
    }
    ring.iter().filter(|ok| **ok).count() as f64 / ring.len() as f64
}

/// Folds `sample` into a running mean over `count` samples.
fn running_mean(mean: Duration, sample: Duration, count: u64) -> Duration {
    if count <= 1 {
        return sample;
    }
    let mean = mean.as_secs_f64();
    Duration::from_secs_f64((mean + (sample.as_secs_f64() - mean) / count as f64).max(0.0))
}

fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Aggregates request outcomes across endpoint, user, time window and error type.
pub struct PerformanceTracker {
    config: TrackerConfig,
    hasher: RandomState,
    endpoints: Vec<Stripe<EndpointEntry>>,
    users: Vec<Stripe<UserStats>>,
    global: RwLock<GlobalState>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for PerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceTracker")
            .field("config", &self.config)
            .field("stripes", &STRIPES)
            .finish_non_exhaustive()
    }
}

impl PerformanceTracker {
    /// Creates a tracker that reports audit events to the log.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_audit(config, Arc::new(LogAuditSink))
    }

    /// Creates a tracker with a custom audit sink.
    pub fn with_audit(config: TrackerConfig, audit: Arc<dyn AuditSink>) -> Self {
        let config = config.normalized();
        Self {
            hasher: RandomState::new(),
            endpoints: (0..STRIPES).map(|_| RwLock::new(HashMap::new())).collect(),
            users: (0..STRIPES).map(|_| RwLock::new(HashMap::new())).collect(),
            global: RwLock::new(GlobalState::new(&config)),
            config,
            audit,
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn stripe<'a, T>(&self, stripes: &'a [Stripe<T>], key: &str) -> &'a Stripe<T> {
        let index = (self.hasher.hash_one(key) as usize) % stripes.len();
        &stripes[index]
    }

    /// Folds one request outcome into every aggregate view.
    pub fn track_request(&self, event: &RequestOutcomeEvent) {
        let discovered = self.update_endpoint(event);
        self.update_user(event);
        let transition = self.update_global(event, discovered);

        log::trace!(
            "Tracker: {} {} in {:?}",
            event.endpoint,
            if event.success { "ok" } else { "failed" },
            event.response_time
        );

        if discovered {
            log::debug!("Tracker: New endpoint '{}'.", event.endpoint);
        }
        if let Some((from, to, rate)) = transition {
            log::info!("Tracker: Success trend {} -> {} (recent {:.3}).", from, to, rate);
            self.audit.emit(
                AuditEvent::new("tracker", "trend_changed")
                    .with("from", from.as_str())
                    .with("to", to.as_str())
                    .with("recent_success_rate", rate),
            );
        }
    }

    /// Returns `true` if the endpoint was seen for the first time.
    fn update_endpoint(&self, event: &RequestOutcomeEvent) -> bool {
        let mut stripe = write(self.stripe(&self.endpoints, &event.endpoint));
        let mut discovered = false;
        let entry = stripe.entry(event.endpoint.clone()).or_insert_with(|| {
            discovered = true;
            EndpointEntry {
                stats: EndpointStats::new(
                    event.endpoint.clone(),
                    self.config.max_history_points,
                    event.timestamp,
                ),
                recent: RingBuffer::new(self.config.recent_window),
            }
        });

        let stats = &mut entry.stats;
        stats.total_requests += 1;
        if event.success {
            stats.successful_requests += 1;
        } else {
            stats.failed_requests += 1;
            if event.is_timeout() {
                stats.timeout_requests += 1;
            }
            let error_type = event.error_type.as_deref().unwrap_or(UNKNOWN_ERROR);
            *stats.error_breakdown.entry(error_type.to_string()).or_insert(0) += 1;
        }
        stats.success_rate = success_ratio(stats.successful_requests, stats.total_requests);
        stats.average_response_time = running_mean(
            stats.average_response_time,
            event.response_time,
            stats.total_requests,
        );
        stats.p95_response_time = stats.p95_response_time.max(event.response_time);
        stats.p99_response_time = stats.p99_response_time.max(event.response_time);
        if event.timestamp < stats.first_seen {
            stats.first_seen = event.timestamp;
        }
        if event.timestamp > stats.last_seen {
            stats.last_seen = event.timestamp;
        }
        stats.history.push(DataPoint {
            timestamp: event.timestamp,
            success_rate: stats.success_rate,
            response_time: event.response_time,
        });
        entry.recent.push(event.success);

        discovered
    }

    fn update_user(&self, event: &RequestOutcomeEvent) {
        let mut stripe = write(self.stripe(&self.users, &event.user_id));
        let user = stripe
            .entry(event.user_id.clone())
            .or_insert_with(|| UserStats::new(event.user_id.clone(), event.timestamp));

        user.total_requests += 1;
        if event.success {
            user.successful_requests += 1;
        } else {
            user.failed_requests += 1;
        }
        user.success_rate = success_ratio(user.successful_requests, user.total_requests);
        if user.endpoints.len() < UserStats::MAX_ENDPOINTS
            && !user.endpoints.iter().any(|e| e == &event.endpoint)
        {
            user.endpoints.push(event.endpoint.clone());
        }
        if event.timestamp < user.first_seen {
            user.first_seen = event.timestamp;
        }
        if event.timestamp > user.last_seen {
            user.last_seen = event.timestamp;
        }
    }

    /// Returns the trend transition, if the event changed it.
    fn update_global(
        &self,
        event: &RequestOutcomeEvent,
        discovered: bool,
    ) -> Option<(Trend, Trend, f64)> {
        let mut global = write(&self.global);
        let state = &mut *global;
        if discovered {
            state.known_endpoints += 1;
        }

        // Overall view.
        let overall = &mut state.overall;
        overall.total_requests += 1;
        if event.success {
            overall.successful_requests += 1;
        } else {
            overall.failed_requests += 1;
        }
        overall.overall_success_rate =
            success_ratio(overall.successful_requests, overall.total_requests);
        state.recent.push(event.success);
        overall.recent_success_rate = ring_success_rate(&state.recent);
        let outcome = if event.success { 1.0 } else { 0.0 };
        overall.trending_success_rate = if overall.total_requests == 1 {
            outcome
        } else {
            TRENDING_ALPHA * outcome + (1.0 - TRENDING_ALPHA) * overall.trending_success_rate
        };
        overall.health_score = health_score(
            overall.overall_success_rate,
            overall.failed_requests,
            overall.total_requests,
        );
        let previous_trend = overall.trend;
        overall.trend = classify_trend(overall.recent_success_rate, overall.overall_success_rate);
        overall.last_updated = Some(Utc::now());
        let transition = (previous_trend != overall.trend).then_some((
            previous_trend,
            overall.trend,
            overall.recent_success_rate,
        ));

        // Time-window view.
        let window_start = self.window_start(event.timestamp);
        let window = state
            .windows
            .entry(window_start)
            .or_insert_with(|| TimeWindowStats::new(window_start));
        window.total_requests += 1;
        if event.success {
            window.successful_requests += 1;
        } else {
            window.failed_requests += 1;
        }
        window.success_rate = success_ratio(window.successful_requests, window.total_requests);
        window.average_response_time = running_mean(
            window.average_response_time,
            event.response_time,
            window.total_requests,
        );
        window.peak_response_time = window.peak_response_time.max(event.response_time);
        while state.windows.len() > self.config.max_time_windows {
            state.windows.pop_first();
        }

        // Error taxonomy.
        if !event.success {
            let error_type = event.error_type.as_deref().unwrap_or(UNKNOWN_ERROR);
            let total = state.overall.total_requests;
            let known = state.known_endpoints.max(1);
            let entry = state
                .errors
                .entry(error_type.to_string())
                .or_insert_with(|| ErrorTypeStats::new(error_type, event.timestamp));
            entry.total_occurrences += 1;
            entry.affected_endpoints.insert(event.endpoint.clone());
            if event.timestamp > entry.last_seen {
                entry.last_seen = event.timestamp;
            }
            let frequency = entry.total_occurrences as f64 / total as f64 * 100.0;
            let breadth = entry.affected_endpoints.len() as f64 / known as f64 * 100.0;
            entry.impact_score = (frequency * IMPACT_FREQUENCY_WEIGHT
                + breadth * IMPACT_BREADTH_WEIGHT)
                .clamp(0.0, 100.0);
        }

        transition
    }

    fn window_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.config.tracking_window_secs.max(1) as i64;
        let secs = timestamp.timestamp();
        DateTime::from_timestamp(secs - secs.rem_euclid(width), 0).unwrap_or(timestamp)
    }

    /// Returns a copy of the endpoint's statistics.
    pub fn endpoint_stats(&self, endpoint: &str) -> Result<EndpointStats, TrackerError> {
        read(self.stripe(&self.endpoints, endpoint))
            .get(endpoint)
            .map(|e| e.stats.clone())
            .ok_or_else(|| TrackerError::EndpointNotFound(endpoint.to_string()))
    }

    /// Returns a copy of the user's statistics.
    pub fn user_stats(&self, user_id: &str) -> Result<UserStats, TrackerError> {
        read(self.stripe(&self.users, user_id))
            .get(user_id)
            .cloned()
            .ok_or_else(|| TrackerError::UserNotFound(user_id.to_string()))
    }

    /// Returns the overall and recent success rate of one endpoint.
    pub fn endpoint_success_rate(&self, endpoint: &str) -> Result<SuccessRateReport, TrackerError> {
        let stripe = read(self.stripe(&self.endpoints, endpoint));
        let entry = stripe
            .get(endpoint)
            .ok_or_else(|| TrackerError::EndpointNotFound(endpoint.to_string()))?;
        Ok(SuccessRateReport {
            endpoint: endpoint.to_string(),
            overall_success_rate: entry.stats.success_rate,
            recent_success_rate: ring_success_rate(&entry.recent),
            total_requests: entry.stats.total_requests,
            successful_requests: entry.stats.successful_requests,
        })
    }

    fn all_endpoints(&self) -> Vec<EndpointStats> {
        self.endpoints
            .iter()
            .flat_map(|stripe| {
                read(stripe)
                    .values()
                    .map(|e| e.stats.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Returns the `n` endpoints with the highest success rate, best first.
    ///
    /// `n == 0` returns the default of 10. Equal rates are ordered by name.
    pub fn top_performing_endpoints(&self, n: usize) -> Vec<EndpointStats> {
        let n = if n == 0 { DEFAULT_RANKING_SIZE } else { n };
        let mut all = self.all_endpoints();
        all.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        all.truncate(n);
        all
    }

    /// Returns the `n` endpoints with the lowest success rate, worst first.
    ///
    /// `n == 0` returns the default of 10. Equal rates are ordered by name.
    pub fn worst_performing_endpoints(&self, n: usize) -> Vec<EndpointStats> {
        let n = if n == 0 { DEFAULT_RANKING_SIZE } else { n };
        let mut all = self.all_endpoints();
        all.sort_by(|a, b| {
            a.success_rate
                .total_cmp(&b.success_rate)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        all.truncate(n);
        all
    }

    /// Returns every endpoint history point newer than `now - duration`, oldest first.
    pub fn success_rate_trend(&self, duration: Duration) -> Vec<DataPoint> {
        let cutoff = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut points: Vec<DataPoint> = self
            .endpoints
            .iter()
            .flat_map(|stripe| {
                read(stripe)
                    .values()
                    .flat_map(|e| e.stats.history.iter())
                    .filter(|p| p.timestamp > cutoff)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points
    }

    /// Latency percentiles and throughput over the trailing `window`.
    pub fn latency_summary(&self, window: Duration) -> LatencySummary {
        let points = self.success_rate_trend(window);
        if points.is_empty() {
            return LatencySummary::default();
        }
        let mut times: Vec<Duration> = points.iter().map(|p| p.response_time).collect();
        times.sort_unstable();
        let total: Duration = times.iter().sum();
        LatencySummary {
            average: total / times.len() as u32,
            p95: percentile(&times, 95.0),
            p99: percentile(&times, 99.0),
            requests_per_second: self.requests_in(window, Utc::now())
                / window.as_secs_f64().max(1.0),
        }
    }

    /// Requests counted by the time-window buckets overlapping `[now - window, now]`.
    ///
    /// A bucket that straddles the window start contributes in proportion to
    /// its elapsed span inside the window.
    fn requests_in(&self, window: Duration, now: DateTime<Utc>) -> f64 {
        let from = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let width = chrono::Duration::seconds(self.config.tracking_window_secs.max(1) as i64);
        read(&self.global)
            .windows
            .values()
            .map(|bucket| {
                let end = (bucket.window_start + width).min(now);
                if end <= from {
                    return 0.0;
                }
                let span = (end - bucket.window_start).num_milliseconds();
                let inside = (end - bucket.window_start.max(from)).num_milliseconds();
                if span <= 0 || inside >= span {
                    bucket.total_requests as f64
                } else {
                    bucket.total_requests as f64 * inside as f64 / span as f64
                }
            })
            .sum()
    }

    /// Returns a copy of the error taxonomy, keyed by error type.
    pub fn error_analysis(&self) -> HashMap<String, ErrorTypeStats> {
        read(&self.global).errors.clone()
    }

    /// Returns a copy of the system-wide statistics.
    pub fn overall_stats(&self) -> OverallStats {
        read(&self.global).overall.clone()
    }

    /// Returns the time-window buckets, oldest first.
    pub fn time_window_stats(&self) -> Vec<TimeWindowStats> {
        read(&self.global).windows.values().cloned().collect()
    }

    /// Number of distinct endpoints seen.
    pub fn endpoint_count(&self) -> usize {
        read(&self.global).known_endpoints
    }

    /// Number of distinct users seen.
    pub fn user_count(&self) -> usize {
        self.users.iter().map(|s| read(s).len()).sum()
    }

    /// Clears every aggregate.
    pub fn reset(&self) {
        let mut global = write(&self.global);
        for stripe in &self.endpoints {
            write(stripe).clear();
        }
        for stripe in &self.users {
            write(stripe).clear();
        }
        let dropped = global.overall.total_requests;
        *global = GlobalState::new(&self.config);
        drop(global);

        log::info!("Tracker: Reset ({} requests discarded).", dropped);
        self.audit
            .emit(AuditEvent::new("tracker", "reset").with("discarded_requests", dropped));
    }
}

impl SuccessRateProvider for PerformanceTracker {
    fn success_rates(&self) -> SuccessRates {
        let global = read(&self.global);
        SuccessRates {
            overall: global.overall.overall_success_rate,
            recent: global.overall.recent_success_rate,
        }
    }
}
