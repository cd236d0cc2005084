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

//! Aggregate read-models produced by the tracker.
//!
//! These are plain snapshots: the tracker owns and mutates the live copies,
//! callers always receive clones.

use crate::ring::RingBuffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

/// Qualitative direction of the success rate, comparing recent to overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Recent success rate is above the overall rate.
    Improving,
    /// Recent and overall rates are within the dead-band of each other.
    #[default]
    Stable,
    /// Recent success rate is below the overall rate.
    Degrading,
}

impl Trend {
    /// Returns the lowercase label used in logs and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Degrading => "degrading",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single point of an endpoint's success-rate history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Timestamp of the event that produced this point.
    pub timestamp: DateTime<Utc>,
    /// Endpoint success rate right after the event was folded in.
    pub success_rate: f64,
    /// Response time of the event.
    pub response_time: Duration,
}

/// Per-endpoint aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStats {
    /// The endpoint key.
    pub endpoint: String,
    /// Total requests observed.
    pub total_requests: u64,
    /// Requests that succeeded.
    pub successful_requests: u64,
    /// Requests that failed, timeouts included.
    pub failed_requests: u64,
    /// Failed requests whose error type was "timeout".
    pub timeout_requests: u64,
    /// `successful_requests / total_requests`.
    pub success_rate: f64,
    /// Mean response time over all requests.
    pub average_response_time: Duration,
    /// High-percentile response time, maintained as a running maximum.
    pub p95_response_time: Duration,
    /// High-percentile response time, maintained as a running maximum.
    pub p99_response_time: Duration,
    /// Failure count per error type.
    pub error_breakdown: HashMap<String, u64>,
    /// Bounded success-rate history, oldest first.
    pub history: RingBuffer<DataPoint>,
    /// Timestamp of the first event seen for this endpoint.
    pub first_seen: DateTime<Utc>,
    /// Timestamp of the latest event seen for this endpoint.
    pub last_seen: DateTime<Utc>,
}

impl EndpointStats {
    /// Creates empty statistics for an endpoint first seen at `seen_at`.
    pub fn new(endpoint: impl Into<String>, history_capacity: usize, seen_at: DateTime<Utc>) -> Self {
        Self {
            endpoint: endpoint.into(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            timeout_requests: 0,
            success_rate: 0.0,
            average_response_time: Duration::ZERO,
            p95_response_time: Duration::ZERO,
            p99_response_time: Duration::ZERO,
            error_breakdown: HashMap::new(),
            history: RingBuffer::new(history_capacity),
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }
}

/// Per-user aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// The user key.
    pub user_id: String,
    /// Total requests issued by the user.
    pub total_requests: u64,
    /// Requests that succeeded.
    pub successful_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// `successful_requests / total_requests`.
    pub success_rate: f64,
    /// Distinct endpoints touched, first-come-first-kept, capped at [`UserStats::MAX_ENDPOINTS`].
    pub endpoints: Vec<String>,
    /// Timestamp of the user's first event.
    pub first_seen: DateTime<Utc>,
    /// Timestamp of the user's latest event.
    pub last_seen: DateTime<Utc>,
}

impl UserStats {
    /// Maximum number of distinct endpoints remembered per user.
    pub const MAX_ENDPOINTS: usize = 10;

    /// Creates empty statistics for a user first seen at `seen_at`.
    pub fn new(user_id: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            success_rate: 0.0,
            endpoints: Vec::new(),
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }
}

/// Counters for one tracking-window bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindowStats {
    /// Start of the bucket (event timestamp truncated to the tracking window).
    pub window_start: DateTime<Utc>,
    /// Total requests in the bucket.
    pub total_requests: u64,
    /// Requests that succeeded.
    pub successful_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// `successful_requests / total_requests`.
    pub success_rate: f64,
    /// Mean response time within the bucket.
    pub average_response_time: Duration,
    /// Largest response time observed within the bucket.
    pub peak_response_time: Duration,
}

impl TimeWindowStats {
    /// Creates an empty bucket starting at `window_start`.
    pub fn new(window_start: DateTime<Utc>) -> Self {
        Self {
            window_start,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            success_rate: 0.0,
            average_response_time: Duration::ZERO,
            peak_response_time: Duration::ZERO,
        }
    }
}

/// Aggregate statistics for a single error category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorTypeStats {
    /// The error category.
    pub error_type: String,
    /// Number of failures of this category.
    pub total_occurrences: u64,
    /// Endpoints on which this category was observed.
    pub affected_endpoints: BTreeSet<String>,
    /// 0–100 score combining frequency and breadth.
    pub impact_score: f64,
    /// Timestamp of the first occurrence.
    pub first_seen: DateTime<Utc>,
    /// Timestamp of the latest occurrence.
    pub last_seen: DateTime<Utc>,
}

impl ErrorTypeStats {
    /// Creates an empty entry for an error category first seen at `seen_at`.
    pub fn new(error_type: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            error_type: error_type.into(),
            total_occurrences: 0,
            affected_endpoints: BTreeSet::new(),
            impact_score: 0.0,
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }
}

/// System-wide aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    /// Total requests observed.
    pub total_requests: u64,
    /// Requests that succeeded.
    pub successful_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// `successful_requests / total_requests` over the tracker's lifetime.
    pub overall_success_rate: f64,
    /// Success rate over the most recent outcomes.
    pub recent_success_rate: f64,
    /// Exponentially smoothed success rate.
    pub trending_success_rate: f64,
    /// 0–100 composite health score.
    pub health_score: f64,
    /// Direction of recent versus overall success rate.
    pub trend: Trend,
    /// When the aggregate was last updated, if ever.
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for OverallStats {
    /// An idle system has observed no failures: rates start at 1.0 and health at 100.
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            overall_success_rate: 1.0,
            recent_success_rate: 1.0,
            trending_success_rate: 1.0,
            health_score: 100.0,
            trend: Trend::Stable,
            last_updated: None,
        }
    }
}

/// Success-rate summary for a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRateReport {
    /// The endpoint key.
    pub endpoint: String,
    /// Lifetime success rate of the endpoint.
    pub overall_success_rate: f64,
    /// Success rate over the endpoint's most recent outcomes.
    pub recent_success_rate: f64,
    /// Total requests observed.
    pub total_requests: u64,
    /// Requests that succeeded.
    pub successful_requests: u64,
}
