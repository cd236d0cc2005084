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

//! Provides the foundational data structures for performance telemetry.
//!
//! This module defines the "common language" between request-handling code,
//! the aggregation tracker and the optimization controller: the per-request
//! outcome event, the aggregate read-models, and the point-in-time
//! performance snapshot pulled from external providers.

pub mod event;
pub mod metrics;
pub mod stats;

pub use self::event::RequestOutcomeEvent;
pub use self::metrics::{
    ApplicationGauges, GaugeValues, PerformanceMetrics, PerformanceSnapshot, ProviderError,
    ResourceSnapshot, SnapshotProvider, SuccessRateProvider, SuccessRates,
};
pub use self::stats::{
    DataPoint, EndpointStats, ErrorTypeStats, OverallStats, SuccessRateReport, TimeWindowStats,
    Trend, UserStats,
};
