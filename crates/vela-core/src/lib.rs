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

//! # Vela Core
//!
//! Foundational crate containing the request events, read-model types, and
//! interface contracts shared by the tracker, the optimization controller and
//! the tuning engine.
//!
//! This crate defines the abstract "what": the concrete aggregation lives in
//! `vela-telemetry` and the closed-loop control lives in `vela-control`.

#![warn(missing_docs)]

pub mod audit;
pub mod config;
pub mod control;
pub mod ring;
pub mod telemetry;

pub use audit::{AuditEvent, AuditSink, AuditValue, LogAuditSink, RecordingAuditSink};
pub use config::{
    or_default, OptimizationConfig, OptimizationThresholds, TrackerConfig, TuningConfig,
};
pub use ring::RingBuffer;
