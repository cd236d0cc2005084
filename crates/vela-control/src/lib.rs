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

//! # Vela Control
//!
//! The closed loop: strategy selection, the optimization controller with its
//! background service, and the fine-grained tuning policy engine.

#![warn(missing_docs)]

pub mod analysis;
pub mod controller;
pub mod error;
pub mod service;
pub mod strategy;
pub mod tuning;

pub use analysis::{TriggerAnalyzer, TriggerReport};
pub use controller::{CycleOutcome, OptimizationController, REASON_DEGRADATION, REASON_MANUAL};
pub use error::{ControlError, TuningError};
pub use service::OptimizationService;
pub use strategy::{
    register_builtin, InMemoryKnobs, KnobController, RuntimeKnobs, StrategyRegistry,
};
pub use tuning::{ActionEvaluation, LearningHook, NoopLearning, TuningEngine};
