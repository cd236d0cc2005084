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

//! The tuning policy engine.
//!
//! Where the controller applies one coarse strategy at a time, the engine
//! derives a session of small, reversible per-category actions from a
//! policy and walks through them one by one.

pub mod policy;

use crate::error::TuningError;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;
use vela_core::control::{
    ActionStatus, PolicyKind, SessionStatus, TuningAction, TuningCategory, TuningPolicy,
    TuningSession, TuningValue,
};
use vela_core::telemetry::PerformanceMetrics;
use vela_core::{AuditEvent, AuditSink, LogAuditSink, TuningConfig};

const AUDIT_COMPONENT: &str = "tuning";

/// Receives the measured outcome of tuning actions.
///
/// Implementations may learn better step sizes over time. The engine calls
/// the hook inline, so it must return quickly.
pub trait LearningHook: Send + Sync {
    /// Called after an action has been evaluated.
    fn observe(&self, session: &TuningSession, action: &TuningAction, improvement: f64);
}

/// A hook that ignores every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLearning;

impl LearningHook for NoopLearning {
    fn observe(&self, _session: &TuningSession, _action: &TuningAction, _improvement: f64) {}
}

/// Result of [`TuningEngine::evaluate_action`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActionEvaluation {
    /// Improvement (percent) of the after-metrics over the before-metrics.
    pub improvement: f64,
    /// `true` if the action was reverted for exceeding its degradation budget.
    pub rolled_back: bool,
}

/// Creates and runs tuning sessions.
pub struct TuningEngine {
    config: TuningConfig,
    policies: Vec<TuningPolicy>,
    sessions: Mutex<Vec<TuningSession>>,
    learning: Arc<dyn LearningHook>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for TuningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuningEngine")
            .field("config", &self.config)
            .field("sessions", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl TuningEngine {
    /// Creates an engine with the built-in catalog and no learning.
    pub fn new(config: TuningConfig) -> Self {
        Self::with_hooks(config, Arc::new(NoopLearning), Arc::new(LogAuditSink))
    }

    /// Creates an engine with a learning hook and an audit sink.
    pub fn with_hooks(
        config: TuningConfig,
        learning: Arc<dyn LearningHook>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config: config.normalized(),
            policies: policy::catalog(),
            sessions: Mutex::new(Vec::new()),
            learning,
            audit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TuningSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The normalized configuration.
    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// The policy catalog, from conservative to aggressive.
    pub fn policies(&self) -> &[TuningPolicy] {
        &self.policies
    }

    /// Returns the catalog entry of a kind.
    pub fn policy(&self, kind: PolicyKind) -> &TuningPolicy {
        // The catalog holds one policy per kind in declaration order.
        &self.policies[kind as usize]
    }

    fn response_time_ratio(&self, metrics: &PerformanceMetrics) -> f64 {
        metrics.average_response_time.as_secs_f64()
            / self.config.expected_response_time().as_secs_f64()
    }

    /// Chooses a policy from how far response time is off its expectation.
    pub fn select_tuning_policy(&self, metrics: &PerformanceMetrics) -> &TuningPolicy {
        self.policy(policy::kind_for_ratio(self.response_time_ratio(metrics)))
    }

    /// Returns `true` if the metrics justify a tuning session.
    ///
    /// Response time beyond the safety margin triggers on its own; success
    /// and error rates are checked against the selected policy's limits.
    pub fn should_tune(&self, metrics: &PerformanceMetrics) -> bool {
        if self.response_time_ratio(metrics) > 1.0 + self.config.safety_margin {
            return true;
        }
        let safety = &self.select_tuning_policy(metrics).safety;
        metrics.success_rate < safety.min_success_rate || metrics.error_rate > safety.max_error_rate
    }

    /// Creates a session from the selected policy when tuning is warranted.
    pub fn tune(&self, metrics: &PerformanceMetrics) -> Option<TuningSession> {
        if !self.should_tune(metrics) {
            return None;
        }
        let kind = self.select_tuning_policy(metrics).kind;
        Some(self.create_tuning_session(kind, metrics))
    }

    fn plan_actions(&self, policy: &TuningPolicy, metrics: &PerformanceMetrics) -> Vec<TuningAction> {
        let mut actions = Vec::new();
        let safety = &policy.safety;

        let current = metrics.average_response_time;
        let expected = self.config.expected_response_time();
        let rt = &policy.response_time;
        if current.as_secs_f64() > expected.as_secs_f64() * (1.0 + rt.target_improvement) {
            let target = scale(current, 1.0 - rt.adjustment_step)
                .clamp(safety.min_response_time, safety.max_response_time);
            actions.push(TuningAction::new(
                TuningCategory::ResponseTime,
                "optimize_response_time",
                format!(
                    "Reduce response time from {}ms to {}ms",
                    current.as_millis(),
                    target.as_millis()
                ),
                TuningValue::Latency(current),
                TuningValue::Latency(target),
            ));
        }

        let rps = metrics.requests_per_second;
        if rps < self.config.expected_throughput {
            let target = rps * (1.0 + policy.throughput.adjustment_step);
            actions.push(TuningAction::new(
                TuningCategory::Throughput,
                "increase_throughput",
                format!("Increase throughput from {rps:.1}/s to {target:.1}/s"),
                TuningValue::PerSecond(rps),
                TuningValue::PerSecond(target),
            ));
        }

        let resource = &policy.resource;
        for (category, action_type, label, usage, ceiling) in [
            (
                TuningCategory::CpuOptimization,
                "reduce_cpu_usage",
                "CPU",
                metrics.cpu_usage,
                safety.max_cpu_usage,
            ),
            (
                TuningCategory::MemoryOptimization,
                "reduce_memory_usage",
                "memory",
                metrics.memory_usage,
                safety.max_memory_usage,
            ),
        ] {
            if usage > ceiling * (1.0 - resource.target_improvement) {
                let target = (usage * (1.0 - resource.adjustment_step)).min(ceiling);
                actions.push(TuningAction::new(
                    category,
                    action_type,
                    format!("Reduce {label} usage from {usage:.1}% to {target:.1}%"),
                    TuningValue::Percent(usage),
                    TuningValue::Percent(target),
                ));
            }
        }
        actions
    }

    /// Creates and stores an active session for the policy.
    pub fn create_tuning_session(
        &self,
        kind: PolicyKind,
        metrics: &PerformanceMetrics,
    ) -> TuningSession {
        let policy = self.policy(kind);
        let session = TuningSession::new(policy, metrics.clone(), self.plan_actions(policy, metrics));
        log::info!(
            "Tuning: Session {} created with {} policy, {} action(s).",
            session.id,
            policy.name(),
            session.actions.len()
        );
        self.audit.emit(
            AuditEvent::new(AUDIT_COMPONENT, "session_created")
                .with("id", session.id.to_string())
                .with("policy", policy.name())
                .with("actions", session.actions.len()),
        );

        let mut sessions = self.lock();
        if sessions.len() >= self.config.max_sessions {
            let evict = sessions
                .iter()
                .position(|s| s.status != SessionStatus::Active)
                .unwrap_or(0);
            let evicted = sessions.remove(evict);
            log::debug!("Tuning: Evicted session {}.", evicted.id);
        }
        sessions.push(session.clone());
        session
    }

    /// Appends a host-supplied action to an active session.
    pub fn push_action(&self, session_id: Uuid, action: TuningAction) -> Result<(), TuningError> {
        let mut sessions = self.lock();
        let session = find(&mut sessions, session_id)?;
        if session.status != SessionStatus::Active {
            return Err(TuningError::SessionNotActive(session_id));
        }
        session.actions.push(action);
        session.refresh_next_action();
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Executes one action of an active session.
    ///
    /// Frequency actions are refused, as are values outside the policy's
    /// safety limits; either way the action is marked failed. The session
    /// completes once no action is pending.
    pub fn execute_action(
        &self,
        session_id: Uuid,
        action_id: Uuid,
    ) -> Result<TuningAction, TuningError> {
        let mut sessions = self.lock();
        let session = find(&mut sessions, session_id)?;
        if session.status != SessionStatus::Active {
            return Err(TuningError::SessionNotActive(session_id));
        }
        let policy = self.policy(session.policy);
        let action = session
            .action_mut(action_id)
            .ok_or(TuningError::ActionNotFound(action_id))?;

        let verdict = if action.category.is_executable() {
            check_safety(policy, action)
        } else {
            Err(TuningError::UnsupportedCategory(action.category))
        };
        let now = Utc::now();
        match &verdict {
            Ok(()) => {
                action.status = ActionStatus::Executed;
                action.executed_at = Some(now);
            }
            Err(_) => action.status = ActionStatus::Failed,
        }
        let executed = action.clone();

        session.refresh_next_action();
        session.updated_at = now;
        if session.pending_actions() == 0 {
            session.status = SessionStatus::Completed;
            log::info!("Tuning: Session {} completed.", session.id);
        }
        drop(sessions);

        match verdict {
            Ok(()) => {
                log::info!("Tuning: Executed {}.", executed.description);
                self.audit.emit(
                    AuditEvent::new(AUDIT_COMPONENT, "action_executed")
                        .with("session", session_id.to_string())
                        .with("category", executed.category.as_str())
                        .with("value", executed.new_value.to_string()),
                );
                Ok(executed)
            }
            Err(e) => {
                log::warn!("Tuning: Refused {}: {}", executed.description, e);
                self.audit.emit(
                    AuditEvent::new(AUDIT_COMPONENT, "action_failed")
                        .with("session", session_id.to_string())
                        .with("error", e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Executes the session's next pending action, if any.
    pub fn execute_next_action(&self, session_id: Uuid) -> Result<Option<TuningAction>, TuningError> {
        let next = {
            let mut sessions = self.lock();
            let session = find(&mut sessions, session_id)?;
            if session.status != SessionStatus::Active {
                return Err(TuningError::SessionNotActive(session_id));
            }
            session.next_action.map(|i| session.actions[i].id)
        };
        next.map(|action_id| self.execute_action(session_id, action_id))
            .transpose()
    }

    /// Reverses an action's values.
    ///
    /// Reversing twice restores the action, including its status.
    pub fn rollback_action(
        &self,
        session_id: Uuid,
        action_id: Uuid,
    ) -> Result<TuningAction, TuningError> {
        let mut sessions = self.lock();
        let session = find(&mut sessions, session_id)?;
        let action = session
            .action_mut(action_id)
            .ok_or(TuningError::ActionNotFound(action_id))?;
        reverse(action);
        let reversed = action.clone();
        session.updated_at = Utc::now();
        drop(sessions);

        log::info!("Tuning: {}.", reversed.description);
        self.audit.emit(
            AuditEvent::new(AUDIT_COMPONENT, "action_rolled_back")
                .with("session", session_id.to_string())
                .with("rolled_back", reversed.rolled_back),
        );
        Ok(reversed)
    }

    /// Reverses every executed action, newest first, and closes the session.
    ///
    /// Returns the number of actions reversed.
    pub fn rollback_session(&self, session_id: Uuid) -> Result<usize, TuningError> {
        let mut sessions = self.lock();
        let session = find(&mut sessions, session_id)?;
        let mut reversed = 0;
        for action in session.actions.iter_mut().rev() {
            if action.status == ActionStatus::Executed {
                reverse(action);
                reversed += 1;
            }
        }
        session.status = SessionStatus::RolledBack;
        session.next_action = None;
        session.updated_at = Utc::now();
        drop(sessions);

        log::warn!("Tuning: Session {} rolled back ({} action(s)).", session_id, reversed);
        self.audit.emit(
            AuditEvent::new(AUDIT_COMPONENT, "session_rolled_back")
                .with("id", session_id.to_string())
                .with("actions", reversed),
        );
        Ok(reversed)
    }

    /// Stops an active session; its pending actions are never executed.
    pub fn cancel_session(&self, session_id: Uuid) -> Result<(), TuningError> {
        let mut sessions = self.lock();
        let session = find(&mut sessions, session_id)?;
        if session.status != SessionStatus::Active {
            return Err(TuningError::SessionNotActive(session_id));
        }
        session.status = SessionStatus::Cancelled;
        session.updated_at = Utc::now();
        drop(sessions);

        log::info!("Tuning: Session {} cancelled.", session_id);
        self.audit.emit(
            AuditEvent::new(AUDIT_COMPONENT, "session_cancelled").with("id", session_id.to_string()),
        );
        Ok(())
    }

    /// Percentage improvement of `after` over `before`.
    pub fn calculate_improvement(
        &self,
        before: &PerformanceMetrics,
        after: &PerformanceMetrics,
    ) -> f64 {
        after.improvement_over(before)
    }

    /// Measures an executed action and reverts it when it degraded
    /// performance beyond its category's budget.
    pub fn evaluate_action(
        &self,
        session_id: Uuid,
        action_id: Uuid,
        before: &PerformanceMetrics,
        after: &PerformanceMetrics,
    ) -> Result<ActionEvaluation, TuningError> {
        let improvement = self.calculate_improvement(before, after);
        let (session, action) = {
            let mut sessions = self.lock();
            let session = find(&mut sessions, session_id)?;
            let action = session
                .action_mut(action_id)
                .ok_or(TuningError::ActionNotFound(action_id))?
                .clone();
            (session.clone(), action)
        };
        self.learning.observe(&session, &action, improvement);

        let budget = self
            .policy(session.policy)
            .parameters_for(action.category)
            .max_degradation
            * 100.0;
        let rolled_back = action.status == ActionStatus::Executed && improvement < -budget;
        if rolled_back {
            log::warn!(
                "Tuning: {} degraded performance by {:.1}% (budget {:.1}%).",
                action.action_type,
                -improvement,
                budget
            );
            self.rollback_action(session_id, action_id)?;
        }
        Ok(ActionEvaluation {
            improvement,
            rolled_back,
        })
    }

    /// Copies of every retained session, oldest first.
    pub fn sessions(&self) -> Vec<TuningSession> {
        self.lock().clone()
    }

    /// Copy of one session.
    pub fn session(&self, session_id: Uuid) -> Result<TuningSession, TuningError> {
        self.lock()
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or(TuningError::SessionNotFound(session_id))
    }

    /// Number of sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.lock()
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }
}

fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::from_nanos((duration.as_nanos() as f64 * factor).round().max(0.0) as u64)
}

fn find(sessions: &mut [TuningSession], id: Uuid) -> Result<&mut TuningSession, TuningError> {
    sessions
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or(TuningError::SessionNotFound(id))
}

fn reverse(action: &mut TuningAction) {
    let was = action.status;
    action.reverse();
    action.status = match (was, action.rolled_back) {
        (ActionStatus::Executed, true) => ActionStatus::RolledBack,
        (ActionStatus::RolledBack, false) => ActionStatus::Executed,
        (status, _) => status,
    };
}

fn check_safety(policy: &TuningPolicy, action: &TuningAction) -> Result<(), TuningError> {
    let safety = &policy.safety;
    let violation = |limit: String| TuningError::SafetyLimitViolation {
        category: action.category,
        value: action.new_value.to_string(),
        limit,
    };
    match (action.category, action.new_value) {
        (TuningCategory::ResponseTime, TuningValue::Latency(d)) => {
            if d < safety.min_response_time || d > safety.max_response_time {
                return Err(violation(format!(
                    "{}ms..{}ms",
                    safety.min_response_time.as_millis(),
                    safety.max_response_time.as_millis()
                )));
            }
        }
        (TuningCategory::Throughput, TuningValue::PerSecond(r)) => {
            if r.is_nan() || r < 0.0 {
                return Err(violation(">= 0/s".to_string()));
            }
        }
        (TuningCategory::CpuOptimization, TuningValue::Percent(p)) => {
            if p > safety.max_cpu_usage {
                return Err(violation(format!("{:.1}%", safety.max_cpu_usage)));
            }
        }
        (TuningCategory::MemoryOptimization, TuningValue::Percent(p)) => {
            if p > safety.max_memory_usage {
                return Err(violation(format!("{:.1}%", safety.max_memory_usage)));
            }
        }
        _ => return Err(violation("matching unit".to_string())),
    }
    Ok(())
}
