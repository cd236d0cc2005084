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

//! Structured audit events emitted on state-changing operations.
//!
//! Emission is fire-and-forget: sinks never return errors and callers never
//! wait for acknowledgement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// A single field value attached to an [`AuditEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditValue {
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A string value.
    Text(String),
}

impl fmt::Display for AuditValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditValue::Int(v) => write!(f, "{v}"),
            AuditValue::Float(v) => write!(f, "{v:.4}"),
            AuditValue::Bool(v) => write!(f, "{v}"),
            AuditValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for AuditValue {
    fn from(v: i64) -> Self {
        AuditValue::Int(v)
    }
}

impl From<u64> for AuditValue {
    fn from(v: u64) -> Self {
        AuditValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for AuditValue {
    fn from(v: usize) -> Self {
        AuditValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for AuditValue {
    fn from(v: u32) -> Self {
        AuditValue::Int(i64::from(v))
    }
}

impl From<f64> for AuditValue {
    fn from(v: f64) -> Self {
        AuditValue::Float(v)
    }
}

impl From<bool> for AuditValue {
    fn from(v: bool) -> Self {
        AuditValue::Bool(v)
    }
}

impl From<&str> for AuditValue {
    fn from(v: &str) -> Self {
        AuditValue::Text(v.to_string())
    }
}

impl From<String> for AuditValue {
    fn from(v: String) -> Self {
        AuditValue::Text(v)
    }
}

/// A structured record of a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The component that changed state (e.g. "tracker", "controller").
    pub component: String,
    /// What happened (e.g. "optimization_applied").
    pub event_type: String,
    /// Numeric and string fields describing the change.
    pub fields: Vec<(String, AuditValue)>,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an event with no fields.
    pub fn new(component: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            event_type: event_type.into(),
            fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attaches a field, returning the modified event.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AuditValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Returns the value of the first field named `key`.
    pub fn field(&self, key: &str) -> Option<&AuditValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.event_type)?;
        for (key, value) in &self.fields {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    /// Records an event. Must not block for long and must not fail.
    fn emit(&self, event: AuditEvent);
}

/// Writes each event as one `log` record on the `vela::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn emit(&self, event: AuditEvent) {
        log::debug!(target: "vela::audit", "{event}");
    }
}

/// Keeps every event in memory, for publishers and tests.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Counts the recorded events of the given type.
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| ev.event_type == event_type).count())
            .unwrap_or(0)
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display_lists_fields() {
        let event = AuditEvent::new("controller", "optimization_applied")
            .with("strategy", "cache")
            .with("impact", 12.5)
            .with("count", 3u32);
        let line = event.to_string();
        assert!(line.starts_with("controller.optimization_applied"));
        assert!(line.contains("strategy=\"cache\""));
        assert!(line.contains("count=3"));
        assert_eq!(event.field("impact"), Some(&AuditValue::Float(12.5)));
    }

    #[test]
    fn test_recording_sink_counts_by_type() {
        let sink = RecordingAuditSink::new();
        sink.emit(AuditEvent::new("tracker", "reset"));
        sink.emit(AuditEvent::new("controller", "queue_full"));
        sink.emit(AuditEvent::new("controller", "queue_full"));
        assert_eq!(sink.count("queue_full"), 2);
        assert_eq!(sink.events().len(), 3);
    }
}
