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

//! The per-request outcome event pushed in by request-handling code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The outcome of a single handled request.
///
/// Events are immutable inputs: the tracker folds them into its aggregates and
/// never stores them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcomeEvent {
    /// The endpoint that served the request (e.g. "/api/orders").
    pub endpoint: String,
    /// The user on whose behalf the request ran.
    pub user_id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// The error category for failed requests (e.g. "timeout", "validation").
    pub error_type: Option<String>,
    /// Time taken to serve the request.
    pub response_time: Duration,
    /// Payload size in bytes.
    pub data_size: u64,
    /// When the request completed.
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcomeEvent {
    /// Creates a successful outcome stamped with the current time.
    pub fn success(
        endpoint: impl Into<String>,
        user_id: impl Into<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user_id: user_id.into(),
            success: true,
            error_type: None,
            response_time,
            data_size: 0,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed outcome with the given error category, stamped with the current time.
    pub fn failure(
        endpoint: impl Into<String>,
        user_id: impl Into<String>,
        error_type: impl Into<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user_id: user_id.into(),
            success: false,
            error_type: Some(error_type.into()),
            response_time,
            data_size: 0,
            timestamp: Utc::now(),
        }
    }

    /// Sets the payload size, returning the modified event.
    pub fn with_data_size(mut self, data_size: u64) -> Self {
        self.data_size = data_size;
        self
    }

    /// Overrides the completion timestamp, returning the modified event.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns `true` if this failure was classified as a timeout.
    pub fn is_timeout(&self) -> bool {
        !self.success && self.error_type.as_deref() == Some("timeout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_error_type() {
        let event = RequestOutcomeEvent::failure("/a", "u1", "timeout", Duration::from_millis(30));
        assert!(!event.success);
        assert!(event.is_timeout());
        assert_eq!(event.error_type.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_success_is_never_a_timeout() {
        let event = RequestOutcomeEvent::success("/a", "u1", Duration::from_millis(30))
            .with_data_size(512);
        assert!(!event.is_timeout());
        assert_eq!(event.data_size, 512);
    }
}
