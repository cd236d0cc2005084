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

use approx::assert_relative_eq;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vela_core::telemetry::RequestOutcomeEvent;
use vela_core::TrackerConfig;
use vela_telemetry::PerformanceTracker;

fn ok(endpoint: &str) -> RequestOutcomeEvent {
    RequestOutcomeEvent::success(endpoint, "user", Duration::from_millis(25))
}

fn failed(endpoint: &str, error_type: &str) -> RequestOutcomeEvent {
    RequestOutcomeEvent::failure(endpoint, "user", error_type, Duration::from_millis(250))
}

#[test]
fn test_endpoint_success_rate_is_exact_ratio() {
    let tracker = PerformanceTracker::new(TrackerConfig::default());
    let (n, k) = (37u64, 29u64);
    for i in 0..n {
        if i < k {
            tracker.track_request(&ok("/orders"));
        } else {
            tracker.track_request(&failed("/orders", "validation"));
        }
    }

    let report = tracker.endpoint_success_rate("/orders").unwrap();
    assert_eq!(report.overall_success_rate, k as f64 / n as f64);
    assert_eq!(report.total_requests, n);
    assert_eq!(report.successful_requests, k);
}

#[test]
fn test_top_and_worst_rankings() {
    let tracker = PerformanceTracker::new(TrackerConfig::default());
    // Five endpoints with success rates 0.9, 0.7, 0.5, 0.3, 0.1.
    for (endpoint, successes) in [("/a", 9), ("/b", 7), ("/c", 5), ("/d", 3), ("/e", 1)] {
        for i in 0..10 {
            if i < successes {
                tracker.track_request(&ok(endpoint));
            } else {
                tracker.track_request(&failed(endpoint, "database"));
            }
        }
    }

    let top: Vec<String> = tracker
        .top_performing_endpoints(3)
        .into_iter()
        .map(|s| s.endpoint)
        .collect();
    assert_eq!(top, vec!["/a", "/b", "/c"]);

    let worst: Vec<String> = tracker
        .worst_performing_endpoints(3)
        .into_iter()
        .map(|s| s.endpoint)
        .collect();
    assert_eq!(worst, vec!["/e", "/d", "/c"]);

    // A non-positive size falls back to the default of ten.
    assert_eq!(tracker.top_performing_endpoints(0).len(), 5);
}

#[test]
fn test_rankings_break_ties_by_name() {
    let tracker = PerformanceTracker::new(TrackerConfig::default());
    for endpoint in ["/zeta", "/alpha", "/mid"] {
        tracker.track_request(&ok(endpoint));
    }
    let top: Vec<String> = tracker
        .top_performing_endpoints(3)
        .into_iter()
        .map(|s| s.endpoint)
        .collect();
    assert_eq!(top, vec!["/alpha", "/mid", "/zeta"]);
}

#[test]
fn test_error_type_aggregation() {
    let tracker = PerformanceTracker::new(TrackerConfig::default());
    tracker.track_request(&failed("/login", "timeout"));
    tracker.track_request(&failed("/search", "timeout"));
    tracker.track_request(&failed("/signup", "validation"));
    tracker.track_request(&failed("/report", "database"));

    let errors = tracker.error_analysis();
    assert_eq!(errors.len(), 3);
    let timeout = &errors["timeout"];
    assert_eq!(timeout.total_occurrences, 2);
    assert_eq!(timeout.affected_endpoints.len(), 2);
    // Scored at its last occurrence: 2/2 requests on 2/2 known endpoints.
    assert_relative_eq!(timeout.impact_score, 100.0, epsilon = 1e-9);
    // 1/4 requests on 1/4 endpoints.
    assert_relative_eq!(errors["database"].impact_score, 25.0, epsilon = 1e-9);
}

#[test]
fn test_success_rate_trend_is_sorted_and_windowed() {
    let tracker = PerformanceTracker::new(TrackerConfig::default());
    let old = chrono::Utc::now() - chrono::Duration::hours(2);
    tracker.track_request(&ok("/a").at(old));
    tracker.track_request(&ok("/b"));
    tracker.track_request(&failed("/a", "timeout"));

    let points = tracker.success_rate_trend(Duration::from_secs(3600));
    assert_eq!(points.len(), 2);
    assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_concurrent_producers_lose_no_updates() {
    let tracker = Arc::new(PerformanceTracker::new(TrackerConfig::default()));
    let handles: Vec<_> = (0..10)
        .map(|producer| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..100 {
                    let endpoint = format!("/p{}", i % 7);
                    let user = format!("user-{producer}");
                    let event = if i % 10 == 0 {
                        RequestOutcomeEvent::failure(
                            endpoint,
                            user,
                            "timeout",
                            Duration::from_millis(500),
                        )
                    } else {
                        RequestOutcomeEvent::success(endpoint, user, Duration::from_millis(20))
                    };
                    tracker.track_request(&event);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let overall = tracker.overall_stats();
    assert_eq!(overall.total_requests, 1000);
    assert_eq!(overall.successful_requests, 900);
    assert_eq!(overall.failed_requests, 100);

    let per_endpoint: u64 = tracker
        .top_performing_endpoints(10)
        .iter()
        .map(|s| s.total_requests)
        .sum();
    assert_eq!(per_endpoint, 1000);
    assert_eq!(tracker.user_count(), 10);
    assert_eq!(tracker.error_analysis()["timeout"].total_occurrences, 100);
}
