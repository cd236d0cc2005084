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

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;
use vela_core::telemetry::RequestOutcomeEvent;
use vela_core::TrackerConfig;
use vela_telemetry::PerformanceTracker;

fn bench_track_request(c: &mut Criterion) {
    let tracker = PerformanceTracker::new(TrackerConfig::default());
    let events: Vec<RequestOutcomeEvent> = (0..1_000)
        .map(|i| {
            let endpoint = format!("/api/resource/{}", i % 50);
            let user = format!("user-{}", i % 200);
            if i % 10 == 0 {
                RequestOutcomeEvent::failure(endpoint, user, "timeout", Duration::from_millis(900))
            } else {
                RequestOutcomeEvent::success(endpoint, user, Duration::from_millis(40 + i % 60))
            }
        })
        .collect();

    let mut group = c.benchmark_group("Tracker");

    group.bench_function("track_request (50 endpoints, 200 users)", |b| {
        let mut i = 0;
        b.iter(|| {
            tracker.track_request(black_box(&events[i % events.len()]));
            i += 1;
        });
    });

    group.bench_function("top_performing_endpoints(10)", |b| {
        b.iter(|| black_box(tracker.top_performing_endpoints(10)));
    });

    group.finish();
}

criterion_group!(benches, bench_track_request);
criterion_main!(benches);
