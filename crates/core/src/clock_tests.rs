// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{Clock, FakeClock};
use std::time::Duration;

#[test]
fn fake_clock_advances_monotonic_and_wall_together() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let w0 = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - t0, Duration::from_secs(90));
    assert_eq!((clock.now_utc() - w0).num_seconds(), 90);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(other.now(), clock.now());
}
