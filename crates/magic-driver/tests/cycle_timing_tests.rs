//! 周期时钟的长时间漂移测试

use magic_driver::{CycleClock, DriftPolicy};
use std::time::{Duration, Instant};

/// 1000 个 2ms 周期，总耗时与 1000·dt 的偏差不超过一个周期
#[test]
fn test_no_drift_over_thousand_ticks() {
    let dt = Duration::from_millis(2);
    let ticks = 1000u32;
    let mut clock = CycleClock::new(dt).with_policy(DriftPolicy::Accumulate);

    let first = clock.begin_cycle();
    let mut last_wake = first;
    for _ in 0..ticks {
        let start = clock.begin_cycle();
        // 模拟少量计算
        std::hint::black_box((0..200).sum::<u64>());
        let report = clock.wait_until_next(start, dt);
        assert_eq!(report.deadline, start + dt);
        last_wake = report.woke_at;
    }

    let expected = dt * ticks;
    let elapsed = last_wake.duration_since(first);
    let drift = if elapsed > expected {
        elapsed - expected
    } else {
        expected - elapsed
    };
    assert!(drift <= dt, "drift {:?} over {} ticks", drift, ticks);
    assert_eq!(clock.cycles(), u64::from(ticks));
}

/// 偶发长周期后，后续周期追回，总时长仍以绝对锚点计
#[test]
fn test_single_overrun_is_caught_up() {
    let dt = Duration::from_millis(2);
    let mut clock = CycleClock::new(dt);
    let first = clock.begin_cycle();

    let mut last_wake = first;
    for i in 0..100 {
        let start = clock.begin_cycle();
        if i == 10 {
            std::thread::sleep(Duration::from_millis(7));
        }
        last_wake = clock.wait_until_next(start, dt).woke_at;
    }

    let elapsed = last_wake.duration_since(first);
    assert!(elapsed >= dt * 100);
    assert!(elapsed <= dt * 101, "elapsed {:?}", elapsed);
    assert!(clock.overruns() >= 1);
}

#[test]
fn test_sleep_until_past_returns_immediately() {
    let clock = CycleClock::new(Duration::from_millis(2));
    let before = Instant::now();
    clock.sleep_until(before - Duration::from_millis(5));
    assert!(before.elapsed() < Duration::from_millis(1));
}
