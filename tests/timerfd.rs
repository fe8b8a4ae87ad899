//! Timer fd behavior: one-shot ticks, repeat intervals and disarming.

use std::time::Duration;

use syscore::io::{MonitorFlags, Poller};
use syscore::time::{MONOTONIC, MonotonicTimerFd, TimeSpec, TimerSpec, TimerStartFlags};

#[test]
fn one_shot_fires_once() {
    let timer = MonotonicTimerFd::new().unwrap();
    let mut spec = TimerSpec::new();
    spec.initial = TimeSpec::from_duration(Duration::from_millis(200));
    timer.set_time(spec, TimerStartFlags::empty()).unwrap();

    assert_eq!(timer.wait().unwrap(), 1);

    // no further event shows up once the single tick was consumed
    let poller = Poller::new(4).unwrap();
    poller.add_fd(timer.fd(), MonitorFlags::INPUT).unwrap();
    let events = poller.wait(Some(Duration::from_millis(500))).unwrap();
    assert!(events.is_empty());
}

#[test]
fn interval_accumulates_ticks() {
    let timer = MonotonicTimerFd::new().unwrap();
    let mut spec = TimerSpec::new();
    spec.initial = TimeSpec::from_duration(Duration::from_millis(50));
    spec.interval = TimeSpec::from_duration(Duration::from_millis(100));
    timer.set_time(spec, TimerStartFlags::empty()).unwrap();

    MONOTONIC.sleep_for(Duration::from_millis(350)).unwrap();
    assert!(timer.wait().unwrap() >= 2);
}

#[test]
fn disarm_silences_the_timer() {
    let timer = MonotonicTimerFd::new().unwrap();
    let mut spec = TimerSpec::new();
    spec.initial = TimeSpec::from_duration(Duration::from_millis(50));
    spec.interval = TimeSpec::from_duration(Duration::from_millis(50));
    timer.set_time(spec, TimerStartFlags::empty()).unwrap();
    timer.wait().unwrap();

    timer.disarm().unwrap();
    let poller = Poller::new(4).unwrap();
    poller.add_fd(timer.fd(), MonitorFlags::INPUT).unwrap();
    let events = poller.wait(Some(Duration::from_millis(300))).unwrap();
    assert!(events.is_empty());
}

#[test]
fn absolute_start_time() {
    let timer = MonotonicTimerFd::new().unwrap();
    let mut spec = TimerSpec::new();
    spec.initial = MONOTONIC.now().unwrap().after(Duration::from_millis(100));
    timer.set_time(spec, TimerStartFlags::ABSTIME).unwrap();
    assert_eq!(timer.wait().unwrap(), 1);
}
