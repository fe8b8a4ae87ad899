//! Clocks, time values and descriptor-based timers.

mod clock;
mod timer_fd;

pub use clock::{
    BOOT_TIME, BootTimeClock, Clock, ClockType, CoarseMonotonicClock, CoarseRealTimeClock,
    MONOTONIC, MonotonicClock, ProcessTimeClock, REAL_TIME, RawMonotonicClock, RealTimeClock,
    ThreadTimeClock, TimeSpec, TimerClock,
};
pub use timer_fd::{
    BootTimeTimerFd, MonotonicTimerFd, RealTimeTimerFd, TimerFd, TimerFdFlags, TimerSpec,
    TimerStartFlags,
};
