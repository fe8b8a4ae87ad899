//! Strongly typed clocks and time values.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::time::Duration;

use crate::error::{Errno, Error, Result};

/// A marker type naming one of the kernel's clocks.
pub trait ClockType: Copy + Default {
    /// The raw clock id for `clock_*` system calls.
    const ID: libc::clockid_t;
}

/// A clock that may back a [`TimerFd`](crate::time::TimerFd).
pub trait TimerClock: ClockType {}

macro_rules! clock_marker {
    ($(#[$doc:meta])* $name:ident, $id:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl ClockType for $name {
            const ID: libc::clockid_t = $id;
        }
    };
}

clock_marker!(
    /// The settable wall-clock time.
    RealTimeClock, libc::CLOCK_REALTIME);
clock_marker!(
    /// A faster, less precise variant of the wall clock.
    CoarseRealTimeClock, libc::CLOCK_REALTIME_COARSE);
clock_marker!(
    /// A monotonically increasing clock unaffected by wall-clock jumps.
    MonotonicClock, libc::CLOCK_MONOTONIC);
clock_marker!(
    /// A faster, less precise variant of the monotonic clock.
    CoarseMonotonicClock, libc::CLOCK_MONOTONIC_COARSE);
clock_marker!(
    /// The monotonic clock without NTP frequency adjustments.
    RawMonotonicClock, libc::CLOCK_MONOTONIC_RAW);
clock_marker!(
    /// Like the monotonic clock but also counting suspend time.
    BootTimeClock, libc::CLOCK_BOOTTIME);
clock_marker!(
    /// CPU time consumed by the calling process.
    ProcessTimeClock, libc::CLOCK_PROCESS_CPUTIME_ID);
clock_marker!(
    /// CPU time consumed by the calling thread.
    ThreadTimeClock, libc::CLOCK_THREAD_CPUTIME_ID);

impl TimerClock for RealTimeClock {}
impl TimerClock for MonotonicClock {}
impl TimerClock for BootTimeClock {}

/// A point in time (or a duration) measured against the clock `C`.
///
/// The phantom clock parameter prevents e.g. comparing a monotonic reading
/// against a wall-clock deadline.
#[derive(Clone, Copy)]
pub struct TimeSpec<C: ClockType> {
    raw: libc::timespec,
    _clock: PhantomData<C>,
}

impl<C: ClockType> TimeSpec<C> {
    pub const fn new(seconds: i64, nanoseconds: i64) -> Self {
        TimeSpec {
            raw: libc::timespec {
                tv_sec: seconds as libc::time_t,
                tv_nsec: nanoseconds as libc::c_long,
            },
            _clock: PhantomData,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn from_raw(raw: libc::timespec) -> Self {
        TimeSpec {
            raw,
            _clock: PhantomData,
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::new(duration.as_secs() as i64, duration.subsec_nanos() as i64)
    }

    pub fn seconds(&self) -> i64 {
        self.raw.tv_sec as i64
    }

    pub fn nanoseconds(&self) -> i64 {
        self.raw.tv_nsec as i64
    }

    pub fn is_zero(&self) -> bool {
        self.raw.tv_sec == 0 && self.raw.tv_nsec == 0
    }

    /// The value as a `Duration`; negative times saturate to zero.
    pub fn as_duration(&self) -> Duration {
        if self.raw.tv_sec < 0 {
            return Duration::ZERO;
        }
        Duration::new(self.raw.tv_sec as u64, self.raw.tv_nsec as u32)
    }

    pub fn raw(&self) -> &libc::timespec {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut libc::timespec {
        &mut self.raw
    }

    /// The time advanced by `duration`.
    pub fn after(&self, duration: Duration) -> Self {
        let mut sec = self.raw.tv_sec + duration.as_secs() as i64;
        let mut nsec = self.raw.tv_nsec + duration.subsec_nanos() as i64;
        if nsec >= 1_000_000_000 {
            sec += 1;
            nsec -= 1_000_000_000;
        }
        Self::new(sec, nsec)
    }
}

impl<C: ClockType> Default for TimeSpec<C> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<C: ClockType> PartialEq for TimeSpec<C> {
    fn eq(&self, other: &Self) -> bool {
        self.raw.tv_sec == other.raw.tv_sec && self.raw.tv_nsec == other.raw.tv_nsec
    }
}

impl<C: ClockType> Eq for TimeSpec<C> {}

impl<C: ClockType> PartialOrd for TimeSpec<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: ClockType> Ord for TimeSpec<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.raw.tv_sec, self.raw.tv_nsec).cmp(&(other.raw.tv_sec, other.raw.tv_nsec))
    }
}

impl<C: ClockType> std::fmt::Debug for TimeSpec<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimeSpec({}.{:09}s)", self.raw.tv_sec, self.raw.tv_nsec)
    }
}

/// Access to the kernel clock `C`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock<C: ClockType> {
    _clock: PhantomData<C>,
}

impl<C: ClockType> Clock<C> {
    pub const fn new() -> Self {
        Clock {
            _clock: PhantomData,
        }
    }

    /// The current time of this clock.
    pub fn now(&self) -> Result<TimeSpec<C>> {
        let mut spec = TimeSpec::<C>::zero();
        if unsafe { libc::clock_gettime(C::ID, spec.raw_mut()) } == -1 {
            return Err(Error::api("clock_gettime"));
        }
        Ok(spec)
    }

    /// The resolution (granularity) of this clock.
    pub fn resolution(&self) -> Result<TimeSpec<C>> {
        let mut spec = TimeSpec::<C>::zero();
        if unsafe { libc::clock_getres(C::ID, spec.raw_mut()) } == -1 {
            return Err(Error::api("clock_getres"));
        }
        Ok(spec)
    }

    /// Sets this clock to `time`. Requires privileges and a settable clock.
    pub fn set(&self, time: TimeSpec<C>) -> Result<()> {
        if unsafe { libc::clock_settime(C::ID, time.raw()) } == -1 {
            return Err(Error::api("clock_settime"));
        }
        Ok(())
    }

    /// Sleeps until this clock reaches the absolute time `until`.
    ///
    /// With the EINTR-restart policy enabled, an interrupting signal
    /// transparently resumes the sleep towards the same absolute deadline.
    pub fn sleep(&self, until: TimeSpec<C>) -> Result<()> {
        loop {
            let res = unsafe {
                libc::clock_nanosleep(C::ID, libc::TIMER_ABSTIME, until.raw(), std::ptr::null_mut())
            };
            if res == 0 {
                return Ok(());
            }
            let errno = Errno::from(res);
            if errno == Errno::Interrupted && crate::init::restart_syscall_on_interrupt() {
                continue;
            }
            return Err(Error::api_errno("clock_nanosleep", errno));
        }
    }

    /// Sleeps for the relative `duration` against this clock.
    pub fn sleep_for(&self, duration: Duration) -> Result<()> {
        let deadline = self.now()?.after(duration);
        self.sleep(deadline)
    }
}

/// The wall clock.
pub const REAL_TIME: Clock<RealTimeClock> = Clock::new();
/// The monotonic clock.
pub const MONOTONIC: Clock<MonotonicClock> = Clock::new();
/// The boot-time clock.
pub const BOOT_TIME: Clock<BootTimeClock> = Clock::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespec_ordering() {
        let a = TimeSpec::<MonotonicClock>::new(1, 500);
        let b = TimeSpec::<MonotonicClock>::new(1, 600);
        let c = TimeSpec::<MonotonicClock>::new(2, 0);
        assert!(a < b && b < c);
        assert_eq!(a, TimeSpec::new(1, 500));
        assert!(TimeSpec::<MonotonicClock>::zero().is_zero());
    }

    #[test]
    fn timespec_arithmetic() {
        let base = TimeSpec::<MonotonicClock>::new(1, 900_000_000);
        let sum = base.after(Duration::from_millis(200));
        assert_eq!(sum, TimeSpec::new(2, 100_000_000));
        assert_eq!(
            TimeSpec::<MonotonicClock>::from_duration(Duration::from_micros(1500)),
            TimeSpec::new(0, 1_500_000)
        );
    }

    #[test]
    fn clocks_advance() {
        let first = MONOTONIC.now().unwrap();
        let second = MONOTONIC.now().unwrap();
        assert!(second >= first);
        assert!(!REAL_TIME.now().unwrap().is_zero());
    }

    #[test]
    fn short_sleep() {
        let before = MONOTONIC.now().unwrap();
        MONOTONIC.sleep_for(Duration::from_millis(10)).unwrap();
        let after = MONOTONIC.now().unwrap();
        assert!(after >= before.after(Duration::from_millis(10)));
    }
}
