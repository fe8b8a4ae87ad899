//! Timers that notify via file descriptors.

use std::marker::PhantomData;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::fs::FdFile;
use crate::time::{TimeSpec, TimerClock};

bitflags! {
    /// Flags provided at [`TimerFd`] creation time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TimerFdFlags: i32 {
        /// Create a non-blocking file descriptor.
        const NONBLOCK = libc::TFD_NONBLOCK;
        /// Set the close-on-exec flag upon creation.
        const CLOEXEC = libc::TFD_CLOEXEC;
    }
}

bitflags! {
    /// Flags available when arming a [`TimerFd`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TimerStartFlags: i32 {
        /// Interpret the initial (not the interval!) setting as an absolute
        /// clock time.
        const ABSTIME = libc::TFD_TIMER_ABSTIME;
        /// For wall-clock timers, report discontinuous clock changes via
        /// `Errno::Canceled`.
        const CANCEL_ON_SET = libc::TFD_TIMER_CANCEL_ON_SET;
    }
}

/// Combined start time and repeat interval for a timer setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSpec<C: TimerClock> {
    /// The first tick time. Relative to now by default, absolute with
    /// [`TimerStartFlags::ABSTIME`]. All zero disarms the timer regardless
    /// of the interval.
    pub initial: TimeSpec<C>,
    /// The (relative) repeat interval after the initial tick; all zero makes
    /// a one-shot timer.
    pub interval: TimeSpec<C>,
}

impl<C: TimerClock> TimerSpec<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the timer tick in equal spans by copying the initial time into
    /// the interval. Only meaningful with a relative initial time.
    pub fn make_equal_interval(&mut self) {
        self.interval = self.initial;
    }

    fn to_raw(self) -> libc::itimerspec {
        libc::itimerspec {
            it_interval: *self.interval.raw(),
            it_value: *self.initial.raw(),
        }
    }

    fn from_raw(raw: libc::itimerspec) -> Self {
        TimerSpec {
            initial: TimeSpec::from_raw(raw.it_value),
            interval: TimeSpec::from_raw(raw.it_interval),
        }
    }
}

/// A timer bound to clock `C` that signals expirations through a file
/// descriptor.
///
/// The descriptor becomes readable once at least one tick occurred; the read
/// value is the number of ticks since the last read. Only the real-time,
/// monotonic and boot-time clocks can back a timer fd, which the
/// [`TimerClock`] bound enforces at compile time.
#[derive(Debug)]
pub struct TimerFd<C: TimerClock> {
    file: FdFile,
    _clock: PhantomData<C>,
}

impl<C: TimerClock> TimerFd<C> {
    /// Creates a timer fd with default flags (CLOEXEC).
    pub fn new() -> Result<Self> {
        Self::with_flags(TimerFdFlags::CLOEXEC)
    }

    /// Creates a timer fd with the given flags, ready for operation.
    pub fn with_flags(flags: TimerFdFlags) -> Result<Self> {
        let res = unsafe { libc::timerfd_create(C::ID, flags.bits()) };
        if res == -1 {
            return Err(Error::api("timerfd_create"));
        }
        Ok(TimerFd {
            file: FdFile::new(FileDescriptor::new(FileNum::new(res))),
            _clock: PhantomData,
        })
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    /// Arms the timer with the given settings.
    ///
    /// A non-zero `spec.initial` produces at least one tick at that time.
    pub fn set_time(&self, spec: TimerSpec<C>, flags: TimerStartFlags) -> Result<()> {
        let raw = spec.to_raw();
        let res = unsafe {
            libc::timerfd_settime(self.fd().raw().raw(), flags.bits(), &raw, std::ptr::null_mut())
        };
        if res == -1 {
            return Err(Error::api("timerfd_settime"));
        }
        Ok(())
    }

    /// The current timer setting.
    ///
    /// The initial time is always reported relative, even for timers armed
    /// with ABSTIME. A disarmed timer reports all zeroes.
    pub fn get_time(&self) -> Result<TimerSpec<C>> {
        let mut raw = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
        };
        if unsafe { libc::timerfd_gettime(self.fd().raw().raw(), &mut raw) } == -1 {
            return Err(Error::api("timerfd_gettime"));
        }
        Ok(TimerSpec::from_raw(raw))
    }

    /// Waits for the timer, returning the tick count since the last wait.
    ///
    /// Blocks until at least one tick occurred, resetting the count to zero
    /// on return. In NONBLOCK mode a not-yet-expired timer fails with
    /// `Errno::WOULD_BLOCK`.
    pub fn wait(&self) -> Result<u64> {
        let mut ticks = [0u8; 8];
        // the tick counter is always delivered as one atomic 8 byte read
        self.file.fd().read_all(&mut ticks)?;
        Ok(u64::from_ne_bytes(ticks))
    }

    /// Disarms the timer; a future [`wait`](Self::wait) blocks until the
    /// timer is armed again.
    pub fn disarm(&self) -> Result<()> {
        self.set_time(TimerSpec::new(), TimerStartFlags::empty())
    }
}

/// Timer fd against the wall clock.
pub type RealTimeTimerFd = TimerFd<crate::time::RealTimeClock>;
/// Timer fd against the monotonic clock.
pub type MonotonicTimerFd = TimerFd<crate::time::MonotonicClock>;
/// Timer fd against the boot-time clock.
pub type BootTimeTimerFd = TimerFd<crate::time::BootTimeClock>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn one_shot_tick() {
        let timer = MonotonicTimerFd::new().unwrap();
        let mut spec = TimerSpec::new();
        spec.initial = TimeSpec::from_duration(Duration::from_millis(20));
        timer.set_time(spec, TimerStartFlags::empty()).unwrap();
        assert_eq!(timer.wait().unwrap(), 1);
    }

    #[test]
    fn disarm_reports_zeroes() {
        let timer = MonotonicTimerFd::new().unwrap();
        let mut spec = TimerSpec::new();
        spec.initial = TimeSpec::from_duration(Duration::from_secs(60));
        spec.interval = TimeSpec::from_duration(Duration::from_secs(60));
        timer.set_time(spec, TimerStartFlags::empty()).unwrap();
        assert!(!timer.get_time().unwrap().initial.is_zero());
        timer.disarm().unwrap();
        let disarmed = timer.get_time().unwrap();
        assert!(disarmed.initial.is_zero());
        assert!(disarmed.interval.is_zero());
    }

    #[test]
    fn nonblocking_wait_would_block() {
        let timer = MonotonicTimerFd::with_flags(
            TimerFdFlags::CLOEXEC | TimerFdFlags::NONBLOCK,
        )
        .unwrap();
        let err = timer.wait().unwrap_err();
        assert!(err.is_would_block());
    }
}
