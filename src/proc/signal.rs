//! Signal types, signal delivery and signal masks.

use std::mem::MaybeUninit;

use bitflags::bitflags;

use crate::error::{Errno, Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::fs::FdFile;
use crate::proc::siginfo::SigInfo;
use crate::proc::{ProcessId, ThreadId};
use crate::time::{MonotonicClock, TimeSpec};

/// A strongly typed signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(i32);

impl Signal {
    pub const NONE: Signal = Signal(0);
    pub const HUP: Signal = Signal(libc::SIGHUP);
    pub const INT: Signal = Signal(libc::SIGINT);
    pub const QUIT: Signal = Signal(libc::SIGQUIT);
    pub const ILL: Signal = Signal(libc::SIGILL);
    pub const TRAP: Signal = Signal(libc::SIGTRAP);
    pub const ABRT: Signal = Signal(libc::SIGABRT);
    pub const BUS: Signal = Signal(libc::SIGBUS);
    pub const FPE: Signal = Signal(libc::SIGFPE);
    pub const KILL: Signal = Signal(libc::SIGKILL);
    pub const USR1: Signal = Signal(libc::SIGUSR1);
    pub const SEGV: Signal = Signal(libc::SIGSEGV);
    pub const USR2: Signal = Signal(libc::SIGUSR2);
    pub const PIPE: Signal = Signal(libc::SIGPIPE);
    pub const ALRM: Signal = Signal(libc::SIGALRM);
    pub const TERM: Signal = Signal(libc::SIGTERM);
    pub const CHLD: Signal = Signal(libc::SIGCHLD);
    pub const CONT: Signal = Signal(libc::SIGCONT);
    pub const STOP: Signal = Signal(libc::SIGSTOP);
    pub const TSTP: Signal = Signal(libc::SIGTSTP);
    pub const TTIN: Signal = Signal(libc::SIGTTIN);
    pub const TTOU: Signal = Signal(libc::SIGTTOU);
    pub const URG: Signal = Signal(libc::SIGURG);
    pub const XCPU: Signal = Signal(libc::SIGXCPU);
    pub const XFSZ: Signal = Signal(libc::SIGXFSZ);
    pub const VTALRM: Signal = Signal(libc::SIGVTALRM);
    pub const PROF: Signal = Signal(libc::SIGPROF);
    pub const WINCH: Signal = Signal(libc::SIGWINCH);
    pub const IO: Signal = Signal(libc::SIGIO);
    pub const PWR: Signal = Signal(libc::SIGPWR);
    pub const SYS: Signal = Signal(libc::SIGSYS);

    pub const fn from_raw(raw: i32) -> Signal {
        Signal(raw)
    }

    /// The n-th real-time signal (0-based); `n` must stay below
    /// `SIGRTMAX - SIGRTMIN`.
    pub fn realtime(n: i32) -> Signal {
        Signal(libc::SIGRTMIN() + n)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// The `strsignal()` description of this signal.
    pub fn name(self) -> String {
        let msg = unsafe { libc::strsignal(self.0) };
        if msg.is_null() {
            return format!("signal {}", self.0);
        }
        unsafe { std::ffi::CStr::from_ptr(msg) }
            .to_string_lossy()
            .into_owned()
    }
}

/// A set of signals for mask and wait operations.
#[derive(Clone, Copy)]
pub struct SigSet {
    raw: libc::sigset_t,
}

impl SigSet {
    /// Creates an empty set.
    pub fn empty() -> SigSet {
        let mut raw = MaybeUninit::<libc::sigset_t>::uninit();
        unsafe {
            libc::sigemptyset(raw.as_mut_ptr());
            SigSet {
                raw: raw.assume_init(),
            }
        }
    }

    /// Creates a set holding all signals.
    pub fn full() -> SigSet {
        let mut raw = MaybeUninit::<libc::sigset_t>::uninit();
        unsafe {
            libc::sigfillset(raw.as_mut_ptr());
            SigSet {
                raw: raw.assume_init(),
            }
        }
    }

    pub fn add(&mut self, signal: Signal) {
        unsafe {
            libc::sigaddset(&mut self.raw, signal.raw());
        }
    }

    pub fn remove(&mut self, signal: Signal) {
        unsafe {
            libc::sigdelset(&mut self.raw, signal.raw());
        }
    }

    pub fn contains(&self, signal: Signal) -> bool {
        unsafe { libc::sigismember(&self.raw, signal.raw()) == 1 }
    }

    pub fn raw(&self) -> &libc::sigset_t {
        &self.raw
    }
}

impl std::fmt::Debug for SigSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigSet(..)")
    }
}

impl Default for SigSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<Signal> for SigSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> SigSet {
        let mut set = SigSet::empty();
        for signal in iter {
            set.add(signal);
        }
        set
    }
}

/// Sends `signal` to the calling process.
pub fn raise(signal: Signal) -> Result<()> {
    if unsafe { libc::raise(signal.raw()) } != 0 {
        return Err(Error::api("raise"));
    }
    Ok(())
}

/// Sends `signal` to the process `pid`.
pub fn send(pid: ProcessId, signal: Signal) -> Result<()> {
    if unsafe { libc::kill(pid.raw(), signal.raw()) } == -1 {
        return Err(Error::api("kill"));
    }
    Ok(())
}

/// Sends `signal` to the thread `tid` within the thread group `pid`.
pub fn send_to_thread(pid: ProcessId, tid: ThreadId, signal: Signal) -> Result<()> {
    let res = unsafe {
        libc::syscall(libc::SYS_tgkill, pid.raw(), tid.raw(), signal.raw())
    };
    if res == -1 {
        return Err(Error::api("tgkill"));
    }
    Ok(())
}

/// Sends `signal` to `pid`, queueing the given custom integer value.
pub fn send_queue(pid: ProcessId, signal: Signal, value: i32) -> Result<()> {
    let sival = libc::sigval {
        sival_ptr: value as isize as *mut libc::c_void,
    };
    if unsafe { libc::sigqueue(pid.raw(), signal.raw(), sival) } == -1 {
        return Err(Error::api("sigqueue"));
    }
    Ok(())
}

/// How a mask change combines with the currently blocked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum MaskOp {
    Block = libc::SIG_BLOCK,
    Unblock = libc::SIG_UNBLOCK,
    Set = libc::SIG_SETMASK,
}

fn change_mask(op: MaskOp, set: &SigSet) -> Result<SigSet> {
    let mut old = SigSet::empty();
    let res = unsafe { libc::pthread_sigmask(op as i32, set.raw(), &mut old.raw) };
    if res != 0 {
        return Err(Error::api_errno("pthread_sigmask", Errno::from(res)));
    }
    Ok(old)
}

/// Adds the signals in `set` to the calling thread's blocked set, returning
/// the previous mask.
pub fn block(set: &SigSet) -> Result<SigSet> {
    change_mask(MaskOp::Block, set)
}

/// Removes the signals in `set` from the calling thread's blocked set,
/// returning the previous mask.
pub fn unblock(set: &SigSet) -> Result<SigSet> {
    change_mask(MaskOp::Unblock, set)
}

/// Replaces the calling thread's blocked set, returning the previous mask.
pub fn set_sigmask(set: &SigSet) -> Result<SigSet> {
    change_mask(MaskOp::Set, set)
}

/// The calling thread's currently blocked set.
pub fn get_sigmask() -> Result<SigSet> {
    let mut old = SigSet::empty();
    let res = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut old.raw) };
    if res != 0 {
        return Err(Error::api_errno("pthread_sigmask", Errno::from(res)));
    }
    Ok(old)
}

/// The set of signals currently pending for delivery.
pub fn pending() -> Result<SigSet> {
    let mut set = SigSet::empty();
    if unsafe { libc::sigpending(&mut set.raw) } == -1 {
        return Err(Error::api("sigpending"));
    }
    Ok(set)
}

/// Waits for one of the signals in `set` to become pending, at most for
/// `timeout`.
///
/// The signals should be blocked in the calling thread. `None` is returned
/// when the timeout expired without a matching signal.
pub fn timed_wait(
    set: &SigSet,
    timeout: TimeSpec<MonotonicClock>,
) -> Result<Option<SigInfo>> {
    let mut info = SigInfo::new();
    let res = crate::init::retry_int(|| unsafe {
        libc::sigtimedwait(set.raw(), info.raw_mut(), timeout.raw())
    });
    if res == -1 {
        return match Errno::last() {
            Errno::Again => Ok(None),
            _ => Err(Error::api("sigtimedwait")),
        };
    }
    Ok(Some(info))
}

/// Waits indefinitely for one of the signals in `set` to become pending.
pub fn wait_info(set: &SigSet) -> Result<SigInfo> {
    let mut info = SigInfo::new();
    let res = crate::init::retry_int(|| unsafe {
        libc::sigwaitinfo(set.raw(), info.raw_mut())
    });
    if res == -1 {
        return Err(Error::api("sigwaitinfo"));
    }
    Ok(info)
}

bitflags! {
    /// Creation flags for a [`SignalFd`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SignalFdFlags: i32 {
        const CLOEXEC = libc::SFD_CLOEXEC;
        const NONBLOCK = libc::SFD_NONBLOCK;
    }
}

/// A file descriptor that delivers signals as readable events.
///
/// The covered signals should be blocked in all threads; the descriptor can
/// then be registered with a [`Poller`](crate::io::Poller) and drained via
/// [`read_event`](SignalFd::read_event).
#[derive(Debug)]
pub struct SignalFd {
    file: FdFile,
}

impl SignalFd {
    /// Creates a signalfd delivering the signals in `set`.
    pub fn new(set: &SigSet, flags: SignalFdFlags) -> Result<SignalFd> {
        let res = unsafe { libc::signalfd(-1, set.raw(), flags.bits()) };
        if res == -1 {
            return Err(Error::api("signalfd"));
        }
        Ok(SignalFd {
            file: FdFile::new(FileDescriptor::new(FileNum::new(res))),
        })
    }

    /// Replaces the set of delivered signals.
    pub fn adjust(&self, set: &SigSet) -> Result<()> {
        let res = unsafe { libc::signalfd(self.fd().raw().raw(), set.raw(), 0) };
        if res == -1 {
            return Err(Error::api("signalfd"));
        }
        Ok(())
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    /// Reads the next queued signal, blocking unless NONBLOCK was given.
    pub fn read_event(&self) -> Result<SigInfo> {
        let mut raw = MaybeUninit::<libc::signalfd_siginfo>::zeroed();
        let res = crate::init::retry_ssize(|| unsafe {
            libc::read(
                self.fd().raw().raw(),
                raw.as_mut_ptr().cast(),
                std::mem::size_of::<libc::signalfd_siginfo>(),
            )
        });
        if res == -1 {
            return Err(Error::api("signalfd read"));
        }
        if res as usize != std::mem::size_of::<libc::signalfd_siginfo>() {
            return Err(Error::Runtime("short read from signalfd"));
        }
        Ok(SigInfo::from_signalfd(&unsafe { raw.assume_init() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership() {
        let mut set = SigSet::empty();
        assert!(!set.contains(Signal::USR1));
        set.add(Signal::USR1);
        set.add(Signal::TERM);
        assert!(set.contains(Signal::USR1));
        assert!(set.contains(Signal::TERM));
        set.remove(Signal::USR1);
        assert!(!set.contains(Signal::USR1));
        assert!(SigSet::full().contains(Signal::HUP));
        let collected: SigSet = [Signal::INT, Signal::QUIT].into_iter().collect();
        assert!(collected.contains(Signal::QUIT));
    }

    #[test]
    fn signal_names() {
        assert_eq!(Signal::KILL.name(), "Killed");
        assert_eq!(Signal::from_raw(libc::SIGTERM), Signal::TERM);
        assert!(Signal::realtime(0).raw() >= libc::SIGRTMIN());
    }

    #[test]
    #[serial_test::serial]
    fn blocked_signal_becomes_pending() {
        let set: SigSet = [Signal::USR2].into_iter().collect();
        let old = block(&set).unwrap();
        raise(Signal::USR2).unwrap();
        assert!(pending().unwrap().contains(Signal::USR2));
        let info = timed_wait(&set, TimeSpec::new(1, 0)).unwrap().unwrap();
        assert_eq!(info.signal(), Signal::USR2);
        set_sigmask(&old).unwrap();
    }

    #[test]
    #[serial_test::serial]
    fn timed_wait_times_out() {
        let set: SigSet = [Signal::USR1].into_iter().collect();
        let old = block(&set).unwrap();
        let res = timed_wait(&set, TimeSpec::new(0, 50_000_000)).unwrap();
        assert!(res.is_none());
        set_sigmask(&old).unwrap();
    }
}
