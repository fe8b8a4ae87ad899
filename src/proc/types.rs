//! Strong identifier types and child-state reporting for the process
//! subsystem.

use bitflags::bitflags;

use crate::proc::signal::Signal;

/// A process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    pub const INVALID: ProcessId = ProcessId(-1);
    /// Refers to the calling process in APIs that accept it (value 0).
    pub const SELF: ProcessId = ProcessId(0);

    pub const fn new(raw: libc::pid_t) -> ProcessId {
        ProcessId(raw)
    }

    pub const fn raw(self) -> libc::pid_t {
        self.0
    }
}

/// A process group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessGroupId(libc::pid_t);

impl ProcessGroupId {
    /// Refers to the calling process's own group (value 0).
    pub const SELF: ProcessGroupId = ProcessGroupId(0);

    pub const fn new(raw: libc::pid_t) -> ProcessGroupId {
        ProcessGroupId(raw)
    }

    pub const fn raw(self) -> libc::pid_t {
        self.0
    }
}

/// A kernel thread identifier (TID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(libc::pid_t);

impl ThreadId {
    pub const fn new(raw: libc::pid_t) -> ThreadId {
        ThreadId(raw)
    }

    pub const fn raw(self) -> libc::pid_t {
        self.0
    }
}

/// A user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(libc::uid_t);

impl UserId {
    pub const ROOT: UserId = UserId(0);
    /// The "don't change" sentinel accepted by `chown()` and friends.
    pub const INVALID: UserId = UserId(libc::uid_t::MAX);

    pub const fn new(raw: libc::uid_t) -> UserId {
        UserId(raw)
    }

    pub const fn raw(self) -> libc::uid_t {
        self.0
    }
}

/// A group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(libc::gid_t);

impl GroupId {
    pub const ROOT: GroupId = GroupId(0);
    /// The "don't change" sentinel accepted by `chown()` and friends.
    pub const INVALID: GroupId = GroupId(libc::gid_t::MAX);

    pub const fn new(raw: libc::gid_t) -> GroupId {
        GroupId(raw)
    }

    pub const fn raw(self) -> libc::gid_t {
        self.0
    }
}

/// CPU time expressed in clock ticks (see `sysconf(_SC_CLK_TCK)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTicks(libc::clock_t);

impl ClockTicks {
    pub const fn new(raw: libc::clock_t) -> ClockTicks {
        ClockTicks(raw)
    }

    pub const fn raw(self) -> libc::clock_t {
        self.0
    }
}

/// A process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    pub const INVALID: ExitStatus = ExitStatus(-1);
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const FAILURE: ExitStatus = ExitStatus(1);
    /// Conventional status when a pre-exec step failed in a child process.
    pub const PRE_EXEC_ERROR: ExitStatus = ExitStatus(125);
    /// Conventional status when the program to execute was not executable.
    pub const PROG_NOT_EXECUTABLE: ExitStatus = ExitStatus(126);
    /// Conventional status when the program to execute was not found.
    pub const PROG_NOT_FOUND: ExitStatus = ExitStatus(127);

    pub const fn new(raw: i32) -> ExitStatus {
        ExitStatus(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn success(self) -> bool {
        self == ExitStatus::SUCCESS
    }
}

bitflags! {
    /// Child process wait options for the `proc::wait()` family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WaitFlags: i32 {
        /// Wait for child processes that have terminated.
        const WAIT_FOR_EXITED = libc::WEXITED;
        /// Wait for child processes stopped by a signal.
        const WAIT_FOR_STOPPED = libc::WSTOPPED;
        /// Wait for previously stopped children continued via SIGCONT.
        const WAIT_FOR_CONTINUED = libc::WCONTINUED;
        /// Don't block when no matching child changed state.
        const NO_HANG = libc::WNOHANG;
        /// Leave the state change unreaped for a later wait call.
        const LEAVE_INFO = libc::WNOWAIT;
        /// Wait for all kinds of children regardless of type.
        const ALL = libc::__WALL;
        /// Wait for "clone" children only.
        const CLONE = libc::__WCLONE;
        /// Don't wait for children of other threads in the thread group.
        const NOTHREAD = libc::__WNOTHREAD;
    }
}

/// The kind of state change a child process reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ChildEvent {
    Invalid = 0,
    /// The child exited regularly.
    Exited = libc::CLD_EXITED,
    /// The child was killed by a signal.
    Killed = libc::CLD_KILLED,
    /// The child was killed by a signal and dumped core.
    Dumped = libc::CLD_DUMPED,
    /// A traced child has trapped.
    Trapped = libc::CLD_TRAPPED,
    /// The child was stopped by a signal.
    Stopped = libc::CLD_STOPPED,
    /// A stopped child was continued via SIGCONT.
    Continued = libc::CLD_CONTINUED,
}

impl ChildEvent {
    pub(crate) fn from_raw(raw: i32) -> ChildEvent {
        match raw {
            libc::CLD_EXITED => ChildEvent::Exited,
            libc::CLD_KILLED => ChildEvent::Killed,
            libc::CLD_DUMPED => ChildEvent::Dumped,
            libc::CLD_TRAPPED => ChildEvent::Trapped,
            libc::CLD_STOPPED => ChildEvent::Stopped,
            libc::CLD_CONTINUED => ChildEvent::Continued,
            _ => ChildEvent::Invalid,
        }
    }

    pub fn exited(self) -> bool {
        self == ChildEvent::Exited
    }

    pub fn killed(self) -> bool {
        self == ChildEvent::Killed
    }

    pub fn dumped(self) -> bool {
        self == ChildEvent::Dumped
    }

    pub fn trapped(self) -> bool {
        self == ChildEvent::Trapped
    }

    pub fn stopped(self) -> bool {
        self == ChildEvent::Stopped
    }

    pub fn continued(self) -> bool {
        self == ChildEvent::Continued
    }
}

/// The PID and real user ID of a process a signal or state change is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessCtx {
    pub pid: ProcessId,
    pub uid: UserId,
}

/// The outcome of waiting on a child process.
#[derive(Debug, Clone, Copy)]
pub struct ChildState {
    /// What happened to the child.
    pub event: ChildEvent,
    /// Who the child is.
    pub child: ProcessCtx,
    /// The exit status, present for [`ChildEvent::Exited`].
    pub status: Option<ExitStatus>,
    /// The signal that killed, stopped, continued or trapped the child.
    pub signal: Option<Signal>,
    /// CPU time the child spent in user space, where reported.
    pub user_time: Option<ClockTicks>,
    /// CPU time the child spent in kernel space, where reported.
    pub system_time: Option<ClockTicks>,
}

impl ChildState {
    pub fn exited(&self) -> bool {
        self.event.exited()
    }

    pub fn killed(&self) -> bool {
        self.event.killed()
    }

    pub fn stopped(&self) -> bool {
        self.event.stopped()
    }

    pub fn continued(&self) -> bool {
        self.event.continued()
    }

    /// Converts this state into the legacy `wait()` status encoding.
    pub fn to_wait_status(&self) -> WaitStatus {
        let status = self.status.unwrap_or(ExitStatus::SUCCESS).raw() & 0xff;
        let signal = self
            .signal
            .map(|signal| signal.raw() & 0x7f)
            .unwrap_or(0);
        let raw = match self.event {
            ChildEvent::Exited => status << 8,
            ChildEvent::Killed => signal,
            ChildEvent::Dumped => signal | 0x80,
            ChildEvent::Stopped => (signal << 8) | 0x7f,
            ChildEvent::Trapped => ((libc::SIGTRAP) << 8) | 0x7f,
            ChildEvent::Continued => 0xffff,
            ChildEvent::Invalid => 0x7f,
        };
        WaitStatus::new(raw)
    }
}

/// A lightweight wrapper around the legacy `wait()` status integer.
///
/// The modern wait surface reports [`ChildState`]; this type exists for APIs
/// like ptrace that still hand out the packed integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus(i32);

impl WaitStatus {
    pub const fn new(raw: i32) -> WaitStatus {
        WaitStatus(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether the process exited regularly and [`status`](Self::status) is
    /// available.
    pub fn exited(self) -> bool {
        libc::WIFEXITED(self.0)
    }

    /// Whether the process was killed by a signal and
    /// [`term_signal`](Self::term_signal) is available.
    pub fn signaled(self) -> bool {
        libc::WIFSIGNALED(self.0)
    }

    /// Whether the process, when killed by a signal, also dumped core.
    pub fn dumped(self) -> bool {
        self.signaled() && libc::WCOREDUMP(self.0)
    }

    /// Whether the process was stopped by a signal.
    pub fn stopped(self) -> bool {
        libc::WIFSTOPPED(self.0)
    }

    /// Whether the process was resumed via SIGCONT.
    pub fn continued(self) -> bool {
        libc::WIFCONTINUED(self.0)
    }

    /// The exit status, if the process exited.
    pub fn status(self) -> Option<ExitStatus> {
        self.exited().then(|| ExitStatus::new(libc::WEXITSTATUS(self.0)))
    }

    /// The terminating signal, if the process was killed by one.
    pub fn term_signal(self) -> Option<Signal> {
        self.signaled().then(|| Signal::from_raw(libc::WTERMSIG(self.0)))
    }

    /// The stopping signal, if the process was stopped.
    pub fn stop_signal(self) -> Option<Signal> {
        self.stopped().then(|| Signal::from_raw(libc::WSTOPSIG(self.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::signal::Signal;

    fn state(event: ChildEvent, status: Option<ExitStatus>, signal: Option<Signal>) -> ChildState {
        ChildState {
            event,
            child: ProcessCtx {
                pid: ProcessId::new(1234),
                uid: UserId::new(1000),
            },
            status,
            signal,
            user_time: None,
            system_time: None,
        }
    }

    #[test]
    fn exited_conversion() {
        let ws = state(ChildEvent::Exited, Some(ExitStatus::new(42)), None).to_wait_status();
        assert!(ws.exited());
        assert!(!ws.signaled() && !ws.stopped() && !ws.continued());
        assert_eq!(ws.status(), Some(ExitStatus::new(42)));
    }

    #[test]
    fn killed_and_dumped_conversion() {
        let ws = state(ChildEvent::Killed, None, Some(Signal::KILL)).to_wait_status();
        assert!(ws.signaled());
        assert!(!ws.dumped());
        assert_eq!(ws.term_signal(), Some(Signal::KILL));

        let ws = state(ChildEvent::Dumped, None, Some(Signal::SEGV)).to_wait_status();
        assert!(ws.signaled());
        assert!(ws.dumped());
        assert_eq!(ws.term_signal(), Some(Signal::SEGV));
    }

    #[test]
    fn stopped_and_continued_conversion() {
        let ws = state(ChildEvent::Stopped, None, Some(Signal::STOP)).to_wait_status();
        assert!(ws.stopped());
        assert!(!ws.exited());
        assert_eq!(ws.stop_signal(), Some(Signal::STOP));

        let ws = state(ChildEvent::Continued, None, Some(Signal::CONT)).to_wait_status();
        assert!(ws.continued());
        assert!(!ws.stopped());
    }

    #[test]
    fn exit_status_sentinels() {
        assert!(ExitStatus::SUCCESS.success());
        assert!(!ExitStatus::PROG_NOT_FOUND.success());
        assert_eq!(ExitStatus::PROG_NOT_FOUND.raw(), 127);
        assert_eq!(ExitStatus::PROG_NOT_EXECUTABLE.raw(), 126);
        assert_eq!(ExitStatus::PRE_EXEC_ERROR.raw(), 125);
    }
}
