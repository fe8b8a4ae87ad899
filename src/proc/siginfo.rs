//! A typed view onto `siginfo_t`.
//!
//! The kernel structure is a large union whose field meanings depend on the
//! signal number and the signal source. This module keeps the raw structure
//! in one owning [`SigInfo`] value and exposes small per-context data
//! structs, returned as `Option` only when the signal actually is of the
//! matching kind.

use std::mem::MaybeUninit;

use crate::proc::signal::Signal;
use crate::proc::{ChildEvent, ClockTicks, ExitStatus, ProcessCtx, ProcessId, UserId};

// The si_code origin constants; kernel ABI, not all exposed by libc.
const SI_USER: i32 = 0;
const SI_KERNEL: i32 = 0x80;
const SI_QUEUE: i32 = -1;
const SI_TIMER: i32 = -2;
const SI_MESGQ: i32 = -3;
const SI_ASYNCIO: i32 = -4;
const SI_SIGIO: i32 = -5;
const SI_TKILL: i32 = -6;

// SIGILL si_code values; kernel ABI, not exposed by libc for this target.
const ILL_ILLOPC: i32 = 1;
const ILL_ILLOPN: i32 = 2;
const ILL_ILLADR: i32 = 3;
const ILL_ILLTRP: i32 = 4;
const ILL_PRVOPC: i32 = 5;
const ILL_PRVREG: i32 = 6;
const ILL_COPROC: i32 = 7;
const ILL_BADSTK: i32 = 8;

// SIGFPE si_code values; kernel ABI, not exposed by libc for this target.
const FPE_INTDIV: i32 = 1;
const FPE_INTOVF: i32 = 2;
const FPE_FLTDIV: i32 = 3;
const FPE_FLTOVF: i32 = 4;
const FPE_FLTUND: i32 = 5;
const FPE_FLTRES: i32 = 6;
const FPE_FLTINV: i32 = 7;
const FPE_FLTSUB: i32 = 8;

// SIGSEGV si_code values; kernel ABI, not exposed by libc for this target.
const SEGV_MAPERR: i32 = 1;
const SEGV_ACCERR: i32 = 2;

/// Where a signal originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Sent via `kill()`.
    User,
    /// Sent by the kernel.
    Kernel,
    /// Sent from user space via `sigqueue()`.
    Queue,
    /// A POSIX timer expired.
    Timer,
    /// POSIX message queue state changed.
    MesgQ,
    /// Asynchronous I/O completed.
    AsyncIo,
    /// Queued SIGIO.
    QSigIo,
    /// Sent via `tkill()` or `tgkill()`.
    TKill,
    /// A kernel-internal code specific to the signal (e.g. the fault codes
    /// and `CLD_*` values).
    Specific(i32),
}

impl Source {
    fn from_code(code: i32) -> Source {
        match code {
            SI_USER => Source::User,
            SI_KERNEL => Source::Kernel,
            SI_QUEUE => Source::Queue,
            SI_TIMER => Source::Timer,
            SI_MESGQ => Source::MesgQ,
            SI_ASYNCIO => Source::AsyncIo,
            SI_SIGIO => Source::QSigIo,
            SI_TKILL => Source::TKill,
            other => Source::Specific(other),
        }
    }
}

/// Custom data attached to queued signals.
///
/// The meaning and format is application specific; both views onto the
/// underlying `sigval` are offered.
#[derive(Debug, Clone, Copy)]
pub struct CustomData {
    raw: libc::sigval,
}

impl CustomData {
    pub fn as_int(&self) -> i32 {
        unsafe { self.raw.sival_ptr as isize as i32 }
    }

    pub fn as_ptr(&self) -> *mut libc::c_void {
        unsafe { self.raw.sival_ptr }
    }
}

/// Data for signals sent via `kill()` or `tkill()`.
#[derive(Debug, Clone, Copy)]
pub struct UserSigData {
    /// The PID and real user ID of the sender.
    pub sender: ProcessCtx,
}

/// Data for signals sent via `sigqueue()`.
#[derive(Debug, Clone, Copy)]
pub struct QueueSigData {
    pub sender: ProcessCtx,
    pub data: CustomData,
}

/// Data for message queue notification signals.
#[derive(Debug, Clone, Copy)]
pub struct MsgQueueData {
    pub msg_sender: ProcessCtx,
    pub data: CustomData,
}

/// A kernel-internal timer identifier, distinct from `timer_create()` ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub i32);

/// Data for POSIX timer expiry signals.
#[derive(Debug, Clone, Copy)]
pub struct TimerData {
    pub id: TimerId,
    /// The timer overrun count, as from `timer_getoverrun()`.
    pub overrun: i32,
}

/// Reasons for delivering SIGILL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IllReason {
    Opcode,
    Operand,
    Address,
    Trap,
    PrivilegedOpcode,
    PrivilegedRegister,
    Coprocessor,
    BadStack,
    Other(i32),
}

impl IllReason {
    fn from_code(code: i32) -> IllReason {
        match code {
            ILL_ILLOPC => IllReason::Opcode,
            ILL_ILLOPN => IllReason::Operand,
            ILL_ILLADR => IllReason::Address,
            ILL_ILLTRP => IllReason::Trap,
            ILL_PRVOPC => IllReason::PrivilegedOpcode,
            ILL_PRVREG => IllReason::PrivilegedRegister,
            ILL_COPROC => IllReason::Coprocessor,
            ILL_BADSTK => IllReason::BadStack,
            other => IllReason::Other(other),
        }
    }
}

/// Data delivered with SIGILL.
#[derive(Debug, Clone, Copy)]
pub struct IllData {
    /// The faulting instruction address.
    pub addr: *mut libc::c_void,
    pub reason: IllReason,
}

/// Reasons for delivering SIGFPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpeReason {
    IntDivZero,
    IntOverflow,
    FloatDivZero,
    FloatOverflow,
    FloatUnderflow,
    FloatInexact,
    FloatInvalid,
    FloatSubRange,
    Other(i32),
}

impl FpeReason {
    fn from_code(code: i32) -> FpeReason {
        match code {
            FPE_INTDIV => FpeReason::IntDivZero,
            FPE_INTOVF => FpeReason::IntOverflow,
            FPE_FLTDIV => FpeReason::FloatDivZero,
            FPE_FLTOVF => FpeReason::FloatOverflow,
            FPE_FLTUND => FpeReason::FloatUnderflow,
            FPE_FLTRES => FpeReason::FloatInexact,
            FPE_FLTINV => FpeReason::FloatInvalid,
            FPE_FLTSUB => FpeReason::FloatSubRange,
            other => FpeReason::Other(other),
        }
    }
}

/// Data delivered with SIGFPE.
#[derive(Debug, Clone, Copy)]
pub struct FpeData {
    pub addr: *mut libc::c_void,
    pub reason: FpeReason,
}

/// Reasons for delivering SIGSEGV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegfaultReason {
    /// The address is not mapped at all.
    NotMapped,
    /// The mapping exists but forbids the access.
    AccessDenied,
    Other(i32),
}

/// Data delivered with SIGSEGV.
#[derive(Debug, Clone, Copy)]
pub struct SegfaultData {
    /// The faulting memory address.
    pub addr: *mut libc::c_void,
    pub reason: SegfaultReason,
}

/// Reasons for delivering SIGBUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusReason {
    AlignmentError,
    NonExistingAddress,
    ObjectError,
    MachineCheckActionRequired,
    MachineCheckActionOptional,
    Other(i32),
}

impl BusReason {
    fn from_code(code: i32) -> BusReason {
        match code {
            libc::BUS_ADRALN => BusReason::AlignmentError,
            libc::BUS_ADRERR => BusReason::NonExistingAddress,
            libc::BUS_OBJERR => BusReason::ObjectError,
            libc::BUS_MCEERR_AR => BusReason::MachineCheckActionRequired,
            libc::BUS_MCEERR_AO => BusReason::MachineCheckActionOptional,
            other => BusReason::Other(other),
        }
    }
}

/// Data delivered with SIGBUS.
#[derive(Debug, Clone, Copy)]
pub struct BusData {
    pub addr: *mut libc::c_void,
    pub reason: BusReason,
}

/// Data delivered with SIGCHLD.
#[derive(Debug, Clone, Copy)]
pub struct ChildData {
    /// What happened to the child.
    pub event: ChildEvent,
    /// The child the event is about.
    pub child: ProcessCtx,
    /// The exit status for [`ChildEvent::Exited`].
    pub status: Option<ExitStatus>,
    /// The signal that killed, stopped or continued the child.
    pub signal: Option<Signal>,
    /// CPU time the child spent in user space.
    pub user_time: ClockTicks,
    /// CPU time the child spent in kernel space.
    pub system_time: ClockTicks,
}

/// Data delivered with SIGSYS (seccomp traps).
#[derive(Debug, Clone, Copy)]
pub struct SysData {
    /// The address of the offending system call instruction.
    pub call_addr: *mut libc::c_void,
    /// The system call number.
    pub syscall: i32,
    /// The AUDIT_ARCH_* architecture of the call.
    pub arch: u32,
}

/// Data delivered with SIGIO/SIGPOLL.
#[derive(Debug, Clone, Copy)]
pub struct PollData {
    /// The event band, matching the `poll()` event bits.
    pub band: libc::c_long,
    pub fd: i32,
}

// The union portion of siginfo_t starts after si_signo/si_errno/si_code,
// padded to pointer alignment.
#[cfg(target_pointer_width = "64")]
const SIFIELDS_OFFSET: usize = 16;
#[cfg(target_pointer_width = "32")]
const SIFIELDS_OFFSET: usize = 12;

#[repr(C)]
struct SigChldFields {
    pid: libc::pid_t,
    uid: libc::uid_t,
    status: libc::c_int,
    utime: libc::clock_t,
    stime: libc::clock_t,
}

#[repr(C)]
struct SigTimerFields {
    tid: libc::c_int,
    overrun: libc::c_int,
    value: libc::sigval,
}

#[repr(C)]
struct SigRtFields {
    pid: libc::pid_t,
    uid: libc::uid_t,
    value: libc::sigval,
}

#[repr(C)]
struct SigSysFields {
    call_addr: *mut libc::c_void,
    syscall: libc::c_int,
    arch: libc::c_uint,
}

#[repr(C)]
struct SigPollFields {
    band: libc::c_long,
    fd: libc::c_int,
}

/// An owned `siginfo_t` with context-dependent accessors.
#[derive(Clone, Copy)]
pub struct SigInfo {
    raw: libc::siginfo_t,
}

impl SigInfo {
    /// A zeroed structure to be filled by a kernel call.
    pub fn new() -> SigInfo {
        SigInfo {
            raw: unsafe { MaybeUninit::zeroed().assume_init() },
        }
    }

    pub fn from_raw(raw: libc::siginfo_t) -> SigInfo {
        SigInfo { raw }
    }

    /// Builds a `SigInfo` from the parallel structure a signalfd delivers.
    pub(crate) fn from_signalfd(raw: &libc::signalfd_siginfo) -> SigInfo {
        let mut info = SigInfo::new();
        info.raw.si_signo = raw.ssi_signo as i32;
        info.raw.si_errno = raw.ssi_errno;
        info.raw.si_code = raw.ssi_code;
        unsafe {
            match Source::from_code(raw.ssi_code) {
                Source::User | Source::TKill | Source::Queue | Source::MesgQ => {
                    let fields = info.sifields_mut::<SigRtFields>();
                    fields.pid = raw.ssi_pid as libc::pid_t;
                    fields.uid = raw.ssi_uid;
                    fields.value.sival_ptr = raw.ssi_ptr as *mut libc::c_void;
                }
                Source::Timer => {
                    let fields = info.sifields_mut::<SigTimerFields>();
                    fields.tid = raw.ssi_tid as i32;
                    fields.overrun = raw.ssi_overrun as i32;
                    fields.value.sival_ptr = raw.ssi_ptr as *mut libc::c_void;
                }
                _ => {
                    if info.signal() == Signal::CHLD {
                        let fields = info.sifields_mut::<SigChldFields>();
                        fields.pid = raw.ssi_pid as libc::pid_t;
                        fields.uid = raw.ssi_uid;
                        fields.status = raw.ssi_status;
                        fields.utime = raw.ssi_utime as libc::clock_t;
                        fields.stime = raw.ssi_stime as libc::clock_t;
                    }
                }
            }
        }
        info
    }

    /// The signal this information is about.
    pub fn signal(&self) -> Signal {
        Signal::from_raw(self.raw.si_signo)
    }

    /// The errno value attached to the signal, if any.
    pub fn errno(&self) -> i32 {
        self.raw.si_errno
    }

    /// The raw `si_code` value.
    pub fn code(&self) -> i32 {
        self.raw.si_code
    }

    /// Where the signal came from.
    pub fn source(&self) -> Source {
        Source::from_code(self.raw.si_code)
    }

    /// Whether the `si_code` lies in the kernel-originated range.
    ///
    /// User space can send arbitrary data via `rt_sigqueueinfo()`; only
    /// kernel-originated codes make the remaining fields trustworthy.
    pub fn is_trusted_source(&self) -> bool {
        self.raw.si_code > 0
    }

    unsafe fn sifields<T>(&self) -> &T {
        unsafe {
            let base = (&self.raw as *const libc::siginfo_t as *const u8).add(SIFIELDS_OFFSET);
            &*(base as *const T)
        }
    }

    unsafe fn sifields_mut<T>(&mut self) -> &mut T {
        unsafe {
            let base = (&mut self.raw as *mut libc::siginfo_t as *mut u8).add(SIFIELDS_OFFSET);
            &mut *(base as *mut T)
        }
    }

    fn sender_ctx(&self) -> ProcessCtx {
        let fields = unsafe { self.sifields::<SigRtFields>() };
        ProcessCtx {
            pid: ProcessId::new(fields.pid),
            uid: UserId::new(fields.uid),
        }
    }

    /// Data for signals sent via `kill()`/`tkill()`.
    pub fn user_sig_data(&self) -> Option<UserSigData> {
        matches!(self.source(), Source::User | Source::TKill).then(|| UserSigData {
            sender: self.sender_ctx(),
        })
    }

    /// Data for signals sent via `sigqueue()`.
    pub fn queue_sig_data(&self) -> Option<QueueSigData> {
        (self.source() == Source::Queue).then(|| QueueSigData {
            sender: self.sender_ctx(),
            data: CustomData {
                raw: unsafe { self.sifields::<SigRtFields>() }.value,
            },
        })
    }

    /// Data for POSIX message queue notification signals.
    pub fn msg_queue_data(&self) -> Option<MsgQueueData> {
        (self.source() == Source::MesgQ).then(|| MsgQueueData {
            msg_sender: self.sender_ctx(),
            data: CustomData {
                raw: unsafe { self.sifields::<SigRtFields>() }.value,
            },
        })
    }

    /// Data for POSIX timer expiry signals.
    pub fn timer_data(&self) -> Option<TimerData> {
        (self.source() == Source::Timer).then(|| {
            let fields = unsafe { self.sifields::<SigTimerFields>() };
            TimerData {
                id: TimerId(fields.tid),
                overrun: fields.overrun,
            }
        })
    }

    fn fault_addr(&self) -> *mut libc::c_void {
        unsafe { self.raw.si_addr() }
    }

    /// Data delivered with SIGILL.
    pub fn ill_data(&self) -> Option<IllData> {
        (self.signal() == Signal::ILL).then(|| IllData {
            addr: self.fault_addr(),
            reason: IllReason::from_code(self.raw.si_code),
        })
    }

    /// Data delivered with SIGFPE.
    pub fn fpe_data(&self) -> Option<FpeData> {
        (self.signal() == Signal::FPE).then(|| FpeData {
            addr: self.fault_addr(),
            reason: FpeReason::from_code(self.raw.si_code),
        })
    }

    /// Data delivered with SIGSEGV.
    pub fn segfault_data(&self) -> Option<SegfaultData> {
        (self.signal() == Signal::SEGV).then(|| SegfaultData {
            addr: self.fault_addr(),
            reason: match self.raw.si_code {
                SEGV_MAPERR => SegfaultReason::NotMapped,
                SEGV_ACCERR => SegfaultReason::AccessDenied,
                other => SegfaultReason::Other(other),
            },
        })
    }

    /// Data delivered with SIGBUS.
    pub fn bus_data(&self) -> Option<BusData> {
        (self.signal() == Signal::BUS).then(|| BusData {
            addr: self.fault_addr(),
            reason: BusReason::from_code(self.raw.si_code),
        })
    }

    /// Data delivered with SIGCHLD.
    pub fn child_data(&self) -> Option<ChildData> {
        if self.signal() != Signal::CHLD {
            return None;
        }
        let event = ChildEvent::from_raw(self.raw.si_code);
        let fields = unsafe { self.sifields::<SigChldFields>() };
        Some(ChildData {
            event,
            child: ProcessCtx {
                pid: ProcessId::new(fields.pid),
                uid: UserId::new(fields.uid),
            },
            status: event.exited().then(|| ExitStatus::new(fields.status)),
            signal: (!event.exited() && event != ChildEvent::Invalid)
                .then(|| Signal::from_raw(fields.status)),
            user_time: ClockTicks::new(fields.utime),
            system_time: ClockTicks::new(fields.stime),
        })
    }

    /// Data delivered with SIGSYS.
    pub fn sys_data(&self) -> Option<SysData> {
        (self.signal() == Signal::SYS).then(|| {
            let fields = unsafe { self.sifields::<SigSysFields>() };
            SysData {
                call_addr: fields.call_addr,
                syscall: fields.syscall,
                arch: fields.arch,
            }
        })
    }

    /// Data delivered with SIGIO.
    pub fn poll_data(&self) -> Option<PollData> {
        (self.signal() == Signal::IO).then(|| {
            let fields = unsafe { self.sifields::<SigPollFields>() };
            PollData {
                band: fields.band,
                fd: fields.fd,
            }
        })
    }

    pub fn raw(&self) -> &libc::siginfo_t {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut libc::siginfo_t {
        &mut self.raw
    }
}

impl Default for SigInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SigInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SigInfo(signo={}, code={}, source={:?})",
            self.raw.si_signo, self.raw.si_code, self.source()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_gate_on_kind() {
        let mut info = SigInfo::new();
        info.raw_mut().si_signo = libc::SIGSEGV;
        info.raw_mut().si_code = SEGV_MAPERR;
        assert!(info.segfault_data().is_some());
        assert!(info.child_data().is_none());
        assert!(info.timer_data().is_none());
        assert_eq!(
            info.segfault_data().unwrap().reason,
            SegfaultReason::NotMapped
        );
        assert!(info.is_trusted_source());
    }

    #[test]
    fn source_classification() {
        assert_eq!(Source::from_code(SI_USER), Source::User);
        assert_eq!(Source::from_code(SI_KERNEL), Source::Kernel);
        assert_eq!(Source::from_code(SI_QUEUE), Source::Queue);
        assert_eq!(Source::from_code(libc::CLD_EXITED), Source::Specific(libc::CLD_EXITED));
    }

    #[test]
    fn child_data_extraction() {
        let mut info = SigInfo::new();
        info.raw_mut().si_signo = libc::SIGCHLD;
        info.raw_mut().si_code = libc::CLD_EXITED;
        unsafe {
            let fields = info.sifields_mut::<SigChldFields>();
            fields.pid = 4321;
            fields.uid = 1000;
            fields.status = 7;
        }
        let child = info.child_data().unwrap();
        assert!(child.event.exited());
        assert_eq!(child.child.pid, ProcessId::new(4321));
        assert_eq!(child.status, Some(ExitStatus::new(7)));
        assert_eq!(child.signal, None);
    }
}
