//! A typed wrapper around the `ptrace()` system call.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::proc::siginfo::SigInfo;
use crate::proc::signal::Signal;
use crate::proc::ProcessId;

// Not exposed by libc for this target; kernel ABI (linux/ptrace.h).
const PTRACE_SECCOMP_GET_FILTER: libc::c_uint = 0x420c;

/// The individual `ptrace()` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Request {
    TraceMe = libc::PTRACE_TRACEME,
    PeekData = libc::PTRACE_PEEKDATA,
    PeekUser = libc::PTRACE_PEEKUSER,
    PokeData = libc::PTRACE_POKEDATA,
    PokeUser = libc::PTRACE_POKEUSER,
    Cont = libc::PTRACE_CONT,
    Kill = libc::PTRACE_KILL,
    SingleStep = libc::PTRACE_SINGLESTEP,
    Attach = libc::PTRACE_ATTACH,
    Detach = libc::PTRACE_DETACH,
    Syscall = libc::PTRACE_SYSCALL,
    SetOptions = libc::PTRACE_SETOPTIONS,
    GetEventMsg = libc::PTRACE_GETEVENTMSG,
    GetSigInfo = libc::PTRACE_GETSIGINFO,
    SetSigInfo = libc::PTRACE_SETSIGINFO,
    GetRegSet = libc::PTRACE_GETREGSET,
    SetRegSet = libc::PTRACE_SETREGSET,
    Seize = libc::PTRACE_SEIZE,
    Interrupt = libc::PTRACE_INTERRUPT,
    Listen = libc::PTRACE_LISTEN,
    PeekSigInfo = libc::PTRACE_PEEKSIGINFO,
    GetSigMask = libc::PTRACE_GETSIGMASK,
    SetSigMask = libc::PTRACE_SETSIGMASK,
    SeccompGetFilter = PTRACE_SECCOMP_GET_FILTER,
}

bitflags! {
    /// Tracing options for [`Tracee::seize`] and [`Tracee::set_options`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Opts: i32 {
        /// Deliver SIGKILL to the tracee when the tracer exits.
        const EXITKILL = libc::PTRACE_O_EXITKILL;
        /// Stop the tracee at the next clone() and auto-attach the child.
        const TRACECLONE = libc::PTRACE_O_TRACECLONE;
        /// Stop the tracee at the next execve().
        const TRACEEXEC = libc::PTRACE_O_TRACEEXEC;
        /// Stop the tracee at exit.
        const TRACEEXIT = libc::PTRACE_O_TRACEEXIT;
        /// Stop the tracee at the next fork() and auto-attach the child.
        const TRACEFORK = libc::PTRACE_O_TRACEFORK;
        /// Stop the tracee at the next vfork() and auto-attach the child.
        const TRACEVFORK = libc::PTRACE_O_TRACEVFORK;
        /// Stop the tracee at completion of the next vfork().
        const TRACEVFORKDONE = libc::PTRACE_O_TRACEVFORKDONE;
        /// Mark syscall stops with bit 7 in the stop signal (SIGTRAP|0x80).
        const TRACESYSGOOD = libc::PTRACE_O_TRACESYSGOOD;
        /// Stop the tracee when a seccomp rule with RET_TRACE fires.
        const TRACESECCOMP = libc::PTRACE_O_TRACESECCOMP;
        /// Suspend the tracee's seccomp protections (requires privileges).
        const SUSPENDSECCOMP = libc::PTRACE_O_SUSPEND_SECCOMP;
    }
}

/// The ways a stopped tracee can be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RestartMode {
    /// Continue execution normally.
    Cont = libc::PTRACE_CONT,
    /// Continue and detach from the tracee.
    Detach = libc::PTRACE_DETACH,
    /// Continue until the next syscall entry or exit.
    Syscall = libc::PTRACE_SYSCALL,
    /// Execute a single instruction.
    SingleStep = libc::PTRACE_SINGLESTEP,
    /// Keep the tracee in stopped state but let further events through.
    Listen = libc::PTRACE_LISTEN,
}

/// The register set identifiers for [`Tracee::get_reg_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RegSetType {
    /// The general purpose registers (`user_regs_struct`).
    General = libc::NT_PRSTATUS,
    /// The floating point registers (`user_fpregs_struct`).
    Float = libc::NT_PRFPREG,
}

/// One classic BPF instruction of a seccomp filter.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SeccompInstruction {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

/// A thin wrapper around `ptrace()` operating on a fixed process.
///
/// No resources are managed here; the tracee relationship itself is the
/// only state, and it lives in the kernel.
#[derive(Debug, Clone, Copy)]
pub struct Tracee {
    pid: ProcessId,
}

impl Tracee {
    pub const fn new(pid: ProcessId) -> Tracee {
        Tracee { pid }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn valid(&self) -> bool {
        self.pid != ProcessId::INVALID
    }

    /// Turns the calling process into a tracee of its parent.
    pub fn trace_me() -> Result<()> {
        let res = unsafe {
            libc::ptrace(
                libc::PTRACE_TRACEME,
                0,
                std::ptr::null_mut::<libc::c_void>(),
                std::ptr::null_mut::<libc::c_void>(),
            )
        };
        if res == -1 {
            return Err(Error::api("ptrace(TRACEME)"));
        }
        Ok(())
    }

    fn request(
        &self,
        request: u32,
        addr: *mut libc::c_void,
        data: *mut libc::c_void,
    ) -> Result<libc::c_long> {
        crate::error::Errno::reset();
        let res = unsafe { libc::ptrace(request, self.pid.raw(), addr, data) };
        if res == -1 && crate::error::Errno::last() != crate::error::Errno::NoError {
            return Err(Error::api("ptrace"));
        }
        Ok(res)
    }

    /// Makes the target process a tracee, the modern way.
    ///
    /// The process is not stopped by this. Options are applied atomically
    /// alongside the seize.
    pub fn seize(&self, opts: Opts) -> Result<()> {
        self.request(
            libc::PTRACE_SEIZE,
            std::ptr::null_mut(),
            opts.bits() as *mut libc::c_void,
        )?;
        Ok(())
    }

    /// Makes the target process a tracee, the legacy way.
    ///
    /// The tracee receives a synthetic SIGSTOP that the tracer needs to wait
    /// for and suppress; this method has inherent races, prefer
    /// [`seize`](Self::seize).
    pub fn attach(&self) -> Result<()> {
        self.request(libc::PTRACE_ATTACH, std::ptr::null_mut(), std::ptr::null_mut())?;
        Ok(())
    }

    /// Detaches from and restarts the tracee.
    pub fn detach(&self) -> Result<()> {
        self.request(libc::PTRACE_DETACH, std::ptr::null_mut(), std::ptr::null_mut())?;
        Ok(())
    }

    /// Restarts a stopped tracee, optionally injecting `signal`.
    ///
    /// Signal injection is only valid in signal-stop states and not with
    /// [`RestartMode::Listen`].
    pub fn restart(&self, mode: RestartMode, signal: Option<Signal>) -> Result<()> {
        let data = match (mode, signal) {
            (RestartMode::Listen, _) | (_, None) => 0,
            (_, Some(signal)) => signal.raw() as isize,
        };
        self.request(mode as u32, std::ptr::null_mut(), data as *mut libc::c_void)?;
        Ok(())
    }

    /// Interrupts a seized tracee, moving it into a trace stop.
    pub fn interrupt(&self) -> Result<()> {
        self.request(
            libc::PTRACE_INTERRUPT,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )?;
        Ok(())
    }

    /// Replaces the set of tracing options in effect.
    pub fn set_options(&self, opts: Opts) -> Result<()> {
        self.request(
            libc::PTRACE_SETOPTIONS,
            std::ptr::null_mut(),
            opts.bits() as *mut libc::c_void,
        )?;
        Ok(())
    }

    /// Reads one word from the tracee's memory.
    pub fn peek_data(&self, addr: *const libc::c_long) -> Result<libc::c_long> {
        self.request(
            libc::PTRACE_PEEKDATA,
            addr as *mut libc::c_void,
            std::ptr::null_mut(),
        )
    }

    /// Writes one word into the tracee's memory.
    pub fn poke_data(&self, addr: *const libc::c_long, value: libc::c_long) -> Result<()> {
        self.request(
            libc::PTRACE_POKEDATA,
            addr as *mut libc::c_void,
            value as *mut libc::c_void,
        )?;
        Ok(())
    }

    /// Reads one word from the tracee's user area at `offset`.
    pub fn peek_user(&self, offset: usize) -> Result<libc::c_long> {
        self.request(
            libc::PTRACE_PEEKUSER,
            offset as *mut libc::c_void,
            std::ptr::null_mut(),
        )
    }

    /// Writes one word into the tracee's user area at `offset`.
    pub fn poke_user(&self, offset: usize, value: libc::c_long) -> Result<()> {
        self.request(
            libc::PTRACE_POKEUSER,
            offset as *mut libc::c_void,
            value as *mut libc::c_void,
        )?;
        Ok(())
    }

    /// Reads a register set from the tracee into `buf`, returning the
    /// number of bytes the kernel filled in.
    pub fn get_reg_set(&self, set: RegSetType, buf: &mut [u8]) -> Result<usize> {
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast(),
            iov_len: buf.len(),
        };
        self.request(
            libc::PTRACE_GETREGSET,
            set as i32 as *mut libc::c_void,
            (&mut iov as *mut libc::iovec).cast(),
        )?;
        Ok(iov.iov_len)
    }

    /// Writes a register set from `buf` into the tracee.
    pub fn set_reg_set(&self, set: RegSetType, buf: &[u8]) -> Result<()> {
        let mut iov = libc::iovec {
            iov_base: buf.as_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        self.request(
            libc::PTRACE_SETREGSET,
            set as i32 as *mut libc::c_void,
            (&mut iov as *mut libc::iovec).cast(),
        )?;
        Ok(())
    }

    /// The signal information for the signal that caused the current stop.
    pub fn get_siginfo(&self) -> Result<SigInfo> {
        let mut info = SigInfo::new();
        self.request(
            libc::PTRACE_GETSIGINFO,
            std::ptr::null_mut(),
            (info.raw_mut() as *mut libc::siginfo_t).cast(),
        )?;
        Ok(info)
    }

    /// The event message belonging to the current ptrace-event-stop
    /// (e.g. the new PID for fork events, the exit status for exit events).
    pub fn get_event_msg(&self) -> Result<u64> {
        let mut msg: libc::c_ulong = 0;
        self.request(
            libc::PTRACE_GETEVENTMSG,
            std::ptr::null_mut(),
            (&mut msg as *mut libc::c_ulong).cast(),
        )?;
        Ok(msg)
    }

    /// Extracts the tracee's classic-BPF seccomp filter with index
    /// `filter_index` (0 is the most recently installed one).
    ///
    /// Requires CAP_SYS_ADMIN and the tracee stopped.
    pub fn get_seccomp_filter(&self, filter_index: usize) -> Result<Vec<SeccompInstruction>> {
        // first query the instruction count
        let count = self.request(
            PTRACE_SECCOMP_GET_FILTER,
            filter_index as *mut libc::c_void,
            std::ptr::null_mut(),
        )?;
        let mut filter = vec![SeccompInstruction::default(); count as usize];
        self.request(
            PTRACE_SECCOMP_GET_FILTER,
            filter_index as *mut libc::c_void,
            filter.as_mut_ptr().cast(),
        )?;
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::{ExitStatus, WaitFlags, WaitTarget};

    #[test]
    fn trace_child_stop_and_continue() {
        match crate::proc::fork().unwrap() {
            None => {
                if Tracee::trace_me().is_err() {
                    crate::proc::exit(ExitStatus::FAILURE);
                }
                // stop so the parent gains control
                let _ = crate::proc::signal::raise(Signal::STOP);
                crate::proc::exit(ExitStatus::new(5));
            }
            Some(pid) => {
                let tracee = Tracee::new(pid);
                let state = crate::proc::wait(
                    WaitTarget::Process(pid),
                    WaitFlags::WAIT_FOR_EXITED | WaitFlags::WAIT_FOR_STOPPED,
                )
                .unwrap()
                .unwrap();
                // traced children report stops as trap events
                assert!(state.stopped() || state.event.trapped());

                let info = tracee.get_siginfo().unwrap();
                assert_eq!(info.signal(), Signal::STOP);

                tracee.restart(RestartMode::Cont, None).unwrap();
                let state = crate::proc::wait(
                    WaitTarget::Process(pid),
                    WaitFlags::WAIT_FOR_EXITED,
                )
                .unwrap()
                .unwrap();
                assert!(state.exited());
                assert_eq!(state.status, Some(ExitStatus::new(5)));
            }
        }
    }

    #[test]
    fn register_read_from_stopped_child() {
        match crate::proc::fork().unwrap() {
            None => {
                if Tracee::trace_me().is_err() {
                    crate::proc::exit(ExitStatus::FAILURE);
                }
                let _ = crate::proc::signal::raise(Signal::STOP);
                crate::proc::exit(ExitStatus::SUCCESS);
            }
            Some(pid) => {
                let tracee = Tracee::new(pid);
                let state = crate::proc::wait(
                    WaitTarget::Process(pid),
                    WaitFlags::WAIT_FOR_EXITED | WaitFlags::WAIT_FOR_STOPPED,
                )
                .unwrap()
                .unwrap();
                assert!(state.stopped() || state.event.trapped());

                let mut regs = [0u8; 1024];
                let filled = tracee.get_reg_set(RegSetType::General, &mut regs).unwrap();
                assert!(filled > 0 && filled <= regs.len());

                tracee.restart(RestartMode::Detach, None).unwrap();
                let state = crate::proc::wait(
                    WaitTarget::Process(pid),
                    WaitFlags::WAIT_FOR_EXITED,
                )
                .unwrap()
                .unwrap();
                assert!(state.exited());
            }
        }
    }
}
