//! Process file descriptors (pidfd).

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::fs::FdFile;
use crate::proc::signal::Signal;
use crate::proc::{ChildState, ProcessId, WaitFlags};

/// A non-owning file descriptor referring to a process.
///
/// Using a pidfd rules out PID-reuse races: the descriptor keeps referring
/// to the original process even after it exited and its PID was recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PidFd(FileDescriptor);

impl PidFd {
    pub const fn new(fd: FileDescriptor) -> PidFd {
        PidFd(fd)
    }

    pub const fn fd(self) -> FileDescriptor {
        self.0
    }

    pub const fn raw(self) -> FileNum {
        self.0.raw()
    }
}

/// An owning pidfd with process-level operations.
#[derive(Debug)]
pub struct ProcessFile {
    file: FdFile,
}

impl ProcessFile {
    /// Obtains a pidfd for the running process `pid`.
    pub fn open(pid: ProcessId) -> Result<ProcessFile> {
        let res = unsafe { libc::syscall(libc::SYS_pidfd_open, pid.raw(), 0 as libc::c_uint) };
        if res == -1 {
            return Err(Error::api("pidfd_open"));
        }
        Ok(ProcessFile {
            file: FdFile::new(FileDescriptor::new(FileNum::new(res as i32))),
        })
    }

    /// Takes ownership of an existing pidfd.
    pub fn from_pidfd(fd: PidFd) -> ProcessFile {
        ProcessFile {
            file: FdFile::new(fd.fd()),
        }
    }

    /// The borrowed pidfd value.
    pub fn pid_fd(&self) -> PidFd {
        PidFd::new(self.file.fd())
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    /// Sends `signal` to the represented process.
    pub fn send_signal(&self, signal: Signal) -> Result<()> {
        let res = unsafe {
            libc::syscall(
                libc::SYS_pidfd_send_signal,
                self.fd().raw().raw(),
                signal.raw(),
                std::ptr::null::<libc::siginfo_t>(),
                0 as libc::c_uint,
            )
        };
        if res == -1 {
            return Err(Error::api("pidfd_send_signal"));
        }
        Ok(())
    }

    /// Waits for the represented process, which must be a child of the
    /// caller.
    pub fn wait(&self) -> Result<Option<ChildState>> {
        crate::proc::wait(
            crate::proc::WaitTarget::Fd(self.pid_fd()),
            WaitFlags::WAIT_FOR_EXITED,
        )
    }

    /// Duplicates the descriptor number `target_fd` out of the represented
    /// process into the calling process.
    ///
    /// Requires ptrace-level permissions over the target.
    pub fn dup_fd(&self, target_fd: FileNum) -> Result<FileDescriptor> {
        let res = unsafe {
            libc::syscall(
                libc::SYS_pidfd_getfd,
                self.fd().raw().raw(),
                target_fd.raw(),
                0 as libc::c_uint,
            )
        };
        if res == -1 {
            return Err(Error::api("pidfd_getfd"));
        }
        Ok(FileDescriptor::new(FileNum::new(res as i32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ExitStatus;

    #[test]
    fn signal_and_wait_child() {
        match crate::proc::fork().unwrap() {
            None => {
                // spin until the parent kills us
                loop {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
            }
            Some(child_pid) => {
                let pidfd = ProcessFile::open(child_pid).unwrap();
                pidfd.send_signal(Signal::TERM).unwrap();
                let state = pidfd.wait().unwrap().unwrap();
                assert!(state.killed());
                assert_eq!(state.signal, Some(Signal::TERM));
                assert_eq!(state.child.pid, child_pid);
            }
        }
    }

    #[test]
    fn open_own_process() {
        let own = ProcessFile::open(crate::proc::get_own_pid()).unwrap();
        assert!(own.fd().valid());
        // signal 0 performs a pure permission check
        own.send_signal(Signal::NONE).unwrap();
    }

    #[test]
    fn wait_via_pidfd_target() {
        match crate::proc::fork().unwrap() {
            None => crate::proc::exit(ExitStatus::new(3)),
            Some(child_pid) => {
                let pidfd = ProcessFile::open(child_pid).unwrap();
                let state = pidfd.wait().unwrap().unwrap();
                assert!(state.exited());
                assert_eq!(state.status, Some(ExitStatus::new(3)));
            }
        }
    }
}
