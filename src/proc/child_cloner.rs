//! Configurable child process creation.

use std::ffi::{CStr, CString};
use std::fmt;

use log::error;

use crate::error::{Errno, Error, Result};
use crate::fd::{FileDescriptor, FileNum, STDERR, STDIN, STDOUT};
use crate::io::Pipe;
use crate::proc::pidfd::ProcessFile;
use crate::proc::scheduler::SchedulerSettings;
use crate::proc::signal::{SigSet, Signal, unblock};
use crate::proc::{ChildState, ExitStatus, ProcessId, WaitFlags};
use crate::types::{CloseOnExec, SysString};

/// Callback invoked in child process context before exec.
pub type PostForkCallback = Box<dyn Fn(&ChildCloner)>;

/// Sub process creation facility.
///
/// A rather heavyweight configuration object that can be reused across
/// multiple [`run`](ChildCloner::run) calls; the returned [`SubProc`] is
/// lightweight in contrast.
///
/// By default the child inherits stdin/stdout/stderr, the working directory
/// and the environment of the parent. Redirection descriptors are expected
/// to carry the close-on-exec flag; the implementation re-arms inheritance
/// in child context, where doing so cannot race other threads of the
/// parent.
#[derive(Default)]
pub struct ChildCloner {
    executable: Option<CString>,
    argv: Vec<CString>,
    cwd: Option<CString>,
    env: Option<Vec<CString>>,
    stdin: Option<FileDescriptor>,
    stdout: Option<FileDescriptor>,
    stderr: Option<FileDescriptor>,
    inherit_fds: Vec<FileDescriptor>,
    sched_settings: Option<SchedulerSettings>,
    post_fork_cb: Option<PostForkCallback>,
    allow_no_exe: bool,
    forward_child_errors: bool,
}

impl ChildCloner {
    pub fn new() -> ChildCloner {
        ChildCloner::default()
    }

    /// Whether an executable is currently configured.
    pub fn has_exe(&self) -> bool {
        self.executable.is_some()
    }

    /// Sets the executable path and argv0.
    ///
    /// argv0 always follows the executable; adjust it via
    /// [`args_mut`](Self::args_mut) for special cases.
    pub fn set_exe(&mut self, exe: impl Into<CString>) -> &mut Self {
        let exe = exe.into();
        self.allow_no_exe = false;
        if self.argv.is_empty() {
            self.argv.push(exe.clone());
        } else {
            self.argv[0] = exe.clone();
        }
        self.executable = Some(exe);
        self
    }

    /// Declares that no program is to be executed.
    ///
    /// A post-fork callback must be set; it becomes the entry point of the
    /// child and should leave via [`crate::proc::exit`]. If it returns,
    /// `ExitStatus::SUCCESS` is implied.
    pub fn set_no_exe(&mut self) -> &mut Self {
        self.allow_no_exe = true;
        self.executable = None;
        self
    }

    /// Sets the full argument vector including argv0, deriving the
    /// executable from its first element.
    pub fn set_args(&mut self, args: Vec<CString>) -> &mut Self {
        self.argv = args;
        self.executable = self.argv.first().cloned();
        self
    }

    /// The currently configured argument vector including argv0.
    pub fn args(&self) -> &[CString] {
        &self.argv
    }

    pub fn args_mut(&mut self) -> &mut Vec<CString> {
        &mut self.argv
    }

    /// Sets an explicit working directory for the child.
    pub fn set_cwd(&mut self, cwd: impl Into<CString>) -> &mut Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Lets the child inherit the parent's working directory again.
    pub fn set_inherit_cwd(&mut self) -> &mut Self {
        self.cwd = None;
        self
    }

    /// Sets the complete child environment as `name=value` entries.
    pub fn set_env(&mut self, vars: Vec<CString>) -> &mut Self {
        self.env = Some(vars);
        self
    }

    /// Lets the child inherit the parent's environment again.
    pub fn set_inherit_env(&mut self) -> &mut Self {
        self.env = None;
        self
    }

    /// Redirects the child's stdin to `fd` (expected to be CLOEXEC).
    pub fn set_stdin(&mut self, fd: FileDescriptor) -> &mut Self {
        self.stdin = Some(fd);
        self
    }

    /// Redirects the child's stdout to `fd` (expected to be CLOEXEC).
    pub fn set_stdout(&mut self, fd: FileDescriptor) -> &mut Self {
        self.stdout = Some(fd);
        self
    }

    /// Redirects the child's stderr to `fd` (expected to be CLOEXEC).
    pub fn set_stderr(&mut self, fd: FileDescriptor) -> &mut Self {
        self.stderr = Some(fd);
        self
    }

    /// Restores default inheritance for the stdio descriptors.
    pub fn reset_std_files(&mut self) -> &mut Self {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        self
    }

    /// Marks an additional descriptor for inheritance into the child.
    ///
    /// `fd` keeps its number in the child, so it must not be one of the
    /// stdio numbers (use the redirection setters for those). Ownership
    /// stays with the caller; the descriptor must stay valid until
    /// [`run`](Self::run).
    pub fn add_inherit_fd(&mut self, fd: FileDescriptor) -> Result<&mut Self> {
        if fd.raw() <= FileNum::STDERR {
            return Err(Error::Usage("added stdio or invalid FD as extra inherit FD"));
        }
        self.inherit_fds.push(fd);
        Ok(self)
    }

    /// Applies explicit scheduling settings in the child; by default the
    /// parent's settings are inherited.
    pub fn set_scheduler_settings(&mut self, settings: SchedulerSettings) -> &mut Self {
        self.sched_settings = Some(settings);
        self
    }

    /// Clears previously set scheduler settings, inheriting them again.
    pub fn set_inherit_scheduler_settings(&mut self) -> &mut Self {
        self.sched_settings = None;
        self
    }

    /// Enables forwarding of pre-exec errors through a pipe.
    ///
    /// With forwarding enabled, a failure in child context before `execve()`
    /// makes [`run`](Self::run) fail synchronously instead of the child
    /// exiting with one of the conventional sentinel statuses. Creating the
    /// pipe makes process creation slightly more expensive, hence the
    /// opt-in. Incompatible with post-fork callbacks that block the child.
    pub fn set_forward_child_errors(&mut self, forward: bool) -> &mut Self {
        self.forward_child_errors = forward;
        self
    }

    /// Installs a callback invoked in child context after all redirections,
    /// before exec.
    pub fn set_post_fork_cb(&mut self, cb: PostForkCallback) -> &mut Self {
        self.post_fork_cb = Some(cb);
        self
    }

    pub fn reset_post_fork_cb(&mut self) -> &mut Self {
        self.post_fork_cb = None;
        self
    }

    /// Clones a new process and executes the configured program.
    ///
    /// Without error forwarding, pre-exec failures surface through the
    /// conventional exit statuses [`ExitStatus::PROG_NOT_FOUND`],
    /// [`ExitStatus::PROG_NOT_EXECUTABLE`] and
    /// [`ExitStatus::PRE_EXEC_ERROR`] in the wait result.
    pub fn run(&self) -> Result<SubProc> {
        if self.executable.is_none() && !self.allow_no_exe {
            return Err(Error::Usage("no executable configured for run()"));
        }
        if self.allow_no_exe && self.post_fork_cb.is_none() {
            return Err(Error::Usage("set_no_exe() requires a post fork callback"));
        }

        let mut error_pipe = if self.forward_child_errors {
            Some(Pipe::new()?)
        } else {
            None
        };

        match crate::proc::fork()? {
            None => self.run_child(&mut error_pipe),
            Some(pid) => {
                let pidfd = ProcessFile::open(pid)?;
                if let Some(mut pipe) = error_pipe {
                    pipe.close_write_end()?;
                    self.await_exec_outcome(pid, &pipe)?;
                }
                Ok(SubProc {
                    pid,
                    pidfd,
                    reaped: false,
                })
            }
        }
    }

    /// Waits for the exec in the child; a payload on the pipe means it
    /// failed.
    fn await_exec_outcome(&self, pid: ProcessId, pipe: &Pipe) -> Result<()> {
        let mut buf = [0u8; 4];
        let mut got = 0;
        while got < buf.len() {
            match pipe.read(&mut buf[got..])? {
                0 => break,
                n => got += n,
            }
        }
        if got == 0 {
            // pipe closed by a successful execve
            return Ok(());
        }
        let errno = Errno::from(i32::from_ne_bytes(buf));
        // reap the failed child so no zombie remains
        let _ = crate::proc::wait(
            crate::proc::WaitTarget::Process(pid),
            WaitFlags::WAIT_FOR_EXITED,
        );
        Err(Error::api_errno("pre-exec setup in child", errno))
    }

    fn run_child(&self, error_pipe: &mut Option<Pipe>) -> ! {
        let errno = self.setup_and_exec();
        // only reached on failure
        if let Some(pipe) = error_pipe {
            let _ = pipe.write(&errno.raw().to_ne_bytes());
        }
        let status = match errno {
            Errno::NoEntry => ExitStatus::PROG_NOT_FOUND,
            Errno::Access | Errno::NotExecutable => ExitStatus::PROG_NOT_EXECUTABLE,
            _ => ExitStatus::PRE_EXEC_ERROR,
        };
        crate::proc::exit(status);
    }

    fn setup_and_exec(&self) -> Errno {
        // the blocked signal mask survives execve, restore defaults
        if unblock(&SigSet::full()).is_err() {
            return Errno::last();
        }

        if let Some(cwd) = &self.cwd {
            if unsafe { libc::chdir(cwd.as_ptr()) } == -1 {
                return Errno::last();
            }
        }

        let redirections = [
            (self.stdin, STDIN),
            (self.stdout, STDOUT),
            (self.stderr, STDERR),
        ];
        for (redirect, target) in redirections {
            if let Some(fd) = redirect {
                // dup3 without CLOEXEC re-arms inheritance; doing this in
                // child context cannot race threads of the parent
                if fd.duplicate_to(target, CloseOnExec::new(false)).is_err() {
                    return Errno::last();
                }
            }
        }

        for fd in &self.inherit_fds {
            if fd.set_close_on_exec(false).is_err() {
                return Errno::last();
            }
        }

        if let Some(settings) = &self.sched_settings {
            if settings.apply(ProcessId::SELF).is_err() {
                return Errno::last();
            }
        }

        if let Some(cb) = &self.post_fork_cb {
            cb(self);
        }

        let Some(exe) = &self.executable else {
            // no-exe mode: the callback was the child's entry point
            crate::proc::exit(ExitStatus::SUCCESS);
        };

        let argv: Vec<&CStr> = self.argv.iter().map(CString::as_c_str).collect();
        let env: Option<Vec<&CStr>> = self
            .env
            .as_ref()
            .map(|vars| vars.iter().map(CString::as_c_str).collect());

        let err = crate::proc::exec(SysString::from(exe), Some(&argv), env.as_deref())
            .unwrap_err();
        err.errno().unwrap_or(Errno::Unknown(0))
    }
}

impl fmt::Debug for ChildCloner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCloner")
            .field("executable", &self.executable)
            .field("argv", &self.argv)
            .field("cwd", &self.cwd)
            .field("forward_child_errors", &self.forward_child_errors)
            .finish_non_exhaustive()
    }
}

/// A handle for a running child process created via [`ChildCloner::run`].
///
/// Move-only; the child must be reaped via [`wait`](SubProc::wait) before
/// the handle is dropped, otherwise the process aborts (a silently leaked
/// zombie would be worse to debug).
#[derive(Debug)]
pub struct SubProc {
    pid: ProcessId,
    pidfd: ProcessFile,
    reaped: bool,
}

impl SubProc {
    /// The process ID of the child.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// The pidfd referring to the child.
    pub fn process_file(&self) -> &ProcessFile {
        &self.pidfd
    }

    /// Sends `signal` to the child via its pidfd.
    pub fn kill(&self, signal: Signal) -> Result<()> {
        self.pidfd.send_signal(signal)
    }

    /// Performs a blocking wait for the child to exit.
    pub fn wait(&mut self) -> Result<ChildState> {
        let state = self
            .pidfd
            .wait()?
            .ok_or(Error::Runtime("blocking wait returned no child state"))?;
        self.reaped = true;
        Ok(state)
    }

    /// Checks for an exit without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ChildState>> {
        let state = crate::proc::wait(
            crate::proc::WaitTarget::Fd(self.pidfd.pid_fd()),
            WaitFlags::WAIT_FOR_EXITED | WaitFlags::NO_HANG,
        )?;
        if state.is_some() {
            self.reaped = true;
        }
        Ok(state)
    }
}

impl Drop for SubProc {
    fn drop(&mut self) {
        if !self.reaped {
            error!("child process {} was not reaped", self.pid.raw());
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FdFile;
    use std::io::Read;

    #[test]
    fn simple_run_and_wait() {
        let mut cloner = ChildCloner::new();
        cloner.set_exe(c"true");
        let mut child = cloner.run().unwrap();
        let state = child.wait().unwrap();
        assert!(state.exited());
        assert_eq!(state.status, Some(ExitStatus::SUCCESS));

        // the configuration object is reusable
        let mut child = cloner.run().unwrap();
        assert!(child.wait().unwrap().exited());
    }

    #[test]
    fn stdout_redirection() {
        let mut pipe = Pipe::new().unwrap();
        let mut cloner = ChildCloner::new();
        cloner.set_args(vec![
            CString::from(c"echo"),
            CString::from(c"hello from child"),
        ]);
        cloner.set_stdout(pipe.write_end());
        let mut child = cloner.run().unwrap();
        pipe.close_write_end().unwrap();
        let mut out = String::new();
        FdFile::new(pipe.take_read_end())
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello from child\n");
        assert!(child.wait().unwrap().exited());
    }

    #[test]
    fn missing_program_sentinel_status() {
        let mut cloner = ChildCloner::new();
        cloner.set_exe(c"/no/such/program-3141");
        let mut child = cloner.run().unwrap();
        let state = child.wait().unwrap();
        assert!(state.exited());
        assert_eq!(state.status, Some(ExitStatus::PROG_NOT_FOUND));
    }

    #[test]
    fn forwarded_pre_exec_error() {
        let mut cloner = ChildCloner::new();
        cloner.set_exe(c"/no/such/program-3141");
        cloner.set_forward_child_errors(true);
        let err = cloner.run().unwrap_err();
        assert_eq!(err.errno(), Some(Errno::NoEntry));
    }

    #[test]
    fn cwd_override() {
        let mut pipe = Pipe::new().unwrap();
        let mut cloner = ChildCloner::new();
        cloner.set_exe(c"pwd");
        cloner.set_cwd(c"/tmp");
        cloner.set_stdout(pipe.write_end());
        let mut child = cloner.run().unwrap();
        pipe.close_write_end().unwrap();
        let mut out = String::new();
        FdFile::new(pipe.take_read_end())
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out.trim_end(), "/tmp");
        assert!(child.wait().unwrap().exited());
    }
}
