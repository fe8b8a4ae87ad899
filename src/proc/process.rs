//! Process identity, environment access, fork/wait/exec and exit.

use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicI32, Ordering};

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::fd::{DirFd, FileDescriptor};
use crate::proc::pidfd::PidFd;
use crate::proc::siginfo::SigInfo;
use crate::proc::{ChildState, ProcessGroupId, ProcessId, WaitFlags};
use crate::proc::{GroupId, UserId};
use crate::types::{FollowSymlinks, OverwriteEnv, SysString};

unsafe extern "C" {
    static mut environ: *const *const libc::c_char;
}

static CACHED_OWN_PID: AtomicI32 = AtomicI32::new(-1);
static CACHED_PARENT_PID: AtomicI32 = AtomicI32::new(-1);

/// Re-reads the cached own/parent PIDs (called from library init and after
/// fork in the child).
pub(crate) fn refresh_cached_pids() {
    CACHED_OWN_PID.store(unsafe { libc::getpid() }, Ordering::Relaxed);
    CACHED_PARENT_PID.store(unsafe { libc::getppid() }, Ordering::Relaxed);
}

/// The own and parent PID captured once at library init.
#[derive(Debug, Clone, Copy)]
pub struct CachedPids {
    pub own: ProcessId,
    pub parent: ProcessId,
}

/// The PIDs captured at init time, avoiding repeated system calls.
///
/// Falls back to live queries when the library was not initialized.
pub fn cached_pids() -> CachedPids {
    let own = CACHED_OWN_PID.load(Ordering::Relaxed);
    if own == -1 {
        return CachedPids {
            own: get_own_pid(),
            parent: get_parent_pid(),
        };
    }
    CachedPids {
        own: ProcessId::new(own),
        parent: ProcessId::new(CACHED_PARENT_PID.load(Ordering::Relaxed)),
    }
}

/// The process ID of the calling process.
pub fn get_own_pid() -> ProcessId {
    ProcessId::new(unsafe { libc::getpid() })
}

/// The process ID of the parent of the calling process.
pub fn get_parent_pid() -> ProcessId {
    ProcessId::new(unsafe { libc::getppid() })
}

/// The real user ID the calling process runs as.
pub fn get_real_user_id() -> UserId {
    UserId::new(unsafe { libc::getuid() })
}

/// The effective user ID the calling process runs as.
///
/// May differ from the real ID for setuid programs or after privilege
/// changes.
pub fn get_effective_user_id() -> UserId {
    UserId::new(unsafe { libc::geteuid() })
}

/// The real group ID the calling process runs as.
pub fn get_real_group_id() -> GroupId {
    GroupId::new(unsafe { libc::getgid() })
}

/// The effective group ID the calling process runs as.
pub fn get_effective_group_id() -> GroupId {
    GroupId::new(unsafe { libc::getegid() })
}

/// The process group ID of the calling process.
pub fn get_own_process_group() -> ProcessGroupId {
    ProcessGroupId::new(unsafe { libc::getpgrp() })
}

/// The process group ID of the given process.
///
/// Fails with `Errno::Search` if `pid` does not exist.
pub fn get_process_group_of(pid: ProcessId) -> Result<ProcessGroupId> {
    let res = unsafe { libc::getpgid(pid.raw()) };
    if res == -1 {
        return Err(Error::api("getpgid"));
    }
    Ok(ProcessGroupId::new(res))
}

/// Moves `pid` into the process group `pgid`.
///
/// Error conditions map to `Errno::Access` (the child already exec'd),
/// `Errno::InvalidArg` (negative pgid), `Errno::Permission` (session
/// boundary violations or unknown pgid) and `Errno::Search` (`pid` is
/// neither the caller nor one of its children).
pub fn set_process_group_of(pid: ProcessId, pgid: ProcessGroupId) -> Result<()> {
    if unsafe { libc::setpgid(pid.raw(), pgid.raw()) } == -1 {
        return Err(Error::api("setpgid"));
    }
    Ok(())
}

/// Whether the given process is a process group leader.
pub fn is_process_group_leader(pid: ProcessId) -> Result<bool> {
    let target = if pid == ProcessId::SELF {
        get_own_pid()
    } else {
        pid
    };
    Ok(get_process_group_of(pid)?.raw() == target.raw())
}

/// Creates a new session with the calling process as leader.
///
/// The process also becomes leader of a new process group within the
/// session. Fails if the caller already is a process group leader. The new
/// session has no controlling terminal.
pub fn create_new_session() -> Result<ProcessId> {
    let res = unsafe { libc::setsid() };
    if res == -1 {
        return Err(Error::api("setsid"));
    }
    Ok(ProcessId::new(res))
}

/// The value of the environment variable `name`, if set.
pub fn get_env_var<'a>(name: impl Into<SysString<'a>>) -> Option<CString> {
    let name = name.into();
    let val = unsafe { libc::getenv(name.raw()) };
    if val.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(val) }.to_owned())
}

/// Whether the environment variable `name` is set.
pub fn exists_env_var<'a>(name: impl Into<SysString<'a>>) -> bool {
    get_env_var(name).is_some()
}

/// Sets the environment variable `name` to `value`.
///
/// An existing value is only replaced when `overwrite` says so.
pub fn set_env_var<'a, 'b>(
    name: impl Into<SysString<'a>>,
    value: impl Into<SysString<'b>>,
    overwrite: OverwriteEnv,
) -> Result<()> {
    let (name, value) = (name.into(), value.into());
    let res = unsafe { libc::setenv(name.raw(), value.raw(), overwrite.get() as libc::c_int) };
    if res == -1 {
        return Err(Error::api("setenv"));
    }
    Ok(())
}

/// Removes the environment variable `name`.
pub fn clear_env_var<'a>(name: impl Into<SysString<'a>>) -> Result<()> {
    let name = name.into();
    if unsafe { libc::unsetenv(name.raw()) } == -1 {
        return Err(Error::api("unsetenv"));
    }
    Ok(())
}

/// Forks the calling process.
///
/// Returns `None` in the child process context and the child's PID in the
/// parent. The parent is responsible for reaping the child via [`wait`].
pub fn fork() -> Result<Option<ProcessId>> {
    let res = unsafe { libc::fork() };
    match res {
        -1 => Err(Error::api("fork")),
        0 => {
            refresh_cached_pids();
            Ok(None)
        }
        pid => Ok(Some(ProcessId::new(pid))),
    }
}

/// What to wait for in [`wait`].
#[derive(Debug, Clone, Copy)]
pub enum WaitTarget {
    /// A specific child process.
    Process(ProcessId),
    /// Any child within the given process group;
    /// [`ProcessGroupId::SELF`] means the caller's own group.
    Group(ProcessGroupId),
    /// Any child process.
    AnyChild,
    /// The child referred to by the given pidfd.
    Fd(PidFd),
}

/// Waits for a state change of the targeted child process(es).
///
/// With [`WaitFlags::NO_HANG`], `None` is returned when no matching child
/// changed state yet. By default a blocking wait for child exit is wanted;
/// pass [`WaitFlags::WAIT_FOR_EXITED`] plus any additions.
pub fn wait(target: WaitTarget, flags: WaitFlags) -> Result<Option<ChildState>> {
    let (idtype, id) = match target {
        WaitTarget::Process(pid) => (libc::P_PID, pid.raw() as libc::id_t),
        WaitTarget::Group(ProcessGroupId::SELF) => (libc::P_PGID, 0),
        WaitTarget::Group(pgid) => (libc::P_PGID, pgid.raw() as libc::id_t),
        WaitTarget::AnyChild => (libc::P_ALL, 0),
        WaitTarget::Fd(fd) => (libc::P_PIDFD, fd.raw().raw() as libc::id_t),
    };
    let mut info = SigInfo::new();
    let res = crate::init::retry_int(|| unsafe {
        libc::waitid(idtype, id, info.raw_mut(), flags.bits())
    });
    if res == -1 {
        return Err(Error::api("waitid"));
    }
    let Some(child) = info.child_data() else {
        // WNOHANG with no pending state change leaves the struct zeroed
        return Ok(None);
    };
    if child.child.pid == ProcessId::new(0) {
        return Ok(None);
    }
    Ok(Some(ChildState {
        event: child.event,
        child: child.child,
        status: child.status,
        signal: child.signal,
        user_time: Some(child.user_time),
        system_time: Some(child.system_time),
    }))
}

/// Convenience wrapper waiting for the exit of a specific child.
pub fn wait_for(pid: ProcessId) -> Result<Option<ChildState>> {
    wait(WaitTarget::Process(pid), WaitFlags::WAIT_FOR_EXITED)
}

fn build_argv<'a>(
    path: SysString<'_>,
    args: Option<&'a [&'a CStr]>,
    out: &mut SmallVec<[*const libc::c_char; 16]>,
) {
    match args {
        Some(args) if !args.is_empty() => {
            for arg in args {
                out.push(arg.as_ptr());
            }
        }
        _ => out.push(path.raw()),
    }
    out.push(std::ptr::null());
}

fn build_envp<'a>(
    env: Option<&'a [&'a CStr]>,
    out: &mut SmallVec<[*const libc::c_char; 16]>,
) -> *const *const libc::c_char {
    match env {
        Some(env) => {
            for var in env {
                out.push(var.as_ptr());
            }
            out.push(std::ptr::null());
            out.as_ptr()
        }
        None => unsafe { environ },
    }
}

/// Replaces the current process by executing the program found at `path`.
///
/// When `path` contains no slash a PATH lookup is performed. `args[0]`
/// conventionally carries the program name and may differ from `path`; when
/// `args` is absent, `path` is passed as `argv[0]`. Without `env`, the
/// current environment is inherited. On success this call does not return.
pub fn exec<'a>(
    path: impl Into<SysString<'a>>,
    args: Option<&[&CStr]>,
    env: Option<&[&CStr]>,
) -> Result<Infallible> {
    let path = path.into();
    let mut argv = SmallVec::new();
    build_argv(path, args, &mut argv);
    let mut envp_store = SmallVec::new();
    let envp = build_envp(env, &mut envp_store);

    let search_path = memchr::memchr(b'/', path.view()).is_none();
    unsafe {
        if search_path {
            libc::execvpe(path.raw(), argv.as_ptr(), envp);
        } else {
            libc::execve(path.raw(), argv.as_ptr(), envp);
        }
    }
    Err(Error::api("execve"))
}

/// Variant of [`exec`] that looks up `path` relative to `dir_fd`.
///
/// With an unset `follow_symlinks`, execution of a symlink target fails with
/// `Errno::LinkLoop`.
pub fn exec_at<'a>(
    dir_fd: DirFd,
    path: impl Into<SysString<'a>>,
    args: Option<&[&CStr]>,
    env: Option<&[&CStr]>,
    follow_symlinks: FollowSymlinks,
) -> Result<Infallible> {
    let path = path.into();
    let mut argv = SmallVec::new();
    build_argv(path, args, &mut argv);
    let mut envp_store = SmallVec::new();
    let envp = build_envp(env, &mut envp_store);
    let flags = if follow_symlinks.get() {
        0
    } else {
        libc::AT_SYMLINK_NOFOLLOW
    };
    unsafe {
        libc::syscall(
            libc::SYS_execveat,
            dir_fd.raw().raw(),
            path.raw(),
            argv.as_ptr(),
            envp,
            flags,
        );
    }
    Err(Error::api("execveat"))
}

/// Variant of [`exec`] executing an already open file.
///
/// Note that a script with a shebang line cannot be executed this way when
/// `fd` carries the close-on-exec flag: the interpreter would find the
/// descriptor already closed.
pub fn fexec(fd: FileDescriptor, args: Option<&[&CStr]>, env: Option<&[&CStr]>) -> Result<Infallible> {
    let mut argv = SmallVec::new();
    build_argv(SysString::empty(), args, &mut argv);
    let mut envp_store = SmallVec::new();
    let envp = build_envp(env, &mut envp_store);
    unsafe {
        libc::fexecve(fd.raw().raw(), argv.as_ptr(), envp);
    }
    Err(Error::api("fexecve"))
}

/// Terminates the calling process immediately, without running userspace
/// cleanup handlers.
pub fn exit(status: crate::proc::ExitStatus) -> ! {
    unsafe { libc::_exit(status.raw()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ExitStatus;

    #[test]
    fn identity_queries() {
        assert!(get_own_pid().raw() > 0);
        assert!(get_parent_pid().raw() >= 0);
        let cached = cached_pids();
        assert_eq!(cached.own, get_own_pid());
        let pgid = get_process_group_of(ProcessId::SELF).unwrap();
        assert_eq!(pgid.raw(), get_own_process_group().raw());
        assert!(
            get_process_group_of(ProcessId::new(i32::MAX - 1))
                .unwrap_err()
                .errno()
                == Some(Errno::Search)
        );
    }

    #[test]
    #[serial_test::serial]
    fn env_round_trip() {
        let name = c"SYSCORE_TEST_VAR";
        assert!(!exists_env_var(name));
        set_env_var(name, c"first", OverwriteEnv::new(false)).unwrap();
        assert_eq!(get_env_var(name).unwrap().as_c_str(), c"first");
        // without overwrite the value stays
        set_env_var(name, c"second", OverwriteEnv::new(false)).unwrap();
        assert_eq!(get_env_var(name).unwrap().as_c_str(), c"first");
        set_env_var(name, c"second", OverwriteEnv::new(true)).unwrap();
        assert_eq!(get_env_var(name).unwrap().as_c_str(), c"second");
        clear_env_var(name).unwrap();
        assert!(!exists_env_var(name));
    }

    #[test]
    fn fork_wait_round_trip() {
        match fork().unwrap() {
            None => exit(ExitStatus::new(9)),
            Some(child_pid) => {
                let state = wait_for(child_pid).unwrap().unwrap();
                assert!(state.exited());
                assert_eq!(state.child.pid, child_pid);
                assert_eq!(state.status, Some(ExitStatus::new(9)));
                let ws = state.to_wait_status();
                assert!(ws.exited());
                assert_eq!(ws.status(), Some(ExitStatus::new(9)));
            }
        }
    }

    #[test]
    fn no_hang_returns_nothing() {
        match fork().unwrap() {
            None => {
                std::thread::sleep(std::time::Duration::from_millis(200));
                exit(ExitStatus::SUCCESS);
            }
            Some(child_pid) => {
                let res = wait(
                    WaitTarget::Process(child_pid),
                    WaitFlags::WAIT_FOR_EXITED | WaitFlags::NO_HANG,
                )
                .unwrap();
                assert!(res.is_none());
                let state = wait_for(child_pid).unwrap().unwrap();
                assert!(state.exited());
            }
        }
    }
}
