//! Library initialization and the global EINTR-restart policy.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::error::Errno;

/// Whether interrupted blocking system calls are transparently restarted.
static RESTART_ON_INTERRUPT: AtomicBool = AtomicBool::new(true);

struct InitState {
    refcount: usize,
    initables: Vec<Initable>,
}

/// A subsystem hook run on the first [`init`] and the last [`finish`].
///
/// Hooks run ordered by ascending priority during init and in reverse during
/// exit, which gives optional subsystems a deterministic bring-up order
/// without relying on static initialization.
pub(crate) struct Initable {
    pub priority: u16,
    pub lib_init: fn(),
    pub lib_exit: fn(),
}

static INIT_STATE: Mutex<InitState> = Mutex::new(InitState {
    refcount: 0,
    initables: Vec::new(),
});

fn noop() {}

fn ensure_builtin_initables(state: &mut InitState) {
    if !state.initables.is_empty() {
        return;
    }
    state.initables.push(Initable {
        priority: 0,
        lib_init: crate::proc::refresh_cached_pids,
        lib_exit: noop,
    });
    state.initables.sort_by_key(|i| i.priority);
}

/// Initializes the library.
///
/// Calls are reference counted; every `init()` must be paired with a
/// [`finish`]. Prefer the scoped [`Init`] guard. `init`/`finish` must not be
/// called concurrently with each other.
pub fn init() {
    let mut state = INIT_STATE.lock();
    ensure_builtin_initables(&mut state);
    state.refcount += 1;
    if state.refcount == 1 {
        for initable in &state.initables {
            (initable.lib_init)();
        }
    }
}

/// Drops one library initialization reference.
pub fn finish() {
    let mut state = INIT_STATE.lock();
    assert!(state.refcount > 0, "finish() without matching init()");
    state.refcount -= 1;
    if state.refcount == 0 {
        for initable in state.initables.iter().rev() {
            (initable.lib_exit)();
        }
    }
}

/// Scope guard that holds a library initialization reference.
#[derive(Debug)]
pub struct Init(());

impl Init {
    pub fn new() -> Init {
        init();
        Init(())
    }
}

impl Default for Init {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Init {
    fn drop(&mut self) {
        finish();
    }
}

/// Chooses whether blocking system calls interrupted by a signal are
/// transparently restarted (the default) or surface
/// [`Errno::Interrupted`](crate::error::Errno::Interrupted) to the caller.
pub fn set_restart_syscall_on_interrupt(restart: bool) {
    RESTART_ON_INTERRUPT.store(restart, Ordering::Relaxed);
}

/// The currently configured EINTR policy.
pub fn restart_syscall_on_interrupt() -> bool {
    RESTART_ON_INTERRUPT.load(Ordering::Relaxed)
}

/// Runs an interruptible syscall returning `c_int`, honoring the restart
/// policy.
pub(crate) fn retry_int(mut call: impl FnMut() -> libc::c_int) -> libc::c_int {
    loop {
        let res = call();
        if res == -1 && Errno::last() == Errno::Interrupted && restart_syscall_on_interrupt() {
            continue;
        }
        return res;
    }
}

/// Runs an interruptible syscall returning `ssize_t`, honoring the restart
/// policy.
pub(crate) fn retry_ssize(mut call: impl FnMut() -> libc::ssize_t) -> libc::ssize_t {
    loop {
        let res = call();
        if res == -1 && Errno::last() == Errno::Interrupted && restart_syscall_on_interrupt() {
            continue;
        }
        return res;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refcounting() {
        {
            let _outer = Init::new();
            let _inner = Init::new();
        }
        // a fresh cycle still works after the count dropped to zero
        init();
        finish();
    }

    #[test]
    #[serial_test::serial]
    fn restart_flag_toggles() {
        assert!(restart_syscall_on_interrupt());
        set_restart_syscall_on_interrupt(false);
        assert!(!restart_syscall_on_interrupt());
        set_restart_syscall_on_interrupt(true);
    }
}
