//! POSIX thread creation and joining.

use std::ffi::CStr;
use std::mem::MaybeUninit;

use log::error;

use crate::error::{Errno, Error, Result};
use crate::proc::ThreadId;
use crate::time::{RealTimeClock, TimeSpec};

/// The pthread-level identity of a thread.
#[derive(Clone, Copy)]
pub struct PthreadId(libc::pthread_t);

impl PthreadId {
    /// The calling thread's own pthread id.
    pub fn of_caller() -> PthreadId {
        PthreadId(unsafe { libc::pthread_self() })
    }

    pub fn raw(self) -> libc::pthread_t {
        self.0
    }
}

impl PartialEq for PthreadId {
    fn eq(&self, other: &Self) -> bool {
        unsafe { libc::pthread_equal(self.0, other.0) != 0 }
    }
}

impl Eq for PthreadId {}

impl std::fmt::Debug for PthreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PthreadId({:#x})", self.0)
    }
}

/// The kernel thread id of the calling thread.
pub fn get_own_thread_id() -> ThreadId {
    ThreadId::new(unsafe { libc::gettid() })
}

type Entry = Box<dyn FnOnce() -> usize + Send>;

extern "C" fn thread_trampoline(arg: *mut libc::c_void) -> *mut libc::c_void {
    let entry: Box<Entry> = unsafe { Box::from_raw(arg.cast()) };
    let ret = entry();
    ret as *mut libc::c_void
}

/// A kernel thread created via `pthread_create()`.
///
/// Two entry styles are supported: the classic POSIX single-argument,
/// single-return-value entry and a plain no-argument closure. The thread
/// must be joined or detached before the object is dropped. There is no
/// cancellation API; to stop a thread, signal it.
#[derive(Debug)]
pub struct PosixThread {
    handle: Option<libc::pthread_t>,
}

impl PosixThread {
    /// Starts a thread executing the POSIX style entry `entry` with `arg`.
    ///
    /// The entry's return value is reported by [`join`](Self::join).
    pub fn new_posix(
        entry: impl FnOnce(usize) -> usize + Send + 'static,
        arg: usize,
    ) -> Result<PosixThread> {
        Self::create(Box::new(move || entry(arg)))
    }

    /// Starts a thread executing the no-argument closure `entry`.
    pub fn new(entry: impl FnOnce() + Send + 'static) -> Result<PosixThread> {
        Self::create(Box::new(move || {
            entry();
            0
        }))
    }

    fn create(entry: Entry) -> Result<PosixThread> {
        let boxed: Box<Entry> = Box::new(entry);
        let arg = Box::into_raw(boxed);
        let mut handle = MaybeUninit::<libc::pthread_t>::uninit();
        let res = unsafe {
            libc::pthread_create(
                handle.as_mut_ptr(),
                std::ptr::null(),
                thread_trampoline,
                arg.cast(),
            )
        };
        if res != 0 {
            // reclaim the entry, the thread never ran
            drop(unsafe { Box::from_raw(arg) });
            return Err(Error::api_errno("pthread_create", Errno::from(res)));
        }
        Ok(PosixThread {
            handle: Some(unsafe { handle.assume_init() }),
        })
    }

    /// Whether the thread still needs to be joined or detached.
    pub fn joinable(&self) -> bool {
        self.handle.is_some()
    }

    /// The pthread id of the managed thread.
    pub fn id(&self) -> Result<PthreadId> {
        self.handle
            .map(PthreadId)
            .ok_or(Error::Usage("id() queried on an empty PosixThread"))
    }

    fn take_handle(&mut self) -> Result<libc::pthread_t> {
        self.handle
            .take()
            .ok_or(Error::Usage("join on an already joined or detached thread"))
    }

    /// Blocks until the thread finished, returning its exit value.
    pub fn join(&mut self) -> Result<usize> {
        let handle = self.take_handle()?;
        let mut ret: *mut libc::c_void = std::ptr::null_mut();
        let res = unsafe { libc::pthread_join(handle, &mut ret) };
        if res != 0 {
            return Err(Error::api_errno("pthread_join", Errno::from(res)));
        }
        Ok(ret as usize)
    }

    /// Joins the thread if it already finished, without blocking.
    pub fn try_join(&mut self) -> Result<Option<usize>> {
        let handle = self.handle.ok_or(Error::Usage(
            "join on an already joined or detached thread",
        ))?;
        let mut ret: *mut libc::c_void = std::ptr::null_mut();
        let res = unsafe { libc::pthread_tryjoin_np(handle, &mut ret) };
        match Errno::from(res) {
            Errno::NoError => {
                self.handle = None;
                Ok(Some(ret as usize))
            }
            Errno::Busy => Ok(None),
            errno => Err(Error::api_errno("pthread_tryjoin_np", errno)),
        }
    }

    /// Joins the thread, waiting at most until the given wall-clock time.
    ///
    /// Beware that glibc internally measures the timeout against the
    /// monotonic clock, so wall-clock jumps do not cut the wait short.
    pub fn join_timed(&mut self, until: TimeSpec<RealTimeClock>) -> Result<Option<usize>> {
        let handle = self.handle.ok_or(Error::Usage(
            "join on an already joined or detached thread",
        ))?;
        let mut ret: *mut libc::c_void = std::ptr::null_mut();
        let res = unsafe { libc::pthread_timedjoin_np(handle, &mut ret, until.raw()) };
        match Errno::from(res) {
            Errno::NoError => {
                self.handle = None;
                Ok(Some(ret as usize))
            }
            Errno::TimedOut => Ok(None),
            errno => Err(Error::api_errno("pthread_timedjoin_np", errno)),
        }
    }

    /// Releases the thread to run and clean up on its own.
    pub fn detach(&mut self) -> Result<()> {
        let handle = self.take_handle()?;
        let res = unsafe { libc::pthread_detach(handle) };
        if res != 0 {
            return Err(Error::api_errno("pthread_detach", Errno::from(res)));
        }
        Ok(())
    }

    /// Sets the thread's name as shown in /proc (at most 15 bytes).
    pub fn set_name(&self, name: &CStr) -> Result<()> {
        let handle = self
            .handle
            .ok_or(Error::Usage("set_name on an empty PosixThread"))?;
        let res = unsafe { libc::pthread_setname_np(handle, name.as_ptr()) };
        if res != 0 {
            return Err(Error::api_errno("pthread_setname_np", Errno::from(res)));
        }
        Ok(())
    }
}

impl Drop for PosixThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            error!("PosixThread dropped without join or detach");
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn posix_entry_returns_value() {
        let mut thread = PosixThread::new_posix(|arg| arg * 2, 21).unwrap();
        assert!(thread.joinable());
        assert_eq!(thread.join().unwrap(), 42);
        assert!(!thread.joinable());
    }

    #[test]
    fn closure_entry_and_ids() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let mut thread = PosixThread::new(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        assert!(thread.id().unwrap() != PthreadId::of_caller());
        thread.join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn try_join_on_busy_thread() {
        let mut thread = PosixThread::new(|| {
            std::thread::sleep(Duration::from_millis(200));
        })
        .unwrap();
        // most likely still running
        let first = thread.try_join().unwrap();
        if first.is_none() {
            assert_eq!(thread.join().unwrap(), 0);
        }
    }

    #[test]
    fn join_timed_expires() {
        let mut thread = PosixThread::new(|| {
            std::thread::sleep(Duration::from_millis(300));
        })
        .unwrap();
        let deadline = crate::time::REAL_TIME
            .now()
            .unwrap()
            .after(Duration::from_millis(20));
        assert!(thread.join_timed(deadline).unwrap().is_none());
        thread.join().unwrap();
    }
}
