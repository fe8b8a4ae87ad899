//! Raw pthread mutex and condition variable wrappers.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

use crate::error::{Errno, Error, Result};
use crate::time::{MonotonicClock, TimeSpec};

/// A wrapper around `pthread_mutex_t`.
///
/// In debug builds the mutex runs in error-check mode, turning relock and
/// unlock-by-other-thread mistakes into reported errors. Lock and unlock
/// are paired manually; this is the raw kernel-facing primitive, not a
/// guard-based high level type.
pub struct Mutex {
    raw: UnsafeCell<libc::pthread_mutex_t>,
}

unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub fn new() -> Result<Mutex> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        let mut raw = MaybeUninit::<libc::pthread_mutex_t>::uninit();
        unsafe {
            let res = libc::pthread_mutexattr_init(attr.as_mut_ptr());
            if res != 0 {
                return Err(Error::api_errno("pthread_mutexattr_init", Errno::from(res)));
            }
            if cfg!(debug_assertions) {
                libc::pthread_mutexattr_settype(
                    attr.as_mut_ptr(),
                    libc::PTHREAD_MUTEX_ERRORCHECK,
                );
            }
            let res = libc::pthread_mutex_init(raw.as_mut_ptr(), attr.as_ptr());
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            if res != 0 {
                return Err(Error::api_errno("pthread_mutex_init", Errno::from(res)));
            }
            Ok(Mutex {
                raw: UnsafeCell::new(raw.assume_init()),
            })
        }
    }

    pub fn lock(&self) -> Result<()> {
        let res = unsafe { libc::pthread_mutex_lock(self.raw.get()) };
        if res != 0 {
            return Err(Error::api_errno("pthread_mutex_lock", Errno::from(res)));
        }
        Ok(())
    }

    /// Attempts the lock, returning whether it was acquired.
    pub fn try_lock(&self) -> Result<bool> {
        let res = unsafe { libc::pthread_mutex_trylock(self.raw.get()) };
        match Errno::from(res) {
            Errno::NoError => Ok(true),
            Errno::Busy => Ok(false),
            errno => Err(Error::api_errno("pthread_mutex_trylock", errno)),
        }
    }

    pub fn unlock(&self) -> Result<()> {
        let res = unsafe { libc::pthread_mutex_unlock(self.raw.get()) };
        if res != 0 {
            return Err(Error::api_errno("pthread_mutex_unlock", Errno::from(res)));
        }
        Ok(())
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.raw.get()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_destroy(self.raw.get());
        }
    }
}

impl std::fmt::Debug for Mutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mutex(..)")
    }
}

/// A wrapper around `pthread_cond_t`, bound to the monotonic clock.
///
/// Using the monotonic clock for timed waits rules out apparent
/// reverse-time behavior when the wall clock is adjusted.
pub struct Condition {
    raw: UnsafeCell<libc::pthread_cond_t>,
}

unsafe impl Send for Condition {}
unsafe impl Sync for Condition {}

impl Condition {
    pub fn new() -> Result<Condition> {
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        let mut raw = MaybeUninit::<libc::pthread_cond_t>::uninit();
        unsafe {
            let res = libc::pthread_condattr_init(attr.as_mut_ptr());
            if res != 0 {
                return Err(Error::api_errno("pthread_condattr_init", Errno::from(res)));
            }
            libc::pthread_condattr_setclock(attr.as_mut_ptr(), libc::CLOCK_MONOTONIC);
            let res = libc::pthread_cond_init(raw.as_mut_ptr(), attr.as_ptr());
            libc::pthread_condattr_destroy(attr.as_mut_ptr());
            if res != 0 {
                return Err(Error::api_errno("pthread_cond_init", Errno::from(res)));
            }
            Ok(Condition {
                raw: UnsafeCell::new(raw.assume_init()),
            })
        }
    }

    /// Blocks on the condition; `mutex` must be locked by the caller.
    pub fn wait(&self, mutex: &Mutex) -> Result<()> {
        let res = unsafe { libc::pthread_cond_wait(self.raw.get(), mutex.raw()) };
        if res != 0 {
            return Err(Error::api_errno("pthread_cond_wait", Errno::from(res)));
        }
        Ok(())
    }

    /// Blocks on the condition until the absolute monotonic time `until`.
    ///
    /// Returns `false` when the wait timed out.
    pub fn wait_timed(&self, mutex: &Mutex, until: TimeSpec<MonotonicClock>) -> Result<bool> {
        let res = unsafe {
            libc::pthread_cond_timedwait(self.raw.get(), mutex.raw(), until.raw())
        };
        match Errno::from(res) {
            Errno::NoError => Ok(true),
            Errno::TimedOut => Ok(false),
            errno => Err(Error::api_errno("pthread_cond_timedwait", errno)),
        }
    }

    /// Wakes one waiter.
    pub fn signal(&self) -> Result<()> {
        let res = unsafe { libc::pthread_cond_signal(self.raw.get()) };
        if res != 0 {
            return Err(Error::api_errno("pthread_cond_signal", Errno::from(res)));
        }
        Ok(())
    }

    /// Wakes all waiters.
    pub fn broadcast(&self) -> Result<()> {
        let res = unsafe { libc::pthread_cond_broadcast(self.raw.get()) };
        if res != 0 {
            return Err(Error::api_errno("pthread_cond_broadcast", Errno::from(res)));
        }
        Ok(())
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_cond_destroy(self.raw.get());
        }
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Condition(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::PosixThread;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn lock_unlock_try() {
        let mutex = Mutex::new().unwrap();
        mutex.lock().unwrap();
        #[cfg(debug_assertions)]
        {
            // error-check mode reports the relock instead of deadlocking
            assert!(mutex.lock().is_err());
        }
        mutex.unlock().unwrap();
        assert!(mutex.try_lock().unwrap());
        mutex.unlock().unwrap();
    }

    #[test]
    fn condition_signaling() {
        let pair = Arc::new((Mutex::new().unwrap(), Condition::new().unwrap()));
        let remote = pair.clone();
        let mut waker = PosixThread::new(move || {
            let (mutex, cond) = &*remote;
            std::thread::sleep(Duration::from_millis(50));
            mutex.lock().unwrap();
            mutex.unlock().unwrap();
            cond.broadcast().unwrap();
        })
        .unwrap();

        let (mutex, cond) = &*pair;
        mutex.lock().unwrap();
        let deadline = crate::time::MONOTONIC
            .now()
            .unwrap()
            .after(Duration::from_secs(10));
        assert!(cond.wait_timed(mutex, deadline).unwrap());
        mutex.unlock().unwrap();
        waker.join().unwrap();
    }

    #[test]
    fn timed_wait_expires() {
        let mutex = Mutex::new().unwrap();
        let cond = Condition::new().unwrap();
        mutex.lock().unwrap();
        let deadline = crate::time::MONOTONIC
            .now()
            .unwrap()
            .after(Duration::from_millis(30));
        assert!(!cond.wait_timed(&mutex, deadline).unwrap());
        mutex.unlock().unwrap();
    }
}
