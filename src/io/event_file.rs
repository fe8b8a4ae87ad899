//! Eventfd wrapper.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::fs::FdFile;

bitflags! {
    /// Creation flags for an [`EventFile`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFileFlags: i32 {
        /// Create the eventfd with the close-on-exec flag set.
        const CLOSE_ON_EXEC = libc::EFD_CLOEXEC;
        /// Non-blocking operation: [`EventFile::wait`] on a zero counter and
        /// [`EventFile::signal`] on a saturated counter fail instead of
        /// blocking.
        const NONBLOCK = libc::EFD_NONBLOCK;
        /// Semaphore semantics: each wait returns 1 and decrements by one.
        const SEMAPHORE = libc::EFD_SEMAPHORE;
    }
}

/// A lightweight event object with file descriptor representation.
///
/// An unsigned 8-byte counter is associated with the descriptor. While the
/// counter is zero a [`wait`](EventFile::wait) blocks; signalling adds to the
/// counter and wakes waiters. The descriptor can be registered with a
/// [`Poller`](crate::io::Poller): readable corresponds to wait, writable to
/// signal.
#[derive(Debug)]
pub struct EventFile {
    file: FdFile,
    semaphore: bool,
}

impl EventFile {
    /// Creates an eventfd with the given initial counter.
    pub fn new(init_val: u64, flags: EventFileFlags) -> Result<EventFile> {
        let res = unsafe { libc::eventfd(init_val as libc::c_uint, flags.bits()) };
        if res == -1 {
            return Err(Error::api("eventfd"));
        }
        Ok(EventFile {
            file: FdFile::new(FileDescriptor::new(FileNum::new(res))),
            semaphore: flags.contains(EventFileFlags::SEMAPHORE),
        })
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    /// Whether semaphore semantics are active.
    pub fn is_semaphore(&self) -> bool {
        self.semaphore
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    /// Waits for the counter to become non-zero.
    ///
    /// Returns the counter value and resets it to zero; with SEMAPHORE
    /// semantics, returns 1 and decrements by one. In NONBLOCK mode a zero
    /// counter fails with `Errno::Again`.
    pub fn wait(&self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.file.fd().read_all(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    /// Adds `increment` to the counter, waking blocked waiters.
    ///
    /// If the addition would overflow the counter this blocks until a waiter
    /// consumed some of it, or fails with `Errno::Again` in NONBLOCK mode.
    pub fn signal(&self, increment: u64) -> Result<()> {
        self.file.fd().write_all(&increment.to_ne_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_reset_on_wait() {
        let event = EventFile::new(0, EventFileFlags::CLOSE_ON_EXEC | EventFileFlags::NONBLOCK)
            .unwrap();
        event.signal(3).unwrap();
        event.signal(4).unwrap();
        assert_eq!(event.wait().unwrap(), 7);
        // counter is zero again
        assert!(event.wait().unwrap_err().is_would_block());
    }

    #[test]
    fn semaphore_mode_decrements() {
        let event = EventFile::new(
            2,
            EventFileFlags::CLOSE_ON_EXEC | EventFileFlags::NONBLOCK | EventFileFlags::SEMAPHORE,
        )
        .unwrap();
        assert!(event.is_semaphore());
        assert_eq!(event.wait().unwrap(), 1);
        assert_eq!(event.wait().unwrap(), 1);
        assert!(event.wait().unwrap_err().is_would_block());
    }

    #[test]
    fn overflow_signal_would_block() {
        let event = EventFile::new(0, EventFileFlags::CLOSE_ON_EXEC | EventFileFlags::NONBLOCK)
            .unwrap();
        event.signal(u64::MAX - 1).unwrap();
        assert!(event.signal(1).unwrap_err().is_would_block());
    }
}
