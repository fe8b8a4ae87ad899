//! An epoll-based file descriptor monitor.

use std::time::Duration;

use bitflags::bitflags;
use log::warn;

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};

bitflags! {
    /// The conditions to monitor a descriptor for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MonitorFlags: u32 {
        /// The descriptor becomes readable.
        const INPUT = libc::EPOLLIN as u32;
        /// The descriptor becomes writable.
        const OUTPUT = libc::EPOLLOUT as u32;
        /// Exceptional conditions (e.g. out-of-band data).
        const EXCEPTIONS = libc::EPOLLPRI as u32;
        /// A stream socket peer shut down its writing half.
        const SOCKET_HANGUP = libc::EPOLLRDHUP as u32;
        /// Edge-triggered instead of level-triggered reporting.
        const EDGE_TRIGGERED = libc::EPOLLET as u32;
        /// Disable the entry after one event is delivered.
        const ONESHOT = libc::EPOLLONESHOT as u32;
    }
}

bitflags! {
    /// The conditions reported back from a wait.
    ///
    /// ERROR_OCCURED and HANGUP_OCCURED are always reported, regardless of
    /// the monitored set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u32 {
        const INPUT_READY = libc::EPOLLIN as u32;
        const OUTPUT_READY = libc::EPOLLOUT as u32;
        const SOCKET_HANGUP = libc::EPOLLRDHUP as u32;
        const EXCEPTION_OCCURED = libc::EPOLLPRI as u32;
        const ERROR_OCCURED = libc::EPOLLERR as u32;
        const HANGUP_OCCURED = libc::EPOLLHUP as u32;
    }
}

/// One ready event as returned from [`Poller::wait`].
#[derive(Debug, Clone, Copy)]
pub struct PollEvent {
    raw: libc::epoll_event,
}

impl PollEvent {
    /// The descriptor the event occurred on.
    pub fn fd(&self) -> FileDescriptor {
        FileDescriptor::new(FileNum::new(self.raw.u64 as i32))
    }

    /// The set of conditions that fired.
    pub fn get_events(&self) -> EventMask {
        EventMask::from_bits_retain(self.raw.events)
    }
}

/// Monitors a set of file descriptors for I/O readiness via epoll.
#[derive(Debug)]
pub struct Poller {
    epoll_fd: FileDescriptor,
    max_events: usize,
}

impl Poller {
    /// Creates a poller returning at most `max_events` events per wait.
    pub fn new(max_events: usize) -> Result<Poller> {
        let res = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if res == -1 {
            return Err(Error::api("epoll_create1"));
        }
        Ok(Poller {
            epoll_fd: FileDescriptor::new(FileNum::new(res)),
            max_events: max_events.max(1),
        })
    }

    fn ctl(&self, op: libc::c_int, fd: FileDescriptor, flags: MonitorFlags) -> Result<()> {
        let mut event = libc::epoll_event {
            events: flags.bits(),
            u64: fd.raw().raw() as u64,
        };
        let res = unsafe {
            libc::epoll_ctl(self.epoll_fd.raw().raw(), op, fd.raw().raw(), &mut event)
        };
        if res == -1 {
            return Err(Error::api("epoll_ctl"));
        }
        Ok(())
    }

    /// Starts monitoring `fd` for the given conditions.
    pub fn add_fd(&self, fd: FileDescriptor, flags: MonitorFlags) -> Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, flags)
    }

    /// Changes the monitored conditions for `fd`.
    pub fn mod_fd(&self, fd: FileDescriptor, flags: MonitorFlags) -> Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, flags)
    }

    /// Stops monitoring `fd`.
    pub fn del_fd(&self, fd: FileDescriptor) -> Result<()> {
        let res = unsafe {
            libc::epoll_ctl(
                self.epoll_fd.raw().raw(),
                libc::EPOLL_CTL_DEL,
                fd.raw().raw(),
                std::ptr::null_mut(),
            )
        };
        if res == -1 {
            return Err(Error::api("epoll_ctl"));
        }
        Ok(())
    }

    /// Waits for events, at most until `timeout` passed.
    ///
    /// An empty vector means the timeout was reached. With the
    /// EINTR-restart policy enabled an interrupting signal transparently
    /// restarts the wait, otherwise `Errno::Interrupted` is surfaced.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<PollEvent>> {
        let mut events = vec![libc::epoll_event { events: 0, u64: 0 }; self.max_events];
        let timeout_ms = timeout
            .map(|t| t.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);
        let res = crate::init::retry_int(|| unsafe {
            libc::epoll_wait(
                self.epoll_fd.raw().raw(),
                events.as_mut_ptr(),
                events.len() as i32,
                timeout_ms,
            )
        });
        if res == -1 {
            return Err(Error::api("epoll_wait"));
        }
        events.truncate(res as usize);
        Ok(events.into_iter().map(|raw| PollEvent { raw }).collect())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Err(err) = self.epoll_fd.close() {
            warn!("failed to close epoll fd: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Pipe;

    #[test]
    fn readiness_and_timeout() {
        let pipe = Pipe::new().unwrap();
        let poller = Poller::new(8).unwrap();
        poller.add_fd(pipe.read_end(), MonitorFlags::INPUT).unwrap();

        // nothing written yet: timeout
        let events = poller.wait(Some(Duration::from_millis(10))).unwrap();
        assert!(events.is_empty());

        pipe.write(b"ready").unwrap();
        let events = poller.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fd(), pipe.read_end());
        assert!(events[0].get_events().contains(EventMask::INPUT_READY));
    }

    #[test]
    fn hangup_reported_without_subscription() {
        let mut pipe = Pipe::new().unwrap();
        let poller = Poller::new(4).unwrap();
        poller.add_fd(pipe.read_end(), MonitorFlags::INPUT).unwrap();
        pipe.close_write_end().unwrap();
        let events = poller.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].get_events().contains(EventMask::HANGUP_OCCURED));
    }

    #[test]
    fn del_fd_silences_events() {
        let pipe = Pipe::new().unwrap();
        let poller = Poller::new(4).unwrap();
        poller.add_fd(pipe.read_end(), MonitorFlags::INPUT).unwrap();
        poller.del_fd(pipe.read_end()).unwrap();
        pipe.write(b"x").unwrap();
        let events = poller.wait(Some(Duration::from_millis(10))).unwrap();
        assert!(events.is_empty());
    }
}
