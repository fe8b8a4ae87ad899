//! The primitive file descriptor value type and descriptor-level syscalls.

use std::fmt;

use bitflags::bitflags;

use crate::error::{Errno, Error, Result};
use crate::fs::{OpenFlags, OpenMode};
use crate::types::CloseOnExec;

/// A primitive file descriptor number.
///
/// This is the raw integer handed out by the kernel, wrapped so it cannot be
/// confused with other integer quantities. Conversions to and from the raw
/// representation are explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileNum(i32);

impl FileNum {
    pub const INVALID: FileNum = FileNum(-1);
    pub const STDIN: FileNum = FileNum(libc::STDIN_FILENO);
    pub const STDOUT: FileNum = FileNum(libc::STDOUT_FILENO);
    pub const STDERR: FileNum = FileNum(libc::STDERR_FILENO);
    /// Sentinel for "relative to the current working directory" in the
    /// `*_at` family of calls.
    pub const AT_CWD: FileNum = FileNum(libc::AT_FDCWD);
    /// The maximum possible descriptor number, for use as the upper bound of
    /// `fs::close_range()`. Distinct from [`FileNum::INVALID`]; never
    /// compared against in validity checks.
    pub const MAX_FD: FileNum = FileNum(i32::MAX);

    pub const fn new(raw: i32) -> FileNum {
        FileNum(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }
}

bitflags! {
    /// Per-descriptor flags (fcntl `F_GETFD`/`F_SETFD`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DescFlags: i32 {
        /// Close the descriptor during `execve()`.
        const CLOEXEC = libc::FD_CLOEXEC;
    }
}

bitflags! {
    /// Seals restricting future operations on a memfd.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SealFlags: i32 {
        /// Lock the seal set itself, disallowing further seal changes.
        const SEAL = libc::F_SEAL_SEAL;
        /// Disallow shrinking the file in any way.
        const SHRINK = libc::F_SEAL_SHRINK;
        /// Disallow growing the file in any way.
        const GROW = libc::F_SEAL_GROW;
        /// Disallow changing the file contents (shrink/grow still allowed).
        const WRITE = libc::F_SEAL_WRITE;
        /// Like WRITE but existing shared writable mappings may keep writing.
        const FUTURE_WRITE = libc::F_SEAL_FUTURE_WRITE;
    }
}

/// Thin wrapper around an OS file descriptor.
///
/// This is a copyable value without lifetime semantics; it does *not* close
/// the descriptor on drop. It is the building block for the owning types
/// (`FdFile`, `File`, `Socket`, …) which add the close-on-drop invariant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDescriptor {
    fd: FileNum,
}

/// The standard input descriptor.
pub const STDIN: FileDescriptor = FileDescriptor::new(FileNum::STDIN);
/// The standard output descriptor.
pub const STDOUT: FileDescriptor = FileDescriptor::new(FileNum::STDOUT);
/// The standard error descriptor.
pub const STDERR: FileDescriptor = FileDescriptor::new(FileNum::STDERR);

impl FileDescriptor {
    pub const fn new(fd: FileNum) -> FileDescriptor {
        FileDescriptor { fd }
    }

    pub const fn invalid_desc() -> FileDescriptor {
        FileDescriptor::new(FileNum::INVALID)
    }

    /// Whether a valid descriptor number is currently assigned.
    pub fn valid(self) -> bool {
        self.fd != FileNum::INVALID
    }

    pub fn invalid(self) -> bool {
        !self.valid()
    }

    /// Assigns a new primitive descriptor. A previously contained descriptor
    /// is *not* closed.
    pub fn set_fd(&mut self, fd: FileNum) {
        self.fd = fd;
    }

    /// Forgets the stored descriptor without closing it.
    pub fn reset(&mut self) {
        self.fd = FileNum::INVALID;
    }

    /// Closes the contained descriptor.
    ///
    /// The stored number is invalidated even when the kernel reports an
    /// error, to prevent double-close of a recycled descriptor.
    pub fn close(&mut self) -> Result<()> {
        let fd = self.fd;
        self.reset();
        if unsafe { libc::close(fd.raw()) } == -1 {
            return Err(Error::api("close"));
        }
        Ok(())
    }

    /// Duplicates this descriptor onto the explicit number `new_fd`.
    ///
    /// If `new_fd` is already open it is silently closed first.
    pub fn duplicate_to(
        self,
        new_fd: FileDescriptor,
        cloexec: CloseOnExec,
    ) -> Result<FileDescriptor> {
        let flags = if cloexec.get() { libc::O_CLOEXEC } else { 0 };
        let res = unsafe { libc::dup3(self.fd.raw(), new_fd.fd.raw(), flags) };
        if res == -1 {
            return Err(Error::api("dup3"));
        }
        Ok(FileDescriptor::new(FileNum::new(res)))
    }

    /// Duplicates this descriptor onto the lowest free number.
    pub fn duplicate(self, cloexec: CloseOnExec) -> Result<FileDescriptor> {
        let cmd = if cloexec.get() {
            libc::F_DUPFD_CLOEXEC
        } else {
            libc::F_DUPFD
        };
        let res = unsafe { libc::fcntl(self.fd.raw(), cmd, 0) };
        if res == -1 {
            return Err(Error::api("fcntl(F_DUPFD)"));
        }
        Ok(FileDescriptor::new(FileNum::new(res)))
    }

    /// Retrieves the current descriptor flags.
    pub fn get_flags(self) -> Result<DescFlags> {
        let res = unsafe { libc::fcntl(self.fd.raw(), libc::F_GETFD) };
        if res == -1 {
            return Err(Error::api("fcntl(F_GETFD)"));
        }
        Ok(DescFlags::from_bits_retain(res))
    }

    /// Replaces the descriptor flags.
    pub fn set_flags(self, flags: DescFlags) -> Result<()> {
        if unsafe { libc::fcntl(self.fd.raw(), libc::F_SETFD, flags.bits()) } == -1 {
            return Err(Error::api("fcntl(F_SETFD)"));
        }
        Ok(())
    }

    /// Convenience wrapper around [`set_flags`](Self::set_flags) for the
    /// CLOEXEC setting.
    pub fn set_close_on_exec(self, on_off: bool) -> Result<()> {
        self.set_flags(if on_off {
            DescFlags::CLOEXEC
        } else {
            DescFlags::empty()
        })
    }

    /// Retrieves the file's open mode and currently active status flags.
    pub fn get_status_flags(self) -> Result<(OpenMode, OpenFlags)> {
        let res = unsafe { libc::fcntl(self.fd.raw(), libc::F_GETFL) };
        if res == -1 {
            return Err(Error::api("fcntl(F_GETFL)"));
        }
        let mode = OpenMode::from_raw(res & libc::O_ACCMODE);
        let flags = OpenFlags::from_bits_retain(res & !libc::O_ACCMODE);
        Ok((mode, flags))
    }

    /// Changes the mutable status flags.
    ///
    /// The open mode cannot be changed on an open descriptor; of the status
    /// flags only APPEND, ASYNC, DIRECT, NOATIME and NONBLOCK are mutable.
    pub fn set_status_flags(self, flags: OpenFlags) -> Result<()> {
        if unsafe { libc::fcntl(self.fd.raw(), libc::F_SETFL, flags.bits()) } == -1 {
            return Err(Error::api("fcntl(F_SETFL)"));
        }
        Ok(())
    }

    /// Flushes outstanding writes, including metadata, to disk.
    pub fn sync(self) -> Result<()> {
        if crate::init::retry_int(|| unsafe { libc::fsync(self.fd.raw()) }) == -1 {
            return Err(Error::api("fsync"));
        }
        Ok(())
    }

    /// Flushes outstanding writes to disk, excluding metadata where possible.
    pub fn data_sync(self) -> Result<()> {
        if crate::init::retry_int(|| unsafe { libc::fdatasync(self.fd.raw()) }) == -1 {
            return Err(Error::api("fdatasync"));
        }
        Ok(())
    }

    /// Adds seals for memfd-backed descriptors.
    pub fn add_seals(self, flags: SealFlags) -> Result<()> {
        if unsafe { libc::fcntl(self.fd.raw(), libc::F_ADD_SEALS, flags.bits()) } == -1 {
            return Err(Error::api("fcntl(F_ADD_SEALS)"));
        }
        Ok(())
    }

    /// The currently active seals of a memfd-backed descriptor.
    pub fn get_seals(self) -> Result<SealFlags> {
        let res = unsafe { libc::fcntl(self.fd.raw(), libc::F_GET_SEALS) };
        if res == -1 {
            return Err(Error::api("fcntl(F_GET_SEALS)"));
        }
        Ok(SealFlags::from_bits_retain(res))
    }

    /// For pipe descriptors, the kernel pipe buffer size.
    pub fn get_pipe_size(self) -> Result<usize> {
        let res = unsafe { libc::fcntl(self.fd.raw(), libc::F_GETPIPE_SZ) };
        if res == -1 {
            return Err(Error::api("fcntl(F_GETPIPE_SZ)"));
        }
        Ok(res as usize)
    }

    /// For pipe descriptors, sets a new kernel pipe buffer size.
    ///
    /// The kernel may round the size up; the actually applied size is
    /// returned.
    pub fn set_pipe_size(self, new_size: usize) -> Result<usize> {
        let res = unsafe { libc::fcntl(self.fd.raw(), libc::F_SETPIPE_SZ, new_size as libc::c_int) };
        if res == -1 {
            return Err(Error::api("fcntl(F_SETPIPE_SZ)"));
        }
        Ok(res as usize)
    }

    /// Reads up to `buf.len()` bytes, honoring the EINTR-restart policy.
    pub fn read(self, buf: &mut [u8]) -> Result<usize> {
        let res = crate::init::retry_ssize(|| unsafe {
            libc::read(self.fd.raw(), buf.as_mut_ptr().cast(), buf.len())
        });
        if res == -1 {
            return Err(Error::api("read"));
        }
        Ok(res as usize)
    }

    /// Writes up to `buf.len()` bytes, honoring the EINTR-restart policy.
    pub fn write(self, buf: &[u8]) -> Result<usize> {
        let res = crate::init::retry_ssize(|| unsafe {
            libc::write(self.fd.raw(), buf.as_ptr().cast(), buf.len())
        });
        if res == -1 {
            return Err(Error::api("write"));
        }
        Ok(res as usize)
    }

    /// Reads the complete buffer, failing on premature end-of-file.
    pub fn read_all(self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read(buf)? {
                0 => return Err(Error::api_errno("read", Errno::IoError)),
                n => buf = &mut buf[n..],
            }
        }
        Ok(())
    }

    /// Writes the complete buffer.
    pub fn write_all(self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            buf = &buf[n..];
        }
        Ok(())
    }

    /// The primitive descriptor number contained in the object.
    pub const fn raw(self) -> FileNum {
        self.fd
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDescriptor({})", self.fd.raw())
    }
}

/// A file descriptor strongly typed as referring to a directory.
///
/// The `*_at` family of filesystem functions accept only this type for their
/// lookup root, which rules out accidentally passing a regular file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirFd(FileDescriptor);

impl DirFd {
    /// The sentinel meaning "relative to the current working directory".
    pub const CWD: DirFd = DirFd(FileDescriptor::new(FileNum::AT_CWD));

    /// Wraps a descriptor the caller asserts refers to a directory.
    pub const fn new(fd: FileDescriptor) -> DirFd {
        DirFd(fd)
    }

    pub const fn fd(self) -> FileDescriptor {
        self.0
    }

    pub const fn raw(self) -> FileNum {
        self.0.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(FileNum::INVALID.raw(), -1);
        assert_eq!(FileNum::STDIN.raw(), 0);
        assert_eq!(FileNum::AT_CWD.raw(), libc::AT_FDCWD);
        assert_ne!(FileNum::MAX_FD, FileNum::INVALID);
        assert!(FileDescriptor::invalid_desc().invalid());
        assert!(STDOUT.valid());
        assert_eq!(DirFd::CWD.raw(), FileNum::AT_CWD);
    }

    #[test]
    fn close_invalidates_even_on_error() {
        let mut fd = FileDescriptor::invalid_desc();
        assert!(fd.close().is_err());
        assert!(fd.invalid());
    }

    #[test]
    fn duplicate_and_flags() {
        let dup = STDERR.duplicate(CloseOnExec::new(true)).unwrap();
        assert_ne!(dup.raw(), STDERR.raw());
        assert_eq!(dup.get_flags().unwrap(), DescFlags::CLOEXEC);
        dup.set_close_on_exec(false).unwrap();
        assert!(dup.get_flags().unwrap().is_empty());
        let mut dup = dup;
        dup.close().unwrap();
    }
}
