//! Owning file types layered on top of [`FileDescriptor`].

use std::io;

use log::warn;

use crate::error::{Error, Result};
use crate::fd::{DirFd, FileDescriptor};
use crate::fs::{FileMode, OpenFlags, OpenMode};
use crate::types::{AutoCloseFd, SysString};

/// A descriptor-owning file.
///
/// Owns a [`FileDescriptor`] and closes it on drop unless ownership was
/// configured away via [`AutoCloseFd`] or given up via
/// [`disown`](FdFile::disown). A close failure during drop is logged and
/// swallowed; the stored number is invalidated either way so a recycled
/// descriptor can never be closed twice.
#[derive(Debug)]
pub struct FdFile {
    fd: FileDescriptor,
    auto_close: AutoCloseFd,
}

impl FdFile {
    /// Takes ownership of `fd`, closing it on drop.
    pub fn new(fd: FileDescriptor) -> FdFile {
        FdFile::with_auto_close(fd, AutoCloseFd::new(true))
    }

    /// Wraps `fd`, closing it on drop only if `auto_close` says so.
    pub fn with_auto_close(fd: FileDescriptor, auto_close: AutoCloseFd) -> FdFile {
        FdFile { fd, auto_close }
    }

    pub fn is_open(&self) -> bool {
        self.fd.valid()
    }

    /// The contained descriptor value.
    ///
    /// The returned copy does not carry ownership; it must not outlive
    /// `self`.
    pub fn fd(&self) -> FileDescriptor {
        self.fd
    }

    /// Releases ownership of the descriptor without closing it.
    pub fn disown(&mut self) -> FileDescriptor {
        let fd = self.fd;
        self.fd.reset();
        fd
    }

    /// Explicitly closes the file, reporting any kernel error.
    pub fn close(&mut self) -> Result<()> {
        if !self.fd.valid() {
            return Ok(());
        }
        self.fd.close()
    }

    pub fn read_bytes(&self, buf: &mut [u8]) -> Result<usize> {
        self.fd.read(buf)
    }

    pub fn write_bytes(&self, buf: &[u8]) -> Result<usize> {
        self.fd.write(buf)
    }
}

impl Drop for FdFile {
    fn drop(&mut self) {
        if self.auto_close.get() && self.fd.valid() {
            if let Err(err) = self.fd.close() {
                warn!("failed to close fd during drop: {err}");
            }
        }
    }
}

impl io::Read for FdFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fd.read(buf).map_err(io_error)
    }
}

impl io::Write for FdFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.fd.write(buf).map_err(io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for FdFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (whence, offset) = match pos {
            io::SeekFrom::Start(off) => (libc::SEEK_SET, off as libc::off_t),
            io::SeekFrom::End(off) => (libc::SEEK_END, off as libc::off_t),
            io::SeekFrom::Current(off) => (libc::SEEK_CUR, off as libc::off_t),
        };
        let res = unsafe { libc::lseek(self.fd.raw().raw(), offset, whence) };
        if res == -1 {
            return Err(io_error(Error::api("lseek")));
        }
        Ok(res as u64)
    }
}

pub(crate) fn io_error(err: Error) -> io::Error {
    match err.errno() {
        Some(errno) => io::Error::from_raw_os_error(errno.raw()),
        None => io::Error::other(err.to_string()),
    }
}

/// A file opened from a path.
#[derive(Debug)]
pub struct File {
    file: FdFile,
}

impl File {
    /// Opens `path` with the given mode and flags.
    ///
    /// A [`FileMode`] is required when `flags` contain CREATE or TMPFILE;
    /// passing none in that case is a usage error. The CLOEXEC flag is not
    /// implied; pass it explicitly when wanted.
    pub fn open<'a>(
        path: impl Into<SysString<'a>>,
        mode: OpenMode,
        flags: OpenFlags,
        fmode: Option<FileMode>,
    ) -> Result<File> {
        File::open_at(DirFd::CWD, path, mode, flags, fmode)
    }

    /// Opens `path` relative to `dir_fd`.
    ///
    /// An absolute `path` ignores `dir_fd`; [`DirFd::CWD`] means relative to
    /// the current working directory.
    pub fn open_at<'a>(
        dir_fd: DirFd,
        path: impl Into<SysString<'a>>,
        mode: OpenMode,
        flags: OpenFlags,
        fmode: Option<FileMode>,
    ) -> Result<File> {
        let fd = crate::fs::open_at_raw(dir_fd, path.into(), mode, flags, fmode)?;
        Ok(File {
            file: FdFile::new(fd),
        })
    }

    /// Takes ownership of an already open descriptor.
    pub fn from_fd(fd: FileDescriptor) -> File {
        File {
            file: FdFile::new(fd),
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn disown(&mut self) -> FileDescriptor {
        self.file.disown()
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    pub fn read_bytes(&self, buf: &mut [u8]) -> Result<usize> {
        self.file.read_bytes(buf)
    }

    pub fn write_bytes(&self, buf: &[u8]) -> Result<usize> {
        self.file.write_bytes(buf)
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.file, buf)
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.file, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for File {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        io::Seek::seek(&mut self.file, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_without_mode_is_rejected() {
        let res = File::open(
            c"/tmp/syscore-no-mode",
            OpenMode::WriteOnly,
            OpenFlags::CREATE,
            None,
        );
        assert!(matches!(res, Err(Error::Usage(_))));
    }

    #[test]
    fn open_read_close() {
        let mut file = File::open(
            c"/etc/hostname",
            OpenMode::ReadOnly,
            OpenFlags::CLOEXEC,
            None,
        )
        .unwrap();
        assert!(file.is_open());
        let mut buf = [0u8; 16];
        let _ = file.read_bytes(&mut buf).unwrap();
        file.close().unwrap();
        assert!(!file.is_open());
    }

    #[test]
    fn wrap_without_ownership() {
        let dup = crate::fd::STDERR
            .duplicate(crate::types::CloseOnExec::new(true))
            .unwrap();
        {
            let wrapper = FdFile::with_auto_close(dup, AutoCloseFd::new(false));
            assert!(wrapper.is_open());
        }
        // still open, the wrapper did not own it
        assert!(dup.get_flags().is_ok());
        let mut dup = dup;
        dup.close().unwrap();
    }
}
