//! Memory-backed files (memfd and memfd_secret).

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::fs::FdFile;
use crate::types::{CloseOnExec, SysString};

bitflags! {
    /// Creation settings for a [`MemFile`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemFileFlags: u32 {
        /// Apply close-on-exec semantics.
        const CLOEXEC = libc::MFD_CLOEXEC;
        /// Allow file sealing operations via
        /// [`FileDescriptor::add_seals`](crate::fd::FileDescriptor::add_seals).
        const ALLOW_SEALING = libc::MFD_ALLOW_SEALING;
        /// Create the file in the HugeTLB file system.
        const HUGETLB = libc::MFD_HUGETLB;
    }
}

/// The page size to use with [`MemFileFlags::HUGETLB`].
///
/// The values are the log-2 bit positions of the corresponding page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum HugePageSize {
    #[default]
    Default = 0,
    Huge2MB = 21,
    Huge8MB = 23,
    Huge16MB = 24,
    Huge32MB = 25,
    Huge256MB = 28,
    Huge512MB = 29,
    Huge1GB = 30,
    Huge2GB = 31,
    Huge16GB = 34,
}

/// A file backed only by memory, not by a file system.
///
/// Always opened read-write. The name appears in `/proc` for debugging but
/// carries no uniqueness requirements. With
/// [`MemFileFlags::ALLOW_SEALING`] the descriptor supports the seal API.
#[derive(Debug)]
pub struct MemFile {
    file: FdFile,
}

impl MemFile {
    /// Creates a memory file with default flags (CLOEXEC).
    pub fn new<'a>(name: impl Into<SysString<'a>>) -> Result<MemFile> {
        Self::with_flags(name, MemFileFlags::CLOEXEC, HugePageSize::Default)
    }

    /// Creates a memory file with the given flags and optional huge page
    /// size.
    pub fn with_flags<'a>(
        name: impl Into<SysString<'a>>,
        flags: MemFileFlags,
        huge_pages: HugePageSize,
    ) -> Result<MemFile> {
        let name = name.into();
        let raw_flags = flags.bits() | ((huge_pages as u32) << libc::MFD_HUGE_SHIFT);
        let res = unsafe { libc::memfd_create(name.raw(), raw_flags) };
        if res == -1 {
            return Err(Error::api("memfd_create"));
        }
        Ok(MemFile {
            file: FdFile::new(FileDescriptor::new(FileNum::new(res))),
        })
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
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

impl std::io::Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(&mut self.file, buf)
    }
}

impl std::io::Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut self.file, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::io::Seek for MemFile {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        std::io::Seek::seek(&mut self.file, pos)
    }
}

/// A memory file for sensitive data.
///
/// Similar to [`MemFile`] but the backing pages are hidden from kernel-space
/// mappings as far as possible and locked against swapping. Requires the
/// `secretmem` functionality to be enabled in the kernel.
#[derive(Debug)]
pub struct SecretFile {
    file: FdFile,
}

impl SecretFile {
    pub fn new(cloexec: CloseOnExec) -> Result<SecretFile> {
        let flags: libc::c_uint = if cloexec.get() {
            libc::O_CLOEXEC as libc::c_uint
        } else {
            0
        };
        let res = unsafe { libc::syscall(libc::SYS_memfd_secret, flags) };
        if res == -1 {
            return Err(Error::api("memfd_secret"));
        }
        Ok(SecretFile {
            file: FdFile::new(FileDescriptor::new(FileNum::new(res as i32))),
        })
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::SealFlags;
    use std::io::{Read, Seek, SeekFrom, Write};

    #[test]
    fn read_write_round_trip() {
        let mut mem = MemFile::new(c"test-buffer").unwrap();
        mem.write_all(b"in-memory only").unwrap();
        mem.seek(SeekFrom::Start(0)).unwrap();
        let mut content = String::new();
        mem.read_to_string(&mut content).unwrap();
        assert_eq!(content, "in-memory only");
    }

    #[test]
    fn sealing_requires_opt_in() {
        let mem = MemFile::new(c"sealed-off").unwrap();
        // without ALLOW_SEALING the seal set is locked from the start
        assert_eq!(mem.fd().get_seals().unwrap(), SealFlags::SEAL);

        let mem = MemFile::with_flags(
            c"sealable",
            MemFileFlags::CLOEXEC | MemFileFlags::ALLOW_SEALING,
            HugePageSize::Default,
        )
        .unwrap();
        assert!(mem.fd().get_seals().unwrap().is_empty());
        mem.fd()
            .add_seals(SealFlags::SHRINK | SealFlags::GROW)
            .unwrap();
        assert_eq!(
            mem.fd().get_seals().unwrap(),
            SealFlags::SHRINK | SealFlags::GROW
        );
        // growing is now refused
        assert!(crate::fs::truncate_fd(mem.fd(), 4096).is_err());
    }
}
