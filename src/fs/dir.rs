//! Directory stream iteration.

use std::ffi::CStr;

use crate::error::{Errno, Error, Result};
use crate::fd::{DirFd, FileDescriptor, FileNum};
use crate::fs::Inode;
use crate::types::SysString;

/// The file type as reported in a directory entry.
///
/// File systems are not required to deliver this; be prepared for
/// [`DirEntryType::Unknown`] and fall back to a stat call when the type
/// matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirEntryType {
    Unknown = libc::DT_UNKNOWN,
    Fifo = libc::DT_FIFO,
    CharDevice = libc::DT_CHR,
    Directory = libc::DT_DIR,
    BlockDevice = libc::DT_BLK,
    Regular = libc::DT_REG,
    Link = libc::DT_LNK,
    Socket = libc::DT_SOCK,
}

impl DirEntryType {
    fn from_raw(raw: u8) -> DirEntryType {
        match raw {
            libc::DT_FIFO => DirEntryType::Fifo,
            libc::DT_CHR => DirEntryType::CharDevice,
            libc::DT_DIR => DirEntryType::Directory,
            libc::DT_BLK => DirEntryType::BlockDevice,
            libc::DT_REG => DirEntryType::Regular,
            libc::DT_LNK => DirEntryType::Link,
            libc::DT_SOCK => DirEntryType::Socket,
            _ => DirEntryType::Unknown,
        }
    }
}

/// An opaque cursor into a [`DirStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirPos(libc::c_long);

/// A single directory entry as returned from [`DirStream::next_entry`].
#[derive(Clone, Copy)]
pub struct DirEntry {
    raw: libc::dirent,
}

impl DirEntry {
    /// The inode of the entry within its file system.
    pub fn inode(&self) -> Inode {
        Inode(self.raw.d_ino)
    }

    /// The opaque stream position of this entry, usable with
    /// [`DirStream::seek`].
    pub fn dir_pos(&self) -> DirPos {
        DirPos(self.raw.d_off as libc::c_long)
    }

    /// The length of the entry name, computed without a full string scan
    /// where the record length permits.
    pub fn name_length(&self) -> usize {
        // d_reclen spans the fixed header plus the name including padding;
        // only the tail of the name buffer needs scanning.
        let header = std::mem::offset_of!(libc::dirent, d_name);
        let upper = (self.raw.d_reclen as usize).saturating_sub(header);
        let buf = name_bytes(&self.raw);
        let upper = upper.min(buf.len());
        memchr::memchr(0, &buf[..upper])
            .or_else(|| memchr::memchr(0, buf))
            .unwrap_or(buf.len())
    }

    /// The file type of the entry, if delivered by the file system.
    pub fn entry_type(&self) -> DirEntryType {
        DirEntryType::from_raw(self.raw.d_type)
    }

    /// The entry name as a C string.
    pub fn name(&self) -> &CStr {
        unsafe { CStr::from_ptr(self.raw.d_name.as_ptr()) }
    }

    /// The entry name bytes, without terminator.
    pub fn view(&self) -> &[u8] {
        &name_bytes(&self.raw)[..self.name_length()]
    }

    /// Whether this is the `.` or `..` entry.
    pub fn is_dot_entry(&self) -> bool {
        matches!(self.view(), b"." | b"..")
    }
}

fn name_bytes(raw: &libc::dirent) -> &[u8] {
    unsafe { &*(raw.d_name.as_slice() as *const [libc::c_char] as *const [u8]) }
}

impl std::fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DirEntry({:?}, {:?})",
            self.name(),
            self.entry_type()
        )
    }
}

/// An open directory stream yielding [`DirEntry`] values.
#[derive(Debug)]
pub struct DirStream {
    stream: *mut libc::DIR,
}

// The stream is an owned resource; concurrent use requires external
// synchronization just like every other single-owner type in this crate.
unsafe impl Send for DirStream {}

impl DirStream {
    /// Opens the directory at `path`.
    pub fn open<'a>(path: impl Into<SysString<'a>>) -> Result<DirStream> {
        let path = path.into();
        let stream = unsafe { libc::opendir(path.raw()) };
        if stream.is_null() {
            return Err(Error::api("opendir"));
        }
        Ok(DirStream { stream })
    }

    /// Opens the directory at `path` relative to `dir_fd`.
    pub fn open_at<'a>(dir_fd: DirFd, path: impl Into<SysString<'a>>) -> Result<DirStream> {
        let fd = crate::fs::open_at(
            dir_fd,
            path,
            crate::fs::OpenMode::ReadOnly,
            crate::fs::OpenFlags::DIRECTORY | crate::fs::OpenFlags::CLOEXEC,
            None,
        )?;
        Self::from_fd(fd)
    }

    /// Takes ownership of an open directory descriptor.
    pub fn from_fd(fd: FileDescriptor) -> Result<DirStream> {
        let stream = unsafe { libc::fdopendir(fd.raw().raw()) };
        if stream.is_null() {
            let err = Error::api("fdopendir");
            let mut fd = fd;
            let _ = fd.close();
            return Err(err);
        }
        Ok(DirStream { stream })
    }

    /// The descriptor underlying the stream; owned by the stream.
    pub fn dir_fd(&self) -> DirFd {
        let raw = unsafe { libc::dirfd(self.stream) };
        DirFd::new(FileDescriptor::new(FileNum::new(raw)))
    }

    /// Returns the next entry, or `None` at the end of the directory.
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        Errno::reset();
        let entry = unsafe { libc::readdir(self.stream) };
        if entry.is_null() {
            return match Errno::last() {
                Errno::NoError => Ok(None),
                errno => Err(Error::api_errno("readdir", errno)),
            };
        }
        Ok(Some(DirEntry {
            raw: unsafe { *entry },
        }))
    }

    /// The current stream position for a later [`seek`](Self::seek).
    pub fn tell(&self) -> DirPos {
        DirPos(unsafe { libc::telldir(self.stream) })
    }

    /// Repositions the stream to an earlier [`tell`](Self::tell) result or a
    /// [`DirEntry::dir_pos`] cursor.
    pub fn seek(&mut self, pos: DirPos) {
        unsafe { libc::seekdir(self.stream, pos.0) }
    }

    /// Rewinds the stream to the beginning of the directory.
    pub fn rewind(&mut self) {
        unsafe { libc::rewinddir(self.stream) }
    }

    /// Iterates all entries from the beginning of the directory.
    pub fn iter(&mut self) -> DirIterator<'_> {
        self.rewind();
        DirIterator { stream: self }
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        if unsafe { libc::closedir(self.stream) } == -1 {
            log::warn!("failed to close directory stream: {}", Errno::last());
        }
    }
}

/// Iterator over a [`DirStream`], rewound at creation.
#[derive(Debug)]
pub struct DirIterator<'a> {
    stream: &'a mut DirStream,
}

impl Iterator for DirIterator<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_etc() {
        let mut stream = DirStream::open(c"/etc").unwrap();
        let mut saw_dot = false;
        let mut saw_fstab = false;
        for entry in stream.iter() {
            let entry = entry.unwrap();
            if entry.is_dot_entry() {
                saw_dot = true;
            }
            if entry.view() == b"fstab" {
                saw_fstab = true;
                assert_eq!(entry.name_length(), 5);
                assert_eq!(entry.name(), c"fstab");
            }
        }
        assert!(saw_dot);
        assert!(saw_fstab);
    }

    #[test]
    fn tell_and_seek_round_trip() {
        let mut stream = DirStream::open(c"/etc").unwrap();
        let first = stream.next_entry().unwrap().unwrap();
        let pos = stream.tell();
        let second = stream.next_entry().unwrap().unwrap();
        stream.seek(pos);
        let again = stream.next_entry().unwrap().unwrap();
        assert_eq!(second.view(), again.view());
        assert_ne!(first.view(), again.view());
    }

    #[test]
    fn iteration_rewinds() {
        let mut stream = DirStream::open(c"/etc").unwrap();
        let count_one = stream.iter().count();
        let count_two = stream.iter().count();
        assert_eq!(count_one, count_two);
        assert!(count_one >= 2);
    }
}
