//! File status information (`struct stat`) with strongly typed accessors.

use std::mem::MaybeUninit;

use crate::error::{Error, Result};
use crate::fd::{DirFd, FileDescriptor};
use crate::fs::{DeviceId, FileMode, FileType, Inode};
use crate::proc::{GroupId, UserId};
use crate::time::{RealTimeClock, TimeSpec};
use crate::types::{FollowSymlinks, SysString};

/// Status information for a file system object.
///
/// The status is invalid until one of the update calls succeeded; a mode of
/// zero marks invalidity, since no valid inode carries an all-zero mode.
#[derive(Clone, Copy)]
pub struct FileStatus {
    raw: libc::stat,
}

impl FileStatus {
    /// An invalid status to be filled via one of the `update` calls.
    pub fn new() -> FileStatus {
        FileStatus {
            // zeroed stat is a plain-data struct
            raw: unsafe { MaybeUninit::zeroed().assume_init() },
        }
    }

    /// Queries the status of the object at `path`.
    pub fn of_path<'a>(
        path: impl Into<SysString<'a>>,
        follow_links: FollowSymlinks,
    ) -> Result<FileStatus> {
        let mut status = FileStatus::new();
        status.update_from_path(path, follow_links)?;
        Ok(status)
    }

    /// Queries the status of the already open file `fd`.
    pub fn of_fd(fd: FileDescriptor) -> Result<FileStatus> {
        let mut status = FileStatus::new();
        status.update_from_fd(fd)?;
        Ok(status)
    }

    /// Queries the status of `path` relative to `dir_fd`.
    pub fn of_path_at<'a>(
        dir_fd: DirFd,
        path: impl Into<SysString<'a>>,
        follow_links: FollowSymlinks,
    ) -> Result<FileStatus> {
        let mut status = FileStatus::new();
        status.update_from_path_at(dir_fd, path, follow_links)?;
        Ok(status)
    }

    pub fn update_from_path<'a>(
        &mut self,
        path: impl Into<SysString<'a>>,
        follow_links: FollowSymlinks,
    ) -> Result<()> {
        self.update_from_path_at(DirFd::CWD, path, follow_links)
    }

    pub fn update_from_fd(&mut self, fd: FileDescriptor) -> Result<()> {
        self.invalidate();
        if unsafe { libc::fstat(fd.raw().raw(), &mut self.raw) } == -1 {
            return Err(Error::api("fstat"));
        }
        Ok(())
    }

    pub fn update_from_path_at<'a>(
        &mut self,
        dir_fd: DirFd,
        path: impl Into<SysString<'a>>,
        follow_links: FollowSymlinks,
    ) -> Result<()> {
        self.invalidate();
        let path = path.into();
        let flags = if follow_links.get() {
            0
        } else {
            libc::AT_SYMLINK_NOFOLLOW
        };
        let res =
            unsafe { libc::fstatat(dir_fd.raw().raw(), path.raw(), &mut self.raw, flags) };
        if res == -1 {
            return Err(Error::api("fstatat"));
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.raw.st_mode = 0;
    }

    /// Whether valid status information is currently held.
    pub fn valid(&self) -> bool {
        self.raw.st_mode != 0
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_raw(self.raw.st_mode)
    }

    pub fn mode(&self) -> FileMode {
        FileMode::from_raw(self.raw.st_mode)
    }

    /// The device the file system object lives on.
    pub fn device(&self) -> DeviceId {
        DeviceId(self.raw.st_dev)
    }

    pub fn inode(&self) -> Inode {
        Inode(self.raw.st_ino)
    }

    pub fn num_links(&self) -> u64 {
        self.raw.st_nlink
    }

    pub fn uid(&self) -> UserId {
        UserId::new(self.raw.st_uid)
    }

    pub fn gid(&self) -> GroupId {
        GroupId::new(self.raw.st_gid)
    }

    /// The size of the object in bytes.
    ///
    /// Only regular files, symlinks (the target path length) and directories
    /// have a defined size; asking for any other type is a usage error.
    pub fn size(&self) -> Result<u64> {
        match self.file_type() {
            FileType::Regular | FileType::Link | FileType::Directory => {
                Ok(self.raw.st_size as u64)
            }
            _ => Err(Error::Usage("size() queried for a file type without one")),
        }
    }

    /// For block and character devices, the device this node represents.
    pub fn represented_device(&self) -> Result<DeviceId> {
        match self.file_type() {
            FileType::BlockDevice | FileType::CharDevice => Ok(DeviceId(self.raw.st_rdev)),
            _ => Err(Error::Usage(
                "represented_device() queried for a non-device file",
            )),
        }
    }

    /// The preferred block size for efficient I/O on this object.
    pub fn block_size(&self) -> u64 {
        self.raw.st_blksize as u64
    }

    /// The number of 512-byte blocks allocated for this object.
    pub fn allocated_blocks(&self) -> u64 {
        self.raw.st_blocks as u64
    }

    /// The time of the last modification of the file content.
    pub fn mod_time(&self) -> TimeSpec<RealTimeClock> {
        TimeSpec::new(self.raw.st_mtime as i64, self.raw.st_mtime_nsec as i64)
    }

    /// The time of the last status (inode) modification.
    pub fn status_time(&self) -> TimeSpec<RealTimeClock> {
        TimeSpec::new(self.raw.st_ctime as i64, self.raw.st_ctime_nsec as i64)
    }

    /// The time of the last access of the file content.
    pub fn access_time(&self) -> TimeSpec<RealTimeClock> {
        TimeSpec::new(self.raw.st_atime as i64, self.raw.st_atime_nsec as i64)
    }

    /// Whether `self` and `other` refer to the same file system object,
    /// judged by (device, inode) identity.
    pub fn is_same_file(&self, other: &FileStatus) -> bool {
        self.device() == other.device() && self.inode() == other.inode()
    }

    pub fn raw(&self) -> &libc::stat {
        &self.raw
    }
}

impl Default for FileStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.valid() {
            return write!(f, "FileStatus(invalid)");
        }
        write!(
            f,
            "FileStatus({}{}, {}:{})",
            self.file_type().symbolic(),
            self.mode().symbolic(),
            self.device().raw(),
            self.inode().raw(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_until_updated() {
        let status = FileStatus::new();
        assert!(!status.valid());
        let status = FileStatus::of_path(c"/etc/fstab", FollowSymlinks::new(true)).unwrap();
        assert!(status.valid());
        assert!(status.file_type().is_regular());
        assert!(status.size().unwrap() > 0);
    }

    #[test]
    fn size_rejected_for_devices() {
        let status = FileStatus::of_path(c"/dev/null", FollowSymlinks::new(true)).unwrap();
        assert!(status.file_type().is_char_dev());
        assert!(matches!(status.size(), Err(Error::Usage(_))));
        let dev = status.represented_device().unwrap();
        // /dev/null is char device 1:3
        assert_eq!((dev.major(), dev.minor()), (1, 3));
    }

    #[test]
    fn same_file_identity() {
        let a = FileStatus::of_path(c"/etc/fstab", FollowSymlinks::new(true)).unwrap();
        let b = FileStatus::of_path(c"/etc/fstab", FollowSymlinks::new(true)).unwrap();
        let c = FileStatus::of_path(c"/etc/hostname", FollowSymlinks::new(true)).unwrap();
        assert!(a.is_same_file(&b));
        assert!(!a.is_same_file(&c));
    }
}
