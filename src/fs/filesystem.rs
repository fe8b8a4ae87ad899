//! Free functions operating on file system paths and directory descriptors.

use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::error::{Errno, Error, Result};
use crate::fd::{DirFd, FileDescriptor, FileNum};
use crate::fs::types::{
    AccessChecks, AccessFlags, CloseRangeFlags, FileMode, LockFlags, LockOperation, OpenFlags,
    OpenMode,
};
use crate::fs::DirStream;
use crate::proc::users::{GroupInfo, PasswdInfo};
use crate::proc::{GroupId, UserId};
use crate::types::{FollowSymlinks, SysString, to_sys_owned};

fn path_of(path: SysString<'_>) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(path.view()))
}

/// Returns whether `path` exists in the file system.
///
/// A negative result predicts `Errno::NoEntry` from a subsequent open,
/// modulo the usual time-of-check races.
pub fn exists_file<'a>(path: impl Into<SysString<'a>>) -> bool {
    let path = path.into();
    unsafe { libc::faccessat(libc::AT_FDCWD, path.raw(), libc::F_OK, 0) == 0 }
}

pub(crate) fn open_at_raw(
    dir_fd: DirFd,
    path: SysString<'_>,
    mode: OpenMode,
    flags: OpenFlags,
    fmode: Option<FileMode>,
) -> Result<FileDescriptor> {
    if flags.intersects(OpenFlags::CREATE | OpenFlags::TMPFILE) && fmode.is_none() {
        return Err(Error::Usage(
            "open with CREATE or TMPFILE requires a FileMode",
        ));
    }
    let raw_flags = mode.raw() | flags.bits();
    let raw_mode = fmode.map(FileMode::raw).unwrap_or(0);
    let res = crate::init::retry_int(|| unsafe {
        libc::openat(
            dir_fd.raw().raw(),
            path.raw(),
            raw_flags,
            raw_mode as libc::c_uint,
        )
    });
    if res == -1 {
        return Err(Error::file("open", path_of(path)));
    }
    Ok(FileDescriptor::new(FileNum::new(res)))
}

/// Opens a file, returning the raw owning descriptor.
pub fn open<'a>(
    path: impl Into<SysString<'a>>,
    mode: OpenMode,
    flags: OpenFlags,
    fmode: Option<FileMode>,
) -> Result<FileDescriptor> {
    open_at_raw(DirFd::CWD, path.into(), mode, flags, fmode)
}

/// Opens a file relative to `dir_fd`, returning the raw owning descriptor.
///
/// An absolute `path` ignores `dir_fd`.
pub fn open_at<'a>(
    dir_fd: DirFd,
    path: impl Into<SysString<'a>>,
    mode: OpenMode,
    flags: OpenFlags,
    fmode: Option<FileMode>,
) -> Result<FileDescriptor> {
    open_at_raw(dir_fd, path.into(), mode, flags, fmode)
}

/// Creates a directory at `path`.
pub fn make_dir<'a>(path: impl Into<SysString<'a>>, mode: FileMode) -> Result<()> {
    make_dir_at(DirFd::CWD, path, mode)
}

/// Creates a directory at `path` relative to `dir_fd`.
pub fn make_dir_at<'a>(
    dir_fd: DirFd,
    path: impl Into<SysString<'a>>,
    mode: FileMode,
) -> Result<()> {
    let path = path.into();
    if unsafe { libc::mkdirat(dir_fd.raw().raw(), path.raw(), mode.raw()) } == -1 {
        return Err(Error::file("mkdir", path_of(path)));
    }
    Ok(())
}

/// Creates a directory including all missing parent components.
///
/// Returns [`Errno::NoError`] when the final component was newly created and
/// [`Errno::Exists`] when the full path already existed.
pub fn make_all_dirs<'a>(path: impl Into<SysString<'a>>, mode: FileMode) -> Result<Errno> {
    let path = path.into();
    let bytes = path.view();
    if bytes.is_empty() {
        return Err(Error::Usage("empty path passed to make_all_dirs"));
    }
    let mut ret = Errno::Exists;
    let mut end = 0usize;
    while end < bytes.len() {
        // advance to the end of the next component
        end = memchr::memchr(b'/', &bytes[end + 1..])
            .map(|pos| end + 1 + pos)
            .unwrap_or(bytes.len());
        if end == 1 && bytes[0] == b'/' {
            continue;
        }
        let component = to_sys_owned(&bytes[..end])?;
        match make_dir(&component, mode) {
            Ok(()) => ret = Errno::NoError,
            Err(err) if err.errno() == Some(Errno::Exists) => ret = Errno::Exists,
            Err(err) => return Err(err),
        }
    }
    Ok(ret)
}

/// Removes the empty directory at `path`.
pub fn remove_dir<'a>(path: impl Into<SysString<'a>>) -> Result<()> {
    remove_dir_at(DirFd::CWD, path)
}

/// Removes the empty directory at `path` relative to `dir_fd`.
pub fn remove_dir_at<'a>(dir_fd: DirFd, path: impl Into<SysString<'a>>) -> Result<()> {
    let path = path.into();
    if unsafe { libc::unlinkat(dir_fd.raw().raw(), path.raw(), libc::AT_REMOVEDIR) } == -1 {
        return Err(Error::file("rmdir", path_of(path)));
    }
    Ok(())
}

/// Recursively removes the directory tree at `path`.
///
/// Entries vanishing concurrently are not treated as errors.
pub fn remove_tree<'a>(path: impl Into<SysString<'a>>) -> Result<()> {
    let path = path.into();
    let mut stream = DirStream::open(path)?;
    while let Some(entry) = stream.next_entry()? {
        if entry.is_dot_entry() {
            continue;
        }
        let mut sub = Vec::from(path.view());
        sub.push(b'/');
        sub.extend_from_slice(entry.name().to_bytes());
        let sub = to_sys_owned(sub)?;
        let is_dir = match entry.entry_type() {
            crate::fs::DirEntryType::Directory => true,
            crate::fs::DirEntryType::Unknown => {
                match crate::fs::FileStatus::of_path(&sub, FollowSymlinks::new(false)) {
                    Ok(status) => status.file_type().is_directory(),
                    Err(err) if err.errno() == Some(Errno::NoEntry) => continue,
                    Err(err) => return Err(err),
                }
            }
            _ => false,
        };
        let res = if is_dir {
            remove_tree(&sub)
        } else {
            unlink_file(&sub)
        };
        match res {
            Ok(()) => (),
            Err(err) if err.errno() == Some(Errno::NoEntry) => (),
            Err(err) => return Err(err),
        }
    }
    drop(stream);
    match remove_dir(path) {
        Err(err) if err.errno() == Some(Errno::NoEntry) => Ok(()),
        other => other,
    }
}

/// Removes the file (non-directory) at `path`.
pub fn unlink_file<'a>(path: impl Into<SysString<'a>>) -> Result<()> {
    unlink_file_at(DirFd::CWD, path)
}

/// Removes the file at `path` relative to `dir_fd`.
pub fn unlink_file_at<'a>(dir_fd: DirFd, path: impl Into<SysString<'a>>) -> Result<()> {
    let path = path.into();
    if unsafe { libc::unlinkat(dir_fd.raw().raw(), path.raw(), 0) } == -1 {
        return Err(Error::file("unlink", path_of(path)));
    }
    Ok(())
}

/// Changes the mode of the file at `path`.
pub fn change_mode<'a>(path: impl Into<SysString<'a>>, mode: FileMode) -> Result<()> {
    let path = path.into();
    if unsafe { libc::chmod(path.raw(), mode.raw()) } == -1 {
        return Err(Error::file("chmod", path_of(path)));
    }
    Ok(())
}

/// Changes the mode of the already open file `fd`.
pub fn change_mode_fd(fd: FileDescriptor, mode: FileMode) -> Result<()> {
    if unsafe { libc::fchmod(fd.raw().raw(), mode.raw()) } == -1 {
        return Err(Error::api("fchmod"));
    }
    Ok(())
}

/// Changes owner and group of the file at `path`, following symlinks.
pub fn change_owner<'a>(path: impl Into<SysString<'a>>, uid: UserId, gid: GroupId) -> Result<()> {
    let path = path.into();
    if unsafe { libc::chown(path.raw(), uid.raw(), gid.raw()) } == -1 {
        return Err(Error::file("chown", path_of(path)));
    }
    Ok(())
}

/// Changes owner and group of the already open file `fd`.
pub fn change_owner_fd(fd: FileDescriptor, uid: UserId, gid: GroupId) -> Result<()> {
    if unsafe { libc::fchown(fd.raw().raw(), uid.raw(), gid.raw()) } == -1 {
        return Err(Error::api("fchown"));
    }
    Ok(())
}

/// Changes owner and group of a symlink itself.
pub fn change_owner_nofollow<'a>(
    path: impl Into<SysString<'a>>,
    uid: UserId,
    gid: GroupId,
) -> Result<()> {
    let path = path.into();
    if unsafe { libc::lchown(path.raw(), uid.raw(), gid.raw()) } == -1 {
        return Err(Error::file("lchown", path_of(path)));
    }
    Ok(())
}

/// Changes the owner of `path`, resolving `user` via the passwd database.
pub fn change_owner_by_name<'a, 'b>(
    path: impl Into<SysString<'a>>,
    user: impl Into<SysString<'b>>,
) -> Result<()> {
    let info = PasswdInfo::of_name(user)?
        .ok_or(Error::Usage("unknown user name passed to change_owner"))?;
    change_owner(path, info.uid(), info.gid())
}

/// Changes only the group of `path`.
pub fn change_group<'a>(path: impl Into<SysString<'a>>, gid: GroupId) -> Result<()> {
    change_owner(path, UserId::INVALID, gid)
}

/// Changes the group of `path`, resolving `group` via the group database.
pub fn change_group_by_name<'a, 'b>(
    path: impl Into<SysString<'a>>,
    group: impl Into<SysString<'b>>,
) -> Result<()> {
    let info = GroupInfo::of_name(group)?
        .ok_or(Error::Usage("unknown group name passed to change_group"))?;
    change_group(path, info.gid())
}

/// Creates a symlink at `path` pointing to `target`.
pub fn make_symlink<'a, 'b>(
    target: impl Into<SysString<'a>>,
    path: impl Into<SysString<'b>>,
) -> Result<()> {
    make_symlink_at(target, DirFd::CWD, path)
}

/// Creates a symlink at `path` relative to `dir_fd`, pointing to `target`.
pub fn make_symlink_at<'a, 'b>(
    target: impl Into<SysString<'a>>,
    dir_fd: DirFd,
    path: impl Into<SysString<'b>>,
) -> Result<()> {
    let (target, path) = (target.into(), path.into());
    if unsafe { libc::symlinkat(target.raw(), dir_fd.raw().raw(), path.raw()) } == -1 {
        return Err(Error::file("symlink", path_of(path)));
    }
    Ok(())
}

/// Reads the target of the symlink at `path`.
pub fn read_symlink<'a>(path: impl Into<SysString<'a>>) -> Result<PathBuf> {
    read_symlink_at(DirFd::CWD, path)
}

/// Reads the target of the symlink at `path` relative to `dir_fd`.
pub fn read_symlink_at<'a>(dir_fd: DirFd, path: impl Into<SysString<'a>>) -> Result<PathBuf> {
    let path = path.into();
    let mut buf = vec![0u8; 256];
    loop {
        let res = unsafe {
            libc::readlinkat(
                dir_fd.raw().raw(),
                path.raw(),
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        };
        if res == -1 {
            return Err(Error::file("readlink", path_of(path)));
        }
        let len = res as usize;
        if len < buf.len() {
            buf.truncate(len);
            return Ok(PathBuf::from(OsStr::from_bytes(&buf)));
        }
        // target may have been truncated, retry with more room
        buf.resize(buf.len() * 2, 0);
    }
}

/// Creates a new hard link `new_path` for the file at `old_path`.
pub fn link<'a, 'b>(
    old_path: impl Into<SysString<'a>>,
    new_path: impl Into<SysString<'b>>,
) -> Result<()> {
    linkat(
        DirFd::CWD,
        old_path,
        DirFd::CWD,
        new_path,
        FollowSymlinks::new(false),
    )
}

/// Creates a new hard link with dir-fd relative lookups.
pub fn linkat<'a, 'b>(
    old_dir: DirFd,
    old_path: impl Into<SysString<'a>>,
    new_dir: DirFd,
    new_path: impl Into<SysString<'b>>,
    follow_old: FollowSymlinks,
) -> Result<()> {
    let (old_path, new_path) = (old_path.into(), new_path.into());
    let flags = if follow_old.get() {
        libc::AT_SYMLINK_FOLLOW
    } else {
        0
    };
    let res = unsafe {
        libc::linkat(
            old_dir.raw().raw(),
            old_path.raw(),
            new_dir.raw().raw(),
            new_path.raw(),
            flags,
        )
    };
    if res == -1 {
        return Err(Error::file("linkat", path_of(new_path)));
    }
    Ok(())
}

/// Creates a new hard link for the file open at `fd` (AT_EMPTY_PATH).
///
/// On kernels older than 6.10 this requires the CAP_DAC_READ_SEARCH
/// capability; [`linkat_proc_fd`] works without it.
pub fn linkat_fd<'a>(
    fd: FileDescriptor,
    new_dir: DirFd,
    new_path: impl Into<SysString<'a>>,
) -> Result<()> {
    let new_path = new_path.into();
    let res = unsafe {
        libc::linkat(
            fd.raw().raw(),
            c"".as_ptr(),
            new_dir.raw().raw(),
            new_path.raw(),
            libc::AT_EMPTY_PATH,
        )
    };
    if res == -1 {
        return Err(Error::file("linkat", path_of(new_path)));
    }
    Ok(())
}

/// Creates a new hard link for the file open at `fd` by routing through
/// `/proc/self/fd`.
pub fn linkat_proc_fd<'a>(
    fd: FileDescriptor,
    new_dir: DirFd,
    new_path: impl Into<SysString<'a>>,
) -> Result<()> {
    let proc_path = to_sys_owned(format!("/proc/self/fd/{}", fd.raw().raw()))?;
    linkat(
        DirFd::CWD,
        &proc_path,
        new_dir,
        new_path,
        FollowSymlinks::new(true),
    )
}

/// Renames `old_path` to `new_path`.
pub fn rename<'a, 'b>(
    old_path: impl Into<SysString<'a>>,
    new_path: impl Into<SysString<'b>>,
) -> Result<()> {
    let (old_path, new_path) = (old_path.into(), new_path.into());
    if unsafe { libc::rename(old_path.raw(), new_path.raw()) } == -1 {
        return Err(Error::file("rename", path_of(new_path)));
    }
    Ok(())
}

/// Truncates the file at `path` to `length` bytes.
pub fn truncate<'a>(path: impl Into<SysString<'a>>, length: u64) -> Result<()> {
    let path = path.into();
    if unsafe { libc::truncate(path.raw(), length as libc::off_t) } == -1 {
        return Err(Error::file("truncate", path_of(path)));
    }
    Ok(())
}

/// Truncates the already open file `fd` to `length` bytes.
pub fn truncate_fd(fd: FileDescriptor, length: u64) -> Result<()> {
    if unsafe { libc::ftruncate(fd.raw().raw(), length as libc::off_t) } == -1 {
        return Err(Error::api("ftruncate"));
    }
    Ok(())
}

/// Parameters for [`copy_file_range`] with explicit offsets and progress
/// reporting.
#[derive(Debug)]
pub struct CopyFileRangeParameters {
    pub fd_in: FileDescriptor,
    pub fd_out: FileDescriptor,
    /// Explicit read offset; `None` uses and advances the fd's own offset.
    pub off_in: Option<u64>,
    /// Explicit write offset; `None` uses and advances the fd's own offset.
    pub off_out: Option<u64>,
    /// Remaining bytes to copy; decremented as progress is made.
    pub len: usize,
}

/// Copies up to `params.len` bytes between two files inside the kernel.
///
/// Performs a single `copy_file_range()` call and updates the offsets and
/// remaining length in `params`, so partial progress survives an error in a
/// retry loop. Returns the number of bytes copied by this call (zero at end
/// of input).
pub fn copy_file_range(params: &mut CopyFileRangeParameters) -> Result<usize> {
    let mut off_in = params.off_in.map(|v| v as libc::off64_t);
    let mut off_out = params.off_out.map(|v| v as libc::off64_t);
    let res = crate::init::retry_ssize(|| unsafe {
        libc::copy_file_range(
            params.fd_in.raw().raw(),
            off_in.as_mut().map_or(std::ptr::null_mut(), |v| v),
            params.fd_out.raw().raw(),
            off_out.as_mut().map_or(std::ptr::null_mut(), |v| v),
            params.len,
            0,
        )
    });
    if res == -1 {
        return Err(Error::api("copy_file_range"));
    }
    let copied = res as usize;
    params.len -= copied;
    params.off_in = off_in.map(|v| v as u64);
    params.off_out = off_out.map(|v| v as u64);
    Ok(copied)
}

/// Copies up to `len` bytes between two files using their implicit offsets.
pub fn copy_file_range_plain(
    fd_in: FileDescriptor,
    fd_out: FileDescriptor,
    len: usize,
) -> Result<usize> {
    let mut params = CopyFileRangeParameters {
        fd_in,
        fd_out,
        off_in: None,
        off_out: None,
        len,
    };
    copy_file_range(&mut params)
}

/// Checks accessibility of `path` using the real user and group IDs.
///
/// An empty `checks` mask tests for mere existence.
pub fn check_access<'a>(path: impl Into<SysString<'a>>, checks: AccessChecks) -> Result<()> {
    check_access_at(DirFd::CWD, path, checks, AccessFlags::empty())
}

/// Checks accessibility of `path` relative to `dir_fd`.
pub fn check_access_at<'a>(
    dir_fd: DirFd,
    path: impl Into<SysString<'a>>,
    checks: AccessChecks,
    flags: AccessFlags,
) -> Result<()> {
    let path = path.into();
    let res = unsafe {
        libc::faccessat(
            dir_fd.raw().raw(),
            path.raw(),
            checks.bits(),
            flags.bits(),
        )
    };
    if res == -1 {
        return Err(Error::file("faccessat", path_of(path)));
    }
    Ok(())
}

/// Checks accessibility of the already open file `fd`.
pub fn check_access_fd(fd: FileDescriptor, checks: AccessChecks, flags: AccessFlags) -> Result<()> {
    let res = unsafe {
        libc::faccessat(
            fd.raw().raw(),
            c"".as_ptr(),
            checks.bits(),
            flags.bits() | libc::AT_EMPTY_PATH,
        )
    };
    if res == -1 {
        return Err(Error::api("faccessat"));
    }
    Ok(())
}

/// Creates a named pipe at `path`.
pub fn make_fifo<'a>(path: impl Into<SysString<'a>>, mode: FileMode) -> Result<()> {
    make_fifo_at(DirFd::CWD, path, mode)
}

/// Creates a named pipe at `path` relative to `dir_fd`.
pub fn make_fifo_at<'a>(
    dir_fd: DirFd,
    path: impl Into<SysString<'a>>,
    mode: FileMode,
) -> Result<()> {
    let path = path.into();
    if unsafe { libc::mkfifoat(dir_fd.raw().raw(), path.raw(), mode.raw()) } == -1 {
        return Err(Error::file("mkfifo", path_of(path)));
    }
    Ok(())
}

/// Sets the process file creation mask, returning the previous mask.
pub fn set_umask(mode: FileMode) -> FileMode {
    let prev = unsafe { libc::umask(mode.raw()) };
    FileMode::from_raw(prev)
}

/// Closes (or marks CLOEXEC) all descriptors in the range `first..=last`.
///
/// Pass [`FileNum::MAX_FD`] as `last` to cover the rest of the descriptor
/// table.
pub fn close_range(first: FileNum, last: FileNum, flags: CloseRangeFlags) -> Result<()> {
    let last = if last == FileNum::MAX_FD {
        libc::c_uint::MAX
    } else {
        last.raw() as libc::c_uint
    };
    let res = unsafe {
        libc::syscall(
            libc::SYS_close_range,
            first.raw() as libc::c_uint,
            last,
            flags.bits(),
        )
    };
    if res == -1 {
        return Err(Error::api("close_range"));
    }
    Ok(())
}

/// Expands `template` into a mkstemp-compatible buffer.
///
/// A `{}` placeholder in the basename is substituted with the random
/// portion; without a placeholder the random portion is appended. An empty
/// basename is a usage error. Returns the template bytes and the offset of
/// the `XXXXXX` run.
fn expand_template(template: SysString<'_>) -> Result<(Vec<u8>, usize)> {
    let bytes = template.view();
    let basename_start = memchr::memrchr(b'/', bytes).map(|pos| pos + 1).unwrap_or(0);
    let basename = &bytes[basename_start..];
    if basename.is_empty() {
        return Err(Error::Usage("temp file template with empty basename"));
    }
    let mut buf = Vec::with_capacity(bytes.len() + 6);
    let suffix_len;
    if let Some(pos) = memchr::memmem::find(basename, b"{}") {
        buf.extend_from_slice(&bytes[..basename_start + pos]);
        buf.extend_from_slice(b"XXXXXX");
        let rest = &basename[pos + 2..];
        buf.extend_from_slice(rest);
        suffix_len = rest.len();
    } else {
        buf.extend_from_slice(bytes);
        buf.extend_from_slice(b"XXXXXX");
        suffix_len = 0;
    }
    let xs_at = buf.len() - 6 - suffix_len;
    Ok((buf, xs_at))
}

/// Creates and opens a temporary file from `template`.
///
/// Returns the owning descriptor and the expanded path.
pub fn make_tempfile<'a>(
    template: impl Into<SysString<'a>>,
    flags: OpenFlags,
) -> Result<(FileDescriptor, PathBuf)> {
    let (mut buf, xs_at) = expand_template(template.into())?;
    let suffix_len = buf.len() - xs_at - 6;
    buf.push(0);
    let res = unsafe {
        libc::mkostemps(
            buf.as_mut_ptr().cast(),
            suffix_len as libc::c_int,
            flags.bits(),
        )
    };
    if res == -1 {
        return Err(Error::api("mkostemps"));
    }
    buf.pop();
    Ok((
        FileDescriptor::new(FileNum::new(res)),
        PathBuf::from(OsStr::from_bytes(&buf)),
    ))
}

/// Creates a temporary directory from `template`, returning the expanded
/// path.
pub fn make_tempdir<'a>(template: impl Into<SysString<'a>>) -> Result<PathBuf> {
    let (buf, xs_at) = expand_template(template.into())?;
    // mkdtemp requires the template to *end* in XXXXXX
    let mut buf = buf;
    if xs_at + 6 != buf.len() {
        return Err(Error::Usage(
            "temp dir template must end in its random portion",
        ));
    }
    buf.push(0);
    let res = unsafe { libc::mkdtemp(buf.as_mut_ptr().cast()) };
    if res.is_null() {
        return Err(Error::api("mkdtemp"));
    }
    buf.pop();
    Ok(PathBuf::from(OsStr::from_bytes(&buf)))
}

/// Applies an advisory lock operation to the open file description of `fd`.
pub fn flock(fd: FileDescriptor, operation: LockOperation, flags: LockFlags) -> Result<()> {
    let res = crate::init::retry_int(|| unsafe {
        libc::flock(fd.raw().raw(), operation as i32 | flags.bits())
    });
    if res == -1 {
        return Err(Error::api("flock"));
    }
    Ok(())
}

/// Changes the current working directory to `path`.
pub fn change_dir<'a>(path: impl Into<SysString<'a>>) -> Result<()> {
    let path = path.into();
    if unsafe { libc::chdir(path.raw()) } == -1 {
        return Err(Error::file("chdir", path_of(path)));
    }
    Ok(())
}

/// Returns the current working directory.
pub fn get_working_dir() -> Result<PathBuf> {
    let mut buf = vec![0u8; 256];
    loop {
        let res = unsafe { libc::getcwd(buf.as_mut_ptr().cast(), buf.len()) };
        if !res.is_null() {
            let len = memchr::memchr(0, &buf).unwrap_or(buf.len());
            buf.truncate(len);
            return Ok(PathBuf::from(OsStr::from_bytes(&buf)));
        }
        if Errno::last() != Errno::Range {
            return Err(Error::api("getcwd"));
        }
        buf.resize(buf.len() * 2, 0);
    }
}

/// Looks up an executable in the PATH environment.
///
/// If `name` contains a slash it is returned unmodified when it refers to an
/// executable file. Otherwise each PATH component is searched in order.
pub fn which(name: &str) -> Option<PathBuf> {
    fn is_executable(path: &[u8]) -> bool {
        let Ok(path) = to_sys_owned(path) else {
            return false;
        };
        check_access(&path, AccessChecks::EXEC).is_ok()
            && crate::fs::FileStatus::of_path(&path, FollowSymlinks::new(true))
                .map(|status| status.file_type().is_regular())
                .unwrap_or(false)
    }

    if name.contains('/') {
        return is_executable(name.as_bytes()).then(|| PathBuf::from(name));
    }

    let path_var = crate::proc::get_env_var(c"PATH")?;
    for dir in path_var.as_bytes().split(|b| *b == b':') {
        if dir.is_empty() {
            continue;
        }
        let mut candidate = Vec::from(dir);
        candidate.push(b'/');
        candidate.extend_from_slice(name.as_bytes());
        if is_executable(&candidate) {
            return Some(PathBuf::from(OsStr::from_bytes(&candidate)));
        }
    }
    None
}

/// Normalizes a path lexically.
///
/// Collapses duplicate separators and `.`/`..` components and prefixes the
/// current working directory for relative inputs. Symlinks are *not*
/// resolved; use [`canonicalize_path`] for that.
pub fn normalize_path(path: &str) -> Result<PathBuf> {
    let mut components: Vec<&[u8]> = Vec::new();
    let bytes = path.as_bytes();
    let absolute = bytes.first() == Some(&b'/');
    let cwd;
    if !absolute {
        cwd = get_working_dir()?;
        for comp in cwd.as_os_str().as_bytes().split(|b| *b == b'/') {
            if !comp.is_empty() {
                components.push(comp);
            }
        }
    }
    for comp in bytes.split(|b| *b == b'/') {
        match comp {
            b"" | b"." => (),
            b".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    let mut out = Vec::new();
    for comp in &components {
        out.push(b'/');
        out.extend_from_slice(comp);
    }
    if out.is_empty() {
        out.push(b'/');
    }
    Ok(PathBuf::from(OsStr::from_bytes(&out)))
}

/// Resolves `path` into an absolute path free of symlinks, `.` and `..`.
pub fn canonicalize_path<'a>(path: impl Into<SysString<'a>>) -> Result<PathBuf> {
    let path = path.into();
    let res = unsafe { libc::realpath(path.raw(), std::ptr::null_mut()) };
    if res.is_null() {
        return Err(Error::file("realpath", path_of(path)));
    }
    let owned = unsafe { std::ffi::CStr::from_ptr(res) };
    let out = PathBuf::from(OsStr::from_bytes(owned.to_bytes()));
    unsafe { libc::free(res.cast()) };
    Ok(out)
}

/// Converts a [`CString`]-convertible path for a one-shot call.
///
/// Convenience for callers holding `PathBuf`/`str` data.
pub fn to_path_arg(path: impl AsRef<OsStr>) -> Result<CString> {
    to_sys_owned(path.as_ref().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_expansion() {
        let (buf, at) = expand_template(SysString::from(c"/tmp/foo-{}.txt")).unwrap();
        assert_eq!(&buf, b"/tmp/foo-XXXXXX.txt");
        assert_eq!(at, 9);

        let (buf, at) = expand_template(SysString::from(c"/tmp/bare")).unwrap();
        assert_eq!(&buf, b"/tmp/bareXXXXXX");
        assert_eq!(at, 9);

        assert!(expand_template(SysString::from(c"/tmp/")).is_err());
    }

    #[test]
    fn which_finds_shell() {
        let sh = which("sh").expect("sh should be in PATH");
        assert!(sh.as_os_str().as_bytes().ends_with(b"/sh"));
        // a path containing a slash is passed through
        assert_eq!(which("/bin/sh"), Some(PathBuf::from("/bin/sh")));
        assert_eq!(which("definitely-not-a-real-program-3141"), None);
    }

    #[test]
    fn existence_matches_open() {
        assert!(exists_file(c"/etc/fstab"));
        assert!(!exists_file(c"/definitely/not/here"));
        let err = open(
            c"/definitely/not/here",
            OpenMode::ReadOnly,
            OpenFlags::empty(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.errno(), Some(Errno::NoEntry));
    }

    #[test]
    fn normalize_collapses_components() {
        assert_eq!(
            normalize_path("/a//b/./c/../d").unwrap(),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(normalize_path("/..").unwrap(), PathBuf::from("/"));
        let rel = normalize_path("x/y").unwrap();
        assert!(rel.is_absolute());
        assert!(rel.as_os_str().as_bytes().ends_with(b"x/y"));
    }
}
