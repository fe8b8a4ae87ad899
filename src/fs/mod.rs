//! File system operations: open files, metadata, directory iteration and
//! the free-function syscall surface over paths and directory descriptors.

mod dir;
mod file;
mod filesystem;
mod status;
mod temp;
mod types;

pub use dir::{DirEntry, DirEntryType, DirIterator, DirPos, DirStream};
pub use file::{FdFile, File};
pub(crate) use filesystem::open_at_raw;
pub use filesystem::{
    CopyFileRangeParameters, canonicalize_path, change_dir, change_group, change_group_by_name,
    change_mode, change_mode_fd, change_owner, change_owner_by_name, change_owner_fd,
    change_owner_nofollow, check_access, check_access_at, check_access_fd, close_range,
    copy_file_range, copy_file_range_plain, exists_file, flock, get_working_dir, link, linkat,
    linkat_fd, linkat_proc_fd, make_all_dirs, make_dir, make_dir_at, make_fifo, make_fifo_at,
    make_symlink, make_symlink_at, make_tempdir, make_tempfile, normalize_path, open, open_at,
    read_symlink, read_symlink_at, remove_dir, remove_dir_at, remove_tree, rename, set_umask,
    to_path_arg, truncate, truncate_fd, unlink_file, unlink_file_at, which,
};
pub use status::FileStatus;
pub use temp::{TempDir, TempFile};
pub use types::{
    AccessChecks, AccessFlags, CloseRangeFlags, DeviceId, FileMode, FileModeBits, FileType, Inode,
    LockFlags, LockOperation, OpenFlags, OpenMode,
};
