//! Basic types used in the file system APIs.

use std::fmt;

use bitflags::bitflags;

/// A unique file serial number on a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inode(pub u64);

impl Inode {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A device identification number (major:minor parts combined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

impl DeviceId {
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn major(self) -> u32 {
        libc::major(self.0)
    }

    pub fn minor(self) -> u32 {
        libc::minor(self.0)
    }
}

/// The basic `open()` access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpenMode {
    ReadOnly = libc::O_RDONLY,
    WriteOnly = libc::O_WRONLY,
    ReadWrite = libc::O_RDWR,
}

impl OpenMode {
    /// Extracts the access mode from a raw flags value (`O_ACCMODE` part).
    pub(crate) fn from_raw(raw: i32) -> OpenMode {
        match raw & libc::O_ACCMODE {
            libc::O_WRONLY => OpenMode::WriteOnly,
            libc::O_RDWR => OpenMode::ReadWrite,
            // O_ACCMODE can hold no other combination
            _ => OpenMode::ReadOnly,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

bitflags! {
    /// File descriptor settings on top of the basic [`OpenMode`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: i32 {
        /// Writes always happen at the end of the file.
        const APPEND = libc::O_APPEND;
        /// Enable signal driven I/O for certain file types.
        const ASYNC = libc::O_ASYNC;
        /// Close the descriptor during `execve()`.
        const CLOEXEC = libc::O_CLOEXEC;
        /// Create the file if it doesn't exist (a file mode is required).
        const CREATE = libc::O_CREAT;
        /// Bypass kernel side caching.
        const DIRECT = libc::O_DIRECT;
        /// Require the path to refer to a directory.
        const DIRECTORY = libc::O_DIRECTORY;
        /// Synchronous writes covering the file data.
        const DSYNC = libc::O_DSYNC;
        /// Together with CREATE, require that the file gets newly created.
        const EXCLUSIVE = libc::O_EXCL;
        /// Don't update the file's access time on reads.
        const NOATIME = libc::O_NOATIME;
        /// Don't make a terminal the controlling terminal of the process.
        const NO_CONTROLLING_TTY = libc::O_NOCTTY;
        /// Don't follow symlinks in the final path component.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Open in non-blocking mode.
        const NONBLOCK = libc::O_NONBLOCK;
        /// Open only the file location, usable for `*_at` navigation.
        const PATH = libc::O_PATH;
        /// Synchronous writes covering data and metadata.
        const SYNC = libc::O_SYNC;
        /// Create an unnamed temporary file; the path names the directory.
        const TMPFILE = libc::O_TMPFILE;
        /// Truncate an existing file object to zero size.
        const TRUNCATE = libc::O_TRUNC;
    }
}

bitflags! {
    /// The classical UNIX permission and special mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileModeBits: u32 {
        const SETUID = libc::S_ISUID;
        const SETGID = libc::S_ISGID;
        const STICKY = libc::S_ISVTX;
        const OWNER_READ = libc::S_IRUSR;
        const OWNER_WRITE = libc::S_IWUSR;
        const OWNER_EXEC = libc::S_IXUSR;
        const OWNER_ALL = libc::S_IRWXU;
        const GROUP_READ = libc::S_IRGRP;
        const GROUP_WRITE = libc::S_IWGRP;
        const GROUP_EXEC = libc::S_IXGRP;
        const GROUP_ALL = libc::S_IRWXG;
        const OTHER_READ = libc::S_IROTH;
        const OTHER_WRITE = libc::S_IWOTH;
        const OTHER_EXEC = libc::S_IXOTH;
        const OTHER_ALL = libc::S_IRWXO;
    }
}

/// The mode bits portion of a `st_mode` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileMode(FileModeBits);

impl FileMode {
    /// Constructs a mode from an octal literal or a kernel-provided value.
    ///
    /// Any file type bits in the upper portion are masked away.
    pub const fn from_raw(raw: libc::mode_t) -> FileMode {
        FileMode(FileModeBits::from_bits_truncate(raw & !libc::S_IFMT))
    }

    pub const fn new(bits: FileModeBits) -> FileMode {
        FileMode(bits)
    }

    pub fn is_set_uid(self) -> bool {
        self.0.contains(FileModeBits::SETUID)
    }

    pub fn is_set_gid(self) -> bool {
        self.0.contains(FileModeBits::SETGID)
    }

    pub fn is_sticky(self) -> bool {
        self.0.contains(FileModeBits::STICKY)
    }

    pub fn can_owner_read(self) -> bool {
        self.0.contains(FileModeBits::OWNER_READ)
    }

    pub fn can_owner_write(self) -> bool {
        self.0.contains(FileModeBits::OWNER_WRITE)
    }

    pub fn can_owner_exec(self) -> bool {
        self.0.contains(FileModeBits::OWNER_EXEC)
    }

    pub fn can_any_read(self) -> bool {
        self.0.intersects(
            FileModeBits::OWNER_READ | FileModeBits::GROUP_READ | FileModeBits::OTHER_READ,
        )
    }

    pub fn can_any_write(self) -> bool {
        self.0.intersects(
            FileModeBits::OWNER_WRITE | FileModeBits::GROUP_WRITE | FileModeBits::OTHER_WRITE,
        )
    }

    pub fn can_any_exec(self) -> bool {
        self.0.intersects(
            FileModeBits::OWNER_EXEC | FileModeBits::GROUP_EXEC | FileModeBits::OTHER_EXEC,
        )
    }

    /// The complete bitmask.
    pub fn mask(self) -> FileModeBits {
        self.0
    }

    /// A `rwxr-x---` style rendering as known from `ls`.
    pub fn symbolic(self) -> String {
        let mut out = String::with_capacity(9);
        let trios = [
            (
                FileModeBits::OWNER_READ,
                FileModeBits::OWNER_WRITE,
                FileModeBits::OWNER_EXEC,
                FileModeBits::SETUID,
                's',
            ),
            (
                FileModeBits::GROUP_READ,
                FileModeBits::GROUP_WRITE,
                FileModeBits::GROUP_EXEC,
                FileModeBits::SETGID,
                's',
            ),
            (
                FileModeBits::OTHER_READ,
                FileModeBits::OTHER_WRITE,
                FileModeBits::OTHER_EXEC,
                FileModeBits::STICKY,
                't',
            ),
        ];
        for (read, write, exec, special, special_char) in trios {
            out.push(if self.0.contains(read) { 'r' } else { '-' });
            out.push(if self.0.contains(write) { 'w' } else { '-' });
            out.push(match (self.0.contains(exec), self.0.contains(special)) {
                (true, false) => 'x',
                (true, true) => special_char,
                (false, true) => special_char.to_ascii_uppercase(),
                (false, false) => '-',
            });
        }
        out
    }

    pub const fn raw(self) -> libc::mode_t {
        self.0.bits()
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0o{:04o})", self.symbolic(), self.raw())
    }
}

/// The file type portion of a `st_mode` value.
///
/// These are not bitmask values; exactly one type is ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FileType {
    None = 0,
    Socket = libc::S_IFSOCK,
    /// Symbolic link.
    Link = libc::S_IFLNK,
    Regular = libc::S_IFREG,
    BlockDevice = libc::S_IFBLK,
    Directory = libc::S_IFDIR,
    CharDevice = libc::S_IFCHR,
    /// A (named) pipe.
    Fifo = libc::S_IFIFO,
}

impl FileType {
    /// Extracts the type bits from a raw `st_mode` value.
    pub fn from_raw(raw: libc::mode_t) -> FileType {
        match raw & libc::S_IFMT {
            libc::S_IFSOCK => FileType::Socket,
            libc::S_IFLNK => FileType::Link,
            libc::S_IFREG => FileType::Regular,
            libc::S_IFBLK => FileType::BlockDevice,
            libc::S_IFDIR => FileType::Directory,
            libc::S_IFCHR => FileType::CharDevice,
            libc::S_IFIFO => FileType::Fifo,
            _ => FileType::None,
        }
    }

    pub fn is_regular(self) -> bool {
        self == FileType::Regular
    }

    pub fn is_directory(self) -> bool {
        self == FileType::Directory
    }

    pub fn is_char_dev(self) -> bool {
        self == FileType::CharDevice
    }

    pub fn is_block_dev(self) -> bool {
        self == FileType::BlockDevice
    }

    pub fn is_fifo(self) -> bool {
        self == FileType::Fifo
    }

    pub fn is_link(self) -> bool {
        self == FileType::Link
    }

    pub fn is_socket(self) -> bool {
        self == FileType::Socket
    }

    /// The type character as known from `ls -l`.
    pub fn symbolic(self) -> char {
        match self {
            FileType::None => '?',
            FileType::Socket => 's',
            FileType::Link => 'l',
            FileType::Regular => '-',
            FileType::BlockDevice => 'b',
            FileType::Directory => 'd',
            FileType::CharDevice => 'c',
            FileType::Fifo => 'p',
        }
    }

    pub fn raw(self) -> libc::mode_t {
        self as libc::mode_t
    }
}

bitflags! {
    /// The permission aspects tested by `fs::check_access()`.
    ///
    /// An empty mask performs a pure existence check (`F_OK`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessChecks: i32 {
        const READ = libc::R_OK;
        const WRITE = libc::W_OK;
        const EXEC = libc::X_OK;
    }
}

bitflags! {
    /// Behavior flags for the `faccessat` family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: i32 {
        /// Check against the effective instead of the real IDs.
        const EFFECTIVE_CREDS = libc::AT_EACCESS;
        /// Don't resolve a trailing symlink.
        const NO_FOLLOW = libc::AT_SYMLINK_NOFOLLOW;
    }
}

/// The lock operation for `fs::flock()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LockOperation {
    /// A shared lock; multiple holders may coexist.
    Shared = libc::LOCK_SH,
    /// An exclusive lock.
    Exclusive = libc::LOCK_EX,
    /// Drop an existing lock.
    Unlock = libc::LOCK_UN,
}

bitflags! {
    /// Modifiers for `fs::flock()`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockFlags: i32 {
        /// Fail with `Errno::WOULD_BLOCK` instead of blocking.
        const NONBLOCK = libc::LOCK_NB;
    }
}

bitflags! {
    /// Flags for `fs::close_range()`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CloseRangeFlags: u32 {
        /// Mark the descriptors close-on-exec instead of closing them.
        const CLOEXEC = libc::CLOSE_RANGE_CLOEXEC;
        /// Unshare the descriptor table before the operation.
        const UNSHARE = libc::CLOSE_RANGE_UNSHARE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_mode_extraction() {
        assert_eq!(OpenMode::from_raw(libc::O_RDONLY), OpenMode::ReadOnly);
        assert_eq!(
            OpenMode::from_raw(libc::O_WRONLY | libc::O_APPEND),
            OpenMode::WriteOnly
        );
        assert_eq!(OpenMode::from_raw(libc::O_RDWR), OpenMode::ReadWrite);
    }

    #[test]
    fn mode_symbolic() {
        assert_eq!(FileMode::from_raw(0o750).symbolic(), "rwxr-x---");
        assert_eq!(FileMode::from_raw(0o4711).symbolic(), "rws--x--x");
        assert_eq!(FileMode::from_raw(0o1777).symbolic(), "rwxrwxrwt");
        assert_eq!(FileMode::from_raw(0o644).raw(), 0o644);
    }

    #[test]
    fn mode_masks_type_bits() {
        let with_type = libc::S_IFREG | 0o640;
        assert_eq!(FileMode::from_raw(with_type).raw(), 0o640);
        assert_eq!(FileType::from_raw(with_type), FileType::Regular);
    }

    #[test]
    fn flag_mask_operations() {
        let mut flags = OpenFlags::empty();
        flags.insert(OpenFlags::APPEND);
        assert!(flags.contains(OpenFlags::APPEND));
        flags.remove(OpenFlags::APPEND);
        assert!(!flags.contains(OpenFlags::APPEND));

        let before = flags;
        flags.toggle(OpenFlags::NONBLOCK);
        flags.toggle(OpenFlags::NONBLOCK);
        assert_eq!(flags, before);

        // combining zero flags equals the default constructed mask
        assert_eq!(OpenFlags::empty(), OpenFlags::default());
        assert!(
            (OpenFlags::CREATE | OpenFlags::EXCLUSIVE)
                .intersects(OpenFlags::EXCLUSIVE | OpenFlags::TRUNCATE)
        );
        assert!((OpenFlags::CREATE | OpenFlags::EXCLUSIVE).contains(OpenFlags::CREATE));
    }

    #[test]
    fn type_symbols() {
        assert_eq!(FileType::Directory.symbolic(), 'd');
        assert_eq!(FileType::from_raw(libc::S_IFIFO).symbolic(), 'p');
        assert!(FileType::from_raw(libc::S_IFLNK).is_link());
    }
}
