use std::ffi::CStr;
use std::fmt;

use num_enum::FromPrimitive;
use num_enum::IntoPrimitive;

/// Strongly typed errno constants.
///
/// Variants carry semantic names instead of the historical E* abbreviations.
/// Values not covered by the POSIX set map to [`Errno::Unknown`] so that
/// conversion from a raw `i32` is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(i32)]
#[non_exhaustive]
pub enum Errno {
    NoError = 0,
    /// Argument list too long.
    TooBig = libc::E2BIG,
    /// Permission denied.
    Access = libc::EACCES,
    /// Network address already in use.
    AddressInUse = libc::EADDRINUSE,
    AddressNotAvailable = libc::EADDRNOTAVAIL,
    /// Address family not supported.
    AfNotSupported = libc::EAFNOSUPPORT,
    /// Resource unavailable, try again (also `EWOULDBLOCK` on Linux).
    Again = libc::EAGAIN,
    /// Connection already in progress.
    Already = libc::EALREADY,
    /// Bad file descriptor encountered.
    BadFd = libc::EBADF,
    BadMsg = libc::EBADMSG,
    /// Device or resource busy.
    Busy = libc::EBUSY,
    /// Operation has been canceled.
    Canceled = libc::ECANCELED,
    /// No child process.
    NoChild = libc::ECHILD,
    ConnAborted = libc::ECONNABORTED,
    /// Connection was refused (e.g. no one listening on port).
    ConnRefused = libc::ECONNREFUSED,
    ConnReset = libc::ECONNRESET,
    /// Resource deadlock would occur.
    Deadlock = libc::EDEADLK,
    DestAddrRequired = libc::EDESTADDRREQ,
    /// Mathematics argument out of domain of function.
    OutOfDomain = libc::EDOM,
    /// File (already) exists.
    Exists = libc::EEXIST,
    /// Bad address (provided).
    Fault = libc::EFAULT,
    FileTooBig = libc::EFBIG,
    HostUnreachable = libc::EHOSTUNREACH,
    IdRemoved = libc::EIDRM,
    IllegalSeq = libc::EILSEQ,
    /// Operation is in progress (but not yet completed).
    InProgress = libc::EINPROGRESS,
    /// Interrupted system call.
    Interrupted = libc::EINTR,
    /// Invalid argument encountered.
    InvalidArg = libc::EINVAL,
    IoError = libc::EIO,
    IsConnected = libc::EISCONN,
    /// File is a directory (unexpectedly).
    IsDirectory = libc::EISDIR,
    /// Too many levels of symlinks.
    LinkLoop = libc::ELOOP,
    /// Per-process limit of file descriptors reached.
    TooManyFiles = libc::EMFILE,
    /// Too many links (e.g. file system limit).
    TooManyLinks = libc::EMLINK,
    MsgTooLarge = libc::EMSGSIZE,
    NameTooLong = libc::ENAMETOOLONG,
    NetworkDown = libc::ENETDOWN,
    NetworkReset = libc::ENETRESET,
    NetworkUnreachable = libc::ENETUNREACH,
    /// Too many files open system wide.
    TooManyFilesInSys = libc::ENFILE,
    NoBufferSpace = libc::ENOBUFS,
    NoData = libc::ENODATA,
    NoDevice = libc::ENODEV,
    /// No such file or directory (or an object was otherwise not found).
    NoEntry = libc::ENOENT,
    /// Executable file format error.
    NotExecutable = libc::ENOEXEC,
    NoLocks = libc::ENOLCK,
    /// Not enough (kernel) memory available for the operation.
    NoMemory = libc::ENOMEM,
    NoMessage = libc::ENOMSG,
    NoProtoOpt = libc::ENOPROTOOPT,
    /// No space left on device.
    NoSpace = libc::ENOSPC,
    NoStreamResources = libc::ENOSR,
    NoStream = libc::ENOSTR,
    /// Function not available (e.g. unimplemented system call).
    NoSys = libc::ENOSYS,
    NotConnected = libc::ENOTCONN,
    /// Not a directory, or a symlink to a directory.
    NotADir = libc::ENOTDIR,
    /// Directory not empty.
    NotEmpty = libc::ENOTEMPTY,
    NotRecoverable = libc::ENOTRECOVERABLE,
    NotASocket = libc::ENOTSOCK,
    /// Not supported (also `EOPNOTSUPP` on Linux).
    NotSupported = libc::ENOTSUP,
    /// Not a terminal, or unsupported ioctl.
    NotATty = libc::ENOTTY,
    /// No such device or address.
    Nxio = libc::ENXIO,
    /// Value too large to be stored in data type.
    Overflow = libc::EOVERFLOW,
    OwnerDead = libc::EOWNERDEAD,
    /// Operation not permitted.
    Permission = libc::EPERM,
    BrokenPipe = libc::EPIPE,
    ProtoError = libc::EPROTO,
    ProtoNotSupported = libc::EPROTONOSUPPORT,
    /// Wrong protocol type for socket.
    ProtoMismatch = libc::EPROTOTYPE,
    /// Result too large (out of range).
    Range = libc::ERANGE,
    ReadOnlyFs = libc::EROFS,
    /// Device does not support seek (e.g. a pipe).
    IsPipe = libc::ESPIPE,
    /// No such process.
    Search = libc::ESRCH,
    StaleHandle = libc::ESTALE,
    /// Timer expired.
    Timer = libc::ETIME,
    /// Connection timed out.
    TimedOut = libc::ETIMEDOUT,
    TextFileBusy = libc::ETXTBSY,
    /// Cross-device link.
    CrossDevice = libc::EXDEV,
    /// Bad ELF interpreter.
    BadLibrary = libc::ELIBBAD,
    /// An errno value outside the wrapped set.
    #[num_enum(catch_all)]
    Unknown(i32),
}

impl Errno {
    /// On Linux `EWOULDBLOCK` and `EAGAIN` share one value.
    pub const WOULD_BLOCK: Errno = Errno::Again;
    /// On Linux `EOPNOTSUPP` and `ENOTSUP` share one value.
    pub const OP_NOT_SUPPORTED: Errno = Errno::NotSupported;

    /// The strongly typed representation of the current thread's `errno`.
    pub fn last() -> Errno {
        Errno::from(
            std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(0),
        )
    }

    /// Reset the current thread's `errno` to zero.
    pub fn reset() {
        // Safety: errno_location is valid for the calling thread.
        unsafe {
            *libc::__errno_location() = 0;
        }
    }

    /// The raw errno value.
    pub fn raw(self) -> i32 {
        self.into()
    }

    /// Returns whether this value indicates a non-blocking operation that
    /// could not complete right away.
    pub fn is_would_block(self) -> bool {
        self == Errno::Again
    }

    /// The `strerror()` message for this errno.
    pub fn message(self) -> String {
        let mut buf = [0 as libc::c_char; 256];
        let res = unsafe { libc::strerror_r(self.raw(), buf.as_mut_ptr(), buf.len()) };
        if res != 0 {
            return format!("errno {}", self.raw());
        }
        unsafe { CStr::from_ptr(buf.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        for raw in [0, libc::EPERM, libc::ENOENT, libc::EAGAIN, libc::EXDEV] {
            assert_eq!(Errno::from(raw).raw(), raw);
        }
        // an errno no variant covers survives the round trip as well
        let exotic = Errno::from(4095);
        assert_eq!(exotic.raw(), 4095);
        assert_eq!(exotic, Errno::Unknown(4095));
    }

    #[test]
    fn aliases() {
        assert_eq!(Errno::WOULD_BLOCK, Errno::Again);
        assert_eq!(Errno::WOULD_BLOCK.raw(), libc::EWOULDBLOCK);
        assert!(Errno::Again.is_would_block());
    }

    #[test]
    fn message_lookup() {
        assert_eq!(Errno::Permission.message(), "Operation not permitted");
    }
}
