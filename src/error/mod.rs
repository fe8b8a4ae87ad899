//! The error taxonomy shared by every fallible operation in the crate.

use std::path::PathBuf;

use thiserror::Error;

mod errno;

pub use errno::Errno;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `getaddrinfo()` error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[repr(i32)]
#[non_exhaustive]
pub enum EaiCode {
    /// The name server returned a temporary failure, try again later.
    Again = libc::EAI_AGAIN,
    BadFlags = libc::EAI_BADFLAGS,
    /// The name server returned a permanent failure.
    Fail = libc::EAI_FAIL,
    /// The requested address family is not supported.
    Family = libc::EAI_FAMILY,
    Memory = libc::EAI_MEMORY,
    /// The node or service is not known.
    NoName = libc::EAI_NONAME,
    /// The requested service is not available for the socket type.
    Service = libc::EAI_SERVICE,
    SockType = libc::EAI_SOCKTYPE,
    /// Other system error, inspect the accompanying [`Errno`].
    System = libc::EAI_SYSTEM,
    Overflow = libc::EAI_OVERFLOW,
    /// GNU extension: the host exists but has no address data.
    NoData = -5,
    /// GNU extension: the host has no address in the requested family.
    AddrFamily = -9,
    #[num_enum(catch_all)]
    Unknown(i32) = i32::MIN,
}

impl EaiCode {
    /// The `gai_strerror()` message for this code.
    pub fn message(self) -> String {
        let raw: i32 = self.into();
        let msg = unsafe { libc::gai_strerror(raw) };
        if msg.is_null() {
            return format!("EAI code {raw}");
        }
        unsafe { std::ffi::CStr::from_ptr(msg) }
            .to_string_lossy()
            .into_owned()
    }
}

/// The error type for all operations in this crate.
///
/// Every kernel failure surfaces as [`Error::Api`] or one of its more
/// contextual refinements. [`Error::Usage`] and [`Error::Runtime`] never
/// involve the kernel: the former reports a violated caller precondition, the
/// latter a broken library invariant.
#[derive(Debug, Error)]
pub enum Error {
    /// A system call failed with the contained errno.
    #[error("{op} failed: {errno}")]
    Api {
        /// The operation (usually the syscall name) that failed.
        op: &'static str,
        errno: Errno,
    },

    /// A file system operation on an explicit path failed.
    #[error("{op} of {path:?} failed: {errno}")]
    File {
        op: &'static str,
        path: PathBuf,
        errno: Errno,
    },

    /// A buffer passed to a system call was too small.
    #[error("{op} failed: {errno} (required length {required})")]
    Range {
        op: &'static str,
        errno: Errno,
        /// The buffer length the kernel asked for.
        required: usize,
    },

    /// Name resolution via `getaddrinfo()` failed.
    #[error("name resolution failed: {} ({code:?})", .code.message())]
    Resolve {
        code: EaiCode,
        /// Set when `code` is [`EaiCode::System`].
        errno: Option<Errno>,
    },

    /// A caller precondition was violated; no system call was attempted.
    #[error("usage error: {0}")]
    Usage(&'static str),

    /// A library-internal invariant was violated.
    #[error("runtime error: {0}")]
    Runtime(&'static str),
}

impl Error {
    /// An [`Error::Api`] capturing the calling thread's current errno.
    pub(crate) fn api(op: &'static str) -> Error {
        Error::Api {
            op,
            errno: Errno::last(),
        }
    }

    pub(crate) fn api_errno(op: &'static str, errno: Errno) -> Error {
        Error::Api { op, errno }
    }

    /// An [`Error::File`] capturing the calling thread's current errno.
    pub(crate) fn file(op: &'static str, path: impl Into<PathBuf>) -> Error {
        Error::File {
            op,
            path: path.into(),
            errno: Errno::last(),
        }
    }

    pub(crate) fn resolve(code: i32) -> Error {
        let code = EaiCode::from(code);
        Error::Resolve {
            code,
            errno: (code == EaiCode::System).then(Errno::last),
        }
    }

    /// The errno associated with this error, if any.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Api { errno, .. } | Error::File { errno, .. } | Error::Range { errno, .. } => {
                Some(*errno)
            }
            Error::Resolve { errno, .. } => *errno,
            Error::Usage(_) | Error::Runtime(_) => None,
        }
    }

    /// Whether this error reports a non-blocking operation that would have
    /// blocked.
    pub fn is_would_block(&self) -> bool {
        self.errno().is_some_and(Errno::is_would_block)
    }

    /// Whether this error reports an interrupted system call.
    pub fn is_interrupted(&self) -> bool {
        self.errno() == Some(Errno::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_detection() {
        let err = Error::api_errno("recv", Errno::Again);
        assert!(err.is_would_block());
        assert!(!Error::Usage("x").is_would_block());
    }

    #[test]
    fn errno_extraction() {
        let err = Error::File {
            op: "open",
            path: "/nonexistent".into(),
            errno: Errno::NoEntry,
        };
        assert_eq!(err.errno(), Some(Errno::NoEntry));
        assert_eq!(Error::Runtime("broken").errno(), None);
    }
}
