//! Cross-cutting primitive types: the named-boolean parameter carrier and
//! the NUL-terminated string view used at the syscall boundary.

use std::ffi::CStr;
use std::ffi::CString;
use std::fmt;
use std::marker::PhantomData;

/// A boolean function parameter with a name attached to it at the type level.
///
/// Positional `bool` arguments make call sites unreadable and allow two
/// unrelated booleans to be swapped silently. `NamedBool` carries a phantom
/// tag so that e.g. a [`FollowSymlinks`] cannot be passed where a
/// [`CloseOnExec`] is expected, and a compile-time default so that
/// `Default::default()` yields the documented behavior.
pub struct NamedBool<Tag, const DEFAULT: bool> {
    value: bool,
    _tag: PhantomData<Tag>,
}

impl<Tag, const DEFAULT: bool> NamedBool<Tag, DEFAULT> {
    /// Explicitly constructs the flag from a plain boolean.
    pub const fn new(value: bool) -> Self {
        Self {
            value,
            _tag: PhantomData,
        }
    }

    /// The carried boolean value.
    pub const fn get(self) -> bool {
        self.value
    }
}

impl<Tag, const DEFAULT: bool> Default for NamedBool<Tag, DEFAULT> {
    fn default() -> Self {
        Self::new(DEFAULT)
    }
}

impl<Tag, const DEFAULT: bool> Clone for NamedBool<Tag, DEFAULT> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag, const DEFAULT: bool> Copy for NamedBool<Tag, DEFAULT> {}

impl<Tag, const DEFAULT: bool> PartialEq for NamedBool<Tag, DEFAULT> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<Tag, const DEFAULT: bool> Eq for NamedBool<Tag, DEFAULT> {}

impl<Tag, const DEFAULT: bool> From<NamedBool<Tag, DEFAULT>> for bool {
    fn from(b: NamedBool<Tag, DEFAULT>) -> bool {
        b.value
    }
}

impl<Tag, const DEFAULT: bool> fmt::Debug for NamedBool<Tag, DEFAULT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

macro_rules! named_bool {
    ($(#[$doc:meta])* $name:ident, $tag:ident, $default:literal) => {
        #[doc(hidden)]
        #[derive(Debug)]
        pub enum $tag {}
        $(#[$doc])*
        pub type $name = NamedBool<$tag, $default>;
    };
}

named_bool!(
    /// Whether path lookups resolve a trailing symlink.
    FollowSymlinks, FollowSymlinksTag, false);
named_bool!(
    /// Whether a descriptor-owning wrapper closes the descriptor on drop.
    AutoCloseFd, AutoCloseFdTag, true);
named_bool!(
    /// Whether a (new) descriptor carries the close-on-exec flag.
    CloseOnExec, CloseOnExecTag, true);
named_bool!(
    /// Whether setting an environment variable replaces an existing value.
    OverwriteEnv, OverwriteEnvTag, false);
named_bool!(
    /// Whether a UNIX domain address lives in the abstract namespace.
    Abstract, AbstractTag, false);
named_bool!(
    /// Whether the kernel filled in a peer address during a receive.
    AddressFilledIn, AddressFilledInTag, false);

/// A non-owning NUL-terminated string view for the syscall boundary.
///
/// Construction is only possible from data that is already NUL terminated
/// (`&CStr` / `&CString`); plain string slices must be converted via
/// [`CString::new`] first, which makes every allocation explicit.
#[derive(Clone, Copy)]
pub struct SysString<'a>(&'a CStr);

impl<'a> SysString<'a> {
    /// A view of the empty string.
    pub const fn empty() -> Self {
        SysString(c"")
    }

    /// The raw pointer for handing to a system call. Never NULL.
    pub fn raw(self) -> *const libc::c_char {
        self.0.as_ptr()
    }

    /// The string length in bytes, excluding the terminator.
    pub fn length(self) -> usize {
        self.0.to_bytes().len()
    }

    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    /// The bytes of the string, excluding the terminator.
    pub fn view(self) -> &'a [u8] {
        self.0.to_bytes()
    }

    /// The underlying `CStr`.
    pub fn as_c_str(self) -> &'a CStr {
        self.0
    }

    /// The string data, if valid UTF-8.
    pub fn as_str(self) -> Option<&'a str> {
        self.0.to_str().ok()
    }
}

impl Default for SysString<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> From<&'a CStr> for SysString<'a> {
    fn from(s: &'a CStr) -> Self {
        SysString(s)
    }
}

impl<'a> From<&'a CString> for SysString<'a> {
    fn from(s: &'a CString) -> Self {
        SysString(s.as_c_str())
    }
}

impl PartialEq for SysString<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SysString<'_> {}

impl fmt::Debug for SysString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0, f)
    }
}

impl fmt::Display for SysString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

/// Builds an owned NUL-terminated string from arbitrary bytes.
///
/// Fails with a usage error if the input contains an interior NUL byte.
pub fn to_sys_owned(bytes: impl Into<Vec<u8>>) -> crate::error::Result<CString> {
    let bytes = bytes.into();
    if memchr::memchr(0, &bytes).is_some() {
        return Err(crate::error::Error::Usage(
            "string with embedded NUL byte passed to syscall boundary",
        ));
    }
    // just checked for interior NULs
    Ok(unsafe { CString::from_vec_unchecked(bytes) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_bool_defaults() {
        assert!(!FollowSymlinks::default().get());
        assert!(AutoCloseFd::default().get());
        assert!(CloseOnExec::default().get());
        assert!(!OverwriteEnv::default().get());
        assert!(bool::from(CloseOnExec::new(false)) == false);
    }

    #[test]
    fn sys_string_views() {
        let s = SysString::from(c"/etc/fstab");
        assert_eq!(s.length(), 10);
        assert_eq!(s.view(), b"/etc/fstab");
        assert_eq!(s.as_str(), Some("/etc/fstab"));
        assert!(!s.is_empty());
        assert!(SysString::empty().is_empty());
        assert!(!SysString::empty().raw().is_null());
    }

    #[test]
    fn owned_conversion_rejects_interior_nul() {
        assert!(to_sys_owned("a\0b").is_err());
        let ok = to_sys_owned("plain").unwrap();
        assert_eq!(SysString::from(&ok).length(), 5);
    }
}
