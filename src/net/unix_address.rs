//! UNIX domain socket addresses.

use std::fmt;

use crate::error::{Error, Result};
use crate::net::address::{SocketAddress, zero_and_set_family};
use crate::net::SocketFamily;
use crate::types::Abstract;

/// Address of a UNIX domain socket (`sockaddr_un`).
///
/// Three flavors exist on Linux:
///
/// - *unnamed*: not bound to anything yet, or anonymous as produced by
///   socket pairs.
/// - *path based*: a real file system path; the application manages the
///   lifetime of the file system entry.
/// - *abstract*: a Linux extension where the path starts with a NUL byte
///   and no file system entry exists; the address disappears with its last
///   user. Abstract sockets have no kernel-side permission checking, any
///   process may connect.
///
/// The reported [`size`](SocketAddress::size) covers only the bytes in use,
/// not the full structure. Peers that pass the full structure size for
/// abstract addresses effectively use a different address; communication
/// with such applications will not work.
#[derive(Clone, Copy)]
pub struct UnixAddress {
    raw: libc::sockaddr_un,
    /// Bytes used in `sun_path`, not counting NUL terminators.
    path_len: usize,
}

const BASE_SIZE: usize = std::mem::offset_of!(libc::sockaddr_un, sun_path);

impl UnixAddress {
    /// Creates an empty (unnamed) address.
    pub fn new() -> UnixAddress {
        let mut addr = UnixAddress {
            raw: unsafe { std::mem::zeroed() },
            path_len: 0,
        };
        addr.clear();
        addr
    }

    /// Creates an address from the given path, optionally abstract.
    pub fn from_path(path: impl AsRef<[u8]>, abstract_addr: Abstract) -> Result<UnixAddress> {
        let mut addr = UnixAddress::new();
        addr.set_path(path, abstract_addr)?;
        Ok(addr)
    }

    /// The maximum path length a `sockaddr_un` can carry, not counting the
    /// leading or trailing NUL byte.
    pub fn max_path_len(&self) -> usize {
        std::mem::size_of_val(&self.raw.sun_path) - 1
    }

    /// Sets a new path for the address.
    ///
    /// For abstract addresses the leading NUL byte is added transparently;
    /// `path` itself must not contain NUL bytes in either flavor.
    pub fn set_path(&mut self, path: impl AsRef<[u8]>, abstract_addr: Abstract) -> Result<()> {
        let path = path.as_ref();
        if path.len() > self.max_path_len() {
            return Err(Error::Usage("UNIX socket path too long"));
        }
        if memchr::memchr(0, path).is_some() {
            return Err(Error::Usage("UNIX socket path with embedded NUL byte"));
        }
        self.clear();
        let offset = usize::from(abstract_addr.get());
        for (index, byte) in path.iter().enumerate() {
            self.raw.sun_path[offset + index] = *byte as libc::c_char;
        }
        // the leading NUL of an abstract address is covered by the +1 in
        // size(), like the trailing NUL of a path address
        self.path_len = path.len();
        Ok(())
    }

    /// The currently set path, without a leading NUL for abstract
    /// addresses.
    pub fn get_path(&self) -> &[u8] {
        let start = usize::from(self.is_abstract());
        let len = self.path_len;
        unsafe {
            std::slice::from_raw_parts(self.raw.sun_path.as_ptr().add(start) as *const u8, len)
        }
    }

    /// Whether this is an abstract namespace address.
    pub fn is_abstract(&self) -> bool {
        self.path_len > 1 && self.raw.sun_path[0] == 0
    }

    /// Whether this address is unnamed (empty).
    pub fn is_unnamed(&self) -> bool {
        self.path_len == 0
    }

    /// A human readable rendering: `@name` for abstract addresses, the
    /// plain path otherwise, `<unnamed>` when empty.
    pub fn label(&self) -> String {
        if self.is_unnamed() {
            return "<unnamed>".into();
        }
        let path = String::from_utf8_lossy(self.get_path());
        if self.is_abstract() {
            format!("@{path}")
        } else {
            path.into_owned()
        }
    }
}

impl Default for UnixAddress {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for UnixAddress {
    fn eq(&self, other: &Self) -> bool {
        // one byte beyond the path length distinguishes the abstract flavor
        // (leading NUL) from a path of the same characters
        self.path_len == other.path_len
            && self.raw.sun_family == other.raw.sun_family
            && self.raw.sun_path[..self.path_len + 1] == other.raw.sun_path[..other.path_len + 1]
    }
}

impl Eq for UnixAddress {}

impl fmt::Debug for UnixAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnixAddress({})", self.label())
    }
}

impl SocketAddress for UnixAddress {
    fn family(&self) -> SocketFamily {
        SocketFamily::Unix
    }

    /// The size considering only the currently used path bytes.
    fn size(&self) -> usize {
        BASE_SIZE + self.path_len + 1
    }

    fn max_size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_un>()
    }

    fn raw_addr(&self) -> *const libc::sockaddr {
        &self.raw as *const libc::sockaddr_un as *const libc::sockaddr
    }

    fn raw_addr_mut(&mut self) -> *mut libc::sockaddr {
        &mut self.raw as *mut libc::sockaddr_un as *mut libc::sockaddr
    }

    /// Recomputes the used path length after the kernel wrote `new_length`
    /// bytes of address data.
    fn update(&mut self, new_length: usize) {
        self.path_len = new_length.saturating_sub(BASE_SIZE + 1);
    }

    fn clear(&mut self) {
        zero_and_set_family(&mut self.raw, SocketFamily::Unix);
        self.path_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_flavors() {
        let unnamed = UnixAddress::new();
        assert!(unnamed.is_unnamed());
        assert!(!unnamed.is_abstract());
        assert_eq!(unnamed.label(), "<unnamed>");
        assert_eq!(unnamed.size(), BASE_SIZE + 1);

        let path = UnixAddress::from_path(b"/run/test.sock", Abstract::new(false)).unwrap();
        assert!(!path.is_abstract());
        assert_eq!(path.get_path(), b"/run/test.sock");
        assert_eq!(path.label(), "/run/test.sock");
        assert_eq!(path.size(), BASE_SIZE + 14 + 1);

        let abstract_addr = UnixAddress::from_path(b"somepath", Abstract::new(true)).unwrap();
        assert!(abstract_addr.is_abstract());
        assert_eq!(abstract_addr.get_path(), b"somepath");
        assert_eq!(abstract_addr.label(), "@somepath");
        // the +1 covers the leading NUL byte here
        assert_eq!(abstract_addr.size(), BASE_SIZE + 8 + 1);
    }

    #[test]
    fn update_recomputes_length() {
        let mut addr = UnixAddress::from_path(b"/tmp/x", Abstract::new(false)).unwrap();
        // kernel reports a longer path was written
        addr.update(BASE_SIZE + 10 + 1);
        assert_eq!(addr.path_len, 10);
        addr.update(BASE_SIZE);
        assert!(addr.is_unnamed());
    }

    #[test]
    fn equality_depends_on_flavor() {
        let a = UnixAddress::from_path(b"sock", Abstract::new(true)).unwrap();
        let b = UnixAddress::from_path(b"sock", Abstract::new(true)).unwrap();
        let c = UnixAddress::from_path(b"sock", Abstract::new(false)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_oversized_and_nul_paths() {
        let mut addr = UnixAddress::new();
        let too_long = vec![b'a'; addr.max_path_len() + 1];
        assert!(addr.set_path(&too_long, Abstract::new(false)).is_err());
        assert!(addr.set_path(b"bad\0path", Abstract::new(false)).is_err());
    }
}
