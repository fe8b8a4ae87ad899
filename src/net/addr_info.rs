//! DNS and service name resolution via `getaddrinfo()`.

use std::ffi::CStr;
use std::marker::PhantomData;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::net::{Ip4Address, Ip6Address, SocketAddress, SocketFamily, SocketType};
use crate::types::SysString;

bitflags! {
    /// Behavior flags for address resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AddressHintFlags: i32 {
        /// Return addresses of a family only if the system has such an
        /// address configured.
        const ADDR_CONFIG = libc::AI_ADDRCONFIG;
        /// Return IPv4-mapped IPv6 addresses if no native IPv6 addresses
        /// were found.
        const V4_MAPPED = libc::AI_V4MAPPED;
        /// Together with V4_MAPPED: return both kinds.
        const ALL = libc::AI_ALL;
        /// Fill in the canonical host name of the first result.
        const CANON_NAME = libc::AI_CANONNAME;
        /// The node is a numerical address string, skip DNS.
        const NUMERIC_HOST = libc::AI_NUMERICHOST;
        /// The service is a numerical port string, skip service lookup.
        const NUMERIC_SERVICE = libc::AI_NUMERICSERV;
        /// Resolve for binding (wildcard address on empty node).
        const PASSIVE = libc::AI_PASSIVE;
    }
}

impl Default for AddressHintFlags {
    /// The glibc default behavior.
    fn default() -> Self {
        AddressHintFlags::ADDR_CONFIG | AddressHintFlags::V4_MAPPED
    }
}

/// Input filters for a resolution request.
#[derive(Debug, Clone, Copy)]
pub struct AddressHints {
    /// Restrict results to this family; `None` allows any.
    pub family: Option<SocketFamily>,
    /// Restrict results to this socket type; `None` allows any.
    pub socket_type: Option<SocketType>,
    pub flags: AddressHintFlags,
}

impl Default for AddressHints {
    fn default() -> Self {
        AddressHints {
            family: None,
            socket_type: None,
            flags: AddressHintFlags::default(),
        }
    }
}

impl AddressHints {
    pub fn new() -> AddressHints {
        AddressHints::default()
    }

    fn to_raw(self) -> libc::addrinfo {
        let mut raw: libc::addrinfo = unsafe { std::mem::zeroed() };
        raw.ai_flags = self.flags.bits();
        raw.ai_family = self.family.map(|f| f as i32).unwrap_or(libc::AF_UNSPEC);
        raw.ai_socktype = self.socket_type.map(|t| t as i32).unwrap_or(0);
        raw
    }
}

/// One result of a resolution request.
pub struct AddressInfo<'a> {
    raw: &'a libc::addrinfo,
}

impl AddressInfo<'_> {
    pub fn family(&self) -> Option<SocketFamily> {
        SocketFamily::from_raw(self.raw.ai_family as libc::sa_family_t)
    }

    pub fn is_v4(&self) -> bool {
        self.raw.ai_family == libc::AF_INET
    }

    pub fn is_v6(&self) -> bool {
        self.raw.ai_family == libc::AF_INET6
    }

    pub fn socket_type(&self) -> Option<SocketType> {
        match self.raw.ai_socktype {
            libc::SOCK_STREAM => Some(SocketType::Stream),
            libc::SOCK_DGRAM => Some(SocketType::Dgram),
            libc::SOCK_RAW => Some(SocketType::Raw),
            libc::SOCK_SEQPACKET => Some(SocketType::SeqPacket),
            _ => None,
        }
    }

    pub fn protocol(&self) -> i32 {
        self.raw.ai_protocol
    }

    /// The canonical name, present on the first entry when
    /// [`AddressHintFlags::CANON_NAME`] was requested.
    pub fn canon_name(&self) -> Option<&CStr> {
        if self.raw.ai_canonname.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(self.raw.ai_canonname) })
    }

    /// The result as an IPv4 address, if it is one.
    pub fn as_ip4(&self) -> Option<Ip4Address> {
        if !self.is_v4() || self.raw.ai_addr.is_null() {
            return None;
        }
        let mut addr = Ip4Address::new();
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.raw.ai_addr as *const u8,
                addr.raw_addr_mut() as *mut u8,
                (self.raw.ai_addrlen as usize).min(addr.max_size()),
            );
        }
        Some(addr)
    }

    /// The result as an IPv6 address, if it is one.
    pub fn as_ip6(&self) -> Option<Ip6Address> {
        if !self.is_v6() || self.raw.ai_addr.is_null() {
            return None;
        }
        let mut addr = Ip6Address::new();
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.raw.ai_addr as *const u8,
                addr.raw_addr_mut() as *mut u8,
                (self.raw.ai_addrlen as usize).min(addr.max_size()),
            );
        }
        Some(addr)
    }
}

impl std::fmt::Debug for AddressInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AddressInfo(family={:?}, type={:?})",
            self.family(),
            self.socket_type()
        )
    }
}

/// The result list of a `getaddrinfo()` resolution.
#[derive(Debug)]
pub struct AddressInfoList {
    hints: AddressHints,
    head: *mut libc::addrinfo,
}

unsafe impl Send for AddressInfoList {}

impl AddressInfoList {
    pub fn new() -> AddressInfoList {
        AddressInfoList {
            hints: AddressHints::default(),
            head: std::ptr::null_mut(),
        }
    }

    /// The filters applied to the next [`resolve`](Self::resolve).
    pub fn hints(&mut self) -> &mut AddressHints {
        &mut self.hints
    }

    /// Resolves `node` (a host name or address string) and `service` (a
    /// service name or port string) into the list.
    ///
    /// At least one of the two must be non-empty. A previous result list is
    /// released first.
    pub fn resolve(&mut self, node: SysString<'_>, service: SysString<'_>) -> Result<()> {
        if node.is_empty() && service.is_empty() {
            return Err(Error::Usage("resolve without node and service name"));
        }
        self.clear();
        let raw_hints = self.hints.to_raw();
        let node_ptr = if node.is_empty() {
            std::ptr::null()
        } else {
            node.raw()
        };
        let service_ptr = if service.is_empty() {
            std::ptr::null()
        } else {
            service.raw()
        };
        let res = unsafe {
            libc::getaddrinfo(node_ptr, service_ptr, &raw_hints, &mut self.head)
        };
        if res != 0 {
            self.head = std::ptr::null_mut();
            return Err(Error::resolve(res));
        }
        Ok(())
    }

    /// Releases the current result list.
    pub fn clear(&mut self) {
        if !self.head.is_null() {
            unsafe { libc::freeaddrinfo(self.head) };
            self.head = std::ptr::null_mut();
        }
    }

    pub fn valid(&self) -> bool {
        !self.head.is_null()
    }

    pub fn iter(&self) -> AddressInfoIterator<'_> {
        AddressInfoIterator {
            pos: self.head,
            _list: PhantomData,
        }
    }
}

impl Default for AddressInfoList {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AddressInfoList {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'a> IntoIterator for &'a AddressInfoList {
    type Item = AddressInfo<'a>;
    type IntoIter = AddressInfoIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of an [`AddressInfoList`].
#[derive(Debug)]
pub struct AddressInfoIterator<'a> {
    pos: *mut libc::addrinfo,
    _list: PhantomData<&'a AddressInfoList>,
}

impl<'a> Iterator for AddressInfoIterator<'a> {
    type Item = AddressInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos.is_null() {
            return None;
        }
        let current = unsafe { &*self.pos };
        self.pos = current.ai_next;
        Some(AddressInfo { raw: current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_localhost() {
        let mut list = AddressInfoList::new();
        list.hints().flags = AddressHintFlags::NUMERIC_HOST | AddressHintFlags::NUMERIC_SERVICE;
        list.hints().family = Some(SocketFamily::Inet);
        list.hints().socket_type = Some(SocketType::Stream);
        list.resolve(c"127.0.0.1".into(), c"1234".into()).unwrap();
        assert!(list.valid());

        let first = list.iter().next().unwrap();
        assert!(first.is_v4());
        let addr = first.as_ip4().unwrap();
        assert_eq!(addr.ip_as_string().unwrap(), "127.0.0.1");
        assert_eq!(addr.port().to_host(), 1234);
        assert!(first.as_ip6().is_none());
    }

    #[test]
    fn empty_query_is_usage_error() {
        let mut list = AddressInfoList::new();
        let err = list
            .resolve(SysString::empty(), SysString::empty())
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn failed_resolution_reports_eai_code() {
        let mut list = AddressInfoList::new();
        list.hints().flags = AddressHintFlags::NUMERIC_HOST;
        let err = list
            .resolve(c"definitely.not.numeric".into(), c"80".into())
            .unwrap_err();
        assert!(matches!(err, Error::Resolve { .. }));
    }
}
