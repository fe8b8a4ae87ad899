//! IPv4 and IPv6 socket addresses.

use std::ffi::CString;
use std::fmt;

use crate::error::{Error, Result};
use crate::net::address::{SocketAddress, zero_and_set_family};
use crate::net::byte_order::{NetInt16, NetInt32};
use crate::net::{InterfaceIndex, SocketFamily};

// Not exposed by libc for this target; standard POSIX <arpa/inet.h> functions.
unsafe extern "C" {
    fn inet_pton(af: libc::c_int, src: *const libc::c_char, dst: *mut libc::c_void) -> libc::c_int;
    fn inet_ntop(
        af: libc::c_int,
        src: *const libc::c_void,
        dst: *mut libc::c_char,
        size: libc::socklen_t,
    ) -> *const libc::c_char;
}

/// A raw IPv4 address in network byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ip4RawAddress(pub [u8; 4]);

impl Ip4RawAddress {
    pub const ANY: Ip4RawAddress = Ip4RawAddress([0, 0, 0, 0]);
    pub const LOOPBACK: Ip4RawAddress = Ip4RawAddress([127, 0, 0, 1]);
    pub const BROADCAST: Ip4RawAddress = Ip4RawAddress([255, 255, 255, 255]);

    pub fn to_net(self) -> NetInt32 {
        NetInt32::from_raw(u32::from_ne_bytes(self.0))
    }

    pub fn from_net(net: NetInt32) -> Ip4RawAddress {
        Ip4RawAddress(net.raw().to_ne_bytes())
    }
}

/// A raw IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ip6RawAddress(pub [u8; 16]);

impl Ip6RawAddress {
    pub const ANY: Ip6RawAddress = Ip6RawAddress([0; 16]);
    pub const LOOPBACK: Ip6RawAddress =
        Ip6RawAddress([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
}

fn parse_ip(family: SocketFamily, text: &str, out: *mut libc::c_void) -> Result<()> {
    let text = CString::new(text)
        .map_err(|_| Error::Usage("IP address string with embedded NUL"))?;
    match unsafe { inet_pton(family as i32, text.as_ptr(), out) } {
        1 => Ok(()),
        0 => Err(Error::Usage("malformed IP address string")),
        _ => Err(Error::api("inet_pton")),
    }
}

fn format_ip(family: SocketFamily, addr: *const libc::c_void) -> Result<String> {
    // large enough for INET6_ADDRSTRLEN
    let mut buf = [0 as libc::c_char; 64];
    let res = unsafe {
        inet_ntop(family as i32, addr, buf.as_mut_ptr(), buf.len() as libc::socklen_t)
    };
    if res.is_null() {
        return Err(Error::api("inet_ntop"));
    }
    Ok(unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned())
}

/// An IPv4 socket address (`sockaddr_in`).
#[derive(Clone, Copy)]
pub struct Ip4Address {
    raw: libc::sockaddr_in,
}

impl Ip4Address {
    /// An all-zero address (ANY, port 0).
    pub fn new() -> Ip4Address {
        let mut addr = Ip4Address {
            raw: unsafe { std::mem::zeroed() },
        };
        addr.clear();
        addr
    }

    /// An address from raw parts; `port` is in host byte order.
    pub fn from_parts(ip: Ip4RawAddress, port: u16) -> Ip4Address {
        let mut addr = Ip4Address::new();
        addr.set_addr(ip);
        addr.set_port(NetInt16::new(port));
        addr
    }

    /// Parses a dotted-quad string; `port` is in host byte order.
    pub fn from_string(ip: &str, port: u16) -> Result<Ip4Address> {
        let mut addr = Ip4Address::new();
        addr.set_ip_from_string(ip)?;
        addr.set_port(NetInt16::new(port));
        Ok(addr)
    }

    /// The port in network byte order.
    pub fn port(&self) -> NetInt16 {
        NetInt16::from_raw(self.raw.sin_port)
    }

    pub fn set_port(&mut self, port: NetInt16) {
        self.raw.sin_port = port.raw();
    }

    pub fn addr(&self) -> Ip4RawAddress {
        Ip4RawAddress(self.raw.sin_addr.s_addr.to_ne_bytes())
    }

    pub fn set_addr(&mut self, ip: Ip4RawAddress) {
        self.raw.sin_addr.s_addr = u32::from_ne_bytes(ip.0);
    }

    /// The address as a dotted-quad string.
    pub fn ip_as_string(&self) -> Result<String> {
        format_ip(
            SocketFamily::Inet,
            &self.raw.sin_addr as *const libc::in_addr as *const libc::c_void,
        )
    }

    pub fn set_ip_from_string(&mut self, ip: &str) -> Result<()> {
        parse_ip(
            SocketFamily::Inet,
            ip,
            &mut self.raw.sin_addr as *mut libc::in_addr as *mut libc::c_void,
        )
    }
}

impl Default for Ip4Address {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Ip4Address {
    fn eq(&self, other: &Self) -> bool {
        self.raw.sin_port == other.raw.sin_port
            && self.raw.sin_addr.s_addr == other.raw.sin_addr.s_addr
    }
}

impl Eq for Ip4Address {}

impl fmt::Debug for Ip4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.ip_as_string().as_deref().unwrap_or("<invalid>"),
            self.port()
        )
    }
}

impl SocketAddress for Ip4Address {
    fn family(&self) -> SocketFamily {
        SocketFamily::Inet
    }

    fn size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_in>()
    }

    fn max_size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_in>()
    }

    fn raw_addr(&self) -> *const libc::sockaddr {
        &self.raw as *const libc::sockaddr_in as *const libc::sockaddr
    }

    fn raw_addr_mut(&mut self) -> *mut libc::sockaddr {
        &mut self.raw as *mut libc::sockaddr_in as *mut libc::sockaddr
    }

    fn clear(&mut self) {
        zero_and_set_family(&mut self.raw, SocketFamily::Inet);
    }
}

/// An IPv6 socket address (`sockaddr_in6`).
#[derive(Clone, Copy)]
pub struct Ip6Address {
    raw: libc::sockaddr_in6,
}

impl Ip6Address {
    /// An all-zero address (ANY, port 0).
    pub fn new() -> Ip6Address {
        let mut addr = Ip6Address {
            raw: unsafe { std::mem::zeroed() },
        };
        addr.clear();
        addr
    }

    /// An address from raw parts; `port` is in host byte order.
    pub fn from_parts(ip: Ip6RawAddress, port: u16) -> Ip6Address {
        let mut addr = Ip6Address::new();
        addr.set_addr(ip);
        addr.set_port(NetInt16::new(port));
        addr
    }

    /// Parses a textual IPv6 address; `port` is in host byte order.
    pub fn from_string(ip: &str, port: u16) -> Result<Ip6Address> {
        let mut addr = Ip6Address::new();
        addr.set_ip_from_string(ip)?;
        addr.set_port(NetInt16::new(port));
        Ok(addr)
    }

    /// The port in network byte order.
    pub fn port(&self) -> NetInt16 {
        NetInt16::from_raw(self.raw.sin6_port)
    }

    pub fn set_port(&mut self, port: NetInt16) {
        self.raw.sin6_port = port.raw();
    }

    pub fn addr(&self) -> Ip6RawAddress {
        Ip6RawAddress(self.raw.sin6_addr.s6_addr)
    }

    pub fn set_addr(&mut self, ip: Ip6RawAddress) {
        self.raw.sin6_addr.s6_addr = ip.0;
    }

    /// The interface scope for link-local addresses.
    pub fn get_scope_id(&self) -> InterfaceIndex {
        InterfaceIndex(self.raw.sin6_scope_id)
    }

    pub fn set_scope_id(&mut self, index: InterfaceIndex) {
        self.raw.sin6_scope_id = index.raw();
    }

    /// The IPv6 flow label of this address.
    pub fn get_flow_info(&self) -> u32 {
        self.raw.sin6_flowinfo
    }

    pub fn set_flow_info(&mut self, flow_info: u32) {
        self.raw.sin6_flowinfo = flow_info;
    }

    pub fn ip_as_string(&self) -> Result<String> {
        format_ip(
            SocketFamily::Inet6,
            &self.raw.sin6_addr as *const libc::in6_addr as *const libc::c_void,
        )
    }

    pub fn set_ip_from_string(&mut self, ip: &str) -> Result<()> {
        parse_ip(
            SocketFamily::Inet6,
            ip,
            &mut self.raw.sin6_addr as *mut libc::in6_addr as *mut libc::c_void,
        )
    }
}

impl Default for Ip6Address {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Ip6Address {
    fn eq(&self, other: &Self) -> bool {
        self.raw.sin6_port == other.raw.sin6_port
            && self.raw.sin6_addr.s6_addr == other.raw.sin6_addr.s6_addr
            && self.raw.sin6_scope_id == other.raw.sin6_scope_id
            && self.raw.sin6_flowinfo == other.raw.sin6_flowinfo
    }
}

impl Eq for Ip6Address {}

impl fmt::Debug for Ip6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]:{}",
            self.ip_as_string().as_deref().unwrap_or("<invalid>"),
            self.port()
        )
    }
}

impl SocketAddress for Ip6Address {
    fn family(&self) -> SocketFamily {
        SocketFamily::Inet6
    }

    fn size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_in6>()
    }

    fn max_size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_in6>()
    }

    fn raw_addr(&self) -> *const libc::sockaddr {
        &self.raw as *const libc::sockaddr_in6 as *const libc::sockaddr
    }

    fn raw_addr_mut(&mut self) -> *mut libc::sockaddr {
        &mut self.raw as *mut libc::sockaddr_in6 as *mut libc::sockaddr
    }

    fn clear(&mut self) {
        zero_and_set_family(&mut self.raw, SocketFamily::Inet6);
    }
}

/// Either kind of IP address, as produced by address resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAddress {
    V4(Ip4Address),
    V6(Ip6Address),
}

impl IpAddress {
    pub fn family(&self) -> SocketFamily {
        match self {
            IpAddress::V4(_) => SocketFamily::Inet,
            IpAddress::V6(_) => SocketFamily::Inet6,
        }
    }

    pub fn as_v4(&self) -> Option<&Ip4Address> {
        match self {
            IpAddress::V4(addr) => Some(addr),
            IpAddress::V6(_) => None,
        }
    }

    pub fn as_v6(&self) -> Option<&Ip6Address> {
        match self {
            IpAddress::V6(addr) => Some(addr),
            IpAddress::V4(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_string_round_trip() {
        let addr = Ip4Address::from_string("192.168.1.10", 8080).unwrap();
        assert_eq!(addr.ip_as_string().unwrap(), "192.168.1.10");
        assert_eq!(addr.port().to_host(), 8080);
        assert_eq!(addr.addr(), Ip4RawAddress([192, 168, 1, 10]));
        assert!(Ip4Address::from_string("not.an.ip", 1).is_err());
    }

    #[test]
    fn v4_equality_and_clear() {
        let a = Ip4Address::from_parts(Ip4RawAddress::LOOPBACK, 1234);
        let b = Ip4Address::from_string("127.0.0.1", 1234).unwrap();
        assert_eq!(a, b);
        let mut c = a;
        c.clear();
        assert_ne!(a, c);
        assert_eq!(c.family(), SocketFamily::Inet);
    }

    #[test]
    fn v6_fields() {
        let mut addr = Ip6Address::from_string("::1", 443).unwrap();
        assert_eq!(addr.addr(), Ip6RawAddress::LOOPBACK);
        assert_eq!(addr.ip_as_string().unwrap(), "::1");
        addr.set_scope_id(InterfaceIndex(3));
        addr.set_flow_info(7);
        assert_eq!(addr.get_scope_id(), InterfaceIndex(3));
        assert_eq!(addr.get_flow_info(), 7);
    }
}
