//! Compile-time selection of the IP family for socket specializations.

use crate::fd::FileDescriptor;
use crate::net::address::SocketAddress;
use crate::net::options::{Ip4Options, Ip6Options};
use crate::net::{Ip4Address, Ip6Address, SocketFamily};

/// Marker trait tying an IP socket specialization to its address family.
pub trait IpFamily {
    const FAMILY: SocketFamily;
    /// The address variant of this family.
    type Address: SocketAddress + Default + Copy + PartialEq + std::fmt::Debug;
    /// The IP-level option accessor of this family.
    type Options<'a>;

    fn ip_options<'a>(fd: FileDescriptor) -> Self::Options<'a>;
}

/// IPv4.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inet4;

impl IpFamily for Inet4 {
    const FAMILY: SocketFamily = SocketFamily::Inet;
    type Address = Ip4Address;
    type Options<'a> = Ip4Options<'a>;

    fn ip_options<'a>(fd: FileDescriptor) -> Ip4Options<'a> {
        Ip4Options::new(fd)
    }
}

/// IPv6.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inet6;

impl IpFamily for Inet6 {
    const FAMILY: SocketFamily = SocketFamily::Inet6;
    type Address = Ip6Address;
    type Options<'a> = Ip6Options<'a>;

    fn ip_options<'a>(fd: FileDescriptor) -> Ip6Options<'a> {
        Ip6Options::new(fd)
    }
}
