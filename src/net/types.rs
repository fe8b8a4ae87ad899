//! Basic types shared across the socket subsystem.

use bitflags::bitflags;

/// The address/protocol family of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SocketFamily {
    Unspec = libc::AF_UNSPEC,
    /// IPv4.
    Inet = libc::AF_INET,
    /// IPv6.
    Inet6 = libc::AF_INET6,
    /// UNIX domain sockets.
    Unix = libc::AF_UNIX,
    /// Kernel netlink sockets.
    Netlink = libc::AF_NETLINK,
    /// Raw link layer access.
    Packet = libc::AF_PACKET,
}

impl SocketFamily {
    pub fn from_raw(raw: libc::sa_family_t) -> Option<SocketFamily> {
        match raw as i32 {
            libc::AF_UNSPEC => Some(SocketFamily::Unspec),
            libc::AF_INET => Some(SocketFamily::Inet),
            libc::AF_INET6 => Some(SocketFamily::Inet6),
            libc::AF_UNIX => Some(SocketFamily::Unix),
            libc::AF_NETLINK => Some(SocketFamily::Netlink),
            libc::AF_PACKET => Some(SocketFamily::Packet),
            _ => None,
        }
    }

    pub fn raw(self) -> libc::sa_family_t {
        self as i32 as libc::sa_family_t
    }
}

/// The communication semantics of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SocketType {
    /// Reliable, ordered byte stream.
    Stream = libc::SOCK_STREAM,
    /// Unreliable, unordered datagrams with preserved boundaries.
    Dgram = libc::SOCK_DGRAM,
    /// Raw network protocol access.
    Raw = libc::SOCK_RAW,
    /// Reliable datagrams without ordering guarantees.
    Rdm = libc::SOCK_RDM,
    /// Reliable, ordered datagrams with preserved boundaries.
    SeqPacket = libc::SOCK_SEQPACKET,
}

bitflags! {
    /// Flags applied at socket creation time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SocketFlags: i32 {
        const CLOEXEC = libc::SOCK_CLOEXEC;
        const NONBLOCK = libc::SOCK_NONBLOCK;
    }
}

/// The concrete protocol of a socket; `Default` lets the kernel choose the
/// canonical protocol for the (family, type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SocketProtocol {
    Default = 0,
    Tcp = libc::IPPROTO_TCP,
    Udp = libc::IPPROTO_UDP,
    Icmp = libc::IPPROTO_ICMP,
    IcmpV6 = libc::IPPROTO_ICMPV6,
    Raw = libc::IPPROTO_RAW,
}

/// The option levels for `getsockopt()`/`setsockopt()` and the
/// interpretation key of received control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OptLevel {
    Socket = libc::SOL_SOCKET,
    Ip = libc::IPPROTO_IP,
    IpV6 = libc::IPPROTO_IPV6,
    Tcp = libc::IPPROTO_TCP,
    Udp = libc::IPPROTO_UDP,
}

impl OptLevel {
    pub fn from_raw(raw: i32) -> Option<OptLevel> {
        match raw {
            libc::SOL_SOCKET => Some(OptLevel::Socket),
            libc::IPPROTO_IP => Some(OptLevel::Ip),
            libc::IPPROTO_IPV6 => Some(OptLevel::IpV6),
            libc::IPPROTO_TCP => Some(OptLevel::Tcp),
            libc::IPPROTO_UDP => Some(OptLevel::Udp),
            _ => None,
        }
    }
}

bitflags! {
    /// Flags for the send and receive families of socket calls.
    ///
    /// Some bits are only meaningful for sending, some only for receiving,
    /// and some only appear in the *returned* flags of a `recvmsg()`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: i32 {
        /// Progress happened on the link layer path to this destination.
        const CONFIRM = libc::MSG_CONFIRM;
        /// Send to directly connected hosts only, bypassing routing.
        const DONT_ROUTE = libc::MSG_DONTROUTE;
        /// Non-blocking operation for this call only.
        const DONT_WAIT = libc::MSG_DONTWAIT;
        /// Terminates a record on SEQPACKET style sockets.
        const END_OF_RECORD = libc::MSG_EOR;
        /// More data will follow; corks the current packet.
        const MORE_DATA = libc::MSG_MORE;
        /// Don't raise SIGPIPE when the peer closed the connection.
        const NO_SIGNAL = libc::MSG_NOSIGNAL;
        /// Send or receive out-of-band data.
        const OUT_OF_BAND = libc::MSG_OOB;
        /// Receive without consuming the data from the queue.
        const PEEK = libc::MSG_PEEK;
        /// Reported when a datagram was truncated; requests real length
        /// reporting when set on receive.
        const TRUNCATE = libc::MSG_TRUNC;
        /// Reported when control data was truncated.
        const CTL_TRUNCATED = libc::MSG_CTRUNC;
        /// Block until the full request is satisfied.
        const WAIT_ALL = libc::MSG_WAITALL;
        /// Mark file descriptors received via SCM_RIGHTS close-on-exec.
        const CLOEXEC = libc::MSG_CMSG_CLOEXEC;
        /// Receive queued errors from the socket error queue.
        const ERRQUEUE = libc::MSG_ERRQUEUE;
    }
}

/// The direction(s) to shut down on a connected socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Direction {
    /// No more receiving.
    Read = libc::SHUT_RD,
    /// No more sending.
    Write = libc::SHUT_WR,
    ReadWrite = libc::SHUT_RDWR,
}

/// Peer identity as transported by SCM_CREDENTIALS and SO_PEERCRED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixCredentials {
    pub pid: crate::proc::ProcessId,
    pub uid: crate::proc::UserId,
    pub gid: crate::proc::GroupId,
}

impl UnixCredentials {
    /// The credentials of the calling process.
    pub fn of_caller() -> UnixCredentials {
        UnixCredentials {
            pid: crate::proc::get_own_pid(),
            uid: crate::proc::get_real_user_id(),
            gid: crate::proc::get_real_group_id(),
        }
    }

    pub(crate) fn from_raw(raw: libc::ucred) -> UnixCredentials {
        UnixCredentials {
            pid: crate::proc::ProcessId::new(raw.pid),
            uid: crate::proc::UserId::new(raw.uid),
            gid: crate::proc::GroupId::new(raw.gid),
        }
    }

    pub(crate) fn to_raw(self) -> libc::ucred {
        libc::ucred {
            pid: self.pid.raw(),
            uid: self.uid.raw(),
            gid: self.gid.raw(),
        }
    }
}

/// Ancillary message types on [`OptLevel::Socket`] (UNIX domain sockets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UnixMessage {
    /// File descriptor passing (SCM_RIGHTS).
    Rights = libc::SCM_RIGHTS,
    /// Sender identity (SCM_CREDENTIALS).
    Credentials = libc::SCM_CREDENTIALS,
}

impl UnixMessage {
    pub fn from_raw(raw: i32) -> Option<UnixMessage> {
        match raw {
            libc::SCM_RIGHTS => Some(UnixMessage::Rights),
            libc::SCM_CREDENTIALS => Some(UnixMessage::Credentials),
            _ => None,
        }
    }
}

/// Ancillary message types on [`OptLevel::Ip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Ip4Message {
    /// Packet destination information (IP_PKTINFO).
    PacketInfo = libc::IP_PKTINFO,
    /// Type-of-service byte of a received packet (IP_TOS).
    Tos = libc::IP_TOS,
    /// Time-to-live of a received packet (IP_TTL).
    Ttl = libc::IP_TTL,
    /// A queued socket error (IP_RECVERR).
    RecvErr = libc::IP_RECVERR,
}

impl Ip4Message {
    pub fn from_raw(raw: i32) -> Option<Ip4Message> {
        match raw {
            libc::IP_PKTINFO => Some(Ip4Message::PacketInfo),
            libc::IP_TOS => Some(Ip4Message::Tos),
            libc::IP_TTL => Some(Ip4Message::Ttl),
            libc::IP_RECVERR => Some(Ip4Message::RecvErr),
            _ => None,
        }
    }
}

/// Ancillary message types on [`OptLevel::IpV6`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Ip6Message {
    /// Packet destination information (IPV6_PKTINFO).
    PacketInfo = libc::IPV6_PKTINFO,
    /// Hop limit of a received packet (IPV6_HOPLIMIT).
    HopLimit = libc::IPV6_HOPLIMIT,
    /// A queued socket error (IPV6_RECVERR).
    RecvErr = libc::IPV6_RECVERR,
}

impl Ip6Message {
    pub fn from_raw(raw: i32) -> Option<Ip6Message> {
        match raw {
            libc::IPV6_PKTINFO => Some(Ip6Message::PacketInfo),
            libc::IPV6_HOPLIMIT => Some(Ip6Message::HopLimit),
            libc::IPV6_RECVERR => Some(Ip6Message::RecvErr),
            _ => None,
        }
    }
}

/// A network interface index as used in IPv6 scopes and link layer
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceIndex(pub u32);

impl InterfaceIndex {
    /// The "any interface" value.
    pub const ANY: InterfaceIndex = InterfaceIndex(0);

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_round_trip() {
        for family in [
            SocketFamily::Inet,
            SocketFamily::Inet6,
            SocketFamily::Unix,
            SocketFamily::Packet,
        ] {
            assert_eq!(SocketFamily::from_raw(family.raw()), Some(family));
        }
        assert_eq!(SocketFamily::from_raw(9999), None);
    }

    #[test]
    fn opt_level_mapping() {
        assert_eq!(OptLevel::from_raw(libc::SOL_SOCKET), Some(OptLevel::Socket));
        assert_eq!(OptLevel::from_raw(libc::IPPROTO_TCP), Some(OptLevel::Tcp));
        assert_eq!(UnixMessage::from_raw(libc::SCM_RIGHTS), Some(UnixMessage::Rights));
    }
}
