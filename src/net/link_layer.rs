//! Raw link layer (packet socket) addresses.

use std::fmt;

use crate::net::address::{SocketAddress, zero_and_set_family};
use crate::net::byte_order::NetInt16;
use crate::net::{InterfaceIndex, SocketFamily};

// Not exposed by libc for this target; kernel ABI (linux/if_ether.h).
const ETH_P_LLDP: libc::c_int = 0x88cc;

/// An ethernet protocol number as used in packet sockets.
///
/// Carries the host byte order value; the wire representation inside
/// `sockaddr_ll` is big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthernetProtocol(pub u16);

impl EthernetProtocol {
    pub const LOOP: EthernetProtocol = EthernetProtocol(libc::ETH_P_LOOP as u16);
    pub const IP: EthernetProtocol = EthernetProtocol(libc::ETH_P_IP as u16);
    pub const X25: EthernetProtocol = EthernetProtocol(libc::ETH_P_X25 as u16);
    pub const ARP: EthernetProtocol = EthernetProtocol(libc::ETH_P_ARP as u16);
    pub const IEEE802_1Q: EthernetProtocol = EthernetProtocol(libc::ETH_P_8021Q as u16);
    pub const IPV6: EthernetProtocol = EthernetProtocol(libc::ETH_P_IPV6 as u16);
    pub const MPLS_UNICAST: EthernetProtocol = EthernetProtocol(libc::ETH_P_MPLS_UC as u16);
    pub const MPLS_MULTICAST: EthernetProtocol = EthernetProtocol(libc::ETH_P_MPLS_MC as u16);
    pub const PPP_DISCOVERY: EthernetProtocol = EthernetProtocol(libc::ETH_P_PPP_DISC as u16);
    pub const PPP_SESSION: EthernetProtocol = EthernetProtocol(libc::ETH_P_PPP_SES as u16);
    pub const IEEE802_1AD: EthernetProtocol = EthernetProtocol(libc::ETH_P_8021AD as u16);
    pub const LINK_CTL: EthernetProtocol = EthernetProtocol(libc::ETH_P_LINK_CTL as u16);
    pub const MACSEC: EthernetProtocol = EthernetProtocol(libc::ETH_P_MACSEC as u16);
    pub const LLDP: EthernetProtocol = EthernetProtocol(ETH_P_LLDP as u16);
    /// Matches every protocol; useful for sniffing.
    pub const ALL: EthernetProtocol = EthernetProtocol(libc::ETH_P_ALL as u16);

    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// The kind of packet as classified on reception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Addressed to the local host.
    Host = 0,
    /// A broadcast packet.
    Broadcast = 1,
    /// A multicast packet.
    Multicast = 2,
    /// Addressed to somebody else, caught in promiscuous mode.
    OtherHost = 3,
    /// Originating from the local host, looped back.
    Outgoing = 4,
}

impl PacketType {
    fn from_raw(raw: u8) -> Option<PacketType> {
        match raw {
            0 => Some(PacketType::Host),
            1 => Some(PacketType::Broadcast),
            2 => Some(PacketType::Multicast),
            3 => Some(PacketType::OtherHost),
            4 => Some(PacketType::Outgoing),
            _ => None,
        }
    }
}

/// A MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A physical layer socket address (`sockaddr_ll`).
///
/// Used with [`SocketFamily::Packet`] sockets. The ARP hardware type and
/// packet type fields are only filled in by the kernel on reception.
#[derive(Clone, Copy)]
pub struct LinkLayerAddress {
    raw: libc::sockaddr_ll,
}

impl LinkLayerAddress {
    pub fn new() -> LinkLayerAddress {
        let mut addr = LinkLayerAddress {
            raw: unsafe { std::mem::zeroed() },
        };
        addr.clear();
        addr
    }

    /// An address for binding to `interface` with the given protocol.
    pub fn from_parts(protocol: EthernetProtocol, interface: InterfaceIndex) -> LinkLayerAddress {
        let mut addr = LinkLayerAddress::new();
        addr.set_protocol(protocol);
        addr.set_interface_index(interface);
        addr
    }

    pub fn protocol(&self) -> EthernetProtocol {
        EthernetProtocol(NetInt16::from_raw(self.raw.sll_protocol).to_host())
    }

    pub fn set_protocol(&mut self, protocol: EthernetProtocol) {
        self.raw.sll_protocol = NetInt16::new(protocol.raw()).raw();
    }

    pub fn interface_index(&self) -> InterfaceIndex {
        InterfaceIndex(self.raw.sll_ifindex as u32)
    }

    pub fn set_interface_index(&mut self, index: InterfaceIndex) {
        self.raw.sll_ifindex = index.raw() as i32;
    }

    /// The ARP hardware type; receive-only.
    pub fn arp_type(&self) -> u16 {
        self.raw.sll_hatype
    }

    /// The packet classification; receive-only.
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_raw(self.raw.sll_pkttype)
    }

    pub fn mac_address(&self) -> MacAddress {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.raw.sll_addr[..6]);
        MacAddress(mac)
    }

    pub fn set_mac_address(&mut self, mac: MacAddress) {
        self.raw.sll_halen = 6;
        self.raw.sll_addr[..6].copy_from_slice(&mac.0);
    }
}

impl Default for LinkLayerAddress {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for LinkLayerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.raw.sll_protocol == other.raw.sll_protocol
            && self.raw.sll_ifindex == other.raw.sll_ifindex
            && self.raw.sll_halen == other.raw.sll_halen
            && self.raw.sll_addr == other.raw.sll_addr
    }
}

impl Eq for LinkLayerAddress {}

impl fmt::Debug for LinkLayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LinkLayerAddress(proto={:#06x}, if={}, mac={})",
            self.protocol().raw(),
            self.interface_index().raw(),
            self.mac_address(),
        )
    }
}

impl SocketAddress for LinkLayerAddress {
    fn family(&self) -> SocketFamily {
        SocketFamily::Packet
    }

    fn size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_ll>()
    }

    fn max_size(&self) -> usize {
        std::mem::size_of::<libc::sockaddr_ll>()
    }

    fn raw_addr(&self) -> *const libc::sockaddr {
        &self.raw as *const libc::sockaddr_ll as *const libc::sockaddr
    }

    fn raw_addr_mut(&mut self) -> *mut libc::sockaddr {
        &mut self.raw as *mut libc::sockaddr_ll as *mut libc::sockaddr
    }

    fn clear(&mut self) {
        zero_and_set_family(&mut self.raw, SocketFamily::Packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_byte_order() {
        let addr = LinkLayerAddress::from_parts(EthernetProtocol::IP, InterfaceIndex(2));
        assert_eq!(addr.protocol(), EthernetProtocol::IP);
        assert_eq!(addr.interface_index(), InterfaceIndex(2));
        assert_eq!(addr.family(), SocketFamily::Packet);
    }

    #[test]
    fn mac_round_trip() {
        let mut addr = LinkLayerAddress::new();
        let mac = MacAddress([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        addr.set_mac_address(mac);
        assert_eq!(addr.mac_address(), mac);
        assert_eq!(mac.to_string(), "de:ad:be:ef:00:01");
    }
}
