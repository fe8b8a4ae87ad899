//! The socket subsystem: the socket core, polymorphic addresses, typed
//! option accessors, message headers with ancillary data, protocol
//! specializations, name resolution and byte order helpers.

mod addr_info;
mod address;
mod ancillary;
pub mod byte_order;
mod interfaces;
mod ip_address;
mod ip_family;
mod link_layer;
mod message_header;
mod options;
mod socket;
mod tcp;
mod types;
mod udp;
mod unix_address;
mod unix_socket;

pub use addr_info::{AddressHintFlags, AddressHints, AddressInfo, AddressInfoIterator, AddressInfoList};
pub use address::SocketAddress;
pub use ancillary::{UnixCredentialsMessage, UnixRightsMessage};
pub use interfaces::{InterfaceEnumerator, InterfaceInfo, index_to_name, name_to_index};
pub use ip_address::{Ip4Address, Ip4RawAddress, Ip6Address, Ip6RawAddress, IpAddress};
pub use ip_family::{Inet4, Inet6, IpFamily};
pub use link_layer::{EthernetProtocol, LinkLayerAddress, MacAddress, PacketType};
pub use message_header::{
    ControlMessage, ControlMessageIter, ControlMessageView, ReceiveMessageHeader,
    SendMessageHeader,
};
pub use options::{
    Ip4Options, Ip6Options, MtuDiscoveryMode, SocketOptions, TcpOptions, UdpOptions, UnixOptions,
};
pub use socket::Socket;
pub use tcp::{
    Tcp4ClientSocket, Tcp4Connection, Tcp4ListenSocket, Tcp6ClientSocket, Tcp6Connection,
    Tcp6ListenSocket, TcpClientSocket, TcpConnection, TcpListenSocket,
};
pub use types::{
    Direction, InterfaceIndex, Ip4Message, Ip6Message, MessageFlags, OptLevel, SocketFamily,
    SocketFlags, SocketProtocol, SocketType, UnixCredentials, UnixMessage,
};
pub use udp::{Udp4Socket, Udp6Socket, UdpSocket};
pub use unix_address::UnixAddress;
pub use unix_socket::{
    UnixConnection, UnixDatagramSocket, UnixSeqPacketClientSocket, UnixSeqPacketListenSocket,
    UnixStreamClientSocket, UnixStreamListenSocket, create_dgram_socket_pair,
    create_seqpacket_socket_pair, create_stream_socket_pair,
};
