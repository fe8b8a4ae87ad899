//! Socket option accessors, one helper type per option level.
//!
//! The accessor types borrow the socket they were created from; they carry
//! no state beyond the descriptor and cannot outlive their socket.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::time::Duration;

use crate::error::{Errno, Error, Result};
use crate::fd::FileDescriptor;
use crate::net::{OptLevel, UnixCredentials};
use crate::proc::PidFd;

// not yet available from the libc crate
const SO_PEERPIDFD: libc::c_int = 77;

fn get_raw(
    fd: FileDescriptor,
    level: OptLevel,
    option: libc::c_int,
    buf: *mut libc::c_void,
    len: &mut libc::socklen_t,
) -> Result<()> {
    let res = unsafe { libc::getsockopt(fd.raw().raw(), level as i32, option, buf, len) };
    if res == -1 {
        return Err(Error::api("getsockopt"));
    }
    Ok(())
}

fn set_raw(
    fd: FileDescriptor,
    level: OptLevel,
    option: libc::c_int,
    buf: *const libc::c_void,
    len: libc::socklen_t,
) -> Result<()> {
    let res = unsafe { libc::setsockopt(fd.raw().raw(), level as i32, option, buf, len) };
    if res == -1 {
        return Err(Error::api("setsockopt"));
    }
    Ok(())
}

fn get_struct<T>(fd: FileDescriptor, level: OptLevel, option: libc::c_int) -> Result<T> {
    let mut value = std::mem::MaybeUninit::<T>::zeroed();
    let mut len = std::mem::size_of::<T>() as libc::socklen_t;
    get_raw(fd, level, option, value.as_mut_ptr().cast(), &mut len)?;
    Ok(unsafe { value.assume_init() })
}

fn set_struct<T>(fd: FileDescriptor, level: OptLevel, option: libc::c_int, value: &T) -> Result<()> {
    set_raw(
        fd,
        level,
        option,
        (value as *const T).cast(),
        std::mem::size_of::<T>() as libc::socklen_t,
    )
}

fn get_int(fd: FileDescriptor, level: OptLevel, option: libc::c_int) -> Result<i32> {
    get_struct::<libc::c_int>(fd, level, option)
}

fn set_int(fd: FileDescriptor, level: OptLevel, option: libc::c_int, value: i32) -> Result<()> {
    set_struct(fd, level, option, &value)
}

fn get_bool(fd: FileDescriptor, level: OptLevel, option: libc::c_int) -> Result<bool> {
    Ok(get_int(fd, level, option)? != 0)
}

fn set_bool(fd: FileDescriptor, level: OptLevel, option: libc::c_int, on: bool) -> Result<()> {
    set_int(fd, level, option, on as i32)
}

/// Retrieves a string-valued option, reporting the required buffer size via
/// a range error if `buf_size` turned out too small.
fn get_string(
    fd: FileDescriptor,
    level: OptLevel,
    option: libc::c_int,
    buf_size: usize,
) -> Result<CString> {
    let mut buf = vec![0u8; buf_size];
    let mut len = buf.len() as libc::socklen_t;
    match get_raw(fd, level, option, buf.as_mut_ptr().cast(), &mut len) {
        Ok(()) => {
            buf.truncate(len as usize);
            while buf.last() == Some(&0) {
                buf.pop();
            }
            crate::types::to_sys_owned(buf)
        }
        Err(err) if err.errno() == Some(Errno::Range) => Err(Error::Range {
            op: "getsockopt",
            errno: Errno::Range,
            required: len as usize,
        }),
        Err(err) => Err(err),
    }
}

macro_rules! option_accessor {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<'a> {
            fd: FileDescriptor,
            _socket: PhantomData<&'a ()>,
        }

        impl $name<'_> {
            pub(crate) fn new(fd: FileDescriptor) -> Self {
                Self {
                    fd,
                    _socket: PhantomData,
                }
            }
        }
    };
}

option_accessor!(
    /// Options on [`OptLevel::Socket`], available for every socket kind.
    SocketOptions);

impl SocketOptions<'_> {
    /// The pending socket error, cleared by this query (SO_ERROR).
    pub fn last_error(&self) -> Result<Errno> {
        Ok(Errno::from(get_int(self.fd, OptLevel::Socket, libc::SO_ERROR)?))
    }

    pub fn set_keepalive(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Socket, libc::SO_KEEPALIVE, on)
    }

    pub fn keepalive(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::Socket, libc::SO_KEEPALIVE)
    }

    /// Allows rebinding a local address that is in TIME_WAIT state.
    pub fn set_reuse_address(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Socket, libc::SO_REUSEADDR, on)
    }

    pub fn reuse_address(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::Socket, libc::SO_REUSEADDR)
    }

    /// Allows multiple sockets to bind the identical address/port pair.
    pub fn set_reuse_port(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Socket, libc::SO_REUSEPORT, on)
    }

    pub fn reuse_port(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::Socket, libc::SO_REUSEPORT)
    }

    /// Lingers on close until queued data is sent, at most `timeout`;
    /// `None` disables lingering.
    pub fn set_linger(&self, timeout: Option<Duration>) -> Result<()> {
        let raw = libc::linger {
            l_onoff: timeout.is_some() as libc::c_int,
            l_linger: timeout.map(|t| t.as_secs() as libc::c_int).unwrap_or(0),
        };
        set_struct(self.fd, OptLevel::Socket, libc::SO_LINGER, &raw)
    }

    pub fn linger(&self) -> Result<Option<Duration>> {
        let raw: libc::linger = get_struct(self.fd, OptLevel::Socket, libc::SO_LINGER)?;
        Ok((raw.l_onoff != 0).then(|| Duration::from_secs(raw.l_linger as u64)))
    }

    /// Binds the socket to a network device like `eth0`; an empty name
    /// removes the binding.
    pub fn bind_to_device(&self, device: &CStr) -> Result<()> {
        set_raw(
            self.fd,
            OptLevel::Socket,
            libc::SO_BINDTODEVICE,
            device.as_ptr().cast(),
            device.to_bytes().len() as libc::socklen_t,
        )
    }

    pub fn bound_device(&self) -> Result<CString> {
        get_string(
            self.fd,
            OptLevel::Socket,
            libc::SO_BINDTODEVICE,
            libc::IFNAMSIZ,
        )
    }

    /// The minimum number of bytes available before a receive returns.
    pub fn set_receive_low_watermark(&self, bytes: usize) -> Result<()> {
        set_int(self.fd, OptLevel::Socket, libc::SO_RCVLOWAT, bytes as i32)
    }

    pub fn receive_low_watermark(&self) -> Result<usize> {
        Ok(get_int(self.fd, OptLevel::Socket, libc::SO_RCVLOWAT)? as usize)
    }

    pub fn set_receive_buffer_size(&self, bytes: usize) -> Result<()> {
        set_int(self.fd, OptLevel::Socket, libc::SO_RCVBUF, bytes as i32)
    }

    pub fn receive_buffer_size(&self) -> Result<usize> {
        Ok(get_int(self.fd, OptLevel::Socket, libc::SO_RCVBUF)? as usize)
    }

    pub fn set_send_buffer_size(&self, bytes: usize) -> Result<()> {
        set_int(self.fd, OptLevel::Socket, libc::SO_SNDBUF, bytes as i32)
    }

    pub fn send_buffer_size(&self) -> Result<usize> {
        Ok(get_int(self.fd, OptLevel::Socket, libc::SO_SNDBUF)? as usize)
    }

    /// A routing/filtering mark; requires CAP_NET_ADMIN.
    pub fn set_mark(&self, mark: u32) -> Result<()> {
        set_int(self.fd, OptLevel::Socket, libc::SO_MARK, mark as i32)
    }

    /// Enables MSG_ZEROCOPY transmissions on this socket.
    pub fn set_zero_copy(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Socket, libc::SO_ZEROCOPY, on)
    }
}

/// Path MTU discovery behavior (shared between IPv4 and IPv6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MtuDiscoveryMode {
    /// Use per-route settings.
    Want = libc::IP_PMTUDISC_WANT,
    /// Never do discovery, allow fragmentation.
    Dont = libc::IP_PMTUDISC_DONT,
    /// Always do discovery, set the don't-fragment flag.
    Do = libc::IP_PMTUDISC_DO,
    /// Set the don't-fragment flag but ignore the known path MTU.
    Probe = libc::IP_PMTUDISC_PROBE,
}

option_accessor!(
    /// Options on [`OptLevel::Ip`] (IPv4 sockets).
    Ip4Options);

impl Ip4Options<'_> {
    /// The type-of-service byte of outgoing packets.
    pub fn set_type_of_service(&self, tos: u8) -> Result<()> {
        set_int(self.fd, OptLevel::Ip, libc::IP_TOS, tos as i32)
    }

    pub fn type_of_service(&self) -> Result<u8> {
        Ok(get_int(self.fd, OptLevel::Ip, libc::IP_TOS)? as u8)
    }

    pub fn set_time_to_live(&self, ttl: u8) -> Result<()> {
        set_int(self.fd, OptLevel::Ip, libc::IP_TTL, ttl as i32)
    }

    pub fn time_to_live(&self) -> Result<u8> {
        Ok(get_int(self.fd, OptLevel::Ip, libc::IP_TTL)? as u8)
    }

    pub fn set_mtu_discovery_mode(&self, mode: MtuDiscoveryMode) -> Result<()> {
        set_int(self.fd, OptLevel::Ip, libc::IP_MTU_DISCOVER, mode as i32)
    }

    /// Requests IP_PKTINFO ancillary messages on received datagrams.
    pub fn set_receive_packet_info(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Ip, libc::IP_PKTINFO, on)
    }

    /// The currently known path MTU of a connected socket.
    pub fn mtu(&self) -> Result<usize> {
        Ok(get_int(self.fd, OptLevel::Ip, libc::IP_MTU)? as usize)
    }
}

option_accessor!(
    /// Options on [`OptLevel::IpV6`] (IPv6 sockets).
    Ip6Options);

impl Ip6Options<'_> {
    /// Restricts the socket to IPv6 communication only.
    pub fn set_v6_only(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::IpV6, libc::IPV6_V6ONLY, on)
    }

    pub fn v6_only(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::IpV6, libc::IPV6_V6ONLY)
    }

    pub fn set_unicast_hops(&self, hops: u8) -> Result<()> {
        set_int(self.fd, OptLevel::IpV6, libc::IPV6_UNICAST_HOPS, hops as i32)
    }

    pub fn unicast_hops(&self) -> Result<u8> {
        Ok(get_int(self.fd, OptLevel::IpV6, libc::IPV6_UNICAST_HOPS)? as u8)
    }

    pub fn set_mtu_discovery_mode(&self, mode: MtuDiscoveryMode) -> Result<()> {
        set_int(self.fd, OptLevel::IpV6, libc::IPV6_MTU_DISCOVER, mode as i32)
    }

    /// Requests IPV6_HOPLIMIT ancillary messages on received datagrams.
    pub fn set_receive_hop_limit(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::IpV6, libc::IPV6_RECVHOPLIMIT, on)
    }
}

option_accessor!(
    /// Options on [`OptLevel::Tcp`].
    TcpOptions);

impl TcpOptions<'_> {
    /// Disables Nagle's algorithm, sending segments immediately.
    pub fn set_no_delay(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Tcp, libc::TCP_NODELAY, on)
    }

    pub fn no_delay(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::Tcp, libc::TCP_NODELAY)
    }

    /// Corks the connection: only full segments are sent until uncorked.
    pub fn set_cork(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Tcp, libc::TCP_CORK, on)
    }

    /// Idle time before the first keepalive probe is sent.
    pub fn set_keepalive_idle(&self, time: Duration) -> Result<()> {
        set_int(
            self.fd,
            OptLevel::Tcp,
            libc::TCP_KEEPIDLE,
            time.as_secs() as i32,
        )
    }

    /// Interval between keepalive probes.
    pub fn set_keepalive_interval(&self, time: Duration) -> Result<()> {
        set_int(
            self.fd,
            OptLevel::Tcp,
            libc::TCP_KEEPINTVL,
            time.as_secs() as i32,
        )
    }

    /// Number of unanswered probes before the connection is dropped.
    pub fn set_keepalive_count(&self, count: u32) -> Result<()> {
        set_int(self.fd, OptLevel::Tcp, libc::TCP_KEEPCNT, count as i32)
    }

    pub fn max_segment_size(&self) -> Result<usize> {
        Ok(get_int(self.fd, OptLevel::Tcp, libc::TCP_MAXSEG)? as usize)
    }

    /// How long transmitted data may stay unacknowledged before the
    /// connection is closed; zero restores the system default.
    pub fn set_user_timeout(&self, timeout: Duration) -> Result<()> {
        set_int(
            self.fd,
            OptLevel::Tcp,
            libc::TCP_USER_TIMEOUT,
            timeout.as_millis() as i32,
        )
    }
}

option_accessor!(
    /// Options on [`OptLevel::Udp`].
    UdpOptions);

impl UdpOptions<'_> {
    /// Corks the socket: data accumulates into a single datagram until
    /// uncorked.
    pub fn set_cork(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Udp, libc::UDP_CORK, on)
    }

    pub fn cork(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::Udp, libc::UDP_CORK)
    }

    /// Enables generic segmentation offload with the given segment size;
    /// zero disables it.
    pub fn set_segment_size(&self, bytes: usize) -> Result<()> {
        set_int(self.fd, OptLevel::Udp, libc::UDP_SEGMENT, bytes as i32)
    }

    /// Enables generic receive offload.
    pub fn set_receive_offload(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Udp, libc::UDP_GRO, on)
    }
}

option_accessor!(
    /// Options specific to UNIX domain sockets.
    UnixOptions);

impl UnixOptions<'_> {
    /// The identity of the peer as recorded at connect/socketpair time
    /// (SO_PEERCRED).
    pub fn credentials(&self) -> Result<UnixCredentials> {
        let raw: libc::ucred = get_struct(self.fd, OptLevel::Socket, libc::SO_PEERCRED)?;
        Ok(UnixCredentials::from_raw(raw))
    }

    /// Enables reception of SCM_CREDENTIALS ancillary messages.
    pub fn set_pass_credentials(&self, on: bool) -> Result<()> {
        set_bool(self.fd, OptLevel::Socket, libc::SO_PASSCRED, on)
    }

    pub fn pass_credentials(&self) -> Result<bool> {
        get_bool(self.fd, OptLevel::Socket, libc::SO_PASSCRED)
    }

    /// Sets the offset for MSG_PEEK receives; -1 disables the feature.
    pub fn set_peek_offset(&self, offset: Option<usize>) -> Result<()> {
        set_int(
            self.fd,
            OptLevel::Socket,
            libc::SO_PEEK_OFF,
            offset.map(|v| v as i32).unwrap_or(-1),
        )
    }

    /// Obtains a pidfd for the peer process (SO_PEERPIDFD, Linux 6.5).
    ///
    /// The returned descriptor is owned by the caller.
    pub fn peer_pidfd(&self) -> Result<PidFd> {
        let raw = get_int(self.fd, OptLevel::Socket, SO_PEERPIDFD)?;
        Ok(PidFd::new(FileDescriptor::new(crate::fd::FileNum::new(raw))))
    }

    /// The security context of the peer (SO_PEERSEC), e.g. an SELinux
    /// label. Reports the required size via a range error when `buf_size`
    /// is too small.
    pub fn peer_security(&self, buf_size: usize) -> Result<CString> {
        get_string(self.fd, OptLevel::Socket, libc::SO_PEERSEC, buf_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Socket, SocketFamily, SocketFlags, SocketProtocol, SocketType};

    fn tcp_socket() -> Socket {
        Socket::new(
            SocketFamily::Inet,
            SocketType::Stream,
            SocketFlags::CLOEXEC,
            SocketProtocol::Tcp,
        )
        .unwrap()
    }

    #[test]
    fn socket_level_round_trips() {
        let socket = tcp_socket();
        let opts = SocketOptions::new(socket.fd());
        assert!(!opts.reuse_address().unwrap());
        opts.set_reuse_address(true).unwrap();
        assert!(opts.reuse_address().unwrap());
        assert_eq!(opts.last_error().unwrap(), Errno::NoError);

        assert_eq!(opts.linger().unwrap(), None);
        opts.set_linger(Some(Duration::from_secs(3))).unwrap();
        assert_eq!(opts.linger().unwrap(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn tcp_level_round_trips() {
        let socket = tcp_socket();
        let opts = TcpOptions::new(socket.fd());
        assert!(!opts.no_delay().unwrap());
        opts.set_no_delay(true).unwrap();
        assert!(opts.no_delay().unwrap());
        assert!(opts.max_segment_size().unwrap() > 0);
    }

    #[test]
    fn unix_level_credentials() {
        let (a, _b) = Socket::new_pair(
            SocketFamily::Unix,
            SocketType::Stream,
            SocketFlags::CLOEXEC,
            SocketProtocol::Default,
        )
        .unwrap();
        let opts = UnixOptions::new(a.fd());
        let creds = opts.credentials().unwrap();
        assert_eq!(creds, UnixCredentials::of_caller());
        opts.set_pass_credentials(true).unwrap();
        assert!(opts.pass_credentials().unwrap());
    }
}
