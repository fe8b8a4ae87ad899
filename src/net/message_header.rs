//! Wrappers for `struct msghdr` as used by `Socket::send_message()` and
//! `Socket::receive_message()`.
//!
//! The raw structure behaves quite differently when sending versus
//! receiving, hence two separate wrapper types. Neither keeps a live
//! `msghdr` around; the kernel structure is assembled freshly for each
//! call, which sidesteps self-referential storage.

use ref_cast::RefCast;

use crate::io::{ReadIoVector, WriteIoVector};
use crate::net::address::SocketAddress;
use crate::net::{Ip4Message, Ip6Message, MessageFlags, OptLevel, UnixMessage};

/// A serialized control message ready for sending.
///
/// Instances can only be produced by the serialization helpers that know
/// the wire layout of their message type, e.g.
/// [`UnixRightsMessage`](crate::net::UnixRightsMessage).
#[derive(Debug)]
pub struct ControlMessage {
    buffer: Vec<u8>,
}

impl ControlMessage {
    pub(crate) fn serialize(level: OptLevel, msg_type: i32, data: &[u8]) -> ControlMessage {
        let space = unsafe { libc::CMSG_SPACE(data.len() as u32) } as usize;
        let mut buffer = vec![0u8; space];
        let header = buffer.as_mut_ptr() as *mut libc::cmsghdr;
        unsafe {
            (*header).cmsg_level = level as i32;
            (*header).cmsg_type = msg_type;
            (*header).cmsg_len = libc::CMSG_LEN(data.len() as u32) as usize;
            std::ptr::copy_nonoverlapping(data.as_ptr(), libc::CMSG_DATA(header), data.len());
        }
        ControlMessage { buffer }
    }

    pub(crate) fn raw(&self) -> *const u8 {
        self.buffer.as_ptr()
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }
}

/// Send side of the `sendmsg()` API.
///
/// Combines scattered payload regions with an optional control message.
/// With stream sockets ancillary data must be accompanied by at least one
/// byte of payload; datagram sockets on Linux can send it alone.
#[derive(Debug, Default)]
pub struct SendMessageHeader<'a> {
    /// Memory regions to send.
    pub iovec: WriteIoVector<'a>,
    /// Control message to send, if any.
    pub control_msg: Option<ControlMessage>,
    io_flags: MessageFlags,
}

impl<'a> SendMessageHeader<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flags for the `sendmsg()` call itself.
    pub fn set_io_flags(&mut self, flags: MessageFlags) {
        self.io_flags = flags;
    }

    pub(crate) fn io_flags(&self) -> MessageFlags {
        self.io_flags
    }

    /// Assembles the raw structure for one `sendmsg()` call.
    pub(crate) fn prepare_send(&mut self, addr: Option<&dyn SocketAddress>) -> libc::msghdr {
        let mut header: libc::msghdr = unsafe { std::mem::zeroed() };
        if let Some(addr) = addr {
            header.msg_name = addr.raw_addr() as *mut libc::c_void;
            header.msg_namelen = addr.size() as libc::socklen_t;
        }
        if !self.iovec.is_empty() {
            header.msg_iov = self.iovec.raw_mut();
            header.msg_iovlen = self.iovec.len();
        }
        if let Some(control) = &self.control_msg {
            header.msg_control = control.raw() as *mut libc::c_void;
            header.msg_controllen = control.len();
        }
        header
    }

    /// Bookkeeping after a successful `sendmsg()`.
    ///
    /// The ancillary portion is transmitted exactly once on any successful
    /// (including partial) send; the control message is therefore dropped
    /// here unconditionally, and a retry for remaining payload bytes must
    /// not re-attach it.
    pub(crate) fn post_send(&mut self, sent: usize) {
        self.iovec.update(sent);
        self.control_msg = None;
    }
}

/// A view of one received control message.
#[derive(RefCast)]
#[repr(transparent)]
pub struct ControlMessageView {
    raw: libc::cmsghdr,
}

impl ControlMessageView {
    /// The option level this control message belongs to; determines how the
    /// rest of the message is interpreted.
    pub fn level(&self) -> Option<OptLevel> {
        OptLevel::from_raw(self.raw.cmsg_level)
    }

    /// The raw message type within its level.
    pub fn raw_type(&self) -> i32 {
        self.raw.cmsg_type
    }

    /// The UNIX domain message type, when on [`OptLevel::Socket`].
    pub fn as_unix_message(&self) -> Option<UnixMessage> {
        (self.level() == Some(OptLevel::Socket))
            .then(|| UnixMessage::from_raw(self.raw.cmsg_type))
            .flatten()
    }

    /// The IPv4 message type, when on [`OptLevel::Ip`].
    pub fn as_ip4_message(&self) -> Option<Ip4Message> {
        (self.level() == Some(OptLevel::Ip))
            .then(|| Ip4Message::from_raw(self.raw.cmsg_type))
            .flatten()
    }

    /// The IPv6 message type, when on [`OptLevel::IpV6`].
    pub fn as_ip6_message(&self) -> Option<Ip6Message> {
        (self.level() == Some(OptLevel::IpV6))
            .then(|| Ip6Message::from_raw(self.raw.cmsg_type))
            .flatten()
    }

    /// The number of data bytes attached to this message.
    pub fn data_length(&self) -> usize {
        self.raw.cmsg_len - unsafe { libc::CMSG_LEN(0) } as usize
    }

    /// The attached data bytes.
    ///
    /// The underlying storage is not necessarily aligned for arbitrary
    /// structures; copy the bytes out before reinterpreting them.
    pub fn data(&self) -> &[u8] {
        unsafe {
            let data = libc::CMSG_DATA(&self.raw);
            std::slice::from_raw_parts(data, self.data_length())
        }
    }
}

impl std::fmt::Debug for ControlMessageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ControlMessageView(level={:?}, type={}, {} bytes)",
            self.level(),
            self.raw_type(),
            self.data_length()
        )
    }
}

/// Receive side of the `recvmsg()` API.
///
/// Gathers payload into scattered regions and optionally receives control
/// messages into an internal buffer enabled via
/// [`set_control_buffer_size`](ReceiveMessageHeader::set_control_buffer_size).
/// Received control messages are enumerated via
/// [`messages`](ReceiveMessageHeader::messages).
#[derive(Debug)]
pub struct ReceiveMessageHeader<'a> {
    /// Memory regions to receive into.
    pub iovec: ReadIoVector<'a>,
    control_buffer: Vec<u8>,
    control_len: usize,
    out_flags: MessageFlags,
    io_flags: MessageFlags,
}

impl Default for ReceiveMessageHeader<'_> {
    fn default() -> Self {
        ReceiveMessageHeader {
            iovec: ReadIoVector::new(),
            control_buffer: Vec::new(),
            control_len: 0,
            // mark received file descriptors close-on-exec by default
            io_flags: MessageFlags::CLOEXEC,
            out_flags: MessageFlags::empty(),
        }
    }
}

impl<'a> ReceiveMessageHeader<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flags for the `recvmsg()` call itself.
    pub fn set_io_flags(&mut self, flags: MessageFlags) {
        self.io_flags = flags;
    }

    pub(crate) fn io_flags(&self) -> MessageFlags {
        self.io_flags
    }

    /// The flags the last `recvmsg()` reported back (e.g. TRUNCATE,
    /// CTL_TRUNCATED).
    pub fn flags(&self) -> MessageFlags {
        self.out_flags
    }

    /// Expresses the intent to receive control messages of up to `bytes`
    /// total size.
    ///
    /// By default no ancillary data is received. Beware what this means on
    /// UNIX domain sockets: peers can now use up descriptor table entries
    /// of this process by sending SCM_RIGHTS messages, whether or not the
    /// application looks at them.
    pub fn set_control_buffer_size(&mut self, bytes: usize) {
        self.control_buffer.resize(bytes, 0);
        self.control_len = 0;
    }

    /// No longer receive control messages.
    pub fn clear_control_buffer(&mut self) {
        self.set_control_buffer_size(0);
    }

    /// Assembles the raw structure for one `recvmsg()` call.
    pub(crate) fn prepare_receive(
        &mut self,
        addr: Option<&mut dyn SocketAddress>,
    ) -> libc::msghdr {
        self.control_len = 0;
        self.out_flags = MessageFlags::empty();
        let mut header: libc::msghdr = unsafe { std::mem::zeroed() };
        if let Some(addr) = addr {
            addr.clear();
            header.msg_name = addr.raw_addr_mut() as *mut libc::c_void;
            header.msg_namelen = addr.max_size() as libc::socklen_t;
        }
        if !self.iovec.is_empty() {
            header.msg_iov = self.iovec.raw_mut();
            header.msg_iovlen = self.iovec.len();
        }
        if !self.control_buffer.is_empty() {
            header.msg_control = self.control_buffer.as_mut_ptr() as *mut libc::c_void;
            header.msg_controllen = self.control_buffer.len();
        }
        header
    }

    /// Bookkeeping after a successful `recvmsg()`.
    pub(crate) fn post_receive(&mut self, received: usize, header: &libc::msghdr) {
        self.iovec.update(received);
        self.control_len = header.msg_controllen;
        self.out_flags = MessageFlags::from_bits_retain(header.msg_flags);
    }

    /// Iterates over the control messages received by the last call.
    pub fn messages(&self) -> ControlMessageIter<'_> {
        let mut reconstructed: libc::msghdr = unsafe { std::mem::zeroed() };
        reconstructed.msg_control = self.control_buffer.as_ptr() as *mut libc::c_void;
        reconstructed.msg_controllen = self.control_len;
        let first: *const libc::cmsghdr = if self.control_len == 0 {
            std::ptr::null()
        } else {
            unsafe { libc::CMSG_FIRSTHDR(&reconstructed) }
        };
        ControlMessageIter {
            header: reconstructed,
            pos: first,
            _borrow: std::marker::PhantomData,
        }
    }
}

/// Iterator over received [`ControlMessageView`] values.
pub struct ControlMessageIter<'a> {
    header: libc::msghdr,
    pos: *const libc::cmsghdr,
    _borrow: std::marker::PhantomData<&'a ReceiveMessageHeader<'a>>,
}

impl<'a> Iterator for ControlMessageIter<'a> {
    type Item = &'a ControlMessageView;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos.is_null() {
            return None;
        }
        let current = unsafe { &*self.pos };
        self.pos = unsafe { libc::CMSG_NXTHDR(&mut self.header, self.pos) };
        Some(ControlMessageView::ref_cast(current))
    }
}

impl std::fmt::Debug for ControlMessageIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ControlMessageIter(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_message_layout() {
        let payload = [1u8, 2, 3, 4];
        let msg = ControlMessage::serialize(OptLevel::Socket, libc::SCM_RIGHTS, &payload);
        assert_eq!(msg.len(), unsafe { libc::CMSG_SPACE(4) } as usize);

        let view = ControlMessageView::ref_cast(unsafe {
            &*(msg.raw() as *const libc::cmsghdr)
        });
        assert_eq!(view.level(), Some(OptLevel::Socket));
        assert_eq!(view.as_unix_message(), Some(UnixMessage::Rights));
        assert_eq!(view.data_length(), 4);
        assert_eq!(view.data(), &payload);
    }

    #[test]
    fn post_send_drops_control_message() {
        let region = [0u8; 8];
        let mut header = SendMessageHeader::new();
        header.iovec.push(&region);
        header.control_msg = Some(ControlMessage::serialize(
            OptLevel::Socket,
            libc::SCM_RIGHTS,
            &[0, 0, 0, 0],
        ));
        header.post_send(4);
        assert!(header.control_msg.is_none());
        assert_eq!(header.iovec.left_bytes(), 4);
    }

    #[test]
    fn empty_receive_header_yields_no_messages() {
        let header = ReceiveMessageHeader::new();
        assert_eq!(header.messages().count(), 0);
        assert!(header.flags().is_empty());
    }
}
