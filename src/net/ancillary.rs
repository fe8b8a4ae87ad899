//! Serialization helpers for ancillary (control) messages on UNIX domain
//! sockets.

use log::warn;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::net::message_header::{ControlMessage, ControlMessageView};
use crate::net::{OptLevel, UnixCredentials, UnixMessage};

fn check_message(msg: &ControlMessageView, expected: UnixMessage) -> Result<()> {
    if msg.as_unix_message() != Some(expected) {
        return Err(Error::Runtime("ancillary message type mismatch"));
    }
    Ok(())
}

/// File descriptor passing via SCM_RIGHTS.
///
/// On the receiving side the kernel installs the transported descriptors
/// into the process's descriptor table whether or not the application
/// inspects the control message. Ownership must therefore be claimed via
/// [`take_fds`](UnixRightsMessage::take_fds); descriptors left unclaimed
/// are closed when this object is dropped, preventing silent leaks.
#[derive(Debug, Default)]
pub struct UnixRightsMessage {
    fds: SmallVec<[FileNum; 4]>,
}

impl UnixRightsMessage {
    pub fn new() -> UnixRightsMessage {
        UnixRightsMessage::default()
    }

    /// Adds a descriptor to be transported with the next
    /// [`serialize`](Self::serialize). Ownership stays with the caller.
    pub fn add_fd(&mut self, fd: FileDescriptor) {
        self.fds.push(fd.raw());
    }

    /// The number of descriptors currently held.
    pub fn num_fds(&self) -> usize {
        self.fds.len()
    }

    /// Builds the control message for sending the collected descriptors.
    pub fn serialize(&self) -> Result<ControlMessage> {
        if self.fds.is_empty() {
            return Err(Error::Usage("serializing an SCM_RIGHTS message without fds"));
        }
        let mut data = Vec::with_capacity(self.fds.len() * 4);
        for fd in &self.fds {
            data.extend_from_slice(&fd.raw().to_ne_bytes());
        }
        Ok(ControlMessage::serialize(
            OptLevel::Socket,
            UnixMessage::Rights as i32,
            &data,
        ))
    }

    /// Extracts received descriptors out of `msg`.
    ///
    /// The descriptors are recorded as owned by this object until
    /// [`take_fds`](Self::take_fds) claims them.
    pub fn deserialize(&mut self, msg: &ControlMessageView) -> Result<()> {
        check_message(msg, UnixMessage::Rights)?;
        self.close_unclaimed();
        let data = msg.data();
        for chunk in data.chunks_exact(4) {
            let raw = i32::from_ne_bytes(chunk.try_into().unwrap());
            self.fds.push(FileNum::new(raw));
        }
        Ok(())
    }

    /// Claims ownership of the received descriptors.
    pub fn take_fds(&mut self) -> Vec<FileDescriptor> {
        self.fds
            .drain(..)
            .map(FileDescriptor::new)
            .collect()
    }

    fn close_unclaimed(&mut self) {
        for fd in self.fds.drain(..) {
            let mut fd = FileDescriptor::new(fd);
            if let Err(err) = fd.close() {
                warn!("failed to close unclaimed received fd: {err}");
            }
        }
    }
}

impl Drop for UnixRightsMessage {
    fn drop(&mut self) {
        self.close_unclaimed();
    }
}

/// Credentials passing via SCM_CREDENTIALS.
///
/// With the pass-credentials option enabled both sides receive the peer's
/// identity; the kernel fills in the sender's actual credentials even
/// without an explicit send, and verifies explicitly sent values against
/// the sender's privileges.
#[derive(Debug, Default)]
pub struct UnixCredentialsMessage {
    creds: Option<UnixCredentials>,
}

impl UnixCredentialsMessage {
    pub fn new() -> UnixCredentialsMessage {
        UnixCredentialsMessage::default()
    }

    /// Presets the credentials to send; defaults to the caller's own.
    pub fn set_creds(&mut self, creds: UnixCredentials) {
        self.creds = Some(creds);
    }

    /// The credentials received by the last deserialize, if any.
    pub fn creds(&self) -> Option<&UnixCredentials> {
        self.creds.as_ref()
    }

    /// Builds the control message for sending.
    pub fn serialize(&self) -> ControlMessage {
        let creds = self.creds.unwrap_or_else(UnixCredentials::of_caller);
        let raw = creds.to_raw();
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &raw as *const libc::ucred as *const u8,
                std::mem::size_of::<libc::ucred>(),
            )
        };
        ControlMessage::serialize(OptLevel::Socket, UnixMessage::Credentials as i32, bytes)
    }

    /// Extracts received credentials out of `msg`.
    pub fn deserialize(&mut self, msg: &ControlMessageView) -> Result<()> {
        check_message(msg, UnixMessage::Credentials)?;
        let data = msg.data();
        if data.len() < std::mem::size_of::<libc::ucred>() {
            return Err(Error::Runtime("short SCM_CREDENTIALS message"));
        }
        let mut raw: libc::ucred = unsafe { std::mem::zeroed() };
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                &mut raw as *mut libc::ucred as *mut u8,
                std::mem::size_of::<libc::ucred>(),
            );
        }
        self.creds = Some(UnixCredentials::from_raw(raw));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ref_cast::RefCast;

    fn view_of(msg: &ControlMessage) -> &ControlMessageView {
        ControlMessageView::ref_cast(unsafe { &*(msg.raw() as *const libc::cmsghdr) })
    }

    #[test]
    fn rights_serialize_deserialize() {
        let mut out = UnixRightsMessage::new();
        out.add_fd(crate::fd::STDIN);
        out.add_fd(crate::fd::STDOUT);
        let serialized = out.serialize().unwrap();

        let mut in_msg = UnixRightsMessage::new();
        in_msg.deserialize(view_of(&serialized)).unwrap();
        assert_eq!(in_msg.num_fds(), 2);
        let fds = in_msg.take_fds();
        assert_eq!(fds.len(), 2);
        assert_eq!(fds[0].raw(), FileNum::STDIN);
        assert_eq!(fds[1].raw(), FileNum::STDOUT);
        // taking drained the message, dropping it must not close stdio
        assert_eq!(in_msg.num_fds(), 0);
    }

    #[test]
    fn empty_rights_message_rejected() {
        assert!(UnixRightsMessage::new().serialize().is_err());
    }

    #[test]
    fn credentials_round_trip() {
        let out = UnixCredentialsMessage::new();
        let serialized = out.serialize();
        let mut in_msg = UnixCredentialsMessage::new();
        in_msg.deserialize(view_of(&serialized)).unwrap();
        let creds = in_msg.creds().unwrap();
        assert_eq!(*creds, UnixCredentials::of_caller());
    }

    #[test]
    fn type_mismatch_detected() {
        let creds = UnixCredentialsMessage::new().serialize();
        let mut rights = UnixRightsMessage::new();
        assert!(matches!(
            rights.deserialize(view_of(&creds)),
            Err(Error::Runtime(_))
        ));
    }
}
