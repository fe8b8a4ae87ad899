//! The polymorphic socket address interface.

use crate::net::SocketFamily;

/// Behavior shared by all socket address variants.
///
/// The kernel writes addresses back on calls like `accept()`,
/// `getsockname()` and `recvfrom()`; [`update`](SocketAddress::update) is
/// invoked afterwards with the length the kernel reported, so that
/// variable-length addresses can recompute derived state.
pub trait SocketAddress {
    /// The address family of this variant; constant per type.
    fn family(&self) -> SocketFamily;

    /// The number of bytes currently in use in the address structure.
    fn size(&self) -> usize;

    /// The size of the full underlying address storage.
    fn max_size(&self) -> usize;

    /// A pointer to the raw `sockaddr` for passing to the kernel.
    fn raw_addr(&self) -> *const libc::sockaddr;

    /// A mutable pointer to the raw `sockaddr` for the kernel to fill in.
    fn raw_addr_mut(&mut self) -> *mut libc::sockaddr;

    /// Hook invoked after the kernel wrote `new_length` bytes into the
    /// structure.
    fn update(&mut self, new_length: usize) {
        let _ = new_length;
    }

    /// Zeroes the storage and reinstates the family marker.
    fn clear(&mut self);
}

pub(crate) fn zero_and_set_family<T>(addr: &mut T, family: SocketFamily) {
    unsafe {
        std::ptr::write_bytes(addr as *mut T as *mut u8, 0, std::mem::size_of::<T>());
        // the family field leads every sockaddr variant
        (addr as *mut T as *mut libc::sa_family_t).write(family.raw());
    }
}
