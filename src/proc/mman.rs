//! Memory mapping operations and the RAII mapping owner.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::fd::FileDescriptor;

/// The basic type of a memory mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MapType {
    /// A mapping that can be shared with other processes.
    Shared = libc::MAP_SHARED,
    /// Like `Shared` but with validation of unknown map flags.
    SharedValidate = libc::MAP_SHARED_VALIDATE,
    /// A private copy-on-write mapping.
    Private = libc::MAP_PRIVATE,
}

bitflags! {
    /// Memory page access permissions.
    ///
    /// An empty mask corresponds to `PROT_NONE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: i32 {
        const EXEC = libc::PROT_EXEC;
        const READ = libc::PROT_READ;
        const WRITE = libc::PROT_WRITE;
    }
}

bitflags! {
    /// Properties of memory mappings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: i32 {
        /// Place the mapping in the first 2 GiB of address space.
        const INTO_32BIT = libc::MAP_32BIT;
        /// A zero-initialized mapping not backed by a file.
        const ANONYMOUS = libc::MAP_ANONYMOUS;
        /// Map exactly at the hint address, replacing existing mappings.
        const FIXED = libc::MAP_FIXED;
        /// Like FIXED but fail with `Errno::Exists` instead of replacing.
        const FIXED_NOREPLACE = libc::MAP_FIXED_NOREPLACE;
        /// A mapping suitable for stacks with a growth guard page.
        const GROWSDOWN = libc::MAP_GROWSDOWN;
        /// Allocate from the hugetlb pool.
        const HUGETLB = libc::MAP_HUGETLB;
        /// Lock the pages similar to `mem::lock()`.
        const LOCKED = libc::MAP_LOCKED;
        /// Don't reserve swap space; writes may then fail with SIGSEGV.
        const NORESERVE = libc::MAP_NORESERVE;
        /// Pre-fault page tables for the mapping.
        const POPULATE = libc::MAP_POPULATE;
        /// Mark the mapping as a thread stack (no effect on current Linux).
        const STACK = libc::MAP_STACK;
        /// Synchronous writes for DAX-capable files; needs SharedValidate.
        const SYNC = libc::MAP_SYNC;
    }
}

bitflags! {
    /// Extra flags for [`protect`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProtectFlags: i32 {
        /// Apply up to the end of a mapping that grows upwards.
        const GROWSUP = libc::PROT_GROWSUP;
        /// Apply down to the beginning of a mapping that grows downwards.
        const GROWSDOWN = libc::PROT_GROWSDOWN;
    }
}

bitflags! {
    /// Flags for [`remap`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RemapFlags: i32 {
        /// Allow moving the mapping to a new starting address.
        const MAYMOVE = libc::MREMAP_MAYMOVE;
        /// Place the mapping at the supplied fixed address (needs MAYMOVE).
        const FIXED = libc::MREMAP_FIXED;
        /// Keep the original mapping available (needs MAYMOVE).
        const DONTUNMAP = libc::MREMAP_DONTUNMAP;
    }
}

bitflags! {
    /// Flags for [`sync`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SyncFlags: i32 {
        /// Schedule the writes but return immediately.
        const ASYNC = libc::MS_ASYNC;
        /// Block until the writes completed.
        const SYNC = libc::MS_SYNC;
        /// Invalidate other mappings of the same file.
        const INVALIDATE = libc::MS_INVALIDATE;
    }
}

bitflags! {
    /// Flags for [`lock`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockFlags: u32 {
        /// Lock pages only once they are resident.
        const ONFAULT = libc::MLOCK_ONFAULT;
    }
}

bitflags! {
    /// Flags for [`lock_all`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockAllFlags: i32 {
        /// Lock all currently mapped pages.
        const CURRENT = libc::MCL_CURRENT;
        /// Lock all pages mapped in the future.
        const FUTURE = libc::MCL_FUTURE;
        /// Defer the locking until pages become resident.
        const ONFAULT = libc::MCL_ONFAULT;
    }
}

/// Advice hints for [`advise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MemAdvice {
    Normal = libc::MADV_NORMAL,
    Random = libc::MADV_RANDOM,
    Sequential = libc::MADV_SEQUENTIAL,
    WillNeed = libc::MADV_WILLNEED,
    DontNeed = libc::MADV_DONTNEED,
    Free = libc::MADV_FREE,
    DontFork = libc::MADV_DONTFORK,
    DoFork = libc::MADV_DOFORK,
    Mergeable = libc::MADV_MERGEABLE,
    Unmergeable = libc::MADV_UNMERGEABLE,
    HugePage = libc::MADV_HUGEPAGE,
    NoHugePage = libc::MADV_NOHUGEPAGE,
    DontDump = libc::MADV_DONTDUMP,
    DoDump = libc::MADV_DODUMP,
    WipeOnFork = libc::MADV_WIPEONFORK,
    KeepOnFork = libc::MADV_KEEPONFORK,
}

/// Settings for [`map`].
#[derive(Debug, Clone, Copy)]
pub struct MapSettings {
    pub map_type: MapType,
    pub access: AccessFlags,
    pub flags: MapFlags,
    /// Offset into the file object the mapping starts at.
    pub offset: u64,
    /// The file to map; leave `None` for ANONYMOUS mappings.
    pub fd: Option<FileDescriptor>,
    /// A placement hint, or the exact address with FIXED.
    pub addr: *mut libc::c_void,
}

impl MapSettings {
    /// Settings for a private anonymous mapping with the given access.
    pub fn anonymous(access: AccessFlags) -> MapSettings {
        MapSettings {
            map_type: MapType::Private,
            access,
            flags: MapFlags::ANONYMOUS,
            offset: 0,
            fd: None,
            addr: std::ptr::null_mut(),
        }
    }
}

/// Requests a memory mapping of `length` bytes using the given settings.
pub fn map(length: usize, settings: &MapSettings) -> Result<*mut libc::c_void> {
    let prot = settings.access.bits();
    let flags = settings.map_type as i32 | settings.flags.bits();
    let fd = settings
        .fd
        .map(|fd| fd.raw().raw())
        .unwrap_or(-1);
    let res = unsafe {
        libc::mmap(
            settings.addr,
            length,
            prot,
            flags,
            fd,
            settings.offset as libc::off_t,
        )
    };
    if res == libc::MAP_FAILED {
        return Err(Error::api("mmap"));
    }
    Ok(res)
}

/// Unmaps `length` bytes of an existing mapping at `addr`.
pub fn unmap(addr: *mut libc::c_void, length: usize) -> Result<()> {
    if unsafe { libc::munmap(addr, length) } == -1 {
        return Err(Error::api("munmap"));
    }
    Ok(())
}

/// Changes the size of an existing mapping, possibly moving it.
pub fn remap(
    old_addr: *mut libc::c_void,
    old_size: usize,
    new_size: usize,
    flags: RemapFlags,
    new_addr: Option<*mut libc::c_void>,
) -> Result<*mut libc::c_void> {
    let res = match new_addr {
        Some(new_addr) => unsafe {
            libc::mremap(old_addr, old_size, new_size, flags.bits(), new_addr)
        },
        None => unsafe { libc::mremap(old_addr, old_size, new_size, flags.bits()) },
    };
    if res == libc::MAP_FAILED {
        return Err(Error::api("mremap"));
    }
    Ok(res)
}

/// Changes the page protection of an existing mapping.
pub fn protect(
    addr: *mut libc::c_void,
    length: usize,
    access: AccessFlags,
    extra: ProtectFlags,
) -> Result<()> {
    if unsafe { libc::mprotect(addr, length, access.bits() | extra.bits()) } == -1 {
        return Err(Error::api("mprotect"));
    }
    Ok(())
}

/// Flushes changes in a shared file mapping to the underlying file.
pub fn sync(addr: *mut libc::c_void, length: usize, flags: SyncFlags) -> Result<()> {
    if unsafe { libc::msync(addr, length, flags.bits()) } == -1 {
        return Err(Error::api("msync"));
    }
    Ok(())
}

/// Locks the given address range into RAM.
pub fn lock(addr: *mut libc::c_void, length: usize, flags: LockFlags) -> Result<()> {
    let res = if flags.is_empty() {
        unsafe { libc::mlock(addr, length) }
    } else {
        unsafe { libc::syscall(libc::SYS_mlock2, addr, length, flags.bits()) as libc::c_int }
    };
    if res == -1 {
        return Err(Error::api("mlock2"));
    }
    Ok(())
}

/// Unlocks a previously locked address range.
pub fn unlock(addr: *mut libc::c_void, length: usize) -> Result<()> {
    if unsafe { libc::munlock(addr, length) } == -1 {
        return Err(Error::api("munlock"));
    }
    Ok(())
}

/// Locks the complete address space of the process into RAM.
pub fn lock_all(flags: LockAllFlags) -> Result<()> {
    if unsafe { libc::mlockall(flags.bits()) } == -1 {
        return Err(Error::api("mlockall"));
    }
    Ok(())
}

/// Undoes a previous [`lock_all`].
pub fn unlock_all() -> Result<()> {
    if unsafe { libc::munlockall() } == -1 {
        return Err(Error::api("munlockall"));
    }
    Ok(())
}

/// Advises the kernel about the expected use of an address range.
pub fn advise(addr: *mut libc::c_void, length: usize, advice: MemAdvice) -> Result<()> {
    if unsafe { libc::madvise(addr, length, advice as i32) } == -1 {
        return Err(Error::api("madvise"));
    }
    Ok(())
}

/// An owned memory mapping, unmapped on drop.
#[derive(Debug)]
pub struct Mapping {
    addr: *mut libc::c_void,
    length: usize,
}

impl Mapping {
    /// Creates a new mapping of `length` bytes with the given settings.
    pub fn new(length: usize, settings: &MapSettings) -> Result<Mapping> {
        let addr = map(length, settings)?;
        Ok(Mapping { addr, length })
    }

    pub fn addr(&self) -> *mut libc::c_void {
        self.addr
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// The mapped memory as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.addr.cast(), self.length) }
    }

    /// The mapped memory as a mutable byte slice.
    ///
    /// Only sound while the mapping permits writes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.addr.cast(), self.length) }
    }

    /// Changes the page protection of the whole mapping.
    pub fn protect(&mut self, access: AccessFlags) -> Result<()> {
        protect(self.addr, self.length, access, ProtectFlags::empty())
    }

    /// Grows or shrinks the mapping, allowing the kernel to move it.
    pub fn remap(&mut self, new_size: usize) -> Result<()> {
        self.addr = remap(self.addr, self.length, new_size, RemapFlags::MAYMOVE, None)?;
        self.length = new_size;
        Ok(())
    }

    /// Flushes a shared file mapping to its backing file.
    pub fn sync(&self, flags: SyncFlags) -> Result<()> {
        sync(self.addr, self.length, flags)
    }

    /// Unmaps the memory, reporting kernel errors.
    pub fn unmap(mut self) -> Result<()> {
        let res = unmap(self.addr, self.length);
        self.addr = libc::MAP_FAILED;
        std::mem::forget(self);
        res
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if self.addr != libc::MAP_FAILED {
            if let Err(err) = unmap(self.addr, self.length) {
                log::warn!("failed to unmap memory mapping: {err}");
            }
        }
    }
}

// a Mapping is an owned resource like a file descriptor
unsafe impl Send for Mapping {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_mapping_round_trip() {
        let mut mapping = Mapping::new(
            8192,
            &MapSettings::anonymous(AccessFlags::READ | AccessFlags::WRITE),
        )
        .unwrap();
        assert_eq!(mapping.length(), 8192);
        mapping.as_mut_slice()[0] = 0xa5;
        mapping.as_mut_slice()[8191] = 0x5a;
        assert_eq!(mapping.as_slice()[0], 0xa5);
        mapping.unmap().unwrap();
    }

    #[test]
    fn file_backed_mapping() {
        let mem = crate::io::MemFile::new(c"mapping-test").unwrap();
        crate::fs::truncate_fd(mem.fd(), 4096).unwrap();
        let mut settings = MapSettings::anonymous(AccessFlags::READ | AccessFlags::WRITE);
        settings.map_type = MapType::Shared;
        settings.flags = MapFlags::empty();
        settings.fd = Some(mem.fd());
        let mut mapping = Mapping::new(4096, &settings).unwrap();
        mapping.as_mut_slice()[..4].copy_from_slice(b"mmap");
        mapping.sync(SyncFlags::SYNC).unwrap();
        let mut buf = [0u8; 4];
        mem.fd().read(&mut buf).unwrap();
        assert_eq!(&buf, b"mmap");
    }

    #[test]
    fn remap_grows() {
        let mut mapping = Mapping::new(
            4096,
            &MapSettings::anonymous(AccessFlags::READ | AccessFlags::WRITE),
        )
        .unwrap();
        mapping.as_mut_slice()[0] = 42;
        mapping.remap(16384).unwrap();
        assert_eq!(mapping.length(), 16384);
        assert_eq!(mapping.as_slice()[0], 42);
    }

    #[test]
    fn protect_forbids_writes_logically() {
        let mut mapping = Mapping::new(
            4096,
            &MapSettings::anonymous(AccessFlags::READ | AccessFlags::WRITE),
        )
        .unwrap();
        mapping.protect(AccessFlags::READ).unwrap();
        assert_eq!(mapping.as_slice()[0], 0);
    }
}
