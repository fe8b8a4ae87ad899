//! Type-safe RAII wrappers around the Linux system-call surface.
//!
//! This crate wraps a broad slice of the Linux/POSIX API with one uniform
//! design vocabulary: strong integer and enum types instead of raw kernel
//! integers, bitflag carriers for every flag set, named-boolean parameters,
//! single-owner descriptor types that close on drop, and one shared error
//! taxonomy. Covered are file descriptors and files, filesystem operations,
//! directory streams, epoll, pipes, event and memory files, sockets
//! (IP/UNIX, with ancillary message support), signals, processes, clocks
//! and timers, memory mappings, ptrace and pthread control.
//!
//! It deliberately is *not* a portable-POSIX layer (Linux-specific calls
//! like pidfd, memfd and abstract UNIX sockets are first-class citizens),
//! not an async runtime (blocking calls block the calling thread), and not
//! a networking framework.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod fd;
pub mod fs;
mod init;
pub mod io;
pub mod net;
pub mod proc;
pub mod thread;
pub mod time;
pub mod types;

pub use error::{EaiCode, Errno, Error, Result};
pub use fd::{DirFd, FileDescriptor, FileNum};
pub use init::{
    Init, finish, init, restart_syscall_on_interrupt, set_restart_syscall_on_interrupt,
};
pub use types::{
    Abstract, AddressFilledIn, AutoCloseFd, CloseOnExec, FollowSymlinks, NamedBool, OverwriteEnv,
    SysString,
};
