//! Kernel thread control via the pthread API.

mod posix_thread;
mod sync;

pub use posix_thread::{PosixThread, PthreadId, get_own_thread_id};
pub use sync::{Condition, Mutex};
