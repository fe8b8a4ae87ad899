//! Process management: identity, environment, child creation and reaping,
//! signals, memory mappings, tracing and user database lookups.

mod child_cloner;
pub mod mman;
mod pidfd;
pub mod prctl;
mod process;
pub mod ptrace;
mod scheduler;
mod siginfo;
pub mod signal;
mod types;
pub mod users;

pub use child_cloner::{ChildCloner, PostForkCallback, SubProc};
pub use pidfd::{PidFd, ProcessFile};
pub(crate) use process::refresh_cached_pids;
pub use process::{
    CachedPids, WaitTarget, cached_pids, clear_env_var, create_new_session, exec, exec_at,
    exists_env_var, exit, fexec, fork, get_effective_group_id, get_effective_user_id, get_env_var,
    get_own_pid, get_own_process_group, get_parent_pid, get_process_group_of, get_real_group_id,
    get_real_user_id, is_process_group_leader, set_env_var, set_process_group_of, wait, wait_for,
};
pub use scheduler::{NiceValue, SchedulerSettings};
pub use siginfo::SigInfo;
pub use signal::{SigSet, Signal, SignalFd, SignalFdFlags};
pub use types::{
    ChildEvent, ChildState, ClockTicks, ExitStatus, GroupId, ProcessCtx, ProcessGroupId,
    ProcessId, ThreadId, UserId, WaitFlags, WaitStatus,
};
