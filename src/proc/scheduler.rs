//! Scheduling policy settings for child process creation.

use crate::error::{Error, Result};
use crate::proc::ProcessId;

/// The nice value of a conventionally scheduled process; lower values mean
/// higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NiceValue(pub i8);

impl NiceValue {
    pub const HIGHEST: NiceValue = NiceValue(-20);
    pub const LOWEST: NiceValue = NiceValue(19);
}

/// Scheduling settings to apply to a process.
///
/// The real-time policies require privileges (CAP_SYS_NICE) and their
/// priority must lie within the range reported by the kernel for the
/// policy (1..=99 on Linux).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSettings {
    /// The default time-sharing policy with an explicit nice value.
    Other(NiceValue),
    /// Like Other, but for CPU-intensive batch work.
    Batch(NiceValue),
    /// For very low priority background jobs.
    Idle,
    /// Real-time first-in-first-out.
    Fifo { priority: i32 },
    /// Real-time round robin.
    RoundRobin { priority: i32 },
}

impl SchedulerSettings {
    fn policy(&self) -> libc::c_int {
        match self {
            SchedulerSettings::Other(_) => libc::SCHED_OTHER,
            SchedulerSettings::Batch(_) => libc::SCHED_BATCH,
            SchedulerSettings::Idle => libc::SCHED_IDLE,
            SchedulerSettings::Fifo { .. } => libc::SCHED_FIFO,
            SchedulerSettings::RoundRobin { .. } => libc::SCHED_RR,
        }
    }

    /// Applies the settings to `pid` ([`ProcessId::SELF`] for the caller).
    pub fn apply(&self, pid: ProcessId) -> Result<()> {
        let priority = match self {
            SchedulerSettings::Fifo { priority } | SchedulerSettings::RoundRobin { priority } => {
                *priority
            }
            _ => 0,
        };
        let param = libc::sched_param {
            sched_priority: priority,
        };
        if unsafe { libc::sched_setscheduler(pid.raw(), self.policy(), &param) } == -1 {
            return Err(Error::api("sched_setscheduler"));
        }
        match self {
            SchedulerSettings::Other(nice) | SchedulerSettings::Batch(nice) => {
                let res = unsafe {
                    libc::setpriority(libc::PRIO_PROCESS, pid.raw() as libc::id_t, nice.0 as i32)
                };
                if res == -1 {
                    return Err(Error::api("setpriority"));
                }
            }
            _ => (),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_priority_for_child() {
        match crate::proc::fork().unwrap() {
            None => {
                let settings = SchedulerSettings::Other(NiceValue(5));
                let ok = settings.apply(ProcessId::SELF).is_ok();
                crate::proc::exit(if ok {
                    crate::proc::ExitStatus::SUCCESS
                } else {
                    crate::proc::ExitStatus::FAILURE
                });
            }
            Some(pid) => {
                let state = crate::proc::wait_for(pid).unwrap().unwrap();
                assert_eq!(state.status, Some(crate::proc::ExitStatus::SUCCESS));
            }
        }
    }

    #[test]
    fn policy_mapping() {
        assert_eq!(SchedulerSettings::Idle.policy(), libc::SCHED_IDLE);
        assert_eq!(
            SchedulerSettings::Fifo { priority: 3 }.policy(),
            libc::SCHED_FIFO
        );
        assert!(NiceValue::HIGHEST < NiceValue::LOWEST);
    }
}
