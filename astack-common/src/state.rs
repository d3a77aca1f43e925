//! Thread lifecycle state
//!
//! The VM reports a thread's state as a bitmask. A dump shows exactly one
//! label per thread, picked by a fixed priority order over those bits.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Raw thread-state bitmask as reported by `GetThreadState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ThreadStateFlags(pub u32);

impl ThreadStateFlags {
    pub const ALIVE: u32 = 0x0001;
    pub const TERMINATED: u32 = 0x0002;
    pub const RUNNABLE: u32 = 0x0004;
    pub const WAITING_INDEFINITELY: u32 = 0x0010;
    pub const WAITING_WITH_TIMEOUT: u32 = 0x0020;
    pub const SLEEPING: u32 = 0x0040;
    pub const WAITING: u32 = 0x0080;
    pub const IN_OBJECT_WAIT: u32 = 0x0100;
    pub const PARKED: u32 = 0x0200;
    pub const BLOCKED_ON_MONITOR_ENTER: u32 = 0x0400;
    pub const SUSPENDED: u32 = 0x0010_0000;
    pub const INTERRUPTED: u32 = 0x0020_0000;
    pub const IN_NATIVE: u32 = 0x0040_0000;

    #[must_use]
    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }
}

/// The single label a thread is shown with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadStatus {
    New,
    Runnable,
    Blocked,
    WaitingOnMonitor,
    Parked,
    Waiting,
    TimedWaitingOnMonitor,
    TimedParked,
    Sleeping,
    TimedWaiting,
    Terminated,
    Unknown,
}

impl ThreadStatus {
    pub const ALL: [ThreadStatus; 12] = [
        ThreadStatus::New,
        ThreadStatus::Runnable,
        ThreadStatus::Blocked,
        ThreadStatus::WaitingOnMonitor,
        ThreadStatus::Parked,
        ThreadStatus::Waiting,
        ThreadStatus::TimedWaitingOnMonitor,
        ThreadStatus::TimedParked,
        ThreadStatus::Sleeping,
        ThreadStatus::TimedWaiting,
        ThreadStatus::Terminated,
        ThreadStatus::Unknown,
    ];

    /// Pick the label for a state bitmask.
    ///
    /// Terminated wins over everything, then the alive sub-states in order
    /// runnable, blocked, waiting (indefinitely), timed waiting. A thread
    /// that is neither alive nor terminated has not been started yet.
    #[must_use]
    pub fn from_flags(flags: ThreadStateFlags) -> Self {
        type F = ThreadStateFlags;

        if flags.contains(F::TERMINATED) {
            return ThreadStatus::Terminated;
        }
        if !flags.contains(F::ALIVE) {
            return ThreadStatus::New;
        }
        if flags.contains(F::RUNNABLE) {
            return ThreadStatus::Runnable;
        }
        if flags.contains(F::BLOCKED_ON_MONITOR_ENTER) {
            return ThreadStatus::Blocked;
        }
        if flags.contains(F::WAITING_INDEFINITELY) {
            return if flags.contains(F::IN_OBJECT_WAIT) {
                ThreadStatus::WaitingOnMonitor
            } else if flags.contains(F::PARKED) {
                ThreadStatus::Parked
            } else {
                ThreadStatus::Waiting
            };
        }
        if flags.contains(F::WAITING_WITH_TIMEOUT) {
            return if flags.contains(F::IN_OBJECT_WAIT) {
                ThreadStatus::TimedWaitingOnMonitor
            } else if flags.contains(F::PARKED) {
                ThreadStatus::TimedParked
            } else if flags.contains(F::SLEEPING) {
                ThreadStatus::Sleeping
            } else {
                ThreadStatus::TimedWaiting
            };
        }
        ThreadStatus::Unknown
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ThreadStatus::New => "NEW",
            ThreadStatus::Runnable => "RUNNABLE",
            ThreadStatus::Blocked => "BLOCKED (on object monitor)",
            ThreadStatus::WaitingOnMonitor => "WAITING (on object monitor)",
            ThreadStatus::Parked => "WAITING (parking)",
            ThreadStatus::Waiting => "WAITING",
            ThreadStatus::TimedWaitingOnMonitor => "TIMED_WAITING (on object monitor)",
            ThreadStatus::TimedParked => "TIMED_WAITING (parking)",
            ThreadStatus::Sleeping => "TIMED_WAITING (sleeping)",
            ThreadStatus::TimedWaiting => "TIMED_WAITING",
            ThreadStatus::Terminated => "TERMINATED",
            ThreadStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown thread state label: {0:?}")]
pub struct UnknownStateLabel(pub String);

impl FromStr for ThreadStatus {
    type Err = UnknownStateLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ThreadStatus::ALL
            .into_iter()
            .find(|status| status.label() == wanted)
            .ok_or_else(|| UnknownStateLabel(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type F = ThreadStateFlags;

    fn status(bits: u32) -> ThreadStatus {
        ThreadStatus::from_flags(ThreadStateFlags(bits))
    }

    #[test]
    fn test_terminated_wins_over_waiting() {
        let bits = F::TERMINATED | F::WAITING | F::WAITING_WITH_TIMEOUT | F::SLEEPING;
        assert_eq!(status(bits), ThreadStatus::Terminated);
        assert_eq!(status(bits | F::ALIVE), ThreadStatus::Terminated);
    }

    #[test]
    fn test_not_started() {
        assert_eq!(status(0), ThreadStatus::New);
        assert_eq!(status(F::RUNNABLE), ThreadStatus::New);
    }

    #[test]
    fn test_alive_priority_order() {
        let all_alive = F::ALIVE
            | F::RUNNABLE
            | F::BLOCKED_ON_MONITOR_ENTER
            | F::WAITING_INDEFINITELY
            | F::WAITING_WITH_TIMEOUT;
        assert_eq!(status(all_alive), ThreadStatus::Runnable);
        assert_eq!(status(all_alive & !F::RUNNABLE), ThreadStatus::Blocked);
        assert_eq!(
            status(F::ALIVE | F::WAITING_INDEFINITELY | F::WAITING_WITH_TIMEOUT),
            ThreadStatus::Waiting
        );
        assert_eq!(status(F::ALIVE), ThreadStatus::Unknown);
    }

    #[test]
    fn test_waiting_sub_states() {
        let base = F::ALIVE | F::WAITING | F::WAITING_INDEFINITELY;
        assert_eq!(status(base | F::IN_OBJECT_WAIT | F::PARKED), ThreadStatus::WaitingOnMonitor);
        assert_eq!(status(base | F::PARKED), ThreadStatus::Parked);
        assert_eq!(status(base), ThreadStatus::Waiting);
    }

    #[test]
    fn test_timed_waiting_sub_states() {
        let base = F::ALIVE | F::WAITING | F::WAITING_WITH_TIMEOUT;
        assert_eq!(
            status(base | F::IN_OBJECT_WAIT | F::PARKED | F::SLEEPING),
            ThreadStatus::TimedWaitingOnMonitor
        );
        assert_eq!(status(base | F::PARKED | F::SLEEPING), ThreadStatus::TimedParked);
        assert_eq!(status(base | F::SLEEPING), ThreadStatus::Sleeping);
        assert_eq!(status(base), ThreadStatus::TimedWaiting);
        assert_eq!(ThreadStatus::Sleeping.to_string(), "TIMED_WAITING (sleeping)");
    }

    #[test]
    fn test_every_bitmask_gets_exactly_one_label() {
        let bits = [
            F::ALIVE,
            F::TERMINATED,
            F::RUNNABLE,
            F::WAITING_INDEFINITELY,
            F::WAITING_WITH_TIMEOUT,
            F::SLEEPING,
            F::WAITING,
            F::IN_OBJECT_WAIT,
            F::PARKED,
            F::BLOCKED_ON_MONITOR_ENTER,
            F::SUSPENDED,
            F::INTERRUPTED,
            F::IN_NATIVE,
        ];

        for combo in 0u32..(1 << bits.len()) {
            let mask = bits
                .iter()
                .enumerate()
                .filter(|(i, _)| combo & (1 << i) != 0)
                .fold(0, |acc, (_, bit)| acc | bit);
            let label = status(mask);

            // Suspension, interruption and native flags never change the label
            let core = mask & !(F::SUSPENDED | F::INTERRUPTED | F::IN_NATIVE);
            assert_eq!(label, status(core), "mask {mask:#x}");

            if mask & F::TERMINATED != 0 {
                assert_eq!(label, ThreadStatus::Terminated, "mask {mask:#x}");
            } else if mask & F::ALIVE == 0 {
                assert_eq!(label, ThreadStatus::New, "mask {mask:#x}");
            } else {
                assert!(
                    !matches!(label, ThreadStatus::New | ThreadStatus::Terminated),
                    "mask {mask:#x}"
                );
            }
        }
    }

    #[test]
    fn test_label_round_trip() {
        for status in ThreadStatus::ALL {
            assert_eq!(status.label().parse::<ThreadStatus>(), Ok(status));
        }
        assert!("SLEEPY".parse::<ThreadStatus>().is_err());
    }
}
