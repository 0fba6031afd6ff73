//! Temporary scheduling priority changes for the current thread.
//!
//! On Linux `setpriority(PRIO_PROCESS, 0, ..)` applies to the calling thread,
//! which is what a thread-per-connection server needs.

use std::io;

use tracing::debug;

const PRIORITY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::priority");

/// Nice value used for background work such as distro scans.
pub const LOW_PRIORITY: i32 = 10;

/// Nice value used for latency-sensitive streaming such as dumps.
pub const HIGH_PRIORITY: i32 = -5;

/// Restores the previous nice value on drop.
#[derive(Debug)]
pub struct PriorityGuard {
    previous: Option<i32>,
}

impl PriorityGuard {
    /// Sets the calling thread's nice value. Failures are logged and leave
    /// the priority unchanged; raising priority usually needs privileges.
    #[must_use]
    pub fn set(nice: i32) -> Self {
        let previous = match current_priority() {
            Ok(previous) => previous,
            Err(error) => {
                debug!(target: PRIORITY_TARGET, %error, "cannot read thread priority");
                return Self { previous: None };
            }
        };
        match apply_priority(nice) {
            Ok(()) => Self {
                previous: Some(previous),
            },
            Err(error) => {
                debug!(target: PRIORITY_TARGET, nice, %error, "cannot change thread priority");
                Self { previous: None }
            }
        }
    }

    /// Whether the priority was actually changed.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.previous.is_some()
    }
}

impl Drop for PriorityGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous
            && let Err(error) = apply_priority(previous)
        {
            debug!(target: PRIORITY_TARGET, previous, %error, "cannot restore thread priority");
        }
    }
}

#[cfg(target_os = "linux")]
fn clear_errno() {
    // SAFETY: `__errno_location` returns the calling thread's errno slot.
    unsafe { *libc::__errno_location() = 0 };
}

#[cfg(not(target_os = "linux"))]
fn clear_errno() {}

fn current_priority() -> io::Result<i32> {
    clear_errno();
    // SAFETY: plain libc call with no pointer arguments.
    let value = unsafe { libc::getpriority(libc::PRIO_PROCESS, 0) };
    // -1 is a valid nice value, so only a set errno marks failure.
    if value == -1 {
        let error = io::Error::last_os_error();
        if error.raw_os_error().is_some_and(|code| code != 0) {
            return Err(error);
        }
    }
    Ok(value)
}

fn apply_priority(nice: i32) -> io::Result<()> {
    // SAFETY: plain libc call with no pointer arguments.
    if unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
