//! Per-OS process liveness probing for orphan reclamation
//!
//! Orphaned cache directories embed the pid of the process that created them.
//! Reclamation must only remove directories whose owner is gone, so the check
//! is isolated behind one trait with a platform-selected implementation:
//! signal-zero on POSIX, a process-table query on Windows.

/// Answers "is the process with this pid still running?"
pub trait ProcessLiveness {
    fn is_alive(&self, pid: u32) -> bool;
}

/// POSIX probe: `kill(pid, 0)` sends no signal but reports existence.
#[cfg(unix)]
pub struct SignalProbe;

#[cfg(unix)]
impl ProcessLiveness for SignalProbe {
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs only the permission/existence check.
        let rc = unsafe { libc::kill(pid, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM means the process exists but belongs to another user
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

/// Windows probe: query the process table.
#[cfg(windows)]
pub struct ProcessTableProbe;

#[cfg(windows)]
impl ProcessLiveness for ProcessTableProbe {
    fn is_alive(&self, pid: u32) -> bool {
        use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );
        system.process(Pid::from_u32(pid)).is_some()
    }
}

/// The liveness probe for the current platform.
#[cfg(unix)]
pub fn platform_probe() -> SignalProbe {
    SignalProbe
}

/// The liveness probe for the current platform.
#[cfg(windows)]
pub fn platform_probe() -> ProcessTableProbe {
    ProcessTableProbe
}
