//! [`ProcessControl`] for Unix hosts.

use crate::process::{ProcessControl, SpawnSpec};
use std::fs::File;
use std::io;
use std::process::{Command, Stdio};

/// Spawns detached children and signals them with `SIGTERM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessControl;

impl UnixProcessControl {
    pub fn new() -> Self {
        Self
    }
}

/// Convert to a `pid_t`, refusing values `kill(2)` would treat as a group.
fn to_pid(pid: u32) -> Option<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(pid) if pid > 0 => Some(pid),
        _ => None,
    }
}

impl ProcessControl for UnixProcessControl {
    fn spawn(&self, spec: &SpawnSpec, output: File) -> io::Result<u32> {
        let stderr = output.try_clone()?;

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::from(stderr))
            .spawn()?;

        // Dropping a std Child neither kills nor reaps it; `is_alive` reaps.
        Ok(child.id())
    }

    fn request_stop(&self, pid: u32) -> io::Result<()> {
        let pid = to_pid(pid).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "not a single process id")
        })?;

        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Some(pid) = to_pid(pid) else {
            return false;
        };

        // Our own exited children stay zombies until reaped, and kill(pid, 0)
        // succeeds on zombies.
        // SAFETY: a null status pointer is allowed by waitpid(2).
        let reaped = unsafe { libc::waitpid(pid, std::ptr::null_mut(), libc::WNOHANG) };
        if reaped == pid {
            return false;
        }
        if reaped == 0 {
            return true;
        }

        // Not our child: probe with the null signal.
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}
