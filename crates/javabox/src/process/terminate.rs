//! "Terminate process group" capability.
//!
//! The pipeline only ever asks for a whole process group to be killed; how that
//! happens depends on the host. Unix signals the group created at spawn time with
//! `SIGKILL`. Windows has no process groups in that sense, so the tree is killed by
//! `taskkill /F /T`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

pub trait ProcessGroupTerminator: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Forcefully terminate the process led by `leader_pid` and every descendant.
    ///
    /// A group that is already gone is not an error.
    fn terminate_group(&self, leader_pid: u32) -> io::Result<()>;
}

/// `killpg(pgid, SIGKILL)` against the group created with `process_group(0)`.
#[cfg(unix)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalGroupTerminator;

#[cfg(unix)]
impl ProcessGroupTerminator for SignalGroupTerminator {
    fn name(&self) -> &'static str {
        "killpg"
    }

    fn terminate_group(&self, leader_pid: u32) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(leader_pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            // ESRCH means the whole group already exited
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(io::Error::from(err)),
        }
    }
}

/// Tree-kill through an external utility (`taskkill /F /T /PID <pid>`).
#[derive(Clone, Debug)]
pub struct TreeKillTerminator {
    program: PathBuf,
}

impl TreeKillTerminator {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TreeKillTerminator {
    fn default() -> Self {
        Self::with_program("taskkill")
    }
}

impl ProcessGroupTerminator for TreeKillTerminator {
    fn name(&self) -> &'static str {
        "taskkill"
    }

    fn terminate_group(&self, leader_pid: u32) -> io::Result<()> {
        let status = Command::new(&self.program)
            .args(["/F", "/T", "/PID", &leader_pid.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        // 128: no such process, the tree already exited
        if status.success() || status.code() == Some(128) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {status}", self.program.display()),
            ))
        }
    }
}

/// The backend appropriate for the host OS.
pub fn platform_terminator() -> Arc<dyn ProcessGroupTerminator> {
    #[cfg(unix)]
    {
        Arc::new(SignalGroupTerminator)
    }
    #[cfg(not(unix))]
    {
        Arc::new(TreeKillTerminator::default())
    }
}
