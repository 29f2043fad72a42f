//! Bounded child-process execution.
//!
//! [`run_bounded`] launches one command in its own process group, captures both
//! output streams on reader threads, and waits until the process has exited *and*
//! both pipes reached EOF, or until the wall-clock deadline passes. On expiry the
//! whole group is terminated through a [`ProcessGroupTerminator`], then the pipes get
//! one short, bounded drain. A descendant that escaped the group and keeps a pipe
//! open can delay nothing beyond that drain: its reader thread is abandoned.
//!
//! A normal exit also ends with the group being terminated, so descendants that
//! let go of the pipes do not outlive the run.

pub mod env;
pub mod terminate;

pub use env::{apply_env_policy, is_denied_env_var};
pub use terminate::{platform_terminator, ProcessGroupTerminator, TreeKillTerminator};
#[cfg(unix)]
pub use terminate::SignalGroupTerminator;

use crate::error::{EngineError, EngineResult};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_CHUNK: usize = 8192;

/// One command to run under a deadline.
#[derive(Clone, Debug)]
pub struct BoundedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env_passthrough: Vec<String>,
    /// Wall-clock limit measured from spawn.
    pub timeout: Duration,
    /// Limit on the post-kill drain.
    pub drain_timeout: Duration,
    /// Per-stream capture budget in bytes.
    pub max_output_bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Exit code; `-signal` when the process was killed by a signal.
    Exited(i32),
    TimedOut,
}

#[derive(Clone, Debug)]
pub struct BoundedOutput {
    pub completion: Completion,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

struct Readers {
    stdout: JoinHandle<Capture>,
    stderr: JoinHandle<Capture>,
}

impl Readers {
    fn finished(&self) -> bool {
        self.stdout.is_finished() && self.stderr.is_finished()
    }
}

/// Run the command to completion or until its deadline.
///
/// Returns `Err` only when the process could not be launched or supervised; a
/// timeout is an ordinary [`Completion::TimedOut`].
pub fn run_bounded(
    bounded: &BoundedCommand,
    terminator: &dyn ProcessGroupTerminator,
) -> EngineResult<BoundedOutput> {
    let mut command = Command::new(&bounded.program);
    command
        .args(&bounded.args)
        .current_dir(&bounded.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    apply_env_policy(&mut command, &bounded.env_passthrough);
    isolate_process_group(&mut command);

    debug!(
        program = %bounded.program,
        args = ?bounded.args,
        cwd = %bounded.cwd.display(),
        "spawning"
    );
    let started = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|err| EngineError::spawn_failed(&bounded.program, err))?;

    let readers = match start_readers(&mut child, bounded.max_output_bytes) {
        Ok(readers) => readers,
        Err(err) => {
            kill_group(&mut child, terminator);
            reap(&mut child, bounded.drain_timeout);
            return Err(err);
        }
    };

    match wait_until(&mut child, &readers, started + bounded.timeout) {
        Ok(Some(status)) => {
            sweep_group(child.id(), terminator);
            let (stdout, stderr) = collect(readers)?;
            Ok(BoundedOutput {
                completion: Completion::Exited(exit_code(status)),
                stdout,
                stderr,
                elapsed: started.elapsed(),
            })
        }
        Ok(None) => {
            debug!(
                program = %bounded.program,
                timeout_ms = bounded.timeout.as_millis(),
                "deadline reached; terminating process group"
            );
            kill_group(&mut child, terminator);
            drain(&mut child, readers, bounded.drain_timeout);
            Ok(BoundedOutput {
                completion: Completion::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                elapsed: started.elapsed(),
            })
        }
        Err(err) => {
            kill_group(&mut child, terminator);
            drain(&mut child, readers, bounded.drain_timeout);
            Err(EngineError::io("failed to wait for child process", err))
        }
    }
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn isolate_process_group(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn isolate_process_group(_command: &mut Command) {}

fn start_readers(child: &mut Child, max_output_bytes: u64) -> EngineResult<Readers> {
    let limit = usize::try_from(max_output_bytes).unwrap_or(usize::MAX);
    let stdout: ChildStdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::internal("child stdout was not captured"))?;
    let stderr: ChildStderr = child
        .stderr
        .take()
        .ok_or_else(|| EngineError::internal("child stderr was not captured"))?;
    Ok(Readers {
        stdout: spawn_reader("stdout", stdout, limit)?,
        stderr: spawn_reader("stderr", stderr, limit)?,
    })
}

fn spawn_reader<R>(name: &str, stream: R, limit: usize) -> EngineResult<JoinHandle<Capture>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("javabox-{name}"))
        .spawn(move || read_bounded(stream, limit))
        .map_err(|err| EngineError::io("failed to start output reader", err))
}

/// Read to EOF, keeping at most `limit` bytes. Reading continues past the budget
/// so the child never blocks on a full pipe.
fn read_bounded<R: Read>(mut stream: R, limit: usize) -> Capture {
    let mut capture = Capture::default();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(count) => {
                let room = limit.saturating_sub(capture.bytes.len());
                let keep = count.min(room);
                if let Some(chunk) = buf.get(..keep) {
                    capture.bytes.extend_from_slice(chunk);
                }
                if keep < count {
                    capture.truncated = true;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }
    capture
}

/// Poll until the child exited and both pipes closed (`Some`), or the deadline
/// passed (`None`).
fn wait_until(
    child: &mut Child,
    readers: &Readers,
    deadline: Instant,
) -> std::io::Result<Option<ExitStatus>> {
    let mut status = None;
    loop {
        if status.is_none() {
            status = child.try_wait()?;
        }
        if let Some(exit) = status {
            if readers.finished() {
                return Ok(Some(exit));
            }
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_group(child: &mut Child, terminator: &dyn ProcessGroupTerminator) {
    if let Err(err) = terminator.terminate_group(child.id()) {
        warn!(
            pid = child.id(),
            backend = terminator.name(),
            error = %err,
            "failed to terminate process group; killing leader only"
        );
        if let Err(err) = child.kill() {
            warn!(pid = child.id(), error = %err, "failed to kill process group leader");
        }
    }
}

/// Kill whatever is left of the group after the leader exited on its own.
/// Descendants that detached from our pipes would otherwise outlive the run.
fn sweep_group(pgid: u32, terminator: &dyn ProcessGroupTerminator) {
    if let Err(err) = terminator.terminate_group(pgid) {
        warn!(
            pgid,
            backend = terminator.name(),
            error = %err,
            "failed to terminate leftover process group members"
        );
    }
}

/// Wait up to `timeout` for the child to be reaped.
fn reap(child: &mut Child, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) | Err(_) => break,
            Ok(None) if Instant::now() >= deadline => {
                warn!(pid = child.id(), "terminated child was not reaped within drain timeout");
                break;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Reap the child and give the readers one bounded chance to finish. Anything
/// still blocked after `drain_timeout` is abandoned.
fn drain(child: &mut Child, readers: Readers, drain_timeout: Duration) {
    let deadline = Instant::now() + drain_timeout;
    reap(child, drain_timeout);
    while !readers.finished() && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }
    for (name, handle) in [("stdout", readers.stdout), ("stderr", readers.stderr)] {
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            warn!(stream = name, "pipe still open after drain timeout; abandoning reader");
        }
    }
}

fn collect(readers: Readers) -> EngineResult<(String, String)> {
    let stdout = join_reader("stdout", readers.stdout)?;
    let stderr = join_reader("stderr", readers.stderr)?;
    Ok((stdout, stderr))
}

fn join_reader(name: &str, handle: JoinHandle<Capture>) -> EngineResult<String> {
    let capture = handle
        .join()
        .map_err(|_| EngineError::internal(format!("{name} reader thread panicked")))?;
    if capture.truncated {
        warn!(stream = name, kept_bytes = capture.bytes.len(), "output truncated");
    }
    Ok(String::from_utf8_lossy(&capture.bytes).into_owned())
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
