//! Runner stage: launch the compiled entry class under the run timeout.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::process::{run_bounded, BoundedCommand, Completion, ProcessGroupTerminator};
use crate::sandbox::Sandbox;
use tracing::debug;

/// Result of one program run. When `timed_out` is set the other fields carry no
/// meaning and are left empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub timed_out: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// A non-zero exit, or anything at all on stderr, is a fault.
    pub fn is_fault(&self) -> bool {
        self.exit_code != 0 || !self.stderr.trim().is_empty()
    }
}

/// `java <jvm_args> -cp <sandbox> <entry_class>`, run from inside the sandbox.
pub fn run_command(config: &EngineConfig, sandbox: &Sandbox) -> BoundedCommand {
    let mut args = config.jvm_args.clone();
    args.push("-cp".to_string());
    args.push(sandbox.path().to_string_lossy().into_owned());
    args.push(config.entry_class.clone());
    BoundedCommand {
        program: config.java.clone(),
        args,
        cwd: sandbox.path().to_path_buf(),
        env_passthrough: config.env_passthrough.clone(),
        timeout: config.run_timeout,
        drain_timeout: config.drain_timeout,
        max_output_bytes: config.max_output_bytes,
    }
}

pub fn run(
    config: &EngineConfig,
    terminator: &dyn ProcessGroupTerminator,
    sandbox: &Sandbox,
) -> EngineResult<RunOutcome> {
    let output = run_bounded(&run_command(config, sandbox), terminator)?;
    debug!(
        sandbox = %sandbox.id(),
        completion = ?output.completion,
        elapsed_ms = output.elapsed.as_millis(),
        "java finished"
    );
    Ok(match output.completion {
        Completion::TimedOut => RunOutcome::timed_out(),
        Completion::Exited(exit_code) => RunOutcome {
            timed_out: false,
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        },
    })
}
