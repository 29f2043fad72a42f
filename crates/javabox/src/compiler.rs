//! Compiler stage: write the submission into the sandbox and run `javac` on it.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::process::{run_bounded, BoundedCommand, Completion, ProcessGroupTerminator};
use crate::sandbox::Sandbox;
use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::debug;

/// Result of one compiler invocation. Never leaves the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOutcome {
    /// `javac` exited with status 0.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CompileOutcome {
    /// Compiler diagnostics: stderr, or stdout when stderr is blank.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Compile `source` as `<entry_class>.java` inside `sandbox`.
///
/// A compiler that outlives `compile_timeout` is an [`EngineError::CompileTimeout`],
/// not a failed compile.
pub fn compile(
    config: &EngineConfig,
    terminator: &dyn ProcessGroupTerminator,
    sandbox: &Sandbox,
    source: &str,
) -> EngineResult<CompileOutcome> {
    let file_name = config.source_file_name();
    write_source(&sandbox.file(&file_name), source)?;

    let command = BoundedCommand {
        program: config.javac.clone(),
        args: vec![
            "-d".to_string(),
            sandbox.path().to_string_lossy().into_owned(),
            "-encoding".to_string(),
            "UTF-8".to_string(),
            file_name,
        ],
        cwd: sandbox.path().to_path_buf(),
        env_passthrough: config.env_passthrough.clone(),
        timeout: config.compile_timeout,
        drain_timeout: config.drain_timeout,
        max_output_bytes: config.max_output_bytes,
    };
    let output = run_bounded(&command, terminator)?;
    match output.completion {
        Completion::TimedOut => Err(EngineError::CompileTimeout {
            limit: config.compile_timeout,
        }),
        Completion::Exited(code) => {
            debug!(
                sandbox = %sandbox.id(),
                exit_code = code,
                elapsed_ms = output.elapsed.as_millis(),
                "javac finished"
            );
            Ok(CompileOutcome {
                success: code == 0,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

/// Write the submission verbatim. Owner-only permissions on Unix.
fn write_source(path: &Path, source: &str) -> EngineResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(path)
        .map_err(|err| EngineError::io_at("failed to create source file", path, err))?;
    file.write_all(source.as_bytes())
        .map_err(|err| EngineError::io_at("failed to write source file", path, err))
}
