//! Outcome classification.
//!
//! [`Classifier`] tracks where one invocation is in its lifecycle and turns each
//! stage result, or any engine fault, into exactly one [`ExecutionResult`].
//!
//! ```text
//! Start -> Compiling -> CompileFailed
//!                    -> Compiled -> Running -> RunSucceeded | RunFaulted | RunTimedOut
//!                    -> RunTimedOut            (compiler timeout)
//! ```

use crate::compiler::CompileOutcome;
use crate::error::{EngineError, EngineResult};
use crate::model::ExecutionResult;
use crate::parser::DiagnosticParser;
use crate::runner::RunOutcome;
use std::fmt;
use tracing::debug;

/// Fallback when the compiler failed without printing anything.
pub const COMPILE_FAILED_FALLBACK: &str = "Compilation failed";
/// Fallback when the program faulted with an empty stderr.
pub const RUNTIME_ERROR_FALLBACK: &str = "Runtime error";
/// `exception_type` marker for a missing compiler or runtime.
pub const ENVIRONMENT_ERROR: &str = "EnvironmentError";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Start,
    Compiling,
    CompileFailed,
    Compiled,
    Running,
    RunSucceeded,
    RunFaulted,
    RunTimedOut,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CompileFailed | Self::RunSucceeded | Self::RunFaulted | Self::RunTimedOut
        )
    }

    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::Compiling)
                | (
                    Self::Compiling,
                    Self::CompileFailed | Self::Compiled | Self::RunTimedOut
                )
                | (Self::Compiled, Self::Running)
                | (
                    Self::Running,
                    Self::RunSucceeded | Self::RunFaulted | Self::RunTimedOut
                )
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
pub struct Classifier<'a> {
    parser: &'a DiagnosticParser,
    stage: Stage,
}

impl<'a> Classifier<'a> {
    pub fn new(parser: &'a DiagnosticParser) -> Self {
        Self {
            parser,
            stage: Stage::Start,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn begin_compile(&mut self) -> EngineResult<()> {
        self.advance(Stage::Compiling)
    }

    /// Record the compiler outcome. Returns the terminal result when the compile
    /// failed, `None` when the run may proceed.
    pub fn compiled(&mut self, outcome: &CompileOutcome) -> EngineResult<Option<ExecutionResult>> {
        if outcome.success {
            self.advance(Stage::Compiled)?;
            return Ok(None);
        }
        self.advance(Stage::CompileFailed)?;
        let diagnostics = outcome.diagnostics();
        let message = if diagnostics.is_empty() {
            COMPILE_FAILED_FALLBACK
        } else {
            diagnostics
        };
        Ok(Some(ExecutionResult::CompilationError {
            message: message.to_string(),
            line_number: self.parser.compile_error_line(diagnostics),
        }))
    }

    pub fn begin_run(&mut self) -> EngineResult<()> {
        self.advance(Stage::Running)
    }

    pub fn finished(&mut self, outcome: RunOutcome) -> EngineResult<ExecutionResult> {
        if outcome.timed_out {
            self.advance(Stage::RunTimedOut)?;
            return Ok(ExecutionResult::timeout());
        }
        let stdout = outcome.stdout.trim();
        if outcome.is_fault() {
            self.advance(Stage::RunFaulted)?;
            let stderr = outcome.stderr.trim();
            let fault = self.parser.runtime_fault(stderr);
            let message = stderr.lines().next().unwrap_or(RUNTIME_ERROR_FALLBACK);
            return Ok(ExecutionResult::RuntimeError {
                message: message.to_string(),
                exception_type: fault.exception_type,
                line_number: fault.line_number,
                partial_output: (!stdout.is_empty()).then(|| stdout.to_string()),
            });
        }
        self.advance(Stage::RunSucceeded)?;
        Ok(ExecutionResult::Success {
            output: stdout.to_string(),
        })
    }

    /// Fold an engine fault into a result.
    ///
    /// A compiler timeout is reported as [`ExecutionResult::Timeout`]; a missing
    /// toolchain and every other fault become a `RuntimeError` carrying a marker
    /// in `exception_type`.
    pub fn fault(&mut self, err: &EngineError) -> ExecutionResult {
        if let EngineError::CompileTimeout { .. } = err {
            if self.advance(Stage::RunTimedOut).is_err() {
                debug!(stage = %self.stage, "compile timeout reported outside the compile stage");
            }
            return ExecutionResult::timeout();
        }
        debug!(stage = %self.stage, code = %err.code(), "engine fault");
        match err {
            EngineError::ToolchainMissing { .. } => {
                ExecutionResult::engine_fault(err.to_string(), ENVIRONMENT_ERROR)
            }
            _ => ExecutionResult::engine_fault(
                format!("Internal engine error: {err}"),
                err.kind_name(),
            ),
        }
    }

    fn advance(&mut self, next: Stage) -> EngineResult<()> {
        if !self.stage.can_advance_to(next) {
            return Err(EngineError::internal(format!(
                "invalid pipeline transition {} -> {next}",
                self.stage
            )));
        }
        debug!(from = %self.stage, to = %next, "pipeline transition");
        self.stage = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parser() -> DiagnosticParser {
        DiagnosticParser::new("Main").unwrap()
    }

    fn failed_compile(stdout: &str, stderr: &str) -> CompileOutcome {
        CompileOutcome {
            success: false,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn ran(exit_code: i32, stdout: &str, stderr: &str) -> RunOutcome {
        RunOutcome {
            timed_out: false,
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn compiled_classifier(parser: &DiagnosticParser) -> Classifier<'_> {
        let mut classifier = Classifier::new(parser);
        classifier.begin_compile().unwrap();
        let ok = CompileOutcome {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(classifier.compiled(&ok).unwrap(), None);
        classifier.begin_run().unwrap();
        classifier
    }

    #[test]
    fn compile_failure_is_terminal_with_first_line() {
        let parser = parser();
        let mut classifier = Classifier::new(&parser);
        classifier.begin_compile().unwrap();
        let result = classifier
            .compiled(&failed_compile(
                "",
                "Main.java:3: error: ';' expected\nMain.java:5: error: oops\n2 errors\n",
            ))
            .unwrap()
            .unwrap();
        assert_eq!(result.line_number(), Some(3));
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Main.java:3: error"));
        assert_eq!(result.exception_type(), None);
        assert_eq!(classifier.stage(), Stage::CompileFailed);
        assert!(classifier.begin_run().is_err());
    }

    #[test]
    fn silent_compile_failure_uses_fallback() {
        let parser = parser();
        let mut classifier = Classifier::new(&parser);
        classifier.begin_compile().unwrap();
        let result = classifier.compiled(&failed_compile("", "")).unwrap().unwrap();
        assert_eq!(
            result,
            ExecutionResult::CompilationError {
                message: COMPILE_FAILED_FALLBACK.to_string(),
                line_number: None,
            }
        );
    }

    #[test]
    fn clean_run_is_success_with_trimmed_output() {
        let parser = parser();
        let mut classifier = compiled_classifier(&parser);
        let result = classifier.finished(ran(0, "Hello, World!\n", "")).unwrap();
        assert_eq!(
            result,
            ExecutionResult::Success {
                output: "Hello, World!".to_string()
            }
        );
        assert!(classifier.stage().is_terminal());
    }

    #[test]
    fn stderr_with_zero_exit_is_a_fault() {
        let parser = parser();
        let mut classifier = compiled_classifier(&parser);
        let result = classifier.finished(ran(0, "", "warning: odd\n")).unwrap();
        assert_eq!(result.error_message(), Some("warning: odd"));
        assert_eq!(classifier.stage(), Stage::RunFaulted);
    }

    #[test]
    fn fault_carries_parsed_diagnostics_and_partial_output() {
        let parser = parser();
        let mut classifier = compiled_classifier(&parser);
        let stderr = "Exception in thread \"main\" java.lang.ArrayIndexOutOfBoundsException: \
                      Index 5 out of bounds for length 3\n\tat Main.main(Main.java:6)\n";
        let result = classifier
            .finished(ran(1, "Line 1\nLine 2\n", stderr))
            .unwrap();
        assert_eq!(
            result,
            ExecutionResult::RuntimeError {
                message: "Exception in thread \"main\" java.lang.ArrayIndexOutOfBoundsException: \
                          Index 5 out of bounds for length 3"
                    .to_string(),
                exception_type: Some("ArrayIndexOutOfBoundsException".to_string()),
                line_number: Some(6),
                partial_output: Some("Line 1\nLine 2".to_string()),
            }
        );
    }

    #[test]
    fn nonzero_exit_without_stderr_uses_fallback() {
        let parser = parser();
        let mut classifier = compiled_classifier(&parser);
        let result = classifier.finished(ran(3, "  \n", "")).unwrap();
        assert_eq!(
            result,
            ExecutionResult::RuntimeError {
                message: RUNTIME_ERROR_FALLBACK.to_string(),
                exception_type: None,
                line_number: None,
                partial_output: None,
            }
        );
    }

    #[test]
    fn run_timeout_discards_output() {
        let parser = parser();
        let mut classifier = compiled_classifier(&parser);
        let result = classifier.finished(RunOutcome::timed_out()).unwrap();
        assert_eq!(result, ExecutionResult::timeout());
        assert_eq!(classifier.stage(), Stage::RunTimedOut);
    }

    #[test]
    fn compile_timeout_maps_to_timeout() {
        let parser = parser();
        let mut classifier = Classifier::new(&parser);
        classifier.begin_compile().unwrap();
        let result = classifier.fault(&EngineError::CompileTimeout {
            limit: Duration::from_secs(10),
        });
        assert!(result.is_timeout());
        assert_eq!(classifier.stage(), Stage::RunTimedOut);
    }

    #[test]
    fn missing_toolchain_is_environment_error() {
        let parser = parser();
        let mut classifier = Classifier::new(&parser);
        let err = EngineError::spawn_failed(
            "javac",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let result = classifier.fault(&err);
        assert_eq!(result.exception_type(), Some(ENVIRONMENT_ERROR));
        assert_eq!(
            result.error_message(),
            Some("Java toolchain not found on PATH: javac")
        );
    }

    #[test]
    fn internal_fault_carries_its_kind() {
        let parser = parser();
        let mut classifier = Classifier::new(&parser);
        let result = classifier.fault(&EngineError::internal("boom"));
        assert_eq!(result.exception_type(), Some("InternalError"));
        assert_eq!(result.error_message(), Some("Internal engine error: boom"));
    }

    #[test]
    fn run_cannot_start_before_compile() {
        let parser = parser();
        let mut classifier = Classifier::new(&parser);
        assert!(classifier.begin_run().is_err());
        assert!(classifier.finished(ran(0, "", "")).is_err());
        assert_eq!(classifier.stage(), Stage::Start);
    }
}
