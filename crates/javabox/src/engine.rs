//! The public compile-run-classify pipeline.

use crate::classifier::Classifier;
use crate::compiler;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::model::ExecutionResult;
use crate::parser::DiagnosticParser;
use crate::process::{platform_terminator, ProcessGroupTerminator};
use crate::runner;
use crate::sandbox::Sandbox;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, field, info, info_span, Span};

/// `exception_type` reported when the pipeline itself panicked.
pub const PANIC_MARKER: &str = "Panic";

/// Executes single-file Java submissions.
///
/// An engine holds only read-only configuration, so one instance can serve any
/// number of concurrent [`execute`](Engine::execute) calls; each call gets its own
/// sandbox.
#[derive(Clone, Debug)]
pub struct Engine {
    config: Arc<EngineConfig>,
    parser: DiagnosticParser,
    terminator: Arc<dyn ProcessGroupTerminator>,
}

impl Engine {
    /// Validate `config` and build an engine using the host's process-group backend.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_terminator(config, platform_terminator())
    }

    pub fn with_terminator(
        config: EngineConfig,
        terminator: Arc<dyn ProcessGroupTerminator>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let parser = DiagnosticParser::new(&config.entry_class)?;
        Ok(Self {
            config: Arc::new(config),
            parser,
            terminator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile and run `source`, returning exactly one outcome.
    ///
    /// Never fails and never panics: toolchain problems, I/O faults and panics
    /// inside the pipeline are all reported as [`ExecutionResult::RuntimeError`].
    /// The sandbox is gone by the time this returns.
    pub fn execute(&self, source: &str) -> ExecutionResult {
        let span = info_span!("execute", sandbox = field::Empty);
        let _entered = span.enter();
        let started = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute_in_sandbox(source, &span)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "execution pipeline panicked");
            ExecutionResult::engine_fault(format!("Internal engine error: {message}"), PANIC_MARKER)
        });

        info!(
            status = %result.status(),
            elapsed_ms = started.elapsed().as_millis(),
            "execution finished"
        );
        result
    }

    fn execute_in_sandbox(&self, source: &str, span: &Span) -> ExecutionResult {
        let mut classifier = Classifier::new(&self.parser);
        let mut sandbox = match Sandbox::acquire(&self.config.sandbox_root) {
            Ok(sandbox) => sandbox,
            Err(err) => return classifier.fault(&err),
        };
        span.record("sandbox", field::display(sandbox.id()));
        info!(source_bytes = source.len(), "execution started");

        let result = self
            .pipeline(&mut classifier, &sandbox, source)
            .unwrap_or_else(|err| classifier.fault(&err));
        sandbox.release();
        result
    }

    fn pipeline(
        &self,
        classifier: &mut Classifier<'_>,
        sandbox: &Sandbox,
        source: &str,
    ) -> EngineResult<ExecutionResult> {
        classifier.begin_compile()?;
        let compiled = compiler::compile(&self.config, &*self.terminator, sandbox, source)?;
        if let Some(result) = classifier.compiled(&compiled)? {
            return Ok(result);
        }
        classifier.begin_run()?;
        let outcome = runner::run(&self.config, &*self.terminator, sandbox)?;
        classifier.finished(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
