//! Submission boundary: the collaborators that consume an [`ExecutionResult`].
//!
//! A [`SubmissionService`] runs a submission through the [`Engine`], asks a
//! [`HintProvider`] for advice when the outcome is not a success, and hands the
//! triple `(submitter, source, result)` to a [`SubmissionStore`]. Neither
//! collaborator can change the result: their failures are logged and dropped.

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::model::{ExecutionResult, ExecutionStatus};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Write-only archive of submissions.
pub trait SubmissionStore: Send + Sync {
    fn record(&self, submitter_id: &str, source: &str, result: &ExecutionResult)
        -> EngineResult<()>;
}

/// Source of advisory hints for failed submissions.
pub trait HintProvider: Send + Sync {
    fn hint(&self, source: &str, result: &ExecutionResult) -> EngineResult<Option<String>>;
}

/// One archived submission, as written by [`JsonlSubmissionStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submitter_id: String,
    pub code: String,
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub submitted_at_ms: u64,
}

impl SubmissionRecord {
    pub fn new(submitter_id: &str, source: &str, result: &ExecutionResult) -> Self {
        let submitted_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            submitter_id: submitter_id.to_string(),
            code: source.to_string(),
            status: result.status(),
            output: result.output().map(str::to_string),
            error: result.error_message().map(str::to_string),
            line_number: result.line_number(),
            exception_type: result.exception_type().map(str::to_string),
            submitted_at_ms,
        }
    }
}

/// Appends one JSON document per submission to a file.
#[derive(Debug)]
pub struct JsonlSubmissionStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSubmissionStore {
    pub fn open(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                EngineError::io_at("failed to create store directory", parent, err)
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| EngineError::io_at("failed to open submission store", &path, err))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SubmissionStore for JsonlSubmissionStore {
    fn record(
        &self,
        submitter_id: &str,
        source: &str,
        result: &ExecutionResult,
    ) -> EngineResult<()> {
        let record = SubmissionRecord::new(submitter_id, source, result);
        let mut line = serde_json::to_string(&record)
            .map_err(|err| EngineError::internal(format!("failed to encode submission: {err}")))?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| EngineError::internal("submission store lock poisoned"))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| EngineError::io_at("failed to append submission", &self.path, err))
    }
}

/// Discards every submission.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSubmissionStore;

impl SubmissionStore for NullSubmissionStore {
    fn record(&self, _: &str, _: &str, _: &ExecutionResult) -> EngineResult<()> {
        Ok(())
    }
}

/// Hint generation switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledHints;

impl HintProvider for DisabledHints {
    fn hint(&self, _: &str, _: &ExecutionResult) -> EngineResult<Option<String>> {
        Ok(None)
    }
}

/// Tutor prompt for a failed submission, for providers backed by a language model.
pub fn build_hint_prompt(source: &str, result: &ExecutionResult) -> String {
    let location = result
        .line_number()
        .map(|line| format!(" at line {line}"))
        .unwrap_or_default();
    let exception = result
        .exception_type()
        .map(|kind| format!(" ({kind})"))
        .unwrap_or_default();
    let message = result.error_message().unwrap_or_default();
    format!(
        "You are a helpful Java programming tutor.\n\n\
         A student submitted the following Java code:\n\n\
         ```java\n{source}\n```\n\n\
         Execution result: {status}{exception}{location}.\n\
         Error message: {message}\n\n\
         Give the student a short, encouraging hint (2-3 sentences) that helps them \
         understand and fix the problem without revealing the complete solution.",
        status = result.status(),
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub submitter_id: String,
    pub execution: ExecutionResult,
    pub hint: Option<String>,
}

pub struct SubmissionService {
    engine: Engine,
    store: Box<dyn SubmissionStore>,
    hints: Box<dyn HintProvider>,
}

impl SubmissionService {
    pub fn new(
        engine: Engine,
        store: Box<dyn SubmissionStore>,
        hints: Box<dyn HintProvider>,
    ) -> Self {
        Self {
            engine,
            store,
            hints,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn submit(&self, submitter_id: &str, source: &str) -> SubmissionReport {
        let execution = self.engine.execute(source);

        let hint = if execution.is_success() {
            None
        } else {
            self.hints.hint(source, &execution).unwrap_or_else(|err| {
                warn!(submitter = submitter_id, error = %err, "hint generation failed");
                None
            })
        };

        match self.store.record(submitter_id, source, &execution) {
            Ok(()) => debug!(
                submitter = submitter_id,
                status = %execution.status(),
                "submission recorded"
            ),
            Err(err) => {
                warn!(submitter = submitter_id, error = %err, "failed to record submission");
            }
        }

        SubmissionReport {
            submitter_id: submitter_id.to_string(),
            execution,
            hint,
        }
    }
}

impl std::fmt::Debug for SubmissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionService")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
