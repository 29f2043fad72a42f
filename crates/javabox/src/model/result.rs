use serde::{Deserialize, Serialize};
use std::fmt;

/// Message carried by every [`ExecutionResult::Timeout`].
pub const TIMEOUT_MESSAGE: &str = "Execution time exceeded limit";

/// The sole externally visible artifact of one invocation.
///
/// Serialized with a `status` tag; fields that do not belong to the active variant
/// never appear, and optional diagnostics are omitted when absent.
///
/// ```json
/// {"status": "RuntimeError", "error_message": "Exception in thread \"main\" ...",
///  "exception_type": "ArithmeticException", "line_number": 4}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ExecutionResult {
    /// The program compiled, ran to completion and wrote nothing to stderr.
    Success {
        /// Trimmed standard output.
        output: String,
    },
    /// The compiler rejected the submission.
    CompilationError {
        /// Compiler diagnostics (stderr, or stdout when stderr was empty).
        #[serde(rename = "error_message")]
        message: String,
        /// First line number the compiler reported against the source file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_number: Option<u32>,
    },
    /// The program faulted, or the engine itself could not complete the run.
    RuntimeError {
        /// First line of stderr, or a fallback / engine fault description.
        #[serde(rename = "error_message")]
        message: String,
        /// Simple (unqualified) exception class name, or an engine fault marker.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exception_type: Option<String>,
        /// Line of the first stack frame inside the submitted source file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_number: Option<u32>,
        /// Trimmed stdout produced before the fault, when there was any.
        #[serde(rename = "output", default, skip_serializing_if = "Option::is_none")]
        partial_output: Option<String>,
    },
    /// A stage exceeded its wall-clock bound.
    Timeout {
        #[serde(rename = "error_message")]
        message: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    CompilationError,
    RuntimeError,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::CompilationError => "CompilationError",
            Self::RuntimeError => "RuntimeError",
            Self::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExecutionResult {
    pub fn timeout() -> Self {
        Self::Timeout {
            message: TIMEOUT_MESSAGE.to_string(),
        }
    }

    /// A runtime error raised by the engine rather than by the program.
    pub fn engine_fault(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::RuntimeError {
            message: message.into(),
            exception_type: Some(kind.into()),
            line_number: None,
            partial_output: None,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Success { .. } => ExecutionStatus::Success,
            Self::CompilationError { .. } => ExecutionStatus::CompilationError,
            Self::RuntimeError { .. } => ExecutionStatus::RuntimeError,
            Self::Timeout { .. } => ExecutionStatus::Timeout,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Lets a request layer pick a distinct transport status for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Error message; `None` for [`ExecutionResult::Success`].
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::CompilationError { message, .. }
            | Self::RuntimeError { message, .. }
            | Self::Timeout { message } => Some(message),
        }
    }

    /// Full output on success, partial output on a runtime error.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success { output } => Some(output),
            Self::RuntimeError { partial_output, .. } => partial_output.as_deref(),
            Self::CompilationError { .. } | Self::Timeout { .. } => None,
        }
    }

    pub fn line_number(&self) -> Option<u32> {
        match self {
            Self::CompilationError { line_number, .. } | Self::RuntimeError { line_number, .. } => {
                *line_number
            }
            Self::Success { .. } | Self::Timeout { .. } => None,
        }
    }

    pub fn exception_type(&self) -> Option<&str> {
        match self {
            Self::RuntimeError { exception_type, .. } => exception_type.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_serializes_output_only() {
        let value = serde_json::to_value(ExecutionResult::Success {
            output: "Hello, World!".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"status": "Success", "output": "Hello, World!"}));
    }

    #[test]
    fn compilation_error_never_carries_exception_type() {
        let value = serde_json::to_value(ExecutionResult::CompilationError {
            message: "Main.java:3: error: ';' expected".to_string(),
            line_number: Some(3),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "status": "CompilationError",
                "error_message": "Main.java:3: error: ';' expected",
                "line_number": 3
            })
        );
    }

    #[test]
    fn runtime_error_omits_absent_diagnostics() {
        let result = ExecutionResult::RuntimeError {
            message: "Runtime error".to_string(),
            exception_type: None,
            line_number: None,
            partial_output: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"status": "RuntimeError", "error_message": "Runtime error"})
        );
        assert_eq!(result.output(), None);
    }

    #[test]
    fn runtime_error_partial_output_uses_output_key() {
        let result = ExecutionResult::RuntimeError {
            message: "boom".to_string(),
            exception_type: Some("ArrayIndexOutOfBoundsException".to_string()),
            line_number: Some(6),
            partial_output: Some("Line 1\nLine 2".to_string()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["output"], "Line 1\nLine 2");
        let back: ExecutionResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn timeout_has_fixed_message_and_no_output() {
        let result = ExecutionResult::timeout();
        assert!(result.is_timeout());
        assert_eq!(result.error_message(), Some(TIMEOUT_MESSAGE));
        assert_eq!(result.output(), None);
        assert_eq!(result.status().to_string(), "Timeout");
    }
}
