//! Engine error type.
//!
//! Every fault the pipeline can hit while compiling or running a submission is an
//! [`EngineError`]. None of them escape [`Engine::execute`](crate::Engine::execute):
//! the classifier folds each one into an [`ExecutionResult`](crate::ExecutionResult).
//! Ordinary student mistakes (a failed compile, a crashing program, a program that
//! runs too long) are outcomes, not errors, and never appear here.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Stable machine-readable error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// `E_COMPILE_TIMEOUT`
    #[serde(rename = "E_COMPILE_TIMEOUT")]
    CompileTimeout,
    /// `E_TOOLCHAIN_MISSING`
    #[serde(rename = "E_TOOLCHAIN_MISSING")]
    ToolchainMissing,
    /// `E_IO`
    #[serde(rename = "E_IO")]
    Io,
    /// `E_INVALID_CONFIG`
    #[serde(rename = "E_INVALID_CONFIG")]
    InvalidConfig,
    /// `E_INTERNAL`
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompileTimeout => "E_COMPILE_TIMEOUT",
            Self::ToolchainMissing => "E_TOOLCHAIN_MISSING",
            Self::Io => "E_IO",
            Self::InvalidConfig => "E_INVALID_CONFIG",
            Self::Internal => "E_INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// The compiler did not finish inside the compile timeout.
    #[error("compiler did not finish within {}ms", .limit.as_millis())]
    #[diagnostic(
        code(javabox::compile_timeout),
        help("a compile this slow points at the toolchain or host, not the submission")
    )]
    CompileTimeout { limit: Duration },

    /// The compiler or runtime executable could not be launched.
    #[error("Java toolchain not found on PATH: {program}")]
    #[diagnostic(
        code(javabox::toolchain_missing),
        help("install a JDK or point the engine at it with --javac/--java")
    )]
    ToolchainMissing {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    #[diagnostic(code(javabox::io))]
    Io {
        context: String,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine configuration: {message}")]
    #[diagnostic(code(javabox::invalid_config))]
    InvalidConfig { message: String },

    #[error("{message}")]
    #[diagnostic(code(javabox::internal))]
    Internal { message: String },
}

impl EngineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: None,
            source,
        }
    }

    pub fn io_at(
        context: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            context: context.into(),
            path: Some(path.into()),
            source,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify a spawn failure: a missing executable is an environment fault,
    /// anything else is an I/O fault.
    pub fn spawn_failed(program: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::ToolchainMissing {
                program: program.to_string(),
                source,
            }
        } else {
            Self::io(format!("failed to launch {program}"), source)
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CompileTimeout { .. } => ErrorCode::CompileTimeout,
            Self::ToolchainMissing { .. } => ErrorCode::ToolchainMissing,
            Self::Io { .. } => ErrorCode::Io,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Name reported as `exception_type` when this fault is surfaced as a
    /// runtime error.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::CompileTimeout { .. } => "CompileTimeout",
            Self::ToolchainMissing { .. } => "EnvironmentError",
            Self::Io { .. } => "IoError",
            Self::InvalidConfig { .. } => "ConfigError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_spawn_is_toolchain_missing() {
        let err = EngineError::spawn_failed(
            "javac",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.code(), ErrorCode::ToolchainMissing);
        assert_eq!(err.kind_name(), "EnvironmentError");
        assert!(err.to_string().contains("javac"));
    }

    #[test]
    fn other_spawn_failures_are_io() {
        let err = EngineError::spawn_failed(
            "java",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code(), ErrorCode::Io);
        assert_eq!(err.kind_name(), "IoError");
    }

    #[test]
    fn error_codes_serialize_as_e_codes() {
        let json = serde_json::to_string(&ErrorCode::CompileTimeout).unwrap();
        assert_eq!(json, "\"E_COMPILE_TIMEOUT\"");
        assert_eq!(ErrorCode::InvalidConfig.to_string(), "E_INVALID_CONFIG");
    }
}
