//! javabox: bounded compile-run-classify engine for untrusted Java submissions.
//!
//! A submission is one source file defining a public `Main` class. [`Engine::execute`]
//! writes it into a private sandbox directory, compiles it with `javac`, runs it with
//! `java` under a wall-clock limit, and reports exactly one [`ExecutionResult`]:
//! `Success`, `CompilationError`, `RuntimeError` or `Timeout`. The sandbox is removed
//! on every path, and a program that outlives its limit is killed together with every
//! process it started.
//!
//! ```no_run
//! use javabox::{Engine, EngineConfig, ExecutionResult};
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let source = r#"public class Main {
//!     public static void main(String[] args) { System.out.println("Hello, World!"); }
//! }"#;
//! match engine.execute(source) {
//!     ExecutionResult::Success { output } => assert_eq!(output, "Hello, World!"),
//!     other => eprintln!("{other:?}"),
//! }
//! # Ok::<(), javabox::EngineError>(())
//! ```

#![forbid(unsafe_code)]
// Public entry points are documented; stage internals only where non-obvious.
#![allow(missing_docs)]

pub mod classifier;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod process;
pub mod runner;
pub mod sandbox;
pub mod submission;

pub use crate::config::{load_config_file, EngineConfig};
pub use crate::engine::Engine;
pub use crate::error::{EngineError, EngineResult, ErrorCode};
pub use crate::model::*;
pub use crate::submission::{
    build_hint_prompt, DisabledHints, HintProvider, JsonlSubmissionStore, NullSubmissionStore,
    SubmissionRecord, SubmissionReport, SubmissionService, SubmissionStore,
};
