//! Test utilities and a fake Java toolchain for javabox integration tests.
//!
//! The two binaries stand in for `javac` and `java`. Instead of Java semantics they
//! follow `//@` directives embedded in the submitted source, which lets tests drive
//! every pipeline path without a JDK:
//!
//! - [`directives`] - the directive language shared by both binaries
//! - [`fake_program`] - build a submission from directives
//! - [`fake_engine`] - an engine wired to the fake toolchain under a temp root
//! - [`process_is_gone`] - check that a descendant did not survive a timeout
//!
//! # Example
//!
//! ```ignore
//! use javabox_fixtures::{fake_engine, fake_program, FakeToolchain};
//!
//! let toolchain = FakeToolchain::new(env!("CARGO_BIN_EXE_javabox-fake-javac"),
//!                                    env!("CARGO_BIN_EXE_javabox-fake-java"));
//! let (engine, _root) = fake_engine(&toolchain, |config| config);
//! let result = engine.execute(&fake_program(&["print Hello, World!"]));
//! assert!(result.is_success());
//! ```

// Test fixtures crate - relaxed lints for test utilities
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]
#![allow(missing_docs)]

pub mod directives;
pub mod helpers;

pub use directives::{parse_directives, Directive};
pub use helpers::{
    fake_engine, fake_program, process_is_gone, sandbox_entries, wait_until_gone, FakeToolchain,
};
