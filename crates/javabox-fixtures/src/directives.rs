//! `//@` directives understood by the fake toolchain.
//!
//! Each directive is a comment line of the form `//@<keyword> <argument>`. The fake
//! `javac` acts on the `compile-*` directives; the fake `java` runs the others in
//! source order.
//!
//! | Directive | Effect |
//! |---|---|
//! | `compile-error <line> [message]` | two `Main.java:<n>: error:` diagnostics on stderr, exit 1 |
//! | `compile-error-stdout <line>` | same diagnostic, printed on stdout instead |
//! | `compile-fail-silent` | exit 1 without output |
//! | `compile-hang` | compiler never finishes |
//! | `print <text>` | line on stdout |
//! | `stderr <text>` | line on stderr; exit status is unaffected |
//! | `throw <class> <line> [message]` | JVM-style stack trace on stderr, exit 1 |
//! | `exit <code>` | exit immediately |
//! | `loop` | spin forever |
//! | `spawn-holder [pid file]` | start a descendant that inherits stdout/stderr and sleeps |
//! | `spawn-detached [pid file]` | start a sleeping descendant with null stdio |
//! | `env <NAME>` | print `NAME=<value>` or `NAME unset` |
//! | `cwd` | print the working directory |
//! | `read-stdin` | read stdin to EOF and print the byte count |
//! | `flood <bytes>` | write that many bytes to stdout |

use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    CompileError { line: u32, message: String },
    CompileErrorOnStdout { line: u32 },
    CompileFailSilent,
    CompileHang,
    Print(String),
    Stderr(String),
    Throw {
        class: String,
        line: u32,
        message: Option<String>,
    },
    Exit(i32),
    Loop,
    SpawnHolder { pid_file: Option<PathBuf> },
    SpawnDetached { pid_file: Option<PathBuf> },
    Env(String),
    Cwd,
    ReadStdin,
    Flood(usize),
}

impl Directive {
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            Self::CompileError { .. }
                | Self::CompileErrorOnStdout { .. }
                | Self::CompileFailSilent
                | Self::CompileHang
        )
    }
}

/// Directives in source order. Unknown keywords are ignored.
pub fn parse_directives(source: &str) -> Vec<Directive> {
    source
        .lines()
        .filter_map(|line| line.trim().strip_prefix("//@"))
        .filter_map(parse_one)
        .collect()
}

fn parse_one(body: &str) -> Option<Directive> {
    let (keyword, rest) = body
        .trim()
        .split_once(char::is_whitespace)
        .map_or((body.trim(), ""), |(k, r)| (k, r.trim()));
    let directive = match keyword {
        "compile-error" => {
            let (line, message) = split_number(rest)?;
            Directive::CompileError {
                line,
                message: message.unwrap_or_else(|| "';' expected".to_string()),
            }
        }
        "compile-error-stdout" => Directive::CompileErrorOnStdout {
            line: rest.parse().ok()?,
        },
        "compile-fail-silent" => Directive::CompileFailSilent,
        "compile-hang" => Directive::CompileHang,
        "print" => Directive::Print(rest.to_string()),
        "stderr" => Directive::Stderr(rest.to_string()),
        "throw" => {
            let (class, rest) = rest.split_once(char::is_whitespace)?;
            let (line, message) = split_number(rest.trim())?;
            Directive::Throw {
                class: class.to_string(),
                line,
                message,
            }
        }
        "exit" => Directive::Exit(rest.parse().ok()?),
        "loop" => Directive::Loop,
        "spawn-holder" => Directive::SpawnHolder {
            pid_file: (!rest.is_empty()).then(|| PathBuf::from(rest)),
        },
        "spawn-detached" => Directive::SpawnDetached {
            pid_file: (!rest.is_empty()).then(|| PathBuf::from(rest)),
        },
        "env" => Directive::Env(rest.to_string()),
        "cwd" => Directive::Cwd,
        "read-stdin" => Directive::ReadStdin,
        "flood" => Directive::Flood(rest.parse().ok()?),
        _ => return None,
    };
    Some(directive)
}

/// `"4 / by zero"` -> `(4, Some("/ by zero"))`.
fn split_number(text: &str) -> Option<(u32, Option<String>)> {
    let (number, tail) = text
        .split_once(char::is_whitespace)
        .map_or((text, ""), |(n, t)| (n, t.trim()));
    let number = number.parse().ok()?;
    Some((number, (!tail.is_empty()).then(|| tail.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directives_in_order() {
        let source = "//@print Line 1\n  //@print Line 2\n\
                      //@throw java.lang.ArithmeticException 4 / by zero\n\
                      public class Main {}\n";
        assert_eq!(
            parse_directives(source),
            vec![
                Directive::Print("Line 1".to_string()),
                Directive::Print("Line 2".to_string()),
                Directive::Throw {
                    class: "java.lang.ArithmeticException".to_string(),
                    line: 4,
                    message: Some("/ by zero".to_string()),
                },
            ]
        );
    }

    #[test]
    fn bare_keywords_and_defaults() {
        let parsed = parse_directives("//@loop\n//@compile-error 3\n//@spawn-holder\n//@bogus x\n");
        assert_eq!(
            parsed,
            vec![
                Directive::Loop,
                Directive::CompileError {
                    line: 3,
                    message: "';' expected".to_string()
                },
                Directive::SpawnHolder { pid_file: None },
            ]
        );
        assert!(parsed[1].is_compile_time());
        assert!(!parsed[0].is_compile_time());
    }

    #[test]
    fn spawn_directives_take_an_optional_pid_file() {
        assert_eq!(
            parse_directives("//@spawn-detached /tmp/d.pid\n//@spawn-detached\n"),
            vec![
                Directive::SpawnDetached {
                    pid_file: Some(PathBuf::from("/tmp/d.pid"))
                },
                Directive::SpawnDetached { pid_file: None },
            ]
        );
    }

    #[test]
    fn malformed_numbers_are_dropped() {
        assert!(parse_directives("//@exit nope\n//@throw Foo\n").is_empty());
    }
}
