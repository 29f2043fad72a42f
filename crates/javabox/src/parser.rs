//! Diagnostic extraction from compiler and JVM output.
//!
//! Everything here is best-effort enrichment. A pattern that does not match yields
//! `None`; it never changes how an outcome is classified.

use crate::error::{EngineError, EngineResult};
use regex::Regex;

/// Diagnostics pulled from a JVM stack trace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeFault {
    /// Simple exception class name, package prefix dropped.
    pub exception_type: Option<String>,
    /// Line of the first frame inside the submitted source file.
    pub line_number: Option<u32>,
}

/// Patterns compiled once per engine for a fixed entry class.
#[derive(Clone, Debug)]
pub struct DiagnosticParser {
    compile_line: Regex,
    exception_header: Regex,
    source_frame: Regex,
}

impl DiagnosticParser {
    pub fn new(entry_class: &str) -> EngineResult<Self> {
        let name = regex::escape(entry_class);
        Ok(Self {
            // Main.java:3: error: ';' expected
            compile_line: build(&format!(r"\b{name}\.java:(\d+):"))?,
            // Exception in thread "main" java.lang.ArithmeticException: / by zero
            exception_header: build(
                r#"(?mR)^Exception in thread "[^"]+" ([\w.$]+(?:Exception|Error)[\w.$]*)(?::.*)?$"#,
            )?,
            // at Main.main(Main.java:4), at Main$Inner.<init>(Main.java:9), at Main.lambda$main$0(Main.java:5)
            source_frame: build(&format!(
                r"\bat\s+{name}(?:\$[\w$]*)?\.[\w$<>]+\({name}\.java:(\d+)\)"
            ))?,
        })
    }

    /// First line number the compiler reported against the source file.
    pub fn compile_error_line(&self, text: &str) -> Option<u32> {
        first_number(&self.compile_line, text)
    }

    pub fn runtime_fault(&self, stderr: &str) -> RuntimeFault {
        let exception_type = self
            .exception_header
            .captures(stderr)
            .and_then(|caps| caps.get(1))
            .map(|qualified| simple_name(qualified.as_str()).to_string());
        RuntimeFault {
            exception_type,
            line_number: first_number(&self.source_frame, stderr),
        }
    }
}

fn build(pattern: &str) -> EngineResult<Regex> {
    Regex::new(pattern)
        .map_err(|err| EngineError::internal(format!("invalid diagnostic pattern: {err}")))
}

fn first_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// `java.util.concurrent.TimeoutException` -> `TimeoutException`.
fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DiagnosticParser {
        DiagnosticParser::new("Main").unwrap()
    }

    #[test]
    fn compile_line_takes_first_error_only() {
        let text = "Main.java:3: error: ';' expected\n        int x = 1\n                 ^\n\
                    Main.java:7: error: cannot find symbol\n2 errors\n";
        assert_eq!(parser().compile_error_line(text), Some(3));
    }

    #[test]
    fn compile_line_accepts_path_prefix() {
        let text = "/tmp/java_exec/abc/Main.java:12: error: class, interface, enum, or record expected";
        assert_eq!(parser().compile_error_line(text), Some(12));
    }

    #[test]
    fn compile_line_ignores_other_files() {
        assert_eq!(parser().compile_error_line("Other.java:5: error: nope"), None);
        assert_eq!(parser().compile_error_line("XMain.java:5: error: nope"), None);
        assert_eq!(parser().compile_error_line("error: invalid flag"), None);
    }

    #[test]
    fn qualified_exception_reduces_to_simple_name() {
        let stderr = "Exception in thread \"main\" java.lang.ArithmeticException: / by zero\n\
                      \tat Main.main(Main.java:4)\n";
        let fault = parser().runtime_fault(stderr);
        assert_eq!(fault.exception_type.as_deref(), Some("ArithmeticException"));
        assert_eq!(fault.line_number, Some(4));
    }

    #[test]
    fn error_types_and_headers_without_message_match() {
        let stderr = "Exception in thread \"main\" java.lang.StackOverflowError\n\
                      \tat Main.recurse(Main.java:3)\n\tat Main.recurse(Main.java:3)\n";
        let fault = parser().runtime_fault(stderr);
        assert_eq!(fault.exception_type.as_deref(), Some("StackOverflowError"));
        assert_eq!(fault.line_number, Some(3));
    }

    #[test]
    fn library_frames_are_skipped() {
        let stderr = "Exception in thread \"main\" java.lang.NumberFormatException: For input string: \"x\"\n\
                      \tat java.base/java.lang.NumberFormatException.forInputString(NumberFormatException.java:67)\n\
                      \tat java.base/java.lang.Integer.parseInt(Integer.java:662)\n\
                      \tat Main.main(Main.java:9)\n";
        let fault = parser().runtime_fault(stderr);
        assert_eq!(fault.exception_type.as_deref(), Some("NumberFormatException"));
        assert_eq!(fault.line_number, Some(9));
    }

    #[test]
    fn nested_classes_and_lambdas_count_as_source_frames() {
        let stderr = "Exception in thread \"main\" java.lang.IllegalStateException: bad\n\
                      \tat Main$Counter.<init>(Main.java:14)\n\tat Main.main(Main.java:20)\n";
        assert_eq!(parser().runtime_fault(stderr).line_number, Some(14));

        let stderr = "Exception in thread \"main\" java.lang.RuntimeException\n\
                      \tat Main.lambda$main$0(Main.java:5)\n";
        assert_eq!(parser().runtime_fault(stderr).line_number, Some(5));
    }

    #[test]
    fn inner_exception_class_keeps_binary_name() {
        let stderr = "Exception in thread \"main\" com.acme.Outer$BadException: x\n";
        assert_eq!(
            parser().runtime_fault(stderr).exception_type.as_deref(),
            Some("Outer$BadException")
        );
    }

    #[test]
    fn header_on_later_line_and_crlf_are_found() {
        let stderr = "warning: something\r\nException in thread \"worker-1\" java.lang.NullPointerException\r\n\
                      \tat Main.run(Main.java:8)\r\n";
        let fault = parser().runtime_fault(stderr);
        assert_eq!(fault.exception_type.as_deref(), Some("NullPointerException"));
        assert_eq!(fault.line_number, Some(8));
    }

    #[test]
    fn unrecognised_text_degrades_to_absent_fields() {
        assert_eq!(parser().runtime_fault("Segmentation fault"), RuntimeFault::default());
        assert_eq!(parser().runtime_fault(""), RuntimeFault::default());
        // a header that names neither an Exception nor an Error
        let fault = parser().runtime_fault("Exception in thread \"main\" java.lang.Throwable: x");
        assert_eq!(fault.exception_type, None);
    }

    #[test]
    fn entry_class_is_escaped() {
        let parser = DiagnosticParser::new("Ma$in").unwrap();
        assert_eq!(parser.compile_error_line("Ma$in.java:2: error: x"), Some(2));
        assert_eq!(parser.compile_error_line("Maxin.java:2: error: x"), None);
    }
}
