//! Fixture: stands in for `javac`.
//!
//! Usage: `javabox-fake-javac -d <out dir> [-encoding <enc>] <Name>.java`
//!
//! Follows the `compile-*` directives in the source; otherwise "compiles" by
//! copying the source to `<out dir>/<Name>.class` and exiting 0.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]
#![allow(clippy::exit)]

use javabox_fixtures::{parse_directives, Directive};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let out_dir = flag_value(&args, "-d").map_or_else(|| PathBuf::from("."), PathBuf::from);
    let Some(source_arg) = args.last() else {
        eprintln!("error: no source files");
        process::exit(2);
    };
    let source_path = PathBuf::from(source_arg);
    let source = match fs::read_to_string(&source_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: file not found: {source_arg} ({err})");
            process::exit(2);
        }
    };
    let file_name = source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    for directive in parse_directives(&source) {
        match directive {
            Directive::CompileError { line, message } => {
                eprintln!("{file_name}:{line}: error: {message}");
                eprintln!("        <source line>");
                eprintln!("{file_name}:{}: error: cannot find symbol", line + 2);
                eprintln!("2 errors");
                process::exit(1);
            }
            Directive::CompileErrorOnStdout { line } => {
                println!("{file_name}:{line}: error: illegal start of expression");
                println!("1 error");
                process::exit(1);
            }
            Directive::CompileFailSilent => process::exit(1),
            Directive::CompileHang => loop {
                thread::sleep(Duration::from_secs(60));
            },
            _ => {}
        }
    }

    if let Err(err) = emit_class(&out_dir, &source_path, &source) {
        eprintln!("error: could not write class file: {err}");
        process::exit(1);
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn emit_class(out_dir: &Path, source_path: &Path, source: &str) -> std::io::Result<()> {
    let stem = source_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Main".to_string());
    fs::write(out_dir.join(format!("{stem}.class")), source)
}
