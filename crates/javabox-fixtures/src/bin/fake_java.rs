//! Fixture: stands in for `java`.
//!
//! Usage: `javabox-fake-java [jvm flags] -cp <dir> <Class>`
//!        `javabox-fake-java --hold` (internal: sleep while holding inherited pipes)
//!
//! Loads `<dir>/<Class>.class` (a copy of the source written by the fake compiler)
//! and runs its directives in order.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]
#![allow(clippy::exit)]

use javabox_fixtures::{parse_directives, Directive};
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{self, Command, Stdio};
use std::thread;
use std::time::Duration;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.first().is_some_and(|arg| arg == "--hold") {
        hold();
    }

    let classpath = args
        .iter()
        .position(|arg| arg == "-cp")
        .and_then(|index| args.get(index + 1))
        .map_or_else(|| PathBuf::from("."), PathBuf::from);
    let class_name = args.last().cloned().unwrap_or_default();
    let Ok(program) = fs::read_to_string(classpath.join(format!("{class_name}.class"))) else {
        eprintln!("Error: Could not find or load main class {class_name}");
        eprintln!("Caused by: java.lang.ClassNotFoundException: {class_name}");
        process::exit(1);
    };

    for directive in parse_directives(&program) {
        run(directive);
    }
}

fn run(directive: Directive) {
    match directive {
        Directive::Print(text) => println!("{text}"),
        Directive::Stderr(text) => eprintln!("{text}"),
        Directive::Throw {
            class,
            line,
            message,
        } => {
            let _ = io::stdout().flush();
            match message {
                Some(message) => eprintln!("Exception in thread \"main\" {class}: {message}"),
                None => eprintln!("Exception in thread \"main\" {class}"),
            }
            eprintln!("\tat java.base/java.util.Objects.checkIndex(Objects.java:385)");
            eprintln!("\tat Main.main(Main.java:{line})");
            process::exit(1);
        }
        Directive::Exit(code) => {
            let _ = io::stdout().flush();
            process::exit(code);
        }
        Directive::Loop => loop {
            thread::sleep(Duration::from_millis(5));
        },
        Directive::SpawnHolder { pid_file } => spawn_sleeper(pid_file, false),
        Directive::SpawnDetached { pid_file } => spawn_sleeper(pid_file, true),
        Directive::Env(name) => match env::var(&name) {
            Ok(value) => println!("{name}={value}"),
            Err(_) => println!("{name} unset"),
        },
        Directive::Cwd => match env::current_dir() {
            Ok(dir) => println!("{}", dir.display()),
            Err(err) => eprintln!("cwd: {err}"),
        },
        Directive::ReadStdin => {
            let mut buf = Vec::new();
            let count = io::stdin().read_to_end(&mut buf).unwrap_or(0);
            println!("stdin: {count} bytes");
        }
        Directive::Flood(bytes) => {
            let chunk = [b'x'; 4096];
            let mut stdout = io::stdout().lock();
            let mut left = bytes;
            while left > 0 {
                let take = left.min(chunk.len());
                let Some(slice) = chunk.get(..take) else {
                    break;
                };
                if stdout.write_all(slice).is_err() {
                    break;
                }
                left -= take;
            }
        }
        Directive::CompileError { .. }
        | Directive::CompileErrorOnStdout { .. }
        | Directive::CompileFailSilent
        | Directive::CompileHang => {}
    }
}

/// Start a descendant that outlives this process. It inherits stdout/stderr
/// unless `detached`, in which case all of its stdio is null.
fn spawn_sleeper(pid_file: Option<PathBuf>, detached: bool) {
    let Ok(exe) = env::current_exe() else {
        eprintln!("spawn: cannot locate own executable");
        process::exit(3);
    };
    let mut command = Command::new(exe);
    command.arg("--hold");
    if detached {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
    }
    match command.spawn() {
        Ok(child) => {
            if let Some(path) = pid_file {
                let _ = fs::write(path, child.id().to_string());
            }
        }
        Err(err) => {
            eprintln!("spawn: {err}");
            process::exit(3);
        }
    }
}

fn hold() -> ! {
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
