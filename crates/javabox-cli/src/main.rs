//! javabox CLI: compile and run a single-file Java submission under strict bounds.
//!
//! Every business outcome (success, compile error, runtime error, timeout) exits 0;
//! a non-zero exit means the CLI itself was misused or misconfigured.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use javabox::{
    load_config_file, DisabledHints, Engine, EngineConfig, ExecutionResult, JsonlSubmissionStore,
    NullSubmissionStore, SubmissionReport, SubmissionService, SubmissionStore,
};
use miette::{miette, IntoDiagnostic, Result};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "javabox",
    version,
    about = "Compile and run untrusted Java submissions under strict bounds"
)]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    /// Log pipeline stages to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags layered over the config file (or the defaults).
#[derive(Debug, clap::Args)]
struct EngineArgs {
    #[arg(long, global = true, help = "Engine config file (JSON, or YAML by extension)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory under which sandboxes are created")]
    sandbox_root: Option<PathBuf>,
    #[arg(long, global = true, help = "Compiler executable")]
    javac: Option<String>,
    #[arg(long, global = true, help = "Runtime executable")]
    java: Option<String>,
    #[arg(long, global = true, help = "Compile wall-clock limit in milliseconds")]
    compile_timeout_ms: Option<u64>,
    #[arg(long, global = true, help = "Run wall-clock limit in milliseconds")]
    run_timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute a Java source file and print the outcome
    Exec {
        #[arg(long)]
        json: bool,
        #[arg(help = "Source file, or '-' for stdin", default_value = "-")]
        file: PathBuf,
    },
    /// Execute a submission, ask for a hint on failure, and archive it
    Submit {
        #[arg(long)]
        json: bool,
        #[arg(long, help = "Opaque submitter identifier")]
        user: String,
        #[arg(long, help = "Append the submission to this JSONL file")]
        store: Option<PathBuf>,
        #[arg(help = "Source file, or '-' for stdin", default_value = "-")]
        file: PathBuf,
    },
    /// Print the effective engine configuration
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) -> bool {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // Respect NO_COLOR environment variable
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                // Check if stderr supports color (where we output diagnostics)
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
    use_color
}

/// Logs go to stderr; `RUST_LOG` wins, otherwise `warn` (or `debug` with `-v`).
fn configure_logging(verbose: bool, use_color: bool) {
    let default_level = if verbose { "javabox=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let use_color = configure_colors(cli.color);
    configure_logging(cli.verbose, use_color);
    match cli.command {
        Commands::Exec { json, file } => cmd_exec(&cli.engine, json, &file),
        Commands::Submit {
            json,
            user,
            store,
            file,
        } => cmd_submit(&cli.engine, json, &user, store, &file),
        Commands::Config { json } => cmd_config(&cli.engine, json),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

fn cmd_exec(args: &EngineArgs, json: bool, file: &Path) -> Result<()> {
    let engine = Engine::new(effective_config(args)?)?;
    let source = read_source(file)?;
    let result = engine.execute(&source);
    if json {
        println!("{}", serde_json::to_string(&result).into_diagnostic()?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn cmd_submit(
    args: &EngineArgs,
    json: bool,
    user: &str,
    store: Option<PathBuf>,
    file: &Path,
) -> Result<()> {
    let user = user.trim();
    if user.is_empty() {
        return Err(miette!("--user must not be empty"));
    }
    let source = read_source(file)?;
    if source.trim().is_empty() {
        return Err(miette!("submission source must not be empty"));
    }
    let engine = Engine::new(effective_config(args)?)?;
    let store: Box<dyn SubmissionStore> = match store {
        Some(path) => Box::new(JsonlSubmissionStore::open(path)?),
        None => Box::new(NullSubmissionStore),
    };
    let service = SubmissionService::new(engine, store, Box::new(DisabledHints));
    let report = service.submit(user, &source);
    if json {
        println!("{}", serde_json::to_string(&report).into_diagnostic()?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn cmd_config(args: &EngineArgs, json: bool) -> Result<()> {
    let config = effective_config(args)?;
    config.validate()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config).into_diagnostic()?);
    } else {
        println!("sandbox_root:       {}", config.sandbox_root.display());
        println!("entry_class:        {}", config.entry_class);
        println!("javac:              {}", config.javac);
        println!("java:               {}", config.java);
        println!("compile_timeout_ms: {}", config.compile_timeout.as_millis());
        println!("run_timeout_ms:     {}", config.run_timeout.as_millis());
        println!("drain_timeout_ms:   {}", config.drain_timeout.as_millis());
        println!("jvm_args:           {}", config.jvm_args.join(" "));
        println!("max_output_bytes:   {}", config.max_output_bytes);
        println!("env_passthrough:    {}", config.env_passthrough.join(", "));
    }
    Ok(())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn effective_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => {
            debug!(path = %path.display(), "loading engine config");
            load_config_file(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(root) = &args.sandbox_root {
        config.sandbox_root.clone_from(root);
    }
    if let Some(javac) = &args.javac {
        config.javac.clone_from(javac);
    }
    if let Some(java) = &args.java {
        config.java.clone_from(java);
    }
    if let Some(ms) = args.compile_timeout_ms {
        config.compile_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.run_timeout_ms {
        config.run_timeout = Duration::from_millis(ms);
    }
    Ok(config)
}

fn read_source(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source).into_diagnostic()?;
        return Ok(source);
    }
    std::fs::read_to_string(file)
        .map_err(|err| miette!("failed to read {}: {err}", file.display()))
}

fn print_result(result: &ExecutionResult) {
    println!("status: {}", result.status());
    if let Some(kind) = result.exception_type() {
        println!("exception: {kind}");
    }
    if let Some(line) = result.line_number() {
        println!("line: {line}");
    }
    if let Some(message) = result.error_message() {
        println!("error: {message}");
    }
    if let Some(output) = result.output().filter(|output| !output.is_empty()) {
        println!("--- output ---");
        println!("{output}");
    }
}

fn print_report(report: &SubmissionReport) {
    println!("user: {}", report.submitter_id);
    print_result(&report.execution);
    if let Some(hint) = &report.hint {
        println!("hint: {hint}");
    }
}
