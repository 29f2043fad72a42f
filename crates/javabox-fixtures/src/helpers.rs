//! Common test helper functions.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use javabox::{Engine, EngineConfig};
use tempfile::TempDir;

/// Paths to the fake `javac` and `java` binaries.
#[derive(Clone, Debug)]
pub struct FakeToolchain {
    pub javac: PathBuf,
    pub java: PathBuf,
}

impl FakeToolchain {
    pub fn new(javac: impl Into<PathBuf>, java: impl Into<PathBuf>) -> Self {
        Self {
            javac: javac.into(),
            java: java.into(),
        }
    }

    /// Locate both binaries in `dir` (normally the directory of a sibling binary
    /// under `target/<profile>`). `None` if either is missing.
    pub fn in_dir(dir: &Path) -> Option<Self> {
        let suffix = std::env::consts::EXE_SUFFIX;
        let toolchain = Self::new(
            dir.join(format!("javabox-fake-javac{suffix}")),
            dir.join(format!("javabox-fake-java{suffix}")),
        );
        (toolchain.javac.is_file() && toolchain.java.is_file()).then_some(toolchain)
    }
}

/// Build a submission whose behaviour under the fake toolchain is given by
/// `directives` (written without the `//@` prefix).
#[must_use]
pub fn fake_program(directives: &[&str]) -> String {
    let mut source = String::new();
    for directive in directives {
        source.push_str("//@");
        source.push_str(directive);
        source.push('\n');
    }
    source.push_str("public class Main {\n    public static void main(String[] args) {}\n}\n");
    source
}

/// An engine using the fake toolchain, with short timeouts and a private sandbox
/// root. `customize` can adjust the config before the engine is built. The returned
/// [`TempDir`] owns the root; keep it alive for the duration of the test.
pub fn fake_engine(
    toolchain: &FakeToolchain,
    customize: impl FnOnce(EngineConfig) -> EngineConfig,
) -> (Engine, TempDir) {
    let root = tempfile::Builder::new()
        .prefix("javabox-test-")
        .tempdir()
        .expect("failed to create sandbox root");
    let mut config = EngineConfig::default()
        .with_sandbox_root(root.path())
        .with_toolchain(
            toolchain.javac.display().to_string(),
            toolchain.java.display().to_string(),
        )
        .with_compile_timeout(Duration::from_secs(5))
        .with_run_timeout(Duration::from_millis(800));
    config.drain_timeout = Duration::from_secs(1);
    let engine = Engine::new(customize(config)).expect("invalid fake engine config");
    (engine, root)
}

/// Entries currently under a sandbox root.
pub fn sandbox_entries(root: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(root)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

/// `true` when `pid` no longer names a live process. A zombie awaiting its
/// reaper counts as gone.
#[cfg(unix)]
pub fn process_is_gone(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return true;
    };
    match kill(Pid::from_raw(raw), None) {
        Err(Errno::ESRCH) => true,
        Err(_) => false,
        Ok(()) => is_zombie(pid),
    }
}

#[cfg(not(unix))]
pub fn process_is_gone(_pid: u32) -> bool {
    true
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // state is the first field after the parenthesised command name
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let (_, after) = stat.rsplit_once(')')?;
            after.trim_start().chars().next()
        })
        .is_some_and(|state| state == 'Z' || state == 'X')
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Poll [`process_is_gone`] until it holds or `timeout` passes.
pub fn wait_until_gone(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if process_is_gone(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
