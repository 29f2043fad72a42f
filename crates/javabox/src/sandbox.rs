//! Per-invocation sandbox directories.
//!
//! A [`Sandbox`] is a uniquely named directory under the configured root that owns
//! the submitted source and every compiled artifact of one invocation. It is
//! removed exactly once: by an explicit [`Sandbox::release`], or by `Drop` on any
//! other exit path (early return, error, unwinding panic).

use crate::error::{EngineError, EngineResult};
use crate::model::SandboxId;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Attempts at finding an unused directory name before giving up.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

#[derive(Debug)]
pub struct Sandbox {
    id: SandboxId,
    path: PathBuf,
    released: bool,
}

impl Sandbox {
    /// Create a fresh sandbox directory under `root`, creating `root` if needed.
    ///
    /// On Unix an existing `root` must be owned by the effective user; a root
    /// planted by someone else in a shared temp directory is refused. The
    /// directory itself is created with `create_dir`, so an existing path is
    /// never adopted.
    pub fn acquire(root: &Path) -> EngineResult<Self> {
        fs::create_dir_all(root)
            .map_err(|err| EngineError::io_at("failed to create sandbox root", root, err))?;
        #[cfg(unix)]
        ensure_owned_by(root, nix::unistd::geteuid().as_raw())?;

        let mut last_err = None;
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let id = SandboxId::new();
            let path = root.join(id.to_string());
            match create_private_dir(&path) {
                Ok(()) => {
                    debug!(sandbox = %id, path = %path.display(), "sandbox acquired");
                    return Ok(Self {
                        id,
                        path,
                        released: false,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    last_err = Some(err);
                }
                Err(err) => {
                    return Err(EngineError::io_at(
                        "failed to create sandbox directory",
                        path,
                        err,
                    ));
                }
            }
        }
        Err(EngineError::io(
            "failed to find an unused sandbox name",
            last_err.unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::AlreadyExists)),
        ))
    }

    pub fn id(&self) -> SandboxId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the sandbox.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Recursively remove the sandbox directory.
    ///
    /// Idempotent. Failures are logged and swallowed: a cleanup problem must never
    /// become the outcome of the invocation.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(sandbox = %self.id, "sandbox released"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                sandbox = %self.id,
                path = %self.path.display(),
                error = %err,
                "failed to remove sandbox directory"
            ),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(unix)]
fn ensure_owned_by(root: &Path, uid: u32) -> EngineResult<()> {
    use std::os::unix::fs::MetadataExt;
    let owner = fs::metadata(root)
        .map_err(|err| EngineError::io_at("failed to inspect sandbox root", root, err))?
        .uid();
    if owner == uid {
        Ok(())
    } else {
        Err(EngineError::io_at(
            format!("sandbox root is owned by uid {owner}, expected {uid}"),
            root,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ))
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::DirBuilder::new().mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_unique_directories_under_root() {
        let root = tempfile::tempdir().unwrap();
        let first = Sandbox::acquire(root.path()).unwrap();
        let second = Sandbox::acquire(root.path()).unwrap();

        assert!(first.path().is_dir());
        assert!(second.path().is_dir());
        assert_ne!(first.path(), second.path());
        assert_eq!(first.path().parent(), Some(root.path()));
        assert_eq!(first.id().to_string().len(), 32);
    }

    #[test]
    fn acquire_creates_missing_root() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("nested").join("java_exec");
        let sandbox = Sandbox::acquire(&root).unwrap();
        assert!(sandbox.path().starts_with(&root));
    }

    #[test]
    fn release_removes_contents_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::acquire(root.path()).unwrap();
        fs::write(sandbox.file("Main.java"), "class Main {}").unwrap();
        fs::create_dir(sandbox.file("pkg")).unwrap();
        fs::write(sandbox.path().join("pkg").join("A.class"), [0xca, 0xfe]).unwrap();

        let path = sandbox.path().to_path_buf();
        sandbox.release();
        assert!(!path.exists());
        assert!(sandbox.is_released());
        sandbox.release();
    }

    #[test]
    fn drop_releases_sandbox() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let sandbox = Sandbox::acquire(root.path()).unwrap();
            sandbox.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn release_tolerates_directory_removed_externally() {
        let root = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::acquire(root.path()).unwrap();
        fs::remove_dir_all(sandbox.path()).unwrap();
        sandbox.release();
        assert!(sandbox.is_released());
    }

    #[cfg(unix)]
    #[test]
    fn root_owned_by_another_user_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let me = nix::unistd::geteuid().as_raw();
        ensure_owned_by(root.path(), me).unwrap();

        let err = ensure_owned_by(root.path(), me.wrapping_add(1)).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::Io);
        assert!(err.to_string().contains("owned by uid"));
    }

    #[cfg(unix)]
    #[test]
    fn sandbox_directory_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::acquire(root.path()).unwrap();
        let mode = fs::metadata(sandbox.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
