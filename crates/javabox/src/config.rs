//! Engine configuration.
//!
//! An [`EngineConfig`] is an explicit value handed to [`Engine::new`](crate::Engine::new).
//! Nothing here is global, so tests and callers can run engines with different bounds
//! side by side.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directory name created under the OS temp dir for sandboxes.
pub const DEFAULT_SANDBOX_DIR: &str = "java_exec";
/// The one class name the engine supports.
pub const DEFAULT_ENTRY_CLASS: &str = "Main";
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on the post-kill pipe drain.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 1024 * 1024;

/// Host variables forwarded to the compiler and the program by default.
pub const DEFAULT_ENV_PASSTHROUGH: &[&str] =
    &["PATH", "JAVA_HOME", "LANG", "LC_ALL", "TZ", "SYSTEMROOT"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base directory under which per-invocation sandboxes are created.
    pub sandbox_root: PathBuf,
    /// Name of the public entry class; the source file is `<entry_class>.java`.
    pub entry_class: String,
    /// Compiler executable (name resolved on `PATH`, or a path).
    pub javac: String,
    /// Runtime executable (name resolved on `PATH`, or a path).
    pub java: String,
    #[serde(rename = "compile_timeout_ms", with = "millis")]
    pub compile_timeout: Duration,
    #[serde(rename = "run_timeout_ms", with = "millis")]
    pub run_timeout: Duration,
    #[serde(rename = "drain_timeout_ms", with = "millis")]
    pub drain_timeout: Duration,
    /// Extra JVM flags placed before `-cp`.
    pub jvm_args: Vec<String>,
    /// Per-stream capture budget.
    pub max_output_bytes: u64,
    pub env_passthrough: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandbox_root: std::env::temp_dir().join(DEFAULT_SANDBOX_DIR),
            entry_class: DEFAULT_ENTRY_CLASS.to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            jvm_args: vec!["-Xmx256m".to_string(), "-XX:+UseSerialGC".to_string()],
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            env_passthrough: DEFAULT_ENV_PASSTHROUGH
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = root.into();
        self
    }

    #[must_use]
    pub fn with_toolchain(mut self, javac: impl Into<String>, java: impl Into<String>) -> Self {
        self.javac = javac.into();
        self.java = java.into();
        self
    }

    #[must_use]
    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_jvm_args(mut self, args: Vec<String>) -> Self {
        self.jvm_args = args;
        self
    }

    /// Fixed source file name, derived from the entry class.
    pub fn source_file_name(&self) -> String {
        format!("{}.java", self.entry_class)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.sandbox_root.as_os_str().is_empty() {
            return Err(EngineError::invalid_config("sandbox_root must not be empty"));
        }
        if !is_java_identifier(&self.entry_class) {
            return Err(EngineError::invalid_config(format!(
                "entry_class '{}' is not a valid Java identifier",
                self.entry_class
            )));
        }
        if self.javac.trim().is_empty() || self.java.trim().is_empty() {
            return Err(EngineError::invalid_config(
                "javac and java executables must be set",
            ));
        }
        for (name, value) in [
            ("compile_timeout_ms", self.compile_timeout),
            ("run_timeout_ms", self.run_timeout),
            ("drain_timeout_ms", self.drain_timeout),
        ] {
            if value.is_zero() {
                return Err(EngineError::invalid_config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if self.max_output_bytes == 0 {
            return Err(EngineError::invalid_config(
                "max_output_bytes must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
}

/// Load a config file. YAML when the extension is `.yaml`/`.yml`, JSON otherwise.
/// Missing fields take their defaults.
pub fn load_config_file(path: &Path) -> EngineResult<EngineConfig> {
    let data = fs::read_to_string(path)
        .map_err(|err| EngineError::io_at("failed to read config file", path, err))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    let config: EngineConfig = if is_yaml {
        serde_yml::from_str(&data)
            .map_err(|err| EngineError::invalid_config(format!("failed to parse yaml: {err}")))?
    } else {
        serde_json::from_str(&data)
            .map_err(|err| EngineError::invalid_config(format!("failed to parse json: {err}")))?
    };
    config.validate()?;
    Ok(config)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.entry_class, "Main");
        assert_eq!(config.source_file_name(), "Main.java");
        assert_eq!(config.compile_timeout, Duration::from_secs(10));
        assert_eq!(config.run_timeout, Duration::from_secs(5));
        assert_eq!(config.drain_timeout, Duration::from_secs(3));
        assert!(config.sandbox_root.ends_with("java_exec"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_identifier_entry_class() {
        let mut config = EngineConfig::default();
        config.entry_class = "../Main".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidConfig);

        config.entry_class = "9Lives".to_string();
        assert!(config.validate().is_err());
        config.entry_class = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let config = EngineConfig::default().with_run_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("run_timeout_ms"));
    }

    #[test]
    fn json_uses_millisecond_fields_and_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"run_timeout_ms": 1500, "entry_class": "Solution"}"#)
                .unwrap();
        assert_eq!(config.run_timeout, Duration::from_millis(1500));
        assert_eq!(config.entry_class, "Solution");
        assert_eq!(config.compile_timeout, DEFAULT_COMPILE_TIMEOUT);

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["run_timeout_ms"], 1500);
        assert!(value.get("run_timeout").is_none());
    }

    #[test]
    fn loads_yaml_and_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("engine.yaml");
        fs::write(&yaml, "compile_timeout_ms: 2500\njava: /opt/jdk/bin/java\n").unwrap();
        let config = load_config_file(&yaml).unwrap();
        assert_eq!(config.compile_timeout, Duration::from_millis(2500));
        assert_eq!(config.java, "/opt/jdk/bin/java");

        let json = dir.path().join("engine.json");
        fs::write(&json, r#"{"max_output_bytes": 0}"#).unwrap();
        let err = load_config_file(&json).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidConfig);
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let err = load_config_file(Path::new("/nonexistent/engine.json")).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::Io);
    }
}
