use std::process::Command;
use tracing::debug;

/// Variables never forwarded to a child, even when allow-listed.
/// Checked case-insensitively.
const DENIED_ENV_VARS: &[&str] = &[
    // widen the classpath past the sandbox
    "CLASSPATH",
    // JVM option injection; also makes the JVM print "Picked up ..." on stderr
    "JAVA_TOOL_OPTIONS",
    "_JAVA_OPTIONS",
    "JDK_JAVA_OPTIONS",
    // library injection
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
];

pub fn is_denied_env_var(key: &str) -> bool {
    DENIED_ENV_VARS.iter().any(|d| d.eq_ignore_ascii_case(key))
}

/// Start the child from an empty environment and forward only `passthrough`
/// variables that are set on the host and not denied.
pub fn apply_env_policy(command: &mut Command, passthrough: &[String]) {
    command.env_clear();
    for name in passthrough {
        if is_denied_env_var(name) {
            debug!(variable = %name, "refusing to forward denied environment variable");
            continue;
        }
        if let Some(value) = std::env::var_os(name) {
            command.env(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_vars_match_case_insensitively() {
        assert!(is_denied_env_var("CLASSPATH"));
        assert!(is_denied_env_var("classpath"));
        assert!(is_denied_env_var("Java_Tool_Options"));
        assert!(!is_denied_env_var("PATH"));
        assert!(!is_denied_env_var("JAVA_HOME"));
    }

    #[test]
    fn env_is_cleared_and_denied_vars_are_dropped() {
        let mut command = Command::new("java");
        apply_env_policy(
            &mut command,
            &[
                "PATH".to_string(),
                "CLASSPATH".to_string(),
                "JAVABOX_SURELY_UNSET_VARIABLE".to_string(),
            ],
        );
        let forwarded: Vec<String> = command
            .get_envs()
            .filter(|(_, value)| value.is_some())
            .map(|(key, _)| key.to_string_lossy().to_string())
            .collect();
        assert!(!forwarded.iter().any(|key| key == "CLASSPATH"));
        assert!(!forwarded
            .iter()
            .any(|key| key == "JAVABOX_SURELY_UNSET_VARIABLE"));
        if std::env::var_os("PATH").is_some() {
            assert!(forwarded.iter().any(|key| key == "PATH"));
        }
    }
}
