// src/system/host.rs

use std::collections::HashMap;

/// A read-only snapshot of the process state that override conditions look at.
///
/// Resolution never reads the real environment directly; it receives a `Host`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Host {
    platform: String,
    env_vars: HashMap<String, String>,
}

impl Host {
    /// Captures the running platform and the current environment variables.
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn current() -> Self {
        let env_vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self {
            platform: platform_name(std::env::consts::OS),
            env_vars,
        }
    }

    /// Creates a snapshot for `platform` with no environment variables.
    pub fn new(platform: &str) -> Self {
        Self {
            platform: platform_name(platform),
            env_vars: HashMap::new(),
        }
    }

    /// Adds or replaces one environment variable.
    pub fn with_env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(name.into(), value.into());
        self
    }

    /// Replaces the platform name.
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform_name(platform);
        self
    }

    /// The normalized platform name (`linux`, `windows`, `macos`, ...).
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// The value of an environment variable, if it is set.
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env_vars.get(name).map(String::as_str)
    }
}

/// Normalizes an OS identifier to the names used in override conditions.
pub fn platform_name(os: &str) -> String {
    let os = os.trim().to_lowercase();
    match os.as_str() {
        "darwin" | "macos" | "osx" => "macos".to_string(),
        "win32" | "windows" => "windows".to_string(),
        _ => os,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_name_normalization() {
        assert_eq!(platform_name("Darwin"), "macos");
        assert_eq!(platform_name("win32"), "windows");
        assert_eq!(platform_name("linux"), "linux");
        assert_eq!(platform_name("freebsd"), "freebsd");
    }

    #[test]
    fn test_host_env_vars() {
        let host = Host::new("linux").with_env_var("CI", "true");
        assert_eq!(host.platform(), "linux");
        assert_eq!(host.env_var("CI"), Some("true"));
        assert_eq!(host.env_var("HOME_NOT_SET"), None);
    }

    #[test]
    fn test_current_host_uses_compile_target() {
        let host = Host::current();
        assert_eq!(host.platform(), platform_name(std::env::consts::OS));
    }
}
