//! Configuration resolution and path discovery.
//!
//! Resolution order: explicit path → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

/// Where the model configuration was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided by the caller.
    Explicit,

    /// Set via `BPM_CONFIG`.
    Environment,

    /// Found in the directory named by `BPM_CONFIG_DIR`.
    ConfigDir,

    /// Found in the XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit => write!(f, "explicit path"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigDir => write!(f, "config directory"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// A resolved configuration path and its provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfigPath {
    /// Path to the model config (None when using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "BPM_CONFIG";
pub const ENV_CONFIG_DIR: &str = "BPM_CONFIG_DIR";

/// Config file names searched in a directory, in order.
pub const CONFIG_FILENAMES: &[&str] = &["model.toml", "model.json"];

/// Application name for XDG directories.
const APP_NAME: &str = "bayes-point-machine";

/// Resolve the model configuration path.
///
/// Resolution order:
/// 1. Explicit path (if it exists)
/// 2. `BPM_CONFIG` environment variable
/// 3. `BPM_CONFIG_DIR` + `model.toml` / `model.json`
/// 4. XDG config directory (~/.config/bayes-point-machine/)
/// 5. Built-in defaults (None)
pub fn resolve_config_path(explicit: Option<&Path>) -> ResolvedConfigPath {
    // 1. Explicit path
    if let Some(path) = explicit {
        if path.exists() {
            return ResolvedConfigPath {
                path: Some(path.to_path_buf()),
                source: ConfigSource::Explicit,
            };
        }
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ResolvedConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    // 3. Environment variable (config dir)
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = find_in_dir(Path::new(&config_dir)) {
            return ResolvedConfigPath {
                path: Some(path),
                source: ConfigSource::ConfigDir,
            };
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        if let Some(path) = find_in_dir(&dir) {
            return ResolvedConfigPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    ResolvedConfigPath::default()
}

/// First known config file name present in `dir`.
fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Get the XDG config directory for the model configuration.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::Explicit), "explicit path");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_xdg_config_dir() {
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_NAME));
        }
    }

    #[test]
    fn test_find_in_dir_prefers_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.json"), "{}").unwrap();
        assert_eq!(find_in_dir(dir.path()), Some(dir.path().join("model.json")));
        std::fs::write(dir.path().join("model.toml"), "").unwrap();
        assert_eq!(find_in_dir(dir.path()), Some(dir.path().join("model.toml")));
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, "{}").unwrap();
        let resolved = resolve_config_path(Some(&path));
        assert_eq!(resolved.source, ConfigSource::Explicit);
        assert_eq!(resolved.path, Some(path));
    }
}
