//! Global configuration loader for jobflow.
//!
//! Reads a TOML file into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use jobflow_types::config::GlobalConfig;

/// Project-local configuration file name.
pub const PROJECT_CONFIG_FILE: &str = "jobflow.toml";

/// Load global configuration from `path`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(path: &Path) -> GlobalConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            GlobalConfig::default()
        }
    }
}

/// Pick the configuration file to load.
///
/// Priority:
/// 1. An explicit path (e.g. `--config`), whether or not it exists
/// 2. `./jobflow.toml` if present
/// 3. `~/.jobflow/config.toml` if present
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_config_path_in(explicit, Path::new("."), dirs::home_dir().as_deref())
}

fn resolve_config_path_in(
    explicit: Option<&Path>,
    project_dir: &Path,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let project = project_dir.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Some(project);
    }

    let user = home?.join(".jobflow").join("config.toml");
    user.is_file().then_some(user)
}

/// Resolve and load in one step; no file at all means defaults.
pub async fn load_resolved_config(explicit: Option<&Path>) -> GlobalConfig {
    match resolve_config_path(explicit) {
        Some(path) => load_global_config(&path).await,
        None => GlobalConfig::default(),
    }
}
