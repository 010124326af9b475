//! Reading configuration from disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::HubConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TOOLHUB_CONFIG";

/// Path used when neither a flag nor [`CONFIG_ENV`] names a file.
pub const DEFAULT_CONFIG_PATH: &str = "config/tools.yaml";

/// Picks the configuration path: explicit argument, then [`CONFIG_ENV`], then
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Loads and checks a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] when it does not match the schema, and
/// [`ConfigError::Invalid`] when entries are inconsistent.
pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<HubConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "loading configuration");
    parse(&contents, &path.display().to_string())
}

/// Parses and checks configuration held in memory.
///
/// # Errors
///
/// Same as [`load_file`], minus I/O.
pub fn from_yaml_str(contents: &str) -> ConfigResult<HubConfig> {
    parse(contents, "<inline>")
}

fn parse(contents: &str, origin: &str) -> ConfigResult<HubConfig> {
    if contents.trim().is_empty() {
        return Ok(HubConfig::default());
    }
    let config: HubConfig = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
        origin: origin.to_owned(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = from_yaml_str("  \n").unwrap();
        assert!(config.tools.is_empty());
        assert!(config.validation.drift_detection);
    }

    #[test]
    fn parse_errors_name_their_origin() {
        let err = from_yaml_str("tools: 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref origin, .. } if origin == "<inline>"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = env::temp_dir().join("toolhub-config-does-not-exist.yaml");
        assert!(matches!(load_file(&path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("custom.yaml");
        assert_eq!(resolve_path(Some(explicit)), PathBuf::from("custom.yaml"));
    }

    #[test]
    fn round_trip_through_disk() {
        let path = env::temp_dir().join(format!("toolhub-config-{}.yaml", std::process::id()));
        fs::write(
            &path,
            "validation:\n  drift_detection: false\ntools:\n  - name: t\n    method: a.b.c\n",
        )
        .unwrap();
        let config = load_file(&path).unwrap();
        fs::remove_file(&path).ok();
        assert!(!config.validation.drift_detection);
        assert_eq!(config.tools[0].method_name().as_str(), "a.b.c");
    }
}
