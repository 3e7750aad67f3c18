use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::AppConfig;

/// Error type for configuration I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse lattice.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize lattice.toml: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Read `lattice.toml` from the given directory. A missing file yields
/// the default configuration.
pub fn read_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let config_path = dir.join("lattice.toml");
    if !config_path.exists() {
        return Ok(AppConfig::default());
    }
    let config_text = fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&config_text)?)
}

/// Write the whole config back to `lattice.toml` in the given directory.
pub fn write_config(dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let config_path = dir.join("lattice.toml");
    fs::write(&config_path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// Resolve the store file path relative to the config directory.
pub fn store_path(dir: &Path, config: &AppConfig) -> PathBuf {
    dir.join(&config.store.file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::filter::{SortDirection, SortKey};
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"[store]
file = "tasks.json"

[view]
sort = "created"
direction = "descending"
expand_all = false

[user]
id = "user-42"
"#
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = read_config(tmp.path()).unwrap();
        assert_eq!(config.store.file, "lattice.json");
        assert_eq!(config.view.sort, SortKey::Manual);
        assert!(config.view.expand_all);
        assert!(config.user.id.is_none());
    }

    #[test]
    fn full_config_round_trips() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("lattice.toml"), sample_config()).unwrap();

        let config = read_config(tmp.path()).unwrap();
        assert_eq!(config.store.file, "tasks.json");
        assert_eq!(config.view.sort, SortKey::Created);
        assert_eq!(config.view.direction, SortDirection::Descending);
        assert!(!config.view.expand_all);
        assert_eq!(config.user.id.as_deref(), Some("user-42"));

        write_config(tmp.path(), &config).unwrap();
        let reread = read_config(tmp.path()).unwrap();
        assert_eq!(reread.user.id.as_deref(), Some("user-42"));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("lattice.toml"), "[user]\nid = \"u\"\n").unwrap();

        let config = read_config(tmp.path()).unwrap();
        assert_eq!(config.store.file, "lattice.json");
        assert_eq!(config.user.id.as_deref(), Some("u"));
    }

    #[test]
    fn store_path_joins_config_dir() {
        let config = AppConfig::default();
        let path = store_path(Path::new("/tmp/project"), &config);
        assert_eq!(path, Path::new("/tmp/project/lattice.json"));
    }
}
