use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BakeConfig;
use crate::errors::CheckpointError;
use crate::layout::BuildLayout;

/// Persists the build configuration to `<build_dir>/build.state.yaml`.
///
/// Every save overwrites the file wholesale. There is a single writer per
/// build, so no locking is done.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_layout(layout: &BuildLayout) -> Self {
        Self::new(layout.checkpoint_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, config: &BakeConfig) -> Result<(), CheckpointError> {
        let yaml = config.to_yaml().map_err(CheckpointError::Serialize)?;
        fs::write(&self.path, yaml).map_err(|source| CheckpointError::WriteFailed {
            path: self.path.clone(),
            source,
        })
    }

    /// Read the last checkpoint back, if one was written.
    pub fn load(&self) -> Result<Option<BakeConfig>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(|source| CheckpointError::ReadFailed {
            path: self.path.clone(),
            source,
        })?;
        let config = serde_yaml::from_slice(&bytes).map_err(|source| CheckpointError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, load_config};
    use serde_yaml::{Mapping, Value};
    use tempfile::tempdir;

    fn make_store() -> (CheckpointStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("build.state.yaml"));
        (store, dir)
    }

    fn sample_config() -> BakeConfig {
        let mut nested = Mapping::new();
        nested.insert("Lobster-Regular.sfd".into(), "passed".into());
        nested.insert("Lobster-Bold.sfd".into(), "failed".into());

        let mut config = BakeConfig::new();
        config.set("familyname", "Lobster");
        config.set("autofix", false);
        config.set("weight", 400);
        config.set("build_command", Value::Null);
        config.set(
            "sources",
            vec![
                Value::from("sources/Lobster-Regular.sfd"),
                Value::from("sources/Lobster-Bold.sfd"),
            ],
        );
        config.set("upstream_lint", nested);
        config
    }

    #[test]
    fn test_load_without_checkpoint_is_none() {
        let (store, _dir) = make_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (store, _dir) = make_store();
        let config = sample_config();
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));
    }

    #[test]
    fn test_checkpoint_loads_as_build_configuration() {
        let (store, _dir) = make_store();
        let config = sample_config();
        store.save(&config).unwrap();

        let loaded = load_config(ConfigSource::Path(store.path().to_path_buf())).unwrap();
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.config, config);
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let (store, _dir) = make_store();
        store.save(&sample_config()).unwrap();

        let mut smaller = BakeConfig::new();
        smaller.set("only", "key");
        store.save(&smaller).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get_str("only"), Some("key"));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("missing/build.state.yaml"));
        let err = store.save(&sample_config()).unwrap_err();
        assert!(matches!(err, CheckpointError::WriteFailed { .. }));
    }

    #[test]
    fn test_corrupt_checkpoint_reports_parse_error() {
        let (store, _dir) = make_store();
        fs::write(store.path(), "key: [unclosed").unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            CheckpointError::Parse { .. }
        ));
    }
}
