//! Persisted per-project configuration.
//!
//! A small JSON properties file under the bundle project's config folder
//! stores values that survive across invocations (Docker organization and
//! registry). The store is an explicit object handed to workflows; there is
//! no ambient global configuration.

use crate::error::{ConfigError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the per-project config folder inside a bundle directory
pub const CONFIG_FOLDER: &str = ".bundle";

/// Config file name inside [`CONFIG_FOLDER`]
const CONFIG_FILE: &str = "config.json";

/// Property key for the configured Docker organization
pub const DOCKER_ORGANIZATION_PROPERTY: &str = "docker-organization";

/// Property key for the configured Docker registry
pub const DOCKER_REGISTRY_PROPERTY: &str = "docker-registry";

/// Key/value property store persisted as JSON.
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    properties: BTreeMap<String, String>,
}

impl ConfigService {
    /// Open (or lazily create) the config store of a bundle project.
    pub fn new(bundle_dir: &Path) -> Result<Self> {
        let config_path = bundle_dir.join(CONFIG_FOLDER).join(CONFIG_FILE);
        let properties = if config_path.is_file() {
            let raw = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&raw).map_err(|e| ConfigError::Corrupted {
                path: config_path.clone(),
                reason: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            config_path,
            properties,
        })
    }

    /// Look up a property.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Set a property and persist the store.
    pub fn add_or_update_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.properties.insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Remove a property and persist the store.
    pub fn delete_property(&mut self, key: &str) -> Result<()> {
        if self.properties.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let save_error = |reason: String| ConfigError::SaveFailed {
            path: self.config_path.clone(),
            reason,
        };
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(&self.properties)
            .map_err(|e| save_error(e.to_string()))?;
        std::fs::write(&self.config_path, raw).map_err(|e| save_error(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = ConfigService::new(dir.path()).unwrap();
        assert_eq!(config.get_property(DOCKER_ORGANIZATION_PROPERTY), None);
        config
            .add_or_update_property(DOCKER_ORGANIZATION_PROPERTY, "myorg")
            .unwrap();

        let reloaded = ConfigService::new(dir.path()).unwrap();
        assert_eq!(
            reloaded.get_property(DOCKER_ORGANIZATION_PROPERTY),
            Some("myorg")
        );
    }

    #[test]
    fn delete_removes_persisted_property() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = ConfigService::new(dir.path()).unwrap();
        config
            .add_or_update_property(DOCKER_REGISTRY_PROPERTY, "registry.example.com")
            .unwrap();
        config.delete_property(DOCKER_REGISTRY_PROPERTY).unwrap();

        let reloaded = ConfigService::new(dir.path()).unwrap();
        assert_eq!(reloaded.get_property(DOCKER_REGISTRY_PROPERTY), None);
    }

    #[test]
    fn corrupted_config_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(CONFIG_FOLDER)).unwrap();
        std::fs::write(dir.path().join(CONFIG_FOLDER).join("config.json"), "{oops").unwrap();

        let error = ConfigService::new(dir.path()).unwrap_err();
        assert!(error.to_string().contains("corrupted"));
    }
}
