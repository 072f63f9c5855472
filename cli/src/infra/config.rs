//! Infrastructure implementation of the `ConfigStore` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::ProvisionConfig;

/// Environment variable overriding the config path.
pub const CONFIG_ENV: &str = "HOSTPREP_CONFIG";

/// Reads the provisioning configuration from a YAML file.
///
/// Path precedence: explicit `--config`, then `HOSTPREP_CONFIG`, then
/// `~/.hostprep/config.yaml`.
#[derive(Debug, Default)]
pub struct YamlConfigStore {
    explicit: Option<PathBuf>,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Parse without validating, for `config show` on a broken file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_unchecked(&self) -> Result<ProvisionConfig> {
        let path = self.path()?;
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "cannot read {}. Pass --config or set {CONFIG_ENV}.",
                path.display()
            )
        })?;
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<ProvisionConfig> {
        let path = self.path()?;
        let config = self.load_unchecked()?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".hostprep").join("config.yaml"))
    }
}
