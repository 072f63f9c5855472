//! Operator key pair on the local filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::LocalKeyStore;

/// `~/.ssh/id_rsa` and `~/.ssh/id_rsa.pub`, or a configured private key path
/// with `.pub` appended for the public half.
#[derive(Debug, Clone)]
pub struct KeyPairFiles {
    private_key: PathBuf,
}

impl KeyPairFiles {
    /// Key pair at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".ssh").join("id_rsa")))
    }

    /// Key pair at a custom private key path.
    #[must_use]
    pub fn with_path(private_key: impl Into<PathBuf>) -> Self {
        Self {
            private_key: private_key.into(),
        }
    }

    /// Configured path if any, otherwise the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the home directory
    /// cannot be determined.
    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Ok(Self::with_path(p)),
            None => Self::new(),
        }
    }
}

impl LocalKeyStore for KeyPairFiles {
    fn private_key_path(&self) -> PathBuf {
        self.private_key.clone()
    }

    fn public_key_path(&self) -> PathBuf {
        let mut name = self.private_key.clone().into_os_string();
        name.push(".pub");
        PathBuf::from(name)
    }

    fn ensure_dir(&self) -> Result<()> {
        let Some(dir) = self.private_key.parent() else {
            return Ok(());
        };
        if dir.as_os_str().is_empty() || dir.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
                .with_context(|| format!("cannot set permissions on {}", dir.display()))?;
        }
        Ok(())
    }

    fn present_count(&self) -> usize {
        [self.private_key_path(), self.public_key_path()]
            .iter()
            .filter(|p| p.is_file())
            .count()
    }

    fn read_public_key(&self) -> Result<String> {
        let path = self.public_key_path();
        let key = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read public key {}", path.display()))?;
        let key = key.trim();
        anyhow::ensure!(!key.is_empty(), "public key {} is empty", path.display());
        Ok(key.to_string())
    }
}
