use chatkeep_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::AppConfig;

const CONFIG_FILE: &str = "config.yml";

/// Resolves and parses the YAML configuration file.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".chatkeep"))
            .unwrap_or_else(|| PathBuf::from(".chatkeep"));
        Self { config_dir }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn default_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Load from `explicit` if given (it must exist), else from the default
    /// location if present, else fall back to defaults. Environment overrides
    /// are applied last.
    pub fn load(&self, explicit: Option<&Path>) -> Result<AppConfig> {
        let mut config = match explicit {
            Some(path) => Self::read_file(path)?,
            None => {
                let path = self.default_path();
                if path.is_file() {
                    Self::read_file(&path)?
                } else {
                    debug!("no config file at {}, using defaults", path.display());
                    AppConfig::default()
                }
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<AppConfig> {
        if raw.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `CHATKEEP_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(kind) = lookup("CHATKEEP_PROVIDER") {
        config.provider.kind = kind.parse().map_err(Error::Config)?;
    }
    if let Some(url) = lookup("CHATKEEP_BASE_URL").filter(|v| !v.trim().is_empty()) {
        config.provider.base_url = Some(url);
    }
    if let Some(dir) = lookup("CHATKEEP_DATA_DIR").filter(|v| !v.trim().is_empty()) {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
    Ok(())
}
