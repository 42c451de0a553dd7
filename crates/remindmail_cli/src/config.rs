use anyhow::{bail, Context, Result};
use remindmail_core::{default_log_level, StoreFormat, DEFAULT_DAY_STARTS_AT_HOUR};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemindConfig {
    /// Rule store file (default: ~/remindmail/remind.md)
    pub store_path: Option<PathBuf>,
    /// `markdown` or `yaml`; inferred from the store extension when unset
    pub store_format: Option<String>,
    /// Rolling log directory (default: <data_dir>/remindmail/logs)
    pub log_dir: Option<PathBuf>,
    /// trace|debug|info|warn|error (default depends on build mode)
    pub log_level: Option<String>,
    /// Hours before this count as the previous day when reading phrases
    pub day_starts_at_hour: Option<u32>,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Shell command receiving `$REMIND_TITLE` and the body on stdin;
    /// reminders are printed to stdout when unset.
    pub command: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_path: PathBuf,
    pub store_format: StoreFormat,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub day_starts_at_hour: u32,
    pub delivery_command: Option<String>,
}

impl RemindConfig {
    /// Default config file path: <config_dir>/remindmail/config.toml.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("could not determine user config directory")?
            .join("remindmail")
            .join("config.toml"))
    }

    /// Loads config from the given path, or the default path.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };
        Self::load_from(&config_path)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            log::debug!(
                "event=config_load module=cli status=skipped reason=missing path={}",
                config_path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", config_path.display()))
    }

    /// Applies defaults; `store_override` (`--store` / `$REMINDMAIL_STORE`)
    /// beats `store_path`.
    pub fn resolve(&self, store_override: Option<PathBuf>) -> Result<Settings> {
        let store_path = match store_override.or_else(|| self.store_path.clone()) {
            Some(path) => expand_home(&path)?,
            None => dirs::home_dir()
                .context("could not determine home directory")?
                .join("remindmail")
                .join("remind.md"),
        };
        let store_format = match self.store_format.as_deref() {
            Some(raw) => raw
                .parse::<StoreFormat>()
                .map_err(|message| anyhow::anyhow!(message))?,
            None => StoreFormat::from_path(&store_path),
        };
        let log_dir = match &self.log_dir {
            Some(path) => expand_home(path)?,
            None => dirs::data_dir()
                .context("could not determine user data directory")?
                .join("remindmail")
                .join("logs"),
        };
        let day_starts_at_hour = self.day_starts_at_hour.unwrap_or(DEFAULT_DAY_STARTS_AT_HOUR);
        if day_starts_at_hour > 23 {
            bail!("day_starts_at_hour must be between 0 and 23, got {day_starts_at_hour}");
        }

        Ok(Settings {
            store_path,
            store_format,
            log_dir,
            log_level: self
                .log_level
                .clone()
                .unwrap_or_else(|| default_log_level().to_string()),
            day_starts_at_hour,
            delivery_command: self
                .delivery
                .command
                .clone()
                .filter(|command| !command.trim().is_empty()),
        })
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .context("could not determine home directory")?
            .join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}
