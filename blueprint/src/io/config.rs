//! CLI configuration stored in `blueprint.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::location::Location;

/// CLI configuration (TOML).
///
/// Missing fields default to a storage folder next to the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    /// Local directory that stands in for remote storage.
    pub root: PathBuf,

    /// Identity used to resolve per-user installations.
    pub identity: String,

    /// Product whose installations the CLI manages.
    pub product: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
            identity: "me@example.com".to_string(),
            product: "blueprint".to_string(),
        }
    }
}

impl CliConfig {
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(anyhow!("root must not be empty"));
        }
        Location::user(&self.identity, &self.product)
            .map_err(|err| anyhow!("identity/product: {err}"))?;
        Ok(())
    }

    /// Storage root; relative roots resolve against `base`.
    pub fn storage_root(&self, base: &Path) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            base.join(&self.root)
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CliConfig::default()`.
pub fn load_config(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        let cfg = CliConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CliConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write a validated config as TOML, replacing `path` only once the new
/// contents are fully on disk.
pub fn write_config(path: &Path, cfg: &CliConfig) -> Result<()> {
    cfg.validate()?;
    let contents = toml::to_string_pretty(cfg).context("render blueprint.toml")?;
    if let Some(folder) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(folder).with_context(|| format!("create {}", folder.display()))?;
    }
    let staged = path.with_extension("toml.partial");
    fs::write(&staged, contents).with_context(|| format!("write {}", staged.display()))?;
    fs::rename(&staged, path).with_context(|| format!("move config into {}", path.display()))
}
