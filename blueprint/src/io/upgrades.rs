//! Application upgrade driver.
//!
//! Upgrade scripts are identified as `v{semver}_{description}`. Each one runs
//! at most once per installation; the ids of applied scripts are recorded in
//! `applied-upgrades.json` right after each success, so a failed run resumes
//! at the failing script.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use tracing::{debug, info, warn};

use super::installation::Installation;
use super::product::ProductInfo;
use super::release::installed_version;
use crate::core::schema::{Describe, Schema};
use crate::error::{Error, Result};

static SCRIPT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(?P<version>\d+\.\d+\.\d+[^_]*)_(?P<description>\w+)$").unwrap()
});

pub type UpgradeFn = Box<dyn Fn(&Installation) -> Result<()> + Send + Sync>;

pub struct UpgradeScript {
    id: String,
    version: Version,
    description: String,
    apply: UpgradeFn,
}

impl fmt::Debug for UpgradeScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeScript")
            .field("id", &self.id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl UpgradeScript {
    pub fn new<F>(id: &str, apply: F) -> Result<Self>
    where
        F: Fn(&Installation) -> Result<()> + Send + Sync + 'static,
    {
        let invalid = |message: String| Error::InvalidUpgrade {
            id: id.to_string(),
            message,
        };
        let captures = SCRIPT_ID
            .captures(id)
            .ok_or_else(|| invalid("expected v{semver}_{description}".to_string()))?;
        let version = Version::parse(&captures["version"]).map_err(|err| invalid(err.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            version,
            description: captures["description"].to_string(),
            apply: Box::new(apply),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Contents of `applied-upgrades.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedUpgrades {
    pub upgraded: Vec<String>,
}

impl Describe for AppliedUpgrades {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(AppliedUpgrades {
                upgraded: f.get("upgraded")?,
            })
        })
        .file("applied-upgrades.json")
        .version(1)
        .field_or("upgraded", |a: &AppliedUpgrades| &a.upgraded, Vec::new())
    }
}

impl AppliedUpgrades {
    pub fn contains(&self, id: &str) -> bool {
        self.upgraded.iter().any(|applied| applied == id)
    }
}

pub struct Upgrades<'a> {
    product: &'a ProductInfo,
    installation: &'a Installation,
    scripts: Vec<UpgradeScript>,
}

impl<'a> Upgrades<'a> {
    pub fn new(
        product: &'a ProductInfo,
        installation: &'a Installation,
        scripts: Vec<UpgradeScript>,
    ) -> Self {
        Self {
            product,
            installation,
            scripts,
        }
    }

    /// Scripts still to run, in application order.
    pub fn pending(&self) -> Result<Vec<&UpgradeScript>> {
        let applied = self.installation.load_or_default::<AppliedUpgrades>(None)?;
        self.pending_against(&applied)
    }

    fn pending_against(&self, applied: &AppliedUpgrades) -> Result<Vec<&UpgradeScript>> {
        let installed = installed_version(self.installation)?;
        let current = self.product.version();
        let mut pending: Vec<&UpgradeScript> = Vec::new();
        for script in &self.scripts {
            if applied.contains(&script.id) {
                continue;
            }
            if installed.as_ref().is_some_and(|installed| script.version < *installed) {
                debug!(script = %script.id, "older than installed version, skipping");
                continue;
            }
            if script.version > *current {
                warn!(script = %script.id, current = %current, "upgrade is for a future version, skipping");
                continue;
            }
            pending.push(script);
        }
        pending.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.id.cmp(&b.id)));
        Ok(pending)
    }

    /// Runs pending scripts in order, recording each success before the next
    /// one starts. The first failing script's error is returned as-is.
    pub fn apply(&self) -> Result<Vec<String>> {
        let mut applied = self.installation.load_or_default::<AppliedUpgrades>(None)?;
        let pending = self.pending_against(&applied)?;
        let mut ran = Vec::with_capacity(pending.len());
        for script in pending {
            info!(script = %script.id, folder = %self.installation.install_folder(), "applying upgrade");
            (script.apply)(self.installation)?;
            applied.upgraded.push(script.id.clone());
            self.installation.save(&applied, None)?;
            ran.push(script.id.clone());
        }
        Ok(ran)
    }
}
