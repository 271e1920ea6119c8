//! Identity and version of the running product.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use semver::Version;
use serde::Deserialize;
use tracing::debug;

use super::installation::Installation;
use super::storage::Storage;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    name: String,
    version: Version,
}

impl ProductInfo {
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self> {
        let name = name.into();
        let version = Version::parse(version).map_err(|err| {
            Error::SingleSourceVersion(format!("{name}: {version:?} is not a semantic version: {err}"))
        })?;
        Ok(Self { name, version })
    }

    /// Walks up from `start` to the nearest `Cargo.toml` naming a package and
    /// takes its version, following `version.workspace = true` to the
    /// workspace root.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut package: Option<String> = None;
        for dir in start.ancestors() {
            let candidate = dir.join("Cargo.toml");
            if !candidate.is_file() {
                continue;
            }
            let manifest = match fs::read_to_string(&candidate)
                .map_err(Error::from)
                .and_then(|raw| toml::from_str::<Manifest>(&raw).map_err(|err| {
                    Error::SingleSourceVersion(format!("{}: {err}", candidate.display()))
                })) {
                Ok(manifest) => manifest,
                Err(err) => {
                    debug!(path = %candidate.display(), error = %err, "skipping manifest");
                    continue;
                }
            };
            if package.is_none() {
                if let Some(found) = manifest.package {
                    match found.version {
                        Some(PackageVersion::Literal(version)) => {
                            return Self::new(found.name, &version);
                        }
                        Some(PackageVersion::Inherited { workspace: true }) => {
                            package = Some(found.name);
                        }
                        _ => continue,
                    }
                }
            }
            if let Some(name) = &package {
                let inherited = manifest
                    .workspace
                    .and_then(|workspace| workspace.package)
                    .and_then(|shared| shared.version);
                if let Some(version) = inherited {
                    return Self::new(name.clone(), &version);
                }
            }
        }
        Err(Error::SingleSourceVersion(format!(
            "no Cargo.toml with a package version above {}",
            start.display()
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Install folder name: the package name with `_` replaced by `-`.
    pub fn product_name(&self) -> String {
        self.name.replace('_', "-")
    }

    pub fn current_installation(
        &self,
        storage: Arc<dyn Storage>,
        assume_user: bool,
    ) -> Result<Installation> {
        Installation::current(storage, &self.product_name(), assume_user)
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
    workspace: Option<WorkspaceSection>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    version: Option<PackageVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PackageVersion {
    Literal(String),
    Inherited { workspace: bool },
}

#[derive(Debug, Deserialize)]
struct WorkspaceSection {
    package: Option<SharedPackage>,
}

#[derive(Debug, Deserialize)]
struct SharedPackage {
    version: Option<String>,
}
