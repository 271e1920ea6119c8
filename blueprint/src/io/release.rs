//! Publishing a build artifact into an installation and recording its version.

use chrono::{SecondsFormat, Utc};
use semver::Version;

use super::installation::Installation;
use super::product::ProductInfo;
use crate::core::schema::{Describe, Schema};
use crate::error::{Error, Result};

/// Contents of `version.json`: what is installed and when it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVersion {
    pub version: String,
    pub wheel: String,
    pub date: Option<String>,
}

impl Describe for ProductVersion {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(ProductVersion {
                version: f.get("version")?,
                wheel: f.get("wheel")?,
                date: f.get("date")?,
            })
        })
        .file("version.json")
        .field("version", |v: &ProductVersion| &v.version)
        .field("wheel", |v: &ProductVersion| &v.wheel)
        .field("date", |v: &ProductVersion| &v.date)
    }
}

impl ProductVersion {
    pub fn semver(&self) -> Result<Version> {
        Version::parse(&self.version).map_err(|err| {
            Error::IllegalState(format!("version.json: unresolved version {:?}: {err}", self.version))
        })
    }
}

/// Installed product version, or `None` before the first publish.
pub fn installed_version(installation: &Installation) -> Result<Option<Version>> {
    match installation.load::<ProductVersion>(None) {
        Ok(recorded) => recorded.semver().map(Some),
        Err(Error::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Uploads `artifact` to `wheels/{artifact_name}` and records it in
/// `version.json`. Returns the remote artifact path.
pub fn publish(
    installation: &Installation,
    product: &ProductInfo,
    artifact_name: &str,
    artifact: &[u8],
) -> Result<String> {
    let remote = installation.upload(&format!("wheels/{artifact_name}"), artifact)?;
    let record = ProductVersion {
        version: product.version().to_string(),
        wheel: remote.clone(),
        date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    };
    installation.save(&record, None)?;
    Ok(remote)
}
