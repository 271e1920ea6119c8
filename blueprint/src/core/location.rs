//! Install location resolution: where a product's files live in storage.

use std::fmt;

use crate::error::{Error, Result};

/// Parent folder of shared installations.
pub const GLOBAL_ROOT: &str = "/Applications";

/// Parent folder of per-user home directories.
pub const USERS_ROOT: &str = "/Users";

/// Resolved base folder of one installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    base_path: String,
    is_global: bool,
    product: String,
}

impl Location {
    /// `/Applications/{product}`.
    pub fn global(product: &str) -> Result<Self> {
        validate_segment("product", product)?;
        Ok(Self {
            base_path: format!("{GLOBAL_ROOT}/{product}"),
            is_global: true,
            product: product.to_string(),
        })
    }

    /// `/Users/{identity}/.{product}`.
    pub fn user(identity: &str, product: &str) -> Result<Self> {
        validate_segment("product", product)?;
        validate_segment("identity", identity)?;
        Ok(Self {
            base_path: format!("{USERS_ROOT}/{identity}/.{product}"),
            is_global: false,
            product: product.to_string(),
        })
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn is_global(&self) -> bool {
        self.is_global
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Identity owning a per-user location.
    pub fn username(&self) -> Option<&str> {
        if self.is_global {
            return None;
        }
        self.base_path
            .strip_prefix(USERS_ROOT)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.split('/').next())
    }

    /// Last segment of the base path: `{product}` or `.{product}`.
    pub fn folder_name(&self) -> &str {
        self.base_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.base_path)
    }

    /// Folder that lists this location as an entry.
    pub fn parent(&self) -> &str {
        parent_of(&self.base_path)
    }

    /// Absolute path of `filename` inside the installation.
    pub fn join(&self, filename: &str) -> String {
        format!("{}/{}", self.base_path, filename.trim_start_matches('/'))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_path)
    }
}

/// Parent of an absolute storage path; the root is its own parent.
pub fn parent_of(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn validate_segment(what: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.chars().any(|c| c == '/' || c.is_whitespace() || c.is_control());
    if valid {
        Ok(())
    } else {
        Err(Error::IllegalState(format!("invalid {what} name: {value:?}")))
    }
}
