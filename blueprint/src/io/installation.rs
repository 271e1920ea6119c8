//! Installation facade: typed save/load of configuration inside one product's
//! install folder.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::storage::Storage;
use crate::core::codec::Codec;
use crate::core::document;
use crate::core::format::Format;
use crate::core::location::{Location, USERS_ROOT, parent_of};
use crate::error::{Error, Result};

/// A file found under an installation folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute storage path.
    pub path: String,
    /// Path relative to the installation folder.
    pub name: String,
}

#[derive(Clone)]
pub struct Installation {
    storage: Arc<dyn Storage>,
    location: Location,
}

impl fmt::Debug for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installation")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Installation {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Installation {
    pub fn new(storage: Arc<dyn Storage>, location: Location) -> Self {
        Self { storage, location }
    }

    /// Global installation if present, else (when `assume_user`) the caller's
    /// own per-user installation if present.
    pub fn current(storage: Arc<dyn Storage>, product: &str, assume_user: bool) -> Result<Self> {
        let global = Location::global(product)?;
        if is_present(storage.as_ref(), &global)? {
            debug!(path = %global, "using global installation");
            return Ok(Self::new(storage, global));
        }
        if assume_user {
            let identity = storage.current_identity()?;
            let user = Location::user(&identity, product)?;
            if is_present(storage.as_ref(), &user)? {
                debug!(path = %user, "using user installation");
                return Ok(Self::new(storage, user));
            }
        }
        Err(Error::NotFound(format!("application not installed: {product}")))
    }

    /// The caller's per-user location, whether or not it exists yet.
    pub fn assume_user_home(storage: Arc<dyn Storage>, product: &str) -> Result<Self> {
        let identity = storage.current_identity()?;
        let location = Location::user(&identity, product)?;
        Ok(Self::new(storage, location))
    }

    /// The global location, whether or not it exists yet.
    pub fn assume_global(storage: Arc<dyn Storage>, product: &str) -> Result<Self> {
        let location = Location::global(product)?;
        Ok(Self::new(storage, location))
    }

    /// Every installation of `product`: per-user ones in listing order, then
    /// the global one. Home folders that are not valid identity names are
    /// skipped.
    pub fn existing(storage: Arc<dyn Storage>, product: &str) -> Result<Vec<Self>> {
        let global = Location::global(product)?;
        let mut found = Vec::new();
        let users = match storage.list(USERS_ROOT) {
            Ok(entries) => entries,
            Err(Error::NotFound(_)) => Vec::new(),
            Err(err) => return Err(err),
        };
        for user in users.into_iter().filter(|entry| entry.is_directory) {
            let location = match Location::user(&user.name, product) {
                Ok(location) => location,
                Err(err) => {
                    debug!(folder = %user.name, error = %err, "skipping home folder");
                    continue;
                }
            };
            if is_present(storage.as_ref(), &location)? {
                found.push(Self::new(Arc::clone(&storage), location));
            }
        }
        if is_present(storage.as_ref(), &global)? {
            found.push(Self::new(storage, global));
        }
        Ok(found)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn product(&self) -> &str {
        self.location.product()
    }

    pub fn install_folder(&self) -> &str {
        self.location.base_path()
    }

    pub fn is_global(&self) -> bool {
        self.location.is_global()
    }

    pub fn username(&self) -> Option<&str> {
        self.location.username()
    }

    /// Encodes `value` in the format its filename implies and uploads it,
    /// creating missing folders. Returns the absolute storage path.
    pub fn save<T: Codec>(&self, value: &T, filename: Option<&str>) -> Result<String> {
        let filename = document::resolve_filename::<T>(filename)?;
        let format = Format::from_filename(&filename)?;
        self.save_as(value, &filename, format)
    }

    /// Like [`save`](Self::save) with the format given explicitly.
    pub fn save_as<T: Codec>(&self, value: &T, filename: &str, format: Format) -> Result<String> {
        let raw = document::to_bytes(value, format)?;
        self.upload(filename, &raw)
    }

    pub fn load<T: Codec>(&self, filename: Option<&str>) -> Result<T> {
        let filename = document::resolve_filename::<T>(filename)?;
        let format = Format::from_filename(&filename)?;
        self.load_as(&filename, format)
    }

    pub fn load_as<T: Codec>(&self, filename: &str, format: Format) -> Result<T> {
        T::verify()?;
        let path = self.location.join(filename);
        debug!(path = %path, "loading");
        let raw = self.storage.read(&path)?;
        document::from_bytes(&raw, format, filename)
    }

    /// Like [`load`](Self::load), but a missing file yields the type's defaults.
    pub fn load_or_default<T: Codec>(&self, filename: Option<&str>) -> Result<T> {
        match self.load(filename) {
            Err(Error::NotFound(path)) => {
                debug!(path = %path, "not found, using defaults");
                document::defaults()
            }
            other => other,
        }
    }

    /// Reads and decodes a file from the local disk.
    pub fn load_local<T: Codec>(path: &Path) -> Result<T> {
        let display = path.display().to_string();
        let format = Format::from_filename(&display)?;
        T::verify()?;
        let raw = fs::read(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(display.clone())
            } else {
                Error::Io(err)
            }
        })?;
        document::from_bytes(&raw, format, &display)
    }

    /// Writes raw bytes under the installation folder, creating missing
    /// folders on the first failure. Returns the absolute storage path.
    pub fn upload(&self, filename: &str, raw: &[u8]) -> Result<String> {
        let path = self.location.join(filename);
        match self.storage.write(&path, raw, true) {
            Err(Error::NotFound(_)) => {
                let parent = parent_of(&path);
                debug!(parent, "creating missing folders");
                self.storage.mkdirs(parent)?;
                self.storage.write(&path, raw, true)?;
            }
            other => other?,
        }
        info!(path = %path, bytes = raw.len(), "uploaded");
        Ok(path)
    }

    /// Deletes the installation folder and everything in it.
    pub fn remove(&self) -> Result<()> {
        self.storage.delete(self.install_folder(), true)?;
        info!(path = %self.install_folder(), "removed installation");
        Ok(())
    }

    /// All files under the installation folder, depth first.
    pub fn files(&self) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        self.walk(self.install_folder(), &mut out)?;
        Ok(out)
    }

    fn walk(&self, folder: &str, out: &mut Vec<FileInfo>) -> Result<()> {
        for entry in self.storage.list(folder)? {
            let path = format!("{folder}/{}", entry.name);
            if entry.is_directory {
                self.walk(&path, out)?;
            } else {
                let name = path
                    .strip_prefix(self.install_folder())
                    .unwrap_or(&path)
                    .trim_start_matches('/')
                    .to_string();
                out.push(FileInfo { path, name });
            }
        }
        Ok(())
    }
}

/// A location exists when its parent lists it as a folder.
fn is_present(storage: &dyn Storage, location: &Location) -> Result<bool> {
    match storage.list(location.parent()) {
        Ok(entries) => Ok(entries
            .iter()
            .any(|entry| entry.is_directory && entry.name == location.folder_name())),
        Err(Error::NotFound(_)) => Ok(false),
        Err(err) => Err(err),
    }
}
