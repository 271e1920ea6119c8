//! Whole-document pipeline: typed value ⇄ bytes of one stored file.
//!
//! Save path: verify schema, check format shape, encode, stamp version, render.
//! Load path: verify schema, parse, migrate, decode.

use serde_json::Value;

use super::codec::{self, Codec, Kind, Mapping};
use super::format::Format;
use crate::error::{Error, Result};

/// Explicit filename, else the type's declared default.
pub fn resolve_filename<T: Codec>(filename: Option<&str>) -> Result<String> {
    match filename {
        Some(name) => Ok(name.to_string()),
        None => T::file_name().ok_or_else(|| {
            Error::schema("", format!("no file name given and {} declares none", T::kind()))
        }),
    }
}

pub fn to_bytes<T: Codec>(value: &T, format: Format) -> Result<Vec<u8>> {
    T::verify()?;
    let kind = T::kind();
    format.check(&kind)?;
    let mut tree = codec::encode(value)?;
    if let Some(migrator) = T::migrator() {
        tree = migrator.stamp(tree)?;
    }
    format.render(&tree, &kind)
}

pub fn from_bytes<T: Codec>(raw: &[u8], format: Format, file: &str) -> Result<T> {
    T::verify()?;
    let tree = format.parse(raw, &T::kind())?;
    from_tree(tree, file)
}

/// Migrates a parsed tree to the current version and decodes it.
pub fn from_tree<T: Codec>(tree: Value, file: &str) -> Result<T> {
    let tree = match T::migrator() {
        Some(migrator) => migrator.upgrade(tree, file)?,
        None => tree,
    };
    codec::decode(&tree)
}

/// Value decoded from an empty container: every record field at its default,
/// lists and mappings empty.
pub fn defaults<T: Codec>() -> Result<T> {
    T::verify()?;
    let empty = match T::kind() {
        Kind::Sequence(_) => Value::Array(Vec::new()),
        Kind::Optional(_) | Kind::Any => Value::Null,
        _ => Value::Object(Mapping::new()),
    };
    codec::decode(&empty)
}
