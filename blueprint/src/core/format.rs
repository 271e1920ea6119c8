//! Format adapters between value trees and encoded bytes.
//!
//! The adapter is picked from the filename extension. JSON and YAML carry any
//! tree; CSV only carries flat lists of records (see [`super::table`]).

use std::path::Path;

use serde_json::Value;

use super::codec::Kind;
use super::table;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Csv,
}

impl Format {
    /// `.json`, `.yml`/`.yaml` and `.csv`; anything else is [`Error::UnknownFormat`].
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension {
            "json" => Ok(Format::Json),
            "yml" | "yaml" => Ok(Format::Yaml),
            "csv" => Ok(Format::Csv),
            _ => Err(Error::UnknownFormat(filename.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yml",
            Format::Csv => "csv",
        }
    }

    /// Refuses kinds this format cannot hold before any value is encoded.
    pub fn check(self, kind: &Kind) -> Result<()> {
        match self {
            Format::Csv => table::columns(kind).map(|_| ()),
            Format::Json | Format::Yaml => Ok(()),
        }
    }

    pub fn render(self, tree: &Value, kind: &Kind) -> Result<Vec<u8>> {
        match self {
            Format::Json => {
                let mut raw = serde_json::to_vec_pretty(tree)?;
                raw.push(b'\n');
                Ok(raw)
            }
            Format::Yaml => Ok(serde_yaml::to_string(tree)?.into_bytes()),
            Format::Csv => table::render(tree, &table::columns(kind)?),
        }
    }

    /// Untyped (`Kind::Any`) CSV loads keep every cell as text.
    pub fn parse(self, raw: &[u8], kind: &Kind) -> Result<Value> {
        match self {
            Format::Json => Ok(serde_json::from_slice(raw)?),
            Format::Yaml => Ok(serde_yaml::from_slice(raw)?),
            Format::Csv if matches!(kind, Kind::Any) => table::parse(raw, &[]),
            Format::Csv => table::parse(raw, &table::columns(kind)?),
        }
    }
}
