//! Typed configuration persistence for installed products.
//!
//! Typed values are encoded into a generic value tree, rendered as JSON, YAML
//! or CSV by filename extension, versioned and migrated on load, and stored
//! inside a product's install folder (global or per-user). The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (codec, schemas, formats,
//!   migrations, location paths). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations against a [`Storage`] backend:
//!   the [`Installation`] facade, upgrade scripts and releases.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::codec::{Codec, FieldPath, Kind, Mapping, ValueTree};
pub use crate::core::format::Format;
pub use crate::core::location::Location;
pub use crate::core::schema::{Codable, Describe, Fields, Schema};
pub use crate::error::{Error, Result};
pub use crate::io::installation::Installation;
pub use crate::io::storage::{LocalStorage, Storage};
