//! Deterministic, pure logic for the persistence layer.
//!
//! Core modules must be free of I/O side effects. They convert between typed
//! values, generic trees and encoded bytes, and compute installation paths.

pub mod codec;
pub mod document;
pub mod format;
pub mod location;
pub mod migrate;
pub mod schema;
pub mod table;
