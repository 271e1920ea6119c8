//! Stable exit codes for blueprint CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config, malformed files or other errors.
pub const INVALID: i32 = 1;
/// The product is not installed, or the requested file does not exist.
pub const NOT_FOUND: i32 = 2;
