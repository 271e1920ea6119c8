//! Version stamping and stepwise migration of raw payloads.
//!
//! Versioned types store their schema version under the reserved `version`
//! key. Loading strips the key and runs registered steps `M → M+1` until the
//! payload reaches the current version; saving stamps it back in.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::codec::Mapping;
use crate::error::{Error, Result};

/// Reserved key holding the stored schema version.
pub const VERSION_KEY: &str = "version";

/// Upgrades a raw payload one version forward. The step must set `version`
/// to exactly one more than the version it was registered for.
pub type Migration = fn(Mapping) -> Result<Mapping>;

#[derive(Debug, Clone)]
pub struct Migrator {
    subject: &'static str,
    current: u32,
    steps: BTreeMap<u32, Migration>,
}

impl Migrator {
    pub fn new(subject: &'static str, current: u32, steps: BTreeMap<u32, Migration>) -> Self {
        Self {
            subject,
            current,
            steps,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Every version from 1 up to the current one needs a registered step.
    pub fn verify(&self) -> Result<()> {
        if self.current == 0 {
            return Err(Error::IllegalState(format!(
                "{}: schema versions start at 1",
                self.subject
            )));
        }
        for from in 1..self.current {
            if !self.steps.contains_key(&from) {
                return Err(Error::IllegalState(format!(
                    "{}: missing migration from v{from} to v{}",
                    self.subject,
                    from + 1
                )));
            }
        }
        if let Some(stray) = self.steps.keys().find(|from| **from >= self.current) {
            return Err(Error::IllegalState(format!(
                "{}: migration from v{stray} is past current version v{}",
                self.subject, self.current
            )));
        }
        Ok(())
    }

    /// Puts the current version first in an encoded record.
    pub fn stamp(&self, tree: Value) -> Result<Value> {
        let Value::Object(fields) = tree else {
            return Err(Error::schema(
                "",
                format!("{}: versioned values must encode to a mapping", self.subject),
            ));
        };
        let mut out = Mapping::new();
        out.insert(VERSION_KEY.to_string(), Value::from(self.current));
        for (key, value) in fields {
            if key != VERSION_KEY {
                out.insert(key, value);
            }
        }
        Ok(Value::Object(out))
    }

    /// Brings a parsed tree up to the current version and drops the version key.
    pub fn upgrade(&self, tree: Value, file: &str) -> Result<Value> {
        let Value::Object(payload) = tree else {
            return Err(Error::schema("", format!("{file}: expected a mapping, got {tree}")));
        };
        self.migrate(payload, file).map(Value::Object)
    }

    pub fn migrate(&self, mut payload: Mapping, file: &str) -> Result<Mapping> {
        self.verify()?;
        let mut version = stored_version(&mut payload, file)?;
        if version > u64::from(self.current) {
            return Err(Error::UnsupportedDowngrade {
                file: file.to_string(),
                stored: version,
                current: self.current,
            });
        }
        while version < u64::from(self.current) {
            let from = u32::try_from(version).map_err(|_| {
                Error::IllegalState(format!("{file}: unresolved version v{version}"))
            })?;
            let step = self.steps.get(&from).ok_or_else(|| {
                Error::IllegalState(format!(
                    "{file}: missing migration from v{from} to v{}",
                    from + 1
                ))
            })?;
            debug!(file, subject = self.subject, from = version, to = version + 1, "migrating");
            payload = step(payload)?;
            let reached = stored_version(&mut payload, file)?;
            if reached != version + 1 {
                return Err(Error::IllegalState(format!(
                    "{file}: migration from v{version} produced v{reached}, expected v{}",
                    version + 1
                )));
            }
            version = reached;
        }
        Ok(payload)
    }
}

/// Removes the `version` key, defaulting to 1 when absent.
fn stored_version(payload: &mut Mapping, file: &str) -> Result<u64> {
    match payload.remove(VERSION_KEY) {
        None => Ok(1),
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|v| *v > 0)
            .ok_or_else(|| Error::IllegalState(format!("{file}: unresolved version {n}"))),
        Some(other) => Err(Error::IllegalState(format!(
            "{file}: unresolved version {other}"
        ))),
    }
}
