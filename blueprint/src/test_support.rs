//! Test-only helpers: an in-memory storage backend and sample record types.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};

use crate::core::codec::{FieldPath, Mapping};
use crate::core::location::parent_of;
use crate::core::schema::{Codable, Describe, Schema};
use crate::error::{Error, Result};
use crate::io::installation::Installation;
use crate::io::storage::{Entry, LocalStorage, Storage};

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    writes: Vec<String>,
}

/// Storage kept in memory with the same folder semantics as remote storage:
/// writes need an existing parent folder.
#[derive(Debug)]
pub struct MemoryStorage {
    identity: String,
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new(identity: &str) -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string());
        Self {
            identity: identity.to_string(),
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a file, creating its folders. Not recorded as a write.
    pub fn put(&self, path: &str, bytes: &[u8]) {
        let mut state = self.state();
        add_dirs(&mut state.dirs, parent_of(path));
        state.files.insert(path.to_string(), bytes.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state().dirs.contains(path)
    }

    /// Paths passed to successful writes, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state().writes.clone()
    }
}

fn add_dirs(dirs: &mut BTreeSet<String>, path: &str) {
    let mut current = path.trim_end_matches('/').to_string();
    while !current.is_empty() && dirs.insert(current.clone()) {
        current = parent_of(&current).to_string();
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.file(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, bytes: &[u8], overwrite: bool) -> Result<()> {
        let mut state = self.state();
        let parent = parent_of(path);
        if !state.dirs.contains(parent) {
            return Err(Error::NotFound(parent.to_string()));
        }
        if !overwrite && state.files.contains_key(path) {
            return Err(Error::IllegalState(format!("{path} already exists")));
        }
        state.files.insert(path.to_string(), bytes.to_vec());
        state.writes.push(path.to_string());
        Ok(())
    }

    fn mkdirs(&self, path: &str) -> Result<()> {
        add_dirs(&mut self.state().dirs, path);
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<Entry>> {
        let state = self.state();
        let folder = path.trim_end_matches('/');
        let folder = if folder.is_empty() { "/" } else { folder };
        if !state.dirs.contains(folder) {
            return Err(Error::NotFound(path.to_string()));
        }
        let child_name = |child: &str| child.rsplit('/').next().unwrap_or(child).to_string();
        let mut entries: Vec<Entry> = state
            .dirs
            .iter()
            .filter(|dir| dir.as_str() != "/" && parent_of(dir) == folder)
            .map(|dir| Entry {
                name: child_name(dir),
                is_directory: true,
            })
            .chain(
                state
                    .files
                    .keys()
                    .filter(|file| parent_of(file) == folder)
                    .map(|file| Entry {
                        name: child_name(file),
                        is_directory: false,
                    }),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let mut state = self.state();
        if state.files.remove(path).is_some() {
            return Ok(());
        }
        if path == "/" || !state.dirs.contains(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        let prefix = format!("{path}/");
        let nested = |entry: &String| entry.starts_with(&prefix);
        if !recursive && (state.dirs.iter().any(nested) || state.files.keys().any(nested)) {
            return Err(Error::IllegalState(format!("{path} is not empty")));
        }
        state.dirs.retain(|dir| dir != path && !nested(dir));
        state.files.retain(|file, _| !nested(file));
        Ok(())
    }

    fn current_identity(&self) -> Result<String> {
        Ok(self.identity.clone())
    }
}

/// In-memory storage and the caller's per-user installation on it.
pub fn memory_installation(identity: &str, product: &str) -> (Arc<MemoryStorage>, Installation) {
    let storage = Arc::new(MemoryStorage::new(identity));
    let installation = Installation::assume_user_home(storage.clone(), product)
        .unwrap_or_else(|err| panic!("installation for {identity}/{product}: {err}"));
    (storage, installation)
}

/// Local storage rooted in a fresh temporary directory.
pub fn local_storage(identity: &str) -> (tempfile::TempDir, Arc<LocalStorage>) {
    let temp = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let storage = Arc::new(LocalStorage::new(temp.path(), identity));
    (temp, storage)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub policy_id: String,
    pub name: String,
}

impl Policy {
    pub fn new(policy_id: &str, name: &str) -> Self {
        Self {
            policy_id: policy_id.to_string(),
            name: name.to_string(),
        }
    }
}

impl Describe for Policy {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(Policy {
                policy_id: f.get("policy_id")?,
                name: f.get("name")?,
            })
        })
        .field("policy_id", |p: &Policy| &p.policy_id)
        .field("name", |p: &Policy| &p.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexClass {
    pub name: String,
    pub spark_conf: BTreeMap<String, String>,
    pub policies: Option<Vec<Policy>>,
    pub policies_map: Option<BTreeMap<String, Policy>>,
}

impl Describe for ComplexClass {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(ComplexClass {
                name: f.get("name")?,
                spark_conf: f.get("spark_conf")?,
                policies: f.get("policies")?,
                policies_map: f.get("policies_map")?,
            })
        })
        .field("name", |c: &ComplexClass| &c.name)
        .field("spark_conf", |c: &ComplexClass| &c.spark_conf)
        .field("policies", |c: &ComplexClass| &c.policies)
        .field("policies_map", |c: &ComplexClass| &c.policies_map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl Describe for LogLevel {
    fn describe() -> Schema<Self> {
        Schema::enumeration(&[
            ("DEBUG", LogLevel::Debug),
            ("INFO", LogLevel::Info),
            ("WARN", LogLevel::Warn),
        ])
    }
}

/// Versioned YAML config; v1 stored the thread count as `threads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub inventory_database: String,
    pub workspace_start_path: String,
    pub num_threads: Option<u32>,
    pub log_level: Option<LogLevel>,
    pub include_group_names: Option<Vec<String>>,
}

impl WorkspaceConfig {
    pub fn new(inventory_database: &str) -> Self {
        Self {
            inventory_database: inventory_database.to_string(),
            workspace_start_path: "/".to_string(),
            num_threads: Some(10),
            log_level: Some(LogLevel::Info),
            include_group_names: None,
        }
    }
}

fn rename_threads(mut payload: Mapping) -> Result<Mapping> {
    if let Some(threads) = payload.remove("threads") {
        payload.insert("num_threads".to_string(), threads);
    }
    payload.insert("version".to_string(), json!(2));
    Ok(payload)
}

impl Describe for WorkspaceConfig {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(WorkspaceConfig {
                inventory_database: f.get("inventory_database")?,
                workspace_start_path: f.get("workspace_start_path")?,
                num_threads: f.get("num_threads")?,
                log_level: f.get("log_level")?,
                include_group_names: f.get("include_group_names")?,
            })
        })
        .file("config.yml")
        .version(2)
        .migration(1, rename_threads)
        .field("inventory_database", |c: &WorkspaceConfig| &c.inventory_database)
        .field_or(
            "workspace_start_path",
            |c: &WorkspaceConfig| &c.workspace_start_path,
            "/".to_string(),
        )
        .field_or("num_threads", |c: &WorkspaceConfig| &c.num_threads, Some(10))
        .field_or("log_level", |c: &WorkspaceConfig| &c.log_level, Some(LogLevel::Info))
        .field("include_group_names", |c: &WorkspaceConfig| &c.include_group_names)
    }
}

/// Record whose v1 payloads lack `added_in_v1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolvedConfig {
    pub initial: i64,
    pub added_in_v1: i64,
}

fn add_field(mut payload: Mapping) -> Result<Mapping> {
    payload.insert("added_in_v1".to_string(), json!(111));
    payload.insert("version".to_string(), json!(2));
    Ok(payload)
}

impl Describe for EvolvedConfig {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(EvolvedConfig {
                initial: f.get("initial")?,
                added_in_v1: f.get("added_in_v1")?,
            })
        })
        .file("evolved.json")
        .version(2)
        .migration(1, add_field)
        .field_or("initial", |c: &EvolvedConfig| &c.initial, 0)
        .field_or("added_in_v1", |c: &EvolvedConfig| &c.added_in_v1, 0)
    }
}

/// Keeps its state private and encodes through [`Codable`] hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SomePolicy {
    a: i64,
    b: i64,
}

impl SomePolicy {
    pub fn new(a: i64, b: i64) -> Self {
        Self { a, b }
    }
}

impl Codable for SomePolicy {
    fn to_tree(&self) -> Result<Value> {
        Ok(json!({"a": self.a, "b": self.b}))
    }

    fn from_tree(tree: &Value) -> Result<Self> {
        let part = |name: &str| {
            tree.get(name).and_then(Value::as_i64).ok_or_else(|| {
                Error::schema(FieldPath::root().child(name), "not a int: value is missing")
            })
        };
        Ok(Self {
            a: part("a")?,
            b: part("b")?,
        })
    }
}

impl Describe for SomePolicy {
    fn describe() -> Schema<Self> {
        Schema::custom()
    }
}

/// Flat record stored as CSV rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub workspace_id: i64,
    pub workspace_name: String,
    pub deployment_name: Option<String>,
    pub pricing_tier: Option<String>,
}

impl Workspace {
    pub fn new(workspace_id: i64, workspace_name: &str) -> Self {
        Self {
            workspace_id,
            workspace_name: workspace_name.to_string(),
            deployment_name: None,
            pricing_tier: None,
        }
    }
}

impl Describe for Workspace {
    fn describe() -> Schema<Self> {
        Schema::record(|f| {
            Ok(Workspace {
                workspace_id: f.get("workspace_id")?,
                workspace_name: f.get("workspace_name")?,
                deployment_name: f.get("deployment_name")?,
                pricing_tier: f.get("pricing_tier")?,
            })
        })
        .field("workspace_id", |w: &Workspace| &w.workspace_id)
        .field("workspace_name", |w: &Workspace| &w.workspace_name)
        .field("deployment_name", |w: &Workspace| &w.deployment_name)
        .field("pricing_tier", |w: &Workspace| &w.pricing_tier)
    }
}
