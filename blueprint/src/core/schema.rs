//! Schema descriptors: the registered shape of record and enumeration types.
//!
//! A type opts into the codec by implementing [`Describe`], which builds a
//! [`Schema`] listing its fields in declaration order, their defaults, the
//! file it is stored in, and its version history. Every `Describe` type is a
//! [`Codec`] through the blanket impl at the bottom of this module.
//!
//! ```
//! use blueprint::{Describe, Schema};
//!
//! #[derive(Debug, PartialEq)]
//! struct Policy {
//!     policy_id: String,
//!     name: String,
//!     retries: u32,
//! }
//!
//! impl Describe for Policy {
//!     fn describe() -> Schema<Self> {
//!         Schema::record(|f| {
//!             Ok(Policy {
//!                 policy_id: f.get("policy_id")?,
//!                 name: f.get("name")?,
//!                 retries: f.get("retries")?,
//!             })
//!         })
//!         .field("policy_id", |p: &Policy| &p.policy_id)
//!         .field("name", |p: &Policy| &p.name)
//!         .field_or("retries", |p: &Policy| &p.retries, 3)
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use serde_json::Value;

use super::codec::{Codec, FieldKind, FieldPath, Kind, Mapping};
use super::migrate::{Migration, Migrator};
use crate::error::{Error, Result};

/// Registers the schema of a record or enumeration type.
pub trait Describe: Sized + 'static {
    fn describe() -> Schema<Self>;
}

/// Custom to-tree/from-tree hooks for types whose representation is not a
/// plain field set. Enabled per type with [`Schema::codable`].
pub trait Codable: Sized {
    fn to_tree(&self) -> Result<Value>;

    fn from_tree(tree: &Value) -> Result<Self>;
}

/// Builds a record from its decoded fields.
pub type Build<T> = fn(&Fields<'_>) -> Result<T>;

type FieldEncoder<T> = Box<dyn Fn(&T, &FieldPath) -> Result<Value>>;

struct Field<T> {
    name: &'static str,
    kind: Kind,
    default: Option<Value>,
    encode: FieldEncoder<T>,
}

enum Body<T> {
    Record {
        fields: Vec<Field<T>>,
        build: Build<T>,
    },
    Enumeration {
        labels: Vec<&'static str>,
        label_of: Box<dyn Fn(&T) -> Option<&'static str>>,
        from_label: Box<dyn Fn(&str) -> Option<T>>,
    },
}

struct Hooks<T> {
    to_tree: fn(&T) -> Result<Value>,
    from_tree: fn(&Value) -> Result<T>,
}

/// Structural description of `T`.
pub struct Schema<T> {
    name: &'static str,
    file: Option<&'static str>,
    version: Option<u32>,
    migrations: BTreeMap<u32, Migration>,
    body: Body<T>,
    hooks: Option<Hooks<T>>,
    problems: Vec<String>,
}

impl<T: 'static> Schema<T> {
    /// Record schema; fields are added with [`field`](Self::field) in
    /// declaration order and `build` assembles the value on decode.
    pub fn record(build: Build<T>) -> Self {
        Self::with_body(Body::Record {
            fields: Vec::new(),
            build,
        })
    }

    /// Enumeration stored as its label; labels must be unique.
    pub fn enumeration(variants: &[(&'static str, T)]) -> Self
    where
        T: Clone + PartialEq,
    {
        let labels: Vec<&'static str> = variants.iter().map(|(label, _)| *label).collect();
        let by_variant = variants.to_vec();
        let by_label = variants.to_vec();
        let mut schema = Self::with_body(Body::Enumeration {
            labels: labels.clone(),
            label_of: Box::new(move |value: &T| {
                by_variant
                    .iter()
                    .find(|(_, variant)| variant == value)
                    .map(|(label, _)| *label)
            }),
            from_label: Box::new(move |label: &str| {
                by_label
                    .iter()
                    .find(|(candidate, _)| *candidate == label)
                    .map(|(_, variant)| variant.clone())
            }),
        });
        let mut seen = BTreeSet::new();
        for label in labels {
            if !seen.insert(label) {
                schema.problems.push(format!("duplicate label {label}"));
            }
        }
        schema
    }

    /// Schema for a type that is only ever encoded through its [`Codable`] hooks.
    pub fn custom() -> Self
    where
        T: Codable,
    {
        Self::record(hooks_only::<T>).codable()
    }

    fn with_body(body: Body<T>) -> Self {
        Self {
            name: short_type_name::<T>(),
            file: None,
            version: None,
            migrations: BTreeMap::new(),
            body,
            hooks: None,
            problems: Vec::new(),
        }
    }

    /// Overrides the type name used in errors and file name inference.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Default file name for saves and loads that name none.
    pub fn file(mut self, file: &'static str) -> Self {
        self.file = Some(file);
        self
    }

    /// Declares the current schema version, stored under the `version` key.
    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Registers the upgrade of raw payloads stored at version `from`.
    pub fn migration(mut self, from: u32, step: Migration) -> Self {
        if self.migrations.insert(from, step).is_some() {
            self.problems
                .push(format!("migration from v{from} registered twice"));
        }
        self
    }

    /// Declares a field without a default.
    pub fn field<F, G>(self, name: &'static str, get: G) -> Self
    where
        F: Codec,
        G: Fn(&T) -> &F + 'static,
    {
        self.push_field(name, get, None)
    }

    /// Declares a field that falls back to `default` when missing on decode.
    pub fn field_or<F, G>(mut self, name: &'static str, get: G, default: F) -> Self
    where
        F: Codec,
        G: Fn(&T) -> &F + 'static,
    {
        match default.encode(&FieldPath::root().child(name)) {
            Ok(value) => self.push_field(name, get, Some(value)),
            Err(err) => {
                self.problems.push(format!("default for {name}: {err}"));
                self
            }
        }
    }

    fn push_field<F, G>(mut self, name: &'static str, get: G, default: Option<Value>) -> Self
    where
        F: Codec,
        G: Fn(&T) -> &F + 'static,
    {
        match &mut self.body {
            Body::Record { fields, .. } => {
                if fields.iter().any(|field| field.name == name) {
                    self.problems.push(format!("duplicate field {name}"));
                } else {
                    fields.push(Field {
                        name,
                        kind: F::kind(),
                        default,
                        encode: Box::new(move |record, path| get(record).encode(path)),
                    });
                }
            }
            Body::Enumeration { .. } => {
                self.problems
                    .push(format!("enumeration cannot declare field {name}"));
            }
        }
        self
    }

    /// Routes encoding and decoding through the type's [`Codable`] hooks.
    pub fn codable(mut self) -> Self
    where
        T: Codable,
    {
        self.hooks = Some(Hooks {
            to_tree: T::to_tree,
            from_tree: T::from_tree,
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared file name, or the lower-kebab-cased type name as JSON.
    pub fn file_name(&self) -> String {
        match self.file {
            Some(file) => file.to_string(),
            None => format!("{}.json", kebab_case(self.name)),
        }
    }

    pub fn current_version(&self) -> Option<u32> {
        self.version
    }

    pub fn is_enumeration(&self) -> bool {
        matches!(self.body, Body::Enumeration { .. })
    }

    /// Field names and kinds in declaration order.
    pub fn field_kinds(&self) -> Vec<FieldKind> {
        match &self.body {
            Body::Record { fields, .. } => fields
                .iter()
                .map(|field| FieldKind {
                    name: field.name,
                    kind: field.kind.clone(),
                })
                .collect(),
            Body::Enumeration { .. } => Vec::new(),
        }
    }

    pub fn labels(&self) -> &[&'static str] {
        match &self.body {
            Body::Enumeration { labels, .. } => labels,
            Body::Record { .. } => &[],
        }
    }

    pub fn migrator(&self) -> Option<Migrator> {
        self.version
            .map(|current| Migrator::new(self.name, current, self.migrations.clone()))
    }

    /// Rejects schemas that were registered inconsistently, including a
    /// migration chain with gaps. Runs before any payload is processed.
    pub fn verify(&self) -> Result<()> {
        if !self.problems.is_empty() {
            return Err(Error::IllegalState(format!(
                "{}: {}",
                self.name,
                self.problems.join("; ")
            )));
        }
        match self.migrator() {
            Some(migrator) => migrator.verify(),
            None if !self.migrations.is_empty() => Err(Error::IllegalState(format!(
                "{}: migrations registered without a current version",
                self.name
            ))),
            None => Ok(()),
        }
    }

    pub fn encode(&self, value: &T, path: &FieldPath) -> Result<Value> {
        if let Some(hooks) = &self.hooks {
            return (hooks.to_tree)(value);
        }
        match &self.body {
            Body::Record { fields, .. } => {
                let mut out = Mapping::new();
                for field in fields {
                    let encoded = (field.encode)(value, &path.child(field.name))?;
                    // An explicit null keeps `None` from decoding as a non-null default.
                    if encoded.is_null() && field.default.as_ref().is_none_or(Value::is_null) {
                        continue;
                    }
                    out.insert(field.name.to_string(), encoded);
                }
                Ok(Value::Object(out))
            }
            Body::Enumeration { label_of, .. } => label_of(value)
                .map(|label| Value::String(label.to_string()))
                .ok_or_else(|| Error::schema(path, format!("{}: variant has no label", self.name))),
        }
    }

    pub fn decode(&self, value: &Value, path: &FieldPath) -> Result<T> {
        if let Some(hooks) = &self.hooks {
            return (hooks.from_tree)(value);
        }
        match &self.body {
            Body::Record { fields, build } => {
                let Value::Object(map) = value else {
                    return Err(Error::schema(path, format!("not a {}: {value}", self.name)));
                };
                let declared = fields
                    .iter()
                    .map(|field| (field.name, field.default.as_ref()))
                    .collect();
                build(&Fields {
                    subject: self.name,
                    map,
                    declared,
                    path: path.clone(),
                })
            }
            Body::Enumeration {
                labels, from_label, ..
            } => {
                let Value::String(label) = value else {
                    return Err(Error::schema(path, format!("not a {}: {value}", self.name)));
                };
                from_label(label).ok_or_else(|| {
                    Error::schema(
                        path,
                        format!(
                            "{label} is not a {} (expected one of: {})",
                            self.name,
                            labels.join(", ")
                        ),
                    )
                })
            }
        }
    }
}

/// Decoded view of one record mapping, handed to [`Build`] functions.
pub struct Fields<'a> {
    subject: &'static str,
    map: &'a Mapping,
    declared: Vec<(&'static str, Option<&'a Value>)>,
    path: FieldPath,
}

impl Fields<'_> {
    /// Decodes declared field `name`. A missing key falls back to the
    /// declared default, then to [`Codec::absent`]. A null decodes as `None`
    /// for optional fields and is treated as missing otherwise.
    pub fn get<F: Codec>(&self, name: &str) -> Result<F> {
        let path = self.path.child(name);
        let Some((_, default)) = self.declared.iter().find(|(field, _)| *field == name) else {
            return Err(Error::IllegalState(format!(
                "{}: {name} is not a declared field",
                self.subject
            )));
        };
        match self.map.get(name) {
            Some(Value::Null) if matches!(F::kind(), Kind::Optional(_)) => {
                F::decode(&Value::Null, &path)
            }
            Some(value) if !value.is_null() => F::decode(value, &path),
            _ => match *default {
                Some(default) => F::decode(default, &path),
                None => F::absent(&path),
            },
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }
}

fn hooks_only<T>(fields: &Fields<'_>) -> Result<T> {
    Err(Error::IllegalState(format!(
        "{}: type decodes only through its Codable hooks",
        fields.path()
    )))
}

thread_local! {
    static SCHEMAS: RefCell<HashMap<TypeId, Rc<dyn Any>>> = RefCell::new(HashMap::new());
}

/// The schema `T` describes, built once per thread and shared afterwards.
pub fn schema_of<T: Describe>() -> Rc<Schema<T>> {
    let id = TypeId::of::<T>();
    let cached = SCHEMAS.with(|cache| cache.borrow().get(&id).cloned());
    if let Some(schema) = cached.and_then(|any| any.downcast::<Schema<T>>().ok()) {
        return schema;
    }
    // Built outside the borrow: field registration resolves nested schemas.
    let schema = Rc::new(T::describe());
    let shared: Rc<dyn Any> = schema.clone();
    SCHEMAS.with(|cache| cache.borrow_mut().insert(id, shared));
    schema
}

fn record_fields<T: Describe>() -> Vec<FieldKind> {
    schema_of::<T>().field_kinds()
}

impl<T: Describe> Codec for T {
    fn kind() -> Kind {
        let schema = schema_of::<T>();
        if schema.is_enumeration() {
            Kind::Enumeration(schema.name())
        } else {
            Kind::Record {
                name: schema.name(),
                fields: record_fields::<T>,
            }
        }
    }

    fn encode(&self, path: &FieldPath) -> Result<Value> {
        schema_of::<T>().encode(self, path)
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        schema_of::<T>().decode(value, path)
    }

    fn file_name() -> Option<String> {
        Some(schema_of::<T>().file_name())
    }

    fn migrator() -> Option<Migrator> {
        schema_of::<T>().migrator()
    }

    fn verify() -> Result<()> {
        schema_of::<T>().verify()
    }
}

/// Last path segment of the Rust type name (`my_crate::cfg::WorkspaceConfig`
/// becomes `WorkspaceConfig`).
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// `WorkspaceConfig` → `workspace-config`.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::codec::{decode, encode};
    use crate::test_support::{ComplexClass, LogLevel, Policy, SomePolicy, WorkspaceConfig};

    #[test]
    fn records_encode_fields_in_declaration_order() {
        let policy = Policy::new("123", "foo");
        let tree = encode(&policy).expect("encode");
        assert_eq!(
            serde_json::to_string(&tree).expect("json"),
            r#"{"policy_id":"123","name":"foo"}"#
        );
    }

    #[test]
    fn unset_optionals_are_omitted_and_round_trip() {
        let value = ComplexClass {
            name: "test".to_string(),
            spark_conf: [("key".to_string(), "value".to_string())].into(),
            policies: None,
            policies_map: None,
        };
        let tree = encode(&value).expect("encode");
        assert_eq!(tree, json!({"name": "test", "spark_conf": {"key": "value"}}));
        let back: ComplexClass = decode(&tree).expect("decode");
        assert_eq!(back, value);
    }

    #[test]
    fn nested_records_round_trip() {
        let value = ComplexClass {
            name: "test".to_string(),
            spark_conf: [("key".to_string(), "value".to_string())].into(),
            policies: Some(vec![Policy::new("123", "foo")]),
            policies_map: Some([("123".to_string(), Policy::new("123", "foo"))].into()),
        };
        let tree = encode(&value).expect("encode");
        assert_eq!(
            tree,
            json!({
                "name": "test",
                "spark_conf": {"key": "value"},
                "policies": [{"policy_id": "123", "name": "foo"}],
                "policies_map": {"123": {"policy_id": "123", "name": "foo"}},
            })
        );
        assert_eq!(decode::<ComplexClass>(&tree).expect("decode"), value);
    }

    #[test]
    fn missing_keys_use_declared_defaults() {
        let cfg: WorkspaceConfig = decode(&json!({"inventory_database": "db"})).expect("decode");
        assert_eq!(cfg.num_threads, Some(10));
        assert_eq!(cfg.workspace_start_path, "/");
        assert_eq!(cfg.log_level, Some(LogLevel::Info));
        assert_eq!(cfg.include_group_names, None);
    }

    #[test]
    fn unset_optionals_with_defaults_stay_unset() {
        let mut cfg = WorkspaceConfig::new("db");
        cfg.num_threads = None;
        cfg.log_level = None;
        let tree = encode(&cfg).expect("encode");
        assert_eq!(tree["num_threads"], Value::Null);
        assert_eq!(tree["log_level"], Value::Null);
        assert!(tree.get("include_group_names").is_none());
        assert_eq!(decode::<WorkspaceConfig>(&tree).expect("decode"), cfg);
    }

    #[test]
    fn missing_required_key_is_schema_error() {
        let err = decode::<WorkspaceConfig>(&json!({"num_threads": 3})).expect_err("missing");
        assert!(matches!(err, Error::Schema { .. }), "{err}");
        assert!(err.to_string().starts_with("inventory_database: "), "{err}");
    }

    #[test]
    fn null_for_required_field_is_schema_error() {
        let err = decode::<Policy>(&json!({"policy_id": null, "name": "x"})).expect_err("null");
        assert!(matches!(err, Error::Schema { .. }), "{err}");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let policy: Policy =
            decode(&json!({"policy_id": "1", "name": "n", "added_later": [1, 2]})).expect("decode");
        assert_eq!(policy, Policy::new("1", "n"));
    }

    #[test]
    fn nested_errors_carry_full_path() {
        let err = decode::<ComplexClass>(&json!({
            "name": "x",
            "spark_conf": {},
            "policies": [{"policy_id": "1"}],
        }))
        .expect_err("missing nested");
        assert!(err.to_string().starts_with("policies.0.name: "), "{err}");
    }

    #[test]
    fn enumerations_use_exact_labels() {
        assert_eq!(encode(&LogLevel::Debug).expect("encode"), json!("DEBUG"));
        assert_eq!(decode::<LogLevel>(&json!("WARN")).expect("decode"), LogLevel::Warn);
        let err = decode::<LogLevel>(&json!("warn")).expect_err("case");
        assert!(matches!(err, Error::Schema { .. }), "{err}");
        assert!(err.to_string().contains("expected one of: DEBUG, INFO, WARN"), "{err}");
    }

    #[test]
    fn codable_hooks_take_precedence() {
        let policy = SomePolicy::new(1, 2);
        let tree = encode(&policy).expect("encode");
        assert_eq!(tree, json!({"a": 1, "b": 2}));
        assert_eq!(decode::<SomePolicy>(&tree).expect("decode"), policy);
    }

    #[test]
    fn kind_exposes_record_fields() {
        let Kind::Record { name, fields } = Policy::kind() else {
            panic!("expected record kind");
        };
        assert_eq!(name, "Policy");
        let names: Vec<&str> = fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["policy_id", "name"]);
    }

    #[test]
    fn file_name_defaults_to_kebab_case_json() {
        assert_eq!(Policy::describe().file_name(), "policy.json");
        assert_eq!(WorkspaceConfig::describe().file_name(), "config.yml");
        assert_eq!(kebab_case("SomeConfig"), "some-config");
        assert_eq!(kebab_case("AppliedUpgrades"), "applied-upgrades");
    }

    #[derive(Debug)]
    struct Twice {
        a: i64,
    }

    impl Describe for Twice {
        fn describe() -> Schema<Self> {
            Schema::record(|f| Ok(Twice { a: f.get("a")? }))
                .field("a", |t: &Twice| &t.a)
                .field("a", |t: &Twice| &t.a)
        }
    }

    #[derive(Debug)]
    struct Misspelled {
        name: String,
    }

    impl Describe for Misspelled {
        fn describe() -> Schema<Self> {
            Schema::record(|f| Ok(Misspelled { name: f.get("nmae")? }))
                .field("name", |m: &Misspelled| &m.name)
        }
    }

    #[test]
    fn undeclared_field_names_are_rejected() {
        let err = decode::<Misspelled>(&json!({"name": "x"})).expect_err("typo");
        assert!(matches!(err, Error::IllegalState(_)), "{err}");
        assert!(err.to_string().contains("nmae is not a declared field"), "{err}");
    }

    #[test]
    fn schemas_are_built_once_per_type() {
        assert!(Rc::ptr_eq(&schema_of::<Policy>(), &schema_of::<Policy>()));
        assert_eq!(schema_of::<WorkspaceConfig>().current_version(), Some(2));
    }

    #[test]
    fn duplicate_fields_fail_verification() {
        let err = Twice::describe().verify().expect_err("duplicate");
        assert!(matches!(err, Error::IllegalState(_)), "{err}");
        assert!(err.to_string().contains("duplicate field a"), "{err}");
    }
}
