//! Extracted model definitions.
//!
//! This module defines the records produced by the extractors and consumed
//! by the generators. Every record is immutable once produced: a changed
//! source file replaces its [`PackageInfo`] wholesale.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a named type can be imported from in generated code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TypeSource {
    /// An analyzed source file (absolute path).
    File(PathBuf),
    /// A bare module specifier such as `electron` or `@app/shared`.
    Module(String),
}

/// A type-only import required by a rendered type expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeImport {
    /// Name exported by the source module.
    pub imported: String,

    /// Name used inside the type text.
    pub local: String,

    /// Module the name comes from.
    pub source: TypeSource,

    /// Whether this is a namespace import (`import type * as ns`).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub namespace: bool,
}

impl TypeImport {
    /// Create a named import where the local name equals the exported name.
    pub fn named(name: impl Into<String>, source: TypeSource) -> Self {
        let name = name.into();
        Self {
            imported: name.clone(),
            local: name,
            source,
            namespace: false,
        }
    }

    /// Create a namespace import.
    pub fn namespace(local: impl Into<String>, source: TypeSource) -> Self {
        let local = local.into();
        Self {
            imported: local.clone(),
            local,
            source,
            namespace: true,
        }
    }
}

/// One flattened request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedField {
    /// Field name.
    pub name: String,

    /// Rendered type expression, already carrying `| undefined` when optional.
    pub type_text: String,

    /// Whether the source member was optional.
    #[serde(default)]
    pub optional: bool,

    /// Type imports needed to render `type_text` outside its source file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<TypeImport>,
}

impl ResolvedField {
    /// Create a required field with no imports.
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            optional: false,
            imports: Vec::new(),
        }
    }

    /// Create an optional field, appending `| undefined` unless already present.
    pub fn optional(name: impl Into<String>, type_text: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            type_text: with_undefined(type_text.as_ref()),
            optional: true,
            imports: Vec::new(),
        }
    }

    /// Attach type imports.
    pub fn with_imports(mut self, imports: Vec<TypeImport>) -> Self {
        self.imports = imports;
        self
    }
}

/// Append `| undefined` to a type text unless the union already carries it.
pub fn with_undefined(type_text: &str) -> String {
    let already = type_text
        .split('|')
        .any(|member| member.trim() == "undefined");
    if already {
        type_text.to_string()
    } else {
        format!("{type_text} | undefined")
    }
}

/// How a non-context parameter receives its value from the flattened argument bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum ParamBinding {
    /// Object-shaped parameter: receives the whole bag.
    Bag,
    /// Opaque parameter: receives `bag[name]`.
    Field(String),
    /// Rest parameter: receives the elements of `bag[name]`.
    Spread(String),
}

/// One exported, context-first API function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    /// Function name, also the IPC channel name.
    pub name: String,

    /// Flattened request fields in declaration order.
    pub request: Vec<ResolvedField>,

    /// One binding per non-context parameter, in parameter order.
    #[serde(default)]
    pub bindings: Vec<ParamBinding>,

    /// Exported validator sibling, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_name: Option<String>,

    /// Exported per-function error handler sibling, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler_name: Option<String>,
}

impl FunctionEntry {
    /// Create an entry with no request fields and no companions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: Vec::new(),
            bindings: Vec::new(),
            validator_name: None,
            error_handler_name: None,
        }
    }

    /// All type imports referenced by the request fields.
    pub fn type_imports(&self) -> impl Iterator<Item = &TypeImport> {
        self.request.iter().flat_map(|field| field.imports.iter())
    }
}

/// One source file's extracted API surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    /// Absolute path of the source file.
    pub path: PathBuf,

    /// Extracted functions.
    pub func: Vec<FunctionEntry>,
}

/// One declared event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    /// Alias name, also the IPC channel name.
    pub name: String,

    /// Referenced payload type name.
    pub param_type_name: String,

    /// Where the payload type can be imported from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_import: Option<TypeImport>,
}

/// One source file's declared events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPackageInfo {
    /// Absolute path of the source file.
    pub path: PathBuf,

    /// Declared events.
    pub events: Vec<EventInfo>,
}

/// Records keyed by their source path.
pub trait SourceKeyed {
    /// Absolute source path.
    fn source_path(&self) -> &Path;

    /// Sort the record's own entries by name.
    fn sort_entries(&mut self);
}

impl SourceKeyed for PackageInfo {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn sort_entries(&mut self) {
        self.func.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

impl SourceKeyed for EventPackageInfo {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn sort_entries(&mut self) {
        self.events.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Sort records by path, then each record's entries by name.
pub fn sort_by_path<T: SourceKeyed>(records: &mut [T]) {
    records.sort_by(|a, b| a.source_path().cmp(b.source_path()));
    for record in records.iter_mut() {
        record.sort_entries();
    }
}

/// Replace the records for `paths` in `existing` with `updated`.
///
/// Entries whose path is in `paths` are removed first, then `updated` is
/// appended. The result is not sorted.
pub fn merge_records<T: SourceKeyed>(existing: Vec<T>, paths: &[PathBuf], updated: Vec<T>) -> Vec<T> {
    let mut merged: Vec<T> = existing
        .into_iter()
        .filter(|record| !paths.iter().any(|path| path == record.source_path()))
        .collect();
    merged.extend(updated);
    merged
}

/// Remove every record whose path equals `path` or lies beneath it.
///
/// Returns `true` when something was removed.
pub fn remove_records<T: SourceKeyed>(records: &mut Vec<T>, path: &Path) -> bool {
    let before = records.len();
    records.retain(|record| !record.source_path().starts_with(path));
    records.len() != before
}
