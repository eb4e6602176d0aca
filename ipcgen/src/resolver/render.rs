//! Rendering type nodes for use outside their source file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::index::{ImportKind, TypeName, TypeNode};
use super::{paths, TypeProgram};
use crate::model::{TypeImport, TypeSource};

/// Global and built-in type names that never need an import.
const GLOBAL_TYPES: &[&str] = &[
    "Array", "ReadonlyArray", "Promise", "PromiseLike", "Record", "Partial", "Required",
    "Readonly", "Pick", "Omit", "Exclude", "Extract", "NonNullable", "ReturnType", "Parameters",
    "InstanceType", "Awaited", "Uppercase", "Lowercase", "Capitalize", "Uncapitalize", "Date",
    "Map", "Set", "WeakMap", "WeakSet", "ReadonlyMap", "ReadonlySet", "Error", "RegExp",
    "Function", "Object", "String", "Number", "Boolean", "Symbol", "BigInt", "Iterable",
    "Iterator", "AsyncIterable", "AsyncIterator", "ArrayBuffer", "SharedArrayBuffer", "DataView",
    "Uint8Array", "Int8Array", "Uint16Array", "Int16Array", "Uint32Array", "Int32Array",
    "Float32Array", "Float64Array", "BigInt64Array", "BigUint64Array", "Buffer", "Blob", "File",
    "URL", "URLSearchParams", "JSON", "Math",
];

/// A type expression ready to paste into generated code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendered {
    pub text: String,
    pub imports: Vec<TypeImport>,
    /// Local declarations the text refers to that no other module can import.
    pub unexported: Vec<String>,
}

impl Rendered {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            imports: Vec::new(),
            unexported: Vec::new(),
        }
    }
}

/// How a referenced type name reaches generated code.
enum NameSource {
    Import(TypeImport),
    /// Declared in the file but not exported.
    Unexported,
    /// Global, a type parameter, or unresolvable.
    Unknown,
}

/// Type parameters bound while expanding a generic declaration.
#[derive(Debug, Clone, Default)]
pub(crate) struct Env {
    bindings: HashMap<String, Binding>,
}

/// A type argument together with the scope it was written in.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub rendered: Rendered,
    pub file: PathBuf,
    pub node: TypeNode,
    pub env: Env,
}

impl Env {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn insert(&mut self, name: String, binding: Binding) {
        self.bindings.insert(name, binding);
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

pub(crate) fn push_imports(into: &mut Vec<TypeImport>, imports: &[TypeImport]) {
    for import in imports {
        if !into.contains(import) {
            into.push(import.clone());
        }
    }
}

pub(crate) fn push_names(into: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !into.contains(name) {
            into.push(name.clone());
        }
    }
}

impl TypeProgram {
    /// Render a type node from `file` together with its required imports.
    pub fn render(&self, file: &Path, ty: &TypeNode) -> Rendered {
        self.render_in(file, ty, &Env::default())
    }

    /// Imports needed to use a type node from `file` in another module.
    pub fn type_imports(&self, file: &Path, ty: &TypeNode) -> Vec<TypeImport> {
        self.render(file, ty).imports
    }

    /// Where a single local type name of `file` can be imported from.
    pub fn import_for(&self, file: &Path, local: &str) -> Option<TypeImport> {
        match self.source_of(file, &TypeName::simple(local)) {
            NameSource::Import(import) => Some(import),
            NameSource::Unexported | NameSource::Unknown => None,
        }
    }

    pub(crate) fn render_in(&self, file: &Path, ty: &TypeNode, env: &Env) -> Rendered {
        let text = if env.is_empty() {
            ty.text.clone()
        } else {
            substitute(&ty.text, env)
        };

        let mut imports = Vec::new();
        let mut unexported = Vec::new();
        for name in &ty.refs {
            if name.is_simple() {
                if let Some(binding) = env.get(name.head()) {
                    push_imports(&mut imports, &binding.rendered.imports);
                    push_names(&mut unexported, &binding.rendered.unexported);
                    continue;
                }
            }
            match self.source_of(file, name) {
                NameSource::Import(import) => {
                    push_imports(&mut imports, std::slice::from_ref(&import));
                }
                NameSource::Unexported => {
                    push_names(&mut unexported, &[name.head().to_string()]);
                }
                NameSource::Unknown => {}
            }
        }
        Rendered {
            text,
            imports,
            unexported,
        }
    }

    fn source_of(&self, file: &Path, name: &TypeName) -> NameSource {
        let Some(module) = self.module(file) else {
            return NameSource::Unknown;
        };
        let head = name.head();

        if let Some(binding) = module.imports.get(head) {
            let source = if paths::is_relative(&binding.specifier) {
                let target = self
                    .resolve_module(file, &binding.specifier)
                    .unwrap_or_else(|| paths::specifier_target(file, &binding.specifier));
                TypeSource::File(target)
            } else {
                TypeSource::Module(binding.specifier.clone())
            };
            return NameSource::Import(match &binding.kind {
                ImportKind::Named(imported) => TypeImport {
                    imported: imported.clone(),
                    local: head.to_string(),
                    source,
                    namespace: false,
                },
                ImportKind::Default => TypeImport {
                    imported: "default".to_string(),
                    local: head.to_string(),
                    source,
                    namespace: false,
                },
                ImportKind::Namespace => TypeImport::namespace(head, source),
            });
        }

        if module.declares(head) {
            return match module.export_name_of(head) {
                Some(exported) => NameSource::Import(TypeImport {
                    imported: exported.to_string(),
                    local: head.to_string(),
                    source: TypeSource::File(file.to_path_buf()),
                    namespace: false,
                }),
                None => {
                    debug!(
                        file = %file.display(),
                        name = head,
                        "Type is not exported, generated code cannot import it"
                    );
                    NameSource::Unexported
                }
            };
        }

        if !GLOBAL_TYPES.contains(&head) {
            debug!(file = %file.display(), name = head, "Unresolved type reference");
        }
        NameSource::Unknown
    }
}

/// Replace type-parameter identifiers in `text` with their bound text.
///
/// String literals, member accesses (`x.T`) and property keys (`{ T: ... }`)
/// are left alone.
pub(crate) fn substitute(text: &str, env: &Env) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '\'' | '"' | '`') {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            out.extend(&chars[start..i]);
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let previous = chars[..start].iter().rev().find(|c| !c.is_whitespace());
            let next = chars[i..].iter().find(|c| !c.is_whitespace());
            let member_access = previous == Some(&'.');
            let property_key = matches!(previous, Some('{' | ';' | ',' | '('))
                && matches!(next, Some(':' | '?'));
            match env.get(&word) {
                Some(binding) if !member_access && !property_key => {
                    out.push_str(&wrap_if_compound(&binding.rendered.text));
                }
                _ => out.push_str(&word),
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Parenthesize unions, intersections and function types at depth zero.
fn wrap_if_compound(text: &str) -> String {
    let mut depth = 0i32;
    let mut compound = false;
    let mut previous = ' ';
    for c in text.chars() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' if previous == '=' => {
                if depth == 0 {
                    compound = true;
                }
            }
            '>' | ')' | ']' | '}' => depth -= 1,
            '|' | '&' if depth == 0 => compound = true,
            _ => {}
        }
        previous = c;
    }
    if compound {
        format!("({text})")
    } else {
        text.to_string()
    }
}
