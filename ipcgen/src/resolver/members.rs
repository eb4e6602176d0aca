//! Structural member expansion.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::index::{ImportKind, MemberDecl, ReExport, TypeKind, TypeName, TypeNode, TypeParam};
use super::render::{Binding, Env, Rendered};
use super::{Symbol, TypeProgram, MAX_DEPTH};
use crate::introspect::{SchemaArg, SchemaExpr, SchemaMode};
use crate::model::TypeImport;

/// One member of an expanded object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub optional: bool,
    /// Rendered type, without any `| undefined` added for optionality.
    pub type_text: String,
    pub imports: Vec<TypeImport>,
    /// Unexported local types the member's type refers to.
    pub unexported: Vec<String>,
    /// File the member was declared in.
    pub origin: PathBuf,
    /// Declaration offset inside `origin`.
    pub position: u32,
}

const UTILITY_TYPES: &[&str] = &["Partial", "Required", "Readonly", "Pick", "Omit"];

impl TypeProgram {
    /// Expand an object-shaped type into its members.
    ///
    /// Returns `None` for anything that has no flat member list: primitives,
    /// arrays, tuples, unions, functions, unresolved names and bare type
    /// parameters. Members keep encounter order, except that each run of
    /// consecutive members from the same file is ordered by declaration
    /// position.
    pub fn members(&self, file: &Path, ty: &TypeNode) -> Option<Vec<Member>> {
        let mut members = self.expand(file, ty, &Env::default(), 0)?;
        order_members(&mut members);
        Some(members)
    }

    fn expand(&self, file: &Path, ty: &TypeNode, env: &Env, depth: usize) -> Option<Vec<Member>> {
        if depth > MAX_DEPTH {
            debug!(file = %file.display(), ty = %ty.text, "Type expansion depth exceeded");
            return None;
        }
        match &ty.kind {
            TypeKind::Object { members, opaque } => {
                if *opaque {
                    return None;
                }
                Some(
                    members
                        .iter()
                        .map(|member| self.member(file, member, env))
                        .collect(),
                )
            }
            TypeKind::Parenthesized(inner) => self.expand(file, inner, env, depth + 1),
            TypeKind::Intersection(parts) => {
                let mut merged: Vec<Member> = Vec::new();
                for part in parts {
                    for member in self.expand(file, part, env, depth + 1)? {
                        if !merged.iter().any(|m| m.name == member.name) {
                            merged.push(member);
                        }
                    }
                }
                Some(merged)
            }
            TypeKind::Reference { name, args } => {
                self.expand_reference(file, ty, name, args, env, depth)
            }
            _ => None,
        }
    }

    fn expand_reference(
        &self,
        file: &Path,
        ty: &TypeNode,
        name: &TypeName,
        args: &[TypeNode],
        env: &Env,
        depth: usize,
    ) -> Option<Vec<Member>> {
        if name.is_simple() {
            if let Some(binding) = env.get(name.head()) {
                return self.expand(&binding.file, &binding.node, &binding.env, depth + 1);
            }
            if UTILITY_TYPES.contains(&name.head()) && !self.shadows(file, name.head()) {
                return self.expand_utility(file, name.head(), args, env, depth);
            }
        }
        if let Some(mode) = self.schema_mode(file, name) {
            return self.expand_schema(file, ty, args, mode);
        }

        match self.resolve_type_name(file, name, depth)? {
            Symbol::Interface(path, interface) => {
                if interface.opaque {
                    return None;
                }
                let scope = self.bind(file, args, env, path, &interface.type_params);
                let mut members: Vec<Member> = interface
                    .members
                    .iter()
                    .map(|member| self.member(path, member, &scope))
                    .collect();
                for base in &interface.extends {
                    let Some(inherited) = self.expand(path, base, &scope, depth + 1) else {
                        debug!(interface = %interface.name, base = %base.text, "Cannot expand base interface");
                        continue;
                    };
                    for member in inherited {
                        if !members.iter().any(|m| m.name == member.name) {
                            members.push(member);
                        }
                    }
                }
                Some(members)
            }
            Symbol::Alias(path, alias) => {
                let scope = self.bind(file, args, env, path, &alias.type_params);
                self.expand(path, &alias.ty, &scope, depth + 1)
            }
            Symbol::Opaque(_) | Symbol::External(_) => None,
        }
    }

    fn member(&self, file: &Path, member: &MemberDecl, env: &Env) -> Member {
        let rendered = self.render_in(file, &member.ty, env);
        Member {
            name: member.name.clone(),
            optional: member.optional,
            type_text: rendered.text,
            imports: rendered.imports,
            unexported: rendered.unexported,
            origin: file.to_path_buf(),
            position: member.start,
        }
    }

    /// Bind a declaration's type parameters to the arguments of a reference.
    fn bind(
        &self,
        caller: &Path,
        args: &[TypeNode],
        caller_env: &Env,
        decl_file: &Path,
        params: &[TypeParam],
    ) -> Env {
        let mut scope = Env::default();
        for (position, param) in params.iter().enumerate() {
            let binding = match (args.get(position), &param.default) {
                (Some(arg), _) => Binding {
                    rendered: self.render_in(caller, arg, caller_env),
                    file: caller.to_path_buf(),
                    node: arg.clone(),
                    env: caller_env.clone(),
                },
                (None, Some(default)) => Binding {
                    rendered: self.render_in(decl_file, default, &scope),
                    file: decl_file.to_path_buf(),
                    node: default.clone(),
                    env: scope.clone(),
                },
                (None, None) => Binding {
                    rendered: Rendered::plain("unknown"),
                    file: decl_file.to_path_buf(),
                    node: TypeNode::keyword("unknown", 0),
                    env: Env::default(),
                },
            };
            scope.insert(param.name.clone(), binding);
        }
        scope
    }

    /// Whether `file` declares or imports its own type called `name`.
    fn shadows(&self, file: &Path, name: &str) -> bool {
        self.module(file)
            .is_some_and(|module| module.declares_type(name) || module.imports.contains_key(name))
    }

    fn expand_utility(
        &self,
        file: &Path,
        utility: &str,
        args: &[TypeNode],
        env: &Env,
        depth: usize,
    ) -> Option<Vec<Member>> {
        let target = args.first()?;
        let mut members = self.expand(file, target, env, depth + 1)?;
        match utility {
            "Partial" => members.iter_mut().for_each(|m| m.optional = true),
            "Required" => members.iter_mut().for_each(|m| m.optional = false),
            "Readonly" => {}
            "Pick" | "Omit" => {
                let keys = self.string_keys(file, args.get(1)?, env, depth + 1)?;
                let keep = utility == "Pick";
                members.retain(|m| keys.contains(&m.name) == keep);
            }
            _ => return None,
        }
        Some(members)
    }

    /// String literal keys of a `'a' | 'b'` style type.
    fn string_keys(&self, file: &Path, ty: &TypeNode, env: &Env, depth: usize) -> Option<Vec<String>> {
        if depth > MAX_DEPTH {
            return None;
        }
        match &ty.kind {
            TypeKind::StringLiteral(value) => Some(vec![value.clone()]),
            TypeKind::Parenthesized(inner) => self.string_keys(file, inner, env, depth + 1),
            TypeKind::Union(parts) => {
                let mut keys = Vec::new();
                for part in parts {
                    keys.extend(self.string_keys(file, part, env, depth + 1)?);
                }
                Some(keys)
            }
            TypeKind::Reference { name, args } if args.is_empty() => {
                if name.is_simple() {
                    if let Some(binding) = env.get(name.head()) {
                        return self.string_keys(&binding.file, &binding.node, &binding.env, depth + 1);
                    }
                }
                match self.resolve_type_name(file, name, depth)? {
                    Symbol::Alias(path, alias) if alias.type_params.is_empty() => {
                        self.string_keys(path, &alias.ty, &Env::default(), depth + 1)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// `z.infer` / `z.output` / `z.input` on a zod namespace import.
    fn schema_mode(&self, file: &Path, name: &TypeName) -> Option<SchemaMode> {
        let [namespace, helper] = name.0.as_slice() else {
            return None;
        };
        let module = self.module(file)?;
        let is_zod = match module.imports.get(namespace) {
            Some(binding) => {
                binding.specifier == "zod" || binding.specifier.starts_with("zod/")
            }
            None => namespace == "z" && !module.declares(namespace),
        };
        if !is_zod {
            return None;
        }
        match helper.as_str() {
            "infer" | "output" | "TypeOf" => Some(SchemaMode::Output),
            "input" => Some(SchemaMode::Input),
            _ => None,
        }
    }

    fn expand_schema(
        &self,
        file: &Path,
        ty: &TypeNode,
        args: &[TypeNode],
        mode: SchemaMode,
    ) -> Option<Vec<Member>> {
        let TypeKind::Query(query) = &args.first()?.unparenthesized().kind else {
            return None;
        };
        if !query.is_simple() {
            return None;
        }
        let (schema_file, schema) = self.schema_const(file, query.head(), 0)?;
        let closed = self.inline_schema(schema_file, schema, 0);
        let fields = self.introspector.fields(&closed, mode)?;
        Some(
            fields
                .into_iter()
                .map(|field| Member {
                    name: field.name,
                    optional: field.optional,
                    type_text: field.type_text,
                    imports: Vec::new(),
                    unexported: Vec::new(),
                    origin: file.to_path_buf(),
                    position: ty.start,
                })
                .collect(),
        )
    }

    /// Find a schema constant visible as `local` in `file`.
    fn schema_const(&self, file: &Path, local: &str, depth: usize) -> Option<(&Path, &SchemaExpr)> {
        if depth > MAX_DEPTH {
            return None;
        }
        let (path, module) = self.modules.get_key_value(file)?;
        if let Some(schema) = module.schemas.get(local) {
            return Some((path.as_path(), schema));
        }
        let binding = module.imports.get(local)?;
        let imported = match &binding.kind {
            ImportKind::Named(imported) => imported.as_str(),
            ImportKind::Default => "default",
            ImportKind::Namespace => return None,
        };
        let target = self.resolve_module(file, &binding.specifier)?;
        self.schema_export(&target, imported, depth + 1)
    }

    fn schema_export(&self, file: &Path, name: &str, depth: usize) -> Option<(&Path, &SchemaExpr)> {
        if depth > MAX_DEPTH {
            return None;
        }
        let module = self.module(file)?;
        if let Some(local) = module.exports.get(name) {
            return self.schema_const(file, local, depth + 1);
        }
        for reexport in &module.reexports {
            let found = match reexport {
                ReExport::Named {
                    exported,
                    imported,
                    specifier,
                } if exported == name => self
                    .resolve_module(file, specifier)
                    .and_then(|target| self.schema_export(&target, imported, depth + 1)),
                ReExport::All { specifier } => self
                    .resolve_module(file, specifier)
                    .and_then(|target| self.schema_export(&target, name, depth + 1)),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Replace references to other schema constants with their definitions.
    fn inline_schema(&self, file: &Path, schema: &SchemaExpr, depth: usize) -> SchemaExpr {
        if depth > MAX_DEPTH {
            return SchemaExpr::Unknown;
        }
        match schema {
            SchemaExpr::Reference(name) => match self.schema_const(file, name, 0) {
                Some((path, target)) => self.inline_schema(path, target, depth + 1),
                None => schema.clone(),
            },
            SchemaExpr::Builder { name, args } => SchemaExpr::Builder {
                name: name.clone(),
                args: self.inline_args(file, args, depth),
            },
            SchemaExpr::Method {
                receiver,
                name,
                args,
            } => SchemaExpr::Method {
                receiver: Box::new(self.inline_schema(file, receiver, depth + 1)),
                name: name.clone(),
                args: self.inline_args(file, args, depth),
            },
            SchemaExpr::Unknown => SchemaExpr::Unknown,
        }
    }

    fn inline_args(&self, file: &Path, args: &[SchemaArg], depth: usize) -> Vec<SchemaArg> {
        args.iter()
            .map(|arg| match arg {
                SchemaArg::Schema(schema) => {
                    SchemaArg::Schema(self.inline_schema(file, schema, depth + 1))
                }
                SchemaArg::Object(props) => SchemaArg::Object(
                    props
                        .iter()
                        .map(|(key, value)| (key.clone(), self.inline_schema(file, value, depth + 1)))
                        .collect(),
                ),
                SchemaArg::Array(items) => SchemaArg::Array(self.inline_args(file, items, depth + 1)),
                other => other.clone(),
            })
            .collect()
    }
}

/// Stable-sort each run of consecutive same-file members by position.
fn order_members(members: &mut [Member]) {
    let mut start = 0;
    while start < members.len() {
        let mut end = start + 1;
        while end < members.len() && members[end].origin == members[start].origin {
            end += 1;
        }
        members[start..end].sort_by_key(|m| m.position);
        start = end;
    }
}
