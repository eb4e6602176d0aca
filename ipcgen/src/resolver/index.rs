//! Owned index of one parsed TypeScript module.
//!
//! oxc hands out an arena-bound AST. Resolution has to hop between files, so
//! each file is lowered once into plain owned data: imports, exports,
//! top-level functions, interfaces, type aliases and schema constants.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, Declaration, ExportDefaultDeclarationKind, Expression, FormalParameters,
    ImportDeclaration, ImportDeclarationSpecifier, ObjectPropertyKind, Program, Statement,
    TSInterfaceHeritage, TSLiteral, TSMethodSignature, TSMethodSignatureKind, TSSignature, TSType,
    TSTypeLiteral, TSTypeName, TSTypeParameterDeclaration,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use tracing::warn;

use crate::error::{ResolveError, ResolveResult};
use crate::introspect::{SchemaArg, SchemaExpr};

/// What an import binding refers to in its source module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// `import { imported as local }`
    Named(String),
    /// `import local from`
    Default,
    /// `import * as local from`
    Namespace,
}

/// One local name introduced by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub specifier: String,
    pub kind: ImportKind,
}

/// An `export ... from` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReExport {
    /// `export { imported as exported } from 'specifier'`
    Named {
        exported: String,
        imported: String,
        specifier: String,
    },
    /// `export * as exported from 'specifier'`
    Namespace { exported: String, specifier: String },
    /// `export * from 'specifier'`
    All { specifier: String },
}

/// A possibly qualified type name such as `User` or `ns.User`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName(pub Vec<String>);

impl TypeName {
    pub fn simple(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// First segment, the name that is bound in the module scope.
    pub fn head(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// Last segment, the declared name.
    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_simple(&self) -> bool {
        self.0.len() == 1
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A lowered type expression.
///
/// `text` is the normalized source text: comments dropped, whitespace runs
/// collapsed and type literals re-rendered with `; ` separators, so it is
/// safe to paste on a single line of generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub text: String,
    pub start: u32,
    /// Every type name referenced anywhere inside this node.
    pub refs: Vec<TypeName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Keyword(String),
    Reference { name: TypeName, args: Vec<TypeNode> },
    /// Type literal. `opaque` is set when it carries index, call or
    /// construct signatures that cannot be flattened into fields.
    Object { members: Vec<MemberDecl>, opaque: bool },
    Union(Vec<TypeNode>),
    Intersection(Vec<TypeNode>),
    Parenthesized(Box<TypeNode>),
    Function {
        params: Vec<ParamDecl>,
        return_type: Box<TypeNode>,
    },
    /// `typeof name`
    Query(TypeName),
    StringLiteral(String),
    Other,
}

impl TypeNode {
    /// A keyword node that has no source span of its own.
    pub fn keyword(name: &str, start: u32) -> Self {
        Self {
            kind: TypeKind::Keyword(name.to_string()),
            text: name.to_string(),
            start,
            refs: Vec::new(),
        }
    }

    /// Strip any number of surrounding parentheses.
    pub fn unparenthesized(&self) -> &TypeNode {
        match &self.kind {
            TypeKind::Parenthesized(inner) => inner.unparenthesized(),
            _ => self,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.unparenthesized().kind, TypeKind::Keyword(k) if k == keyword)
    }
}

/// A property of a type literal or interface body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub optional: bool,
    pub ty: TypeNode,
    pub start: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamPattern {
    Identifier(String),
    Object,
    Array,
    Rest(Option<String>),
}

/// One formal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub pattern: ParamPattern,
    pub ty: Option<TypeNode>,
    /// `x?: T` or a parameter with a default value.
    pub optional: bool,
}

impl ParamDecl {
    pub fn name(&self) -> Option<&str> {
        match &self.pattern {
            ParamPattern::Identifier(name) => Some(name),
            ParamPattern::Rest(name) => name.as_deref(),
            ParamPattern::Object | ParamPattern::Array => None,
        }
    }
}

/// A top-level `function` declaration (including overload signatures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub start: u32,
    pub params: Vec<ParamDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub default: Option<TypeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub members: Vec<MemberDecl>,
    pub extends: Vec<TypeNode>,
    pub opaque: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub ty: TypeNode,
    pub start: u32,
}

/// Everything resolution needs to know about one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    pub path: PathBuf,
    /// Local name to import binding.
    pub imports: HashMap<String, ImportBinding>,
    /// Exported name to local name.
    pub exports: HashMap<String, String>,
    pub reexports: Vec<ReExport>,
    pub functions: Vec<FunctionDecl>,
    /// `export default function` declarations, `"default"` when anonymous.
    pub default_functions: Vec<String>,
    pub interfaces: HashMap<String, InterfaceDecl>,
    pub aliases: HashMap<String, AliasDecl>,
    /// Enums and classes: named, never flattened.
    pub opaque_types: HashSet<String>,
    /// Value-space declarations (functions, variables, classes, enums).
    pub values: HashSet<String>,
    pub schemas: HashMap<String, SchemaExpr>,
}

impl ModuleIndex {
    /// Read and index a file.
    pub fn load(path: &Path) -> ResolveResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ResolveError::read(path.to_path_buf(), e))?;
        Self::parse(path, &source)
    }

    /// Index already loaded source text.
    ///
    /// Recoverable syntax errors are logged and the recovered tree is used.
    pub fn parse(path: &Path, source: &str) -> ResolveResult<Self> {
        let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::ts());
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type).parse();

        if parsed.panicked {
            let message = parsed
                .errors
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unrecoverable syntax error".to_string());
            return Err(ResolveError::parse(path.to_path_buf(), message));
        }
        for error in &parsed.errors {
            warn!(path = %path.display(), %error, "Recovered from syntax error");
        }

        Ok(Lowering::new(source, &parsed.program).lower(path, &parsed.program))
    }

    /// Names other modules can import from this one.
    pub fn exported_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.exports.keys().cloned().collect();
        for reexport in &self.reexports {
            match reexport {
                ReExport::Named { exported, .. } | ReExport::Namespace { exported, .. } => {
                    names.insert(exported.clone());
                }
                ReExport::All { .. } => {}
            }
        }
        names
    }

    /// Whether `local` is exported under its own name.
    pub fn is_exported(&self, local: &str) -> bool {
        self.exports.get(local).is_some_and(|l| l == local)
    }

    /// The name under which a local declaration is exported, if any.
    pub fn export_name_of<'a>(&'a self, local: &'a str) -> Option<&'a str> {
        if self.is_exported(local) {
            return Some(local);
        }
        self.exports
            .iter()
            .filter(|(_, l)| l.as_str() == local)
            .map(|(exported, _)| exported.as_str())
            .min()
    }

    /// Module specifiers this file imports or re-exports from.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut specifiers: Vec<&str> = self
            .imports
            .values()
            .map(|binding| binding.specifier.as_str())
            .collect();
        for reexport in &self.reexports {
            match reexport {
                ReExport::Named { specifier, .. }
                | ReExport::Namespace { specifier, .. }
                | ReExport::All { specifier } => specifiers.push(specifier),
            }
        }
        specifiers.sort_unstable();
        specifiers.dedup();
        specifiers
    }

    /// Whether a type with this name is declared in this module.
    pub fn declares_type(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
            || self.aliases.contains_key(name)
            || self.opaque_types.contains(name)
    }

    /// Whether any top-level declaration has this name.
    pub fn declares(&self, name: &str) -> bool {
        self.declares_type(name) || self.values.contains(name)
    }
}

/// Normalize a slice of type source for single-line output.
///
/// Drops comments, collapses whitespace runs outside string literals and
/// strips a leading `|` or `&` left over from multi-line unions.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                push_space(&mut out, &mut pending_space);
                out.push(c);
                while let Some(next) = chars.next() {
                    out.push(next);
                    if next == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if next == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                pending_space = true;
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                push_space(&mut out, &mut pending_space);
                out.push(c);
            }
        }
    }

    let text = out.trim();
    text.strip_prefix('|')
        .or_else(|| text.strip_prefix('&'))
        .map(str::trim_start)
        .unwrap_or(text)
        .to_string()
}

fn push_space(out: &mut String, pending: &mut bool) {
    if *pending && !out.is_empty() {
        out.push(' ');
    }
    *pending = false;
}

fn type_name(name: &TSTypeName<'_>) -> Option<TypeName> {
    match name {
        TSTypeName::IdentifierReference(ident) => Some(TypeName::simple(ident.name.as_str())),
        TSTypeName::QualifiedName(qualified) => {
            let mut name = type_name(&qualified.left)?;
            name.0.push(qualified.right.name.to_string());
            Some(name)
        }
        TSTypeName::ThisExpression(_) => None,
    }
}

fn expression_name(expr: &Expression<'_>) -> Option<TypeName> {
    match expr.get_inner_expression() {
        Expression::Identifier(ident) => Some(TypeName::simple(ident.name.as_str())),
        Expression::StaticMemberExpression(member) => {
            let mut name = expression_name(&member.object)?;
            name.0.push(member.property.name.to_string());
            Some(name)
        }
        _ => None,
    }
}

fn push_unique(refs: &mut Vec<TypeName>, more: &[TypeName]) {
    for name in more {
        if !refs.contains(name) {
            refs.push(name.clone());
        }
    }
}

#[derive(Default)]
struct RefCollector {
    refs: Vec<TypeName>,
}

impl<'a> Visit<'a> for RefCollector {
    fn visit_ts_type_name(&mut self, it: &TSTypeName<'a>) {
        if let Some(name) = type_name(it) {
            push_unique(&mut self.refs, std::slice::from_ref(&name));
        }
    }
}

fn collect_refs(walk: impl FnOnce(&mut RefCollector)) -> Vec<TypeName> {
    let mut collector = RefCollector::default();
    walk(&mut collector);
    collector.refs
}

/// Replaces the outermost nested type literals of a span with their
/// re-rendered single-line form.
struct LiteralSplicer<'s, 'src> {
    lowering: &'s Lowering<'src>,
    pieces: Vec<(Span, String)>,
}

impl<'a> Visit<'a> for LiteralSplicer<'_, '_> {
    fn visit_ts_type_literal(&mut self, it: &TSTypeLiteral<'a>) {
        self.pieces
            .push((it.span, self.lowering.literal_text(&it.members)));
    }
}

struct Lowering<'src> {
    source: &'src str,
    zod: HashSet<String>,
}

impl<'src> Lowering<'src> {
    fn new(source: &'src str, program: &Program<'_>) -> Self {
        let mut zod = HashSet::new();
        for statement in &program.body {
            if let Statement::ImportDeclaration(import) = statement {
                let specifier = import.source.value.as_str();
                if specifier != "zod" && !specifier.starts_with("zod/") {
                    continue;
                }
                for spec in import.specifiers.iter().flatten() {
                    zod.insert(spec.local().name.to_string());
                }
            }
        }
        if zod.is_empty() {
            zod.insert("z".to_string());
        }
        Self { source, zod }
    }

    fn lower(&self, path: &Path, program: &Program<'_>) -> ModuleIndex {
        let mut index = ModuleIndex {
            path: path.to_path_buf(),
            ..ModuleIndex::default()
        };

        for statement in &program.body {
            match statement {
                Statement::ImportDeclaration(import) => self.import(&mut index, import),
                Statement::ExportNamedDeclaration(export) => {
                    if let Some(declaration) = &export.declaration {
                        self.declaration(&mut index, declaration, true);
                    }
                    for spec in &export.specifiers {
                        let exported = spec.exported.name().to_string();
                        let local = spec.local.name().to_string();
                        match &export.source {
                            Some(source) => index.reexports.push(ReExport::Named {
                                exported,
                                imported: local,
                                specifier: source.value.to_string(),
                            }),
                            None => {
                                index.exports.insert(exported, local);
                            }
                        }
                    }
                }
                Statement::ExportDefaultDeclaration(export) => {
                    if let ExportDefaultDeclarationKind::FunctionDeclaration(function) =
                        &export.declaration
                    {
                        match &function.id {
                            Some(id) => {
                                let name = id.name.to_string();
                                index.exports.insert("default".to_string(), name.clone());
                                index.values.insert(name.clone());
                                index.default_functions.push(name);
                            }
                            None => index.default_functions.push("default".to_string()),
                        }
                    }
                }
                Statement::ExportAllDeclaration(export) => {
                    let specifier = export.source.value.to_string();
                    index.reexports.push(match &export.exported {
                        Some(name) => ReExport::Namespace {
                            exported: name.name().to_string(),
                            specifier,
                        },
                        None => ReExport::All { specifier },
                    });
                }
                _ => {
                    if let Some(declaration) = statement.as_declaration() {
                        self.declaration(&mut index, declaration, false);
                    }
                }
            }
        }

        index
    }

    fn import(&self, index: &mut ModuleIndex, import: &ImportDeclaration<'_>) {
        let specifier = import.source.value.to_string();
        for spec in import.specifiers.iter().flatten() {
            let (local, kind) = match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => (
                    s.local.name.to_string(),
                    ImportKind::Named(s.imported.name().to_string()),
                ),
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (s.local.name.to_string(), ImportKind::Default)
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.to_string(), ImportKind::Namespace)
                }
            };
            index.imports.insert(
                local,
                ImportBinding {
                    specifier: specifier.clone(),
                    kind,
                },
            );
        }
    }

    fn declaration(&self, index: &mut ModuleIndex, declaration: &Declaration<'_>, exported: bool) {
        let export = |index: &mut ModuleIndex, name: &str| {
            if exported {
                index.exports.insert(name.to_string(), name.to_string());
            }
        };

        match declaration {
            Declaration::VariableDeclaration(variables) => {
                for declarator in &variables.declarations {
                    let Some(name) = declarator.id.get_identifier_name() else {
                        continue;
                    };
                    let name = name.to_string();
                    if let Some(schema) = declarator.init.as_ref().and_then(|e| self.schema(e)) {
                        let known = |name: &str| {
                            index.schemas.contains_key(name) || index.imports.contains_key(name)
                        };
                        if schema.is_zod_rooted(&known) {
                            index.schemas.insert(name.clone(), schema);
                        }
                    }
                    export(index, &name);
                    index.values.insert(name);
                }
            }
            Declaration::FunctionDeclaration(function) => {
                let Some(id) = &function.id else { return };
                let name = id.name.to_string();
                index.functions.push(FunctionDecl {
                    name: name.clone(),
                    start: function.span.start,
                    params: self.params(&function.params),
                });
                export(index, &name);
                index.values.insert(name);
            }
            Declaration::ClassDeclaration(class) => {
                let Some(id) = &class.id else { return };
                let name = id.name.to_string();
                export(index, &name);
                index.opaque_types.insert(name.clone());
                index.values.insert(name);
            }
            Declaration::TSEnumDeclaration(enumeration) => {
                let name = enumeration.id.name.to_string();
                export(index, &name);
                index.opaque_types.insert(name.clone());
                index.values.insert(name);
            }
            Declaration::TSTypeAliasDeclaration(alias) => {
                let name = alias.id.name.to_string();
                export(index, &name);
                index.aliases.insert(
                    name.clone(),
                    AliasDecl {
                        name,
                        type_params: self.type_params(alias.type_parameters.as_deref()),
                        ty: self.lower_type(&alias.type_annotation),
                        start: alias.span.start,
                    },
                );
            }
            Declaration::TSInterfaceDeclaration(interface) => {
                let name = interface.id.name.to_string();
                export(index, &name);
                let (members, opaque) = self.signatures(&interface.body.body);
                let extends: Vec<TypeNode> = interface
                    .extends
                    .iter()
                    .filter_map(|heritage| self.heritage(heritage))
                    .collect();

                // Declaration merging: later bodies extend the first one.
                let entry = index
                    .interfaces
                    .entry(name.clone())
                    .or_insert_with(|| InterfaceDecl {
                        name,
                        type_params: self.type_params(interface.type_parameters.as_deref()),
                        members: Vec::new(),
                        extends: Vec::new(),
                        opaque: false,
                    });
                entry.members.extend(members);
                entry.extends.extend(extends);
                entry.opaque |= opaque;
            }
            _ => {}
        }
    }

    fn slice(&self, span: Span) -> &'src str {
        span.source_text(self.source)
    }

    /// Source text of `span` with nested type literals re-rendered.
    fn splice(&self, span: Span, walk: impl FnOnce(&mut LiteralSplicer<'_, 'src>)) -> String {
        let mut splicer = LiteralSplicer {
            lowering: self,
            pieces: Vec::new(),
        };
        walk(&mut splicer);

        let mut raw = String::new();
        let mut cursor = span.start;
        for (piece_span, text) in splicer.pieces {
            if piece_span.start < cursor || piece_span.end > span.end {
                continue;
            }
            raw.push_str(self.slice(Span::new(cursor, piece_span.start)));
            raw.push_str(text.as_str());
            cursor = piece_span.end;
        }
        raw.push_str(self.slice(Span::new(cursor, span.end)));
        normalize_text(&raw)
    }

    fn type_text(&self, ty: &TSType<'_>) -> String {
        match ty {
            TSType::TSTypeLiteral(literal) => self.literal_text(&literal.members),
            _ => self.splice(ty.span(), |v| v.visit_ts_type(ty)),
        }
    }

    fn literal_text(&self, signatures: &[TSSignature<'_>]) -> String {
        if signatures.is_empty() {
            return "{}".to_string();
        }
        let parts: Vec<String> = signatures
            .iter()
            .map(|signature| match signature {
                TSSignature::TSPropertySignature(property) => {
                    let key = match property.key.static_name() {
                        Some(name) if !property.computed => name.to_string(),
                        _ => normalize_text(self.slice(property.key.span())),
                    };
                    let key = if property.computed {
                        format!("[{key}]")
                    } else {
                        key
                    };
                    let readonly = if property.readonly { "readonly " } else { "" };
                    let optional = if property.optional { "?" } else { "" };
                    let ty = property
                        .type_annotation
                        .as_ref()
                        .map(|a| self.type_text(&a.type_annotation))
                        .unwrap_or_else(|| "any".to_string());
                    format!("{readonly}{key}{optional}: {ty}")
                }
                other => {
                    let text = self.splice(other.span(), |v| v.visit_ts_signature(other));
                    text.trim_end_matches([';', ',']).trim_end().to_string()
                }
            })
            .collect();
        format!("{{ {} }}", parts.join("; "))
    }

    fn lower_type(&self, ty: &TSType<'_>) -> TypeNode {
        let start = ty.span().start;
        let kind = match ty {
            TSType::TSAnyKeyword(_) => TypeKind::Keyword("any".to_string()),
            TSType::TSBigIntKeyword(_) => TypeKind::Keyword("bigint".to_string()),
            TSType::TSBooleanKeyword(_) => TypeKind::Keyword("boolean".to_string()),
            TSType::TSNeverKeyword(_) => TypeKind::Keyword("never".to_string()),
            TSType::TSNullKeyword(_) => TypeKind::Keyword("null".to_string()),
            TSType::TSNumberKeyword(_) => TypeKind::Keyword("number".to_string()),
            TSType::TSObjectKeyword(_) => TypeKind::Keyword("object".to_string()),
            TSType::TSStringKeyword(_) => TypeKind::Keyword("string".to_string()),
            TSType::TSSymbolKeyword(_) => TypeKind::Keyword("symbol".to_string()),
            TSType::TSUndefinedKeyword(_) => TypeKind::Keyword("undefined".to_string()),
            TSType::TSUnknownKeyword(_) => TypeKind::Keyword("unknown".to_string()),
            TSType::TSVoidKeyword(_) => TypeKind::Keyword("void".to_string()),
            TSType::TSTypeReference(reference) => match type_name(&reference.type_name) {
                Some(name) => TypeKind::Reference {
                    name,
                    args: reference
                        .type_arguments
                        .iter()
                        .flat_map(|args| args.params.iter())
                        .map(|arg| self.lower_type(arg))
                        .collect(),
                },
                None => TypeKind::Other,
            },
            TSType::TSTypeLiteral(literal) => {
                let (members, opaque) = self.signatures(&literal.members);
                TypeKind::Object { members, opaque }
            }
            TSType::TSUnionType(union) => {
                TypeKind::Union(union.types.iter().map(|t| self.lower_type(t)).collect())
            }
            TSType::TSIntersectionType(intersection) => TypeKind::Intersection(
                intersection.types.iter().map(|t| self.lower_type(t)).collect(),
            ),
            TSType::TSParenthesizedType(inner) => {
                TypeKind::Parenthesized(Box::new(self.lower_type(&inner.type_annotation)))
            }
            TSType::TSFunctionType(function) => TypeKind::Function {
                params: self.params(&function.params),
                return_type: Box::new(self.lower_type(&function.return_type.type_annotation)),
            },
            TSType::TSTypeQuery(query) => match query.expr_name.as_ts_type_name().and_then(type_name) {
                Some(name) => TypeKind::Query(name),
                None => TypeKind::Other,
            },
            TSType::TSLiteralType(literal) => match &literal.literal {
                TSLiteral::StringLiteral(s) => TypeKind::StringLiteral(s.value.to_string()),
                _ => TypeKind::Other,
            },
            _ => TypeKind::Other,
        };

        TypeNode {
            kind,
            text: self.type_text(ty),
            start,
            refs: collect_refs(|c| c.visit_ts_type(ty)),
        }
    }

    fn signatures(&self, signatures: &[TSSignature<'_>]) -> (Vec<MemberDecl>, bool) {
        let mut members = Vec::new();
        let mut opaque = false;
        for signature in signatures {
            match signature {
                TSSignature::TSPropertySignature(property) => {
                    if property.computed {
                        continue;
                    }
                    let Some(name) = property.key.static_name() else {
                        continue;
                    };
                    let ty = property
                        .type_annotation
                        .as_ref()
                        .map(|a| self.lower_type(&a.type_annotation))
                        .unwrap_or_else(|| TypeNode::keyword("any", property.span.start));
                    members.push(MemberDecl {
                        name: name.to_string(),
                        optional: property.optional,
                        ty,
                        start: property.span.start,
                    });
                }
                TSSignature::TSMethodSignature(method) => {
                    if let Some(member) = self.method(method) {
                        members.push(member);
                    }
                }
                TSSignature::TSIndexSignature(_)
                | TSSignature::TSCallSignatureDeclaration(_)
                | TSSignature::TSConstructSignatureDeclaration(_) => opaque = true,
            }
        }
        (members, opaque)
    }

    fn method(&self, method: &TSMethodSignature<'_>) -> Option<MemberDecl> {
        if method.computed {
            return None;
        }
        let name = method.key.static_name()?.to_string();
        let return_type = method
            .return_type
            .as_ref()
            .map(|r| self.lower_type(&r.type_annotation))
            .unwrap_or_else(|| TypeNode::keyword("any", method.span.start));

        let ty = match method.kind {
            TSMethodSignatureKind::Get => return_type,
            TSMethodSignatureKind::Set => return None,
            TSMethodSignatureKind::Method => {
                let generics = method
                    .type_parameters
                    .as_ref()
                    .map(|tp| self.splice(tp.span, |v| v.visit_ts_type_parameter_declaration(tp)))
                    .unwrap_or_default();
                let params = self.splice(method.params.span, |v| {
                    v.visit_formal_parameters(&method.params)
                });
                let mut refs = collect_refs(|c| c.visit_formal_parameters(&method.params));
                push_unique(&mut refs, &return_type.refs);
                TypeNode {
                    text: format!("{generics}{params} => {}", return_type.text),
                    kind: TypeKind::Function {
                        params: self.params(&method.params),
                        return_type: Box::new(return_type),
                    },
                    start: method.span.start,
                    refs,
                }
            }
        };

        Some(MemberDecl {
            name,
            optional: method.optional,
            ty,
            start: method.span.start,
        })
    }

    fn params(&self, params: &FormalParameters<'_>) -> Vec<ParamDecl> {
        let mut lowered: Vec<ParamDecl> = params
            .items
            .iter()
            .map(|param| {
                let pattern = match &param.pattern {
                    BindingPattern::BindingIdentifier(ident) => {
                        ParamPattern::Identifier(ident.name.to_string())
                    }
                    BindingPattern::ObjectPattern(_) => ParamPattern::Object,
                    BindingPattern::ArrayPattern(_) => ParamPattern::Array,
                    BindingPattern::AssignmentPattern(assign) => {
                        match assign.left.get_identifier_name() {
                            Some(name) => ParamPattern::Identifier(name.to_string()),
                            None => ParamPattern::Object,
                        }
                    }
                };
                ParamDecl {
                    optional: param.optional
                        || param.initializer.is_some()
                        || matches!(param.pattern, BindingPattern::AssignmentPattern(_)),
                    pattern,
                    ty: param
                        .type_annotation
                        .as_ref()
                        .map(|a| self.lower_type(&a.type_annotation)),
                }
            })
            .collect();

        if let Some(rest) = &params.rest {
            lowered.push(ParamDecl {
                pattern: ParamPattern::Rest(
                    rest.rest.argument.get_identifier_name().map(|n| n.to_string()),
                ),
                ty: rest
                    .type_annotation
                    .as_ref()
                    .map(|a| self.lower_type(&a.type_annotation)),
                optional: false,
            });
        }
        lowered
    }

    fn type_params(&self, params: Option<&TSTypeParameterDeclaration<'_>>) -> Vec<TypeParam> {
        params
            .map(|declaration| {
                declaration
                    .params
                    .iter()
                    .map(|param| TypeParam {
                        name: param.name.name.to_string(),
                        default: param.default.as_ref().map(|d| self.lower_type(d)),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn heritage(&self, heritage: &TSInterfaceHeritage<'_>) -> Option<TypeNode> {
        let name = expression_name(&heritage.expression)?;
        let args: Vec<TypeNode> = heritage
            .type_arguments
            .iter()
            .flat_map(|args| args.params.iter())
            .map(|arg| self.lower_type(arg))
            .collect();

        let mut refs = vec![name.clone()];
        for arg in &args {
            push_unique(&mut refs, &arg.refs);
        }
        Some(TypeNode {
            text: self.splice(heritage.span, |v| v.visit_ts_interface_heritage(heritage)),
            kind: TypeKind::Reference { name, args },
            start: heritage.span.start,
            refs,
        })
    }

    fn schema(&self, expr: &Expression<'_>) -> Option<SchemaExpr> {
        match expr.get_inner_expression() {
            Expression::Identifier(ident) => Some(SchemaExpr::Reference(ident.name.to_string())),
            Expression::CallExpression(call) => {
                let Expression::StaticMemberExpression(member) = call.callee.get_inner_expression()
                else {
                    return None;
                };
                let name = member.property.name.to_string();
                let args = call
                    .arguments
                    .iter()
                    .map(|arg| {
                        arg.as_expression()
                            .map(|e| self.schema_arg(e))
                            .unwrap_or(SchemaArg::Other)
                    })
                    .collect();
                match member.object.get_inner_expression() {
                    Expression::Identifier(ident) if self.zod.contains(ident.name.as_str()) => {
                        Some(SchemaExpr::Builder { name, args })
                    }
                    object => Some(SchemaExpr::Method {
                        receiver: Box::new(self.schema(object)?),
                        name,
                        args,
                    }),
                }
            }
            _ => None,
        }
    }

    fn schema_arg(&self, expr: &Expression<'_>) -> SchemaArg {
        match expr.get_inner_expression() {
            Expression::ObjectExpression(object) => SchemaArg::Object(
                object
                    .properties
                    .iter()
                    .filter_map(|property| match property {
                        ObjectPropertyKind::ObjectProperty(p) if !p.computed => {
                            let key = p.key.static_name()?.to_string();
                            let value = self.schema(&p.value).unwrap_or(SchemaExpr::Unknown);
                            Some((key, value))
                        }
                        _ => None,
                    })
                    .collect(),
            ),
            Expression::ArrayExpression(array) => SchemaArg::Array(
                array
                    .elements
                    .iter()
                    .map(|element| {
                        element
                            .as_expression()
                            .map(|e| self.schema_arg(e))
                            .unwrap_or(SchemaArg::Other)
                    })
                    .collect(),
            ),
            literal @ (Expression::StringLiteral(_)
            | Expression::NumericLiteral(_)
            | Expression::BooleanLiteral(_)
            | Expression::NullLiteral(_)) => {
                SchemaArg::Literal(normalize_text(self.slice(literal.span())))
            }
            other => self
                .schema(other)
                .map(SchemaArg::Schema)
                .unwrap_or(SchemaArg::Other),
        }
    }
}
