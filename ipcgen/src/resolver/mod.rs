//! Structural type resolution over a set of TypeScript files.
//!
//! A [`TypeProgram`] is built from a list of root files. Relative imports are
//! followed transitively so aliases, interfaces and schema constants declared
//! elsewhere can be resolved. Resolution is purely syntactic: names are
//! followed through imports, re-exports and alias chains, never type-checked.

mod index;
mod members;
pub mod paths;
mod proptest;
mod render;

pub use index::{
    AliasDecl, FunctionDecl, ImportBinding, ImportKind, InterfaceDecl, MemberDecl, ModuleIndex,
    ParamDecl, ParamPattern, ReExport, TypeKind, TypeName, TypeNode, TypeParam,
};
pub use members::Member;
pub use render::Rendered;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ResolveResult;
use crate::introspect::{SchemaIntrospector, ZodIntrospector};

/// Bound on alias, import and heritage chains.
pub const MAX_DEPTH: usize = 16;

/// What a type name resolved to.
#[derive(Debug, Clone)]
pub(crate) enum Symbol<'p> {
    Interface(&'p Path, &'p InterfaceDecl),
    Alias(&'p Path, &'p AliasDecl),
    /// Enum or class.
    Opaque(&'p str),
    /// A bare module import, or a relative one that could not be loaded.
    External(String),
}

impl Symbol<'_> {
    fn name(&self) -> &str {
        match self {
            Self::Interface(_, decl) => &decl.name,
            Self::Alias(_, decl) => &decl.name,
            Self::Opaque(name) => name,
            Self::External(name) => name,
        }
    }
}

/// Indexed modules plus the schema introspector used for `z.infer`.
#[derive(Debug)]
pub struct TypeProgram {
    modules: HashMap<PathBuf, ModuleIndex>,
    unreadable: BTreeMap<PathBuf, String>,
    introspector: Box<dyn SchemaIntrospector>,
}

impl TypeProgram {
    /// Load `paths` and everything they import, using [`ZodIntrospector`].
    pub fn from_paths(paths: &[PathBuf]) -> Self {
        Self::from_paths_with(paths, Box::new(ZodIntrospector))
    }

    /// Load `paths` with a custom schema introspector.
    pub fn from_paths_with(paths: &[PathBuf], introspector: Box<dyn SchemaIntrospector>) -> Self {
        let exists = |path: &Path| path.is_file();
        Self::load(paths, &ModuleIndex::load, &exists, introspector)
    }

    /// Build a program from in-memory sources. Imports only resolve between
    /// the given files.
    pub fn from_sources<P, S>(sources: impl IntoIterator<Item = (P, S)>) -> Self
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let sources: HashMap<PathBuf, String> = sources
            .into_iter()
            .map(|(path, source)| (paths::normalize_path(&path.into()), source.into()))
            .collect();
        let roots: Vec<PathBuf> = sources.keys().cloned().collect();

        let read = |path: &Path| -> ResolveResult<ModuleIndex> {
            match sources.get(path) {
                Some(source) => ModuleIndex::parse(path, source),
                None => Err(crate::error::ResolveError::read(
                    path.to_path_buf(),
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                )),
            }
        };
        let exists = |path: &Path| sources.contains_key(path);
        Self::load(&roots, &read, &exists, Box::new(ZodIntrospector))
    }

    fn load(
        roots: &[PathBuf],
        read: &dyn Fn(&Path) -> ResolveResult<ModuleIndex>,
        exists: &dyn Fn(&Path) -> bool,
        introspector: Box<dyn SchemaIntrospector>,
    ) -> Self {
        let mut modules = HashMap::new();
        let mut unreadable = BTreeMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        for root in roots {
            let root = paths::normalize_path(root);
            if seen.insert(root.clone()) {
                queue.push_back(root);
            }
        }

        while let Some(path) = queue.pop_front() {
            match read(&path) {
                Ok(module) => {
                    for specifier in module.dependencies() {
                        let Some(dependency) = paths::resolve_specifier(&path, specifier, exists)
                        else {
                            continue;
                        };
                        if seen.insert(dependency.clone()) {
                            queue.push_back(dependency);
                        }
                    }
                    modules.insert(path, module);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "Skipping unreadable source file");
                    unreadable.insert(path, error.to_string());
                }
            }
        }

        debug!(
            modules = modules.len(),
            unreadable = unreadable.len(),
            "Type program loaded"
        );
        Self {
            modules,
            unreadable,
            introspector,
        }
    }

    /// Indexed module for a path.
    pub fn module(&self, path: &Path) -> Option<&ModuleIndex> {
        self.modules.get(path)
    }

    /// Files that could not be read or parsed, with the reason.
    pub fn unreadable(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.unreadable
            .iter()
            .map(|(path, reason)| (path.as_path(), reason.as_str()))
    }

    pub fn is_unreadable(&self, path: &Path) -> bool {
        self.unreadable.contains_key(path)
    }

    /// The declaration name a type reference resolves to.
    ///
    /// Follows import aliases, re-exports and plain `type A = B` chains.
    /// Keyword types resolve to the keyword; names that resolve nowhere keep
    /// their written name.
    pub fn declared_name(&self, file: &Path, ty: &TypeNode) -> Option<String> {
        self.declared_name_at(file, ty, 0)
    }

    fn declared_name_at(&self, file: &Path, ty: &TypeNode, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        match &ty.unparenthesized().kind {
            TypeKind::Keyword(keyword) => Some(keyword.clone()),
            TypeKind::Reference { name, args } => match self.resolve_type_name(file, name, depth) {
                Some(Symbol::Alias(path, alias))
                    if args.is_empty() && alias.type_params.is_empty() && is_plain_reference(&alias.ty) =>
                {
                    self.declared_name_at(path, &alias.ty, depth + 1)
                }
                Some(symbol) => Some(symbol.name().to_string()),
                None => Some(name.last().to_string()),
            },
            _ => None,
        }
    }

    pub(crate) fn resolve_module(&self, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        let exists = |path: &Path| self.modules.contains_key(path);
        paths::resolve_specifier(from_file, specifier, &exists)
    }

    pub(crate) fn resolve_type_name(
        &self,
        file: &Path,
        name: &TypeName,
        depth: usize,
    ) -> Option<Symbol<'_>> {
        match name.0.as_slice() {
            [single] => self.resolve_local(file, single, depth),
            [namespace, member] => {
                let module = self.modules.get(file)?;
                let binding = module.imports.get(namespace)?;
                if binding.kind != ImportKind::Namespace {
                    return None;
                }
                self.via_specifier(file, &binding.specifier, member, depth + 1)
            }
            _ => None,
        }
    }

    fn resolve_local(&self, file: &Path, name: &str, depth: usize) -> Option<Symbol<'_>> {
        if depth > MAX_DEPTH {
            return None;
        }
        let (path, module) = self.modules.get_key_value(file)?;
        if let Some(interface) = module.interfaces.get(name) {
            return Some(Symbol::Interface(path, interface));
        }
        if let Some(alias) = module.aliases.get(name) {
            return Some(Symbol::Alias(path, alias));
        }
        if let Some(opaque) = module.opaque_types.get(name) {
            return Some(Symbol::Opaque(opaque));
        }
        let binding = module.imports.get(name)?;
        match &binding.kind {
            ImportKind::Named(imported) => {
                self.via_specifier(file, &binding.specifier, imported, depth + 1)
            }
            ImportKind::Default => self.via_specifier(file, &binding.specifier, "default", depth + 1),
            ImportKind::Namespace => None,
        }
    }

    fn via_specifier(
        &self,
        file: &Path,
        specifier: &str,
        imported: &str,
        depth: usize,
    ) -> Option<Symbol<'_>> {
        match self.resolve_module(file, specifier) {
            Some(target) => self.resolve_export(&target, imported, depth),
            None => Some(Symbol::External(imported.to_string())),
        }
    }

    fn resolve_export(&self, file: &Path, name: &str, depth: usize) -> Option<Symbol<'_>> {
        if depth > MAX_DEPTH {
            return None;
        }
        let module = self.modules.get(file)?;
        if let Some(local) = module.exports.get(name) {
            return self.resolve_local(file, local, depth + 1);
        }
        for reexport in &module.reexports {
            match reexport {
                ReExport::Named {
                    exported,
                    imported,
                    specifier,
                } if exported == name => {
                    return self.via_specifier(file, specifier, imported, depth + 1);
                }
                ReExport::All { specifier } => {
                    let Some(target) = self.resolve_module(file, specifier) else {
                        continue;
                    };
                    if let Some(symbol) = self.resolve_export(&target, name, depth + 1) {
                        return Some(symbol);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

fn is_plain_reference(ty: &TypeNode) -> bool {
    matches!(&ty.unparenthesized().kind, TypeKind::Reference { args, .. } if args.is_empty())
}
