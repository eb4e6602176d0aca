//! Import block rendering for generated modules.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::{TypeImport, TypeSource};
use crate::resolver::paths::relative_specifier;

/// Imports of one generated file, in first-reference order.
///
/// Each module gets one line. A module referenced only for types renders as
/// `import type { … }`; once a runtime value is referenced the line becomes
/// `import { a, type B }`. A local name is bound at most once; later
/// conflicting bindings are dropped.
#[derive(Debug, Clone)]
pub struct ImportSet {
    from_dir: PathBuf,
    modules: Vec<ModuleImport>,
}

#[derive(Debug, Clone)]
struct ModuleImport {
    specifier: String,
    namespace: Option<String>,
    names: Vec<ImportedName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportedName {
    imported: String,
    local: String,
    value: bool,
}

impl ImportedName {
    fn render(&self) -> String {
        if self.imported == self.local {
            self.local.clone()
        } else {
            format!("{} as {}", self.imported, self.local)
        }
    }
}

impl ImportSet {
    /// Create an import set for a file generated into `from_dir`.
    pub fn new(from_dir: impl Into<PathBuf>) -> Self {
        Self {
            from_dir: from_dir.into(),
            modules: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Runtime value from a bare module such as `electron`.
    pub fn module_value(&mut self, specifier: &str, name: &str) {
        self.add(specifier.to_string(), name, name, true);
    }

    /// Type from a bare module.
    pub fn module_type(&mut self, specifier: &str, name: &str) {
        self.add(specifier.to_string(), name, name, false);
    }

    /// Runtime value exported by a file.
    pub fn file_value(&mut self, file: &Path, name: &str) {
        let specifier = relative_specifier(&self.from_dir, file);
        self.add(specifier, name, name, true);
    }

    /// Type (or `typeof` target) exported by a file.
    pub fn file_type(&mut self, file: &Path, name: &str) {
        let specifier = relative_specifier(&self.from_dir, file);
        self.add(specifier, name, name, false);
    }

    /// An import carried by a rendered type.
    pub fn type_import(&mut self, import: &TypeImport) {
        let specifier = match &import.source {
            TypeSource::File(file) => relative_specifier(&self.from_dir, file),
            TypeSource::Module(module) => module.clone(),
        };
        if import.namespace {
            self.add_namespace(specifier, &import.local);
        } else {
            self.add(specifier, &import.imported, &import.local, false);
        }
    }

    pub fn type_imports<'a>(&mut self, imports: impl IntoIterator<Item = &'a TypeImport>) {
        for import in imports {
            self.type_import(import);
        }
    }

    fn bound(&self, local: &str) -> Option<(&ModuleImport, Option<&ImportedName>)> {
        self.modules.iter().find_map(|module| {
            if module.namespace.as_deref() == Some(local) {
                return Some((module, None));
            }
            module
                .names
                .iter()
                .find(|name| name.local == local)
                .map(|name| (module, Some(name)))
        })
    }

    fn add(&mut self, specifier: String, imported: &str, local: &str, value: bool) {
        if let Some((module, name)) = self.bound(local) {
            let same = module.specifier == specifier
                && name.is_some_and(|name| name.imported == imported);
            if !same {
                debug!(local, specifier = %specifier, "Import name already bound, keeping the first");
                return;
            }
            if value {
                self.upgrade(&specifier, local);
            }
            return;
        }

        let position = self
            .modules
            .iter()
            .position(|module| module.namespace.is_none() && module.specifier == specifier);
        let module = match position {
            Some(index) => &mut self.modules[index],
            None => {
                self.modules.push(ModuleImport {
                    specifier,
                    namespace: None,
                    names: Vec::new(),
                });
                let last = self.modules.len() - 1;
                &mut self.modules[last]
            }
        };
        module.names.push(ImportedName {
            imported: imported.to_string(),
            local: local.to_string(),
            value,
        });
    }

    fn upgrade(&mut self, specifier: &str, local: &str) {
        let names = self
            .modules
            .iter_mut()
            .filter(|module| module.namespace.is_none() && module.specifier == specifier)
            .flat_map(|module| module.names.iter_mut());
        for name in names {
            if name.local == local {
                name.value = true;
            }
        }
    }

    fn add_namespace(&mut self, specifier: String, local: &str) {
        if let Some((module, name)) = self.bound(local) {
            if name.is_some() || module.specifier != specifier {
                debug!(local, specifier = %specifier, "Import name already bound, keeping the first");
            }
            return;
        }
        self.modules.push(ModuleImport {
            specifier,
            namespace: Some(local.to_string()),
            names: Vec::new(),
        });
    }

    /// Render the import lines, followed by a blank line when non-empty.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for module in &self.modules {
            if let Some(namespace) = &module.namespace {
                output.push_str(&format!(
                    "import type * as {namespace} from '{}';\n",
                    module.specifier
                ));
                continue;
            }
            if module.names.iter().any(|name| name.value) {
                let names: Vec<String> = module
                    .names
                    .iter()
                    .map(|name| {
                        if name.value {
                            name.render()
                        } else {
                            format!("type {}", name.render())
                        }
                    })
                    .collect();
                output.push_str(&format!(
                    "import {{ {} }} from '{}';\n",
                    names.join(", "),
                    module.specifier
                ));
            } else {
                let names: Vec<String> = module.names.iter().map(ImportedName::render).collect();
                output.push_str(&format!(
                    "import type {{ {} }} from '{}';\n",
                    names.join(", "),
                    module.specifier
                ));
            }
        }
        if !output.is_empty() {
            output.push('\n');
        }
        output
    }
}
