//! Context-first API function extraction.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ExtractReport, SkipReason, Skipped};
use crate::companions::{CompanionLookup, PatternCompanions};
use crate::model::{merge_records, FunctionEntry, PackageInfo, ParamBinding, ResolvedField};
use crate::resolver::paths::normalize_path;
use crate::resolver::{FunctionDecl, ModuleIndex, ParamDecl, ParamPattern, Rendered, TypeProgram};

/// Default name of the request-context type.
pub const DEFAULT_CONTEXT_NAME: &str = "Context";

/// Finds exported functions whose first parameter is the context type and
/// flattens their remaining parameters into request fields.
#[derive(Debug)]
pub struct ApiExtractor {
    context_name: String,
    ignore: Vec<String>,
    companions: Box<dyn CompanionLookup>,
}

impl Default for ApiExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_NAME)
    }
}

impl ApiExtractor {
    /// Create an extractor matching `context_name`, with the default
    /// companion naming patterns and an empty ignore list.
    pub fn new(context_name: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            ignore: Vec::new(),
            companions: Box::new(PatternCompanions::default()),
        }
    }

    /// Entries of the form `fileStem.functionName` to leave out.
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_companions(mut self, companions: Box<dyn CompanionLookup>) -> Self {
        self.companions = companions;
        self
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    /// Extract `paths` and merge the result into `existing`.
    pub fn extract(&self, paths: &[PathBuf], existing: Vec<PackageInfo>) -> Vec<PackageInfo> {
        self.extract_report(paths, existing).packages
    }

    /// Like [`extract`](Self::extract), also returning what was skipped.
    pub fn extract_report(&self, paths: &[PathBuf], existing: Vec<PackageInfo>) -> ExtractReport {
        let program = TypeProgram::from_paths(paths);
        self.extract_from(&program, paths, existing)
    }

    /// Extract `paths` from an already loaded program.
    pub fn extract_from(
        &self,
        program: &TypeProgram,
        paths: &[PathBuf],
        existing: Vec<PackageInfo>,
    ) -> ExtractReport {
        let paths: Vec<PathBuf> = paths.iter().map(|path| normalize_path(path)).collect();
        let mut skipped = Vec::new();
        let mut updated = Vec::new();

        for path in &paths {
            let Some(module) = program.module(path) else {
                debug!(path = %path.display(), "Skipping file the type program could not load");
                skipped.push(Skipped::file(path.clone(), SkipReason::UnreadableFile));
                continue;
            };
            let func = self.functions(program, path, module, &mut skipped);
            debug!(path = %path.display(), functions = func.len(), "Extracted API functions");
            updated.push(PackageInfo {
                path: path.clone(),
                func,
            });
        }

        ExtractReport {
            packages: merge_records(existing, &paths, updated),
            skipped,
        }
    }

    fn functions(
        &self,
        program: &TypeProgram,
        path: &Path,
        module: &ModuleIndex,
        skipped: &mut Vec<Skipped>,
    ) -> Vec<FunctionEntry> {
        let exported = module.exported_names();
        let ignored = self.ignored_in(path);
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for name in &module.default_functions {
            debug!(path = %path.display(), function = %name, "Skipping default export");
            skipped.push(Skipped::declaration(
                path.to_path_buf(),
                name,
                SkipReason::DefaultExport,
            ));
        }

        for function in &module.functions {
            let entry = self
                .check(program, path, module, function, &ignored, &mut seen)
                .and_then(|()| self.entry(program, path, function, &exported));
            match entry {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    debug!(
                        path = %path.display(),
                        function = %function.name,
                        %reason,
                        "Skipping function"
                    );
                    skipped.push(Skipped::declaration(
                        path.to_path_buf(),
                        &function.name,
                        reason,
                    ));
                }
            }
        }
        entries
    }

    fn ignored_in(&self, path: &Path) -> HashSet<&str> {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return HashSet::new();
        };
        self.ignore
            .iter()
            .filter_map(|entry| entry.rsplit_once('.'))
            .filter(|(file, _)| *file == stem)
            .map(|(_, function)| function)
            .collect()
    }

    fn check(
        &self,
        program: &TypeProgram,
        path: &Path,
        module: &ModuleIndex,
        function: &FunctionDecl,
        ignored: &HashSet<&str>,
        seen: &mut HashSet<String>,
    ) -> Result<(), SkipReason> {
        if !seen.insert(function.name.clone()) {
            return Err(SkipReason::Overload);
        }
        if !module.is_exported(&function.name) {
            let is_default = module.exports.get("default") == Some(&function.name);
            return Err(if is_default {
                SkipReason::DefaultExport
            } else {
                SkipReason::NotExported
            });
        }
        if ignored.contains(function.name.as_str()) {
            return Err(SkipReason::Ignored);
        }

        let first = function.params.first().ok_or(SkipReason::NoParameters)?;
        let ty = match (&first.pattern, &first.ty) {
            (ParamPattern::Identifier(_), Some(ty)) => ty,
            _ => return Err(SkipReason::UnsupportedContextParameter),
        };

        match program.declared_name(path, ty) {
            Some(name) if name == self.context_name => Ok(()),
            found => Err(SkipReason::ContextMismatch {
                found: found.unwrap_or_else(|| ty.text.clone()),
            }),
        }
    }

    fn entry(
        &self,
        program: &TypeProgram,
        path: &Path,
        function: &FunctionDecl,
        exported: &BTreeSet<String>,
    ) -> Result<FunctionEntry, SkipReason> {
        let mut entry = FunctionEntry::new(&function.name);
        let mut unexported = Vec::new();

        for (index, param) in function.params.iter().enumerate().skip(1) {
            let name = param
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("arg{index}"));

            if matches!(param.pattern, ParamPattern::Rest(_)) {
                let rendered = render(program, path, param, "any[]");
                unexported.extend(rendered.unexported.iter().cloned());
                push_field(
                    &mut entry.request,
                    ResolvedField::optional(&name, &rendered.text).with_imports(rendered.imports),
                );
                entry.bindings.push(ParamBinding::Spread(name));
                continue;
            }

            match param.ty.as_ref().and_then(|ty| program.members(path, ty)) {
                Some(members) => {
                    for member in members {
                        unexported.extend(member.unexported);
                        let field = if member.optional || param.optional {
                            ResolvedField::optional(member.name, &member.type_text)
                        } else {
                            ResolvedField::new(member.name, member.type_text)
                        };
                        push_field(&mut entry.request, field.with_imports(member.imports));
                    }
                    entry.bindings.push(ParamBinding::Bag);
                }
                None => {
                    let rendered = render(program, path, param, "any");
                    unexported.extend(rendered.unexported.iter().cloned());
                    let field = if param.optional {
                        ResolvedField::optional(&name, &rendered.text)
                    } else {
                        ResolvedField::new(&name, rendered.text)
                    };
                    push_field(&mut entry.request, field.with_imports(rendered.imports));
                    entry.bindings.push(ParamBinding::Field(name));
                }
            }
        }

        entry.validator_name = self.companions.validator_for(&function.name, exported);
        entry.error_handler_name = self.companions.error_handler_for(&function.name, exported);

        // Generated modules would name a type they cannot import.
        if let Some(name) = unexported.into_iter().next() {
            return Err(SkipReason::UnexportedType { type_name: name });
        }
        Ok(entry)
    }
}

fn render(program: &TypeProgram, path: &Path, param: &ParamDecl, fallback: &str) -> Rendered {
    param
        .ty
        .as_ref()
        .map(|ty| program.render(path, ty))
        .unwrap_or_else(|| Rendered::plain(fallback))
}

/// The argument bag holds one value per name; the first field wins.
fn push_field(request: &mut Vec<ResolvedField>, field: ResolvedField) {
    if request.iter().any(|existing| existing.name == field.name) {
        debug!(field = %field.name, "Duplicate request field, keeping the first");
        return;
    }
    request.push(field);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypeImport, TypeSource};

    const CONTEXT: &str = "export interface Context { sender: number }";

    fn program(files: &[(&str, &str)]) -> TypeProgram {
        TypeProgram::from_sources(files.iter().map(|(p, s)| (p.to_string(), s.to_string())))
    }

    fn extract(files: &[(&str, &str)], path: &str) -> ExtractReport {
        let program = program(files);
        ApiExtractor::default().extract_from(&program, &[PathBuf::from(path)], Vec::new())
    }

    #[test]
    fn test_flattens_object_parameter_in_declaration_order() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\nexport function save(ctx: Context, input: { id: string; name?: string }) {}",
                ),
            ],
            "/src/api.ts",
        );

        let entry = &report.packages[0].func[0];
        assert_eq!(entry.name, "save");
        assert_eq!(
            entry.request,
            vec![
                ResolvedField::new("id", "string"),
                ResolvedField::optional("name", "string"),
            ]
        );
        assert_eq!(entry.request[1].type_text, "string | undefined");
        assert_eq!(entry.bindings, vec![ParamBinding::Bag]);
    }

    #[test]
    fn test_unexported_alias_in_field_skips_function() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\n\
                     type Mode = 'a' | 'b';\n\
                     export function setMode(ctx: Context, input: { mode: Mode }) {}\n\
                     export function setLabel(ctx: Context, label: string) {}",
                ),
            ],
            "/src/api.ts",
        );

        let names: Vec<_> = report.packages[0].func.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["setLabel"]);
        assert_eq!(
            report.skipped_for("setMode"),
            vec![&SkipReason::UnexportedType {
                type_name: "Mode".to_string()
            }]
        );
    }

    #[test]
    fn test_unexported_interface_parameter_skips_function() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\n\
                     interface Item { id: string }\n\
                     export function addItem(ctx: Context, item: Item, ...rest: Item[]) {}",
                ),
            ],
            "/src/api.ts",
        );

        // `item` flattens to `id: string`; the rest parameter still names `Item`.
        assert!(report.packages[0].func.is_empty());
        assert_eq!(
            report.skipped_for("addItem"),
            vec![&SkipReason::UnexportedType {
                type_name: "Item".to_string()
            }]
        );
    }

    #[test]
    fn test_flattened_unexported_interface_is_accepted() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\n\
                     interface Input { id: string }\n\
                     export function remove(ctx: Context, input: Input) {}",
                ),
            ],
            "/src/api.ts",
        );

        assert_eq!(
            report.packages[0].func[0].request,
            vec![ResolvedField::new("id", "string")]
        );
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_primitive_parameters_become_fields() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\nexport function rename(ctx: Context, id: string, name?: string) {}",
                ),
            ],
            "/src/api.ts",
        );

        let entry = &report.packages[0].func[0];
        assert_eq!(
            entry.request,
            vec![
                ResolvedField::new("id", "string"),
                ResolvedField::optional("name", "string"),
            ]
        );
        assert_eq!(
            entry.bindings,
            vec![
                ParamBinding::Field("id".to_string()),
                ParamBinding::Field("name".to_string())
            ]
        );
    }

    #[test]
    fn test_rest_and_untyped_parameters() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\nexport function log(ctx: Context, level, ...lines: string[]) {}",
                ),
            ],
            "/src/api.ts",
        );

        let entry = &report.packages[0].func[0];
        assert_eq!(entry.request[0], ResolvedField::new("level", "any"));
        assert_eq!(entry.request[1].type_text, "string[] | undefined");
        assert_eq!(entry.bindings[1], ParamBinding::Spread("lines".to_string()));
    }

    #[test]
    fn test_interface_parameter_carries_imports() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/types.ts",
                    "export interface User { id: string }\nexport interface CreateTask { title: string; owner: User }",
                ),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\nimport type { CreateTask } from './types';\nexport function createTask(ctx: Context, input: CreateTask) {}",
                ),
            ],
            "/src/api.ts",
        );

        let owner = &report.packages[0].func[0].request[1];
        assert_eq!(owner.name, "owner");
        assert_eq!(owner.type_text, "User");
        assert_eq!(
            owner.imports,
            vec![TypeImport::named(
                "User",
                TypeSource::File(PathBuf::from("/src/types.ts"))
            )]
        );
    }

    #[test]
    fn test_context_may_be_imported_under_alias() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context as Ctx } from './context';\nexport function ping(ctx: Ctx) {}",
                ),
            ],
            "/src/api.ts",
        );

        assert_eq!(report.packages[0].func.len(), 1);
        assert!(report.packages[0].func[0].request.is_empty());
    }

    #[test]
    fn test_skip_reasons_are_reported() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\n\
                     function hidden(ctx: Context) {}\n\
                     export function none() {}\n\
                     export function destructured({ sender }: Context) {}\n\
                     export function wrong(ctx: string) {}\n\
                     export function twice(ctx: Context, a: string): void;\n\
                     export function twice(ctx: Context, a: string | number) {}",
                ),
            ],
            "/src/api.ts",
        );

        assert_eq!(report.skipped_for("hidden"), vec![&SkipReason::NotExported]);
        assert_eq!(report.skipped_for("none"), vec![&SkipReason::NoParameters]);
        assert_eq!(
            report.skipped_for("destructured"),
            vec![&SkipReason::UnsupportedContextParameter]
        );
        assert_eq!(
            report.skipped_for("wrong"),
            vec![&SkipReason::ContextMismatch {
                found: "string".to_string()
            }]
        );
        assert_eq!(report.skipped_for("twice"), vec![&SkipReason::Overload]);

        let names: Vec<&str> = report.packages[0].func.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["twice"]);
        assert_eq!(report.packages[0].func[0].request[0].type_text, "string");
    }

    #[test]
    fn test_default_exports_are_reported() {
        let report = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/api.ts",
                    "import { Context } from './context';\n\
                     export default function create(ctx: Context, id: string) {}\n\
                     export function list(ctx: Context) {}",
                ),
            ],
            "/src/api.ts",
        );
        assert_eq!(report.skipped_for("create"), vec![&SkipReason::DefaultExport]);
        let names: Vec<&str> = report.packages[0].func.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["list"]);

        let renamed = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/renamed.ts",
                    "import { Context } from './context';\n\
                     function remove(ctx: Context, id: string) {}\n\
                     export { remove as default };",
                ),
            ],
            "/src/renamed.ts",
        );
        assert_eq!(renamed.skipped_for("remove"), vec![&SkipReason::DefaultExport]);

        let anonymous = extract(
            &[
                ("/src/context.ts", CONTEXT),
                (
                    "/src/anonymous.ts",
                    "import { Context } from './context';\nexport default function (ctx: Context) {}",
                ),
            ],
            "/src/anonymous.ts",
        );
        assert_eq!(anonymous.skipped_for("default"), vec![&SkipReason::DefaultExport]);
        assert_eq!(
            SkipReason::DefaultExport.to_string(),
            "default export has no channel name"
        );
    }

    #[test]
    fn test_ignore_list_matches_file_stem() {
        let program = program(&[
            ("/src/context.ts", CONTEXT),
            (
                "/src/users.ts",
                "import { Context } from './context';\nexport function a(ctx: Context) {}\nexport function b(ctx: Context) {}",
            ),
        ]);
        let extractor = ApiExtractor::default()
            .with_ignore(vec!["users.a".to_string(), "orders.b".to_string()]);

        let report = extractor.extract_from(&program, &[PathBuf::from("/src/users.ts")], Vec::new());

        assert_eq!(report.skipped_for("a"), vec![&SkipReason::Ignored]);
        assert_eq!(report.packages[0].func.len(), 1);
        assert_eq!(report.packages[0].func[0].name, "b");
    }

    #[test]
    fn test_validator_pattern_requires_export() {
        let files = [
            ("/src/context.ts", CONTEXT),
            (
                "/src/api.ts",
                "import { Context } from './context';\nexport function doThing(ctx: Context) {}\nexport function validateDoThing(input: unknown) { return input; }\nexport function other(ctx: Context) {}\nfunction validateOther() {}",
            ),
        ];
        let program = program(&files);
        let extractor = ApiExtractor::default().with_companions(Box::new(PatternCompanions::new(
            Some("validate{FuncName}".to_string()),
            None,
        )));

        let report = extractor.extract_from(&program, &[PathBuf::from("/src/api.ts")], Vec::new());
        let func = &report.packages[0].func;

        let do_thing = func.iter().find(|f| f.name == "doThing").unwrap();
        assert_eq!(do_thing.validator_name.as_deref(), Some("validateDoThing"));
        let other = func.iter().find(|f| f.name == "other").unwrap();
        assert_eq!(other.validator_name, None);
    }

    #[test]
    fn test_merge_replaces_existing_package() {
        let program = program(&[
            ("/src/context.ts", CONTEXT),
            (
                "/src/api.ts",
                "import { Context } from './context';\nexport function fresh(ctx: Context) {}",
            ),
        ]);
        let existing = vec![
            PackageInfo {
                path: PathBuf::from("/src/api.ts"),
                func: vec![FunctionEntry::new("stale")],
            },
            PackageInfo {
                path: PathBuf::from("/src/other.ts"),
                func: vec![FunctionEntry::new("kept")],
            },
        ];

        let packages = ApiExtractor::default()
            .extract_from(&program, &[PathBuf::from("/src/api.ts")], existing)
            .packages;

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].func[0].name, "kept");
        assert_eq!(packages[1].func[0].name, "fresh");
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let report = ApiExtractor::default()
            .extract_report(&[PathBuf::from("/definitely/not/here.ts")], Vec::new());

        assert!(report.packages.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::UnreadableFile);
        assert_eq!(report.skipped[0].name, None);
    }
}
