//! Generators for the bridge, handler, service and event artifacts.
//!
//! Every generator is a pure function from the extracted model (already
//! sorted by the caller) and a [`GenerationContext`] to TypeScript text.
//! Entries are emitted in input order and the zero-entry case always
//! produces a valid, if empty, module.

mod bridge;
mod events;
mod handlers;
mod imports;
mod service;

pub use bridge::generate_bridge;
pub use events::{generate_event_sender, generate_preload_events, generate_renderer_events};
pub use handlers::{generate_handlers, generate_registration};
pub use imports::ImportSet;
pub use service::generate_service;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{EventInfo, EventPackageInfo, FunctionEntry, PackageInfo, ResolvedField};

/// First line of every generated file.
pub const HEADER: &str = "// auto generated by ipcgen, do not edit";

/// Global error handler applied after any per-function handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalErrorHandler {
    /// Module exporting the handler.
    pub path: PathBuf,
    /// Exported function name.
    pub function_name: String,
    /// Log every caught error with `console.error` before handling it.
    #[serde(default)]
    pub debug: bool,
}

/// Request-context type imported by the host-side artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextType {
    pub path: PathBuf,
    pub name: String,
}

/// Output directories of the function artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    pub preload_dir: PathBuf,
    pub main_dir: PathBuf,
    pub renderer_dir: PathBuf,
}

/// Output directories of the event artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutputDirs {
    pub sender_dir: PathBuf,
    pub preload_dir: PathBuf,
    pub renderer_dir: PathBuf,
}

/// Read-only configuration shared by all generators of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    pub outputs: OutputDirs,
    /// `None` when events are not configured.
    pub events: Option<EventOutputDirs>,
    pub context: ContextType,
    pub global_error_handler: Option<GlobalErrorHandler>,
    /// Service methods throw failures instead of returning them.
    pub unwrap_results: bool,
}

/// The seven generated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Artifact {
    Bridge,
    Handlers,
    Registration,
    Service,
    EventSender,
    PreloadEvents,
    RendererEvents,
}

impl Artifact {
    pub const FUNCTIONS: [Artifact; 4] = [
        Artifact::Bridge,
        Artifact::Handlers,
        Artifact::Registration,
        Artifact::Service,
    ];

    pub const EVENTS: [Artifact; 3] = [
        Artifact::EventSender,
        Artifact::PreloadEvents,
        Artifact::RendererEvents,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Bridge | Self::Service => "api.ts",
            Self::Handlers => "handlers.ts",
            Self::Registration => "register.ts",
            Self::EventSender | Self::PreloadEvents | Self::RendererEvents => "events.ts",
        }
    }

    /// Directory the artifact is written to, if configured.
    pub fn dir(self, context: &GenerationContext) -> Option<&Path> {
        let outputs = &context.outputs;
        match self {
            Self::Bridge => Some(&outputs.preload_dir),
            Self::Handlers | Self::Registration => Some(&outputs.main_dir),
            Self::Service => Some(&outputs.renderer_dir),
            Self::EventSender => context.events.as_ref().map(|e| e.sender_dir.as_path()),
            Self::PreloadEvents => context.events.as_ref().map(|e| e.preload_dir.as_path()),
            Self::RendererEvents => context.events.as_ref().map(|e| e.renderer_dir.as_path()),
        }
    }

    pub fn path(self, context: &GenerationContext) -> Option<PathBuf> {
        self.dir(context).map(|dir| dir.join(self.file_name()))
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bridge => "bridge",
            Self::Handlers => "handlers",
            Self::Registration => "registration",
            Self::Service => "service",
            Self::EventSender => "event sender",
            Self::PreloadEvents => "preload events",
            Self::RendererEvents => "renderer events",
        };
        f.write_str(name)
    }
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub artifact: Artifact,
    pub path: PathBuf,
    pub content: String,
}

/// Generate every configured artifact.
///
/// Event artifacts are produced only when `events` is given and the context
/// has event output directories.
pub fn generate_all(
    packages: &[PackageInfo],
    events: Option<&[EventPackageInfo]>,
    context: &GenerationContext,
) -> Vec<GeneratedFile> {
    let mut files = Vec::new();
    let outputs = &context.outputs;

    files.push(GeneratedFile {
        artifact: Artifact::Bridge,
        path: outputs.preload_dir.join(Artifact::Bridge.file_name()),
        content: generate_bridge(packages, &outputs.preload_dir),
    });
    files.push(GeneratedFile {
        artifact: Artifact::Handlers,
        path: outputs.main_dir.join(Artifact::Handlers.file_name()),
        content: generate_handlers(packages, &outputs.main_dir, context),
    });
    files.push(GeneratedFile {
        artifact: Artifact::Registration,
        path: outputs.main_dir.join(Artifact::Registration.file_name()),
        content: generate_registration(packages, &outputs.main_dir, context),
    });
    files.push(GeneratedFile {
        artifact: Artifact::Service,
        path: outputs.renderer_dir.join(Artifact::Service.file_name()),
        content: generate_service(packages, &outputs.renderer_dir, context),
    });

    if let (Some(events), Some(dirs)) = (events, &context.events) {
        files.push(GeneratedFile {
            artifact: Artifact::EventSender,
            path: dirs.sender_dir.join(Artifact::EventSender.file_name()),
            content: generate_event_sender(events, &dirs.sender_dir),
        });
        files.push(GeneratedFile {
            artifact: Artifact::PreloadEvents,
            path: dirs.preload_dir.join(Artifact::PreloadEvents.file_name()),
            content: generate_preload_events(events, &dirs.preload_dir),
        });
        files.push(GeneratedFile {
            artifact: Artifact::RendererEvents,
            path: dirs.renderer_dir.join(Artifact::RendererEvents.file_name()),
            content: generate_renderer_events(events, &dirs.renderer_dir),
        });
    }
    files
}

// Helpers shared by the generators.

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield", "let", "static",
    "implements", "interface", "package", "private", "protected", "public", "await",
];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    valid && !RESERVED.contains(&name)
}

/// Object key for `name`, quoted when it is not an identifier.
fn property_key(name: &str) -> String {
    if is_identifier(name) || RESERVED.contains(&name) {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// Object type literal of the flattened request fields.
fn request_type(fields: &[ResolvedField]) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }
    let members: Vec<String> = fields
        .iter()
        .map(|field| {
            let marker = if field.optional { "?" } else { "" };
            format!("{}{marker}: {}", property_key(&field.name), field.type_text)
        })
        .collect();
    format!("{{ {} }}", members.join("; "))
}

/// Whether the generated handler receives the argument bag.
fn takes_args(entry: &FunctionEntry) -> bool {
    !entry.request.is_empty() || entry.validator_name.is_some()
}

fn pascal(name: &str) -> String {
    name.to_case(Case::Pascal)
}

/// PascalCase identifiers unique within one generated file. A name that
/// collapses onto an earlier one (`getUser` and `get_user`) gets the first
/// free numeric suffix, starting at 2.
#[derive(Debug, Default)]
struct PascalNames {
    taken: HashSet<String>,
}

impl PascalNames {
    fn claim(&mut self, name: &str) -> String {
        let base = pascal(name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(candidate.clone()) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        if candidate != base {
            warn!(%name, %base, renamed = %candidate, "Generated name collides, adding a suffix");
        }
        candidate
    }
}

fn functions(packages: &[PackageInfo]) -> impl Iterator<Item = (&Path, &FunctionEntry)> {
    packages
        .iter()
        .flat_map(|package| package.func.iter().map(move |f| (package.path.as_path(), f)))
}

fn all_events(packages: &[EventPackageInfo]) -> impl Iterator<Item = (&Path, &EventInfo)> {
    packages
        .iter()
        .flat_map(|package| package.events.iter().map(move |e| (package.path.as_path(), e)))
}

/// Payload type of an event, registering the imports it needs.
fn payload_type(imports: &mut ImportSet, path: &Path, event: &EventInfo) -> String {
    match &event.param_import {
        Some(import) => {
            imports.type_import(import);
            event.param_type_name.clone()
        }
        None => {
            imports.file_type(path, &event.name);
            format!("Parameters<{}>[0]", event.name)
        }
    }
}

/// `head { members }`, preceded by a blank line.
fn block(head: &str, members: &str) -> String {
    if members.is_empty() {
        format!("\n{head} {{}}\n")
    } else {
        format!("\n{head} {{\n{members}}}\n")
    }
}

fn file(imports: &ImportSet, body: &str) -> String {
    let mut output = String::new();
    output.push_str(HEADER);
    output.push_str("\n\n");
    output.push_str(&imports.render());
    output.push_str(body);
    output
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::{ParamBinding, TypeImport, TypeSource};

    pub fn context() -> GenerationContext {
        GenerationContext {
            outputs: OutputDirs {
                preload_dir: PathBuf::from("/app/src/preload"),
                main_dir: PathBuf::from("/app/src/main/ipc"),
                renderer_dir: PathBuf::from("/app/src/renderer/ipc"),
            },
            events: Some(EventOutputDirs {
                sender_dir: PathBuf::from("/app/src/main/ipc"),
                preload_dir: PathBuf::from("/app/src/preload"),
                renderer_dir: PathBuf::from("/app/src/renderer/ipc"),
            }),
            context: ContextType {
                path: PathBuf::from("/app/src/main/context.ts"),
                name: "Context".to_string(),
            },
            global_error_handler: None,
            unwrap_results: false,
        }
    }

    pub fn packages() -> Vec<PackageInfo> {
        let mut create = FunctionEntry::new("createUser");
        create.request = vec![
            ResolvedField::new("name", "string"),
            ResolvedField::optional("email", "string"),
            ResolvedField::new("role", "Role").with_imports(vec![TypeImport::named(
                "Role",
                TypeSource::File(PathBuf::from("/app/src/main/types.ts")),
            )]),
        ];
        create.bindings = vec![ParamBinding::Bag];
        create.validator_name = Some("createUserValidator".to_string());
        create.error_handler_name = Some("createUserErrorHandler".to_string());

        let mut get = FunctionEntry::new("getUser");
        get.request = vec![ResolvedField::new("id", "string")];
        get.bindings = vec![ParamBinding::Field("id".to_string())];

        vec![
            PackageInfo {
                path: PathBuf::from("/app/src/main/api/users.ts"),
                func: vec![create, get],
            },
            PackageInfo {
                path: PathBuf::from("/app/src/main/api/system.ts"),
                func: vec![FunctionEntry::new("ping")],
            },
        ]
    }

    pub fn events() -> Vec<EventPackageInfo> {
        vec![EventPackageInfo {
            path: PathBuf::from("/app/src/main/events.ts"),
            events: vec![
                EventInfo {
                    name: "UserUpdated".to_string(),
                    param_type_name: "User".to_string(),
                    param_import: Some(TypeImport::named(
                        "User",
                        TypeSource::File(PathBuf::from("/app/src/main/types.ts")),
                    )),
                },
                EventInfo {
                    name: "Tick".to_string(),
                    param_type_name: "number".to_string(),
                    param_import: None,
                },
            ],
        }]
    }
}
