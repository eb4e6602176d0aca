//! # ipcgen
//!
//! Generates Electron IPC wiring from TypeScript API modules.
//!
//! An *API function* is an exported function whose first parameter is the
//! request-context type:
//!
//! ```ts
//! export async function createUser(ctx: Context, input: { name: string; email?: string }) {
//!   // ...
//! }
//! ```
//!
//! Its remaining parameters are flattened into a request bag
//! (`{ name: string; email?: string | undefined }`), and bridge, handler,
//! registration and service modules are generated so the renderer can call
//! `apiService.createUser({ name })` across the process boundary. Exported
//! aliases of `(payload: T) => void` function types become one-way events
//! with their own sender and subscription modules.
//!
//! ## Pipeline
//!
//! 1. [`resolver::TypeProgram`] parses the sources with `oxc` and resolves
//!    types structurally across files.
//! 2. [`extract::ApiExtractor`] and [`extract::EventExtractor`] build the
//!    [`model`], reporting every skipped declaration.
//! 3. The [`generator`] functions render the artifacts as text.
//!
//! Writing files, scanning directories and watching live in `ipcgen-cli`.
//!
//! ## Modules
//!
//! - [`model`] - Extracted records and merge helpers
//! - [`resolver`] - TypeScript module indexing and type resolution
//! - [`introspect`] - Static `zod` schema shape introspection
//! - [`companions`] - Validator and error-handler association
//! - [`extract`] - API and event extraction
//! - [`generator`] - Artifact generators
//! - [`error`] - Per-file resolution errors

pub mod companions;
pub mod error;
pub mod extract;
pub mod generator;
pub mod introspect;
pub mod model;
pub mod resolver;

pub use companions::{CompanionLookup, CompanionNames, ExplicitCompanions, PatternCompanions};
pub use error::{ResolveError, ResolveResult};
pub use extract::{extract_events, ApiExtractor, EventExtractor, ExtractReport, SkipReason, Skipped};
pub use generator::{generate_all, Artifact, GeneratedFile, GenerationContext};
pub use introspect::{SchemaIntrospector, ZodIntrospector};
pub use model::{EventInfo, EventPackageInfo, FunctionEntry, PackageInfo, ResolvedField};
pub use resolver::TypeProgram;
