//! Event alias extraction.
//!
//! An event is an exported alias of a single-parameter function type
//! returning `void`, whose parameter is a named type:
//!
//! ```ts
//! export type UserUpdated = (user: User) => void;
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ExtractReport, SkipReason, Skipped};
use crate::model::{EventInfo, EventPackageInfo};
use crate::resolver::paths::normalize_path;
use crate::resolver::{AliasDecl, ModuleIndex, ParamPattern, TypeKind, TypeProgram};

/// Extract events declared in `paths`.
pub fn extract_events(paths: &[PathBuf]) -> Vec<EventPackageInfo> {
    EventExtractor.extract_report(paths).packages
}

/// Event extraction with skip diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventExtractor;

impl EventExtractor {
    pub fn extract_report(&self, paths: &[PathBuf]) -> ExtractReport<EventPackageInfo> {
        let program = TypeProgram::from_paths(paths);
        self.extract_from(&program, paths)
    }

    pub fn extract_from(
        &self,
        program: &TypeProgram,
        paths: &[PathBuf],
    ) -> ExtractReport<EventPackageInfo> {
        let mut packages = Vec::new();
        let mut skipped = Vec::new();

        for path in paths.iter().map(|path| normalize_path(path)) {
            let Some(module) = program.module(&path) else {
                debug!(path = %path.display(), "Skipping event file the type program could not load");
                skipped.push(Skipped::file(path, SkipReason::UnreadableFile));
                continue;
            };

            let mut aliases: Vec<&AliasDecl> = module.aliases.values().collect();
            aliases.sort_by_key(|alias| alias.start);

            let mut events = Vec::new();
            for alias in aliases {
                match event(program, &path, module, alias) {
                    Ok(event) => events.push(event),
                    Err(reason) => {
                        debug!(path = %path.display(), alias = %alias.name, %reason, "Skipping event alias");
                        skipped.push(Skipped::declaration(path.clone(), &alias.name, reason));
                    }
                }
            }
            debug!(path = %path.display(), events = events.len(), "Extracted events");
            packages.push(EventPackageInfo { path, events });
        }

        ExtractReport { packages, skipped }
    }
}

fn event(
    program: &TypeProgram,
    path: &Path,
    module: &ModuleIndex,
    alias: &AliasDecl,
) -> Result<EventInfo, SkipReason> {
    if !module.is_exported(&alias.name) {
        return Err(SkipReason::NotExported);
    }
    let TypeKind::Function {
        params,
        return_type,
    } = &alias.ty.unparenthesized().kind
    else {
        return Err(SkipReason::NotAFunctionType);
    };
    if !return_type.is_keyword("void") {
        return Err(SkipReason::ReturnNotVoid);
    }
    let [param] = params.as_slice() else {
        return Err(SkipReason::ParameterCount {
            count: params.len(),
        });
    };
    if matches!(param.pattern, ParamPattern::Rest(_)) {
        return Err(SkipReason::ParameterNotNamedReference);
    }

    let ty = param
        .ty
        .as_ref()
        .ok_or(SkipReason::ParameterNotNamedReference)?;
    match &ty.unparenthesized().kind {
        TypeKind::Reference { name, args } if args.is_empty() => Ok(EventInfo {
            name: alias.name.clone(),
            param_type_name: name.to_string(),
            param_import: program.import_for(path, name.head()),
        }),
        _ => Err(SkipReason::ParameterNotNamedReference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypeImport, TypeSource};

    fn extract(source: &str) -> ExtractReport<EventPackageInfo> {
        let program = TypeProgram::from_sources([
            ("/src/types.ts", "export interface User { id: string }"),
            ("/src/events.ts", source),
        ]);
        EventExtractor.extract_from(&program, &[PathBuf::from("/src/events.ts")])
    }

    #[test]
    fn test_extracts_void_single_parameter_aliases() {
        let report = extract(
            "import type { User } from './types';\n\
             export type UserUpdated = (user: User) => void;\n\
             export type Ping = (at: Date) => void;",
        );

        let events = &report.packages[0].events;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "UserUpdated");
        assert_eq!(events[0].param_type_name, "User");
        assert_eq!(
            events[0].param_import,
            Some(TypeImport::named(
                "User",
                TypeSource::File(PathBuf::from("/src/types.ts"))
            ))
        );
        assert_eq!(events[1].param_type_name, "Date");
        assert_eq!(events[1].param_import, None);
    }

    #[test]
    fn test_non_conforming_aliases_are_skipped() {
        let report = extract(
            "import type { User } from './types';\n\
             type Hidden = (user: User) => void;\n\
             export type Plain = User;\n\
             export type Returns = (user: User) => string;\n\
             export type TwoArgs = (a: User, b: User) => void;\n\
             export type NoArgs = () => void;\n\
             export type Inline = (user: { id: string }) => void;\n\
             export type Generic = (users: Array<User>) => void;",
        );

        assert!(report.packages[0].events.is_empty());
        assert_eq!(report.skipped_for("Hidden"), vec![&SkipReason::NotExported]);
        assert_eq!(report.skipped_for("Plain"), vec![&SkipReason::NotAFunctionType]);
        assert_eq!(report.skipped_for("Returns"), vec![&SkipReason::ReturnNotVoid]);
        assert_eq!(
            report.skipped_for("TwoArgs"),
            vec![&SkipReason::ParameterCount { count: 2 }]
        );
        assert_eq!(
            report.skipped_for("NoArgs"),
            vec![&SkipReason::ParameterCount { count: 0 }]
        );
        assert_eq!(
            report.skipped_for("Inline"),
            vec![&SkipReason::ParameterNotNamedReference]
        );
        assert_eq!(
            report.skipped_for("Generic"),
            vec![&SkipReason::ParameterNotNamedReference]
        );
    }

    #[test]
    fn test_local_payload_type_imports_from_event_file() {
        let report = extract(
            "export interface Progress { percent: number }\nexport type Progressed = (progress: Progress) => void;",
        );

        let event = &report.packages[0].events[0];
        assert_eq!(
            event.param_import,
            Some(TypeImport::named(
                "Progress",
                TypeSource::File(PathBuf::from("/src/events.ts"))
            ))
        );
    }

    #[test]
    fn test_missing_event_file_is_reported() {
        let report = EventExtractor.extract_report(&[PathBuf::from("/definitely/not/events.ts")]);
        assert!(report.packages.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::UnreadableFile);
        assert!(extract_events(&[PathBuf::from("/definitely/not/events.ts")]).is_empty());
    }
}
