//! Extraction of API functions and events from TypeScript sources.
//!
//! Extraction never fails. Anything that does not fit is skipped and the
//! reason recorded in the report, so callers (and tests) can see why a
//! declaration did not make it into the model.

mod api;
mod events;

pub use api::{ApiExtractor, DEFAULT_CONTEXT_NAME};
pub use events::{extract_events, EventExtractor};

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::model::PackageInfo;

/// Why a file, function or event alias was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
    /// The file could not be read or parsed.
    UnreadableFile,
    /// Listed in the ignore list.
    Ignored,
    /// Declared but not exported under its own name.
    NotExported,
    /// Function without any parameter.
    NoParameters,
    /// First parameter is destructured, a rest parameter or untyped.
    UnsupportedContextParameter,
    /// First parameter is typed with something other than the context type.
    ContextMismatch { found: String },
    /// A later declaration of an already seen function name.
    Overload,
    /// A request field refers to a local type that is not exported.
    UnexportedType {
        #[serde(rename = "typeName")]
        type_name: String,
    },
    /// `export default` declarations have no name to use as a channel.
    DefaultExport,
    /// Event alias is not a function type.
    NotAFunctionType,
    /// Event function type does not return `void`.
    ReturnNotVoid,
    /// Event function type does not take exactly one parameter.
    ParameterCount { count: usize },
    /// Event parameter is not a plain named type reference.
    ParameterNotNamedReference,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableFile => f.write_str("file could not be read or parsed"),
            Self::Ignored => f.write_str("listed in the ignore list"),
            Self::NotExported => f.write_str("not exported"),
            Self::NoParameters => f.write_str("has no parameters"),
            Self::UnsupportedContextParameter => {
                f.write_str("first parameter is destructured, rest or untyped")
            }
            Self::ContextMismatch { found } => {
                write!(f, "first parameter type '{found}' is not the context type")
            }
            Self::Overload => f.write_str("repeated declaration of an earlier function"),
            Self::UnexportedType { type_name } => {
                write!(f, "refers to type '{type_name}', which is not exported")
            }
            Self::DefaultExport => f.write_str("default export has no channel name"),
            Self::NotAFunctionType => f.write_str("not a function type"),
            Self::ReturnNotVoid => f.write_str("does not return void"),
            Self::ParameterCount { count } => {
                write!(f, "takes {count} parameters instead of one")
            }
            Self::ParameterNotNamedReference => {
                f.write_str("parameter is not a named type reference")
            }
        }
    }
}

/// One skipped file or declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skipped {
    pub path: PathBuf,
    /// Function or alias name; `None` when the whole file was skipped.
    pub name: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl Skipped {
    pub fn file(path: PathBuf, reason: SkipReason) -> Self {
        Self {
            path,
            name: None,
            reason,
        }
    }

    pub fn declaration(path: PathBuf, name: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            path,
            name: Some(name.into()),
            reason,
        }
    }
}

/// Extracted records together with everything that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport<T = PackageInfo> {
    pub packages: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> ExtractReport<T> {
    /// Skip entries for a given declaration name.
    pub fn skipped_for(&self, name: &str) -> Vec<&SkipReason> {
        self.skipped
            .iter()
            .filter(|s| s.name.as_deref() == Some(name))
            .map(|s| &s.reason)
            .collect()
    }
}
