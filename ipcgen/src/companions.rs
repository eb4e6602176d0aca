//! Validator and error-handler association.
//!
//! A function may have two exported siblings in its own file: a validator
//! that checks (and may transform) the incoming argument bag, and an error
//! handler that maps thrown errors to a failure payload. Which sibling
//! belongs to which function is decided by a [`CompanionLookup`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default validator naming pattern.
pub const DEFAULT_VALIDATOR_PATTERN: &str = "{funcName}Validator";

/// Default error-handler naming pattern.
pub const DEFAULT_ERROR_HANDLER_PATTERN: &str = "{funcName}ErrorHandler";

/// Finds the companions of a function among its file's exported names.
pub trait CompanionLookup: Send + Sync + fmt::Debug {
    /// Validator export for `function`, if any.
    fn validator_for(&self, function: &str, exported: &BTreeSet<String>) -> Option<String>;

    /// Error-handler export for `function`, if any.
    fn error_handler_for(&self, function: &str, exported: &BTreeSet<String>) -> Option<String>;
}

/// Substitute `{funcName}` and `{FuncName}` in a naming pattern.
pub fn expand_pattern(pattern: &str, function: &str) -> String {
    pattern
        .replace("{funcName}", function)
        .replace("{FuncName}", &capitalize(function))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Naming-convention lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternCompanions {
    validator: Option<String>,
    error_handler: Option<String>,
}

impl Default for PatternCompanions {
    fn default() -> Self {
        Self {
            validator: Some(DEFAULT_VALIDATOR_PATTERN.to_string()),
            error_handler: Some(DEFAULT_ERROR_HANDLER_PATTERN.to_string()),
        }
    }
}

impl PatternCompanions {
    /// Create a lookup. `None` disables detection for that kind.
    pub fn new(validator: Option<String>, error_handler: Option<String>) -> Self {
        Self {
            validator,
            error_handler,
        }
    }

    /// A lookup that never finds anything.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    fn find(pattern: Option<&str>, function: &str, exported: &BTreeSet<String>) -> Option<String> {
        let candidate = expand_pattern(pattern?, function);
        exported.contains(&candidate).then_some(candidate)
    }
}

impl CompanionLookup for PatternCompanions {
    fn validator_for(&self, function: &str, exported: &BTreeSet<String>) -> Option<String> {
        Self::find(self.validator.as_deref(), function, exported)
    }

    fn error_handler_for(&self, function: &str, exported: &BTreeSet<String>) -> Option<String> {
        Self::find(self.error_handler.as_deref(), function, exported)
    }
}

/// Explicitly declared companion names for one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionNames {
    pub validator: Option<String>,
    pub error_handler: Option<String>,
}

/// Declared mapping consulted before a fallback lookup.
#[derive(Debug)]
pub struct ExplicitCompanions {
    entries: BTreeMap<String, CompanionNames>,
    fallback: Box<dyn CompanionLookup>,
}

impl ExplicitCompanions {
    pub fn new(entries: BTreeMap<String, CompanionNames>, fallback: Box<dyn CompanionLookup>) -> Self {
        Self { entries, fallback }
    }

    fn declared(
        &self,
        function: &str,
        kind: &str,
        name: Option<&String>,
        exported: &BTreeSet<String>,
    ) -> Option<String> {
        let name = name?;
        if exported.contains(name) {
            Some(name.clone())
        } else {
            warn!(function, kind, name = %name, "Declared companion is not exported next to the function, ignoring it");
            None
        }
    }
}

impl CompanionLookup for ExplicitCompanions {
    fn validator_for(&self, function: &str, exported: &BTreeSet<String>) -> Option<String> {
        let declared = self.entries.get(function).and_then(|e| e.validator.as_ref());
        self.declared(function, "validator", declared, exported)
            .or_else(|| self.fallback.validator_for(function, exported))
    }

    fn error_handler_for(&self, function: &str, exported: &BTreeSet<String>) -> Option<String> {
        let declared = self.entries.get(function).and_then(|e| e.error_handler.as_ref());
        self.declared(function, "error handler", declared, exported)
            .or_else(|| self.fallback.error_handler_for(function, exported))
    }
}
