//! Configuration management for the CLI.
//!
//! This module handles loading configuration from `ipcgen.toml` files,
//! merging it with command-line arguments and validating the result into
//! [`BuildOptions`]. Relative paths in the file are resolved against the
//! directory containing it.

use crate::error::{CliResult, ConfigError};
use ipcgen::companions::{CompanionLookup, CompanionNames, ExplicitCompanions, PatternCompanions};
use ipcgen::companions::{DEFAULT_ERROR_HANDLER_PATTERN, DEFAULT_VALIDATOR_PATTERN};
use ipcgen::generator::{ContextType, EventOutputDirs, GlobalErrorHandler, OutputDirs};
use ipcgen::resolver::paths::normalize_path;
use ipcgen::{ApiExtractor, Artifact, GenerationContext};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "ipcgen.toml";

/// Main configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API source discovery.
    pub source: SourceConfig,

    /// Request-context type.
    pub context: ContextConfig,

    /// Output directories of the function artifacts.
    pub output: OutputConfig,

    /// Error handling of the generated code.
    pub errors: ErrorsConfig,

    /// Companion naming patterns.
    pub naming: NamingConfig,

    /// Explicit companions, keyed by function name.
    pub companions: BTreeMap<String, CompanionNames>,

    /// One-way events.
    pub events: EventsConfig,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// API source configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding the API modules.
    pub dir: Option<PathBuf>,

    /// `fileStem.functionName` entries to leave out.
    pub ignore: Vec<String>,

    /// Glob restricting which files are scanned.
    pub filter: Option<String>,
}

/// Request-context configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Module declaring the context type.
    pub path: Option<PathBuf>,

    /// Name of the context type.
    pub name: String,
}

/// Output directory configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Bridge module directory.
    pub preload_dir: PathBuf,

    /// Handler and registration module directory.
    pub main_dir: PathBuf,

    /// Renderer service directory.
    pub renderer_dir: PathBuf,
}

/// Error handling configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Handler consulted after any per-function handler.
    pub global_handler: Option<GlobalHandlerConfig>,

    /// Service methods throw failures instead of returning them.
    pub unwrap_results: bool,
}

/// Global error handler descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalHandlerConfig {
    pub path: PathBuf,
    pub function: String,
    #[serde(default)]
    pub debug: bool,
}

/// Companion naming patterns. An empty pattern disables detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub validator: String,
    pub error_handler: String,
}

/// Event configuration. Events are enabled when `dir` is set; unset output
/// directories fall back to the matching `[output]` directory.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub dir: Option<PathBuf>,
    pub sender_dir: Option<PathBuf>,
    pub preload_dir: Option<PathBuf>,
    pub renderer_dir: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: ipcgen::extract::DEFAULT_CONTEXT_NAME.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            preload_dir: PathBuf::from("src/preload"),
            main_dir: PathBuf::from("src/main/ipc"),
            renderer_dir: PathBuf::from("src/renderer/ipc"),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            validator: DEFAULT_VALIDATOR_PATTERN.to_string(),
            error_handler: DEFAULT_ERROR_HANDLER_PATTERN.to_string(),
        }
    }
}

/// Validated settings of one project, with absolute paths.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory scanned for API modules.
    pub source_dir: PathBuf,

    /// `fileStem.functionName` entries to leave out.
    pub ignore: Vec<String>,

    /// Glob restricting which files are scanned.
    pub filter: Option<String>,

    /// Directory scanned for event aliases.
    pub event_dir: Option<PathBuf>,

    /// Context shared by the generators.
    pub generation: GenerationContext,

    pub naming: NamingConfig,

    pub companions: BTreeMap<String, CompanionNames>,
}

impl BuildOptions {
    /// API extractor configured with the context name, ignore list and
    /// companion lookup.
    pub fn extractor(&self) -> ApiExtractor {
        let fallback = PatternCompanions::new(
            non_empty(&self.naming.validator),
            non_empty(&self.naming.error_handler),
        );
        let companions: Box<dyn CompanionLookup> = if self.companions.is_empty() {
            Box::new(fallback)
        } else {
            Box::new(ExplicitCompanions::new(
                self.companions.clone(),
                Box::new(fallback),
            ))
        };
        ApiExtractor::new(self.generation.context.name.clone())
            .with_ignore(self.ignore.clone())
            .with_companions(companions)
    }

    /// Every directory an artifact is written to.
    pub fn output_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = Vec::new();
        for artifact in Artifact::FUNCTIONS.into_iter().chain(Artifact::EVENTS) {
            if let Some(dir) = artifact.dir(&self.generation) {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
        dirs
    }

    /// Every generated file path.
    #[cfg(test)]
    pub(crate) fn artifact_paths(&self) -> Vec<PathBuf> {
        Artifact::FUNCTIONS
            .into_iter()
            .chain(Artifact::EVENTS)
            .filter_map(|artifact| artifact.path(&self.generation))
            .collect()
    }
}

fn non_empty(pattern: &str) -> Option<String> {
    (!pattern.trim().is_empty()).then(|| pattern.to_string())
}

/// Configuration manager for loading, merging and validating configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// Without a path, `ipcgen.toml` in the current directory is tried and
    /// the default configuration is returned when it does not exist. An
    /// explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> CliResult<Config> {
        let config_path = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
                .into());
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let io_error = |source| ConfigError::Io {
            path: config_path.clone(),
            source,
        };

        if !config_path.exists() {
            return Ok(Config {
                base_dir: std::env::current_dir().map_err(io_error)?,
                ..Config::default()
            });
        }

        let content = std::fs::read_to_string(&config_path).map_err(io_error)?;
        let mut config = Self::parse(&content, &config_path)?;

        let absolute = std::path::absolute(&config_path).map_err(io_error)?;
        config.base_dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(config)
    }

    /// Parse configuration text. `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Config, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::invalid_toml(path, e.to_string()))
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values. Relative paths
    /// given on the command line are resolved against the current directory.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref dir) = args.source_dir {
            config.source.dir = Some(absolute_or_same(dir));
        }

        if let Some(ref filter) = args.filter {
            config.source.filter = Some(filter.clone());
        }

        if let Some(ref path) = args.context_path {
            config.context.path = Some(absolute_or_same(path));
        }

        if let Some(unwrap_results) = args.unwrap_results {
            config.errors.unwrap_results = unwrap_results;
        }

        config
    }

    /// Check required values and resolve every path.
    pub fn validate(config: &Config) -> Result<BuildOptions, ConfigError> {
        let base = &config.base_dir;
        let resolve = |path: &Path| normalize_path(&base.join(path));

        let source_dir = config
            .source
            .dir
            .as_deref()
            .map(resolve)
            .ok_or_else(|| ConfigError::missing_value("source.dir"))?;
        let context_path = config
            .context
            .path
            .as_deref()
            .map(resolve)
            .ok_or_else(|| ConfigError::missing_value("context.path"))?;

        if config.context.name.trim().is_empty() {
            return Err(ConfigError::invalid_value("context.name", "must not be empty"));
        }

        if let Some(entry) = config.source.ignore.iter().find(|e| !is_ignore_entry(e)) {
            return Err(ConfigError::invalid_value(
                "source.ignore",
                format!("'{entry}' is not of the form fileStem.functionName"),
            ));
        }

        if let Some(ref filter) = config.source.filter {
            glob::Pattern::new(filter)
                .map_err(|e| ConfigError::invalid_value("source.filter", e.to_string()))?;
        }

        let global_error_handler = match config.errors.global_handler {
            Some(ref handler) if handler.function.trim().is_empty() => {
                return Err(ConfigError::invalid_value(
                    "errors.global_handler.function",
                    "must not be empty",
                ));
            }
            Some(ref handler) => Some(GlobalErrorHandler {
                path: resolve(&handler.path),
                function_name: handler.function.clone(),
                debug: handler.debug,
            }),
            None => None,
        };

        let output = &config.output;
        let outputs = OutputDirs {
            preload_dir: resolve(&output.preload_dir),
            main_dir: resolve(&output.main_dir),
            renderer_dir: resolve(&output.renderer_dir),
        };

        let events = &config.events;
        let event_dir = events.dir.as_deref().map(resolve);
        let event_outputs = event_dir.as_ref().map(|_| {
            let dir_or = |dir: &Option<PathBuf>, fallback: &Path| {
                dir.as_deref().map(resolve).unwrap_or_else(|| fallback.to_path_buf())
            };
            EventOutputDirs {
                sender_dir: dir_or(&events.sender_dir, &outputs.main_dir),
                preload_dir: dir_or(&events.preload_dir, &outputs.preload_dir),
                renderer_dir: dir_or(&events.renderer_dir, &outputs.renderer_dir),
            }
        });

        let options = BuildOptions {
            source_dir,
            ignore: config.source.ignore.clone(),
            filter: config.source.filter.clone(),
            event_dir,
            generation: GenerationContext {
                outputs,
                events: event_outputs,
                context: ContextType {
                    path: context_path,
                    name: config.context.name.clone(),
                },
                global_error_handler,
                unwrap_results: config.errors.unwrap_results,
            },
            naming: config.naming.clone(),
            companions: config.companions.clone(),
        };

        check_distinct_artifacts(&options)?;
        Ok(options)
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# ipcgen configuration file

[source]
# Directory holding the API modules
dir = "src/main/api"

# Functions to leave out, as "fileStem.functionName"
ignore = []

# Only scan files matching this glob (relative to source.dir)
# filter = "**/*.ts"

[context]
# Module declaring the request-context type
path = "src/main/context.ts"

# Name of the context type; API functions take it as their first parameter
name = "Context"

[output]
# Bridge module (api.ts) exposed to the renderer with contextBridge
preload_dir = "src/preload"

# Handlers (handlers.ts) and registration (register.ts)
main_dir = "src/main/ipc"

# Renderer service (api.ts)
renderer_dir = "src/renderer/ipc"

[errors]
# Service methods throw failures instead of returning { ok: false }
unwrap_results = false

# Handler consulted after any per-function error handler
# global_handler = { path = "src/main/errors.ts", function = "handleError", debug = false }

[naming]
# Companion naming patterns; {funcName} and {FuncName} are substituted.
# An empty string disables detection.
validator = "{funcName}Validator"
error_handler = "{funcName}ErrorHandler"

# Explicit companions take precedence over the naming patterns
# [companions.createUser]
# validator = "checkNewUser"
# error_handler = "userErrors"

[events]
# Directory holding event aliases; events are disabled when unset
# dir = "src/main/events"

# Output directories default to the [output] ones
# sender_dir = "src/main/ipc"
# preload_dir = "src/preload"
# renderer_dir = "src/renderer/ipc"
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Source directory override.
    pub source_dir: Option<PathBuf>,

    /// Filter override.
    pub filter: Option<String>,

    /// Context module override.
    pub context_path: Option<PathBuf>,

    /// Unwrap results override.
    pub unwrap_results: Option<bool>,
}

fn absolute_or_same(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_ignore_entry(entry: &str) -> bool {
    matches!(entry.rsplit_once('.'), Some((stem, name)) if !stem.is_empty() && !name.is_empty())
}

/// Two artifacts resolving to the same file would overwrite each other.
fn check_distinct_artifacts(options: &BuildOptions) -> Result<(), ConfigError> {
    let mut seen: HashMap<PathBuf, Artifact> = HashMap::new();
    for artifact in Artifact::FUNCTIONS.into_iter().chain(Artifact::EVENTS) {
        let Some(path) = artifact.path(&options.generation) else {
            continue;
        };
        if let Some(other) = seen.insert(path.clone(), artifact) {
            return Err(ConfigError::invalid_value(
                "output",
                format!(
                    "the {other} and {artifact} artifacts both write {}",
                    path.display()
                ),
            ));
        }
    }
    Ok(())
}
