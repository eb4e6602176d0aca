//! # ipcgen
//!
//! CLI tool for generating Electron IPC bridges from TypeScript API modules.
//!
//! ## Usage
//!
//! ```bash
//! # Generate every artifact described by ./ipcgen.toml
//! ipcgen generate
//!
//! # Watch mode for development
//! ipcgen generate --watch
//!
//! # Preview changes without writing
//! ipcgen generate --dry-run
//!
//! # Fail (exit code 2) when generated files are out of date
//! ipcgen check
//!
//! # Print the extracted functions and events as JSON
//! ipcgen inspect --events
//!
//! # Initialize configuration
//! ipcgen init
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ipcgen_cli::{
    build::{BuildOrchestrator, RebuildOutcome},
    config::{CliArgs, ConfigManager, CONFIG_FILENAME},
    error::CliError,
    watcher::FileChange,
    writer::{is_current, WriteResult},
    BuildOutput,
};

#[derive(Parser)]
#[command(name = "ipcgen")]
#[command(author, version, about = "Generate Electron IPC bridges from TypeScript API modules", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the commands that read a project.
#[derive(Args)]
struct ProjectArgs {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the API modules
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Filter API modules by relative path (glob)
    #[arg(long)]
    filter: Option<String>,

    /// Module declaring the request-context type
    #[arg(long)]
    context: Option<PathBuf>,
}

impl ProjectArgs {
    fn cli_args(self, unwrap: bool) -> CliArgs {
        CliArgs {
            source_dir: self.source,
            filter: self.filter,
            context_path: self.context,
            unwrap_results: unwrap.then_some(true),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the bridge, handler, service and event modules
    Generate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Watch for file changes and regenerate
        #[arg(short, long)]
        watch: bool,

        /// Preview changes without writing files
        #[arg(long)]
        dry_run: bool,

        /// Service methods throw failures instead of returning them
        #[arg(long)]
        unwrap: bool,
    },

    /// Check that the generated files are up to date
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Print the extracted working set as JSON
    Inspect {
        #[command(flatten)]
        project: ProjectArgs,

        /// Include events
        #[arg(long)]
        events: bool,

        /// Include skipped declarations and the reason they were skipped
        #[arg(long)]
        skipped: bool,
    },

    /// Initialize a new ipcgen configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            match e {
                CliError::Validation(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

/// `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "ipcgen=debug,ipcgen_cli=debug",
        (false, _) => "ipcgen=trace,ipcgen_cli=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Generate {
            project,
            watch,
            dry_run,
            unwrap,
        } => cmd_generate(project, watch, dry_run, unwrap),

        Commands::Check { project } => cmd_check(project),

        Commands::Inspect {
            project,
            events,
            skipped,
        } => cmd_inspect(project, events, skipped),

        Commands::Init { output, force } => cmd_init(output, force),
    }
}

/// Load, merge and validate the configuration into an orchestrator.
fn orchestrator(project: ProjectArgs, unwrap: bool) -> Result<BuildOrchestrator, CliError> {
    let config = ConfigManager::load(project.config.as_deref())?;
    let config = ConfigManager::merge_cli_args(config, &project.cli_args(unwrap));
    let options = ConfigManager::validate(&config)?;
    Ok(BuildOrchestrator::new(options)?)
}

/// Generate command implementation.
fn cmd_generate(
    project: ProjectArgs,
    watch: bool,
    dry_run: bool,
    unwrap: bool,
) -> Result<(), CliError> {
    let orchestrator = orchestrator(project, unwrap)?.with_dry_run(dry_run);

    if watch {
        run_watch_mode(orchestrator)
    } else {
        run_generate(&orchestrator)
    }
}

/// Run generation once.
fn run_generate(orchestrator: &BuildOrchestrator) -> Result<(), CliError> {
    println!(
        "{} {}",
        "Scanning".cyan(),
        orchestrator.options().source_dir.display()
    );
    let output = orchestrator.build()?;
    print_summary(&output);

    for write in &output.writes {
        match write {
            WriteResult::Written { path, bytes } => {
                println!("{} Written {} bytes to {}", "✓".green(), bytes, path.display());
            }
            WriteResult::Unchanged { path } => {
                println!("{} Unchanged {}", "·".dimmed(), path.display());
            }
            WriteResult::DryRun { content, path } => {
                println!("{} Would write to {}:", "[dry-run]".yellow(), path.display());
                println!("{}", "─".repeat(60).dimmed());
                println!("{}", content);
                println!("{}", "─".repeat(60).dimmed());
            }
        }
    }

    Ok(())
}

fn print_summary(output: &BuildOutput) {
    let set = &output.working_set;
    if output.files.is_empty() {
        println!("{}", "No API source files found.".yellow());
        return;
    }
    println!(
        "  Found {} function(s) in {} file(s)",
        set.function_count().to_string().green(),
        set.packages.len()
    );
    if set.event_packages.is_some() {
        println!("  Found {} event(s)", set.event_count().to_string().green());
    }
    if !output.skipped.is_empty() {
        println!(
            "  Skipped {} declaration(s), run with -v or `ipcgen inspect --skipped` for details",
            output.skipped.len().to_string().yellow()
        );
    }
    for name in set.duplicate_channels() {
        println!("{} channel '{}' is declared more than once", "Warning:".yellow(), name);
    }
}

/// Run in watch mode.
fn run_watch_mode(orchestrator: BuildOrchestrator) -> Result<(), CliError> {
    println!("{}", "Starting watch mode...".cyan());
    println!("  Watching: {}", orchestrator.options().source_dir.display());
    if let Some(ref dir) = orchestrator.options().event_dir {
        println!("  Watching: {}", dir.display());
    }
    println!("  Press Ctrl+C to stop\n");

    Arc::new(orchestrator).watch_build(print_outcome)
}

fn print_outcome(change: &FileChange, outcome: &RebuildOutcome) {
    match outcome {
        RebuildOutcome::Updated { path, written } => {
            println!(
                "{} {} ({} file(s) written)",
                "Updated:".cyan(),
                path.display(),
                written
            );
        }
        RebuildOutcome::Removed { path, written } => {
            println!(
                "{} {} ({} file(s) written)",
                "Removed:".cyan(),
                path.display(),
                written
            );
        }
        RebuildOutcome::Dropped => {
            println!(
                "{} {} changed during a rebuild and was not picked up",
                "Skipped:".yellow(),
                change.path.display()
            );
        }
        RebuildOutcome::Failed(message) => {
            println!("{} {}", "Rebuild error:".red(), message);
        }
        RebuildOutcome::Ignored => {}
    }
}

/// Check command implementation.
fn cmd_check(project: ProjectArgs) -> Result<(), CliError> {
    println!("{}", "Checking generated files...".cyan());

    let output = orchestrator(project, false)?.plan()?;
    let stale: Vec<_> = output
        .files
        .iter()
        .filter(|file| !is_current(&file.path, &file.content))
        .collect();

    if stale.is_empty() {
        println!("{} Generated files are up-to-date", "✓".green());
        return Ok(());
    }

    for file in &stale {
        println!("{} {} ({})", "✗".red(), file.path.display(), file.artifact);
    }
    println!("  Run 'ipcgen generate' to update");
    Err(CliError::Validation(format!(
        "{} generated file(s) are out of date",
        stale.len()
    )))
}

/// Inspect command implementation.
fn cmd_inspect(project: ProjectArgs, events: bool, skipped: bool) -> Result<(), CliError> {
    let output = orchestrator(project, false)?.plan()?;
    let mut set = output.working_set;
    if !events {
        set.event_packages = None;
    }

    let mut value = serde_json::to_value(&set)?;
    if skipped {
        if let Some(object) = value.as_object_mut() {
            object.insert("skipped".to_string(), serde_json::to_value(&output.skipped)?);
        }
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        println!(
            "{} Configuration file already exists: {}",
            "Error:".red(),
            output.display()
        );
        println!("  Use --force to overwrite");
        return Err(CliError::Validation(
            "Configuration file already exists".to_string(),
        ));
    }

    let content = ConfigManager::default_config_content();
    std::fs::write(&output, content)?;

    println!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(args: &[&str]) -> ProjectArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Generate { project, .. }
            | Commands::Check { project }
            | Commands::Inspect { project, .. } => project,
            Commands::Init { .. } => panic!("init has no project arguments"),
        }
    }

    #[test]
    fn test_context_flag_overrides_config() {
        let args = project(&[
            "ipcgen",
            "generate",
            "--context",
            "/project/src/shared/context.ts",
            "--source",
            "/project/src/api",
        ])
        .cli_args(true);

        assert_eq!(
            args.context_path,
            Some(PathBuf::from("/project/src/shared/context.ts"))
        );
        assert_eq!(args.source_dir, Some(PathBuf::from("/project/src/api")));
        assert_eq!(args.unwrap_results, Some(true));
    }

    #[test]
    fn test_context_flag_is_optional() {
        let args = project(&["ipcgen", "check"]).cli_args(false);
        assert!(args.context_path.is_none());
        assert!(args.unwrap_results.is_none());
    }
}
