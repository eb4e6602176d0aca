//! Integration tests for ipcgen-cli.
//!
//! These tests copy the fixture project into a temporary directory and run
//! configuration, scanning, extraction, generation and writing end to end.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use ipcgen::{Artifact, SkipReason};
use ipcgen_cli::{
    build::{BuildOrchestrator, RebuildOutcome},
    config::{CliArgs, ConfigManager, CONFIG_FILENAME},
    scanner::SourceScanner,
    watcher::{ChangeKind, FileChange, WatchRoot},
    writer::{is_current, WriteResult},
    BuildOutput,
};

const CONFIG: &str = r#"
[source]
dir = "src/main/api"
ignore = ["users.internalReset"]

[context]
path = "src/main/context.ts"

[events]
dir = "src/main/events"
"#;

/// Get the path to test fixtures.
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Create a temporary project from the fixtures with the given config.
fn create_temp_project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    copy_dir(&fixtures_path(), &dir.path().join("src/main"));
    fs::write(dir.path().join(CONFIG_FILENAME), config).unwrap();
    dir
}

fn orchestrator(dir: &Path, args: CliArgs) -> BuildOrchestrator {
    let config = ConfigManager::load(Some(&dir.join(CONFIG_FILENAME))).unwrap();
    let config = ConfigManager::merge_cli_args(config, &args);
    BuildOrchestrator::new(ConfigManager::validate(&config).unwrap()).unwrap()
}

fn build(dir: &Path) -> BuildOutput {
    orchestrator(dir, CliArgs::default()).build().unwrap()
}

fn read(dir: &Path, relative: &str) -> String {
    fs::read_to_string(dir.join(relative)).unwrap()
}

fn skip_reason<'a>(output: &'a BuildOutput, name: &str) -> Option<&'a SkipReason> {
    output
        .skipped
        .iter()
        .find(|s| s.name.as_deref() == Some(name))
        .map(|s| &s.reason)
}

// =============================================================================
// Scanner Integration Tests
// =============================================================================

#[test]
fn test_scanner_finds_fixture_files() {
    let files = SourceScanner::new(fixtures_path().join("api")).scan().unwrap();

    let names: Vec<_> = files
        .iter()
        .map(|f| f.relative_path.to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["system.ts", "types.ts", "users.ts"]);
}

#[test]
fn test_scanner_with_filter() {
    let files = SourceScanner::new(fixtures_path().join("api"))
        .with_filter("user*.ts")
        .unwrap()
        .scan()
        .unwrap();

    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("users.ts"));
}

// =============================================================================
// Extraction Integration Tests
// =============================================================================

#[test]
fn test_working_set_is_sorted_and_complete() {
    let dir = create_temp_project(CONFIG);
    let output = build(dir.path());
    let set = &output.working_set;

    let files: Vec<_> = set
        .packages
        .iter()
        .map(|p| p.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(files, vec!["system.ts", "types.ts", "users.ts"]);

    assert_eq!(set.packages[0].func[0].name, "ping");
    assert!(set.packages[1].func.is_empty());
    let users: Vec<_> = set.packages[2].func.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(users, vec!["createUser", "getUser", "listUsers"]);
}

#[test]
fn test_flattened_requests() {
    let dir = create_temp_project(CONFIG);
    let output = build(dir.path());
    let users = &output.working_set.packages[2];

    let create = &users.func[0];
    let fields: Vec<_> = create
        .request
        .iter()
        .map(|f| (f.name.as_str(), f.type_text.as_str(), f.optional))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("name", "string", false),
            ("email", "string | undefined", true),
            ("role", "Role", false),
        ]
    );
    assert_eq!(create.validator_name.as_deref(), Some("createUserValidator"));
    assert_eq!(create.error_handler_name.as_deref(), Some("createUserErrorHandler"));

    let list = &users.func[2];
    let fields: Vec<_> = list.request.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["offset", "limit", "search"]);
    assert_eq!(list.request[2].type_text, "string | undefined");
    assert_eq!(list.validator_name, None);
}

#[test]
fn test_skip_reasons_are_reported() {
    let dir = create_temp_project(CONFIG);
    let output = build(dir.path());

    assert_eq!(skip_reason(&output, "internalReset"), Some(&SkipReason::Ignored));
    assert_eq!(skip_reason(&output, "notExported"), Some(&SkipReason::NotExported));
    assert!(matches!(
        skip_reason(&output, "noContext"),
        Some(SkipReason::ContextMismatch { .. })
    ));
    assert_eq!(
        skip_reason(&output, "NotAnEvent"),
        Some(&SkipReason::ParameterCount { count: 2 })
    );
    assert_eq!(
        skip_reason(&output, "InlinePayload"),
        Some(&SkipReason::ParameterNotNamedReference)
    );
}

#[test]
fn test_explicit_companions_take_precedence() {
    let config = format!("{CONFIG}\n[companions.getUser]\nvalidator = \"createUserValidator\"\n");
    let dir = create_temp_project(&config);
    let output = build(dir.path());

    let get_user = &output.working_set.packages[2].func[1];
    assert_eq!(get_user.name, "getUser");
    assert_eq!(get_user.validator_name.as_deref(), Some("createUserValidator"));
}

#[test]
fn test_disabled_naming_pattern() {
    let config = format!("{CONFIG}\n[naming]\nvalidator = \"\"\n");
    let dir = create_temp_project(&config);
    let output = build(dir.path());

    let create = &output.working_set.packages[2].func[0];
    assert_eq!(create.validator_name, None);
    assert_eq!(create.error_handler_name.as_deref(), Some("createUserErrorHandler"));
}

// =============================================================================
// Generation Integration Tests
// =============================================================================

#[test]
fn test_generate_writes_every_artifact() {
    let dir = create_temp_project(CONFIG);
    let output = build(dir.path());

    assert_eq!(output.files.len(), 7);
    assert!(output.writes.iter().all(WriteResult::was_written));
    for file in &output.files {
        assert!(file.path.exists(), "{} was not written", file.path.display());
        assert!(read(dir.path(), &file.path.to_string_lossy())
            .starts_with("// auto generated by ipcgen, do not edit\n"));
    }

    let bridge = read(dir.path(), "src/preload/api.ts");
    assert!(bridge.contains("ipcRenderer.invoke('createUser', { name, email, role })"));
    assert!(bridge.contains("ping: () => ipcRenderer.invoke('ping', {}),"));

    let handlers = read(dir.path(), "src/main/ipc/handlers.ts");
    assert!(handlers.contains("const input = (await createUserValidator(args)) as typeof args;"));
    assert!(handlers.contains("return success(await createUser(ctx, input));"));
    assert!(handlers.contains("return toFailure(error, createUserErrorHandler);"));

    let register = read(dir.path(), "src/main/ipc/register.ts");
    assert!(register.contains("ipcMain.handle('listUsers'"));

    let service = read(dir.path(), "src/renderer/ipc/api.ts");
    assert!(service.contains("export const apiService: ApiService = new ApiServiceImpl();"));
    assert!(!service.contains("throw result.error;"));
}

#[test]
fn test_event_artifacts() {
    let dir = create_temp_project(CONFIG);
    let output = build(dir.path());
    assert_eq!(output.working_set.event_count(), 2);

    let sender = read(dir.path(), "src/main/ipc/events.ts");
    let sync = sender.find("target.send('SyncProgress', payload);").unwrap();
    let updated = sender.find("target.send('UserUpdated', payload);").unwrap();
    assert!(sync < updated);

    let preload = read(dir.path(), "src/preload/events.ts");
    assert!(preload.contains("ipcRenderer.removeListener('UserUpdated', handler);"));

    let renderer = read(dir.path(), "src/renderer/ipc/events.ts");
    assert!(renderer.contains("onSyncProgress(listener: (payload: Progress) => void): () => void"));
}

#[test]
fn test_unwrap_flag_overrides_config() {
    let dir = create_temp_project(CONFIG);
    let args = CliArgs {
        unwrap_results: Some(true),
        ..Default::default()
    };
    orchestrator(dir.path(), args).build().unwrap();

    let service = read(dir.path(), "src/renderer/ipc/api.ts");
    assert!(service.contains("throw result.error;"));
    assert!(service.contains("async ping(): Promise<PingData> {"));
}

#[test]
fn test_global_error_handler() {
    let config = format!(
        "{CONFIG}\n[errors]\nglobal_handler = {{ path = \"src/main/errors.ts\", function = \"handleError\", debug = true }}\n"
    );
    let dir = create_temp_project(&config);
    build(dir.path());

    let handlers = read(dir.path(), "src/main/ipc/handlers.ts");
    assert!(handlers.contains("import { handleError } from '../errors';"));
    assert!(handlers.contains("console.error(error);"));
    assert!(handlers.contains("return failure(await handleError(error));"));

    let service = read(dir.path(), "src/renderer/ipc/api.ts");
    assert!(service.contains("export type PingError = Awaited<ReturnType<typeof handleError>>;"));
}

#[test]
fn test_generation_is_deterministic() {
    let first = create_temp_project(CONFIG);
    let second = create_temp_project(CONFIG);

    let a = build(first.path());
    let b = build(second.path());

    assert_eq!(a.files.len(), b.files.len());
    for (left, right) in a.files.iter().zip(&b.files) {
        assert_eq!(left.artifact, right.artifact);
        assert_eq!(left.content, right.content);
    }

    let again = build(first.path());
    assert!(again
        .writes
        .iter()
        .all(|w| matches!(w, WriteResult::Unchanged { .. })));
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = create_temp_project(CONFIG);
    let output = orchestrator(dir.path(), CliArgs::default())
        .with_dry_run(true)
        .build()
        .unwrap();

    assert_eq!(output.writes.len(), 7);
    assert!(!dir.path().join("src/preload").exists());
    assert!(!dir.path().join("src/main/ipc").exists());
}

#[test]
fn test_missing_source_dir_is_fatal() {
    let dir = create_temp_project("[source]\ndir = \"missing\"\n[context]\npath = \"src/main/context.ts\"\n");
    let err = orchestrator(dir.path(), CliArgs::default()).build().unwrap_err();
    assert!(err.to_string().contains("Directory not found"));
}

#[test]
fn test_missing_event_dir_keeps_function_artifacts() {
    let config = CONFIG.replace("src/main/events", "src/main/nowhere");
    let dir = create_temp_project(&config);
    let output = build(dir.path());

    assert_eq!(output.files.len(), 4);
    assert!(output.working_set.event_packages.is_none());
    assert!(!dir.path().join("src/main/ipc/events.ts").exists());
}

// =============================================================================
// Check / Inspect / Init
// =============================================================================

#[test]
fn test_check_detects_stale_files() {
    let dir = create_temp_project(CONFIG);
    let orchestrator = orchestrator(dir.path(), CliArgs::default());

    let stale = |output: &BuildOutput| {
        output
            .files
            .iter()
            .filter(|f| !is_current(&f.path, &f.content))
            .count()
    };

    assert_eq!(stale(&orchestrator.plan().unwrap()), 7);
    orchestrator.build().unwrap();
    assert_eq!(stale(&orchestrator.plan().unwrap()), 0);

    let system = dir.path().join("src/main/api/system.ts");
    let source = fs::read_to_string(&system).unwrap();
    fs::write(
        &system,
        format!("{source}\nexport function shutdown(ctx: RequestContext): void {{}}\n"),
    )
    .unwrap();

    let plan = orchestrator.plan().unwrap();
    let stale_artifacts: Vec<Artifact> = plan
        .files
        .iter()
        .filter(|f| !is_current(&f.path, &f.content))
        .map(|f| f.artifact)
        .collect();
    assert_eq!(stale_artifacts, Artifact::FUNCTIONS.to_vec());
}

#[test]
fn test_inspect_serializes_working_set() {
    let dir = create_temp_project(CONFIG);
    let output = orchestrator(dir.path(), CliArgs::default()).plan().unwrap();

    let value = serde_json::to_value(&output.working_set).unwrap();
    let packages = value["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 3);
    assert_eq!(packages[2]["func"][0]["name"], "createUser");
    assert_eq!(packages[2]["func"][0]["validatorName"], "createUserValidator");
    assert_eq!(value["eventPackages"][0]["events"][0]["name"], "SyncProgress");

    let skipped = serde_json::to_value(&output.skipped).unwrap();
    assert!(skipped
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["reason"] == "notExported"));
}

#[test]
fn test_init_config_is_usable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILENAME);
    fs::write(&path, ConfigManager::default_config_content()).unwrap();

    let config = ConfigManager::load(Some(&path)).unwrap();
    let options = ConfigManager::validate(&config).unwrap();

    assert_eq!(options.source_dir, dir.path().join("src/main/api"));
    assert_eq!(options.generation.context.name, "Context");
    assert!(options.event_dir.is_none());
    let enabled = Artifact::FUNCTIONS
        .into_iter()
        .chain(Artifact::EVENTS)
        .filter(|artifact| artifact.path(&options.generation).is_some())
        .count();
    assert_eq!(enabled, 4);
}

// =============================================================================
// Incremental Rebuilds
// =============================================================================

#[test]
fn test_deleting_a_file_regenerates_without_it() {
    let dir = create_temp_project(CONFIG);
    let orchestrator = orchestrator(dir.path(), CliArgs::default());
    orchestrator.build().unwrap();

    let users = dir.path().join("src/main/api/users.ts");
    fs::remove_file(&users).unwrap();
    let outcome = orchestrator.handle_change(&FileChange {
        kind: ChangeKind::Remove,
        path: users,
        root: WatchRoot::Api,
    });

    assert!(matches!(outcome, RebuildOutcome::Removed { .. }));
    assert_eq!(orchestrator.working_set().function_count(), 1);
    let service = read(dir.path(), "src/renderer/ipc/api.ts");
    assert!(!service.contains("createUser"));
    assert!(service.contains("ping(): Promise<Result<PingData, PingError>>;"));
}

#[test]
fn test_changes_to_generated_files_are_ignored() {
    let config = CONFIG.replace(
        "[context]",
        "[output]\nmain_dir = \"src/main/api/generated\"\n\n[context]",
    );
    let dir = create_temp_project(&config);
    let orchestrator = orchestrator(dir.path(), CliArgs::default());
    let output = orchestrator.build().unwrap();
    assert_eq!(output.working_set.packages.len(), 3);

    let outcome = orchestrator.handle_change(&FileChange {
        kind: ChangeKind::Content,
        path: dir.path().join("src/main/api/generated/handlers.ts"),
        root: WatchRoot::Api,
    });
    assert_eq!(outcome, RebuildOutcome::Ignored);
    assert_eq!(orchestrator.plan().unwrap().working_set.packages.len(), 3);
}
