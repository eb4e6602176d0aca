//! Module specifier resolution and lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Extensions tried, in order, when a relative specifier has none.
const CANDIDATE_EXTENSIONS: &[&str] = &["ts", "tsx", "d.ts", "mts", "cts"];

/// Extensions of source files that can carry API functions or events.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Whether a module specifier is relative to the importing file.
pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Whether `path` is a TypeScript source file (declaration files excluded).
pub fn is_source_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Resolve `.` and `..` components without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The file a relative specifier points at, without checking that it exists.
pub fn specifier_target(from_file: &Path, specifier: &str) -> PathBuf {
    let dir = from_file.parent().unwrap_or_else(|| Path::new(""));
    normalize_path(&dir.join(specifier))
}

/// Resolve a relative specifier to an existing TypeScript file.
///
/// Tries the exact path, the path with each candidate extension appended,
/// `.js`-style extensions rewritten to their TypeScript counterparts, and
/// finally `index.ts` / `index.tsx` inside a directory.
pub fn resolve_specifier(
    from_file: &Path,
    specifier: &str,
    exists: &dyn Fn(&Path) -> bool,
) -> Option<PathBuf> {
    if !is_relative(specifier) {
        return None;
    }
    let base = specifier_target(from_file, specifier);

    let has_ts_extension = base
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
    if has_ts_extension && exists(&base) {
        return Some(base);
    }

    let base_str = base.to_string_lossy();
    for ext in CANDIDATE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{base_str}.{ext}"));
        if exists(&candidate) {
            return Some(candidate);
        }
    }

    let rewritten = match base.extension().and_then(|e| e.to_str()) {
        Some("js") => vec!["ts", "tsx"],
        Some("jsx") => vec!["tsx"],
        Some("mjs") => vec!["mts"],
        Some("cjs") => vec!["cts"],
        _ => Vec::new(),
    };
    for ext in rewritten {
        let candidate = base.with_extension(ext);
        if exists(&candidate) {
            return Some(candidate);
        }
    }

    ["index.ts", "index.tsx"]
        .iter()
        .map(|index| base.join(index))
        .find(|candidate| exists(candidate))
}

/// Import specifier for `target` as seen from a file in `from_dir`.
///
/// Drops the TypeScript extension, uses `/` separators and prefixes `./`
/// when the result does not already start with a dot.
pub fn relative_specifier(from_dir: &Path, target: &Path) -> String {
    let from = normalize_path(from_dir);
    let target = normalize_path(target);

    let from_parts: Vec<Component> = from.components().collect();
    let target_parts: Vec<Component> = target.components().collect();
    let common = from_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    for _ in common..from_parts.len() {
        segments.push("..".to_string());
    }
    for part in &target_parts[common..] {
        segments.push(part.as_os_str().to_string_lossy().into_owned());
    }

    if let Some(last) = segments.last_mut() {
        *last = strip_source_extension(last);
    }

    let joined = segments.join("/");
    if joined.starts_with('.') {
        joined
    } else {
        format!("./{joined}")
    }
}

fn strip_source_extension(file_name: &str) -> String {
    for ext in [".d.ts", ".ts", ".tsx", ".mts", ".cts"] {
        if let Some(stem) = file_name.strip_suffix(ext) {
            return stem.to_string();
        }
    }
    file_name.to_string()
}
