use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Well-known locations inside a generated project
// ---------------------------------------------------------------------------

pub const GITHUB_DIR: &str = ".github";
pub const PROVENANCE_FILE: &str = ".github/project.yml";
pub const CONTEXT_FILE: &str = ".github/context.yml";
pub const DICTIONARY_FILE: &str = ".github/etc/dictionary.txt";
pub const CONFIG_FILE: &str = ".hatch.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn provenance_path(root: &Path) -> PathBuf {
    root.join(PROVENANCE_FILE)
}

pub fn context_path(root: &Path) -> PathBuf {
    root.join(CONTEXT_FILE)
}

pub fn dictionary_path(root: &Path) -> PathBuf {
    root.join(DICTIONARY_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve `path` against `base` without touching the filesystem.
///
/// Absolute paths replace `base`. `.` components are dropped and `..` pops the
/// previous component, so the result is comparable even when the target does
/// not exist yet.
pub fn resolve_lexically(base: &Path, path: &Path) -> PathBuf {
    use std::path::Component;

    let joined = base.join(path);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `base`, following symlinks when the target exists.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    let lexical = resolve_lexically(base, path);
    lexical.canonicalize().unwrap_or(lexical)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
