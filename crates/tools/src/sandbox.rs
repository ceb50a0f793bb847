//! Workspace sandbox (§4.4): resolve every file-path argument to an
//! absolute path contained in the agent's workspace root, symlinks included.

use std::path::{Component, Path, PathBuf};

/// Validate and resolve `requested` against `workspace_root`.
///
/// Both relative and absolute inputs are accepted (absolute ones are only
/// valid if already inside the workspace); the result is always a
/// canonicalized descendant of the canonicalized root, with any symlink
/// chain resolved so link targets cannot smuggle the caller outside.
pub fn validate_path(workspace_root: &Path, requested: &str) -> Result<PathBuf, String> {
    if requested.as_bytes().contains(&0) {
        return Err("path contains a null byte".to_owned());
    }

    let requested_path = Path::new(requested);
    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(format!(
                "path '{requested}' must not contain '..' components (resolves outside workspace root)"
            ));
        }
    }

    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| format!("cannot resolve workspace root '{}': {e}", workspace_root.display()))?;

    let candidate = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        canonical_root.join(requested_path)
    };

    let resolved = resolve_existing_prefix(&candidate)?;

    if !resolved.starts_with(&canonical_root) {
        return Err(format!(
            "path '{}' resolves outside workspace root '{}'",
            requested,
            canonical_root.display()
        ));
    }

    Ok(resolved)
}

/// Canonicalize `candidate`, following symlinks. If it doesn't exist yet
/// (e.g. a `write_file` target), canonicalize the nearest existing ancestor
/// and re-append the remaining path components unresolved.
fn resolve_existing_prefix(candidate: &Path) -> Result<PathBuf, String> {
    if candidate.exists() {
        return candidate
            .canonicalize()
            .map_err(|e| format!("cannot resolve path '{}': {e}", candidate.display()));
    }

    let mut existing = candidate;
    let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if existing.exists() {
            break;
        }
        match existing.parent() {
            Some(parent) => {
                if let Some(file_name) = existing.file_name() {
                    tail_parts.push(file_name);
                }
                existing = parent;
            }
            None => break,
        }
    }
    let mut resolved = existing
        .canonicalize()
        .map_err(|e| format!("cannot resolve ancestor of '{}': {e}", candidate.display()))?;
    for part in tail_parts.into_iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_workspace() -> TempDir {
        TempDir::new().expect("failed to create temp dir")
    }

    #[test]
    fn rejects_parent_traversal() {
        let ws = tmp_workspace();
        let result = validate_path(ws.path(), "../etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_null_byte() {
        let ws = tmp_workspace();
        let result = validate_path(ws.path(), "foo\0bar");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_existing_file() {
        let ws = tmp_workspace();
        std::fs::write(ws.path().join("hello.txt"), "hi").unwrap();
        let result = validate_path(ws.path(), "hello.txt");
        assert!(result.is_ok());
        assert!(result.unwrap().ends_with("hello.txt"));
    }

    #[test]
    fn accepts_nested_new_file() {
        let ws = tmp_workspace();
        std::fs::create_dir_all(ws.path().join("subdir")).unwrap();
        let result = validate_path(ws.path(), "subdir/new_file.txt");
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escaping_workspace() {
        let ws = tmp_workspace();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "top secret").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), ws.path().join("link.txt")).unwrap();

        let result = validate_path(ws.path(), "link.txt");
        assert!(result.is_err());
    }
}
