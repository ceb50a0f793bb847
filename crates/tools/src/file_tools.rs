//! File tools (§4.6): read_file, write_file, edit_file, delete_file,
//! find_files, search_in_files. All paths pass through [`crate::sandbox`].

use std::path::Path;

use regex::Regex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::sandbox::validate_path;

const FIND_FILES_CAP: usize = 1000;
const SEARCH_MATCHES_CAP: usize = 1000;

pub async fn read_file(workspace_root: &Path, path: &str, size_cap_bytes: usize) -> Result<String, String> {
    let resolved = validate_path(workspace_root, path)?;

    let metadata = fs::metadata(&resolved)
        .await
        .map_err(|e| format!("failed to stat '{path}': {e}"))?;
    if metadata.len() as usize > size_cap_bytes {
        return Err(format!(
            "'{path}' is {} bytes, exceeding the {size_cap_bytes} byte cap",
            metadata.len()
        ));
    }

    let bytes = fs::read(&resolved).await.map_err(|e| format!("failed to read '{path}': {e}"))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => Ok(format!(
            "[binary content, base64-encoded]\n{}",
            base64_encode(e.as_bytes())
        )),
    }
}

/// Atomic write: write to a `.tmp` sibling, flush, then rename into place.
pub async fn write_file(workspace_root: &Path, path: &str, content: &str, size_cap_bytes: usize) -> Result<String, String> {
    if content.len() > size_cap_bytes {
        return Err(format!(
            "content of {} bytes exceeds the {size_cap_bytes} byte cap",
            content.len()
        ));
    }

    let resolved = validate_path(workspace_root, path)?;
    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).await.map_err(|e| format!("failed to create parent directory: {e}"))?;
    }

    let tmp_name = format!(
        ".{}.{}.tmp",
        resolved.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    let tmp_path = resolved.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)
        .await
        .map_err(|e| format!("failed to create temp file '{}': {e}", tmp_path.display()))?;
    file.write_all(content.as_bytes()).await.map_err(|e| format!("failed to write temp file: {e}"))?;
    file.flush().await.map_err(|e| format!("failed to flush temp file: {e}"))?;
    file.sync_data().await.map_err(|e| format!("failed to sync temp file: {e}"))?;
    drop(file);

    fs::rename(&tmp_path, &resolved).await.map_err(|e| {
        format!("failed to rename temp file into place: {e}")
    })?;

    Ok(format!("Wrote {} bytes to {path}", content.len()))
}

/// Exact-string edit: every occurrence of `old` is replaced with `new`
/// (or only the first, unless `replace_all` is set). At least one
/// replacement is required or the call is an error.
pub async fn edit_file(workspace_root: &Path, path: &str, old: &str, new: &str, replace_all: bool) -> Result<String, String> {
    let resolved = validate_path(workspace_root, path)?;
    let content = fs::read_to_string(&resolved).await.map_err(|e| format!("failed to read '{path}': {e}"))?;

    let occurrences = content.matches(old).count();
    if occurrences == 0 {
        return Err(format!("no occurrences of the given text found in '{path}'"));
    }

    let (updated, replacements) = if replace_all {
        (content.replace(old, new), occurrences)
    } else {
        (content.replacen(old, new, 1), 1)
    };

    write_file(workspace_root, path, &updated, usize::MAX).await?;
    Ok(format!("Edited {path} ({replacements} replacements)"))
}

pub async fn delete_file(workspace_root: &Path, path: &str) -> Result<String, String> {
    let resolved = validate_path(workspace_root, path)?;
    let metadata = fs::metadata(&resolved).await.map_err(|e| format!("failed to stat '{path}': {e}"))?;

    if metadata.is_dir() {
        fs::remove_dir_all(&resolved).await.map_err(|e| format!("failed to remove directory '{path}': {e}"))?;
    } else {
        fs::remove_file(&resolved).await.map_err(|e| format!("failed to remove file '{path}': {e}"))?;
    }
    Ok(format!("Deleted {path}"))
}

/// `glob` match rooted at `root` (default `.`), not following symlinks,
/// capped at [`FIND_FILES_CAP`] results.
pub fn find_files(workspace_root: &Path, pattern: &str, root: Option<&str>) -> Result<String, String> {
    let search_root = validate_path(workspace_root, root.unwrap_or("."))?;
    let full_pattern = search_root.join(pattern);
    let full_pattern_str = full_pattern.to_string_lossy().into_owned();

    let mut paths = Vec::new();
    let mut truncated = false;
    for entry in glob::glob(&full_pattern_str).map_err(|e| format!("invalid glob pattern: {e}"))? {
        match entry {
            Ok(p) => {
                if p.is_symlink() {
                    continue;
                }
                if paths.len() >= FIND_FILES_CAP {
                    truncated = true;
                    break;
                }
                paths.push(p.to_string_lossy().into_owned());
            }
            Err(_) => continue,
        }
    }

    let mut result = paths.join("\n");
    if truncated {
        result.push_str("\n[results truncated at 1000]");
    }
    Ok(result)
}

/// Regex search across files matching `file_glob` under `root`, returning
/// `path:line:text` lines, capped at [`SEARCH_MATCHES_CAP`].
pub async fn search_in_files(workspace_root: &Path, pattern: &str, file_glob: &str, root: Option<&str>) -> Result<String, String> {
    let regex = Regex::new(pattern).map_err(|e| format!("invalid regex: {e}"))?;
    let search_root = validate_path(workspace_root, root.unwrap_or("."))?;
    let full_pattern = search_root.join(file_glob).to_string_lossy().into_owned();

    let mut matches = Vec::new();
    'files: for entry in glob::glob(&full_pattern).map_err(|e| format!("invalid glob pattern: {e}"))? {
        let Ok(path) = entry else { continue };
        if path.is_symlink() || !path.is_file() {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path).await else { continue };
        for (line_no, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{}:{}:{}", path.display(), line_no + 1, line));
                if matches.len() >= SEARCH_MATCHES_CAP {
                    break 'files;
                }
            }
        }
    }

    if matches.is_empty() {
        return Ok("no matches".to_string());
    }
    Ok(matches.join("\n"))
}

fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        let n = ((b0 as u32) << 16) | ((b1 as u32) << 8) | b2 as u32;
        out.push(ALPHABET[(n >> 18 & 0x3f) as usize] as char);
        out.push(ALPHABET[(n >> 12 & 0x3f) as usize] as char);
        out.push(if chunk.len() > 1 { ALPHABET[(n >> 6 & 0x3f) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { ALPHABET[(n & 0x3f) as usize] as char } else { '=' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "test.txt", "hello, world", 1024).await.unwrap();
        let content = read_file(ws.path(), "test.txt", 1024).await.unwrap();
        assert_eq!(content, "hello, world");
    }

    #[tokio::test]
    async fn read_file_rejects_over_cap() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "big.txt", &"x".repeat(2000), 1024 * 1024).await.unwrap();
        let result = read_file(ws.path(), "big.txt", 1024).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn edit_file_replaces_single_occurrence() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "a.txt", "foo bar foo", 1024).await.unwrap();
        let msg = edit_file(ws.path(), "a.txt", "foo", "baz", false).await.unwrap();
        assert!(msg.contains("1 replacements"));
        let content = read_file(ws.path(), "a.txt", 1024).await.unwrap();
        assert_eq!(content, "baz bar foo");
    }

    #[tokio::test]
    async fn edit_file_replace_all() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "a.txt", "foo bar foo", 1024).await.unwrap();
        let msg = edit_file(ws.path(), "a.txt", "foo", "baz", true).await.unwrap();
        assert!(msg.contains("2 replacements"));
        let content = read_file(ws.path(), "a.txt", 1024).await.unwrap();
        assert_eq!(content, "baz bar baz");
    }

    #[tokio::test]
    async fn edit_file_requires_at_least_one_match() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "a.txt", "foo bar", 1024).await.unwrap();
        let result = edit_file(ws.path(), "a.txt", "nonexistent", "baz", false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_file_removes_file() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "doomed.txt", "bye", 1024).await.unwrap();
        delete_file(ws.path(), "doomed.txt").await.unwrap();
        assert!(!ws.path().join("doomed.txt").exists());
    }

    #[tokio::test]
    async fn find_files_matches_glob() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "a.rs", "", 1024).await.unwrap();
        write_file(ws.path(), "b.txt", "", 1024).await.unwrap();
        let result = find_files(ws.path(), "*.rs", None).unwrap();
        assert!(result.contains("a.rs"));
        assert!(!result.contains("b.txt"));
    }

    #[tokio::test]
    async fn search_in_files_finds_matching_lines() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "a.txt", "hello world\nfoo bar\n", 1024).await.unwrap();
        let result = search_in_files(ws.path(), "hello", "*.txt", None).await.unwrap();
        assert!(result.contains("1:hello world"));
    }

    #[tokio::test]
    async fn search_in_files_returns_no_matches_string() {
        let ws = TempDir::new().unwrap();
        write_file(ws.path(), "a.txt", "foo bar\n", 1024).await.unwrap();
        let result = search_in_files(ws.path(), "zzz_nomatch", "*.txt", None).await.unwrap();
        assert_eq!(result, "no matches");
    }
}
