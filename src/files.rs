//! File tool suite: read, write, edit, list, glob, grep — all resolved
//! against the current workspace root and returning textual results only.
//!
//! Every operation here follows the same error discipline as the process
//! registry: failures are returned as `Error: …` strings, never as `Err`
//! that would need to surface as a protocol-level failure. The one
//! exception is `edit`'s backup-then-replace helper, which does use `Result`
//! internally since it has to decide whether to restore from backup.

use glob::Pattern;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const DEFAULT_READ_LIMIT: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;
const MAX_LIST_FILES: usize = 100;
const MAX_GREP_LINE_LENGTH: usize = 200;

/// Default ignore globs applied to `list`, unioned with any caller-supplied
/// globs.
const DEFAULT_IGNORE: &[&str] = &[
    ".git", ".git/*", ".svn", ".hg", "node_modules", "node_modules/*", "target", "target/*",
    "dist", "dist/*", "build", "build/*", ".DS_Store", "*.pyc", "__pycache__", "__pycache__/*",
    ".idea", ".idea/*", ".vscode", ".vscode/*",
];

/// `read(path, offset=0, limit=2000)`.
pub async fn read(path: &Path, offset: usize, limit: usize) -> String {
    let limit = if limit == 0 { DEFAULT_READ_LIMIT } else { limit };
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => return format!("Error: failed to read {}: {e}", path.display()),
    };

    if bytes.iter().take(8192).any(|&b| b == 0) {
        return format!("Error: {} appears to be a binary file", path.display());
    }

    let content = String::from_utf8_lossy(&bytes);
    if content.is_empty() {
        return String::new();
    }

    let mut rendered = String::new();
    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        if line_no <= offset {
            continue;
        }
        if line_no > offset + limit {
            break;
        }
        let truncated = truncate_chars(line, MAX_LINE_LENGTH);
        rendered.push_str(&format!("{line_no:>5}| {truncated}\n"));
    }
    rendered
}

/// `write(path, content)`.
pub async fn write(path: &Path, content: &str) -> String {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return format!("Error: failed to create directory {}: {e}", parent.display());
        }
    }
    match tokio::fs::write(path, content).await {
        Ok(()) => format!(
            "Successfully wrote {} bytes ({} characters) to {}",
            content.len(),
            content.chars().count(),
            path.display()
        ),
        Err(e) => format!("Error: failed to write {}: {e}", path.display()),
    }
}

/// `edit(path, oldString, newString, replaceAll=false)`.
///
/// Backup-then-replace: copy to a sibling `.bak` path, perform the
/// replacement, and on any failure restore from the backup unconditionally
/// rather than trying to diff what went wrong. The backup is removed on
/// success; if that removal itself fails, the edit has already succeeded
/// and the failure is not reported to the caller.
pub async fn edit(path: &Path, old_string: &str, new_string: &str, replace_all: bool) -> String {
    if old_string == new_string {
        return "Error: oldString and newString must be different".to_string();
    }

    let original = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => return format!("Error: failed to read {}: {e}", path.display()),
    };

    if !original.contains(old_string) {
        return "Error: String not found in file".to_string();
    }

    let replaced = if replace_all {
        original.replace(old_string, new_string)
    } else {
        original.replacen(old_string, new_string, 1)
    };

    let backup_path = backup_path_for(path);
    if let Err(e) = tokio::fs::copy(path, &backup_path).await {
        return format!("Error: failed to create backup for {}: {e}", path.display());
    }

    if let Err(e) = tokio::fs::write(path, &replaced).await {
        // Unconditional restore, no attempt to diagnose the write failure further.
        let _ = tokio::fs::copy(&backup_path, path).await;
        let _ = tokio::fs::remove_file(&backup_path).await;
        return format!("Error: failed to write {}: {e}", path.display());
    }

    if let Err(e) = tokio::fs::remove_file(&backup_path).await {
        tracing::warn!(path = %backup_path.display(), error = %e, "failed to remove edit backup");
    }

    let occurrences = if replace_all {
        original.matches(old_string).count()
    } else {
        1
    };
    format!(
        "Successfully replaced {occurrences} occurrence(s) in {}",
        path.display()
    )
}

fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    name.push_str(".bak");
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// `list(path=".", ignore=[])`.
pub async fn list(path: &Path, extra_ignore: &[String]) -> String {
    let mut ignore_patterns: Vec<Pattern> = DEFAULT_IGNORE
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();
    ignore_patterns.extend(extra_ignore.iter().filter_map(|p| Pattern::new(p).ok()));

    let mut entries: Vec<(PathBuf, bool)> = Vec::new();
    if let Err(e) = collect_entries(path, path, &ignore_patterns, &mut entries).await {
        return format!("Error: failed to list {}: {e}", path.display());
    }

    if entries.is_empty() {
        return "Directory is empty".to_string();
    }

    entries.sort_by(|(a_path, a_dir), (b_path, b_dir)| match (a_dir, b_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a_path.cmp(b_path),
    });

    let total = entries.len();
    let capped = entries.len() > MAX_LIST_FILES;
    entries.truncate(MAX_LIST_FILES);

    let mut rendered = String::new();
    for (entry_path, is_dir) in &entries {
        let rel = entry_path.strip_prefix(path).unwrap_or(entry_path);
        if *is_dir {
            rendered.push_str(&format!("{}/\n", rel.display()));
        } else {
            rendered.push_str(&format!("{}\n", rel.display()));
        }
    }
    rendered.push_str(&format!("\nFound {total} files"));
    if capped {
        rendered.push_str(&format!(
            " (showing first {MAX_LIST_FILES} of {total}, use more specific path to see more)"
        ));
    }
    rendered
}

async fn collect_entries(
    root: &Path,
    dir: &Path,
    ignore: &[Pattern],
    out: &mut Vec<(PathBuf, bool)>,
) -> std::io::Result<()> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let entry_path = entry.path();
        let rel = entry_path.strip_prefix(root).unwrap_or(&entry_path);
        let rel_str = rel.to_string_lossy();
        if ignore
            .iter()
            .any(|p| p.matches(&rel_str) || rel.file_name().is_some_and(|n| p.matches_with(&n.to_string_lossy(), glob::MatchOptions::new())))
        {
            continue;
        }
        let is_dir = entry.file_type().await?.is_dir();
        out.push((entry_path.clone(), is_dir));
        if is_dir {
            Box::pin(collect_entries(root, &entry_path, ignore, out)).await?;
        }
    }
    Ok(())
}

/// `glob(pattern, path=".", maxResults=100)`.
pub async fn glob_search(pattern: &str, path: &Path, max_results: usize) -> String {
    let Ok(compiled) = Pattern::new(pattern) else {
        return format!("Error: invalid glob pattern: {pattern}");
    };

    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    if let Err(e) = collect_matches(path, path, &compiled, &mut files).await {
        return format!("Error: failed to glob {}: {e}", path.display());
    }

    if files.is_empty() {
        return "No files found".to_string();
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));
    let total = files.len();
    let capped = total > max_results;
    files.truncate(max_results);

    let mut rendered = String::new();
    for (file_path, _) in &files {
        let rel = file_path.strip_prefix(path).unwrap_or(file_path);
        rendered.push_str(&format!("{}\n", rel.display()));
    }
    if capped {
        rendered.push_str(&format!("\n(showing first {max_results} of {total})"));
    }
    rendered
}

async fn collect_matches(
    root: &Path,
    dir: &Path,
    pattern: &Pattern,
    out: &mut Vec<(PathBuf, SystemTime)>,
) -> std::io::Result<()> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let entry_path = entry.path();
        let is_dir = entry.file_type().await?.is_dir();
        if is_dir {
            Box::pin(collect_matches(root, &entry_path, pattern, out)).await?;
            continue;
        }
        let rel = entry_path.strip_prefix(root).unwrap_or(&entry_path);
        if pattern.matches_path(rel) || entry_path.file_name().is_some_and(|n| pattern.matches(&n.to_string_lossy())) {
            let modified = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((entry_path, modified));
        }
    }
    Ok(())
}

/// `grep(pattern, path=".", include?, caseInsensitive=false, maxResults=100)`.
pub async fn grep(
    pattern: &str,
    path: &Path,
    include: Option<&str>,
    case_insensitive: bool,
    max_results: usize,
) -> String {
    let re = match RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
    {
        Ok(r) => r,
        Err(e) => return format!("Error: invalid pattern: {e}"),
    };
    let include_pattern = match include {
        Some(p) => match Pattern::new(p) {
            Ok(pat) => Some(pat),
            Err(e) => return format!("Error: invalid include glob: {e}"),
        },
        None => None,
    };

    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    if let Err(e) = collect_all_files(path, path, &include_pattern, &mut files).await {
        return format!("Error: failed to search {}: {e}", path.display());
    }
    files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut rendered = String::new();
    let mut total_matches = 0usize;
    let mut capped = false;

    'files: for (file_path, _) in &files {
        let Ok(content) = tokio::fs::read_to_string(file_path).await else {
            continue;
        };
        let mut file_matches = String::new();
        for (line_no, line) in content.lines().enumerate() {
            if !re.is_match(line) {
                continue;
            }
            if total_matches >= max_results {
                capped = true;
                break 'files;
            }
            let truncated = truncate_with_ellipsis(line, MAX_GREP_LINE_LENGTH);
            file_matches.push_str(&format!("{}| {truncated}\n", line_no + 1));
            total_matches += 1;
        }
        if !file_matches.is_empty() {
            let rel = file_path.strip_prefix(path).unwrap_or(file_path);
            rendered.push_str(&format!("{}:\n{file_matches}\n", rel.display()));
        }
    }

    if total_matches == 0 {
        return "No matches found".to_string();
    }

    if capped {
        rendered.push_str(&format!("(showing first {max_results} matches)"));
    }
    rendered.trim_end().to_string()
}

async fn collect_all_files(
    root: &Path,
    dir: &Path,
    include: &Option<Pattern>,
    out: &mut Vec<(PathBuf, SystemTime)>,
) -> std::io::Result<()> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let entry_path = entry.path();
        let is_dir = entry.file_type().await?.is_dir();
        if is_dir {
            Box::pin(collect_all_files(root, &entry_path, include, out)).await?;
            continue;
        }
        if let Some(pat) = include {
            let name = entry_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if !pat.matches(&name) {
                continue;
            }
        }
        let modified = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        out.push((entry_path, modified));
    }
    Ok(())
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max).collect();
        truncated.push('…');
        truncated
    }
}
