//! Tests for the file tool suite: read, write, edit, list, glob, grep.

use shellgate::files::{edit, glob_search, grep, list, read, write};
use tempfile::tempdir;

#[tokio::test]
async fn read_renders_line_numbers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "X").await.unwrap();
    let rendered = read(&path, 0, 2000).await;
    assert_eq!(rendered, "    1| X\n");
}

#[tokio::test]
async fn read_empty_file_is_empty_rendering() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    tokio::fs::write(&path, "").await.unwrap();
    assert_eq!(read(&path, 0, 2000).await, "");
}

#[tokio::test]
async fn read_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.txt");
    let rendered = read(&path, 0, 2000).await;
    assert!(rendered.starts_with("Error:"));
}

#[tokio::test]
async fn read_detects_binary_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bin.dat");
    tokio::fs::write(&path, [0u8, 1, 2, 0, 3]).await.unwrap();
    let rendered = read(&path, 0, 2000).await;
    assert!(rendered.contains("binary"));
}

#[tokio::test]
async fn read_truncates_long_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("long.txt");
    let long_line = "x".repeat(3000);
    tokio::fs::write(&path, &long_line).await.unwrap();
    let rendered = read(&path, 0, 2000).await;
    let content_line = rendered.strip_prefix("    1| ").unwrap().trim_end_matches('\n');
    assert_eq!(content_line.len(), 2000);
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a/b.txt");
    let result = write(&path, "X").await;
    assert!(result.contains("Successfully wrote"));
    let rendered = read(&path, 0, 2000).await;
    assert_eq!(rendered, "    1| X\n");
}

#[tokio::test]
async fn write_then_write_then_read_yields_latest() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    write(&path, "first").await;
    write(&path, "second").await;
    let rendered = read(&path, 0, 2000).await;
    assert!(rendered.contains("second"));
    assert!(!rendered.contains("first"));
}

#[tokio::test]
async fn edit_replaces_first_occurrence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "X X X").await.unwrap();
    let result = edit(&path, "X", "Y", false).await;
    assert!(result.contains("Successfully replaced"));
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, "Y X X");
}

#[tokio::test]
async fn edit_replace_all() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "X X X").await.unwrap();
    edit(&path, "X", "Y", true).await;
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, "Y Y Y");
}

#[tokio::test]
async fn edit_twice_reports_string_not_found_second_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a/b.txt");
    write(&path, "X").await;
    let first = edit(&path, "X", "Y", true).await;
    assert!(first.contains("Successfully replaced"));
    let second = edit(&path, "X", "Y", true).await;
    assert!(second.contains("String not found in file"));
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, "Y");
}

#[tokio::test]
async fn edit_rejects_identical_strings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "X").await.unwrap();
    let result = edit(&path, "X", "X", false).await;
    assert!(result.starts_with("Error:"));
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, "X");
}

#[tokio::test]
async fn edit_leaves_file_unchanged_when_string_missing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "hello").await.unwrap();
    let result = edit(&path, "missing", "Y", false).await;
    assert!(result.contains("String not found in file"));
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, "hello");
}

#[tokio::test]
async fn list_reports_empty_directory() {
    let dir = tempdir().unwrap();
    let rendered = list(dir.path(), &[]).await;
    assert_eq!(rendered, "Directory is empty");
}

#[tokio::test]
async fn list_sorts_directories_before_files() {
    let dir = tempdir().unwrap();
    tokio::fs::write(dir.path().join("b.txt"), "").await.unwrap();
    tokio::fs::create_dir(dir.path().join("a_dir")).await.unwrap();
    let rendered = list(dir.path(), &[]).await;
    let dir_pos = rendered.find("a_dir/").unwrap();
    let file_pos = rendered.find("b.txt").unwrap();
    assert!(dir_pos < file_pos);
}

#[tokio::test]
async fn list_applies_default_ignore_set() {
    let dir = tempdir().unwrap();
    tokio::fs::create_dir(dir.path().join(".git")).await.unwrap();
    tokio::fs::write(dir.path().join(".git/HEAD"), "").await.unwrap();
    tokio::fs::write(dir.path().join("README.md"), "").await.unwrap();
    let rendered = list(dir.path(), &[]).await;
    assert!(!rendered.contains(".git"));
    assert!(rendered.contains("README.md"));
}

#[tokio::test]
async fn grep_reports_no_matches_as_non_error() {
    let dir = tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), "hello").await.unwrap();
    let rendered = grep("zzz", dir.path(), None, false, 100).await;
    assert_eq!(rendered, "No matches found");
}

#[tokio::test]
async fn grep_finds_matches_with_line_numbers() {
    let dir = tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree").await.unwrap();
    let rendered = grep("tw.", dir.path(), None, false, 100).await;
    assert!(rendered.contains("2| two"));
}

#[tokio::test]
async fn grep_truncates_long_lines_with_ellipsis() {
    let dir = tempdir().unwrap();
    let long_line = "match ".to_string() + &"x".repeat(300);
    tokio::fs::write(dir.path().join("a.txt"), &long_line).await.unwrap();
    let rendered = grep("match", dir.path(), None, false, 100).await;
    assert!(rendered.contains('…'));
}

#[tokio::test]
async fn glob_sorts_by_modification_time_newest_first() {
    let dir = tempdir().unwrap();
    tokio::fs::write(dir.path().join("old.txt"), "").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    tokio::fs::write(dir.path().join("new.txt"), "").await.unwrap();
    let rendered = glob_search("*.txt", dir.path(), 100).await;
    let new_pos = rendered.find("new.txt").unwrap();
    let old_pos = rendered.find("old.txt").unwrap();
    assert!(new_pos < old_pos);
}
