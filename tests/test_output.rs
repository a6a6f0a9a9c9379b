//! Unit tests for textual result rendering: labeled stdout/stderr blocks,
//! exit-code suffixes, running-state summaries, and head-tail truncation.

use shellgate::output::{render_completed, render_running, strip_marker, render_streams, truncate};

#[test]
fn strips_marker_and_trailer() {
    let stdout = "hello\nMARK_1 EXIT_CODE:0\n";
    assert_eq!(strip_marker(stdout, "MARK_1"), "hello\n");
}

#[test]
fn render_streams_stdout_only() {
    assert_eq!(render_streams("hi", ""), Some("hi".to_string()));
}

#[test]
fn render_streams_stderr_only() {
    assert_eq!(render_streams("", "oops"), Some("oops".to_string()));
}

#[test]
fn render_streams_both() {
    let got = render_streams("out", "err").unwrap();
    assert!(got.starts_with("STDOUT:\nout\n\nSTDERR:\nerr"));
}

#[test]
fn render_streams_neither() {
    assert_eq!(render_streams("", ""), None);
}

#[test]
fn render_completed_appends_exit_code() {
    let rendered = render_completed("hello\n", "", 0);
    assert!(rendered.contains("hello"));
    assert!(rendered.ends_with("Exit code: 0"));
}

#[test]
fn render_completed_with_no_output_still_reports_exit_code() {
    let rendered = render_completed("", "", 0);
    assert_eq!(rendered, "Exit code: 0");
}

#[test]
fn render_running_reports_no_output_captured() {
    let rendered = render_running("proc_1", "sleep 30", Some("t"), 2.0, "no output for 2s", "", "");
    assert!(rendered.contains("Process Status: RUNNING"));
    assert!(rendered.contains("Process ID: proc_1"));
    assert!(rendered.contains("Command: sleep 30"));
    assert!(rendered.contains("Rationale: t"));
    assert!(rendered.contains("No output captured yet"));
    assert!(!rendered.contains("Exit code"));
}

#[test]
fn render_running_never_has_exit_code() {
    let rendered = render_running("proc_1", "cmd", None, 1.0, "maximum wait time", "out", "");
    assert!(!rendered.contains("Exit code"));
}

#[test]
fn truncate_leaves_short_strings_alone() {
    let s = "short".to_string();
    assert_eq!(truncate(&s), s);
}

#[test]
fn truncate_splits_80_20_with_marker() {
    let s = "a".repeat(40_000);
    let truncated = truncate(&s);
    assert!(truncated.len() < s.len());
    assert!(truncated.contains("truncated"));
    assert!(truncated.contains("characters"));
}
