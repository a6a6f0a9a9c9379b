//! Tests for marker-line command framing and shell spawning mechanics.

use shellgate::process::{
    build_wrapped_command, clamp_inactivity_budget, contains_heredoc_opener, parse_marker_line,
    spawn,
};

#[test]
fn clamps_inactivity_budget() {
    assert_eq!(clamp_inactivity_budget(0), 0);
    assert_eq!(clamp_inactivity_budget(600), 600);
    assert_eq!(clamp_inactivity_budget(9000), 600);
}

#[test]
fn detects_heredoc_but_not_herestring() {
    assert!(contains_heredoc_opener("cat <<EOF\nhi\nEOF"));
    assert!(!contains_heredoc_opener("cat <<<hi"));
    assert!(!contains_heredoc_opener("echo hi"));
}

#[test]
fn wraps_background_command_with_bare_newline_trailer() {
    let wrapped = build_wrapped_command("sleep 5 &", "MARK");
    assert!(wrapped.starts_with("sleep 5 &\necho 'MARK'"));
    assert!(!wrapped.contains("/dev/null"));
}

#[test]
fn wraps_heredoc_command_with_newline_trailer() {
    let wrapped = build_wrapped_command("cat <<EOF\nhi\nEOF", "MARK");
    assert!(wrapped.contains("EOF\necho 'MARK'"));
    assert!(!wrapped.contains("/dev/null"));
}

#[test]
fn wraps_plain_command_with_null_redirect_and_semicolon() {
    let wrapped = build_wrapped_command("echo hi", "MARK");
    assert!(wrapped.starts_with("echo hi </dev/null; echo 'MARK'"));
}

#[test]
fn parses_marker_exit_code() {
    assert_eq!(parse_marker_line("MARK EXIT_CODE:0", "MARK"), Some(0));
    assert_eq!(parse_marker_line("MARK EXIT_CODE:127", "MARK"), Some(127));
    assert_eq!(parse_marker_line("not the marker", "MARK"), None);
    assert_eq!(parse_marker_line("MARK no code here", "MARK"), None);
}

#[tokio::test]
async fn spawn_runs_command_and_reports_exit_code() {
    let marker = "TESTMARK_1";
    let mut shell = spawn("echo hello", None, marker).await.unwrap();
    loop {
        if shell.marker_exit_code.lock().await.is_some() {
            break;
        }
        shell.activity.notified().await;
    }
    assert_eq!(*shell.marker_exit_code.lock().await, Some(0));
    assert!(shell.stdout_buf.lock().await.contains("hello"));
    shell.kill().await;
}

#[tokio::test]
async fn spawn_captures_stderr_separately() {
    let marker = "TESTMARK_2";
    let mut shell = spawn("echo out; echo err >&2", None, marker)
        .await
        .unwrap();
    loop {
        if shell.marker_exit_code.lock().await.is_some() {
            break;
        }
        shell.activity.notified().await;
    }
    assert!(shell.stdout_buf.lock().await.contains("out"));
    assert!(shell.stderr_buf.lock().await.contains("err"));
    assert!(!shell.stdout_buf.lock().await.contains("err"));
    shell.kill().await;
}
