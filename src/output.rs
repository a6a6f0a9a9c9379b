//! Textual rendering of command results: labeled stdout/stderr blocks,
//! exit-code suffixes, running-state summaries, and head-tail truncation
//! of anything that would otherwise blow up the response size.

/// Any rendering above this size gets head-tail truncated.
pub const TRUNCATION_THRESHOLD: usize = 30_000;

/// Strip the marker line (and anything after it) from a stdout buffer
/// before rendering. The marker and its trailer are an implementation
/// detail of exit-code recovery and must never reach the caller.
#[must_use]
pub fn strip_marker(stdout: &str, marker: &str) -> String {
    match stdout.find(marker) {
        Some(pos) => stdout[..pos].to_string(),
        None => stdout.to_string(),
    }
}

/// Render stdout/stderr as one or two labeled blocks. Returns `None` if
/// both streams are empty.
#[must_use]
pub fn render_streams(stdout: &str, stderr: &str) -> Option<String> {
    let stdout = stdout.trim_end_matches('\n');
    let stderr = stderr.trim_end_matches('\n');
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => None,
        (false, true) => Some(stdout.to_string()),
        (true, false) => Some(stderr.to_string()),
        (false, false) => Some(format!("STDOUT:\n{stdout}\n\nSTDERR:\n{stderr}")),
    }
}

/// Render the final result of a synchronously-completed command.
#[must_use]
pub fn render_completed(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let body = render_streams(stdout, stderr);
    let rendered = match body {
        Some(b) => format!("{b}\nExit code: {exit_code}"),
        None => format!("Exit code: {exit_code}"),
    };
    truncate(&rendered)
}

/// Render a backgrounded-notice response, emitted either because the
/// caller asked for immediate backgrounding (`inactivityTimeout == 0`) or
/// because the inactivity/absolute-cap timer fired while still
/// synchronous.
#[must_use]
pub fn render_backgrounded(id: &str, stdout: &str, stderr: &str, reason: &str) -> String {
    let mut out = format!("Process ID: {id}\nProcess is running in background ({reason}).\n");
    if let Some(body) = render_streams(stdout, stderr) {
        out.push('\n');
        out.push_str(&body);
    }
    truncate(&out)
}

/// Render a `checkProcess` response for a still-running record.
#[must_use]
pub fn render_running(
    id: &str,
    command: &str,
    rationale: Option<&str>,
    elapsed_seconds: f64,
    wait_reason: &str,
    stdout: &str,
    stderr: &str,
) -> String {
    let mut out = String::new();
    out.push_str("Process Status: RUNNING\n");
    out.push_str(&format!("Process ID: {id}\n"));
    out.push_str(&format!("Command: {command}\n"));
    if let Some(r) = rationale {
        out.push_str(&format!("Rationale: {r}\n"));
    }
    out.push_str(&format!("Elapsed: {elapsed_seconds:.1}s\n"));
    out.push_str(&format!("Wait reason: {wait_reason}\n"));
    match render_streams(stdout, stderr) {
        Some(body) => {
            out.push('\n');
            out.push_str(&body);
        }
        None => out.push_str("\nNo output captured yet"),
    }
    truncate(&out)
}

/// Render a `checkProcess` response for a record that has completed.
#[must_use]
pub fn render_check_completed(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let mut out = String::from("Process Status: COMPLETED\n");
    out.push_str(&render_completed(stdout, stderr, exit_code));
    truncate(&out)
}

/// Head-tail truncation: strings over [`TRUNCATION_THRESHOLD`] characters
/// retain their first 80% and last 20%, joined by a count-bearing marker.
#[must_use]
pub fn truncate(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= TRUNCATION_THRESHOLD {
        return s.to_string();
    }
    let total = chars.len();
    let head_len = total * 80 / 100;
    let tail_len = total * 20 / 100;
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[total - tail_len..].iter().collect();
    let removed = total - head_len - tail_len;
    format!("{head}\n\n[... truncated {removed} characters ...]\n\n{tail}")
}
