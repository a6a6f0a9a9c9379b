//! Shell spawning and marker-line command framing.
//!
//! This module owns the mechanics of turning a shell command string into a
//! running child process whose stdout/stderr are captured into shared
//! buffers and whose exit code can be recovered from a sentinel line
//! without closing its stdin. The registry (`crate::registry`) owns when to
//! stop waiting on that process; this module only knows how to start one
//! and keep listening.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// Absolute safety cap on any single command, in seconds (spec §4.A).
pub const ABSOLUTE_CAP_SECONDS: u64 = 600;

/// Default inactivity budget when the caller doesn't specify one.
pub const DEFAULT_INACTIVITY_BUDGET_SECONDS: u64 = 20;

/// Clamp an inactivity budget to `[0, ABSOLUTE_CAP_SECONDS]`.
#[must_use]
pub fn clamp_inactivity_budget(seconds: u64) -> u64 {
    seconds.min(ABSOLUTE_CAP_SECONDS)
}

/// Returns the set of env var names to strip from child processes, if any.
///
/// By default the full environment is inherited, matching how a real
/// terminal works. Set `SHELLGATE_STRIP_ENV` to a comma-separated list of
/// names to strip (e.g. API keys) when a prompt-injected command shouldn't
/// be able to read them.
fn stripped_env_vars() -> &'static HashSet<String> {
    static STRIPPED: LazyLock<HashSet<String>> = LazyLock::new(|| {
        std::env::var("SHELLGATE_STRIP_ENV")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    });
    &STRIPPED
}

/// Returns true if an environment variable should be stripped from child
/// processes.
#[must_use]
pub fn is_sensitive_env(name: &str) -> bool {
    let stripped = stripped_env_vars();
    !stripped.is_empty() && stripped.contains(&name.to_uppercase())
}

// ---------------------------------------------------------------------------
// Marker framing (spec §4.A)
// ---------------------------------------------------------------------------

/// Detects a here-document opener (`<<` not part of a here-string `<<<`).
/// A semicolon after the marker echo would land inside the document body
/// rather than terminating it, so commands like this get a newline-joined
/// trailer instead.
#[must_use]
pub fn contains_heredoc_opener(command: &str) -> bool {
    let bytes = command.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'<' {
            let is_herestring = i + 2 < bytes.len() && bytes[i + 2] == b'<';
            if !is_herestring {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Build the command line actually submitted to the shell, per the
/// three-case table in spec.md §4.A.
#[must_use]
pub fn build_wrapped_command(command: &str, marker: &str) -> String {
    let trailer = format!("echo '{marker}' EXIT_CODE:$?");
    if command.trim_end().ends_with('&') {
        // Backgrounding: emit the marker right after so $? reflects the
        // backgrounding fork, not the eventual child.
        format!("{command}\n{trailer}\n")
    } else if contains_heredoc_opener(command) {
        // Here-doc body follows on subsequent lines; a semicolon here would
        // not terminate the document.
        format!("{command}\n{trailer}\n")
    } else {
        // Redirect the command's own stdin from /dev/null so it can't block
        // on it, while the shell's stdin remains open for later input.
        format!("{command} </dev/null; {trailer}\n")
    }
}

/// Parse `EXIT_CODE:<n>` out of a marker line. Returns `None` if the marker
/// text isn't present or the trailing code doesn't parse.
#[must_use]
pub fn parse_marker_line(line: &str, marker: &str) -> Option<i32> {
    let pos = line.find(marker)?;
    let after = &line[pos + marker.len()..];
    let after = after.trim_start();
    let code_str = after.strip_prefix("EXIT_CODE:")?;
    code_str.trim().parse::<i32>().ok()
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// A running, marker-wrapped shell plus everything needed to observe and
/// interact with it after the initial call returns.
pub struct SpawnedShell {
    pub child: Child,
    pub stdin: Option<ChildStdin>,
    pub stdout_buf: Arc<Mutex<String>>,
    pub stderr_buf: Arc<Mutex<String>>,
    pub last_output_at: Arc<Mutex<Instant>>,
    /// Set once the marker line has been observed in stdout.
    pub marker_exit_code: Arc<Mutex<Option<i32>>>,
    /// Notified whenever new output arrives or the marker is observed.
    pub activity: Arc<Notify>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl SpawnedShell {
    /// Close stdin (forcing a shell that's blocked reading it to exit),
    /// wait for the child to exit, then wait for both output-pump tasks to
    /// drain so `stdout_buf`/`stderr_buf` are final before anyone reads
    /// them. Returns the real OS exit code, used only as a fallback when
    /// the marker itself was never observed (e.g. the shell was killed by
    /// a signal).
    pub async fn close_stdin_and_wait(mut self) -> i32 {
        self.stdin.take();
        let status = self.child.wait().await;
        let _ = self.stdout_task.await;
        let _ = self.stderr_task.await;
        status.ok().and_then(|s| s.code()).unwrap_or(-1)
    }

    /// Forcibly kill the process group and abort the pump tasks, used by
    /// `kill_process` and by registry shutdown.
    pub async fn kill(mut self) {
        self.stdout_task.abort();
        self.stderr_task.abort();
        if let Some(pid) = self.child.id() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(-(pid as i32)),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

/// Spawn `/bin/sh -c <wrapped command>` with piped stdin/stdout/stderr kept
/// open, in its own process group, and start output-pump tasks that append
/// to shared buffers and watch stdout for `marker`.
pub async fn spawn(
    command: &str,
    working_directory: Option<&str>,
    marker: &str,
) -> Result<SpawnedShell, String> {
    let wrapped = build_wrapped_command(command, marker);

    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(&wrapped);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    for (key, _) in std::env::vars() {
        if is_sensitive_env(&key) {
            cmd.env_remove(&key);
        }
    }

    // SAFETY: setsid() is async-signal-safe and runs before exec in the
    // child; this lets the whole process group be signaled together.
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::other)?;
            Ok(())
        });
    }

    if let Some(dir) = working_directory {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {e}"))?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let stdout_buf = Arc::new(Mutex::new(String::new()));
    let stderr_buf = Arc::new(Mutex::new(String::new()));
    let last_output_at = Arc::new(Mutex::new(Instant::now()));
    let marker_exit_code = Arc::new(Mutex::new(None));
    let activity = Arc::new(Notify::new());

    let marker_owned = marker.to_string();
    let stdout_buf_task = stdout_buf.clone();
    let last_output_task = last_output_at.clone();
    let marker_exit_task = marker_exit_code.clone();
    let activity_stdout = activity.clone();
    let stdout_task = tokio::spawn(async move {
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(code) = parse_marker_line(&line, &marker_owned) {
                *marker_exit_task.lock().await = Some(code);
                activity_stdout.notify_waiters();
                continue; // marker + trailer never rendered to the caller
            }
            let mut buf = stdout_buf_task.lock().await;
            buf.push_str(&line);
            buf.push('\n');
            *last_output_task.lock().await = Instant::now();
            activity_stdout.notify_waiters();
        }
    });

    let stderr_buf_task = stderr_buf.clone();
    let last_output_task2 = last_output_at.clone();
    let activity_stderr = activity.clone();
    let stderr_task = tokio::spawn(async move {
        let reader = BufReader::new(stderr);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut buf = stderr_buf_task.lock().await;
            buf.push_str(&line);
            buf.push('\n');
            *last_output_task2.lock().await = Instant::now();
            activity_stderr.notify_waiters();
        }
    });

    Ok(SpawnedShell {
        child,
        stdin,
        stdout_buf,
        stderr_buf,
        last_output_at,
        marker_exit_code,
        activity,
        stdout_task,
        stderr_task,
    })
}

/// Write `data` to the shell's stdin, appending a newline unless
/// `auto_newline` is false. MCP string arguments can't carry literal
/// control bytes, so a small set of escape sequences is recognized.
pub async fn write_stdin(
    stdin: &mut ChildStdin,
    data: &str,
    auto_newline: bool,
) -> Result<(), String> {
    let mut bytes = process_escapes(data);
    if auto_newline {
        bytes.push(b'\n');
    }
    stdin
        .write_all(&bytes)
        .await
        .map_err(|e| format!("failed to write to process stdin: {e}"))?;
    stdin
        .flush()
        .await
        .map_err(|e| format!("failed to flush process stdin: {e}"))
}

/// Expand `\n`, `\r`, `\t`, `\\`, and `\xNN` escapes in a literal string
/// argument into their byte values.
fn process_escapes(input: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push(b'\n'),
                Some('r') => out.push(b'\r'),
                Some('t') => out.push(b'\t'),
                Some('\\') => out.push(b'\\'),
                Some('x') => {
                    let mut hex = String::new();
                    if let Some(h1) = chars.next() {
                        hex.push(h1);
                    }
                    if let Some(h2) = chars.next() {
                        hex.push(h2);
                    }
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        out.push(byte);
                    }
                }
                Some(other) => {
                    out.push(b'\\');
                    let mut tmp = [0u8; 4];
                    out.extend_from_slice(other.encode_utf8(&mut tmp).as_bytes());
                }
                None => out.push(b'\\'),
            }
        } else {
            let mut tmp = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
        }
    }
    out
}
