//! Process registry: tracks shells by process id and services the three
//! public operations the dispatcher exposes — `execute_command`,
//! `check_process`, and `send_input`.
//!
//! Records are retained for the life of the server process. There is no
//! TTL sweep and no cap on concurrently running processes: the registry
//! grows unboundedly and operators are expected to restart the container
//! periodically. A production successor would add an LRU or time-based
//! sweep of completed records; not doing so here is a known, deliberate
//! limitation carried over from the design this implements.

use crate::output;
use crate::process::{self, SpawnedShell};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const ABSOLUTE_CAP: Duration = Duration::from_secs(process::ABSOLUTE_CAP_SECONDS);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordStatus {
    Running,
    Completed,
}

/// What ended a `poll_until` wait without the record actually completing.
enum WaitOutcome {
    Completed(i32),
    InactivityTimeout,
    AbsoluteCap,
    NotFound,
}

struct ProcessRecord {
    command: String,
    rationale: Option<String>,
    start_time: Instant,
    end_time: Option<Instant>,
    status: RecordStatus,
    /// Live shell handle while running; cleared on completion, satisfying
    /// the `shellHandle == null iff status == completed` invariant.
    shell: Option<SpawnedShell>,
    stdout_buf: Arc<Mutex<String>>,
    stderr_buf: Arc<Mutex<String>>,
    last_output_at: Arc<Mutex<Instant>>,
    marker: String,
    /// The inactivity budget this record was created with, clamped to
    /// [0, 600]. `check_process` reuses it for its own wait ceiling rather
    /// than taking a fresh one, mirroring the clamp for consistency.
    inactivity_budget: Duration,
    exit_code: Option<i32>,
}

/// Thread-safe registry of shell processes, keyed by process id.
#[derive(Clone)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<HashMap<String, ProcessRecord>>>,
}

impl ProcessRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `executeCommand(command, rationale, inactivityBudgetSec=20)`.
    ///
    /// Spawns a shell under a fresh id. If `inactivity_budget_sec == 0`,
    /// returns the backgrounded notice immediately — this branch is taken
    /// before any wait loop runs, so no race can ever deliver a
    /// synchronous result when the caller asked for immediate
    /// backgrounding. Otherwise waits for completion, inactivity timeout,
    /// or the absolute safety cap, whichever comes first.
    pub async fn execute_command(
        &self,
        command: &str,
        rationale: Option<&str>,
        inactivity_budget_sec: u64,
        working_directory: Option<&str>,
    ) -> String {
        let budget = process::clamp_inactivity_budget(inactivity_budget_sec);
        let id = generate_id();
        let marker = format!("__SHELLGATE_{id}__");

        let spawned = match process::spawn(command, working_directory, &marker).await {
            Ok(s) => s,
            Err(e) => {
                self.insert_spawn_failure(&id, command, rationale).await;
                return output::render_completed("", &format!("Error: {e}\n"), 1);
            }
        };

        let stdout_buf = spawned.stdout_buf.clone();
        let stderr_buf = spawned.stderr_buf.clone();
        let last_output_at = spawned.last_output_at.clone();

        {
            let mut entries = self.entries.lock().await;
            entries.insert(
                id.clone(),
                ProcessRecord {
                    command: command.to_string(),
                    rationale: rationale.map(str::to_string),
                    start_time: Instant::now(),
                    end_time: None,
                    status: RecordStatus::Running,
                    shell: Some(spawned),
                    stdout_buf: stdout_buf.clone(),
                    stderr_buf: stderr_buf.clone(),
                    last_output_at,
                    marker: marker.clone(),
                    inactivity_budget: Duration::from_secs(budget),
                    exit_code: None,
                },
            );
        }

        if budget == 0 {
            let stdout = stdout_buf.lock().await.clone();
            let stderr = stderr_buf.lock().await.clone();
            let stdout = output::strip_marker(&stdout, &marker);
            return output::render_backgrounded(&id, &stdout, &stderr, "inactivityTimeout=0");
        }

        match self
            .poll_until(&id, Duration::from_secs(budget), ABSOLUTE_CAP)
            .await
        {
            WaitOutcome::Completed(code) => {
                let (stdout, stderr) = self.finalize_completed(&id, code).await;
                output::render_completed(&stdout, &stderr, code)
            }
            WaitOutcome::InactivityTimeout => {
                let (stdout, stderr) = self.snapshot_output(&id).await;
                output::render_backgrounded(
                    &id,
                    &stdout,
                    &stderr,
                    &format!("no output for {budget}s"),
                )
            }
            WaitOutcome::AbsoluteCap => {
                let (stdout, stderr) = self.snapshot_output(&id).await;
                output::render_backgrounded(&id, &stdout, &stderr, "maximum timeout reached")
            }
            WaitOutcome::NotFound => "Error: process disappeared unexpectedly".to_string(),
        }
    }

    /// `checkProcess(id, rationale)`.
    pub async fn check_process(&self, id: &str) -> String {
        {
            let entries = self.entries.lock().await;
            let Some(record) = entries.get(id) else {
                return "Error: Process not found".to_string();
            };
            if record.status == RecordStatus::Completed {
                let stdout = record.stdout_buf.clone();
                let stderr = record.stderr_buf.clone();
                let code = record.exit_code.unwrap_or(-1);
                drop(entries);
                let stdout = stdout.lock().await.clone();
                let stderr = stderr.lock().await.clone();
                return output::render_check_completed(&stdout, &stderr, code);
            }
        }

        let budget = {
            let entries = self.entries.lock().await;
            entries
                .get(id)
                .map(|r| r.inactivity_budget)
                .unwrap_or(Duration::from_secs(process::DEFAULT_INACTIVITY_BUDGET_SECONDS))
        };

        match self.poll_until(id, budget, ABSOLUTE_CAP).await {
            WaitOutcome::Completed(code) => {
                let (stdout, stderr) = self.finalize_completed(id, code).await;
                output::render_check_completed(&stdout, &stderr, code)
            }
            WaitOutcome::InactivityTimeout => {
                let (command, rationale, elapsed, stdout, stderr) =
                    self.running_snapshot(id).await;
                output::render_running(
                    id,
                    &command,
                    rationale.as_deref(),
                    elapsed,
                    &format!("no output for {}s", budget.as_secs()),
                    &stdout,
                    &stderr,
                )
            }
            WaitOutcome::AbsoluteCap => {
                let (command, rationale, elapsed, stdout, stderr) =
                    self.running_snapshot(id).await;
                output::render_running(
                    id,
                    &command,
                    rationale.as_deref(),
                    elapsed,
                    "maximum wait time",
                    &stdout,
                    &stderr,
                )
            }
            WaitOutcome::NotFound => "Error: Process not found".to_string(),
        }
    }

    /// `sendInput(id, data, rationale, autoNewline=true)`.
    pub async fn send_input(&self, id: &str, data: &str, auto_newline: bool) -> String {
        let mut entries = self.entries.lock().await;
        let Some(record) = entries.get_mut(id) else {
            return "Error: Process not found".to_string();
        };
        if record.status == RecordStatus::Completed {
            return "Error: Cannot send input to completed process".to_string();
        }
        let Some(shell) = record.shell.as_mut() else {
            return "Error: Process stdin not available".to_string();
        };
        let Some(stdin) = shell.stdin.as_mut() else {
            return "Error: Process stdin not available".to_string();
        };
        match process::write_stdin(stdin, data, auto_newline).await {
            Ok(()) => format!("Input sent to process {id}"),
            Err(e) => format!("Error: {e}"),
        }
    }

    // -- internal helpers -------------------------------------------------

    /// Poll a record every [`POLL_INTERVAL`] until it completes, the
    /// inactivity budget elapses since `last_output_at`, or `cap` elapses
    /// since this call began — whichever comes first. Shared between
    /// `execute_command`'s synchronous phase and `check_process`.
    async fn poll_until(&self, id: &str, inactivity_budget: Duration, cap: Duration) -> WaitOutcome {
        let wait_start = Instant::now();
        loop {
            let (marker_code_now, last_output_at) = {
                let entries = self.entries.lock().await;
                let Some(record) = entries.get(id) else {
                    return WaitOutcome::NotFound;
                };
                if record.status == RecordStatus::Completed {
                    return WaitOutcome::Completed(record.exit_code.unwrap_or(-1));
                }
                let Some(shell) = record.shell.as_ref() else {
                    return WaitOutcome::Completed(record.exit_code.unwrap_or(-1));
                };
                let code = *shell.marker_exit_code.lock().await;
                let last = *record.last_output_at.lock().await;
                (code, last)
            };

            if let Some(code) = marker_code_now {
                return WaitOutcome::Completed(code);
            }

            let since_output = last_output_at.elapsed();
            if since_output >= inactivity_budget {
                return WaitOutcome::InactivityTimeout;
            }
            if wait_start.elapsed() >= cap {
                return WaitOutcome::AbsoluteCap;
            }

            let remaining_inactivity = inactivity_budget - since_output;
            let remaining_cap = cap - wait_start.elapsed();
            let sleep_for = POLL_INTERVAL.min(remaining_inactivity).min(remaining_cap);
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Close stdin and wait for true shell exit once the marker has been
    /// seen, then latch the record as completed. Returns the final
    /// (stdout, stderr) text with the marker line stripped from stdout.
    async fn finalize_completed(&self, id: &str, marker_code: i32) -> (String, String) {
        // Latch status/exit_code and take the shell out in one lock so a
        // concurrent check_process on the same id never observes a window
        // where status is already Completed but exit_code isn't set yet.
        let shell = {
            let mut entries = self.entries.lock().await;
            let Some(record) = entries.get_mut(id) else {
                return (String::new(), String::new());
            };
            if record.status == RecordStatus::Completed {
                let stdout = record.stdout_buf.lock().await.clone();
                let stderr = record.stderr_buf.lock().await.clone();
                return (output::strip_marker(&stdout, &record.marker), stderr);
            }
            record.status = RecordStatus::Completed;
            record.end_time = Some(Instant::now());
            record.exit_code = Some(marker_code);
            record.shell.take()
        };

        // The marker's parsed exit code is authoritative and already
        // latched above; waiting for the real OS exit here only ensures
        // trailing stderr has finished draining before we render it.
        if let Some(shell) = shell {
            let _ = shell.close_stdin_and_wait().await;
        }

        let entries = self.entries.lock().await;
        if let Some(record) = entries.get(id) {
            let stdout = record.stdout_buf.lock().await.clone();
            let stderr = record.stderr_buf.lock().await.clone();
            return (output::strip_marker(&stdout, &record.marker), stderr);
        }
        (String::new(), String::new())
    }

    async fn snapshot_output(&self, id: &str) -> (String, String) {
        let entries = self.entries.lock().await;
        let Some(record) = entries.get(id) else {
            return (String::new(), String::new());
        };
        let stdout = record.stdout_buf.lock().await.clone();
        let stderr = record.stderr_buf.lock().await.clone();
        (output::strip_marker(&stdout, &record.marker), stderr)
    }

    async fn running_snapshot(&self, id: &str) -> (String, Option<String>, f64, String, String) {
        let entries = self.entries.lock().await;
        let Some(record) = entries.get(id) else {
            return (String::new(), None, 0.0, String::new(), String::new());
        };
        let stdout = record.stdout_buf.lock().await.clone();
        let stderr = record.stderr_buf.lock().await.clone();
        (
            record.command.clone(),
            record.rationale.clone(),
            record.start_time.elapsed().as_secs_f64(),
            output::strip_marker(&stdout, &record.marker),
            stderr,
        )
    }

    async fn insert_spawn_failure(&self, id: &str, command: &str, rationale: Option<&str>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            id.to_string(),
            ProcessRecord {
                command: command.to_string(),
                rationale: rationale.map(str::to_string),
                start_time: Instant::now(),
                end_time: Some(Instant::now()),
                status: RecordStatus::Completed,
                shell: None,
                stdout_buf: Arc::new(Mutex::new(String::new())),
                stderr_buf: Arc::new(Mutex::new(String::new())),
                last_output_at: Arc::new(Mutex::new(Instant::now())),
                marker: String::new(),
                inactivity_budget: Duration::from_secs(process::DEFAULT_INACTIVITY_BUDGET_SECONDS),
                exit_code: Some(1),
            },
        );
    }

    /// List all tracked processes (running and completed), newest first.
    pub async fn list(&self) -> Vec<ProcessSummary> {
        let entries = self.entries.lock().await;
        let mut summaries: Vec<ProcessSummary> = Vec::with_capacity(entries.len());
        for (id, record) in entries.iter() {
            summaries.push(ProcessSummary {
                id: id.clone(),
                command: record.command.clone(),
                running: record.status == RecordStatus::Running,
                runtime_seconds: match record.end_time {
                    Some(end) => (end - record.start_time).as_secs_f64(),
                    None => record.start_time.elapsed().as_secs_f64(),
                },
            });
        }
        summaries.sort_by(|a, b| b.runtime_seconds.partial_cmp(&a.runtime_seconds).unwrap());
        summaries
    }

    /// Forcibly kill a running process, used by process-wide shutdown.
    pub async fn kill(&self, id: &str) -> Result<(), String> {
        let shell = {
            let mut entries = self.entries.lock().await;
            let Some(record) = entries.get_mut(id) else {
                return Err(format!("no process with id '{id}'"));
            };
            if record.status == RecordStatus::Completed {
                return Ok(());
            }
            record.status = RecordStatus::Completed;
            record.end_time = Some(Instant::now());
            record.exit_code = Some(-1);
            record.shell.take()
        };
        if let Some(shell) = shell {
            shell.kill().await;
        }
        Ok(())
    }

    /// Kill every running process. Called on process-wide shutdown.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|(_, r)| r.status == RecordStatus::Running)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in ids {
            let _ = self.kill(&id).await;
        }
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub id: String,
    pub command: String,
    pub running: bool,
    pub runtime_seconds: f64,
}

/// Generate a process id of the form `proc_<ms-timestamp>_<base36-random>`.
fn generate_id() -> String {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..6)
            .map(|_| {
                const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            })
            .collect()
    };
    format!("proc_{ms}_{suffix}")
}
