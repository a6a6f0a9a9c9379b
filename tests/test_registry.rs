//! Tests for the process registry: `execute_command`, `check_process`, and
//! `send_input`.

use shellgate::registry::ProcessRegistry;
use std::time::Duration;

#[tokio::test]
async fn process_ids_match_expected_shape() {
    let registry = ProcessRegistry::new();
    let result = registry
        .execute_command("sleep 5 && echo done", Some("t"), 0, None)
        .await;
    let id = result
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Process ID: ")
        .to_string();

    assert!(id.starts_with("proc_"));
    let rest = &id["proc_".len()..];
    let mut parts = rest.rsplitn(2, '_');
    let suffix = parts.next().unwrap();
    let ms = parts.next().unwrap();
    assert!(ms.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(suffix.len(), 6);
    assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn execute_command_runs_synchronously_and_reports_exit_code() {
    let registry = ProcessRegistry::new();
    let result = registry
        .execute_command("echo hello", Some("t"), 10, None)
        .await;
    assert!(result.contains("hello"));
    assert!(result.contains("Exit code: 0"));
    assert!(!result.contains("Process ID:"));
}

#[tokio::test]
async fn zero_budget_backgrounds_immediately() {
    let registry = ProcessRegistry::new();
    let result = registry
        .execute_command("sleep 2 && echo done", Some("t"), 0, None)
        .await;
    assert!(result.contains("Process ID:"));
    assert!(result.contains("background"));
}

#[tokio::test]
async fn backgrounded_command_can_be_checked_and_completes() {
    let registry = ProcessRegistry::new();
    let result = registry
        .execute_command("sleep 1 && echo done_marker", Some("t"), 0, None)
        .await;
    let id_line = result.lines().next().unwrap();
    let id = id_line.trim_start_matches("Process ID: ").to_string();

    let running = registry.check_process(&id).await;
    assert!(running.contains("Process Status: RUNNING"));
    assert!(running.contains(&id));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let completed = registry.check_process(&id).await;
    assert!(completed.contains("Process Status: COMPLETED"));
    assert!(completed.contains("done_marker"));
    assert!(completed.contains("Exit code: 0"));
}

#[tokio::test]
async fn send_input_feeds_a_waiting_read() {
    let registry = ProcessRegistry::new();
    let result = registry
        .execute_command("read x && echo got:$x", Some("t"), 1, None)
        .await;
    assert!(result.contains("Process ID:"));
    let id = result
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Process ID: ")
        .to_string();

    let sent = registry.send_input(&id, "hi", true).await;
    assert_eq!(sent, format!("Input sent to process {id}"));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let completed = registry.check_process(&id).await;
    assert!(completed.contains("got:hi"));
    assert!(completed.contains("Exit code: 0"));
}

#[tokio::test]
async fn send_input_to_unknown_id_is_an_error() {
    let registry = ProcessRegistry::new();
    let result = registry.send_input("proc_nope", "x", true).await;
    assert_eq!(result, "Error: Process not found");
}

#[tokio::test]
async fn send_input_to_completed_process_is_an_error() {
    let registry = ProcessRegistry::new();
    let result = registry
        .execute_command("echo hi && echo done", Some("t"), 0, None)
        .await;
    let id = result
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Process ID: ")
        .to_string();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let _ = registry.check_process(&id).await;
    let sent = registry.send_input(&id, "x", true).await;
    assert_eq!(sent, "Error: Cannot send input to completed process");
}

#[tokio::test]
async fn check_process_unknown_id_is_an_error() {
    let registry = ProcessRegistry::new();
    let result = registry.check_process("proc_nope").await;
    assert_eq!(result, "Error: Process not found");
}

#[tokio::test]
async fn list_reports_running_and_completed() {
    let registry = ProcessRegistry::new();
    registry.execute_command("echo one", Some("t"), 10, None).await;
    registry
        .execute_command("sleep 5 && echo two", Some("t"), 0, None)
        .await;
    let summaries = registry.list().await;
    assert_eq!(summaries.len(), 2);
}
