//! Ambient per-call request context: the `executionId` that selects a
//! workspace root, carried for the duration of one RPC call.
//!
//! The original design carries `executionId` as an ambient value read by
//! both the command executor and the file tools. Rust has no built-in
//! ambient-context facility that composes with `rmcp::ServerHandler`'s
//! fixed method signatures, so this uses `tokio::task_local!`: the HTTP
//! front end enters the scope once per request (around the `Execution-Id`
//! header), and every tool handler that needs the workspace root reads it
//! back out without threading an extra parameter through rmcp's macros.

use std::path::{Path, PathBuf};

/// Filesystem root that file and command tools resolve relative paths
/// against. Default workspace used when no `Execution-Id` header is present.
pub const DEFAULT_WORKSPACE: &str = "/app/workspace";

tokio::task_local! {
    static EXECUTION_ID: Option<String>;
}

/// Enter a request-scoped context for the duration of `f`. Call this once
/// per inbound RPC call, at the HTTP boundary, before dispatching to the
/// tool router.
pub async fn scope<F, T>(execution_id: Option<String>, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    EXECUTION_ID.scope(execution_id, f).await
}

/// The workspace root for the call currently in scope.
///
/// Falls back to [`DEFAULT_WORKSPACE`] both when no `Execution-Id` header
/// was supplied and when called outside of any [`scope`] (e.g. from a
/// directly-wired test transport that never goes through the HTTP front
/// end) — this matches spec.md's "absent -> default /app/workspace" rule
/// while keeping tool handlers callable in isolation.
#[must_use]
pub fn current_root() -> PathBuf {
    let id = EXECUTION_ID
        .try_with(Clone::clone)
        .unwrap_or(None);
    match id {
        Some(id) => Path::new(DEFAULT_WORKSPACE).join(id),
        None => PathBuf::from(DEFAULT_WORKSPACE),
    }
}

/// Resolve a (possibly relative) path argument against the current
/// workspace root, ensuring the root directory exists.
pub async fn resolve(path: &str) -> std::io::Result<PathBuf> {
    let root = ensure_current_root().await?;
    let candidate = Path::new(path);
    Ok(if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    })
}

/// The current workspace root, created if it doesn't exist yet. Shell
/// commands run with this as their working directory, per spec: "all file
/// and command operations resolve paths under the same workspace root."
pub async fn ensure_current_root() -> std::io::Result<PathBuf> {
    let root = current_root();
    tokio::fs::create_dir_all(&root).await?;
    Ok(root)
}
