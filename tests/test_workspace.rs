//! Tests for the ambient per-request workspace scope.

use shellgate::workspace::{current_root, scope, DEFAULT_WORKSPACE};
use std::path::PathBuf;

#[tokio::test]
async fn default_root_without_scope() {
    assert_eq!(current_root(), PathBuf::from(DEFAULT_WORKSPACE));
}

#[tokio::test]
async fn scope_sets_execution_id_root() {
    let root = scope(Some("abc123".to_string()), async { current_root() }).await;
    assert_eq!(root, PathBuf::from("/app/workspace/abc123"));
}

#[tokio::test]
async fn scope_with_none_uses_default() {
    let root = scope(None, async { current_root() }).await;
    assert_eq!(root, PathBuf::from(DEFAULT_WORKSPACE));
}

#[tokio::test]
async fn nested_scopes_restore_outer_value() {
    scope(Some("outer".to_string()), async {
        assert_eq!(current_root(), PathBuf::from("/app/workspace/outer"));
        let inner = scope(Some("inner".to_string()), async { current_root() }).await;
        assert_eq!(inner, PathBuf::from("/app/workspace/inner"));
        assert_eq!(current_root(), PathBuf::from("/app/workspace/outer"));
    })
    .await;
}
