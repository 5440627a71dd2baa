//! Resume point resolution from checkpoint metadata

use serde_json::Value;
use tracing::{debug, info};

const RESUME_PATH_POINTER: &str = "/latest/savepoint/external_path";

/// Returns `latest.savepoint.external_path` when the checkpoint info carries one.
///
/// Most finished jobs never took a savepoint, so absence is the common case.
pub fn resolve_resume_path(checkpoint_info: &Value) -> Option<String> {
    match checkpoint_info.pointer(RESUME_PATH_POINTER).and_then(Value::as_str) {
        Some(path) if !path.is_empty() => {
            info!("Found savepoint path: {}", path);
            Some(path.to_string())
        }
        _ => {
            debug!("No savepoint path in checkpoint info");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolves_external_path() {
        let info = json!({"latest": {"savepoint": {"external_path": "s3://x"}}});
        assert_eq!(resolve_resume_path(&info), Some("s3://x".to_string()));
    }

    #[test]
    fn test_absent_paths() {
        assert_eq!(resolve_resume_path(&json!({})), None);
        assert_eq!(resolve_resume_path(&json!({"latest": null})), None);
        assert_eq!(resolve_resume_path(&json!({"latest": {"savepoint": {}}})), None);
        assert_eq!(
            resolve_resume_path(&json!({"latest": {"savepoint": {"external_path": 7}}})),
            None
        );
        assert_eq!(resolve_resume_path(&json!("not an object")), None);
    }
}
