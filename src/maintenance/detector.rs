//! Detection of in-flight sync operations

use kube::ResourceExt;

use crate::crd::{Application, OPERATION_PHASE_RUNNING};

/// True when the last recorded operation is still running
pub fn is_active_sync(app: &Application) -> bool {
    app.operation_phase() == Some(OPERATION_PHASE_RUNNING)
}

/// Names of applications with a running sync, in list order
pub fn collect_active_syncs(apps: &[Application]) -> Vec<String> {
    apps.iter()
        .filter(|app| is_active_sync(app))
        .map(|app| app.name_any())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::app;

    #[test]
    fn test_only_running_phase_is_active() {
        let apps = vec![
            app("x", None, Some("Running")),
            app("y", None, Some("Succeeded")),
            app("z", None, None),
        ];
        assert_eq!(collect_active_syncs(&apps), vec!["x".to_string()]);
    }

    #[test]
    fn test_none_active() {
        let apps = vec![
            app("a", None, Some("Failed")),
            app("b", None, Some("Error")),
            app("c", None, None),
        ];
        assert!(collect_active_syncs(&apps).is_empty());
    }

    #[test]
    fn test_preserves_list_order() {
        let apps = vec![
            app("c", None, Some("Running")),
            app("a", None, Some("Running")),
            app("b", None, Some("Terminating")),
        ];
        assert_eq!(collect_active_syncs(&apps), vec!["c", "a"]);
    }

    #[test]
    fn test_phase_match_is_exact() {
        assert!(!is_active_sync(&app("a", None, Some("running"))));
        assert!(is_active_sync(&app("a", None, Some("Running"))));
    }
}
