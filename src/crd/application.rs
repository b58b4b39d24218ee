//! Argo CD Application custom resource
//!
//! Only the fields mzcld reads or writes are typed. Everything else lands in
//! a flattened `extra` map so that a whole-object replace sends back exactly
//! what was listed.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Phase reported by Argo CD while a sync operation is in flight
pub const OPERATION_PHASE_RUNNING: &str = "Running";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "Application",
    namespaced,
    status = "ApplicationStatus",
    shortname = "app",
    printcolumn = r#"{"name":"Sync Status","type":"string","jsonPath":".status.sync.status"}"#,
    printcolumn = r#"{"name":"Health Status","type":"string","jsonPath":".status.health.status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ApplicationDestination>,

    /// Nullable: `None` means the application is synced manually
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ApplicationDestination {
    /// Cluster name if set, otherwise the API server URL
    pub fn cluster(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.server.as_deref())
            .unwrap_or("")
    }
}

/// `spec.syncPolicy`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    /// Present when Argo CD reconciles automatically
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<SyncPolicyAutomated>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_options: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<Value>,

    /// managedNamespaceMetadata and any fields newer Argo CD versions add
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SyncPolicy {
    /// True when nothing but the automated block carries meaning
    pub fn is_empty_without_automated(&self) -> bool {
        self.sync_options.is_none() && self.retry.is_none() && self.extra.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicyAutomated {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_heal: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_empty: Option<bool>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_state: Option<OperationState>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    #[serde(default)]
    pub phase: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Application {
    /// Whether Argo CD will reconcile this application on its own
    pub fn auto_sync_enabled(&self) -> bool {
        self.spec
            .sync_policy
            .as_ref()
            .is_some_and(|p| p.automated.is_some())
    }

    /// Phase of the last recorded operation, if any
    pub fn operation_phase(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.operation_state.as_ref())
            .map(|o| o.phase.as_str())
    }

    pub fn sync_status(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.sync.as_ref())
            .map(|s| s.status.as_str())
            .unwrap_or("")
    }

    pub fn health_status(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .map(|h| h.status.as_str())
            .unwrap_or("")
    }

    /// Synced revision shortened to 8 characters
    pub fn short_revision(&self) -> &str {
        let revision = self
            .status
            .as_ref()
            .and_then(|s| s.sync.as_ref())
            .and_then(|s| s.revision.as_deref())
            .unwrap_or("");
        match revision.char_indices().nth(8) {
            Some((idx, _)) => &revision[..idx],
            None => revision,
        }
    }

    pub fn cluster(&self) -> &str {
        self.spec
            .destination
            .as_ref()
            .map(ApplicationDestination::cluster)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": {"name": "web", "namespace": "argocd", "resourceVersion": "42"},
            "spec": {
                "project": "default",
                "source": {"repoURL": "https://github.com/example/repo", "path": "k8s"},
                "destination": {"server": "https://kubernetes.default.svc", "namespace": "web"},
                "syncPolicy": {
                    "automated": {"prune": true, "selfHeal": true},
                    "syncOptions": ["CreateNamespace=true"],
                    "managedNamespaceMetadata": {"labels": {"team": "web"}}
                }
            },
            "status": {
                "sync": {"status": "Synced", "revision": "0123456789abcdef"},
                "health": {"status": "Healthy"},
                "operationState": {"phase": "Running", "startedAt": "2024-01-01T00:00:00Z"},
                "reconciledAt": "2024-01-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn test_resource_identity() {
        assert_eq!(Application::group(&()), "argoproj.io");
        assert_eq!(Application::version(&()), "v1alpha1");
        assert_eq!(Application::kind(&()), "Application");
        assert_eq!(Application::plural(&()), "applications");
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let app: Application = serde_json::from_value(sample()).unwrap();
        assert!(app.spec.extra.contains_key("project"));
        assert!(app.spec.extra.contains_key("source"));

        let back = serde_json::to_value(&app).unwrap();
        assert_eq!(back["spec"], sample()["spec"]);
        assert_eq!(back["status"], sample()["status"]);
    }

    #[test]
    fn test_accessors() {
        let app: Application = serde_json::from_value(sample()).unwrap();
        assert!(app.auto_sync_enabled());
        assert_eq!(app.operation_phase(), Some(OPERATION_PHASE_RUNNING));
        assert_eq!(app.sync_status(), "Synced");
        assert_eq!(app.health_status(), "Healthy");
        assert_eq!(app.short_revision(), "01234567");
        assert_eq!(app.cluster(), "https://kubernetes.default.svc");
    }

    #[test]
    fn test_destination_prefers_name() {
        let dest = ApplicationDestination {
            server: Some("https://10.0.0.1".to_string()),
            name: Some("prod".to_string()),
            namespace: None,
        };
        assert_eq!(dest.cluster(), "prod");
    }

    #[test]
    fn test_sync_policy_emptiness() {
        let mut policy = SyncPolicy {
            automated: Some(SyncPolicyAutomated::default()),
            ..Default::default()
        };
        assert!(policy.is_empty_without_automated());

        policy.extra.insert("managedNamespaceMetadata".to_string(), json!({}));
        assert!(!policy.is_empty_without_automated());
    }
}
