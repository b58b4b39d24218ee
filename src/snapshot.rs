//! Persisted sync-policy snapshots
//!
//! A snapshot is written once per maintenance run and consumed whole by a
//! later restore. `syncPolicy: null` records that the application had no
//! policy at all, which is different from an empty policy object.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::crd::{Application, SyncPolicy};
use crate::error::{Error, Result};

/// Captured policy of one application
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSyncState {
    pub name: String,
    pub namespace: String,
    /// `None` serializes as `null`: the application had no syncPolicy
    #[serde(default)]
    pub sync_policy: Option<Value>,
}

impl ApplicationSyncState {
    /// Capture the current policy of `app` verbatim
    pub fn capture(app: &Application) -> Result<Self> {
        let sync_policy = app
            .spec
            .sync_policy
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        Ok(Self {
            name: app.name_any(),
            namespace: app.namespace().unwrap_or_default(),
            sync_policy,
        })
    }

    /// Decode the captured policy; `Ok(None)` means "clear the live policy"
    pub fn policy(&self) -> Result<Option<SyncPolicy>> {
        match &self.sync_policy {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|source| Error::PolicyCorrupt {
                    app: self.name.clone(),
                    source,
                }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Kubeconfig context the snapshot was taken from; informational only
    #[serde(default)]
    pub cluster: String,
    pub namespace: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub applications: Vec<ApplicationSyncState>,
}

impl Snapshot {
    /// Build a snapshot of `apps` stamped with the current time
    pub fn capture(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        apps: &[Application],
    ) -> Result<Self> {
        let applications = apps
            .iter()
            .map(ApplicationSyncState::capture)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            saved_at: Utc::now(),
            applications,
        })
    }

    /// Read and parse a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::io("read snapshot", path, e))?;
        serde_json::from_slice(&data).map_err(|source| Error::SnapshotCorrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the snapshot, refusing to replace an existing file unless `force`
    ///
    /// The document goes to a sibling temp file first and is renamed into
    /// place, so readers never see a partial write.
    pub fn save(&self, path: &Path, force: bool) -> Result<()> {
        ensure_writable(path, force)?;

        let data = serde_json::to_vec_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_state_dir(parent)?;
        }

        let tmp = temp_path(path);
        let written = write_private(&tmp, &data).and_then(|()| {
            fs::rename(&tmp, path).map_err(|e| Error::io("write snapshot", path, e))
        });
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        debug!(
            "Wrote snapshot of {} applications to {}",
            self.applications.len(),
            path.display()
        );
        Ok(())
    }
}

/// Fail with [`Error::SnapshotExists`] when `path` exists and `force` is unset
pub fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Err(Error::SnapshotExists {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// `$HOME/.local/state/mzcld/argo-maintenance/<namespace>-snapshot.json`
pub fn default_state_path(namespace: &str) -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::ConfigError("could not determine home directory".to_string()))?;
    Ok(state_path_in(&home, namespace))
}

pub fn state_path_in(home: &Path, namespace: &str) -> PathBuf {
    home.join(".local")
        .join("state")
        .join("mzcld")
        .join("argo-maintenance")
        .join(format!("{namespace}-snapshot.json"))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

fn create_state_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(dir)
        .map_err(|e| Error::io("create state directory", dir, e))
}

fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| Error::io("write snapshot", path, e))?;
    file.write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(|e| Error::io("write snapshot", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SyncPolicyAutomated;
    use crate::store::memory::app;
    use serde_json::json;

    fn automated() -> SyncPolicy {
        SyncPolicy {
            automated: Some(SyncPolicyAutomated {
                prune: Some(true),
                self_heal: Some(true),
                ..Default::default()
            }),
            sync_options: Some(vec!["CreateNamespace=true".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn test_capture_distinguishes_absent_policy() {
        let snap = Snapshot::capture(
            "",
            "argocd",
            &[app("a", Some(automated()), None), app("b", None, None)],
        )
        .unwrap();

        let doc = serde_json::to_value(&snap).unwrap();
        assert_eq!(doc["applications"][0]["name"], "a");
        assert_eq!(
            doc["applications"][0]["syncPolicy"]["automated"]["selfHeal"],
            json!(true)
        );
        assert_eq!(doc["applications"][1]["syncPolicy"], Value::Null);
        assert!(doc["savedAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_empty_policy_is_not_null() {
        let state = ApplicationSyncState::capture(&app("a", Some(SyncPolicy::default()), None))
            .unwrap();
        assert_eq!(state.sync_policy, Some(json!({})));
        assert_eq!(state.policy().unwrap(), Some(SyncPolicy::default()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("argocd-snapshot.json");
        let snap = Snapshot::capture("prod", "argocd", &[app("a", Some(automated()), None)])
            .unwrap();

        snap.save(&path, false).unwrap();
        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded, snap);
        assert_eq!(loaded.applications[0].policy().unwrap(), Some(automated()));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        Snapshot::capture("", "argocd", &[]).unwrap().save(&path, false).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        fs::write(&path, b"original").unwrap();

        let snap = Snapshot::capture("", "argocd", &[app("a", None, None)]).unwrap();
        let err = snap.save(&path, false).unwrap_err();
        assert!(matches!(err, Error::SnapshotExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"original");

        snap.save(&path, true).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snap);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_removes_temp_file() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        let tmp = temp_path(&path);
        // every write to /dev/full fails with ENOSPC
        std::os::unix::fs::symlink("/dev/full", &tmp).unwrap();

        let snapshot = Snapshot::capture("", "argocd", &[app("a", Some(automated()), None)]).unwrap();
        let err = snapshot.save(&path, false).unwrap_err();

        assert!(matches!(err, Error::Io { .. }), "{err}");
        assert!(tmp.symlink_metadata().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        let snapshot = Snapshot::capture("", "argocd", &[app("a", Some(automated()), None)]).unwrap();
        let err = snapshot.save(&path, true).unwrap_err();

        assert!(matches!(err, Error::Io { .. }), "{err}");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            Snapshot::load(&path).unwrap_err(),
            Error::SnapshotCorrupt { .. }
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Snapshot::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_cluster_defaults_when_absent() {
        let doc = json!({
            "namespace": "argocd",
            "savedAt": "2024-05-01T12:00:00Z",
            "applications": [{"name": "a", "namespace": "argocd", "syncPolicy": null}]
        });
        let snap: Snapshot = serde_json::from_value(doc).unwrap();
        assert_eq!(snap.cluster, "");
        assert_eq!(snap.applications[0].policy().unwrap(), None);
    }

    #[test]
    fn test_corrupt_policy_blob() {
        let state = ApplicationSyncState {
            name: "a".to_string(),
            namespace: "argocd".to_string(),
            sync_policy: Some(json!({"syncOptions": "not-a-list"})),
        };
        assert!(matches!(
            state.policy().unwrap_err(),
            Error::PolicyCorrupt { .. }
        ));
    }

    #[test]
    fn test_default_path_layout() {
        let path = state_path_in(Path::new("/home/ops"), "argocd");
        assert_eq!(
            path,
            PathBuf::from("/home/ops/.local/state/mzcld/argo-maintenance/argocd-snapshot.json")
        );
    }
}
