//! Mutations of `spec.syncPolicy`

use crate::crd::{Application, SyncPolicy};

/// Remove the automated block; returns false when it was already absent
///
/// A policy left with nothing but defaults is dropped entirely so no empty
/// `syncPolicy: {}` remains on the object.
pub fn disable_auto_sync(app: &mut Application) -> bool {
    let Some(policy) = app.spec.sync_policy.as_mut() else {
        return false;
    };
    if policy.automated.take().is_none() {
        return false;
    }
    if policy.is_empty_without_automated() {
        app.spec.sync_policy = None;
    }
    true
}

/// Replace the live policy with a captured one; `None` clears it
pub fn apply_captured_policy(app: &mut Application, policy: Option<SyncPolicy>) {
    app.spec.sync_policy = policy;
}
