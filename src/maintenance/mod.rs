//! Argo CD maintenance mode
//!
//! Captures the automated-sync policy of every matching Application to a
//! snapshot file, optionally disables automated sync, and restores the
//! captured policies afterwards.

pub mod controller;
pub mod detector;
pub mod policy;
pub mod waiter;

pub use controller::{
    MaintenanceConfig, MaintenanceController, MaintenanceMode, MaintenanceOutcome,
    RestoreSummary, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT,
};
pub use detector::{collect_active_syncs, is_active_sync};
pub use policy::{apply_captured_policy, disable_auto_sync};
pub use waiter::{wait_for_active_syncs_clear, WaitOptions, DEFAULT_POLL_INTERVAL};
