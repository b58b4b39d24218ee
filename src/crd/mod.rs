//! Argo CD resource types
//!
//! Typed views of the `argoproj.io` objects mzcld reads and replaces.

mod application;

pub use application::{
    Application, ApplicationDestination, ApplicationSpec, ApplicationStatus, HealthStatus,
    OperationState, SyncPolicy, SyncPolicyAutomated, SyncStatus, OPERATION_PHASE_RUNNING,
};
