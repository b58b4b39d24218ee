//! mzcld: operations CLI for IAP-protected Argo CD control planes
//!
//! The core of this crate is the Argo CD maintenance flow in
//! [`maintenance`]: snapshot the sync policy of every Application, wait
//! for in-flight syncs, disable automated sync, and later restore it from
//! the snapshot. The [`iap`] and [`argo`] modules back the companion
//! commands for reaching an Argo CD server that sits behind Google's
//! Identity-Aware Proxy.

pub mod argo;
pub mod crd;
pub mod duration;
pub mod error;
pub mod iap;
pub mod maintenance;
pub mod selector;
pub mod snapshot;
pub mod store;
pub mod table;

pub use crate::error::{Error, Result};
