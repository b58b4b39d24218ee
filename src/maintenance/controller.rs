//! Maintenance run orchestration
//!
//! One invocation runs exactly one of three modes:
//! - `Report` (default): wait for active syncs, write a snapshot, print a
//!   status table. Nothing in the cluster changes.
//! - `Disable`: wait for active syncs, write a snapshot, then remove the
//!   automated block from every matching Application.
//! - `Restore`: re-apply the policies captured in a snapshot.
//!
//! The snapshot is always on disk before the first Application is touched,
//! so any failure part-way through a disable can be undone with a restore.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use kube::ResourceExt;
use tracing::{info, instrument, warn};

use super::detector::{collect_active_syncs, is_active_sync};
use super::policy::{apply_captured_policy, disable_auto_sync};
use super::waiter::{wait_for_active_syncs_clear, WaitOptions, DEFAULT_POLL_INTERVAL};
use crate::crd::Application;
use crate::duration::format_duration;
use crate::error::{Error, Result};
use crate::selector::LabelSelector;
use crate::snapshot::{ensure_writable, Snapshot};
use crate::store::{ApplicationQuery, ApplicationStore};
use crate::table::Table;

pub const DEFAULT_NAMESPACE: &str = "argocd";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaintenanceMode {
    /// Snapshot plus read-only status table
    #[default]
    Report,
    /// Snapshot, then disable automated sync
    Disable,
    /// Re-apply a previously written snapshot
    Restore,
}

impl MaintenanceMode {
    /// Resolve the mutually exclusive `--disable-sync`/`--restore-sync` flags
    pub fn from_flags(disable: bool, restore: bool) -> Result<Self> {
        match (disable, restore) {
            (true, true) => Err(Error::ConfigError(
                "only one of --disable-sync or --restore-sync may be provided".to_string(),
            )),
            (true, false) => Ok(MaintenanceMode::Disable),
            (false, true) => Ok(MaintenanceMode::Restore),
            (false, false) => Ok(MaintenanceMode::Report),
        }
    }
}

/// Everything one maintenance run needs, resolved from flags up front
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    pub namespace: String,
    pub selector: LabelSelector,
    pub state_file: PathBuf,
    pub force: bool,
    pub mode: MaintenanceMode,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Recorded in the snapshot for the operator's benefit
    pub cluster: String,
}

impl MaintenanceConfig {
    pub fn new(namespace: impl Into<String>, state_file: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: LabelSelector::everything(),
            state_file: state_file.into(),
            force: false,
            mode: MaintenanceMode::Report,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cluster: String::new(),
        }
    }

    pub fn query(&self) -> ApplicationQuery {
        ApplicationQuery::new(self.namespace.clone(), self.selector.clone())
    }

    fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaintenanceOutcome {
    /// Nothing matched; treated as a clean no-op
    NoApplications,
    Reported { captured: usize },
    Disabled { captured: usize, changed: usize },
    Restored(RestoreSummary),
}

pub struct MaintenanceController<'a> {
    store: &'a dyn ApplicationStore,
    config: MaintenanceConfig,
}

impl<'a> MaintenanceController<'a> {
    pub fn new(store: &'a dyn ApplicationStore, config: MaintenanceConfig) -> Self {
        Self { store, config }
    }

    /// Run the configured mode, writing progress for the operator to `out`
    #[instrument(skip(self, out), fields(namespace = %self.config.namespace, mode = ?self.config.mode))]
    pub async fn run(&self, out: &mut dyn Write) -> Result<MaintenanceOutcome> {
        let apps = self.list().await?;
        if apps.is_empty() {
            info!("No applications matched");
            writeln!(
                out,
                "No Argo CD Applications found in namespace {:?}",
                self.config.namespace
            )?;
            return Ok(MaintenanceOutcome::NoApplications);
        }

        match self.config.mode {
            MaintenanceMode::Report => {
                let captured = self.snapshot_only(apps, out).await?;
                self.print_status_table(out).await?;
                Ok(MaintenanceOutcome::Reported { captured })
            }
            MaintenanceMode::Disable => {
                let (captured, changed) = self.enable(apps, out).await?;
                Ok(MaintenanceOutcome::Disabled { captured, changed })
            }
            MaintenanceMode::Restore => self.restore(out).await.map(MaintenanceOutcome::Restored),
        }
    }

    async fn list(&self) -> Result<Vec<Application>> {
        self.store.list(&self.config.query()).await
    }

    /// Wait for running syncs to clear; returns the freshest listing
    async fn settle(&self, apps: Vec<Application>, out: &mut dyn Write) -> Result<Vec<Application>> {
        let active = collect_active_syncs(&apps);
        if active.is_empty() {
            return Ok(apps);
        }

        writeln!(
            out,
            "Found {} Applications with active sync operations; waiting for them to complete (timeout: {}):",
            active.len(),
            format_duration(self.config.timeout)
        )?;
        for name in &active {
            writeln!(out, "- {name}")?;
        }

        wait_for_active_syncs_clear(
            self.store,
            &self.config.query(),
            self.config.wait_options(),
            out,
        )
        .await
    }

    fn save_snapshot(&self, apps: &[Application]) -> Result<Snapshot> {
        let snapshot = Snapshot::capture(&self.config.cluster, &self.config.namespace, apps)?;
        snapshot.save(&self.config.state_file, self.config.force)?;
        info!(
            "Saved snapshot of {} applications to {}",
            snapshot.applications.len(),
            self.config.state_file.display()
        );
        Ok(snapshot)
    }

    async fn snapshot_only(&self, apps: Vec<Application>, out: &mut dyn Write) -> Result<usize> {
        ensure_writable(&self.config.state_file, self.config.force)?;
        let apps = self.settle(apps, out).await?;
        let snapshot = self.save_snapshot(&apps)?;

        writeln!(
            out,
            "Saved snapshot for {} applications to {}\n(No changes made to cluster)",
            snapshot.applications.len(),
            self.config.state_file.display()
        )?;
        Ok(snapshot.applications.len())
    }

    async fn print_status_table(&self, out: &mut dyn Write) -> Result<()> {
        let apps = self.list().await?;

        writeln!(
            out,
            "Dry run: listing Argo CD Applications in namespace {:?}\n",
            self.config.namespace
        )?;

        let mut table = Table::new(["NAME", "AUTOSYNC", "ACTIVE_SYNC"]);
        for app in &apps {
            table.row([
                app.name_any(),
                app.auto_sync_enabled().to_string(),
                is_active_sync(app).to_string(),
            ]);
        }
        table.write_to(out)?;
        Ok(())
    }

    async fn enable(&self, apps: Vec<Application>, out: &mut dyn Write) -> Result<(usize, usize)> {
        ensure_writable(&self.config.state_file, self.config.force)?;
        let apps = self.settle(apps, out).await?;

        let snapshot = self.save_snapshot(&apps)?;
        writeln!(
            out,
            "Saved state for {} applications to {}",
            snapshot.applications.len(),
            self.config.state_file.display()
        )?;

        let mut changed = 0;
        for mut app in apps {
            let name = app.name_any();
            if !disable_auto_sync(&mut app) {
                writeln!(out, "- {name}: AutoSync already disabled")?;
                continue;
            }

            self.store.update(&app).await?;
            writeln!(out, "- {name}: AutoSync disabled")?;
            changed += 1;
        }

        writeln!(out, "Maintenance mode enabled. Applications changed: {changed}")?;
        Ok((snapshot.applications.len(), changed))
    }

    async fn restore(&self, out: &mut dyn Write) -> Result<RestoreSummary> {
        let snapshot = Snapshot::load(&self.config.state_file)?;

        // Decode every captured policy before touching the cluster
        let planned = snapshot
            .applications
            .iter()
            .map(|state| state.policy().map(|policy| (state, policy)))
            .collect::<Result<Vec<_>>>()?;

        let mut summary = RestoreSummary::default();
        for (state, policy) in planned {
            let Some(mut app) = self.store.get(&state.namespace, &state.name).await? else {
                warn!("{}/{} no longer exists, skipping", state.namespace, state.name);
                writeln!(out, "- {}/{}: SKIP (not found)", state.namespace, state.name)?;
                summary.skipped += 1;
                continue;
            };

            apply_captured_policy(&mut app, policy);
            self.store.update(&app).await?;

            writeln!(out, "- {}/{} restored", state.namespace, state.name)?;
            summary.restored += 1;
        }

        writeln!(
            out,
            "Restore complete. Restored: {}, skipped: {}",
            summary.restored, summary.skipped
        )?;
        Ok(summary)
    }
}
