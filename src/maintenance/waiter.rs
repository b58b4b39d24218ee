//! Polling until in-flight syncs finish

use std::io::Write;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::detector::collect_active_syncs;
use crate::crd::Application;
use crate::error::{Error, Result};
use crate::store::{ApplicationQuery, ApplicationStore};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Re-list every poll interval until no application has a running sync
///
/// Returns the last listing, which is free of active syncs. The deadline
/// only bounds the waiting between polls: a list call already in flight is
/// allowed to finish, and any list error aborts the wait immediately.
pub async fn wait_for_active_syncs_clear(
    store: &dyn ApplicationStore,
    query: &ApplicationQuery,
    options: WaitOptions,
    out: &mut dyn Write,
) -> Result<Vec<Application>> {
    let deadline = Instant::now() + options.timeout;
    let mut ticker = time::interval_at(Instant::now() + options.poll_interval, options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = time::sleep_until(deadline) => {
                return Err(Error::Timeout { timeout: options.timeout });
            }
            _ = ticker.tick() => {}
        }

        let apps = store.list(query).await.map_err(|e| match e {
            Error::Backend { source, .. } => {
                Error::backend("list applications while waiting for active syncs", source)
            }
            other => other,
        })?;

        let active = collect_active_syncs(&apps);
        if active.is_empty() {
            info!("No active sync operations remain");
            writeln!(out, "No active sync operations remain; proceeding.")?;
            return Ok(apps);
        }
        debug!("Still waiting on {} active syncs: {:?}", active.len(), active);
    }
}
