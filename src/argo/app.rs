//! `mzcld argo app` operations

use std::io::Write;

use kube::ResourceExt;
use tracing::info;

use super::client::{AppQuery, ArgoClient, SyncRequest};
use crate::crd::Application;
use crate::error::{Error, Result};
use crate::table::Table;

/// Print applications as `NAME NAMESPACE CLUSTER SYNC HEALTH REVISION`
pub fn write_app_table(apps: &[Application], out: &mut dyn Write) -> Result<()> {
    let mut table = Table::new(["NAME", "NAMESPACE", "CLUSTER", "SYNC", "HEALTH", "REVISION"]);
    for app in apps {
        table.row([
            app.name_any(),
            app.namespace().unwrap_or_default(),
            app.cluster().to_string(),
            app.sync_status().to_string(),
            app.health_status().to_string(),
            app.short_revision().to_string(),
        ]);
    }
    table.write_to(out)?;
    Ok(())
}

pub async fn list(client: &ArgoClient, query: &AppQuery, out: &mut dyn Write) -> Result<usize> {
    let apps = client.list_applications(query).await?;
    info!("Listed {} applications", apps.len());
    write_app_table(&apps, out)?;
    Ok(apps.len())
}

pub async fn sync(
    client: &ArgoClient,
    name: &str,
    request: &SyncRequest,
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(out, "Syncing application {name}...")?;
    client.sync(name, request).await?;
    writeln!(out, "Sync initiated successfully")?;
    Ok(())
}

pub async fn rollback(client: &ArgoClient, name: &str, id: i64, out: &mut dyn Write) -> Result<()> {
    if id == 0 {
        return Err(Error::ConfigError("--id is required".to_string()));
    }
    writeln!(out, "Rolling back application {name} to deployment {id}...")?;
    client.rollback(name, id).await?;
    writeln!(out, "Rollback initiated successfully")?;
    Ok(())
}
