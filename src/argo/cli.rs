//! Pass-through to the upstream `argocd` binary
//!
//! The binary matching the server's version is downloaded from the server
//! itself, once per host, and run with IAP credentials injected through
//! its environment.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{Error, Result};
use crate::iap::normalize_host;

/// `(os, arch)` in the naming Argo CD uses for its download artifacts
pub fn platform_arch() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    (os, arch)
}

/// `$HOME/.config/mzcld/bin`
pub fn default_bin_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::ConfigError("could not determine home directory".to_string()))?;
    Ok(home.join(".config").join("mzcld").join("bin"))
}

/// Cache location of the `argocd` binary for `host`
pub fn cached_cli_path(bin_dir: &Path, host: &str) -> PathBuf {
    let sanitized = normalize_host(host).replace(['.', '/'], "-");
    bin_dir.join(format!("{sanitized}-argocd"))
}

/// Candidate download URLs, most common layout first
pub fn download_urls(base: &Url, os: &str, arch: &str) -> Result<Vec<Url>> {
    [format!("download/argocd-{os}-{arch}"), format!("download/argocd-{os}{arch}")]
        .iter()
        .map(|p| {
            base.join(p)
                .map_err(|e| Error::ConfigError(format!("invalid download URL: {e}")))
        })
        .collect()
}

async fn download(http: &reqwest::Client, url: &Url, dest: &Path) -> Result<()> {
    let resp = http.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::ArgoApi {
            status: status.as_u16(),
            message: format!("download failed: {url}"),
        });
    }
    let body = resp.bytes().await?;
    fs::write(dest, &body).map_err(|e| Error::io("write argocd binary", dest, e))
}

/// Return the cached binary for the server at `base`, downloading it if needed
///
/// `http` must already carry the IAP `Proxy-Authorization` header.
#[instrument(skip(http, out))]
pub async fn ensure_cli(
    http: &reqwest::Client,
    base: &Url,
    host: &str,
    bin_dir: &Path,
    out: &mut dyn Write,
) -> Result<PathBuf> {
    let cli_path = cached_cli_path(bin_dir, host);
    if cli_path.exists() {
        debug!("Using cached argocd binary at {}", cli_path.display());
        return Ok(cli_path);
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(bin_dir)
        .map_err(|e| Error::io("create bin directory", bin_dir, e))?;

    let (os, arch) = platform_arch();
    let urls = download_urls(base, os, arch)?;
    writeln!(out, "Downloading ArgoCD CLI for {os}/{arch}...")?;

    let mut last_err = None;
    for url in &urls {
        writeln!(out, "Trying {url}...")?;
        match download(http, url, &cli_path).await {
            Ok(()) => {
                last_err = None;
                break;
            }
            Err(e) => {
                debug!("Download from {} failed: {}", url, e);
                last_err = Some(e);
            }
        }
    }
    if let Some(e) = last_err {
        let _ = fs::remove_file(&cli_path);
        return Err(Error::Command {
            command: "download ArgoCD CLI".to_string(),
            message: format!("tried {} URLs, last error: {e}", urls.len()),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&cli_path, fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io("make executable", &cli_path, e))?;
    }

    writeln!(out, "ArgoCD CLI downloaded to {}", cli_path.display())?;
    Ok(cli_path)
}

/// Environment the `argocd` binary needs to reach `host` through IAP
pub fn cli_env(host: &str, iap_token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("ARGOCD_SERVER", host.to_string()),
        ("ARGOCD_GRPC_WEB", "true".to_string()),
        (
            "ARGOCD_OPTS",
            format!("--header \"Proxy-Authorization: Bearer {iap_token}\""),
        ),
    ]
}

/// Run `cli_path` with inherited stdio; returns the child's exit code
pub async fn run_cli(cli_path: &Path, host: &str, iap_token: &str, args: &[String]) -> Result<i32> {
    info!("Running {} {:?}", cli_path.display(), args);
    let status = Command::new(cli_path)
        .args(args)
        .envs(cli_env(host, iap_token))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| Error::Command {
            command: cli_path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(status.code().unwrap_or(1))
}
