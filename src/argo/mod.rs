//! Argo CD access through IAP
//!
//! REST client, SSO login, `argocd` config handling and the binary
//! pass-through used by `mzcld argo app|login|cli`.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod login;

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::iap::{normalize_host, token_for_host, IapToken};

pub use client::{AppQuery, ArgoClient, SyncRequest};
pub use config::{default_config_path, ArgoConfig};
pub use login::{sso_login, LoginTokens};

/// Host from the flag, or the current context of the argocd config
pub fn resolve_host(host: Option<&str>, config_path: &Path) -> Result<String> {
    match host.filter(|h| !h.is_empty()) {
        Some(host) => Ok(normalize_host(host).to_string()),
        None => ArgoConfig::current_context_at(config_path),
    }
}

/// An IAP token plus a REST client for one Argo CD host
pub struct ArgoSession {
    pub host: String,
    pub iap: IapToken,
    pub client: ArgoClient,
}

impl ArgoSession {
    /// Mint an IAP token for `host` and attach any stored Argo CD session
    pub async fn connect(host: &str, config_path: &Path) -> Result<Self> {
        let iap = token_for_host(host, None).await?;
        let auth_token = ArgoConfig::load_or_default(config_path)?
            .auth_token(host)
            .map(str::to_string);
        if auth_token.is_none() {
            debug!("No stored Argo CD session for {}", host);
        }
        let client = ArgoClient::for_host(host, &iap.token, auth_token.as_deref())?;
        Ok(Self {
            host: host.to_string(),
            iap,
            client,
        })
    }
}
