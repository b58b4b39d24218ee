//! Identity-Aware Proxy tokens
//!
//! Argo CD control planes sit behind Google's IAP. Every request to them
//! needs `Proxy-Authorization: Bearer <id token>` where the ID token's
//! audience is the IAP OAuth client id of the host.

pub mod claims;
pub mod discover;
pub mod token;

use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::error::Result;

pub use claims::{write_debug, TokenClaims};
pub use discover::{discover_client_id, discover_client_id_at, normalize_host};
pub use token::{default_service_account, generate_id_token, generate_token};

/// How `mzcld iap` prints the token
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The bare token
    #[default]
    Raw,
    /// `export IAP_TOKEN=<token>`
    Export,
    /// `{token, host, client_id}`
    Json,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct IapToken {
    pub token: String,
    pub host: String,
    pub client_id: String,
}

impl IapToken {
    pub fn write(&self, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
        match format {
            OutputFormat::Raw => writeln!(out, "{}", self.token)?,
            OutputFormat::Export => writeln!(out, "export IAP_TOKEN={}", self.token)?,
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(self)?)?,
        }
        Ok(())
    }
}

/// Discover the client id of `host` and mint a token for it
///
/// Falls back to the service account mapped from the host name when none
/// is given.
pub async fn token_for_host(host: &str, service_account: Option<&str>) -> Result<IapToken> {
    info!("Discovering IAP client ID from {}", host);
    let client_id = discover_client_id(host).await?;
    info!("Discovered client ID: {}", client_id);

    let service_account = service_account.unwrap_or_else(|| default_service_account(host));
    info!("Impersonating service account: {}", service_account);
    let token = generate_token(&client_id, service_account).await?;

    Ok(IapToken {
        token,
        host: host.to_string(),
        client_id,
    })
}
