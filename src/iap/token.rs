//! ID tokens minted by impersonating a service account
//!
//! The operator's own gcloud credentials are exchanged for an ID token of
//! the target service account through the IAM Credentials API. IAP accepts
//! that token when its audience is the IAP OAuth client id.

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

pub const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";

const SANDBOX_SA: &str = "argocd-sandbox@moz-fx-platform-mgmt-global.iam.gserviceaccount.com";
const WEBSERVICES_SA: &str =
    "argocd-webservices@moz-fx-platform-mgmt-global.iam.gserviceaccount.com";
const DATASERVICES_SA: &str =
    "argocd-dataservices@moz-fx-platform-mgmt-global.iam.gserviceaccount.com";

/// Service account to impersonate for a given Argo CD host
pub fn default_service_account(host: &str) -> &'static str {
    if host.contains("sandbox") {
        SANDBOX_SA
    } else if host.contains("webservices") || host.contains("web") {
        WEBSERVICES_SA
    } else if host.contains("dataservices") || host.contains("data") {
        DATASERVICES_SA
    } else {
        SANDBOX_SA
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenRequest<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Deserialize)]
struct GenerateIdTokenResponse {
    #[serde(default)]
    token: String,
}

/// Access token of the active gcloud account
#[instrument]
pub async fn gcloud_access_token() -> Result<String> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| Error::Command {
            command: "gcloud auth print-access-token".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::Command {
            command: "gcloud auth print-access-token".to_string(),
            message: format!(
                "{}\nMake sure you're authenticated: gcloud auth login",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::AuthError("gcloud returned an empty access token".to_string()));
    }
    Ok(token)
}

/// Ask the IAM Credentials API at `base_url` for an ID token of `service_account`
#[instrument(skip(http, access_token))]
pub async fn generate_id_token(
    http: &reqwest::Client,
    base_url: &str,
    access_token: &str,
    service_account: &str,
    audience: &str,
) -> Result<String> {
    let url = format!(
        "{}/v1/projects/-/serviceAccounts/{}:generateIdToken",
        base_url.trim_end_matches('/'),
        service_account
    );
    debug!("Requesting ID token from {}", url);

    let resp = http
        .post(&url)
        .bearer_auth(access_token)
        .json(&GenerateIdTokenRequest {
            audience,
            include_email: true,
        })
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::AuthError(format!(
            "impersonate {service_account}: HTTP {}: {}\n\n\
             Make sure:\n\
             1. You're authenticated: gcloud auth login\n\
             2. You have roles/iam.serviceAccountTokenCreator on {service_account}",
            status.as_u16(),
            body.trim()
        )));
    }

    let body: GenerateIdTokenResponse = resp.json().await?;
    if body.token.is_empty() {
        return Err(Error::AuthError("received empty token".to_string()));
    }
    Ok(body.token)
}

/// Mint an IAP token for `audience` using the local gcloud login
pub async fn generate_token(audience: &str, service_account: &str) -> Result<String> {
    let access_token = gcloud_access_token().await?;
    generate_id_token(
        &reqwest::Client::new(),
        IAM_CREDENTIALS_URL,
        &access_token,
        service_account,
        audience,
    )
    .await
}
