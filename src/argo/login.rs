//! SSO login against an Argo CD server behind IAP
//!
//! Runs the OAuth2 authorization-code flow with PKCE. The identity
//! provider is whatever the server advertises in `/api/v1/settings`:
//! either an external OIDC issuer or the bundled Dex instance. The browser
//! is sent back to a short-lived local server that hands the code over.

use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::{server_url, ArgoClient};
use crate::error::{Error, Result};

/// The redirect URI names `localhost`, which may resolve to either loopback
/// family, so the callback server listens on both.
pub const CALLBACK_PORT: u16 = 8085;
pub const CALLBACK_PATH: &str = "/auth/callback";
pub const DEX_CLI_CLIENT_ID: &str = "argo-cd-cli";
const DEX_API_PATH: &str = "api/dex";
const DEFAULT_SCOPES: [&str; 5] = ["openid", "profile", "email", "groups", "offline_access"];
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
const STATE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

// -----------------------------------------------------------------------
// Server settings
// -----------------------------------------------------------------------

/// The parts of `/api/v1/settings` that describe SSO
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub url: String,
    pub oidc_config: Option<OidcSettings>,
    pub dex_config: Option<DexSettings>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct OidcSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default, rename = "clientID")]
    pub client_id: String,
    #[serde(default, rename = "cliClientID")]
    pub cli_client_id: String,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DexSettings {
    #[serde(default)]
    pub connectors: Option<Vec<serde_json::Value>>,
}

/// Issuer and client the CLI should authenticate with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidcClient {
    pub issuer: String,
    pub client_id: String,
    pub scopes: Vec<String>,
}

impl Settings {
    /// Pick the external OIDC provider if configured, otherwise Dex
    pub fn oidc_client(&self, host: &str) -> Result<OidcClient> {
        if let Some(oidc) = self.oidc_config.as_ref().filter(|o| !o.issuer.is_empty()) {
            let client_id = if oidc.cli_client_id.is_empty() {
                oidc.client_id.clone()
            } else {
                oidc.cli_client_id.clone()
            };
            let mut scopes = match &oidc.scopes {
                Some(scopes) if !scopes.is_empty() => scopes.clone(),
                _ => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            };
            if !scopes.iter().any(|s| s == "openid") {
                scopes.insert(0, "openid".to_string());
            }
            return Ok(OidcClient {
                issuer: oidc.issuer.clone(),
                client_id,
                scopes,
            });
        }

        if self.dex_config.is_some() {
            let base = if self.url.is_empty() {
                server_url(host)?
            } else {
                Url::parse(&format!("{}/", self.url.trim_end_matches('/')))
                    .map_err(|e| Error::ConfigError(format!("invalid server url {:?}: {e}", self.url)))?
            };
            let issuer = base
                .join(DEX_API_PATH)
                .map_err(|e| Error::ConfigError(e.to_string()))?;
            return Ok(OidcClient {
                issuer: issuer.to_string(),
                client_id: DEX_CLI_CLIENT_ID.to_string(),
                scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            });
        }

        Err(Error::AuthError(
            "ArgoCD server is not configured with SSO/OIDC".to_string(),
        ))
    }
}

// -----------------------------------------------------------------------
// OIDC discovery and token exchange
// -----------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ProviderMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[instrument(skip(http))]
pub async fn discover_provider(http: &reqwest::Client, issuer: &str) -> Result<ProviderMetadata> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );
    let resp = http.get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::AuthError(format!(
            "OIDC discovery at {url} returned HTTP {}",
            resp.status().as_u16()
        )));
    }
    Ok(resp.json().await?)
}

#[derive(Clone, Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Tokens obtained from a completed login
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginTokens {
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// Redeem an authorization code at the provider's token endpoint
#[instrument(skip(http, code, verifier))]
pub async fn exchange_code(
    http: &reqwest::Client,
    token_endpoint: &str,
    client: &OidcClient,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<LoginTokens> {
    let resp = http
        .post(token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client.client_id.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::AuthError(format!(
            "exchange code: HTTP {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }

    let token: TokenResponse = resp.json().await?;
    let id_token = token
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::AuthError("no id_token in response".to_string()))?;
    Ok(LoginTokens {
        id_token,
        refresh_token: token.refresh_token.filter(|t| !t.is_empty()),
    })
}

// -----------------------------------------------------------------------
// PKCE
// -----------------------------------------------------------------------

fn random_string(len: usize, charset: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

#[derive(Clone, Debug)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        Self::from_verifier(random_string(43, VERIFIER_CHARSET))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn state_nonce() -> String {
    random_string(24, STATE_CHARSET)
}

pub fn authorize_url(
    endpoint: &str,
    client: &OidcClient,
    redirect_uri: &str,
    state: &str,
    pkce: &Pkce,
) -> Result<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| Error::AuthError(format!("invalid authorization endpoint {endpoint:?}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &client.scopes.join(" "))
        .append_pair("state", state)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url)
}

// -----------------------------------------------------------------------
// Local callback server
// -----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    error: Option<String>,
    error_description: Option<String>,
    state: Option<String>,
    code: Option<String>,
}

struct CallbackState {
    expected_state: String,
    result: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}

/// Extract the authorization code, rejecting provider errors and bad state
fn validate_callback(params: &CallbackParams, expected_state: &str) -> Result<String> {
    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        return Err(Error::AuthError(format!(
            "{error}: {}",
            params.error_description.as_deref().unwrap_or_default()
        )));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(Error::AuthError("invalid state nonce".to_string()));
    }
    params
        .code
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::AuthError("no code in request".to_string()))
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let outcome = validate_callback(&params, &state.expected_state);
    let response = match &outcome {
        Ok(_) => (
            StatusCode::OK,
            Html(
                "<h1>Authentication successful!</h1>\
                 <p>You can close this window and return to the CLI.</p>"
                    .to_string(),
            ),
        ),
        Err(e) => (StatusCode::BAD_REQUEST, Html(escape_html(&e.to_string()))),
    };

    let sender = state.result.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!("Ignoring repeated callback"),
    }
    response
}

/// One-shot HTTP server receiving the OAuth2 redirect
pub struct CallbackServer {
    addrs: Vec<SocketAddr>,
    result: oneshot::Receiver<Result<String>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CallbackServer {
    /// Listen on `127.0.0.1:port`, plus `[::1]` on the same port when the
    /// host has IPv6 loopback. Port 0 picks a free port.
    pub async fn bind(port: u16, expected_state: String) -> Result<Self> {
        let v4 = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let primary = TcpListener::bind(v4)
            .await
            .map_err(|e| Error::AuthError(format!("start callback server on {v4}: {e}")))?;
        let port = primary
            .local_addr()
            .map_err(|e| Error::AuthError(format!("start callback server: {e}")))?
            .port();

        let mut listeners = vec![primary];
        let v6 = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
        match TcpListener::bind(v6).await {
            Ok(listener) => listeners.push(listener),
            Err(e) => debug!("Not listening on {}: {}", v6, e),
        }

        let (result_tx, result) = oneshot::channel();
        let (shutdown, _) = watch::channel(false);
        let state = Arc::new(CallbackState {
            expected_state,
            result: Mutex::new(Some(result_tx)),
        });

        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let mut addrs = Vec::with_capacity(listeners.len());
        let mut tasks = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let addr = listener
                .local_addr()
                .map_err(|e| Error::AuthError(format!("start callback server: {e}")))?;
            let mut stop = shutdown.subscribe();
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                });
                if let Err(e) = serve.await {
                    warn!("Callback server error on {}: {}", addr, e);
                }
            }));
            debug!("Callback server listening on {}", addr);
            addrs.push(addr);
        }

        Ok(Self {
            addrs,
            result,
            shutdown,
            tasks,
        })
    }

    /// The IPv4 listener's address
    pub fn local_addr(&self) -> SocketAddr {
        self.addrs[0]
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Wait for the browser redirect and return the authorization code
    pub async fn wait(self, timeout: Duration) -> Result<String> {
        let outcome = match tokio::time::timeout(timeout, self.result).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::AuthError("callback server stopped".to_string())),
            Err(_) => Err(Error::AuthError(
                "timed out waiting for the SSO callback".to_string(),
            )),
        };
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        outcome
    }
}

/// Best-effort attempt to open `url` in the default browser
pub async fn open_browser(url: &str) -> bool {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    match tokio::process::Command::new(opener).arg(url).status().await {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("Could not run {}: {}", opener, e);
            false
        }
    }
}

/// Full SSO login through `client`, returning the Argo CD session tokens
pub async fn sso_login(client: &ArgoClient, host: &str, out: &mut dyn Write) -> Result<LoginTokens> {
    info!("Fetching ArgoCD settings");
    let settings = client.settings().await?;
    let oidc = settings.oidc_client(host)?;
    debug!("Using issuer {} with client {}", oidc.issuer, oidc.client_id);

    let provider = discover_provider(client.http(), &oidc.issuer).await?;

    let redirect_uri = format!("http://localhost:{CALLBACK_PORT}{CALLBACK_PATH}");
    let state = state_nonce();
    let pkce = Pkce::generate();
    let auth_url = authorize_url(&provider.authorization_endpoint, &oidc, &redirect_uri, &state, &pkce)?;

    let server = CallbackServer::bind(CALLBACK_PORT, state).await?;

    writeln!(out, "Opening browser for SSO login...")?;
    if !open_browser(auth_url.as_str()).await {
        writeln!(out, "Failed to open browser automatically. Please visit:\n{auth_url}")?;
    }

    let code = server.wait(LOGIN_TIMEOUT).await?;
    exchange_code(
        client.http(),
        &provider.token_endpoint,
        &oidc,
        &code,
        &pkce.verifier,
        &redirect_uri,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oidc_client() -> OidcClient {
        OidcClient {
            issuer: "https://idp.example.com".to_string(),
            client_id: "cli".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
        }
    }

    #[test]
    fn test_settings_prefers_cli_client_id() {
        let settings: Settings = serde_json::from_value(json!({
            "url": "https://argo.example.net",
            "oidcConfig": {
                "name": "Okta",
                "issuer": "https://idp.example.com",
                "clientID": "web",
                "cliClientID": "cli"
            }
        }))
        .unwrap();
        let client = settings.oidc_client("argo.example.net").unwrap();
        assert_eq!(client.issuer, "https://idp.example.com");
        assert_eq!(client.client_id, "cli");
        assert_eq!(client.scopes, DEFAULT_SCOPES.map(String::from).to_vec());
    }

    #[test]
    fn test_settings_falls_back_to_client_id_and_adds_openid() {
        let settings: Settings = serde_json::from_value(json!({
            "oidcConfig": {"issuer": "https://idp", "clientID": "web", "scopes": ["groups"]}
        }))
        .unwrap();
        let client = settings.oidc_client("argo.example.net").unwrap();
        assert_eq!(client.client_id, "web");
        assert_eq!(client.scopes, vec!["openid", "groups"]);
    }

    #[test]
    fn test_settings_uses_dex() {
        let settings: Settings =
            serde_json::from_value(json!({"dexConfig": {"connectors": [{"name": "GitHub"}]}}))
                .unwrap();
        let client = settings.oidc_client("https://argo.example.net").unwrap();
        assert_eq!(client.issuer, "https://argo.example.net/api/dex");
        assert_eq!(client.client_id, DEX_CLI_CLIENT_ID);
    }

    #[test]
    fn test_settings_without_sso() {
        let err = Settings::default().oidc_client("argo").unwrap_err();
        assert!(err.to_string().contains("not configured with SSO"));
    }

    #[test]
    fn test_pkce_shape() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.verifier.len(), 43);
        assert!(pkce.verifier.bytes().all(|b| VERIFIER_CHARSET.contains(&b)));
        assert_eq!(pkce.challenge.len(), 43);
        assert_eq!(state_nonce().len(), 24);
    }

    #[test]
    fn test_pkce_challenge_known_vector() {
        // RFC 7636 appendix B
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_authorize_url_params() {
        let pkce = Pkce::from_verifier("v".repeat(43));
        let url = authorize_url(
            "https://idp.example.com/authorize",
            &oidc_client(),
            "http://localhost:8085/auth/callback",
            "nonce",
            &pkce,
        )
        .unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "cli");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8085/auth/callback");
        assert_eq!(pairs["scope"], "openid email");
        assert_eq!(pairs["state"], "nonce");
        assert_eq!(pairs["code_challenge"], pkce.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
    }

    #[test]
    fn test_validate_callback() {
        let ok = CallbackParams {
            state: Some("s".to_string()),
            code: Some("c".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_callback(&ok, "s").unwrap(), "c");
        assert!(validate_callback(&ok, "other")
            .unwrap_err()
            .to_string()
            .contains("invalid state"));

        let denied = CallbackParams {
            error: Some("access_denied".to_string()),
            error_description: Some("user said no".to_string()),
            ..Default::default()
        };
        assert_eq!(
            validate_callback(&denied, "s").unwrap_err().to_string(),
            "access_denied: user said no"
        );

        let no_code = CallbackParams {
            state: Some("s".to_string()),
            ..Default::default()
        };
        assert!(validate_callback(&no_code, "s").is_err());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\"</b>"), "&lt;b&gt;&#34;x&#34;&lt;/b&gt;");
    }

    #[tokio::test]
    async fn test_callback_server_returns_code() {
        let server = CallbackServer::bind(0, "s".to_string())
            .await
            .unwrap();
        let url = format!("http://{}{CALLBACK_PATH}?state=s&code=abc", server.local_addr());

        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.text().await.unwrap().contains("Authentication successful"));

        assert_eq!(server.wait(Duration::from_secs(5)).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_callback_server_answers_on_both_loopbacks() {
        let server = CallbackServer::bind(0, "s".to_string()).await.unwrap();
        let addrs = server.local_addrs().to_vec();
        assert!(addrs[0].is_ipv4());
        assert!(addrs.iter().all(|a| a.ip().is_loopback() && a.port() == addrs[0].port()));

        // a browser resolving localhost to ::1 lands on the second listener
        let target = addrs.iter().find(|a| a.is_ipv6()).unwrap_or(&addrs[0]);
        let url = format!("http://{target}{CALLBACK_PATH}?state=s&code=v6");
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        assert_eq!(server.wait(Duration::from_secs(5)).await.unwrap(), "v6");
    }

    #[tokio::test]
    async fn test_callback_server_rejects_bad_state() {
        let server = CallbackServer::bind(0, "s".to_string())
            .await
            .unwrap();
        let url = format!("http://{}{CALLBACK_PATH}?state=x&code=abc", server.local_addr());

        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert!(server.wait(Duration::from_secs(5)).await.is_err());
    }

    #[tokio::test]
    async fn test_callback_server_times_out() {
        let server = CallbackServer::bind(0, "s".to_string())
            .await
            .unwrap();
        let err = server.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_discover_provider() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dex/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": "https://argo.example.net/api/dex",
                "authorization_endpoint": "https://argo.example.net/api/dex/auth",
                "token_endpoint": "https://argo.example.net/api/dex/token",
                "jwks_uri": "https://argo.example.net/api/dex/keys"
            })))
            .mount(&mock_server)
            .await;

        let meta = discover_provider(&reqwest::Client::new(), &format!("{}/api/dex/", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(meta.token_endpoint, "https://argo.example.net/api/dex/token");
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .and(body_string_contains("client_id=cli"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "id_token": "idt",
                "refresh_token": "rt",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tokens = exchange_code(
            &reqwest::Client::new(),
            &format!("{}/token", mock_server.uri()),
            &oidc_client(),
            "the-code",
            "the-verifier",
            "http://localhost:8085/auth/callback",
        )
        .await
        .unwrap();
        assert_eq!(
            tokens,
            LoginTokens {
                id_token: "idt".to_string(),
                refresh_token: Some("rt".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_exchange_code_requires_id_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at"})))
            .mount(&mock_server)
            .await;

        let err = exchange_code(
            &reqwest::Client::new(),
            &format!("{}/token", mock_server.uri()),
            &oidc_client(),
            "c",
            "v",
            "http://localhost:8085/auth/callback",
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "no id_token in response");
    }
}
