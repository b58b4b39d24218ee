//! Argo CD REST API client
//!
//! Every request carries the IAP token in `Proxy-Authorization` and, once
//! logged in, the Argo CD session token in `Authorization`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, PROXY_AUTHORIZATION};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::login::Settings;
use crate::crd::Application;
use crate::error::{Error, Result};
use crate::iap::normalize_host;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Filters for listing applications; `None` fields are not sent
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppQuery {
    pub namespace: Option<String>,
    pub selector: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub prune: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Serialize)]
struct RollbackRequest<'a> {
    name: &'a str,
    id: i64,
}

#[derive(Deserialize)]
struct ApplicationList {
    #[serde(default)]
    items: Option<Vec<Application>>,
}

#[derive(Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone, Debug)]
pub struct ArgoClient {
    http: Client,
    base: Url,
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::AuthError(format!("invalid token: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Base URL of the Argo CD server at `host`
pub fn server_url(host: &str) -> Result<Url> {
    Url::parse(&format!("https://{}/", normalize_host(host)))
        .map_err(|e| Error::ConfigError(format!("invalid Argo CD host {host:?}: {e}")))
}

/// HTTP client that authenticates every request against IAP
pub fn iap_http_client(iap_token: &str, auth_token: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(PROXY_AUTHORIZATION, bearer(iap_token)?);
    if let Some(token) = auth_token {
        headers.insert(AUTHORIZATION, bearer(token)?);
    }
    Ok(Client::builder()
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

impl ArgoClient {
    pub fn new(base: Url, iap_token: &str, auth_token: Option<&str>) -> Result<Self> {
        Ok(Self {
            http: iap_http_client(iap_token, auth_token)?,
            base,
        })
    }

    pub fn for_host(host: &str, iap_token: &str, auth_token: Option<&str>) -> Result<Self> {
        Self::new(server_url(host)?, iap_token, auth_token)
    }

    /// The underlying IAP-authenticated client
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::ConfigError(format!("invalid API path {path:?}: {e}")))
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let parsed: ApiError = serde_json::from_str(&body).unwrap_or_default();
        let message = [parsed.message, parsed.error]
            .into_iter()
            .find(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().to_string());
        Err(Error::ArgoApi {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn post_json<B: Serialize>(&self, url: Url, body: &B) -> Result<()> {
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_applications(&self, query: &AppQuery) -> Result<Vec<Application>> {
        let mut url = self.url("api/v1/applications")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(ns) = &query.namespace {
                pairs.append_pair("appNamespace", ns);
            }
            if let Some(selector) = query.selector.as_deref().filter(|s| !s.is_empty()) {
                pairs.append_pair("selector", selector);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let list: ApplicationList = self.get_json(url).await?;
        Ok(list.items.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn sync(&self, name: &str, request: &SyncRequest) -> Result<()> {
        let url = self.url(&format!("api/v1/applications/{name}/sync"))?;
        self.post_json(url, request).await
    }

    #[instrument(skip(self))]
    pub async fn rollback(&self, name: &str, id: i64) -> Result<()> {
        let url = self.url(&format!("api/v1/applications/{name}/rollback"))?;
        self.post_json(url, &RollbackRequest { name, id }).await
    }

    #[instrument(skip(self))]
    pub async fn settings(&self) -> Result<Settings> {
        self.get_json(self.url("api/v1/settings")?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    async fn client(server: &MockServer) -> ArgoClient {
        ArgoClient::new(Url::parse(&server.uri()).unwrap(), "iap", Some("argo")).unwrap()
    }

    #[test]
    fn test_server_url_normalizes_host() {
        assert_eq!(
            server_url("https://argo.example.net").unwrap().as_str(),
            "https://argo.example.net/"
        );
    }

    #[tokio::test]
    async fn test_list_sends_both_tokens_and_filters() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/applications"))
            .and(header("proxy-authorization", "Bearer iap"))
            .and(header("authorization", "Bearer argo"))
            .and(query_param("appNamespace", "team"))
            .and(query_param("selector", "env=prod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {},
                "items": [{
                    "metadata": {"name": "web", "namespace": "team"},
                    "spec": {"destination": {"name": "prod"}, "project": "default"},
                    "status": {"sync": {"status": "Synced", "revision": "0123456789abcdef"}}
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let apps = client(&mock_server)
            .await
            .list_applications(&AppQuery {
                namespace: Some("team".to_string()),
                selector: Some("env=prod".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].short_revision(), "01234567");
        assert_eq!(apps[0].cluster(), "prod");
    }

    #[tokio::test]
    async fn test_list_omits_unset_filters() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/applications"))
            .respond_with(|req: &Request| {
                assert_eq!(req.url.query(), None);
                ResponseTemplate::new(200).set_body_json(json!({"items": null}))
            })
            .mount(&mock_server)
            .await;

        let apps = client(&mock_server)
            .await
            .list_applications(&AppQuery::default())
            .await
            .unwrap();
        assert!(apps.is_empty());
    }

    #[tokio::test]
    async fn test_sync_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/applications/web/sync"))
            .and(body_json(json!({"prune": true, "dryRun": false, "revision": "main"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server)
            .await
            .sync(
                "web",
                &SyncRequest {
                    prune: true,
                    dry_run: false,
                    revision: Some("main".to_string()),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rollback_reports_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/applications/web/rollback"))
            .and(body_json(json!({"name": "web", "id": 3})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "application history id 3 not found",
                "code": 3,
                "message": "application history id 3 not found"
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).await.rollback("web", 3).await.unwrap_err();
        assert!(matches!(err, Error::ArgoApi { status: 400, .. }));
        assert!(err.to_string().contains("history id 3 not found"));
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid IAP credentials"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .await
            .list_applications(&AppQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Argo CD API returned 401: Invalid IAP credentials");
    }
}
