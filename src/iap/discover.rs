//! OAuth client id discovery for IAP-protected hosts
//!
//! IAP answers an unauthenticated request with a redirect to Google's
//! authorization endpoint, and that redirect carries the OAuth client id
//! the ID token must be minted for.

use std::time::Duration;

use reqwest::{redirect, Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Error, Result};

const CLIENT_ID_SUFFIX: &str = ".apps.googleusercontent.com";
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Strip a leading `https://` or `http://` from a host
pub fn normalize_host(host: &str) -> &str {
    let host = host.strip_prefix("https://").unwrap_or(host);
    host.strip_prefix("http://").unwrap_or(host)
}

/// Discover the IAP client id of `host` over HTTPS
pub async fn discover_client_id(host: &str) -> Result<String> {
    let url = format!("https://{}/", normalize_host(host));
    discover_client_id_at(&url).await
}

/// Discover the IAP client id by probing `url` without following redirects
#[instrument]
pub async fn discover_client_id_at(url: &str) -> Result<String> {
    let client = Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(DISCOVERY_TIMEOUT)
        .build()?;

    let resp = client.get(url).send().await?;
    let status = resp.status();
    debug!("IAP probe returned {}", status);

    if status == StatusCode::FOUND || status == StatusCode::MOVED_PERMANENTLY {
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if location.is_empty() {
            return Err(Error::AuthError(
                "redirect response but no Location header".to_string(),
            ));
        }
        return client_id_from_location(&location).ok_or_else(|| {
            Error::AuthError(format!("redirect found but no client_id in URL: {location}"))
        });
    }

    if let Ok(body) = resp.text().await {
        if let Some(client_id) = client_id_from_html(&body) {
            return Ok(client_id);
        }
    }

    Err(Error::AuthError(format!(
        "could not discover IAP client ID from {url} (status: {})\n\
         Make sure the hostname is correct and protected by IAP",
        status.as_u16()
    )))
}

/// `client_id` query parameter of a redirect target, if it looks like one
fn client_id_from_location(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "client_id")
        .map(|(_, v)| v.into_owned())
        .filter(|id| id.ends_with(CLIENT_ID_SUFFIX))
}

/// First client id embedded in an IAP error page
///
/// The id is delimited on the left by a quote, `=` or a space.
fn client_id_from_html(html: &str) -> Option<String> {
    let end = html.find(CLIENT_ID_SUFFIX)? + CLIENT_ID_SUFFIX.len();
    let head = &html[..end - CLIENT_ID_SUFFIX.len()];
    let start = head.rfind(['"', '\'', '=', ' '])? + 1;
    let candidate = &html[start..end];
    (candidate.contains('-') && candidate.len() > 20).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CLIENT_ID: &str = "1234567890-abcdefghijklmnop.apps.googleusercontent.com";

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("https://argo.example.net"), "argo.example.net");
        assert_eq!(normalize_host("http://argo.example.net"), "argo.example.net");
        assert_eq!(normalize_host("argo.example.net"), "argo.example.net");
    }

    #[test]
    fn test_client_id_from_location() {
        let location = format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={CLIENT_ID}&response_type=code"
        );
        assert_eq!(client_id_from_location(&location).as_deref(), Some(CLIENT_ID));
        assert_eq!(
            client_id_from_location("https://accounts.google.com/auth?client_id=bogus"),
            None
        );
    }

    #[test]
    fn test_client_id_from_html() {
        let html = format!(r#"<div data-client="{CLIENT_ID}">denied</div>"#);
        assert_eq!(client_id_from_html(&html).as_deref(), Some(CLIENT_ID));

        // client ids always carry a project-number prefix
        assert_eq!(client_id_from_html(r#"x="abc.apps.googleusercontent.com""#), None);
        assert_eq!(client_id_from_html("<html>no id here</html>"), None);
    }

    #[tokio::test]
    async fn test_discover_from_redirect() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                format!("https://accounts.google.com/o/oauth2/v2/auth?client_id={CLIENT_ID}&scope=openid")
                    .as_str(),
            ))
            .mount(&mock_server)
            .await;

        let id = discover_client_id_at(&format!("{}/", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(id, CLIENT_ID);
    }

    #[tokio::test]
    async fn test_discover_from_error_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(format!("<script>var id='{CLIENT_ID}';</script>")),
            )
            .mount(&mock_server)
            .await;

        let id = discover_client_id_at(&mock_server.uri()).await.unwrap();
        assert_eq!(id, CLIENT_ID);
    }

    #[tokio::test]
    async fn test_discover_redirect_without_client_id() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "https://example.com/login"),
            )
            .mount(&mock_server)
            .await;

        let err = discover_client_id_at(&mock_server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("no client_id"));
    }

    #[tokio::test]
    async fn test_discover_unprotected_host() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock_server)
            .await;

        let err = discover_client_id_at(&mock_server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("status: 200"));
    }
}
