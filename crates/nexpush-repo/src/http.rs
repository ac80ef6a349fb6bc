//! HTTP client for the repository
//!
//! Executes one blocking request against `<repository url>/<path>` with the
//! resolved proxy and TLS settings. Status codes are returned as-is; the
//! caller decides what they mean.

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use url::Url;

use crate::config::{RepositoryConfig, SslVerifyMode};
use crate::error::{RepoError, Result};
use crate::proxy::{ProxyResolver, ProxySpec};

/// Fixed request timeout, generous enough for large artifacts on slow links
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const CLIENT_USER_AGENT: &str = concat!("nexpush/", env!("CARGO_PKG_VERSION"));

/// Supported request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Uninterpreted server response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Reason phrase for `status`
    pub message: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let message = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            message,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded
    #[cfg(test)]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Client bound to one repository
#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: String,
    ssl_verify_mode: SslVerifyMode,
    proxy: ProxyResolver,
    authorization: Option<String>,
}

impl UploadClient {
    /// Create a client for the repository in `config`
    ///
    /// `ssl_override` takes precedence over the stored TLS mode, which takes
    /// precedence over verifying the peer.
    pub fn new(
        config: &RepositoryConfig,
        ssl_override: Option<SslVerifyMode>,
        proxy: ProxyResolver,
    ) -> Result<Self> {
        let base_url = config.url.clone().ok_or_else(|| RepoError::Configuration {
            message: format!("no URL configured for repository '{}'", config.repo_key),
        })?;

        Ok(Self {
            base_url,
            ssl_verify_mode: ssl_override.or(config.ssl_verify_mode).unwrap_or_default(),
            proxy,
            authorization: None,
        })
    }

    /// Attach this `Authorization` value to every request
    pub fn with_authorization(mut self, authorization: Option<String>) -> Self {
        self.authorization = authorization;
        self
    }

    /// Effective TLS verification mode
    pub fn ssl_verify_mode(&self) -> SslVerifyMode {
        self.ssl_verify_mode
    }

    /// Full URL for a repository-relative path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn build_client(&self, url: &str, proxy: Option<&ProxySpec>) -> Result<Client> {
        let mut builder = Client::builder()
            // We handle redirects ourselves: a 3xx is reported, not followed
            .redirect(reqwest::redirect::Policy::none())
            .timeout(UPLOAD_TIMEOUT)
            // Only the resolver decides about proxies
            .no_proxy();

        if accepts_invalid_certs(url, self.ssl_verify_mode) {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(spec) = proxy {
            let invalid = |e: reqwest::Error| RepoError::InvalidProxy {
                url: spec.address(),
                reason: e.to_string(),
            };
            let mut proxy = reqwest::Proxy::all(spec.address()).map_err(invalid)?;
            if spec.user.is_some() || spec.password.is_some() {
                proxy = proxy.basic_auth(
                    spec.user.as_deref().unwrap_or_default(),
                    spec.password.as_deref().unwrap_or_default(),
                );
            }
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| RepoError::transport(url, e))
    }

    /// Execute one request against `<repository url>/<path>`
    pub fn request(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse> {
        let url = self.url_for(path);
        let proxy = self.proxy.resolve(&url)?;
        let client = self.build_client(&url, proxy.as_ref())?;

        let mut request = client
            .request(method.into(), &url)
            .header(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT))
            .headers(headers);

        if let Some(auth) = &self.authorization {
            let mut value = HeaderValue::from_str(auth.trim()).map_err(|e| {
                RepoError::InvalidCredential {
                    message: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            request = request.header(AUTHORIZATION, value);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        tracing::debug!("{} {}", method.as_str(), url);
        if self.authorization.is_some() {
            tracing::debug!("use authorization");
        } else {
            tracing::debug!("no authorization");
        }
        if let Some(spec) = &proxy {
            tracing::debug!("use proxy at {}:{}", spec.host, spec.port);
        }

        let response = request.send().map_err(|e| RepoError::transport(&url, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .map_err(|e| RepoError::transport(&url, e))?
            .to_vec();

        tracing::debug!("{} {} -> {}", method.as_str(), url, status);

        Ok(RawResponse::new(status.as_u16(), body))
    }
}

/// Certificate checks are skipped only for `https` targets in `None` mode
fn accepts_invalid_certs(url: &str, mode: SslVerifyMode) -> bool {
    mode == SslVerifyMode::None
        && Url::parse(url).is_ok_and(|parsed| parsed.scheme() == "https")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxySetting;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> RepositoryConfig {
        RepositoryConfig {
            url: Some(url.to_string()),
            repo_key: "default".to_string(),
            authorization: None,
            always_prompt: false,
            encrypted: false,
            ssl_verify_mode: None,
        }
    }

    fn direct() -> ProxyResolver {
        ProxyResolver::with_vars(ProxySetting::Unset, Vec::<(String, String)>::new())
    }

    #[test]
    fn test_url_for() {
        let client = UploadClient::new(&config("https://repo.example.com"), None, direct()).unwrap();
        assert_eq!(
            client.url_for("gems/foo-1.0.gem"),
            "https://repo.example.com/gems/foo-1.0.gem"
        );
    }

    #[test]
    fn test_missing_url() {
        let mut cfg = config("https://repo.example.com");
        cfg.url = None;
        assert!(matches!(
            UploadClient::new(&cfg, None, direct()),
            Err(RepoError::Configuration { .. })
        ));
    }

    #[test]
    fn test_ssl_verify_mode_precedence() {
        let mut cfg = config("https://repo.example.com");
        let mode = |cfg: &RepositoryConfig, o| {
            UploadClient::new(cfg, o, direct()).unwrap().ssl_verify_mode()
        };

        assert_eq!(mode(&cfg, None), SslVerifyMode::Peer);

        cfg.ssl_verify_mode = Some(SslVerifyMode::None);
        assert_eq!(mode(&cfg, None), SslVerifyMode::None);
        assert_eq!(mode(&cfg, Some(SslVerifyMode::Peer)), SslVerifyMode::Peer);

        cfg.ssl_verify_mode = Some(SslVerifyMode::Peer);
        assert_eq!(mode(&cfg, Some(SslVerifyMode::None)), SslVerifyMode::None);
    }

    #[test]
    fn test_accepts_invalid_certs() {
        let none = SslVerifyMode::None;
        assert!(accepts_invalid_certs("https://repo.example.com/gems/a.gem", none));
        assert!(accepts_invalid_certs("HTTPS://repo.example.com/gems/a.gem", none));
        assert!(!accepts_invalid_certs("https://repo.example.com/gems/a.gem", SslVerifyMode::Peer));
        assert!(!accepts_invalid_certs("http://repo.example.com/gems/a.gem", none));
        assert!(!accepts_invalid_certs("not a url", none));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_proxy_password_without_user() {
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("proxy-authorization", "Basic OnMzY3JldA=="))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&proxy)
            .await;

        let address = proxy.address().to_string();
        let response = tokio::task::spawn_blocking(move || {
            let resolver = ProxyResolver::with_vars(
                ProxySetting::Url(format!("http://:s3cret@{}", address)),
                Vec::<(String, String)>::new(),
            );
            UploadClient::new(&config("http://repo.example.invalid"), None, resolver)
                .unwrap()
                .request(Method::Get, "gems", HeaderMap::new(), None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(reqwest::Method::from(Method::Get), reqwest::Method::GET);
        assert_eq!(reqwest::Method::from(Method::Post), reqwest::Method::POST);
        assert_eq!(reqwest::Method::from(Method::Put), reqwest::Method::PUT);
        assert_eq!(reqwest::Method::from(Method::Delete), reqwest::Method::DELETE);
        assert_eq!(Method::Put.as_str(), "PUT");
    }

    #[test]
    fn test_raw_response() {
        let created = RawResponse::new(201, "ok");
        assert!(created.is_success());
        assert_eq!(created.message, "Created");
        assert_eq!(created.text(), "ok");

        assert!(!RawResponse::new(302, Vec::new()).is_success());
        assert_eq!(RawResponse::new(500, Vec::new()).message, "Internal Server Error");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/gems/foo-1.0.gem"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_bytes(b"gem-bytes".to_vec()))
            .respond_with(ResponseTemplate::new(201).set_body_string("stored"))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let response = tokio::task::spawn_blocking(move || {
            let client = UploadClient::new(&config(&uri), None, direct())
                .unwrap()
                .with_authorization(Some("  Basic dXNlcjpwYXNz\n".to_string()));

            let mut headers = HeaderMap::new();
            headers.insert(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            client.request(Method::Put, "gems/foo-1.0.gem", headers, Some(b"gem-bytes".to_vec()))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.message, "Created");
        assert_eq!(response.text(), "stored");

        let requests = server.received_requests().await.unwrap();
        let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
        assert!(agent.starts_with("nexpush/"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_authorization_header_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let uri = server.uri();
        tokio::task::spawn_blocking(move || {
            UploadClient::new(&config(&uri), None, direct())
                .unwrap()
                .request(Method::Get, "gems", HeaderMap::new(), None)
        })
        .await
        .unwrap()
        .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_status_is_not_interpreted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .mount(&server)
            .await;

        let uri = server.uri();
        let (deleted, posted) = tokio::task::spawn_blocking(move || {
            let client = UploadClient::new(&config(&uri), None, direct()).unwrap();
            (
                client.request(Method::Delete, "gems/a.gem", HeaderMap::new(), None),
                client.request(Method::Post, "gems", HeaderMap::new(), None),
            )
        })
        .await
        .unwrap();

        let deleted = deleted.unwrap();
        assert_eq!(deleted.status, 500);
        assert_eq!(deleted.text(), "boom");

        // redirects are returned, not followed
        assert_eq!(posted.unwrap().status, 302);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_through_proxy() {
        // the mock server plays the proxy: it receives the absolute-form request
        let proxy = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/gems/a.gem"))
            .and(header("proxy-authorization", "Basic YWxpY2U6czNjcmV0"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&proxy)
            .await;

        let address = proxy.address().to_string();
        let response = tokio::task::spawn_blocking(move || {
            let resolver = ProxyResolver::with_vars(
                ProxySetting::Url(format!("http://alice:s3cret@{}", address)),
                Vec::<(String, String)>::new(),
            );
            UploadClient::new(&config("http://repo.example.invalid"), None, resolver)
                .unwrap()
                .request(Method::Put, "gems/a.gem", HeaderMap::new(), Some(b"x".to_vec()))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status, 201);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_proxy_host_goes_direct() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let response = tokio::task::spawn_blocking(move || {
            // the configured proxy does not exist; using it would fail
            let resolver = ProxyResolver::with_vars(
                ProxySetting::Unset,
                [
                    ("no_proxy", "127.0.0.1"),
                    ("http_proxy", "http://127.0.0.1:9"),
                ],
            );
            UploadClient::new(&config(&uri), None, resolver)
                .unwrap()
                .request(Method::Put, "gems/a.gem", HeaderMap::new(), Some(b"x".to_vec()))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status, 201);
    }

    #[test]
    fn test_connection_failure_is_transport_error() {
        let client = UploadClient::new(&config("http://127.0.0.1:9"), None, direct()).unwrap();
        let result = client.request(Method::Get, "gems", HeaderMap::new(), None);
        assert!(matches!(result, Err(RepoError::Transport { .. })));
    }
}
