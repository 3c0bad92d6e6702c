//! Fetch relay: outbound retrieval of proxied pages and assets.
//!
//! The relay opens the upstream response first (status and headers only) so
//! the orchestrator can decide between passthrough and rewriting before the
//! body is read. Every failure collapses into one [`FetchError`].

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{CONTENT_TYPE, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue};
use reqwest::Client;
use url::Url;

/// Content type assumed when the upstream response omits one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Response headers that stop a page from rendering inside an iframe.
pub const EMBED_BLOCKING_HEADERS: &[&str] = &[
    "x-frame-options",
    "content-security-policy",
    "content-security-policy-report-only",
];

/// Upstream headers that describe the connection or the original encoding
/// and must not be replayed on our response.
const UNFORWARDED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "content-encoding",
    "set-cookie",
    "strict-transport-security",
    "alt-svc",
];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("upstream did not respond in time")]
    Timeout,

    #[error("upstream responded with status {status}")]
    Upstream { status: u16 },

    #[error("failed to read upstream body: {0}")]
    Body(String),

    #[error("{0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

/// Parse a proxy target, accepting only `http` and `https` URLs.
pub fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Remove the headers listed in [`EMBED_BLOCKING_HEADERS`].
pub fn strip_embedding_headers(headers: &mut HeaderMap) {
    for name in EMBED_BLOCKING_HEADERS {
        headers.remove(*name);
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Shared outbound HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FetchRelay {
    client: Client,
}

impl FetchRelay {
    /// Build a relay whose requests (including the body read) are bounded by
    /// `timeout` and carry `user_agent`. Redirects are followed.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Issue the GET and return once status and headers are in.
    ///
    /// Non-2xx statuses are errors.
    pub async fn open(&self, target: &str) -> Result<UpstreamResponse, FetchError> {
        let url = parse_target(target)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        Ok(UpstreamResponse { inner: response })
    }
}

/// An upstream response whose body has not been read yet.
#[derive(Debug)]
pub struct UpstreamResponse {
    inner: reqwest::Response,
}

impl UpstreamResponse {
    /// Upstream content type, or [`DEFAULT_CONTENT_TYPE`] when absent.
    pub fn content_type(&self) -> HeaderValue {
        self.inner
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
    }

    /// Whether the body is an HTML document that should be rewritten.
    pub fn is_html(&self) -> bool {
        let content_type = self.content_type();
        let essence = media_type(&content_type);
        essence == "text/html" || essence == "application/xhtml+xml"
    }

    /// URL the response was served from, after redirects.
    pub fn final_url(&self) -> &Url {
        self.inner.url()
    }

    /// Upstream headers safe to replay to the browser.
    ///
    /// Connection-level headers and the embedding-blocking headers are
    /// dropped; cross-origin headers are dropped because the proxy serves the
    /// resource from its own origin.
    pub fn forwarded_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in self.inner.headers() {
            let name_str = name.as_str();
            if UNFORWARDED_HEADERS.contains(&name_str) || name_str.starts_with("access-control-")
            {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        strip_embedding_headers(&mut headers);
        headers.insert(CONTENT_TYPE, self.content_type());
        headers
    }

    /// Read the raw body.
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        Ok(self.inner.bytes().await?)
    }

    /// Read the body as text, decoded from the declared charset.
    pub async fn text(self) -> Result<String, FetchError> {
        Ok(self.inner.text().await?)
    }
}

/// Lower-cased media type without parameters.
pub fn media_type(content_type: &HeaderValue) -> String {
    content_type
        .to_str()
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Content type for an HTML body that was decoded and re-serialized as
/// UTF-8. Already-UTF-8 values are returned unchanged.
pub fn utf8_html_content_type(content_type: &HeaderValue) -> HeaderValue {
    let declares_utf8 = content_type
        .to_str()
        .map(|v| {
            v.split(';').skip(1).any(|param| {
                param
                    .trim()
                    .to_ascii_lowercase()
                    .replace('"', "")
                    .starts_with("charset=utf-8")
            })
        })
        .unwrap_or(false);
    if declares_utf8 {
        return content_type.clone();
    }
    HeaderValue::from_str(&format!("{}; charset=utf-8", media_type(content_type)))
        .unwrap_or_else(|_| HeaderValue::from_static("text/html; charset=utf-8"))
}

/// Adjust forwarded headers for a body that the proxy rewrote.
pub fn rewritten_html_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(ETAG);
    headers.remove(LAST_MODIFIED);
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        let content_type = utf8_html_content_type(content_type);
        headers.insert(CONTENT_TYPE, content_type);
    }
    headers
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn relay() -> FetchRelay {
        FetchRelay::new(Duration::from_secs(5), "Mozilla/5.0 (test)").unwrap()
    }

    #[test]
    fn parse_target_accepts_http_and_https() {
        assert!(parse_target("http://example.com/page.html").is_ok());
        assert!(parse_target(" https://example.com ").is_ok());
    }

    #[test]
    fn parse_target_rejects_other_schemes_and_garbage() {
        assert_matches!(
            parse_target("ftp://example.com/file"),
            Err(FetchError::InvalidUrl { .. })
        );
        assert_matches!(parse_target("not a url"), Err(FetchError::InvalidUrl { .. }));
        assert_matches!(parse_target(""), Err(FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn strips_every_embedding_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        headers.insert(
            "content-security-policy",
            HeaderValue::from_static("frame-ancestors 'none'"),
        );
        headers.insert("cache-control", HeaderValue::from_static("no-cache"));
        strip_embedding_headers(&mut headers);
        assert!(headers.get("x-frame-options").is_none());
        assert!(headers.get("content-security-policy").is_none());
        assert!(headers.get("cache-control").is_some());
    }

    #[test]
    fn media_type_ignores_parameters_and_case() {
        let value = HeaderValue::from_static("Text/HTML; charset=ISO-8859-1");
        assert_eq!(media_type(&value), "text/html");
    }

    #[test]
    fn html_content_type_is_normalised_to_utf8() {
        let latin1 = HeaderValue::from_static("text/html; charset=ISO-8859-1");
        assert_eq!(utf8_html_content_type(&latin1), "text/html; charset=utf-8");

        let bare = HeaderValue::from_static("text/html");
        assert_eq!(utf8_html_content_type(&bare), "text/html; charset=utf-8");

        let utf8 = HeaderValue::from_static("text/html; charset=UTF-8");
        assert_eq!(utf8_html_content_type(&utf8), "text/html; charset=UTF-8");
    }

    #[tokio::test]
    async fn open_sends_user_agent_and_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .and(header("user-agent", "Mozilla/5.0 (test)"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>hi</p>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let upstream = relay()
            .open(&format!("{}/page.html", server.uri()))
            .await
            .unwrap();
        assert!(upstream.is_html());
        assert_eq!(upstream.final_url().path(), "/page.html");
        assert_eq!(upstream.text().await.unwrap(), "<p>hi</p>");
    }

    #[tokio::test]
    async fn missing_content_type_defaults_to_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let upstream = relay().open(&server.uri()).await.unwrap();
        assert_eq!(upstream.content_type(), DEFAULT_CONTENT_TYPE);
        assert!(upstream.is_html());
    }

    #[tokio::test]
    async fn forwarded_headers_drop_blocking_and_connection_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![1u8, 2, 3], "image/png")
                    .insert_header("x-frame-options", "SAMEORIGIN")
                    .insert_header("content-security-policy", "frame-ancestors 'self'")
                    .insert_header("access-control-allow-origin", "*")
                    .insert_header("set-cookie", "session=1")
                    .insert_header("cache-control", "max-age=60"),
            )
            .mount(&server)
            .await;

        let upstream = relay().open(&server.uri()).await.unwrap();
        assert!(!upstream.is_html());
        let headers = upstream.forwarded_headers();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(headers.get("cache-control").unwrap(), "max-age=60");
        for name in ["x-frame-options", "content-security-policy", "access-control-allow-origin", "set-cookie", "content-length"] {
            assert!(headers.get(name).is_none(), "{name} was forwarded");
        }
        assert_eq!(upstream.bytes().await.unwrap().as_ref(), &[1u8, 2, 3]);
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_matches!(
            relay().open(&server.uri()).await,
            Err(FetchError::Upstream { status: 404 })
        );
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let relay = FetchRelay::new(Duration::from_millis(200), "Mozilla/5.0 (test)").unwrap();
        assert_matches!(relay.open(&server.uri()).await, Err(FetchError::Timeout));
    }

    #[tokio::test]
    async fn redirects_are_followed_and_final_url_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/new/index.html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/html"))
            .mount(&server)
            .await;

        let upstream = relay().open(&format!("{}/old", server.uri())).await.unwrap();
        assert_eq!(upstream.final_url().path(), "/new/index.html");
    }
}
