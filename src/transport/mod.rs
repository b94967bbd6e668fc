//! Outbound HTTP seam.
//!
//! Flows never construct a client themselves; the transport is injected so
//! tests can swap in a mock server or a recording fake.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};

use crate::config::ConfigProvider;
use crate::error::{GrantError, Result};

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Any status at or above 400.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Form-encoded POST transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `form` as `application/x-www-form-urlencoded`.
    ///
    /// Non-2xx statuses are returned as responses, not errors; only
    /// connection-level failures are `Err`.
    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &dyn ConfigProvider) -> Result<Self> {
        Self::new(config.request_timeout())
    }

    /// Wrap an existing client. `timeout` still bounds each call.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<HttpResponse> {
        let header_map = build_headers(headers)?;
        with_timeout(self.timeout, async {
            let response = self
                .client
                .post(url)
                .headers(header_map)
                .form(form)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, GrantError>(HttpResponse { status, body })
        })
        .await
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    map.insert(ACCEPT, HeaderValue::from_static("application/json"));
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            GrantError::Configuration(format!("invalid header name: {name}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            GrantError::Configuration(format!("invalid value for header {name}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(GrantError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_threshold_is_400() {
        assert!(!HttpResponse::new(399, "").is_error());
        assert!(HttpResponse::new(400, "").is_error());
        assert!(HttpResponse::new(503, "").is_error());
    }

    #[test]
    fn headers_always_ask_for_json() {
        let map = build_headers(&[("X-Latitude".to_string(), "37.24".to_string())]).unwrap();
        assert_eq!(map.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(map.get("x-latitude").unwrap(), "37.24");
    }

    #[test]
    fn invalid_header_name_is_a_configuration_error() {
        let err = build_headers(&[("bad header".to_string(), "v".to_string())]).unwrap_err();
        assert!(matches!(err, GrantError::Configuration(_)));
    }

    #[tokio::test]
    async fn with_timeout_reports_elapsed_budget() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(GrantError::Timeout(10))));
    }
}
