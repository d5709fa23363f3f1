//! Shared outbound HTTP helper: one place that sends a request and turns
//! every way it can go wrong into a classified [`ToolError`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use dashchat_core::tool::{ErrorKind, ToolError};

/// HTTP client with an explicit per-call timeout.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(timeout.min(Duration::from_secs(10)))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// The underlying client, for building non-GET requests.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` with query parameters and parse the body as JSON.
    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(query);
        self.send_json(request).await
    }

    /// Send any prepared request and classify the outcome:
    /// transport failure → `RequestException`, non-2xx → `HTTPError`
    /// (body kept in `details`), unparseable body → `JSONDecodeError`.
    pub async fn send_json(&self, request: RequestBuilder) -> Result<Value, ToolError> {
        let resp = request.send().await.map_err(classify_transport)?;

        let status = resp.status();
        let url = resp.url().to_string();
        let body = resp.text().await.map_err(classify_transport)?;

        debug!("Upstream {} → {} ({} bytes)", url, status, body.len());

        if !status.is_success() {
            let message = format!(
                "{} {} for url: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                url
            );
            warn!("HTTP error occurred: {}", message);
            let err = ToolError::new(ErrorKind::HttpError, message);
            return Err(if body.is_empty() {
                err
            } else {
                err.with_details(body)
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!("JSON decoding error from {}: {}", url, e);
            ToolError::new(
                ErrorKind::JsonDecodeError,
                "Failed to parse JSON response from API.",
            )
            .with_details(e.to_string())
        })
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::from_secs(30)
    }
}

/// Map a reqwest transport error (timeout, DNS, refused, body read).
pub fn classify_transport(e: reqwest::Error) -> ToolError {
    let message = if e.is_timeout() {
        format!("Request timed out: {}", e)
    } else {
        e.to_string()
    };
    warn!("Request error occurred: {}", message);
    ToolError::new(ErrorKind::RequestException, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_json_success_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("date_time", "2024-01-01T10:00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
            .mount(&server)
            .await;

        let client = UpstreamClient::default();
        let v = client
            .get_json(
                &format!("{}/data", server.uri()),
                &[("date_time", "2024-01-01T10:00:00".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(v["ok"], true);
    }

    #[tokio::test]
    async fn test_server_error_is_http_error_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let err = UpstreamClient::default()
            .get_json(&server.uri(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::HttpError);
        assert!(err.message.starts_with("500 Internal Server Error"));
        assert_eq!(err.details.as_deref(), Some("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_non_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = UpstreamClient::default()
            .get_json(&server.uri(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::JsonDecodeError);
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_exception() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = UpstreamClient::from_secs(2)
            .get_json(&format!("http://{}/", addr), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestException);
    }

    #[tokio::test]
    async fn test_timeout_is_request_exception() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = UpstreamClient::new(Duration::from_millis(300))
            .get_json(&server.uri(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestException);
        assert!(err.message.contains("timed out"));
    }
}
