//! HTTP Upstream
//!
//! reqwest-backed [`Upstream`] used for the finance backend and Naver search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Upstream, UpstreamRequest};
use crate::error::ConnectorError;

pub const NAVER_CLIENT_ID_HEADER: &str = "X-Naver-Client-Id";
pub const NAVER_CLIENT_SECRET_HEADER: &str = "X-Naver-Client-Secret";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    /// Headers sent with every request
    headers: Vec<(&'static str, String)>,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Vec::new(),
        })
    }

    /// Naver open API client authenticating with client id and secret.
    pub fn naver(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConnectorError> {
        Ok(Self::new(base_url)?
            .with_header(NAVER_CLIENT_ID_HEADER, client_id)
            .with_header(NAVER_CLIENT_SECRET_HEADER, client_secret))
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn call(&self, request: UpstreamRequest) -> Result<Value, ConnectorError> {
        let url = self.url(request.path());
        debug!(url = %url, "calling upstream");

        let mut builder = match &request {
            UpstreamRequest::Post { body, .. } => self.client.post(&url).json(body),
            UpstreamRequest::Get { query, .. } => self.client.get(&url).query(query),
        };
        for (name, value) in &self.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "upstream request failed");
            ConnectorError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "upstream returned error status");
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::net::SocketAddr;

    async fn spawn_server() -> SocketAddr {
        let app = Router::new()
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .route(
                "/v1/search/news",
                get(
                    |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                        let client_id = headers
                            .get(NAVER_CLIENT_ID_HEADER)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        Json(json!({"clientId": client_id, "query": params.get("query")}))
                    },
                ),
            )
            .route(
                "/broken",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route("/not-json", post(|| async { "plain text" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_url_join() {
        let upstream = HttpUpstream::new("http://localhost:8250/").unwrap();
        assert_eq!(upstream.base_url(), "http://localhost:8250");
        assert_eq!(upstream.url("/stock_data/"), "http://localhost:8250/stock_data/");
        assert_eq!(upstream.url("stock_list/"), "http://localhost:8250/stock_list/");
    }

    #[tokio::test]
    async fn test_post_returns_json() {
        let addr = spawn_server().await;
        let upstream = HttpUpstream::new(format!("http://{addr}")).unwrap();

        let body = json!({"symbol": "AAPL", "duration": 30});
        let result = upstream
            .call(UpstreamRequest::post("/echo", body.clone()))
            .await;

        assert_eq!(result, Ok(body));
    }

    #[tokio::test]
    async fn test_get_sends_query_and_headers() {
        let addr = spawn_server().await;
        let upstream = HttpUpstream::naver(format!("http://{addr}"), "id-123", "secret").unwrap();

        let result = upstream
            .call(UpstreamRequest::get(
                "/v1/search/news",
                vec![("query".to_string(), "samsung".to_string())],
            ))
            .await
            .unwrap();

        assert_eq!(result["clientId"], "id-123");
        assert_eq!(result["query"], "samsung");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let addr = spawn_server().await;
        let upstream = HttpUpstream::new(format!("http://{addr}")).unwrap();

        let result = upstream.call(UpstreamRequest::post("/broken", json!({}))).await;

        assert_eq!(
            result,
            Err(ConnectorError::Status {
                status: 503,
                body: "maintenance".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let addr = spawn_server().await;
        let upstream = HttpUpstream::new(format!("http://{addr}")).unwrap();

        let result = upstream.call(UpstreamRequest::post("/not-json", json!({}))).await;

        assert!(matches!(result, Err(ConnectorError::Decode(_))));
    }
}
