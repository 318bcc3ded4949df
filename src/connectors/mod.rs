//! Upstream Connectors
//!
//! The boundary to the external APIs. The relay only sees the [`Upstream`]
//! trait, so transports can be swapped for in-memory fakes in tests.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectorError;

pub use http::{HttpUpstream, NAVER_CLIENT_ID_HEADER, NAVER_CLIENT_SECRET_HEADER};

/// One call against an upstream API.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamRequest {
    /// JSON body posted to `path`
    Post { path: String, body: Value },
    /// GET on `path` with query parameters
    Get {
        path: String,
        query: Vec<(String, String)>,
    },
}

impl UpstreamRequest {
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::Post {
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self::Get {
            path: path.into(),
            query,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Post { path, .. } | Self::Get { path, .. } => path,
        }
    }
}

// == Upstream Trait ==
/// An API that answers requests with JSON.
///
/// Implementations report transport and status failures as errors. They never
/// turn a failure into a placeholder value.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn call(&self, request: UpstreamRequest) -> Result<Value, ConnectorError>;
}

/// Shared handle to an upstream.
pub type SharedUpstream = Arc<dyn Upstream>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_path() {
        let post = UpstreamRequest::post("/stock_data/", json!({"symbol": "AAPL"}));
        assert_eq!(post.path(), "/stock_data/");

        let get = UpstreamRequest::get("/v1/search/news", vec![("query".into(), "apple".into())]);
        assert_eq!(get.path(), "/v1/search/news");
    }
}
