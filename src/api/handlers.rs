//! API Handlers
//!
//! HTTP request handlers for the relay endpoints. Relayed data is returned as
//! the upstream sent it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::config::Config;
use crate::error::{ApiError, ConnectorError, Result};
use crate::models::{
    CancelResponse, ClearResponse, EconomicCalendarRequest, ExpectStockRequest,
    FinanceRankRequest, HealthResponse, InvalidateRequest, InvalidateResponse, NewsSearchRequest,
    SaveFinanceRankRequest, SaveHistoryRequest, StatsResponse, StockDataRequest,
    StockListRequest,
};
use crate::relay::{Relay, StoreKind};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }

    /// Creates a new AppState talking HTTP to the configured backends.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConnectorError> {
        Ok(Self::new(Relay::from_config(config)?))
    }
}

fn check(error: Option<String>) -> Result<()> {
    match error {
        Some(msg) => Err(ApiError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Handler for POST /api/stock-data
pub async fn stock_data_handler(
    State(state): State<AppState>,
    Json(req): Json<StockDataRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.stock_data(&req).await?))
}

/// Handler for POST /api/stock-list
pub async fn stock_list_handler(
    State(state): State<AppState>,
    Json(req): Json<StockListRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.stock_list(&req).await?))
}

/// Handler for POST /api/expect-stock
pub async fn expect_stock_handler(
    State(state): State<AppState>,
    Json(req): Json<ExpectStockRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.expect_stock(&req).await?))
}

/// Handler for POST /api/finance-rank
pub async fn finance_rank_handler(
    State(state): State<AppState>,
    Json(req): Json<FinanceRankRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.finance_rank(&req).await?))
}

/// Handler for POST /api/finance-rank/save
pub async fn save_finance_rank_handler(
    State(state): State<AppState>,
    Json(req): Json<SaveFinanceRankRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.save_finance_rank(&req).await?))
}

/// Handler for GET /api/history
pub async fn history_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.relay.buy_history().await?))
}

/// Handler for POST /api/history/save
pub async fn save_history_handler(
    State(state): State<AppState>,
    Json(req): Json<SaveHistoryRequest>,
) -> Result<Json<Value>> {
    Ok(Json(state.relay.save_history(&req).await?))
}

/// Handler for GET /api/today-analysis
pub async fn today_analysis_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.relay.today_analysis().await?))
}

/// Handler for GET /api/realtime-search
pub async fn realtime_search_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.relay.realtime_search().await?))
}

/// Handler for POST /api/economic-calendar
pub async fn economic_calendar_handler(
    State(state): State<AppState>,
    Json(req): Json<EconomicCalendarRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.economic_calendar(&req).await?))
}

/// Handler for POST /api/news
pub async fn news_handler(
    State(state): State<AppState>,
    Json(req): Json<NewsSearchRequest>,
) -> Result<Json<Value>> {
    check(req.validate())?;
    Ok(Json(state.relay.news(&req).await?))
}

/// Handler for DELETE /api/news/debounce/:key
pub async fn cancel_news_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<CancelResponse> {
    let cancelled = state.relay.cancel_debounce(&key).await;
    Json(CancelResponse { key, cancelled })
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    check(req.validate())?;
    let kind: StoreKind = req.store.parse().map_err(ApiError::NotFound)?;

    let removed = state.relay.invalidate(kind, &req.pattern).await;
    Ok(Json(InvalidateResponse::new(kind.name(), req.pattern, removed)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.relay.clear_all().await;
    Json(ClearResponse::new())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.relay.stats().await.into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::from_config(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_upstream() {
        let req = StockListRequest {
            symbol: String::new(),
        };
        let result = stock_list_handler(State(state()), Json(req)).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invalidate_unknown_store() {
        let req = InvalidateRequest {
            store: "redis".to_string(),
            pattern: "x".to_string(),
        };
        let result = invalidate_handler(State(state()), Json(req)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalidate_known_store() {
        let state = state();
        state
            .relay
            .stores()
            .get(StoreKind::News)
            .write()
            .await
            .set("news_news_samsung", serde_json::json!({}), None);

        let req = InvalidateRequest {
            store: "news".to_string(),
            pattern: "samsung".to_string(),
        };
        let response = invalidate_handler(State(state), Json(req)).await.unwrap();
        assert_eq!(response.removed, 1);
        assert_eq!(response.store, "news");
    }

    #[tokio::test]
    async fn test_cancel_without_pending_call() {
        let response = cancel_news_handler(State(state()), Path("box".to_string())).await;
        assert!(!response.cancelled);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(state())).await;
        assert_eq!(response.stores.len(), 4);
        assert_eq!(response.limiter.max_requests, 40);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
