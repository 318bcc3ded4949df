//! API Routes
//!
//! Configures the Axum router with all relay endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cancel_news_handler, clear_handler, economic_calendar_handler, expect_stock_handler,
    finance_rank_handler, health_handler, history_handler, invalidate_handler, news_handler,
    realtime_search_handler, save_finance_rank_handler, save_history_handler, stats_handler,
    stock_data_handler, stock_list_handler, today_analysis_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /api/stock-data`, `/api/stock-list`, `/api/expect-stock`
/// - `POST /api/finance-rank`, `/api/finance-rank/save`
/// - `GET /api/history`, `POST /api/history/save`
/// - `GET /api/today-analysis`, `/api/realtime-search`
/// - `POST /api/economic-calendar`, `/api/news`
/// - `DELETE /api/news/debounce/:key` - Cancel a pending debounced search
/// - `POST /cache/invalidate`, `DELETE /cache`
/// - `GET /stats`, `GET /health`
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/stock-data", post(stock_data_handler))
        .route("/api/stock-list", post(stock_list_handler))
        .route("/api/expect-stock", post(expect_stock_handler))
        .route("/api/finance-rank", post(finance_rank_handler))
        .route("/api/finance-rank/save", post(save_finance_rank_handler))
        .route("/api/history", get(history_handler))
        .route("/api/history/save", post(save_history_handler))
        .route("/api/today-analysis", get(today_analysis_handler))
        .route("/api/realtime-search", get(realtime_search_handler))
        .route("/api/economic-calendar", post(economic_calendar_handler))
        .route("/api/news", post(news_handler))
        .route("/api/news/debounce/:key", delete(cancel_news_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache", delete(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::from_config(&Config::default()).unwrap();
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clear_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_store_is_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cache/invalidate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"store":"redis","pattern":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_news_request() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/news")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"","display":10}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
