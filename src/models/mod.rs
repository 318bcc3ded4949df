//! Request and Response models for the relay API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    EconomicCalendarRequest, ExpectStockRequest, FinanceRankRequest, InvalidateRequest,
    NewsSearchRequest, SaveFinanceRankRequest, SaveHistoryRequest, StockDataRequest,
    StockListRequest,
};
pub use responses::{
    CancelResponse, ClearResponse, ErrorResponse, HealthResponse, InvalidateResponse,
    StatsResponse, StoreStatsResponse,
};
