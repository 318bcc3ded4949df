//! API Module
//!
//! HTTP handlers and routing for the relay REST API.
//!
//! # Endpoints
//! - `/api/*` - Cached reads and writes against the finance backend and Naver
//! - `POST /cache/invalidate` - Drop keys matching a pattern from one store
//! - `DELETE /cache` - Clear every store
//! - `GET /stats` - Store and limiter statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
