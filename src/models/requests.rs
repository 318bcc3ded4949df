//! Request DTOs for the relay API
//!
//! Defines the structure of incoming HTTP request bodies. Field names follow
//! the finance backend's wire format so bodies can be forwarded unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest accepted symbol, stock or query string
const MAX_TEXT_LEN: usize = 256;

fn check_text(field: &str, value: &str) -> Option<String> {
    if value.trim().is_empty() {
        return Some(format!("{field} cannot be empty"));
    }
    if value.len() > MAX_TEXT_LEN {
        return Some(format!(
            "{field} exceeds maximum length of {MAX_TEXT_LEN} characters"
        ));
    }
    None
}

/// Body of `POST /api/stock-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDataRequest {
    pub symbol: String,
    /// Number of periods to fetch
    pub duration: u32,
    /// Monthly rather than weekly periods
    #[serde(rename = "isMonth", default)]
    pub is_month: bool,
}

impl StockDataRequest {
    pub fn validate(&self) -> Option<String> {
        check_text("symbol", &self.symbol)
    }
}

/// Body of `POST /api/stock-list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockListRequest {
    pub symbol: String,
}

impl StockListRequest {
    pub fn validate(&self) -> Option<String> {
        check_text("symbol", &self.symbol)
    }
}

/// Body of `POST /api/expect-stock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectStockRequest {
    pub symbol: String,
    pub term: u32,
}

impl ExpectStockRequest {
    pub fn validate(&self) -> Option<String> {
        check_text("symbol", &self.symbol)
    }
}

/// Body of `POST /api/finance-rank`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceRankRequest {
    /// Market the ranking belongs to
    pub stock: String,
}

impl FinanceRankRequest {
    pub fn validate(&self) -> Option<String> {
        check_text("stock", &self.stock)
    }
}

/// Body of `POST /api/finance-rank/save`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveFinanceRankRequest {
    pub stock: String,
    pub data: Value,
}

impl SaveFinanceRankRequest {
    pub fn validate(&self) -> Option<String> {
        check_text("stock", &self.stock)
    }
}

/// Body of `POST /api/history/save`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveHistoryRequest {
    pub data: Value,
}

/// Body of `POST /api/economic-calendar`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicCalendarRequest {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_levels: Option<Vec<u8>>,
}

impl EconomicCalendarRequest {
    pub fn validate(&self) -> Option<String> {
        if !(1900..=2200).contains(&self.year) {
            return Some(format!("year {} is out of range", self.year));
        }
        None
    }
}

/// Body of `POST /api/news`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSearchRequest {
    /// Naver search service (news, blog, cafearticle, ...)
    #[serde(rename = "serviceId", default = "default_service_id")]
    pub service_id: String,
    pub query: String,
    /// Results per page (10 to 100)
    #[serde(default = "default_display")]
    pub display: u32,
    /// 1-based start position (1 to 1000)
    #[serde(default = "default_start")]
    pub start: u32,
    /// `sim` or `date`
    #[serde(default = "default_sort")]
    pub sort: String,
    /// `all`, `large`, `medium` or `small`
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Collapses rapid searches sharing this key into the last one
    #[serde(rename = "debounceKey", default, skip_serializing)]
    pub debounce_key: Option<String>,
}

fn default_service_id() -> String {
    "news".to_string()
}

fn default_display() -> u32 {
    10
}

fn default_start() -> u32 {
    1
}

fn default_sort() -> String {
    "sim".to_string()
}

/// Filter values accepted by the Naver search API.
const NEWS_FILTERS: [&str; 4] = ["all", "large", "medium", "small"];

fn default_filter() -> String {
    "all".to_string()
}

impl NewsSearchRequest {
    pub fn validate(&self) -> Option<String> {
        if let Some(error) = check_text("query", &self.query) {
            return Some(error);
        }
        if !self
            .service_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
            || self.service_id.is_empty()
        {
            return Some(format!("invalid serviceId '{}'", self.service_id));
        }
        if !(1..=100).contains(&self.display) {
            return Some("display must be between 1 and 100".to_string());
        }
        if !(1..=1000).contains(&self.start) {
            return Some("start must be between 1 and 1000".to_string());
        }
        if self.sort != "sim" && self.sort != "date" {
            return Some("sort must be 'sim' or 'date'".to_string());
        }
        if !NEWS_FILTERS.contains(&self.filter.as_str()) {
            return Some(format!("filter must be one of {}", NEWS_FILTERS.join(", ")));
        }
        None
    }

    /// Query parameters for the Naver search endpoint.
    pub fn query_params(&self) -> Vec<(String, String)> {
        vec![
            ("query".to_string(), self.query.clone()),
            ("display".to_string(), self.display.to_string()),
            ("start".to_string(), self.start.to_string()),
            ("sort".to_string(), self.sort.clone()),
            ("filter".to_string(), self.filter.clone()),
        ]
    }
}

/// Body of `POST /cache/invalidate`
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Store name: market, news, listing or analysis
    pub store: String,
    /// Regular expression, or a literal substring if it does not compile
    pub pattern: String,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("pattern cannot be empty".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stock_data_wire_names() {
        let json = r#"{"symbol": "AAPL", "duration": 30, "isMonth": true}"#;
        let req: StockDataRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.symbol, "AAPL");
        assert!(req.is_month);

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back, json!({"symbol": "AAPL", "duration": 30, "isMonth": true}));
    }

    #[test]
    fn test_validate_empty_symbol() {
        let req = StockListRequest {
            symbol: "  ".to_string(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_long_stock() {
        let req = FinanceRankRequest {
            stock: "x".repeat(300),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_news_defaults() {
        let req: NewsSearchRequest = serde_json::from_str(r#"{"query": "samsung"}"#).unwrap();
        assert_eq!(req.service_id, "news");
        assert_eq!(req.display, 10);
        assert_eq!(req.start, 1);
        assert_eq!(req.sort, "sim");
        assert_eq!(req.filter, "all");
        assert!(req.debounce_key.is_none());
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_news_validation() {
        let mut req: NewsSearchRequest =
            serde_json::from_str(r#"{"query": "samsung", "display": 500}"#).unwrap();
        assert!(req.validate().is_some());

        req.display = 10;
        req.service_id = "../admin".to_string();
        assert!(req.validate().is_some());

        req.service_id = "blog".to_string();
        req.sort = "random".to_string();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_news_filter_must_be_known() {
        let ambiguous: NewsSearchRequest = serde_json::from_value(json!({
            "query": "x",
            "filter": "all_10_1_sim_all",
        }))
        .unwrap();
        assert!(ambiguous.validate().is_some());

        let plain: NewsSearchRequest = serde_json::from_value(json!({
            "query": "x_10_1_sim_all",
            "filter": "all",
        }))
        .unwrap();
        assert!(plain.validate().is_none());

        let mut large = plain.clone();
        large.filter = "large".to_string();
        assert!(large.validate().is_none());
    }

    #[test]
    fn test_news_query_params() {
        let req: NewsSearchRequest =
            serde_json::from_str(r#"{"query": "kospi", "sort": "date"}"#).unwrap();
        let params = req.query_params();
        assert!(params.contains(&("query".to_string(), "kospi".to_string())));
        assert!(params.contains(&("sort".to_string(), "date".to_string())));
        assert!(params.contains(&("display".to_string(), "10".to_string())));
    }

    #[test]
    fn test_economic_calendar_optional_lists() {
        let req: EconomicCalendarRequest = serde_json::from_str(r#"{"year": 2024}"#).unwrap();
        assert!(req.countries.is_none());
        assert!(req.validate().is_none());
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"year": 2024}));
    }

    #[test]
    fn test_invalidate_request_validate() {
        let req = InvalidateRequest {
            store: "news".to_string(),
            pattern: String::new(),
        };
        assert!(req.validate().is_some());
    }
}
