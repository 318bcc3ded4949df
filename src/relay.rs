//! Relay
//!
//! Composition root of the caching layer. Each operation derives a cache key,
//! reads through its domain store with single-flight coalescing, and on a miss
//! sends the upstream call through the batch manager (where applicable) and
//! the request limiter.
//!
//! ```text
//! caller -> key -> store hit? -> single-flight -> batch -> limiter -> upstream
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{
    canonical_list, date_bucket_key, time_bucket_key, ttl_minutes, CacheStats, CacheStore,
    SharedStore, SingleFlight,
};
use crate::config::{Config, StoreConfig};
use crate::connectors::{HttpUpstream, SharedUpstream, UpstreamRequest};
use crate::error::{CallError, ConnectorError};
use crate::models::{
    EconomicCalendarRequest, ExpectStockRequest, FinanceRankRequest, NewsSearchRequest,
    SaveFinanceRankRequest, SaveHistoryRequest, StockDataRequest, StockListRequest,
};
use crate::shaping::{
    BatchConfig, BatchManager, Debouncer, LimiterConfig, LimiterStats, RequestLimiter,
};

// == Finance Backend Paths ==
const STOCK_DATA_PATH: &str = "/stock_data/";
const STOCK_LIST_PATH: &str = "/stock_list/";
const EXPECT_STOCK_PATH: &str = "/expect_stock/";
const GET_FINANCE_RANK_PATH: &str = "/get_finance_rank/";
const SAVE_FINANCE_RANK_PATH: &str = "/save_finance_rank/";
const GET_HISTORY_PATH: &str = "/get_buy_history/";
const SAVE_HISTORY_PATH: &str = "/save_buy_history/";
const TODAY_ANALYZE_PATH: &str = "/get_today_analyze/";
const REALTIME_SEARCH_PATH: &str = "/get_realtime_search/";
const ECONOMIC_CALENDAR_PATH: &str = "/get_economic_calendar/";

/// Outcome of a relay operation.
pub type RelayResult = Result<Value, CallError<ConnectorError>>;

// == Store Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    /// Price series
    Market,
    /// Naver search results
    News,
    /// Stock listings
    Listing,
    /// Predictions, rankings, history and calendars
    Analysis,
}

impl StoreKind {
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Market,
        StoreKind::News,
        StoreKind::Listing,
        StoreKind::Analysis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StoreKind::Market => "market",
            StoreKind::News => "news",
            StoreKind::Listing => "listing",
            StoreKind::Analysis => "analysis",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoreKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown store '{s}'"))
    }
}

// == Domain Stores ==
/// One store per data domain, each with its own size bound and TTL.
#[derive(Clone)]
pub struct DomainStores {
    market: SharedStore<Value>,
    news: SharedStore<Value>,
    listing: SharedStore<Value>,
    analysis: SharedStore<Value>,
}

impl DomainStores {
    pub fn from_config(config: &Config) -> Self {
        let store = |kind: StoreKind, settings: StoreConfig| {
            Arc::new(RwLock::new(CacheStore::from_config(kind.name(), settings)))
        };
        Self {
            market: store(StoreKind::Market, config.market),
            news: store(StoreKind::News, config.news),
            listing: store(StoreKind::Listing, config.listing),
            analysis: store(StoreKind::Analysis, config.analysis),
        }
    }

    pub fn get(&self, kind: StoreKind) -> &SharedStore<Value> {
        match kind {
            StoreKind::Market => &self.market,
            StoreKind::News => &self.news,
            StoreKind::Listing => &self.listing,
            StoreKind::Analysis => &self.analysis,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StoreKind, &SharedStore<Value>)> {
        StoreKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Snapshot of every store and the limiter.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStats {
    pub stores: BTreeMap<&'static str, CacheStats>,
    pub limiter: LimiterStats,
    /// Cache misses currently waiting on an upstream call
    pub in_flight: usize,
    /// Debounced calls waiting to fire
    pub pending_debounce: usize,
}

// == Batch Keys ==
/// Stock data requests for the same period shape share a batch.
pub fn stock_data_batch(symbol: &str, duration: u32, is_month: bool) -> (String, String) {
    (
        format!("stock_data_{duration}_{is_month}"),
        format!("{symbol}_{duration}_{is_month}"),
    )
}

/// News searches against the same service share a batch. The request id
/// carries every search parameter so that different pages never share a
/// result.
pub fn news_batch(request: &NewsSearchRequest) -> (String, String) {
    (
        format!("news_{}", request.service_id),
        format!(
            "{}_{}_{}_{}_{}_{}",
            request.query,
            request.service_id,
            request.display,
            request.start,
            request.sort,
            request.filter
        ),
    )
}

struct Lookup {
    store: StoreKind,
    key: String,
    /// `None` keeps the store's configured default
    ttl_minutes: Option<u64>,
}

// == Relay ==
pub struct Relay {
    stores: DomainStores,
    flights: SingleFlight<Value, CallError<ConnectorError>>,
    limiter: Arc<RequestLimiter>,
    debouncer: Debouncer,
    batcher: BatchManager<Value, ConnectorError>,
    finance: SharedUpstream,
    naver: SharedUpstream,
}

impl Relay {
    pub fn new(config: &Config, finance: SharedUpstream, naver: SharedUpstream) -> Self {
        Self {
            stores: DomainStores::from_config(config),
            flights: SingleFlight::new(),
            limiter: Arc::new(RequestLimiter::new(LimiterConfig::per_minute(
                config.max_requests_per_minute,
            ))),
            debouncer: Debouncer::new(config.debounce_delay()),
            batcher: BatchManager::new(BatchConfig {
                delay: config.batch_delay(),
                chunk_size: config.batch_chunk_size,
            }),
            finance,
            naver,
        }
    }

    /// Builds a relay talking HTTP to the configured backends.
    pub fn from_config(config: &Config) -> Result<Self, ConnectorError> {
        let finance = HttpUpstream::new(&config.backend_url)?;
        let naver = HttpUpstream::naver(
            &config.naver_base_url,
            &config.naver_client_id,
            &config.naver_client_secret,
        )?;
        Ok(Self::new(config, Arc::new(finance), Arc::new(naver)))
    }

    pub fn stores(&self) -> &DomainStores {
        &self.stores
    }

    // == Finance Reads ==
    pub async fn stock_data(&self, req: &StockDataRequest) -> RelayResult {
        let base = format!(
            "stock_data_{}_{}_{}",
            req.symbol, req.duration, req.is_month
        );
        let lookup = Lookup {
            store: StoreKind::Market,
            key: time_bucket_key(&base, 30),
            ttl_minutes: None,
        };
        let body = json!({
            "symbol": req.symbol,
            "duration": req.duration,
            "isMonth": req.is_month,
        });
        let batch = stock_data_batch(&req.symbol, req.duration, req.is_month);
        let call = self.limited(&self.finance, UpstreamRequest::post(STOCK_DATA_PATH, body));
        self.cached_batched(lookup, batch, call).await
    }

    pub async fn stock_list(&self, req: &StockListRequest) -> RelayResult {
        let lookup = Lookup {
            store: StoreKind::Listing,
            key: date_bucket_key(&format!("stock_list_{}", req.symbol)),
            ttl_minutes: None,
        };
        let body = json!({ "symbol": req.symbol });
        let call = self.limited(&self.finance, UpstreamRequest::post(STOCK_LIST_PATH, body));
        self.cached(lookup, call).await
    }

    pub async fn expect_stock(&self, req: &ExpectStockRequest) -> RelayResult {
        let lookup = Lookup {
            store: StoreKind::Analysis,
            key: time_bucket_key(&format!("expect_stock_{}_{}", req.symbol, req.term), 120),
            ttl_minutes: None,
        };
        let body = json!({ "symbol": req.symbol, "term": req.term });
        let call = self.limited(&self.finance, UpstreamRequest::post(EXPECT_STOCK_PATH, body));
        self.cached(lookup, call).await
    }

    pub async fn finance_rank(&self, req: &FinanceRankRequest) -> RelayResult {
        let lookup = Lookup {
            store: StoreKind::Analysis,
            key: date_bucket_key(&format!("finance_rank_{}", req.stock)),
            ttl_minutes: Some(180),
        };
        let body = json!({ "stock": req.stock });
        let call = self.limited(
            &self.finance,
            UpstreamRequest::post(GET_FINANCE_RANK_PATH, body),
        );
        self.cached(lookup, call).await
    }

    pub async fn buy_history(&self) -> RelayResult {
        let lookup = Lookup {
            store: StoreKind::Analysis,
            key: time_bucket_key("buy_history", 10),
            ttl_minutes: Some(30),
        };
        let call = self.limited(&self.finance, UpstreamRequest::post(GET_HISTORY_PATH, json!({})));
        self.cached(lookup, call).await
    }

    pub async fn today_analysis(&self) -> RelayResult {
        let lookup = Lookup {
            store: StoreKind::Analysis,
            key: date_bucket_key("today_analyze"),
            ttl_minutes: Some(60),
        };
        let call = self.limited(
            &self.finance,
            UpstreamRequest::post(TODAY_ANALYZE_PATH, json!({})),
        );
        self.cached(lookup, call).await
    }

    pub async fn realtime_search(&self) -> RelayResult {
        let lookup = Lookup {
            store: StoreKind::Analysis,
            key: time_bucket_key("get_realtime_search", 30),
            ttl_minutes: Some(30),
        };
        let call = self.limited(
            &self.finance,
            UpstreamRequest::post(REALTIME_SEARCH_PATH, json!({})),
        );
        self.cached(lookup, call).await
    }

    pub async fn economic_calendar(&self, req: &EconomicCalendarRequest) -> RelayResult {
        let base = format!(
            "economic_calendar_{}_{}_{}",
            req.year,
            canonical_list(req.countries.as_deref()),
            canonical_list(req.importance_levels.as_deref())
        );
        let lookup = Lookup {
            store: StoreKind::Analysis,
            key: date_bucket_key(&base),
            ttl_minutes: Some(360),
        };
        let body = json!({
            "year": req.year,
            "countries": req.countries,
            "importance_levels": req.importance_levels,
        });
        let call = self.limited(
            &self.finance,
            UpstreamRequest::post(ECONOMIC_CALENDAR_PATH, body),
        );
        self.cached(lookup, call).await
    }

    // == Finance Writes ==
    /// Saves a ranking and drops every cached ranking of that market.
    pub async fn save_finance_rank(&self, req: &SaveFinanceRankRequest) -> RelayResult {
        let body = json!({ "stock": req.stock, "data": req.data });
        let saved = self
            .limited(&self.finance, UpstreamRequest::post(SAVE_FINANCE_RANK_PATH, body))
            .await
            .map_err(CallError::Producer)?;

        let pattern = format!("^{}_", regex::escape(&format!("finance_rank_{}", req.stock)));
        let removed = self.invalidate(StoreKind::Analysis, &pattern).await;
        info!(stock = %req.stock, removed, "finance rank saved");
        Ok(saved)
    }

    /// Saves trade history and drops the cached history.
    pub async fn save_history(&self, req: &SaveHistoryRequest) -> RelayResult {
        let body = json!({ "data": req.data });
        let saved = self
            .limited(&self.finance, UpstreamRequest::post(SAVE_HISTORY_PATH, body))
            .await
            .map_err(CallError::Producer)?;

        let removed = self.invalidate(StoreKind::Analysis, "buy_history").await;
        info!(removed, "buy history saved");
        Ok(saved)
    }

    // == News ==
    /// Naver search. Requests carrying a debounce key are collapsed with
    /// other requests under that key, and only the last of a burst is sent.
    pub async fn news(&self, req: &NewsSearchRequest) -> RelayResult {
        match &req.debounce_key {
            Some(debounce_key) => self
                .debouncer
                .debounce(debounce_key, || self.news_search(req))
                .await
                .map_err(CallError::flatten),
            None => self.news_search(req).await,
        }
    }

    async fn news_search(&self, req: &NewsSearchRequest) -> RelayResult {
        let base = format!(
            "news_{}_{}_{}_{}_{}_{}",
            req.service_id, req.query, req.display, req.start, req.sort, req.filter
        );
        let lookup = Lookup {
            store: StoreKind::News,
            key: time_bucket_key(&base, 30),
            ttl_minutes: None,
        };
        let path = format!("/v1/search/{}", req.service_id);
        let call = self.limited(&self.naver, UpstreamRequest::get(path, req.query_params()));
        self.cached_batched(lookup, news_batch(req), call).await
    }

    /// Cancels the pending debounced search under `debounce_key`.
    pub async fn cancel_debounce(&self, debounce_key: &str) -> bool {
        self.debouncer.cancel(debounce_key).await
    }

    // == Cache Administration ==
    /// Removes matching keys from one store.
    pub async fn invalidate(&self, kind: StoreKind, pattern: &str) -> usize {
        let removed = self.stores.get(kind).write().await.invalidate_pattern(pattern);
        info!(store = %kind, pattern, removed, "cache invalidated");
        removed
    }

    /// Empties every store and abandons queued debounced calls and batches.
    pub async fn clear_all(&self) {
        for (_, store) in self.stores.iter() {
            store.write().await.clear();
        }
        let cancelled = self.debouncer.cancel_all().await;
        let dropped = self.batcher.clear_all().await;
        info!(cancelled, dropped, "all caches cleared");
    }

    /// Removes expired entries from every store.
    pub async fn sweep_expired(&self) -> usize {
        let mut removed = 0;
        for (_, store) in self.stores.iter() {
            removed += store.write().await.cleanup_expired();
        }
        removed
    }

    pub async fn stats(&self) -> RelayStats {
        let mut stores = BTreeMap::new();
        for (kind, store) in self.stores.iter() {
            stores.insert(kind.name(), store.read().await.stats());
        }
        RelayStats {
            stores,
            limiter: self.limiter.stats().await,
            in_flight: self.flights.in_flight().await,
            pending_debounce: self.debouncer.pending().await,
        }
    }

    // == Call Plumbing ==
    /// Upstream call gated by the request limiter.
    fn limited(
        &self,
        upstream: &SharedUpstream,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<Value, ConnectorError>> + Send + 'static {
        let limiter = Arc::clone(&self.limiter);
        let upstream = Arc::clone(upstream);
        async move { limiter.limited_call(|| upstream.call(request)).await }
    }

    async fn cached<Fut>(&self, lookup: Lookup, call: Fut) -> RelayResult
    where
        Fut: Future<Output = Result<Value, ConnectorError>> + Send + 'static,
    {
        let store = self.stores.get(lookup.store);
        self.flights
            .cached_call(
                store,
                &lookup.key,
                lookup.ttl_minutes.map(ttl_minutes),
                move || async move { call.await.map_err(CallError::Producer) },
            )
            .await
    }

    async fn cached_batched<Fut>(
        &self,
        lookup: Lookup,
        (batch_key, request_id): (String, String),
        call: Fut,
    ) -> RelayResult
    where
        Fut: Future<Output = Result<Value, ConnectorError>> + Send + 'static,
    {
        let store = self.stores.get(lookup.store);
        let batcher = self.batcher.clone();
        self.flights
            .cached_call(
                store,
                &lookup.key,
                lookup.ttl_minutes.map(ttl_minutes),
                move || async move {
                    batcher
                        .add_to_batch(&batch_key, &request_id, move || call)
                        .await
                },
            )
            .await
    }
}
