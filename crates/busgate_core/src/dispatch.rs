//! Per-request pipeline.
//!
//! ```text
//! LOGGED -> CACHE_CHECK -> CACHE_HIT  -> RESPONDED
//!                       -> CACHE_MISS -> FETCHING -> CONVERTED -> CACHED -> RESPONDED
//!                                                 -> FETCH_FAILED -> ERROR_RESPONDED
//! ```
//!
//! Every request is logged before dispatch and stamped with its response time
//! afterwards, whatever the outcome. Concurrent misses on the same key each
//! fetch from the feed; there is no request coalescing.

use std::{sync::Arc, time::Duration, time::Instant};

use busgate_cache::{Cache, CacheKey, CachePolicy};
use busgate_log::{LogError, RequestLog};
use busgate_upstream::{FetchError, Fetcher, xml};
use bytes::Bytes;
use http::{Method, Uri};
use thiserror::Error;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::context::RequestContext;
use crate::responses::{self, HttpResponse};
use crate::routing::{Route, RouteError};

/// Rows returned by `/requests`.
const URL_COUNT_LIMIT: usize = 100;
/// Rows returned by `/slowest`.
const SLOWEST_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Upstream(#[from] FetchError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DispatchError {
    fn into_response(self) -> HttpResponse {
        match self {
            DispatchError::MethodNotAllowed(_) => responses::method_not_allowed(),
            DispatchError::Route(_) => responses::not_found(),
            DispatchError::Upstream(e) => {
                error!(target: "busgate::dispatch", error = %e, "Transit feed request failed");
                responses::upstream_error()
            }
            DispatchError::Log(e) => {
                error!(target: "busgate::dispatch", error = %e, "Request log store failed");
                responses::internal_error()
            }
            DispatchError::Encode(e) => {
                error!(target: "busgate::dispatch", error = %e, "Failed to encode response");
                responses::internal_error()
            }
        }
    }
}

/// Turns an inbound request into a response, coordinating log, cache and feed.
pub struct Dispatcher {
    cache: Arc<dyn Cache>,
    fetcher: Arc<dyn Fetcher>,
    log: Arc<dyn RequestLog>,
    ttl: Option<Duration>,
}

impl Dispatcher {
    /// `ttl_secs <= 0` disables response caching.
    pub fn new(
        cache: Arc<dyn Cache>,
        fetcher: Arc<dyn Fetcher>,
        log: Arc<dyn RequestLog>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            cache,
            fetcher,
            log,
            ttl: CachePolicy::ttl_from_secs(ttl_secs),
        }
    }

    pub async fn handle(&self, method: &Method, uri: &Uri) -> HttpResponse {
        let url = original_url(uri);
        let span = info_span!("request", %method, url = %url);
        self.handle_logged(method, uri, &url).instrument(span).await
    }

    async fn handle_logged(&self, method: &Method, uri: &Uri, url: &str) -> HttpResponse {
        let started = Instant::now();

        let ctx = match self.log.begin(method.as_str(), url).await {
            Ok(id) => RequestContext::new(id, started),
            Err(e) => {
                error!(
                    target: "busgate::dispatch",
                    error = %e,
                    "Could not record request; aborting"
                );
                return responses::internal_error();
            }
        };

        let response = match self.respond(method, uri, url, &ctx).await {
            Ok(resp) => resp,
            Err(e) => e.into_response(),
        };

        // Runs on every path; on a cache hit this repeats the earlier update.
        let elapsed = ctx.elapsed_ms();
        if let Err(e) = self.log.finish(ctx.log_id(), elapsed).await {
            error!(
                target: "busgate::dispatch",
                log_id = ctx.log_id(),
                error = %e,
                "Could not record response time"
            );
            return responses::internal_error();
        }

        debug!(
            target: "busgate::dispatch",
            status = response.status().as_u16(),
            elapsed_ms = elapsed,
            "Request completed"
        );
        responses::with_response_time(response, elapsed)
    }

    async fn respond(
        &self,
        method: &Method,
        uri: &Uri,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<HttpResponse, DispatchError> {
        if !matches!(*method, Method::GET | Method::HEAD) {
            warn!(target: "busgate::dispatch", %method, "Unsupported method; returning 405");
            return Err(DispatchError::MethodNotAllowed(method.clone()));
        }

        let route = Route::parse(uri.path())?;

        match route {
            Route::Index => Ok(responses::index()),
            Route::Requests => {
                let counts = self.log.url_counts(URL_COUNT_LIMIT).await?;
                Ok(responses::json(responses::json_value(&counts)?))
            }
            _ => self.respond_cached(method, &route, uri, url, ctx).await,
        }
    }

    async fn respond_cached(
        &self,
        method: &Method,
        route: &Route,
        uri: &Uri,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<HttpResponse, DispatchError> {
        let ttl = self
            .ttl
            .filter(|_| route.is_cacheable() && CachePolicy::is_cacheable(method));
        let key = CacheKey::from_url(url);

        if ttl.is_some() {
            if let Some(body) = self.cache.get(&key) {
                debug!(target: "busgate::dispatch", %key, "Serving from cache");
                self.log.finish(ctx.log_id(), ctx.elapsed_ms()).await?;
                return Ok(responses::json(body));
            }
        }

        let body = self.produce(route, uri).await?;

        if let Some(ttl) = ttl {
            self.cache.put(key, body.clone(), ttl);
        }
        Ok(responses::json(body))
    }

    /// Builds a fresh JSON body for a cache miss.
    async fn produce(&self, route: &Route, uri: &Uri) -> Result<Bytes, DispatchError> {
        if let Route::Slowest = route {
            let records = self.log.slowest(SLOWEST_LIMIT).await?;
            return Ok(responses::json_value(&records)?);
        }

        let Some(query) = route.upstream_query(uri.query()) else {
            return Err(RouteError::NotFound(uri.path().to_string()).into());
        };

        let raw = self.fetcher.fetch(&query).await?;
        let json = xml::to_json(&raw).map_err(FetchError::from)?;
        Ok(Bytes::from(json))
    }
}

/// Path plus raw query, exactly as the client sent it.
fn original_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use busgate_cache::{Cache, CacheKey, ResponseCache};
    use busgate_log::{RequestLog, SqliteRequestLog};
    use bytes::Bytes;
    use http::{Method, StatusCode, Uri, header};
    use http_body_util::BodyExt;

    use super::Dispatcher;
    use crate::responses::{HttpResponse, RESPONSE_TIME_HEADER};
    use crate::testing::{AGENCY_LIST_XML, FailingLog, RecordingFetcher};

    struct Harness {
        dispatcher: Dispatcher,
        cache: Arc<ResponseCache>,
        fetcher: Arc<RecordingFetcher>,
        log: Arc<SqliteRequestLog>,
    }

    fn harness(ttl_secs: i64) -> Harness {
        let cache = Arc::new(ResponseCache::new());
        let fetcher = Arc::new(RecordingFetcher::new(AGENCY_LIST_XML));
        let log = Arc::new(SqliteRequestLog::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new(cache.clone(), fetcher.clone(), log.clone(), ttl_secs);
        Harness {
            dispatcher,
            cache,
            fetcher,
            log,
        }
    }

    async fn get(h: &Harness, target: &str) -> HttpResponse {
        let uri: Uri = target.parse().unwrap();
        h.dispatcher.handle(&Method::GET, &uri).await
    }

    async fn body_of(resp: HttpResponse) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn miss_fetches_converts_caches_and_logs() {
        let h = harness(120);
        let resp = get(&h, "/agencies").await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("application/json")
        );
        assert!(resp.headers().contains_key(RESPONSE_TIME_HEADER));

        let body = body_of(resp).await;
        assert_eq!(
            body,
            Bytes::from_static(br#"{"body":{"agency":{"tag":"sf-muni","title":"San Francisco Muni"}}}"#)
        );

        let calls = h.fetcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command(), "agencyList");

        assert_eq!(h.cache.get(&CacheKey::from_url("/agencies")), Some(body));

        let records = h.log.slowest(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method, "GET");
        assert_eq!(records[0].url, "/agencies");
        assert!(records[0].response_time.is_some_and(|t| t >= 0));
    }

    #[tokio::test]
    async fn repeat_within_ttl_is_served_from_cache() {
        let h = harness(120);
        let first = body_of(get(&h, "/agencies").await).await;
        let second = get(&h, "/agencies").await;

        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_of(second).await, first);
        assert_eq!(h.fetcher.calls().len(), 1);

        let records = h.log.slowest(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.url == "/agencies"));
        assert!(records.iter().all(|r| r.response_time.is_some()));
    }

    #[tokio::test]
    async fn multi_stop_predictions_repeat_stops() {
        let h = harness(120);
        get(&h, "/agencies/sf-muni/stopTags/5184-5185").await;

        let calls = h.fetcher.calls();
        assert_eq!(calls[0].command(), "predictionsForMultiStops");
        assert_eq!(
            calls[0].query_string(),
            "command=predictionsForMultiStops&a=sf-muni&stops=5184&stops=5185"
        );
    }

    #[tokio::test]
    async fn vehicle_locations_default_to_time_zero() {
        let h = harness(120);
        get(&h, "/agencies/sf-muni/routes/N/vehicleLocations").await;

        let calls = h.fetcher.calls();
        assert_eq!(calls[0].command(), "vehicleLocations");
        assert_eq!(calls[0].values("t").collect::<Vec<_>>(), vec!["0"]);
    }

    #[tokio::test]
    async fn fetch_failure_is_not_cached_and_retried_next_time() {
        let h = harness(120);
        h.fetcher.fail(true);

        let resp = get(&h, "/agencies/sf-muni").await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(h.cache.get(&CacheKey::from_url("/agencies/sf-muni")).is_none());

        let records = h.log.slowest(10).await.unwrap();
        assert!(records[0].response_time.is_some());

        h.fetcher.fail(false);
        let resp = get(&h, "/agencies/sf-muni").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn malformed_feed_body_is_an_upstream_error() {
        let h = harness(120);
        h.fetcher.respond_with("this is not xml");

        let resp = get(&h, "/agencies").await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn differing_queries_are_cached_separately() {
        let h = harness(120);
        get(&h, "/agencies/sf-muni/routes?terse").await;
        get(&h, "/agencies/sf-muni/routes?verbose").await;
        get(&h, "/agencies/sf-muni/routes?terse").await;

        let calls = h.fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].values("terse").count(), 1);
        assert_eq!(calls[1].values("verbose").count(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let h = harness(0);
        get(&h, "/agencies").await;
        get(&h, "/agencies").await;
        assert_eq!(h.fetcher.calls().len(), 2);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn requests_lists_url_counts_uncached() {
        let h = harness(120);
        get(&h, "/agencies").await;
        get(&h, "/agencies").await;

        let body = body_of(get(&h, "/requests").await).await;
        let counts: serde_json::Value = serde_json::from_slice(&body).unwrap();
        // The /requests call itself is logged before the query runs.
        assert_eq!(
            counts,
            serde_json::json!([
                {"url": "/requests", "num": 1},
                {"url": "/agencies", "num": 2}
            ])
        );
        assert!(h.cache.get(&CacheKey::from_url("/requests")).is_none());
    }

    #[tokio::test]
    async fn slowest_is_served_from_store_and_cached() {
        let h = harness(120);
        get(&h, "/agencies").await;

        let first = body_of(get(&h, "/slowest").await).await;
        let records: Vec<serde_json::Value> = serde_json::from_slice(&first).unwrap();
        assert!(records.iter().any(|r| r["url"] == "/agencies"));
        assert!(h.cache.get(&CacheKey::from_url("/slowest")).is_some());

        get(&h, "/agencies/sf-muni").await;
        let second = body_of(get(&h, "/slowest").await).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_route_and_method_are_rejected_but_logged() {
        let h = harness(120);
        assert_eq!(get(&h, "/nope").await.status(), StatusCode::NOT_FOUND);

        let uri: Uri = "/agencies".parse().unwrap();
        let resp = h.dispatcher.handle(&Method::POST, &uri).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        assert!(h.fetcher.calls().is_empty());
        assert_eq!(h.log.slowest(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn index_lists_routes() {
        let h = harness(120);
        let resp = get(&h, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let index: serde_json::Value = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(index["name"], "busgate");
        assert!(index["routes"].as_array().unwrap().len() > 10);
    }

    #[tokio::test]
    async fn concurrent_misses_each_fetch() {
        let h = Arc::new(harness(120));
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let h = h.clone();
            tasks.push(tokio::spawn(async move {
                get(&h, "/agencies").await.status()
            }));
        }
        for t in tasks {
            assert_eq!(t.await.unwrap(), StatusCode::OK);
        }
        let calls = h.fetcher.calls().len();
        assert!((1..=4).contains(&calls));
        assert_eq!(h.log.url_counts(10).await.unwrap()[0].num, 4);
    }

    fn with_log(log: FailingLog) -> (Dispatcher, Arc<ResponseCache>, Arc<RecordingFetcher>) {
        let cache = Arc::new(ResponseCache::new());
        let fetcher = Arc::new(RecordingFetcher::new(AGENCY_LIST_XML));
        let dispatcher = Dispatcher::new(cache.clone(), fetcher.clone(), Arc::new(log), 120);
        (dispatcher, cache, fetcher)
    }

    #[tokio::test]
    async fn failed_begin_aborts_before_dispatch() {
        let (dispatcher, cache, fetcher) = with_log(FailingLog::on_begin());
        let uri: Uri = "/agencies".parse().unwrap();

        let resp = dispatcher.handle(&Method::GET, &uri).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(fetcher.calls().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failed_finish_is_a_server_error() {
        let (dispatcher, _cache, fetcher) = with_log(FailingLog::on_finish());
        let uri: Uri = "/agencies".parse().unwrap();

        let resp = dispatcher.handle(&Method::GET, &uri).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!resp.headers().contains_key(RESPONSE_TIME_HEADER));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_finish_on_cache_hit_is_a_server_error() {
        let (dispatcher, cache, fetcher) = with_log(FailingLog::on_finish());
        cache.put(
            CacheKey::from_url("/agencies"),
            Bytes::from_static(b"{}"),
            std::time::Duration::from_secs(60),
        );
        let uri: Uri = "/agencies".parse().unwrap();

        let resp = dispatcher.handle(&Method::GET, &uri).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(fetcher.calls().is_empty());
    }
}
