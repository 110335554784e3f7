use busgate_upstream::UpstreamQuery;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::debug;

/// Separator used to pass several stop or route tags in one path segment.
const TAG_SEPARATOR: char = '-';

/// Default `t` for vehicle locations: everything from the last 15 minutes.
const DEFAULT_LAST_TIME: &str = "0";

/// Route shapes served by the proxy, listed on the index page.
pub const ROUTE_TEMPLATES: &[&str] = &[
    "/agencies",
    "/agencies/{agencyTag}",
    "/agencies/{agencyTag}/routes",
    "/agencies/{agencyTag}/routes/{routeTag}",
    "/agencies/{agencyTag}/routes/{routeTag}/stopIds/{stopId}",
    "/agencies/{agencyTag}/routes/{routeTag}/stopTags/{stopTag}",
    "/agencies/{agencyTag}/stopIds/{stopId}",
    "/agencies/{agencyTag}/stopTags/{stopTag1-stopTag2-...}",
    "/agencies/{agencyTag}/routes/{routeTag}/schedules",
    "/agencies/{agencyTag}/routes/{routeTag}/vehicleLocations/{lastTime?}",
    "/agencies/{agencyTag}/messages",
    "/agencies/{agencyTag}/messages/{routeTag1-routeTag2-...}",
    "/requests",
    "/slowest",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route for path '{0}'")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    Agencies,
    Agency {
        agency: String,
    },
    Routes {
        agency: String,
    },
    RouteConfig {
        agency: String,
        route: String,
    },
    RouteStopIdPredictions {
        agency: String,
        route: String,
        stop_id: String,
    },
    RouteStopTagPredictions {
        agency: String,
        route: String,
        stop_tag: String,
    },
    StopIdPredictions {
        agency: String,
        stop_id: String,
    },
    MultiStopPredictions {
        agency: String,
        stop_tags: Vec<String>,
    },
    Schedules {
        agency: String,
        route: String,
    },
    VehicleLocations {
        agency: String,
        route: String,
        last_time: String,
    },
    Messages {
        agency: String,
    },
    RouteMessages {
        agency: String,
        routes: Vec<String>,
    },
    Requests,
    Slowest,
}

impl Route {
    /// Matches a request path (without query). Trailing slashes are ignored.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect();
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();

        let route = match parts.as_slice() {
            [] => Route::Index,
            ["requests"] => Route::Requests,
            ["slowest"] => Route::Slowest,
            ["agencies"] => Route::Agencies,
            ["agencies", a] => Route::Agency { agency: s(a) },
            ["agencies", a, "routes"] => Route::Routes { agency: s(a) },
            ["agencies", a, "routes", r] => Route::RouteConfig {
                agency: s(a),
                route: s(r),
            },
            ["agencies", a, "routes", r, "stopIds", id] => Route::RouteStopIdPredictions {
                agency: s(a),
                route: s(r),
                stop_id: s(id),
            },
            ["agencies", a, "routes", r, "stopTags", tag] => Route::RouteStopTagPredictions {
                agency: s(a),
                route: s(r),
                stop_tag: s(tag),
            },
            ["agencies", a, "routes", r, "schedules"] => Route::Schedules {
                agency: s(a),
                route: s(r),
            },
            ["agencies", a, "routes", r, "vehicleLocations", rest @ ..] => {
                Route::VehicleLocations {
                    agency: s(a),
                    route: s(r),
                    last_time: rest.first().map_or(DEFAULT_LAST_TIME, |t| *t).to_string(),
                }
            }
            ["agencies", a, "stopIds", id] => Route::StopIdPredictions {
                agency: s(a),
                stop_id: s(id),
            },
            ["agencies", a, "stopTags", tags] => Route::MultiStopPredictions {
                agency: s(a),
                stop_tags: split_tags(tags),
            },
            ["agencies", a, "messages"] => Route::Messages { agency: s(a) },
            ["agencies", a, "messages", routes] => Route::RouteMessages {
                agency: s(a),
                routes: split_tags(routes),
            },
            _ => return Err(RouteError::NotFound(path.to_string())),
        };

        debug!(target: "busgate::router", %path, ?route, "Matched route");
        Ok(route)
    }

    /// Whether responses for this route go through the response cache.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Route::Index | Route::Requests)
    }

    /// Whether the client's query string is forwarded to the feed.
    pub fn forwards_query(&self) -> bool {
        matches!(
            self,
            Route::Routes { .. }
                | Route::RouteConfig { .. }
                | Route::RouteStopIdPredictions { .. }
                | Route::RouteStopTagPredictions { .. }
                | Route::StopIdPredictions { .. }
                | Route::MultiStopPredictions { .. }
        )
    }

    /// Feed call for this route, or `None` for routes served locally.
    pub fn upstream_query(&self, raw_query: Option<&str>) -> Option<UpstreamQuery> {
        let query = match self {
            Route::Index | Route::Requests | Route::Slowest => return None,
            Route::Agencies => UpstreamQuery::new("agencyList"),
            Route::Agency { agency } => UpstreamQuery::new("routeList").param("a", agency),
            Route::Routes { agency } => UpstreamQuery::new("routeConfig").param("a", agency),
            Route::RouteConfig { agency, route } => UpstreamQuery::new("routeConfig")
                .param("a", agency)
                .param("r", route),
            Route::RouteStopIdPredictions {
                agency,
                route,
                stop_id,
            } => UpstreamQuery::new("predictions")
                .param("a", agency)
                .param("r", route)
                .param("stopId", stop_id),
            Route::RouteStopTagPredictions {
                agency,
                route,
                stop_tag,
            } => UpstreamQuery::new("predictions")
                .param("a", agency)
                .param("r", route)
                .param("s", stop_tag),
            Route::StopIdPredictions { agency, stop_id } => UpstreamQuery::new("predictions")
                .param("a", agency)
                .param("stopId", stop_id),
            Route::MultiStopPredictions { agency, stop_tags } => {
                UpstreamQuery::new("predictionsForMultiStops")
                    .param("a", agency)
                    .repeated("stops", stop_tags.iter().cloned())
            }
            Route::Schedules { agency, route } => UpstreamQuery::new("schedule")
                .param("a", agency)
                .param("r", route),
            Route::VehicleLocations {
                agency,
                route,
                last_time,
            } => UpstreamQuery::new("vehicleLocations")
                .param("a", agency)
                .param("r", route)
                .param("t", last_time),
            Route::Messages { agency } => UpstreamQuery::new("messages").param("a", agency),
            Route::RouteMessages { agency, routes } => UpstreamQuery::new("messages")
                .param("a", agency)
                .repeated("r", routes.iter().cloned()),
        };

        if self.forwards_query() {
            Some(query.passthrough(parse_query(raw_query)))
        } else {
            Some(query)
        }
    }
}

/// Decodes `a=1&verbose` into `[("a", "1"), ("verbose", "")]`.
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    match raw {
        Some(q) if !q.is_empty() => url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(TAG_SEPARATOR)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn s(v: &str) -> String {
    v.to_string()
}
