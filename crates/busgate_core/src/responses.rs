use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use http_body_util::Full;
use serde::Serialize;

use crate::routing::ROUTE_TEMPLATES;

pub type HttpResponse = Response<Full<Bytes>>;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

const SERVER_NAME: &str = concat!("busgate/", env!("CARGO_PKG_VERSION"));

const UPSTREAM_ERROR_PAGE: &str = "<!DOCTYPE html>\n\
<html>\n\
<head><title>Error</title></head>\n\
<body>\n\
<h1>Something went wrong</h1>\n\
<p>The transit feed could not be reached or returned an unusable answer. Please try again later.</p>\n\
</body>\n\
</html>\n";

/// Generic helper for a response with a binary body.
pub fn send_response(status: StatusCode, content_type: &str, body: Bytes) -> HttpResponse {
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    resp
}

fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    send_response(
        status,
        "text/plain; charset=utf-8",
        Bytes::from_static(body.as_bytes()),
    )
}

/// 200 with a JSON body passed through verbatim.
pub fn json(body: Bytes) -> HttpResponse {
    send_response(StatusCode::OK, JSON_CONTENT_TYPE, body)
}

pub fn json_value<T: Serialize>(value: &T) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(value).map(Bytes::from)
}

#[derive(Serialize)]
struct Index<'a> {
    name: &'a str,
    routes: &'a [&'a str],
}

pub fn index() -> HttpResponse {
    let body = json_value(&Index {
        name: "busgate",
        routes: ROUTE_TEMPLATES,
    })
    .unwrap_or_else(|_| Bytes::from_static(b"{}"));
    json(body)
}

pub fn upstream_error() -> HttpResponse {
    send_response(
        StatusCode::BAD_GATEWAY,
        "text/html; charset=utf-8",
        Bytes::from_static(UPSTREAM_ERROR_PAGE.as_bytes()),
    )
}

pub fn not_found() -> HttpResponse {
    text_response(StatusCode::NOT_FOUND, "404 Not Found\n")
}

pub fn method_not_allowed() -> HttpResponse {
    let mut resp = text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed\n");
    resp.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    resp
}

pub fn internal_error() -> HttpResponse {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
}

/// Stamps `X-Response-Time: <ms>ms`.
pub fn with_response_time(mut resp: HttpResponse, elapsed_ms: u64) -> HttpResponse {
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms}ms")) {
        resp.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }
    resp
}
