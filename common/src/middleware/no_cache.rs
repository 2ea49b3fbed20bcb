//! Disables client and proxy caching.
//!
//! Pages echo submitted connection details and export links point at
//! files that may be replaced, so nothing is cached.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

static SURROGATE_CONTROL: HeaderName = HeaderName::from_static("surrogate-control");

/// Adds the no-cache header set to every response.
pub async fn no_cache_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(SURROGATE_CONTROL.clone(), HeaderValue::from_static("no-store"));
    response
}
