//! Per-request context.

use std::net::IpAddr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Response, StatusCode, Uri};

use crate::routing::Params;

/// State handed to every handler in a matched chain.
///
/// Created per request and discarded at request end; never shared between
/// requests. Carries the parsed request head, the path parameters captured
/// by the route tree, the client address resolved through the trusted-proxy
/// list, and the response parts the chain builds up.
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Params,
    client_ip: Option<IpAddr>,
    status: StatusCode,
    body: Bytes,
    aborted: bool,
}

impl Context {
    pub(crate) fn new(parts: Parts, params: Params, client_ip: Option<IpAddr>) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            client_ip,
            status: StatusCode::OK,
            body: Bytes::new(),
            aborted: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Request header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameter captured by the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Client address after trusted-proxy resolution. `None` for transports
    /// without an IP peer (Unix domain sockets).
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// Set the response status without touching the body.
    pub fn status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Write a plain string response.
    pub fn string(&mut self, status: StatusCode, body: impl Into<String>) {
        self.status = status;
        self.body = Bytes::from(body.into());
    }

    /// Stop the chain after the current handler returns.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Set a final status and stop the chain.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.status = status;
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        response
    }

    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        let (parts, ()) = hyper::Request::builder()
            .uri("/")
            .body(())
            .expect("test request")
            .into_parts();
        Self::new(parts, Params::default(), None)
    }

    #[cfg(test)]
    pub(crate) fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).expect("test body is UTF-8")
    }
}
