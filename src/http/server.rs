//! Per-connection HTTP serving and request dispatch.
//!
//! # Responsibilities
//! - Serve one accepted connection with hyper (HTTP/1.1 and HTTP/2)
//! - Resolve the matched handler chain from the current route snapshot
//! - Resolve the real client address through the trusted-proxy list
//! - Produce the 404 path cheaply when nothing matches

use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::http::context::Context;
use crate::http::handler::run_chain;
use crate::net::trusted::TrustedProxies;
use crate::routing::{Params, Router};

/// Shared, read-only state for in-flight requests.
///
/// The route tree is read through an atomic snapshot pointer, so concurrent
/// requests never take a lock and never observe a half-inserted node even
/// while registration continues. The trusted-proxy list is immutable after
/// startup.
pub(crate) struct Dispatcher {
    routes: Arc<ArcSwap<Router>>,
    trusted: TrustedProxies,
}

impl Dispatcher {
    pub(crate) fn new(routes: Arc<ArcSwap<Router>>, trusted: TrustedProxies) -> Self {
        Self { routes, trusted }
    }

    /// Dispatch one parsed request to its handler chain. The body type is
    /// generic because the dispatch core never touches it.
    pub(crate) async fn dispatch<B>(
        &self,
        peer: Option<IpAddr>,
        request: Request<B>,
    ) -> Response<Full<Bytes>> {
        // The dispatch core never reads bodies; they stay with hyper.
        let (parts, _body) = request.into_parts();

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());
        let client_ip = peer.map(|p| self.trusted.resolve(p, forwarded));

        let routes = self.routes.load_full();
        match routes.resolve(&parts.method, parts.uri.path()) {
            Some((chain, params)) => {
                tracing::debug!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    captures = params.len(),
                    "route matched"
                );
                let chain = chain.clone();
                let mut ctx = Context::new(parts, params, client_ip);
                run_chain(&chain, &mut ctx).await;
                ctx.into_response()
            }
            None => {
                tracing::debug!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    "no route matched"
                );
                match routes.no_route() {
                    Some(chain) => {
                        let chain = chain.clone();
                        let mut ctx = Context::new(parts, Params::default(), client_ip);
                        ctx.status(StatusCode::NOT_FOUND);
                        run_chain(&chain, &mut ctx).await;
                        ctx.into_response()
                    }
                    None => not_found(),
                }
            }
        }
    }
}

fn not_found() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"404 page not found")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Serve one accepted connection until the client closes it.
///
/// `peer` is the socket peer address, `None` on transports without one.
/// Protocol errors end the connection but are never fatal to the listener.
pub(crate) async fn serve_connection<I>(stream: I, dispatcher: Arc<Dispatcher>, peer: Option<IpAddr>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |request: Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move { Ok::<_, Infallible>(dispatcher.dispatch(peer, request).await) }
    });

    if let Err(err) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
    {
        tracing::debug!(error = %err, "connection closed with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use http_body_util::BodyExt;
    use hyper::Method;

    fn dispatcher_with(router: Router, trusted: TrustedProxies) -> Dispatcher {
        Dispatcher::new(Arc::new(ArcSwap::from_pointee(router)), trusted)
    }

    fn request(method: Method, path: &str) -> Request<()> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .expect("test request")
    }

    async fn body_of(response: Response<Full<Bytes>>) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
    }

    #[tokio::test]
    async fn dispatches_to_matched_chain_with_params() {
        let mut router = Router::new();
        router
            .register(
                Method::GET,
                "/users/:id",
                vec![handler_fn(|ctx| {
                    let id = ctx.param("id").unwrap_or("").to_string();
                    ctx.string(StatusCode::OK, format!("user {id}"));
                })],
            )
            .unwrap();
        let dispatcher = dispatcher_with(router, TrustedProxies::default());

        let response = dispatcher
            .dispatch(None, request(Method::GET, "/users/42"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "user 42");
    }

    #[tokio::test]
    async fn unmatched_request_is_a_plain_404() {
        let dispatcher = dispatcher_with(Router::new(), TrustedProxies::default());
        let response = dispatcher
            .dispatch(None, request(Method::GET, "/missing"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "404 page not found");
    }

    #[tokio::test]
    async fn no_route_chain_replaces_the_default_404() {
        let mut router = Router::new();
        router.set_no_route(vec![handler_fn(|ctx| {
            ctx.string(StatusCode::NOT_FOUND, "custom fallback");
        })]);
        let dispatcher = dispatcher_with(router, TrustedProxies::default());

        let response = dispatcher
            .dispatch(None, request(Method::GET, "/missing"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "custom fallback");
    }

    #[tokio::test]
    async fn forwarded_for_is_resolved_through_trusted_proxies() {
        let mut router = Router::new();
        router
            .register(
                Method::GET,
                "/ip",
                vec![handler_fn(|ctx| {
                    let ip = ctx
                        .client_ip()
                        .map(|ip| ip.to_string())
                        .unwrap_or_default();
                    ctx.string(StatusCode::OK, ip);
                })],
            )
            .unwrap();
        let trusted = TrustedProxies::parse(&["10.0.0.0/8".to_string()]).unwrap();
        let dispatcher = dispatcher_with(router, trusted);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/ip")
            .header("x-forwarded-for", "203.0.113.9")
            .body(())
            .unwrap();
        let response = dispatcher.dispatch(Some("10.1.2.3".parse().unwrap()), req).await;
        assert_eq!(body_of(response).await, "203.0.113.9");
    }
}
