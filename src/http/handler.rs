//! Handler chain abstraction.
//!
//! A chain is an ordered sequence of handlers bound to one registered route.
//! The dispatch core treats each handler as opaque: something invocable with
//! a per-request [`Context`] that can read path parameters and the resolved
//! client address and write a response. Body encoding, templating and
//! middleware composition live outside this crate.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::context::Context;

/// One request-processing unit of a handler chain.
pub trait Handler: Send + Sync {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()>;
}

/// Ordered sequence of handlers bound to one route. Cloning shares the
/// underlying handlers, which keeps route-tree snapshots cheap.
pub type HandlerChain = Vec<Arc<dyn Handler>>;

// Async closures implement Handler directly.
impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
        self(ctx)
    }
}

struct SyncHandler<F>(F);

impl<F> Handler for SyncHandler<F>
where
    F: Fn(&mut Context) + Send + Sync,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
        (self.0)(ctx);
        Box::pin(std::future::ready(()))
    }
}

/// Wrap a plain synchronous closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(SyncHandler(f))
}

/// Run `chain` front to back, stopping early once a handler aborts.
pub(crate) async fn run_chain(chain: &HandlerChain, ctx: &mut Context) {
    for handler in chain {
        handler.handle(ctx).await;
        if ctx.is_aborted() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[tokio::test]
    async fn chain_runs_in_order() {
        let chain: HandlerChain = vec![
            handler_fn(|ctx| ctx.string(StatusCode::OK, "first")),
            handler_fn(|ctx| ctx.string(StatusCode::OK, "second")),
        ];
        let mut ctx = Context::for_test();
        run_chain(&chain, &mut ctx).await;
        assert_eq!(ctx.body_str(), "second");
    }

    #[tokio::test]
    async fn abort_stops_the_chain() {
        let chain: HandlerChain = vec![
            handler_fn(|ctx| ctx.abort_with_status(StatusCode::FORBIDDEN)),
            handler_fn(|ctx| ctx.string(StatusCode::OK, "never runs")),
        ];
        let mut ctx = Context::for_test();
        run_chain(&chain, &mut ctx).await;
        assert!(ctx.body_str().is_empty());
        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
