//! Request metrics middleware
//!
//! Tracks in-flight requests and times each request twice: once on the
//! total timer and, nested inside that, once on the timer of the route the
//! request was matched to (or the `Other` timer for unmatched routes).
//! The route interval is always contained in the total interval.
//!
//! All bookkeeping is held in drop guards, so the counter is restored and
//! both samples are recorded whether the inner service returns a response,
//! returns an error, panics, or has its future dropped mid-flight.

use crate::metrics::HttpMetricsState;
use crate::metrics::route::route_of;
use axum::http::Request;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer applying [`RequestMetricsService`]
#[derive(Clone)]
pub struct RequestMetricsLayer {
    state: Arc<HttpMetricsState>,
}

impl RequestMetricsLayer {
    pub fn new(state: Arc<HttpMetricsState>) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RequestMetricsLayer {
    type Service = RequestMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMetricsService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Service measuring every request passed to the inner service
///
/// The inner service's response or error is returned unchanged.
#[derive(Clone)]
pub struct RequestMetricsService<S> {
    inner: S,
    state: Arc<HttpMetricsState>,
}

impl<S, B> Service<Request<B>> for RequestMetricsService<S>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let state = Arc::clone(&self.state);
        // the clone may not be ready; keep the instance poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let _active = state.enter();
            let route_timer = state.route_timers().resolve(route_of(&request));

            // dropped in reverse order: route sample first, then total
            let _total = state.total_timer().time();
            let _route = route_timer.time();

            inner.call(request).await
        })
    }
}
