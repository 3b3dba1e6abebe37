//! Server span middleware
//!
//! Starts a server span for every request, continuing the caller's trace
//! when a valid `traceparent` header is present and starting a new trace
//! otherwise. The span is:
//! - attached to the request as an [`opentelemetry::Context`] extension
//! - the active span while the inner service's future is polled
//! - ended exactly once on every exit path, before the context is detached
//!
//! Attributes: `http.method`, `http.route` (or `http.target` for unmatched
//! requests), and `http.status_code` for responses or `error` with an error
//! status for service errors. Requests dropped before completing end with
//! an error status too.

use crate::metrics::route::route_of;
use crate::trace::extract_parent;
use axum::http::{Request, Response};
use futures::future::BoxFuture;
use opentelemetry::trace::{FutureExt as _, SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context as TraceContext, KeyValue};
use opentelemetry_sdk::trace::SdkTracer;
use std::fmt;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

/// Tower layer applying [`TracingService`]
#[derive(Clone)]
pub struct TracingLayer {
    tracer: SdkTracer,
}

impl TracingLayer {
    pub fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }
}

impl fmt::Debug for TracingLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            tracer: self.tracer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    tracer: SdkTracer,
}

impl<S: fmt::Debug> fmt::Debug for TracingService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let trace_cx = self.start_span(&request);
        request.extensions_mut().insert(trace_cx.clone());

        let span_context = trace_cx.span().span_context().clone();
        let log_span = tracing::info_span!(
            "request",
            trace_id = %span_context.trace_id(),
            span_id = %span_context.span_id(),
        );

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let mut end = SpanEnd::new(trace_cx.clone());

        Box::pin(
            async move {
                let result = inner.call(request).instrument(log_span).await;

                match &result {
                    Ok(response) => end.completed(response.status().as_u16()),
                    Err(_) => end.failed(),
                }
                // ended while the context is still attached
                drop(end);
                result
            }
            .with_context(trace_cx),
        )
    }
}

impl<S> TracingService<S> {
    fn start_span<B>(&self, request: &Request<B>) -> TraceContext {
        let parent = extract_parent(request.headers());
        let method = request.method().as_str();

        let (name, location) = match route_of(request) {
            Some(route) => (
                format!("{} {}", method, route),
                KeyValue::new("http.route", route.to_string()),
            ),
            None => {
                let target = request.uri().path();
                (
                    format!("{} {}", method, target),
                    KeyValue::new("http.target", target.to_string()),
                )
            }
        };

        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .with_attributes([location, KeyValue::new("http.method", method.to_string())])
            .start_with_context(&self.tracer, &parent);

        let remote_parent = parent.span().span_context().is_valid();
        let cx = parent.with_span(span);
        tracing::debug!(
            trace_id = %cx.span().span_context().trace_id(),
            span_id = %cx.span().span_context().span_id(),
            remote_parent,
            "Started server span"
        );
        cx
    }
}

/// Ends the server span when dropped
///
/// A span dropped without an outcome ended with an error status.
struct SpanEnd {
    cx: TraceContext,
    outcome: bool,
}

impl SpanEnd {
    fn new(cx: TraceContext) -> Self {
        Self { cx, outcome: false }
    }

    fn completed(&mut self, status: u16) {
        self.cx
            .span()
            .set_attribute(KeyValue::new("http.status_code", i64::from(status)));
        self.outcome = true;
    }

    fn failed(&mut self) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new("error", true));
        span.set_status(Status::error("service error"));
        self.outcome = true;
    }
}

impl Drop for SpanEnd {
    fn drop(&mut self) {
        let span = self.cx.span();
        if !self.outcome {
            span.set_status(Status::error("request did not complete"));
        }
        span.end();

        let span_context = span.span_context();
        tracing::debug!(
            trace_id = %span_context.trace_id(),
            span_id = %span_context.span_id(),
            completed = self.outcome,
            "Server span finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::route::RouteTag;
    use crate::trace::{self, current_span_context};
    use axum::http::StatusCode;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::{ServiceExt, service_fn};

    fn recording() -> (SdkTracer, SdkTracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (trace::tracer(&provider), provider, exporter)
    }

    fn finished(provider: &SdkTracerProvider, exporter: &InMemorySpanExporter) -> Vec<SpanData> {
        provider.force_flush().unwrap();
        exporter.get_finished_spans().unwrap()
    }

    fn attr(span: &SpanData, key: &str) -> Option<String> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }

    #[tokio::test]
    async fn test_span_is_attached_and_current() {
        let (tracer, provider, exporter) = recording();
        let service = TracingLayer::new(tracer).layer(service_fn(|req: Request<()>| async move {
            let attached = req
                .extensions()
                .get::<TraceContext>()
                .map(|cx| cx.span().span_context().span_id());
            let current = current_span_context().map(|sc| sc.span_id());
            assert_eq!(attached, current, "extension and current span agree");
            assert!(attached.is_some());
            Ok::<_, Infallible>(Response::new(()))
        }));

        let mut request = Request::builder().uri("/status").body(()).unwrap();
        request.extensions_mut().insert(RouteTag::new("/status"));
        service.oneshot(request).await.unwrap();

        let spans = finished(&provider, &exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "GET /status");
        assert_eq!(spans[0].span_kind, SpanKind::Server);
        assert_eq!(attr(&spans[0], "http.route"), Some("/status".to_string()));
        assert_eq!(attr(&spans[0], "http.method"), Some("GET".to_string()));
        assert_eq!(attr(&spans[0], "http.status_code"), Some("200".to_string()));
        assert!(current_span_context().is_none());
    }

    #[tokio::test]
    async fn test_unmatched_request_is_tagged_with_target() {
        let (tracer, provider, exporter) = recording();
        let service = TracingLayer::new(tracer).layer(service_fn(|_req: Request<()>| async {
            let mut response = Response::new(());
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok::<_, Infallible>(response)
        }));

        let request = Request::builder().uri("/missing?x=1").body(()).unwrap();
        service.oneshot(request).await.unwrap();

        let spans = finished(&provider, &exporter);
        assert_eq!(attr(&spans[0], "http.target"), Some("/missing".to_string()));
        assert_eq!(attr(&spans[0], "http.status_code"), Some("404".to_string()));
        assert!(attr(&spans[0], "http.route").is_none());
    }

    #[tokio::test]
    async fn test_error_ends_span_once_and_propagates() {
        let (tracer, provider, exporter) = recording();
        let service = TracingLayer::new(tracer).layer(service_fn(|_req: Request<()>| async {
            Err::<Response<()>, _>("handler failed")
        }));

        let request = Request::builder().uri("/status").body(()).unwrap();
        let err = service.oneshot(request).await.unwrap_err();

        assert_eq!(err, "handler failed");
        let spans = finished(&provider, &exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(attr(&spans[0], "error"), Some("true".to_string()));
        assert!(matches!(spans[0].status, Status::Error { .. }));
        assert!(current_span_context().is_none());
    }

    #[tokio::test]
    async fn test_dropped_request_still_ends_span() {
        let (tracer, provider, exporter) = recording();
        let service = TracingLayer::new(tracer).layer(service_fn(|_req: Request<()>| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Infallible>(Response::new(()))
        }));

        let request = Request::builder().uri("/slow").body(()).unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(10), service.oneshot(request)).await;
        assert!(outcome.is_err());

        let spans = finished(&provider, &exporter);
        assert_eq!(spans.len(), 1);
        assert!(matches!(spans[0].status, Status::Error { .. }));
        assert!(attr(&spans[0], "http.status_code").is_none());
    }

    #[tokio::test]
    async fn test_remote_parent_is_continued() {
        let (tracer, provider, exporter) = recording();
        let service = TracingLayer::new(tracer).layer(service_fn(|_req: Request<()>| async {
            Ok::<_, Infallible>(Response::new(()))
        }));

        let request = Request::builder()
            .uri("/nodes")
            .header(
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            )
            .body(())
            .unwrap();
        service.oneshot(request).await.unwrap();

        let spans = finished(&provider, &exporter);
        assert_eq!(
            spans[0].span_context.trace_id().to_string(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(spans[0].parent_span_id.to_string(), "00f067aa0ba902b7");
    }
}
