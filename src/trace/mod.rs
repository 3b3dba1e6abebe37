//! Server spans for inbound requests
//!
//! Spans are OpenTelemetry spans. The parent of each server span comes from
//! the request's `traceparent` header through [`extract_parent`]. While the
//! request is handled, its span is the active span of the OpenTelemetry
//! [`Context`], which is attached only while the request future is polled.
//! Concurrent requests therefore never see each other's spans, and handlers
//! reach theirs through [`Context::current`] or [`set_current_attribute`].

pub mod propagation;

pub use propagation::{HeaderExtractor, TRACEPARENT_HEADER, extract_parent};

use opentelemetry::trace::{SpanContext, TraceContextExt, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

/// Instrumentation scope name of the server tracer
pub const TRACER_NAME: &str = "routestat";

/// Tracer provider identifying spans as coming from `service_name`
///
/// No exporter is installed; the tracing middleware logs every finished span.
pub fn provider(service_name: impl Into<String>) -> SdkTracerProvider {
    let resource = Resource::builder()
        .with_service_name(service_name.into())
        .build();
    SdkTracerProvider::builder().with_resource(resource).build()
}

/// Server tracer from `provider`
///
/// The tracer keeps its provider alive.
pub fn tracer(provider: &SdkTracerProvider) -> SdkTracer {
    provider.tracer(TRACER_NAME)
}

/// Span context of the span active on this task, if any
pub fn current_span_context() -> Option<SpanContext> {
    let cx = Context::current();
    cx.has_active_span()
        .then(|| cx.span().span_context().clone())
}

/// Set an attribute on the span active on this task
///
/// Returns `false` when no span is active.
pub fn set_current_attribute(attribute: KeyValue) -> bool {
    let cx = Context::current();
    if !cx.has_active_span() {
        return false;
    }
    cx.span().set_attribute(attribute);
    true
}
