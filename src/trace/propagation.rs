//! W3C trace context extraction from inbound request headers

use axum::http::HeaderMap;
use opentelemetry::Context;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Header carrying the W3C trace parent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Exposes an [`HeaderMap`] as an OpenTelemetry text carrier
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    /// Non UTF-8 values read as missing
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.to_str().ok()
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Remote parent context carried by `headers`
///
/// Returns an empty context when the `traceparent` header is missing or
/// invalid, so spans started from it become trace roots. The result never
/// inherits the caller's current context.
pub fn extract_parent(headers: &HeaderMap) -> Context {
    let cx = TraceContextPropagator::new()
        .extract_with_context(&Context::new(), &HeaderExtractor(headers));

    if let Some(value) = headers.get(TRACEPARENT_HEADER) {
        let valid = cx.span().span_context().is_valid();
        if !valid {
            tracing::debug!(
                header_len = value.len(),
                "Ignoring invalid traceparent header"
            );
        }
    }
    cx
}
