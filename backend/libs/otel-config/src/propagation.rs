//! Trace-context carrier over queue message attributes
//!
//! SQS message attributes are string-typed, so W3C trace-context headers
//! (`traceparent`, `tracestate`) travel as plain string attributes. The API
//! injects from its current span at enqueue; the worker extracts into the
//! parent context of its per-message root span.

use std::collections::HashMap;

use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::{global, Context};
use tracing_opentelemetry::OpenTelemetrySpanExt;

struct AttributeExtractor<'a>(&'a HashMap<String, String>);

impl<'a> Extractor for AttributeExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

struct AttributeInjector<'a>(&'a mut HashMap<String, String>);

impl<'a> Injector for AttributeInjector<'a> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

/// Serialize the given span's trace context into string attributes.
pub fn inject_trace_context(span: &tracing::Span) -> HashMap<String, String> {
    let context = span.context();
    let mut attributes = HashMap::new();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&context, &mut AttributeInjector(&mut attributes));
    });
    attributes
}

/// Rebuild a parent context from received message attributes.
pub fn extract_trace_context(attributes: &HashMap<String, String>) -> Context {
    global::get_text_map_propagator(|propagator| {
        propagator.extract(&AttributeExtractor(attributes))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TraceContextExt;

    #[test]
    fn test_extract_without_headers_is_root() {
        // No propagator configured and no headers: the extracted context
        // has no remote span, so the caller's span becomes a root.
        let context = extract_trace_context(&HashMap::new());
        assert!(!context
            .span()
            .span_context()
            .is_valid());
    }

    #[test]
    fn test_carrier_round_trip_keys() {
        let mut map = HashMap::new();
        {
            let mut injector = AttributeInjector(&mut map);
            injector.set("traceparent", "00-abc-def-01".to_string());
        }
        let extractor = AttributeExtractor(&map);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }
}
