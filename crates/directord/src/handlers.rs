//! Handlers installed on every server.
//!
//! `ping` and `metrics` are always answered. `query`, `plan`, and `analyze`
//! are service slots: they validate their payload and report the service as
//! unavailable until an extension or embedding application registers a real
//! handler under the same name.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::metrics::MetricsCollector;
use crate::registry::{Handler, HandlerError, HandlerFields, HandlerRegistry, HandlerResult};

/// Request types reserved for pluggable services.
pub const SERVICE_SLOTS: [&str; 3] = ["query", "plan", "analyze"];

/// Payload that asks the `metrics` handler to reset the counters.
pub const METRICS_RESET: &str = "reset";

/// Registers `ping`, `metrics`, and the service slots.
pub fn register_builtin_handlers(
    registry: &HandlerRegistry,
    metrics: Option<Arc<MetricsCollector>>,
) {
    registry.register_fn("ping", ping);
    registry.register("metrics", MetricsHandler { metrics });
    for slot in SERVICE_SLOTS {
        registry.register(slot, ServiceSlot { name: slot });
    }
}

fn ping(_data: &Value) -> HandlerResult {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|error| HandlerError::failed(format!("system clock error: {error}")))?
        .as_secs_f64();
    let mut fields = HandlerFields::new();
    fields.insert("message".to_owned(), Value::from("pong"));
    fields.insert("timestamp".to_owned(), Value::from(timestamp));
    Ok(fields)
}

struct MetricsHandler {
    metrics: Option<Arc<MetricsCollector>>,
}

impl Handler for MetricsHandler {
    fn handle(&self, data: &Value) -> HandlerResult {
        let Some(metrics) = &self.metrics else {
            return Err(HandlerError::failed("Metrics not enabled"));
        };
        let mut fields = HandlerFields::new();
        if data.as_str() == Some(METRICS_RESET) {
            metrics.reset();
            fields.insert("message".to_owned(), Value::from("Metrics reset"));
            return Ok(fields);
        }
        let snapshot = serde_json::to_value(metrics.snapshot())
            .map_err(|error| HandlerError::failed(format!("failed to encode metrics: {error}")))?;
        fields.insert("metrics".to_owned(), snapshot);
        Ok(fields)
    }
}

struct ServiceSlot {
    name: &'static str,
}

impl Handler for ServiceSlot {
    fn handle(&self, data: &Value) -> HandlerResult {
        match data.as_str() {
            Some(text) if !text.trim().is_empty() => Err(HandlerError::unavailable(self.name)),
            _ => Err(HandlerError::invalid_payload(format!(
                "{} requires a non-empty text payload",
                self.name
            ))),
        }
    }
}
