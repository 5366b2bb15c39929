//! Request routing for parsed request envelopes.
//!
//! The router resolves a handler by request type, runs it, builds the
//! response envelope, and records exactly one metrics observation per routed
//! request. Requests without a type are recorded under [`INVALID_BUCKET`];
//! unknown types are recorded under their own name.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::metrics::MetricsCollector;
use crate::registry::{Handler, HandlerRegistry};

use super::request::Request;
use super::response::Response;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Metrics bucket for requests that carry no usable type.
pub const INVALID_BUCKET: &str = "invalid";

const MISSING_TYPE: &str = "Missing request type";

/// Routes requests to registered handlers.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    registry: Arc<HandlerRegistry>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RequestRouter {
    /// Creates a router over `registry`; `metrics` is `None` when disabled.
    pub fn new(registry: Arc<HandlerRegistry>, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { registry, metrics }
    }

    /// Routes a parsed request.
    pub fn route(&self, request: &Request) -> Response {
        self.dispatch(request.request_type(), request.data())
    }

    /// Routes `data` to the handler for `request_type`.
    ///
    /// Never fails: every failure mode becomes an error response.
    pub fn dispatch(&self, request_type: Option<&str>, data: &Value) -> Response {
        let started = Instant::now();
        let epoch = self.metrics.as_ref().map(|metrics| metrics.epoch());

        let Some(request_type) = request_type.filter(|name| !name.trim().is_empty()) else {
            debug!(target: DISPATCH_TARGET, "request without a type");
            return self.finish(INVALID_BUCKET, epoch, started, Response::error(MISSING_TYPE));
        };

        let Some(handler) = self.registry.resolve(request_type) else {
            warn!(
                target: DISPATCH_TARGET,
                request_type,
                "unknown request type"
            );
            let response = Response::error(format!("Unknown request type: {request_type}"));
            return self.finish(request_type, epoch, started, response);
        };

        let response = invoke(request_type, handler.as_ref(), data);
        self.finish(request_type, epoch, started, response)
    }

    fn finish(
        &self,
        bucket: &str,
        epoch: Option<u64>,
        started: Instant,
        response: Response,
    ) -> Response {
        let elapsed = started.elapsed();
        if let (Some(metrics), Some(epoch)) = (&self.metrics, epoch) {
            metrics.record_since(epoch, bucket, elapsed, response.is_success());
        }
        debug!(
            target: DISPATCH_TARGET,
            request_type = bucket,
            success = response.is_success(),
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "request dispatched"
        );
        response.with_processing_time(elapsed)
    }
}

fn invoke(request_type: &str, handler: &dyn Handler, data: &Value) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(data))) {
        Ok(Ok(fields)) => Response::success(fields),
        Ok(Err(failure)) => {
            debug!(
                target: DISPATCH_TARGET,
                request_type,
                error = %failure,
                "handler reported failure"
            );
            Response::error(failure.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                target: DISPATCH_TARGET,
                request_type,
                panic = %message,
                "handler panicked"
            );
            Response::error(format!("Handler error: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}
