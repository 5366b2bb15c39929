//! Request-routing IPC server for the Director editor plugin.
//!
//! The daemon listens on a TCP endpoint configured via [`director_config`]
//! and speaks newline-delimited JSON: each request line names a `type` and
//! carries an arbitrary `data` payload, and each response line carries a
//! `status`, the handler's fields, and the measured `processing_time_ms`.
//!
//! Requests are routed through a shared [`HandlerRegistry`]. The built-in
//! handlers answer `ping` and `metrics`; `query`, `plan`, and `analyze` are
//! slots that embedding applications fill through
//! [`Server::register_handler`]. Every routed request is timed and recorded
//! by the [`MetricsCollector`], whose snapshot is available over the wire.
//!
//! Each connection is served on its own thread and answered strictly in
//! order. A failing or panicking handler produces an error response on that
//! connection without affecting any other.
//!
//! ```no_run
//! use director_config::Config;
//! use directord::{HandlerFields, Server};
//!
//! # fn main() -> Result<(), directord::ServerError> {
//! let mut server = Server::new(Config::default());
//! server.register_fn("query", |data| {
//!     let mut fields = HandlerFields::new();
//!     fields.insert("answer".to_owned(), data.clone());
//!     Ok(fields)
//! });
//! server.start()?;
//! # server.stop()?;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod extensions;
mod handlers;
mod health;
mod metrics;
mod process;
mod registry;
mod server;
mod telemetry;
mod transport;

pub use dispatch::{
    ConnectionSettings, DispatchConnectionHandler, DispatchError, INVALID_BUCKET, Request,
    RequestRouter, Response, ResponseWriter, Status,
};
pub use extensions::{Extension, ExtensionCatalog, ExtensionError, UePythonExtension};
pub use handlers::{METRICS_RESET, SERVICE_SLOTS, register_builtin_handlers};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use metrics::{MetricsCollector, MetricsSnapshot, TypeSnapshot};
pub use process::{
    LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_server,
    run_server_with,
};
pub use registry::{Handler, HandlerError, HandlerFields, HandlerRegistry, HandlerResult};
pub use server::{Server, ServerError, ServerState};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionHandler, ListenerError, ListenerHandle, SocketListener, StopToken,
};

#[cfg(test)]
mod tests;
