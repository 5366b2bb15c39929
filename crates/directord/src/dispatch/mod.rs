//! Newline-delimited JSON request dispatch.
//!
//! This module implements the per-connection request loop: it frames bytes
//! into lines, parses each line as a request envelope, routes it through the
//! [`RequestRouter`], and writes one response line back. The dispatcher
//! integrates with the transport layer via the `ConnectionHandler` trait.
//!
//! ## Protocol
//!
//! Clients send one JSON object per line:
//!
//! ```json
//! {"type":"ping","data":null}
//! ```
//!
//! The server answers each line, in order, with one JSON object:
//!
//! ```json
//! {"status":"success","message":"pong","timestamp":1718000000.12,"processing_time_ms":0.04}
//! {"status":"error","error":"Unknown request type: bogus","processing_time_ms":0.01}
//! ```
//!
//! A line that is not valid JSON is answered with `Invalid JSON format` and the
//! connection stays open. A line longer than the configured limit is answered
//! once and the connection is closed.

mod errors;
mod framing;
mod handler;
mod request;
mod response;
mod router;

pub use self::errors::DispatchError;
pub use self::handler::{ConnectionSettings, DispatchConnectionHandler};
pub use self::request::Request;
pub use self::response::{Response, ResponseWriter, Status};
pub use self::router::{INVALID_BUCKET, RequestRouter};
