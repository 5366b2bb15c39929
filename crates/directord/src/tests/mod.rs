//! Test suites for the request-routing server.

pub(crate) mod support;
