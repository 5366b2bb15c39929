//! Test helpers for the transport module.

use std::net::{SocketAddr, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::{ConnectionHandler, StopToken};

/// Counts handled connections, optionally holding each open until stopped.
pub(crate) struct CountingHandler {
    handled: Arc<AtomicUsize>,
    rejected: Arc<AtomicUsize>,
    hold_until: Option<StopToken>,
}

/// Counters shared with a [`CountingHandler`].
#[derive(Clone)]
pub(crate) struct Counts {
    pub(crate) handled: Arc<AtomicUsize>,
    pub(crate) rejected: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Counts, Arc<Self>) {
        Self::build(None)
    }

    /// Keeps every handled connection open until `token` is stopped.
    pub(crate) fn holding(token: StopToken) -> (Counts, Arc<Self>) {
        Self::build(Some(token))
    }

    fn build(hold_until: Option<StopToken>) -> (Counts, Arc<Self>) {
        let counts = Counts {
            handled: Arc::new(AtomicUsize::new(0)),
            rejected: Arc::new(AtomicUsize::new(0)),
        };
        let handler = Arc::new(Self {
            handled: Arc::clone(&counts.handled),
            rejected: Arc::clone(&counts.rejected),
            hold_until,
        });
        (counts, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: TcpStream, _peer: SocketAddr) {
        self.handled.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.hold_until {
            while !token.is_stopped() {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
    }

    fn reject(&self, _stream: TcpStream, _peer: SocketAddr) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }
}
