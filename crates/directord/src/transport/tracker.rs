//! Bookkeeping for live client connections.
//!
//! The tracker holds a cloned handle of every accepted socket so shutdown can
//! wait for workers to finish and force-close the ones that do not.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use super::LISTENER_TARGET;

#[derive(Debug, Default)]
pub(crate) struct ConnectionTracker {
    state: Mutex<TrackerState>,
    idle: Condvar,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_id: u64,
    live: HashMap<u64, (SocketAddr, TcpStream)>,
}

/// Keeps a connection registered until dropped.
#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
    id: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release(self.id);
    }
}

impl ConnectionTracker {
    pub(crate) fn active(&self) -> usize {
        self.lock().live.len()
    }

    pub(crate) fn track(
        self: &Arc<Self>,
        stream: &TcpStream,
        peer: SocketAddr,
    ) -> io::Result<ConnectionGuard> {
        let handle = stream.try_clone()?;
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        state.live.insert(id, (peer, handle));
        Ok(ConnectionGuard {
            tracker: Arc::clone(self),
            id,
        })
    }

    fn release(&self, id: u64) {
        let mut state = self.lock();
        state.live.remove(&id);
        if state.live.is_empty() {
            self.idle.notify_all();
        }
    }

    /// Blocks until no connections remain or `timeout` elapses.
    ///
    /// Returns `true` when every connection finished in time.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .idle
            .wait_timeout_while(state, timeout, |state| !state.live.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.live.is_empty()
    }

    /// Shuts down every remaining socket and returns how many were closed.
    pub(crate) fn close_all(&self) -> usize {
        let state = self.lock();
        for (peer, stream) in state.live.values() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => debug!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    "force-closed connection"
                ),
                Err(error) if error.kind() == io::ErrorKind::NotConnected => {}
                Err(error) => warn!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    error = %error,
                    "failed to force-close connection"
                ),
            }
        }
        state.live.len()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn socket_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        let client = TcpStream::connect(addr).expect("connect client");
        let (server, peer) = listener.accept().expect("accept client");
        (client, server, peer)
    }

    #[test]
    fn guard_drop_releases_connection() {
        let tracker = Arc::new(ConnectionTracker::default());
        let (_client, server, peer) = socket_pair();

        let guard = tracker.track(&server, peer).expect("track connection");
        assert_eq!(tracker.active(), 1);
        drop(guard);

        assert_eq!(tracker.active(), 0);
        assert!(tracker.wait_idle(Duration::from_millis(10)));
    }

    #[test]
    fn wait_idle_wakes_when_last_worker_finishes() {
        let tracker = Arc::new(ConnectionTracker::default());
        let (_client, server, peer) = socket_pair();
        let guard = tracker.track(&server, peer).expect("track connection");

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(guard);
        });

        assert!(tracker.wait_idle(Duration::from_secs(2)));
        worker.join().expect("worker thread");
    }

    #[test]
    fn close_all_unblocks_peers() {
        let tracker = Arc::new(ConnectionTracker::default());
        let (mut client, server, peer) = socket_pair();
        let _guard = tracker.track(&server, peer).expect("track connection");

        assert!(!tracker.wait_idle(Duration::from_millis(20)));
        assert_eq!(tracker.close_all(), 1);

        let mut buffer = [0_u8; 8];
        let read = client.read(&mut buffer).expect("read after close");
        assert_eq!(read, 0, "client should observe end of stream");
    }
}
