//! Connection handling abstraction for the listener.

use std::net::{Shutdown, SocketAddr, TcpStream};

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until it closes. Runs on its own thread and
    /// should avoid panicking.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);

    /// Turns away a connection accepted while the server is at capacity.
    ///
    /// The default closes the socket without a reply.
    fn reject(&self, stream: TcpStream, _peer: SocketAddr) {
        let _ = stream.shutdown(Shutdown::Both);
    }
}
