//! TCP listener with a background accept loop.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use director_config::ServerEndpoint;

use super::tracker::ConnectionTracker;
use super::{ConnectionHandler, LISTENER_TARGET, ListenerError, StopToken, duration_millis};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const LISTEN_BACKLOG: i32 = 128;

/// Listener bound to a TCP endpoint but not yet accepting.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: ServerEndpoint,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl SocketListener {
    /// Resolves `endpoint` and binds a listening socket with address reuse
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when resolution, binding, or listening fails.
    pub fn bind(endpoint: &ServerEndpoint) -> Result<Self, ListenerError> {
        let listener = bind_tcp(&endpoint.host, endpoint.port)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
            local_addr,
        })
    }

    /// Address actually bound; differs from the endpoint when port `0` was
    /// requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// Each accepted connection is served by `handler` on its own thread.
    /// When `max_connections` is reached, new connections go to
    /// [`ConnectionHandler::reject`] instead. The loop exits once `stop` is
    /// triggered.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the socket cannot be switched to
    /// non-blocking mode or the thread cannot be spawned.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        stop: StopToken,
        max_connections: Option<usize>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let tracker = Arc::new(ConnectionTracker::default());
        let accept = AcceptLoop {
            listener: self,
            handler,
            stop: stop.clone(),
            tracker: Arc::clone(&tracker),
            max_connections,
        };
        let handle = thread::Builder::new()
            .name("directord-accept".to_owned())
            .spawn(move || accept.run())
            .map_err(|source| ListenerError::ThreadSpawn { source })?;
        Ok(ListenerHandle {
            stop,
            tracker,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
pub struct ListenerHandle {
    stop: StopToken,
    tracker: Arc<ConnectionTracker>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Signals the accept loop and every worker to stop.
    pub fn shutdown(&self) {
        self.stop.stop();
    }

    /// Waits for the accept loop to exit. The listening socket is closed once
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the accept thread panicked.
    pub fn join(&mut self) -> Result<(), ListenerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => Ok(()),
                Err(_) => Err(ListenerError::ThreadPanic),
            }
        } else {
            Ok(())
        }
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.tracker.active()
    }

    /// Gives open connections up to `grace` to finish, then force-closes the
    /// rest. Returns the number of connections that had to be closed.
    pub fn drain(&self, grace: Duration) -> usize {
        if self.tracker.wait_idle(grace) {
            return 0;
        }
        let forced = self.tracker.close_all();
        warn!(
            target: LISTENER_TARGET,
            forced,
            grace_ms = duration_millis(grace),
            "grace period elapsed with connections still open"
        );
        forced
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

struct AcceptLoop {
    listener: SocketListener,
    handler: Arc<dyn ConnectionHandler>,
    stop: StopToken,
    tracker: Arc<ConnectionTracker>,
    max_connections: Option<usize>,
}

impl AcceptLoop {
    fn run(self) {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            address = %self.listener.local_addr,
            "socket listener active"
        );
        let mut last_error = None::<io::ErrorKind>;
        while !self.stop.is_stopped() {
            match accept_connection(&self.listener.listener) {
                Ok(Some((stream, peer))) => {
                    last_error = None;
                    self.dispatch(stream, peer);
                }
                Ok(None) => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            address = %self.listener.local_addr,
            "socket listener stopped"
        );
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let handler = Arc::clone(&self.handler);
        if let Some(limit) = self.max_connections
            && self.tracker.active() >= limit
        {
            warn!(
                target: LISTENER_TARGET,
                peer = %peer,
                limit,
                "connection limit reached"
            );
            let spawned = thread::Builder::new()
                .name("directord-reject".to_owned())
                .spawn(move || handler.reject(stream, peer));
            if let Err(error) = spawned {
                warn!(target: LISTENER_TARGET, error = %error, "failed to spawn reject thread");
            }
            return;
        }

        let guard = match self.tracker.track(&stream, peer) {
            Ok(guard) => guard,
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    error = %error,
                    "failed to track connection"
                );
                return;
            }
        };
        debug!(target: LISTENER_TARGET, peer = %peer, "connection accepted");
        let spawned = thread::Builder::new()
            .name(format!("directord-conn-{peer}"))
            .spawn(move || {
                handler.handle(stream, peer);
                drop(guard);
            });
        if let Err(error) = spawned {
            warn!(
                target: LISTENER_TARGET,
                peer = %peer,
                error = %error,
                "failed to spawn connection worker"
            );
        }
    }
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_string(),
        port,
    })?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|source| ListenerError::Socket { addr, source })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| ListenerError::Socket { addr, source })?;
    socket
        .bind(&addr.into())
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|source| ListenerError::Listen { addr, source })?;
    Ok(socket.into())
}
