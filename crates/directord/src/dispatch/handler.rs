//! Connection worker that serves newline-delimited JSON requests.
//!
//! This module provides the `DispatchConnectionHandler`, which implements the
//! `ConnectionHandler` trait from the transport layer. Each connection is
//! served until the peer closes it, the idle deadline passes, a request
//! exceeds the size limit, or the server begins shutting down. Requests on a
//! connection are answered strictly in arrival order.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use director_config::Config;

use crate::transport::{ConnectionHandler, StopToken};

use super::errors::DispatchError;
use super::framing::LineFramer;
use super::request::Request;
use super::response::{Response, ResponseWriter};
use super::router::{DISPATCH_TARGET, RequestRouter};

const READ_CHUNK_BYTES: usize = 8 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CAPACITY_MESSAGE: &str = "Server at connection capacity";

/// Per-connection limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Longest gap between reads before the connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Longest a single response write may block.
    pub write_timeout: Option<Duration>,
    /// Largest accepted request line.
    pub max_request_bytes: usize,
    /// How often a blocked read wakes to check for shutdown.
    pub poll_interval: Duration,
}

impl ConnectionSettings {
    /// Derives the limits from the daemon configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            write_timeout: config.write_timeout(),
            max_request_bytes: config.max_request_bytes(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Why a connection stopped being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    PeerClosed,
    IdleTimeout,
    Shutdown,
    RequestTooLarge,
}

impl SessionEnd {
    fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::IdleTimeout => "idle_timeout",
            Self::Shutdown => "shutdown",
            Self::RequestTooLarge => "request_too_large",
        }
    }
}

/// Connection handler that parses and dispatches JSON line requests.
#[derive(Debug, Clone)]
pub struct DispatchConnectionHandler {
    router: Arc<RequestRouter>,
    settings: ConnectionSettings,
    stop: StopToken,
}

impl DispatchConnectionHandler {
    /// Creates a handler that routes through `router` until `stop` fires.
    pub fn new(router: Arc<RequestRouter>, settings: ConnectionSettings, stop: StopToken) -> Self {
        Self {
            router,
            settings,
            stop,
        }
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.settings.poll_interval))?;
        stream.set_write_timeout(self.settings.write_timeout)?;
        Ok(())
    }

    /// Serves one connection over any duplex byte stream.
    ///
    /// The stream's reads are expected to time out with `WouldBlock` or
    /// `TimedOut` periodically so the loop can observe shutdown and the idle
    /// deadline.
    pub(crate) fn serve<S: Read + Write>(
        &self,
        stream: &mut S,
    ) -> Result<SessionEnd, DispatchError> {
        let mut framer = LineFramer::new(self.settings.max_request_bytes);
        let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
        let mut last_activity = Instant::now();
        loop {
            if self.stop.is_stopped() {
                return Ok(SessionEnd::Shutdown);
            }
            let read = match stream.read(&mut chunk) {
                Ok(0) => {
                    if framer.pending() > 0 {
                        debug!(
                            target: DISPATCH_TARGET,
                            bytes = framer.pending(),
                            "discarding unterminated request at end of stream"
                        );
                    }
                    return Ok(SessionEnd::PeerClosed);
                }
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    if self.idle_expired(last_activity) {
                        return Ok(SessionEnd::IdleTimeout);
                    }
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            last_activity = Instant::now();
            framer.push(chunk.get(..read).unwrap_or_default());

            loop {
                match framer.next_line() {
                    Ok(Some(line)) => self.answer(&line, stream)?,
                    Ok(None) => break,
                    Err(error) => {
                        warn!(
                            target: DISPATCH_TARGET,
                            error = %error,
                            "closing connection after oversized request"
                        );
                        write_protocol_error(stream, &error, Duration::ZERO)?;
                        return Ok(SessionEnd::RequestTooLarge);
                    }
                }
            }
            // The idle deadline runs between requests, not while a handler works.
            last_activity = Instant::now();
        }
    }

    fn answer<W: Write>(&self, line: &[u8], stream: &mut W) -> Result<(), DispatchError> {
        if line.trim_ascii().is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        match Request::parse(line) {
            Ok(request) => {
                let response = self.router.route(&request);
                ResponseWriter::new(stream).write_response(&response)
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "rejecting malformed request"
                );
                write_protocol_error(stream, &error, started.elapsed())
            }
        }
    }

    fn idle_expired(&self, last_activity: Instant) -> bool {
        self.settings
            .idle_timeout
            .is_some_and(|timeout| last_activity.elapsed() >= timeout)
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, mut stream: TcpStream, peer: SocketAddr) {
        info!(target: DISPATCH_TARGET, peer = %peer, "client connected");
        if let Err(error) = self.configure(&stream) {
            warn!(
                target: DISPATCH_TARGET,
                peer = %peer,
                error = %error,
                "failed to configure connection"
            );
            close(&stream);
            return;
        }
        match self.serve(&mut stream) {
            Ok(end) => info!(
                target: DISPATCH_TARGET,
                peer = %peer,
                reason = end.as_str(),
                "client disconnected"
            ),
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                peer = %peer,
                error = %error,
                "connection closed after error"
            ),
        }
        close(&stream);
    }

    fn reject(&self, mut stream: TcpStream, peer: SocketAddr) {
        let _ = stream.set_write_timeout(self.settings.write_timeout);
        let response = Response::error(CAPACITY_MESSAGE).with_processing_time(Duration::ZERO);
        if let Err(error) = ResponseWriter::new(&mut stream).write_response(&response) {
            debug!(
                target: DISPATCH_TARGET,
                peer = %peer,
                error = %error,
                "failed to notify rejected client"
            );
        }
        close(&stream);
    }
}

fn write_protocol_error<W: Write>(
    stream: &mut W,
    error: &DispatchError,
    elapsed: Duration,
) -> Result<(), DispatchError> {
    let message = error
        .client_message()
        .unwrap_or_else(|| "Internal server error".to_owned());
    let response = Response::error(message).with_processing_time(elapsed);
    ResponseWriter::new(stream).write_response(&response)
}

fn close(stream: &TcpStream) {
    if let Err(error) = stream.shutdown(Shutdown::Both)
        && error.kind() != io::ErrorKind::NotConnected
    {
        debug!(target: DISPATCH_TARGET, error = %error, "socket shutdown failed");
    }
}
