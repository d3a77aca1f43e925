//! Dump listener
//!
//! Plain blocking TCP: every accepted connection gets one fresh dump, then
//! the server closes it. Nothing is read from the client. Connections are
//! handled one at a time on the listener thread, so every socket write is
//! bounded by a timeout: a client that stops reading loses its dump instead
//! of stalling the listener.
//!
//! The listener is std and blocking. It runs on a JVM agent thread that is
//! already attached to the VM, and there is nothing to multiplex.

use std::io::{self, BufWriter, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::DEFAULT_WRITE_TIMEOUT;
use crate::domain::AgentError;

/// Pause after a failed `accept` so a persistent error cannot spin the CPU
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct DumpServer {
    listener: TcpListener,
    write_timeout: Duration,
}

impl DumpServer {
    /// Bind all interfaces on `port`
    ///
    /// Prefers the IPv6 wildcard (which also accepts IPv4 on dual-stack
    /// hosts) and falls back to `0.0.0.0` where IPv6 is unavailable.
    ///
    /// # Errors
    /// Returns [`AgentError::Bind`] if neither address can be bound
    pub fn bind(port: u16) -> Result<Self, AgentError> {
        let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
        let listener = match TcpListener::bind(v6) {
            Ok(listener) => listener,
            Err(e) => {
                debug!("Cannot bind {v6}: {e}, trying IPv4");
                TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(|source| AgentError::Bind { port, source })?
            }
        };
        Ok(Self { listener, write_timeout: DEFAULT_WRITE_TIMEOUT })
    }

    /// Bound on any single blocked write to a client
    ///
    /// A zero duration is ignored; sockets treat it as "no timeout".
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.write_timeout = timeout;
        }
        self
    }

    /// # Errors
    /// Returns an error if the socket address cannot be queried
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one connection and let `handler` write the response
    ///
    /// # Errors
    /// Returns the accept error, or the handler's write error. A client that
    /// stops reading surfaces as `WouldBlock` or `TimedOut`.
    pub fn serve_one<F>(&self, handler: &mut F) -> io::Result<()>
    where
        F: FnMut(&mut BufWriter<TcpStream>) -> io::Result<()>,
    {
        let (stream, peer) = self.listener.accept()?;
        debug!("Dump requested by {peer}");
        stream.set_write_timeout(Some(self.write_timeout))?;

        let mut out = BufWriter::new(stream);
        handler(&mut out)?;
        out.flush()
    }

    /// Serve connections forever
    pub fn serve<F>(&self, mut handler: F) -> !
    where
        F: FnMut(&mut BufWriter<TcpStream>) -> io::Result<()>,
    {
        if let Ok(addr) = self.local_addr() {
            info!("AStack listener started on {addr}");
        }

        loop {
            match self.serve_one(&mut handler) {
                Ok(()) => {}
                // The client went away mid-dump; its remaining output is dropped
                Err(e) if is_disconnect(&e) => debug!("Client disconnected: {e}"),
                Err(e) if is_stalled(&e) => {
                    warn!("Client stopped reading for {:?}, dump abandoned", self.write_timeout);
                }
                Err(e) => {
                    warn!("Dump connection failed: {e}");
                    std::thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

/// A write timed out; Linux reports `SO_SNDTIMEO` expiry as `EAGAIN`
fn is_stalled(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
