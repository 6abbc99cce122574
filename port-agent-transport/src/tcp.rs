//! TCP client transport implementation

use crate::endpoint::{Endpoint, EndpointIdentity, TransportKind};
use crate::socket::{ClientSocket, SocketSettings};
use crate::stream::{self, ReadOutcome};
use port_agent_core::{TransportError, TransportResult};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// TCP client transport
///
/// Connects to `hostname:port` and moves bytes over the resulting stream.
/// The connect itself always blocks; the configured blocking mode is applied
/// to the stream once it is connected.
///
/// # Usage Example
/// ```rust,no_run
/// use port_agent_transport::{Endpoint, TcpTransport};
///
/// let mut socket = TcpTransport::with_address("localhost", 4000);
/// socket.set_blocking(true);
/// socket.initialize()?;
/// socket.write_data(b"Test")?;
/// let mut buf = [0u8; 128];
/// let n = socket.read_data(&mut buf)?;
/// # Ok::<(), port_agent_core::TransportError>(())
/// ```
#[derive(Debug, Default)]
pub struct TcpTransport {
    settings: SocketSettings,
    stream: Option<TcpStream>,
    blocking: bool,
}

impl TcpTransport {
    /// Create a new, unconnected TCP transport
    pub fn new(settings: SocketSettings) -> Self {
        Self {
            settings,
            stream: None,
            blocking: false,
        }
    }

    /// Create a TCP transport for `hostname:port`
    pub fn with_address(hostname: &str, port: u16) -> Self {
        Self::new(SocketSettings::new(hostname, port))
    }

    /// Unconnected copy carrying only this transport's configuration
    pub fn template(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            stream: None,
            blocking: self.blocking,
        }
    }

    /// Address of the connected peer, if any
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Raw socket descriptor for external select/poll loops
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.stream.as_ref().map(|s| s.as_raw_fd())
    }

    fn connect_any(addrs: &[SocketAddr]) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in addrs {
            log::trace!("trying {}", addr);
            match TcpStream::connect(addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to connect to")
        }))
    }
}

impl ClientSocket for TcpTransport {
    fn settings(&self) -> &SocketSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SocketSettings {
        &mut self.settings
    }
}

impl Endpoint for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpClient
    }

    fn identity(&self) -> EndpointIdentity {
        EndpointIdentity::TcpClient {
            hostname: self.settings.hostname.clone(),
            port: self.settings.port,
        }
    }

    fn blocking(&self) -> bool {
        self.blocking
    }

    fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.set_nonblocking(!blocking) {
                log::warn!("failed to change blocking mode: {}", e);
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    fn initialize(&mut self) -> TransportResult<bool> {
        log::debug!("TCP client initialize()");
        self.settings.require()?;

        // Never hold two handles: drop the old stream before reconnecting.
        self.disconnect();

        let addrs = self.settings.resolve()?;
        log::info!(
            "connecting to {}:{}",
            self.settings.hostname,
            self.settings.port
        );

        let stream = Self::connect_any(&addrs).map_err(|e| {
            log::error!(
                "connect to {}:{} failed: {}",
                self.settings.hostname,
                self.settings.port,
                e
            );
            TransportError::connect(&e)
        })?;

        stream
            .set_nonblocking(!self.blocking)
            .map_err(|e| TransportError::connect(&e))?;

        self.stream = Some(stream);
        Ok(true)
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("shutdown socket");
            if let Err(e) = stream.shutdown(Shutdown::Write) {
                log::debug!("shutdown failed: {}", e);
            }
            log::info!(
                "disconnected from {}:{}",
                self.settings.hostname,
                self.settings.port
            );
        }
    }

    fn write_data(&mut self, buf: &[u8]) -> TransportResult<usize> {
        stream::write_fully(&mut self.stream, buf)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match stream::read_once(&mut self.stream, buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::WouldBlock => Ok(0),
            ReadOutcome::Closed => {
                log::info!("device connection closed, zero bytes received");
                self.disconnect();
                Ok(0)
            }
        }
    }
}
