//! TCP listener transport implementation
//!
//! A listener owns two handles: the listening socket and the single client it
//! has accepted. Serving several clients at once takes several listeners, or
//! a disconnect-then-accept cycle on one.

use crate::endpoint::{Endpoint, EndpointIdentity, TransportKind};
use crate::stream::{self, ReadOutcome};
use port_agent_core::{TransportError, TransportResult};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// TCP listener settings
///
/// `port: None` means not configured. `Some(0)` asks the OS to pick a free
/// port; [`ListenerTransport::listen_port`] reports which one it chose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSettings {
    pub port: Option<u16>,
}

impl ListenerSettings {
    /// Listen on a fixed port (0 lets the OS choose)
    pub fn new(port: u16) -> Self {
        Self { port: Some(port) }
    }

    /// Listen on whatever port the OS assigns
    pub fn ephemeral() -> Self {
        Self::new(0)
    }
}

/// TCP listener transport with a single accepted client
///
/// # Usage Example
/// ```rust,no_run
/// use port_agent_transport::{Endpoint, ListenerTransport};
///
/// let mut server = ListenerTransport::with_port(0);
/// server.initialize()?;
/// let port = server.listen_port();
///
/// // Non-blocking: false until a client is pending.
/// while !server.accept_client()? {}
///
/// let mut buf = [0u8; 128];
/// let n = server.read_data(&mut buf)?;
/// server.write_data(&buf[..n])?;
/// # Ok::<(), port_agent_core::TransportError>(())
/// ```
#[derive(Debug, Default)]
pub struct ListenerTransport {
    settings: ListenerSettings,
    listener: Option<TcpListener>,
    client: Option<TcpStream>,
    blocking: bool,
}

impl ListenerTransport {
    /// Create a new listener transport
    pub fn new(settings: ListenerSettings) -> Self {
        Self {
            settings,
            listener: None,
            client: None,
            blocking: false,
        }
    }

    /// Create a listener for `port` (0 lets the OS choose)
    pub fn with_port(port: u16) -> Self {
        Self::new(ListenerSettings::new(port))
    }

    /// Unbound copy carrying only this listener's configuration
    pub fn template(&self) -> Self {
        Self {
            settings: self.settings,
            listener: None,
            client: None,
            blocking: self.blocking,
        }
    }

    /// Configured port, `None` if not configured
    pub fn port(&self) -> Option<u16> {
        self.settings.port
    }

    /// Configure the port; takes effect on the next initialize
    pub fn set_port(&mut self, port: u16) {
        self.settings.port = Some(port);
    }

    /// Return to the unconfigured state; takes effect on the next initialize
    pub fn clear_port(&mut self) {
        self.settings.port = None;
    }

    /// Whether the listening socket is open
    pub fn listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Port the OS actually bound
    ///
    /// Returns 0 when not listening; check [`ListenerTransport::listening`]
    /// to tell that apart from a real bind.
    pub fn listen_port(&self) -> u16 {
        let Some(listener) = &self.listener else {
            return 0;
        };
        match listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                log::error!("failed to query listen port: {}", e);
                0
            }
        }
    }

    /// Address of the accepted client, if any
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client.as_ref().and_then(|c| c.peer_addr().ok())
    }

    /// Accept a pending client connection
    ///
    /// # Returns
    /// `true` if a client was accepted, `false` if none is pending yet on a
    /// non-blocking listener.
    ///
    /// # Errors
    /// - `NotInitialized` if not listening
    /// - `AlreadyConnected` if a client is already attached
    /// - `ConnectFailure` if accept fails for any other reason
    pub fn accept_client(&mut self) -> TransportResult<bool> {
        let Some(listener) = &self.listener else {
            return Err(TransportError::NotInitialized);
        };
        if self.client.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        log::debug!("accepting client connection");
        let (client, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if stream::is_would_block(&e) => {
                log::trace!("non-blocking accept ignored: {}", e);
                return Ok(false);
            }
            Err(e) => {
                log::error!("accept failed: {}", e);
                return Err(TransportError::connect(&e));
            }
        };

        client
            .set_nonblocking(!self.blocking)
            .map_err(|e| TransportError::connect(&e))?;

        log::info!("accepted client {} on port {}", peer, self.listen_port());
        self.client = Some(client);
        Ok(true)
    }

    /// Drop the accepted client, keep listening
    pub fn disconnect_client(&mut self) {
        if let Some(client) = self.client.take() {
            log::debug!("disconnecting client");
            if let Err(e) = client.shutdown(Shutdown::Both) {
                log::debug!("client shutdown failed: {}", e);
            }
            log::info!("client disconnected from port {}", self.listen_port());
        }
    }

    /// Raw descriptor of the listening socket
    #[cfg(unix)]
    pub fn server_fd(&self) -> Option<RawFd> {
        self.listener.as_ref().map(|l| l.as_raw_fd())
    }

    /// Raw descriptor of the accepted client
    #[cfg(unix)]
    pub fn client_fd(&self) -> Option<RawFd> {
        self.client.as_ref().map(|c| c.as_raw_fd())
    }

    fn require_client(&self) -> TransportResult<()> {
        if self.listener.is_none() {
            return Err(TransportError::NotInitialized);
        }
        if self.client.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }
}

impl Endpoint for ListenerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpListener
    }

    fn identity(&self) -> EndpointIdentity {
        EndpointIdentity::TcpListener {
            port: self.settings.port,
        }
    }

    fn blocking(&self) -> bool {
        self.blocking
    }

    fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(listener) = &self.listener {
            if let Err(e) = listener.set_nonblocking(!blocking) {
                log::warn!("failed to change listener blocking mode: {}", e);
            }
        }
        if let Some(client) = &self.client {
            if let Err(e) = client.set_nonblocking(!blocking) {
                log::warn!("failed to change client blocking mode: {}", e);
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.settings.port.is_some()
    }

    fn is_initialized(&self) -> bool {
        self.listening()
    }

    fn connected(&self) -> bool {
        self.client.is_some()
    }

    /// Bind and listen on the configured port (all interfaces)
    ///
    /// A listener that is already up is torn down and bound again, which is
    /// how a port change takes effect.
    fn initialize(&mut self) -> TransportResult<bool> {
        log::debug!("TCP listener initialize()");
        let Some(port) = self.settings.port else {
            return Err(TransportError::MissingConfiguration("missing inet port".into()));
        };

        self.disconnect();

        log::trace!("bind to port {}", port);
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(|e| {
            log::error!("bind to port {} failed: {}", port, e);
            TransportError::connect(&e)
        })?;
        listener
            .set_nonblocking(!self.blocking)
            .map_err(|e| TransportError::connect(&e))?;
        self.listener = Some(listener);

        let bound = self.listen_port();
        if port != 0 && bound != port {
            self.disconnect();
            return Err(TransportError::ConnectFailure(format!(
                "bind to port {} failed, got {}",
                port, bound
            )));
        }

        log::info!("listening on port {}", bound);
        Ok(true)
    }

    fn connect_client(&mut self) -> TransportResult<bool> {
        self.accept_client()
    }

    /// Disconnect the client first, then close the listening socket
    fn disconnect(&mut self) {
        self.disconnect_client();
        if self.listener.take().is_some() {
            log::debug!("closed server connection");
        }
    }

    fn write_data(&mut self, buf: &[u8]) -> TransportResult<usize> {
        self.require_client()?;
        stream::write_fully(&mut self.client, buf)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.require_client()?;
        match stream::read_once(&mut self.client, buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::WouldBlock => Ok(0),
            ReadOutcome::Closed => {
                log::info!("client connection closed, zero bytes received");
                self.disconnect_client();
                Ok(0)
            }
        }
    }
}
